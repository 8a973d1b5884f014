//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `VTTD_`-prefixed environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::DEFAULT_GM;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "vttd.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// JSON world seed loaded at startup
    pub world_path: Option<PathBuf>,
    /// Participant that rolls for creatures nobody owns
    pub gm_participant: String,
    /// Give up on a roll or confirmation after this long; unset waits forever
    pub roll_timeout_ms: Option<u64>,
    /// Roll on the server for participants with no live connection
    pub auto_roll_absent: bool,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            world_path: None,
            gm_participant: DEFAULT_GM.to_string(),
            roll_timeout_ms: None,
            auto_roll_absent: true,
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit `path` must exist; without one, `vttd.toml` in the
    /// working directory is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::MissingFile(path.to_path_buf()))
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        Self::figment(&file).extract().map_err(|e| ConfigError::from(Box::new(e)))
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("VTTD_"))
    }

    pub fn roll_timeout(&self) -> Option<Duration> {
        self.roll_timeout_ms.map(Duration::from_millis)
    }
}
