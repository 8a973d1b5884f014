//! Active encounter: placed tokens on a square grid

use serde::{Deserialize, Serialize};

use super::DocumentId;

/// Pixel-space bounds of a placed token
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Square grid geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Side of one square in pixels
    pub cell_size: f64,
    /// Real-world distance units (feet) per square
    pub units_per_cell: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            cell_size: 50.0,
            units_per_cell: 5.0,
        }
    }
}

/// A document placed on the encounter map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub document_id: DocumentId,
    pub bounds: Bounds,
}

/// The encounter currently being played
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub round: u32,
}

impl Encounter {
    /// Token placed for a document, if any
    pub fn token_for(&self, document_id: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.document_id == document_id)
    }

    /// Whether the document takes part in this encounter
    pub fn includes(&self, document_id: &str) -> bool {
        self.token_for(document_id).is_some()
    }
}
