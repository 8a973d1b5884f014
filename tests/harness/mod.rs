//! Integration Test Harness
//!
//! - `TestServer` - Spawns the real vttd binary on a random port with a seeded world
//! - `Participant` - WebSocket client that answers roll and confirmation requests
//! - `TestWorld` - Standard party and monsters written to a temporary world file
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::{TestServer, TestWorld};
//!
//! #[tokio::test]
//! async fn test_swing() {
//!     let server = TestServer::start().await.unwrap();
//!     let mut alice = server.connect("alice").await.unwrap();
//!
//!     alice.submit(TestWorld::sword_swing()).await.unwrap();
//!     alice.answer_roll(&[18]).await.unwrap();
//! }
//! ```

mod client;
mod server;
mod world;

pub use client::Participant;
pub use server::TestServer;
pub use world::TestWorld;
