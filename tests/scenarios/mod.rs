//! Scenario tests for vttd
//!
//! Play-through scenarios with participants answering over WebSocket:
//! - Combat: weapon attacks, monster actions, direct damage
//! - Spells: attack cantrips and batched saving throws
//! - Rest: short and long rests with rolls and confirmations

pub mod combat;
pub mod rest;
pub mod spells;
