//! Database module for the doodle server
//!
//! This module holds the score store interface the game core calls into,
//! the Postgres implementation used in deployments, and an in-memory
//! implementation for running without a database.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryScoreStore;
pub use models::{Game, Player, ScoreEntry};
pub use operations::PgScoreStore;
pub use store::{GameId, Persisted, PlayerId, ScoreStore};
