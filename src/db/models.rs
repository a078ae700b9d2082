use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::store::{GameId, PlayerId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Game {
    pub id: GameId,
    pub code: String,
    pub host: String,
    pub secret_word: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Game {
    pub fn new(id: GameId, code: String, host: String) -> Self {
        Self {
            id,
            code,
            host,
            secret_word: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Player {
    pub id: PlayerId,
    pub game_id: GameId,
    pub username: String,
    pub is_drawer: bool,
    pub can_guess: bool,
    pub score: i32,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: PlayerId, game_id: GameId, username: String, is_drawer: bool) -> Self {
        Self {
            id,
            game_id,
            username,
            is_drawer,
            can_guess: !is_drawer,
            score: 0,
            joined_at: Utc::now(),
        }
    }
}

/// One `username,score` pair of a `SCORES:` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScoreEntry {
    pub username: String,
    pub score: i32,
}

impl ScoreEntry {
    pub fn new(username: impl Into<String>, score: i32) -> Self {
        Self {
            username: username.into(),
            score,
        }
    }
}
