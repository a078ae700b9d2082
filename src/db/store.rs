use async_trait::async_trait;
use tracing::warn;

use crate::db::models::ScoreEntry;
use crate::error::DatabaseError;

pub type GameId = i64;
pub type PlayerId = i64;

/// Durable record of games, players and scores.
///
/// The game core treats every call except `create_game` as best effort: the
/// in-memory session state stays authoritative when a call fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn create_game(&self, code: &str, host: &str) -> Result<GameId, DatabaseError>;

    async fn set_secret(&self, game_id: GameId, word: &str) -> Result<(), DatabaseError>;

    async fn add_player(
        &self,
        game_id: GameId,
        username: &str,
        is_drawer: bool,
    ) -> Result<PlayerId, DatabaseError>;

    async fn add_points(&self, player_id: PlayerId, points: i32) -> Result<(), DatabaseError>;

    async fn disable_guessing(&self, player_id: PlayerId) -> Result<(), DatabaseError>;

    /// Scores for a game ordered by score, highest first.
    async fn get_scores(&self, game_id: GameId) -> Result<Vec<ScoreEntry>, DatabaseError>;
}

/// Outcome of a persistence call made during gameplay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted<T> {
    Stored(T),
    Degraded,
}

impl<T> Persisted<T> {
    /// Logs a failed call and turns it into `Degraded`.
    pub fn record(operation: &'static str, result: Result<T, DatabaseError>) -> Self {
        match result {
            Ok(value) => Persisted::Stored(value),
            Err(e) => {
                warn!(operation, error = %e, "Score store call failed; continuing without it");
                Persisted::Degraded
            }
        }
    }

    pub fn stored(self) -> Option<T> {
        match self {
            Persisted::Stored(value) => Some(value),
            Persisted::Degraded => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Persisted::Degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_record() {
        let ok = Persisted::record("add_player", Ok(7));
        assert_eq!(ok, Persisted::Stored(7));
        assert_eq!(ok.stored(), Some(7));

        let failed: Persisted<i64> =
            Persisted::record("add_player", Err(DatabaseError::ConnectionError("down".into())));
        assert!(failed.is_degraded());
        assert_eq!(failed.stored(), None);
    }
}
