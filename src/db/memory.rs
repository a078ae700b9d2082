use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::db::models::{Game, Player, ScoreEntry};
use crate::db::store::{GameId, PlayerId, ScoreStore};
use crate::error::DatabaseError;

/// Process-local score store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    games: RwLock<HashMap<GameId, Game>>,
    players: RwLock<HashMap<PlayerId, Player>>,
    next_id: AtomicI64,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn game(&self, game_id: GameId) -> Option<Game> {
        self.games.read().await.get(&game_id).cloned()
    }

    pub async fn player(&self, player_id: PlayerId) -> Option<Player> {
        self.players.read().await.get(&player_id).cloned()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn create_game(&self, code: &str, host: &str) -> Result<GameId, DatabaseError> {
        let id = self.allocate_id();
        let game = Game::new(id, code.to_string(), host.to_string());
        self.games.write().await.insert(id, game);
        Ok(id)
    }

    async fn set_secret(&self, game_id: GameId, word: &str) -> Result<(), DatabaseError> {
        let mut games = self.games.write().await;
        let game = games.get_mut(&game_id).ok_or(DatabaseError::NotFound)?;
        game.secret_word = Some(word.to_string());
        Ok(())
    }

    async fn add_player(
        &self,
        game_id: GameId,
        username: &str,
        is_drawer: bool,
    ) -> Result<PlayerId, DatabaseError> {
        if !self.games.read().await.contains_key(&game_id) {
            return Err(DatabaseError::NotFound);
        }
        let id = self.allocate_id();
        let player = Player::new(id, game_id, username.to_string(), is_drawer);
        self.players.write().await.insert(id, player);
        Ok(id)
    }

    async fn add_points(&self, player_id: PlayerId, points: i32) -> Result<(), DatabaseError> {
        let mut players = self.players.write().await;
        let player = players.get_mut(&player_id).ok_or(DatabaseError::NotFound)?;
        player.score += points;
        Ok(())
    }

    async fn disable_guessing(&self, player_id: PlayerId) -> Result<(), DatabaseError> {
        let mut players = self.players.write().await;
        let player = players.get_mut(&player_id).ok_or(DatabaseError::NotFound)?;
        player.can_guess = false;
        Ok(())
    }

    async fn get_scores(&self, game_id: GameId) -> Result<Vec<ScoreEntry>, DatabaseError> {
        let players = self.players.read().await;
        let mut rows: Vec<&Player> = players.values().filter(|p| p.game_id == game_id).collect();
        // Ids grow with join order, so this matches the Postgres ordering.
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .map(|p| ScoreEntry::new(p.username.clone(), p.score))
            .collect())
    }
}
