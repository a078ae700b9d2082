use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::models::ScoreEntry;
use crate::db::store::{GameId, PlayerId, ScoreStore};
use crate::error::DatabaseError;

/// Postgres-backed score store.
pub struct PgScoreStore {
    pool: Arc<PgPool>,
}

impl PgScoreStore {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let store =
            Self::new_with_options(&config.url, config.max_connections, Duration::from_secs(5))
                .await?;
        info!("Connected to score database");
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore {
    async fn create_game(&self, code: &str, host: &str) -> Result<GameId, DatabaseError> {
        let id = sqlx::query_scalar::<_, GameId>(
            "INSERT INTO games (code, host) VALUES ($1, $2) RETURNING id",
        )
        .bind(code)
        .bind(host)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn set_secret(&self, game_id: GameId, word: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE games SET secret_word = $1 WHERE id = $2")
            .bind(word)
            .bind(game_id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    async fn add_player(
        &self,
        game_id: GameId,
        username: &str,
        is_drawer: bool,
    ) -> Result<PlayerId, DatabaseError> {
        let id = sqlx::query_scalar::<_, PlayerId>(
            r#"
            INSERT INTO players (game_id, username, is_drawer, can_guess)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(game_id)
        .bind(username)
        .bind(is_drawer)
        .bind(!is_drawer)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn add_points(&self, player_id: PlayerId, points: i32) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE players SET score = score + $1 WHERE id = $2")
            .bind(points)
            .bind(player_id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    async fn disable_guessing(&self, player_id: PlayerId) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE players SET can_guess = FALSE WHERE id = $1")
            .bind(player_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn get_scores(&self, game_id: GameId) -> Result<Vec<ScoreEntry>, DatabaseError> {
        let scores = sqlx::query_as::<_, ScoreEntry>(
            "SELECT username, score FROM players WHERE game_id = $1 ORDER BY score DESC, id ASC",
        )
        .bind(game_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(scores)
    }
}
