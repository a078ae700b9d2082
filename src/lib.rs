pub mod config;
pub mod db;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;

use std::sync::Arc;
use tracing::{info, warn};

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

use db::{MemoryScoreStore, PgScoreStore, ScoreStore};
use game::SessionRegistry;
use net::GameServer;

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn ScoreStore>,
    pub registry: Arc<SessionRegistry>,
    database: Option<Arc<PgScoreStore>>,
}

impl AppState {
    /// Builds the shared state, using Postgres when it is enabled and
    /// reachable. A database that cannot be reached only degrades score
    /// reporting, so the server falls back to keeping scores in memory.
    pub async fn new(config: Settings) -> Self {
        let database = if config.database.enabled {
            match connect_database(&config).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!("Score database unavailable, keeping scores in memory: {}", e);
                    None
                }
            }
        } else {
            info!("Score database disabled, keeping scores in memory");
            None
        };

        let store: Arc<dyn ScoreStore> = match &database {
            Some(pg) => pg.clone(),
            None => Arc::new(MemoryScoreStore::new()),
        };

        let mut state = Self::with_store(config, store);
        state.database = database;
        state
    }

    pub fn with_store(config: Settings, store: Arc<dyn ScoreStore>) -> Self {
        let registry = Arc::new(SessionRegistry::new(store.clone(), config.game.clone()));
        Self {
            config: Arc::new(config),
            store,
            registry,
            database: None,
        }
    }

    pub fn server(&self) -> Arc<GameServer> {
        Arc::new(GameServer::new(self.registry.clone()))
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(database) = &self.database {
            database.close().await;
            info!("Score database connections closed");
        }
        Ok(())
    }
}

async fn connect_database(config: &Settings) -> Result<PgScoreStore> {
    let store = PgScoreStore::connect(&config.database).await?;
    store.run_migrations().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_without_database() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await;

        assert!(state.database.is_none());
        assert_eq!(state.registry.session_count().await, 0);
        state.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_app_state_clone_shares_components() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::with_store(config, Arc::new(MemoryScoreStore::new()));
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.registry, &cloned.registry));

        let session = state.registry.get_or_create("778899").await.unwrap();
        assert!(Arc::ptr_eq(
            &session,
            &cloned.registry.get("778899").await.unwrap()
        ));
    }
}
