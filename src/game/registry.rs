use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use crate::config::GameConfig;
use crate::db::ScoreStore;
use crate::error::AppError;
use crate::game::GameSession;

type SessionSlot = Arc<OnceCell<Arc<GameSession>>>;

/// Maps join codes to their sessions.
///
/// Each code gets one slot that is initialised at most once; concurrent
/// joiners of an unseen code wait on the same slot and all receive the same
/// session. If creating the session fails the slot stays empty and the next
/// joiner tries again.
pub struct SessionRegistry {
    slots: Mutex<HashMap<String, SessionSlot>>,
    store: Arc<dyn ScoreStore>,
    config: GameConfig,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ScoreStore>, config: GameConfig) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            store,
            config,
        }
    }

    pub async fn get_or_create(&self, code: &str) -> Result<Arc<GameSession>, AppError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(code.to_string()).or_default().clone()
        };

        let session = slot
            .get_or_try_init(|| async {
                info!("Creating session {}", code);
                GameSession::create(code, self.store.clone(), self.config.clone()).await
            })
            .await?;

        Ok(session.clone())
    }

    pub async fn get(&self, code: &str) -> Option<Arc<GameSession>> {
        let slots = self.slots.lock().await;
        slots.get(code).and_then(|slot| slot.get().cloned())
    }

    pub async fn session_count(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }
}
