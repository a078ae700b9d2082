use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{GameId, Persisted, PlayerId, ScoreEntry, ScoreStore};

#[derive(Debug)]
enum Record {
    AddPlayer {
        member: Uuid,
        username: String,
        is_drawer: bool,
    },
    SetSecret(String),
    AddPoints {
        member: Uuid,
        points: i32,
    },
    DisableGuessing {
        member: Uuid,
    },
    Scores(oneshot::Sender<Vec<ScoreEntry>>),
}

/// Per-session queue in front of the score store.
///
/// Writes are queued and applied in order by a background task, so a slow or
/// failing store never holds up gameplay. Score reads go through the same
/// queue and therefore observe every write queued before them.
#[derive(Debug)]
pub struct ScoreRecorder {
    game_id: GameId,
    tx: mpsc::UnboundedSender<Record>,
}

impl ScoreRecorder {
    pub fn start(store: Arc<dyn ScoreStore>, game_id: GameId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, game_id, rx));
        Self { game_id, tx }
    }

    pub fn add_player(&self, member: Uuid, username: &str, is_drawer: bool) {
        self.submit(Record::AddPlayer {
            member,
            username: username.to_string(),
            is_drawer,
        });
    }

    pub fn set_secret(&self, word: &str) {
        self.submit(Record::SetSecret(word.to_string()));
    }

    pub fn add_points(&self, member: Uuid, points: i32) {
        self.submit(Record::AddPoints { member, points });
    }

    pub fn disable_guessing(&self, member: Uuid) {
        self.submit(Record::DisableGuessing { member });
    }

    /// Stored scores, or `None` if the store fails or does not answer within
    /// `within`.
    pub async fn scores(&self, within: Duration) -> Option<Vec<ScoreEntry>> {
        let (reply, response) = oneshot::channel();
        self.submit(Record::Scores(reply));

        match timeout(within, response).await {
            Ok(Ok(scores)) => Some(scores),
            // The store call failed and was logged by the recorder task.
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(game_id = self.game_id, "Timed out waiting for stored scores");
                None
            }
        }
    }

    fn submit(&self, record: Record) {
        if self.tx.send(record).is_err() {
            warn!(game_id = self.game_id, "Score recorder stopped; record dropped");
        }
    }
}

async fn run(
    store: Arc<dyn ScoreStore>,
    game_id: GameId,
    mut rx: mpsc::UnboundedReceiver<Record>,
) {
    let mut players: HashMap<Uuid, PlayerId> = HashMap::new();

    while let Some(record) = rx.recv().await {
        match record {
            Record::AddPlayer {
                member,
                username,
                is_drawer,
            } => {
                let result = store.add_player(game_id, &username, is_drawer).await;
                if let Some(player_id) = Persisted::record("add_player", result).stored() {
                    players.insert(member, player_id);
                }
            }
            Record::SetSecret(word) => {
                Persisted::record("set_secret", store.set_secret(game_id, &word).await);
            }
            Record::AddPoints { member, points } => match players.get(&member) {
                Some(&player_id) => {
                    Persisted::record("add_points", store.add_points(player_id, points).await);
                }
                None => debug!("No stored player for {}; points kept in memory", member),
            },
            Record::DisableGuessing { member } => match players.get(&member) {
                Some(&player_id) => {
                    let result = store.disable_guessing(player_id).await;
                    Persisted::record("disable_guessing", result);
                }
                None => debug!("No stored player for {}; guess flag kept in memory", member),
            },
            Record::Scores(reply) => {
                let result = store.get_scores(game_id).await;
                if let Some(scores) = Persisted::record("get_scores", result).stored() {
                    // The asker may have given up already.
                    let _ = reply.send(scores);
                }
            }
        }
    }

    debug!(game_id, "Score recorder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MockScoreStore;
    use crate::db::MemoryScoreStore;
    use crate::error::DatabaseError;

    #[tokio::test]
    async fn test_reads_see_earlier_writes() {
        let store = Arc::new(MemoryScoreStore::new());
        let game_id = store.create_game("1", "unknown").await.unwrap();
        let recorder = ScoreRecorder::start(store.clone(), game_id);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        recorder.add_player(a, "A", true);
        recorder.add_player(b, "B", false);
        recorder.set_secret("tree");
        recorder.add_points(b, 30);
        recorder.disable_guessing(b);

        let scores = recorder.scores(Duration::from_secs(1)).await.unwrap();
        assert_eq!(scores, vec![ScoreEntry::new("B", 30), ScoreEntry::new("A", 0)]);
        assert_eq!(
            store.game(game_id).await.unwrap().secret_word.as_deref(),
            Some("tree")
        );
    }

    #[tokio::test]
    async fn test_points_for_unstored_player_are_skipped() {
        let mut store = MockScoreStore::new();
        store
            .expect_add_player()
            .returning(|_, _, _| Err(DatabaseError::ConnectionError("down".into())));
        store.expect_add_points().never();
        store.expect_disable_guessing().never();
        store
            .expect_get_scores()
            .returning(|_| Err(DatabaseError::ConnectionError("down".into())));

        let recorder = ScoreRecorder::start(Arc::new(store), 1);
        let member = Uuid::new_v4();
        recorder.add_player(member, "A", false);
        recorder.add_points(member, 10);
        recorder.disable_guessing(member);

        assert_eq!(recorder.scores(Duration::from_secs(1)).await, None);
    }
}
