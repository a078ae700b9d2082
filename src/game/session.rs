//! Per-code game session.
//!
//! All session state sits behind one async mutex that every operation holds
//! for its whole duration. That gives a single total order per session:
//! guesses, draw relays, departures and timer ticks never observe a
//! half-finished round. Outbound messages are queued on each connection's
//! channel and score store writes on the session's `ScoreRecorder`, so holding
//! the lock never waits on a socket or on the database. The only store read,
//! the score table at round end, is bounded by `GameConfig::scores_timeout`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::db::{GameId, ScoreEntry, ScoreStore};
use crate::error::AppError;
use crate::game::recorder::ScoreRecorder;
use crate::game::rules::{self, PLACEHOLDER_HOST};
use crate::game::timer::{RoundTimer, TickOutcome};
use crate::net::{Broadcaster, Connection};
use crate::protocol::{Role, RoundEnd, ServerMessage};

pub type RoundId = u64;

#[derive(Debug)]
struct Member {
    username: String,
    role: Role,
    guess_disabled: bool,
    /// Points awarded in this session; used when the store cannot report them.
    score: i32,
}

#[derive(Debug)]
struct Round {
    id: RoundId,
    secret: &'static str,
    time_left: u32,
}

#[derive(Debug, Default)]
struct SessionState {
    members: Broadcaster,
    roster: HashMap<Uuid, Member>,
    drawer: Option<Uuid>,
    round: Option<Round>,
    timer: Option<RoundTimer>,
    rounds_started: RoundId,
}

impl SessionState {
    fn broadcast(&self, msg: &ServerMessage) {
        let dead = self.members.broadcast(msg);
        if !dead.is_empty() {
            // Their connection tasks remove them once the socket is gone.
            debug!("{} member(s) unreachable during broadcast", dead.len());
        }
    }

    fn send_to(&self, id: &Uuid, msg: &ServerMessage) {
        if let Err(e) = self.members.send_to(id, msg) {
            debug!("Private message to {} dropped: {}", id, e);
        }
    }

    fn players_message(&self) -> ServerMessage {
        ServerMessage::Players(self.members.usernames())
    }

    fn in_memory_scores(&self) -> Vec<ScoreEntry> {
        let mut scores: Vec<ScoreEntry> = self
            .members
            .iter()
            .filter_map(|conn| self.roster.get(&conn.id()))
            .map(|m| ScoreEntry::new(m.username.clone(), m.score))
            .collect();
        // Stable sort keeps join order among equal scores.
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        scores
    }
}

/// One game instance identified by its join code.
pub struct GameSession {
    code: String,
    game_id: GameId,
    recorder: ScoreRecorder,
    config: GameConfig,
    me: Weak<GameSession>,
    state: Mutex<SessionState>,
}

impl GameSession {
    /// Creates the session and its persistence record. A session that cannot
    /// be recorded cannot award scores, so the error is returned to the joiner.
    pub async fn create(
        code: &str,
        store: Arc<dyn ScoreStore>,
        config: GameConfig,
    ) -> Result<Arc<Self>, AppError> {
        let game_id = store.create_game(code, PLACEHOLDER_HOST).await?;
        info!("Game created id={} code={}", game_id, code);

        Ok(Arc::new_cyclic(|me| Self {
            code: code.to_string(),
            game_id,
            recorder: ScoreRecorder::start(store, game_id),
            config,
            me: me.clone(),
            state: Mutex::new(SessionState::default()),
        }))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub async fn add_connection(&self, conn: Arc<Connection>) {
        let mut state = self.state.lock().await;
        let id = conn.id();
        let username = conn.username().to_string();

        state.members.add(conn);
        state.broadcast(&ServerMessage::Info(format!("{username} joined the game.")));
        let players = state.players_message();
        state.broadcast(&players);

        // Joining an empty session (first ever, or after everyone left)
        // makes you the drawer.
        let is_drawer = state.members.len() == 1;
        let role = if is_drawer { Role::Drawer } else { Role::Guesser };
        if is_drawer {
            state.drawer = Some(id);
        }
        state.send_to(&id, &ServerMessage::Role(role));

        self.recorder.add_player(id, &username, is_drawer);

        state.roster.insert(
            id,
            Member {
                username: username.clone(),
                role,
                guess_disabled: false,
                score: 0,
            },
        );
        info!("[{}] {} joined as {}", self.code, username, role);

        if is_drawer {
            state.send_to(
                &id,
                &ServerMessage::Info("You are the drawer. Secret will be sent to you.".into()),
            );
            self.start_round_locked(&mut state).await;
        } else {
            state.send_to(&id, &ServerMessage::Info("Wait for drawer to draw.".into()));
        }
    }

    /// Removes a member. Calling it for a connection that already left is a
    /// no-op.
    pub async fn remove_connection(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        let Some(conn) = state.members.remove(&id) else {
            return;
        };
        state.roster.remove(&id);
        let username = conn.username().to_string();
        info!("[{}] {} left", self.code, username);

        state.broadcast(&ServerMessage::Info(format!("{username} left.")));
        let players = state.players_message();
        state.broadcast(&players);

        if state.drawer == Some(id) {
            state.drawer = None;
            state.broadcast(&ServerMessage::Info("Drawer left. Ending round.".into()));
            self.end_round_locked(&mut state).await;

            if let Some(next) = state.members.first().map(|c| c.id()) {
                state.drawer = Some(next);
                if let Some(member) = state.roster.get_mut(&next) {
                    member.role = Role::Drawer;
                    info!("[{}] {} promoted to drawer", self.code, member.username);
                }
                state.send_to(&next, &ServerMessage::Role(Role::Drawer));
            }
        }
    }

    pub async fn start_round(&self) {
        let mut state = self.state.lock().await;
        self.start_round_locked(&mut state).await;
    }

    pub async fn end_round(&self) {
        let mut state = self.state.lock().await;
        self.end_round_locked(&mut state).await;
    }

    pub async fn chat(&self, from: Uuid, text: &str) {
        let state = self.state.lock().await;
        let Some(member) = state.roster.get(&from) else {
            return;
        };
        state.broadcast(&ServerMessage::Chat {
            username: member.username.clone(),
            text: text.to_string(),
        });
    }

    /// Relays a stroke to everyone but its sender, whatever the sender's role
    /// or the round state.
    pub async fn handle_draw(&self, from: Uuid, payload: &str) {
        let state = self.state.lock().await;
        let Some(member) = state.roster.get(&from) else {
            return;
        };
        debug!("[{}] draw from {}", self.code, member.username);
        state.members.broadcast_except(
            &from,
            &ServerMessage::Draw {
                username: member.username.clone(),
                payload: payload.to_string(),
            },
        );
    }

    pub async fn check_guess(&self, from: Uuid, text: &str) {
        let mut state = self.state.lock().await;

        if state.drawer == Some(from) {
            state.send_to(&from, &ServerMessage::Info("Drawer cannot guess.".into()));
            return;
        }
        let Some((secret, time_left)) = state.round.as_ref().map(|r| (r.secret, r.time_left))
        else {
            return;
        };
        let Some(member) = state.roster.get(&from) else {
            return;
        };
        if member.guess_disabled {
            debug!("[{}] ignoring guess from disabled {}", self.code, member.username);
            return;
        }
        let username = member.username.clone();

        if !rules::is_correct_guess(text, secret) {
            state.broadcast(&ServerMessage::Chat {
                username,
                text: text.to_string(),
            });
            return;
        }

        let points = rules::points_for(time_left);
        let awarded = i32::try_from(points).unwrap_or(i32::MAX);
        info!("[{}] {} guessed '{}' for {} points", self.code, username, secret, points);
        state.broadcast(&ServerMessage::Correct {
            username: username.clone(),
            secret: secret.to_string(),
            points,
        });

        self.recorder.add_points(from, awarded);
        self.recorder.disable_guessing(from);
        if let Some(member) = state.roster.get_mut(&from) {
            member.score = member.score.saturating_add(awarded);
            member.guess_disabled = true;
        }

        state.broadcast(&ServerMessage::Disable(username));
        self.end_round_locked(&mut state).await;
    }

    /// One second of round time. Called by the round's timer task.
    pub(crate) async fn tick(&self, round: RoundId) -> TickOutcome {
        let mut state = self.state.lock().await;
        let Some(current) = state.round.as_mut().filter(|r| r.id == round) else {
            return TickOutcome::Stop;
        };

        current.time_left = current.time_left.saturating_sub(1);
        let time_left = current.time_left;
        let secret = current.secret;
        state.broadcast(&ServerMessage::Time(time_left));

        if time_left > 0 {
            return TickOutcome::Continue;
        }

        info!("[{}] time up, the word was '{}'", self.code, secret);
        state.broadcast(&ServerMessage::RoundEnd(RoundEnd::TimeUp {
            secret: secret.to_string(),
        }));
        self.end_round_locked(&mut state).await;
        TickOutcome::Stop
    }

    async fn start_round_locked(&self, state: &mut SessionState) {
        if state.round.is_some() {
            return;
        }

        let secret = rules::pick_word(&mut rand::thread_rng());
        state.rounds_started += 1;
        let id = state.rounds_started;
        let time_left = self.config.round_seconds;
        state.round = Some(Round {
            id,
            secret,
            time_left,
        });
        for member in state.roster.values_mut() {
            member.guess_disabled = false;
        }
        info!("[{}] round {} started", self.code, id);

        state.broadcast(&ServerMessage::RoundStart);
        state.broadcast(&ServerMessage::Time(time_left));
        if let Some(drawer) = state.drawer {
            state.send_to(&drawer, &ServerMessage::Secret(secret.to_string()));
        }

        self.recorder.set_secret(secret);

        state.timer = Some(RoundTimer::start(
            self.me.clone(),
            id,
            self.config.tick_period(),
        ));
    }

    /// Ends the active round. Only the first call for a round has any effect,
    /// so `ROUND_END:Finished` is emitted once per round.
    async fn end_round_locked(&self, state: &mut SessionState) {
        let Some(round) = state.round.take() else {
            return;
        };
        let timer = state.timer.take();

        let scores = self
            .recorder
            .scores(self.config.scores_timeout())
            .await
            .unwrap_or_else(|| state.in_memory_scores());

        state.broadcast(&ServerMessage::RoundEnd(RoundEnd::Finished));
        state.broadcast(&ServerMessage::Scores(scores.clone()));
        info!("[{}] round {} finished, scores: {:?}", self.code, round.id, scores);

        if let Some(timer) = timer {
            timer.cancel();
        }
    }

    pub async fn member_count(&self) -> usize {
        self.state.lock().await.members.len()
    }

    pub async fn drawer_name(&self) -> Option<String> {
        let state = self.state.lock().await;
        let drawer = state.drawer?;
        state.roster.get(&drawer).map(|m| m.username.clone())
    }

    pub async fn role_of(&self, id: Uuid) -> Option<Role> {
        self.state.lock().await.roster.get(&id).map(|m| m.role)
    }

    pub async fn is_round_active(&self) -> bool {
        self.state.lock().await.round.is_some()
    }

    pub async fn time_left(&self) -> Option<u32> {
        self.state.lock().await.round.as_ref().map(|r| r.time_left)
    }

    pub async fn is_timer_running(&self) -> bool {
        self.state.lock().await.timer.is_some()
    }

    #[cfg(test)]
    async fn set_round(&self, secret: &'static str, time_left: u32) {
        let mut state = self.state.lock().await;
        if let Some(round) = state.round.as_mut() {
            round.secret = secret;
            round.time_left = time_left;
        }
    }
}
