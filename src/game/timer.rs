use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::game::session::{GameSession, RoundId};

/// Whether the round clock keeps running after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Count-down task for one round.
///
/// The task holds only a weak reference to its session and stops on the
/// first of: `cancel`, the timer being dropped, the session going away, or
/// the session reporting that the round is over.
#[derive(Debug)]
pub struct RoundTimer {
    round: RoundId,
    cancel: oneshot::Sender<()>,
}

impl RoundTimer {
    pub fn start(session: Weak<GameSession>, round: RoundId, period: Duration) -> Self {
        let (cancel, cancelled) = oneshot::channel();
        tokio::spawn(run(session, round, period, cancelled));
        Self { round, cancel }
    }

    /// Stops the clock. Consumes the timer, so a round's clock can only be
    /// cancelled once.
    pub fn cancel(self) {
        // The task may already have returned (for example on time-up).
        let _ = self.cancel.send(());
        debug!("Round {} timer cancelled", self.round);
    }
}

async fn run(
    session: Weak<GameSession>,
    round: RoundId,
    period: Duration,
    mut cancelled: oneshot::Receiver<()>,
) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut cancelled => break,
            _ = ticks.tick() => {
                let Some(session) = session.upgrade() else {
                    break;
                };
                if session.tick(round).await == TickOutcome::Stop {
                    break;
                }
            }
        }
    }

    debug!("Round {} timer stopped", round);
}
