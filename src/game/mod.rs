//! Game core: per-code sessions, their round clock and the registry that
//! hands them out.

pub mod recorder;
pub mod registry;
pub mod rules;
pub mod session;
pub mod timer;

pub use recorder::ScoreRecorder;
pub use registry::SessionRegistry;
pub use session::GameSession;
pub use timer::RoundTimer;
