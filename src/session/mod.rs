// Assistant session orchestration
//
// Ties the capture pipeline, session channel, transcript log, playback
// scheduler and marker overlay together under one lifecycle: start
// acquires everything, stop releases everything deterministically.

pub mod config;
pub mod session;
pub mod stats;

pub use config::{SessionConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION};
pub use session::AssistSession;
pub use stats::SessionStats;
