//! Transcript aggregation and agent sessions for Warden.

mod aggregator;
pub mod control;
mod session;
mod stdio;

pub use aggregator::{Aggregator, TranscriptRecord, collect, reduce, run_prompt};
pub use control::{ControlError, ControlHandler};
pub use session::ScriptedSession;
pub use stdio::{SessionConfig, StdioSession};
