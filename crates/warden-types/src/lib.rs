//! Shared frame types, session trait and error hierarchy for Warden.

pub mod error;
pub mod frame;
pub mod session;

pub use error::{ConfigError, TransportError};
pub use frame::*;
pub use session::{FrameStream, Session};
