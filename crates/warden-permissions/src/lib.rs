//! Permission gate, validator hook relay and authorizer for Warden.
//!
//! Decisions: allow (possibly with rewritten input) / deny (message + interrupt)
//! Strategies: local gate / delegated validator / layered

pub mod engine;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod relay;
pub mod types;

pub use engine::{Authorizer, interpret};
pub use error::{AuthorizeError, RelayError};
pub use gate::{LegacyToolGate, PassThroughGate, PermissionGate, RuleGate};
pub use matcher::{EvaluateResult, RuleMatcher, ToolMatcher};
pub use relay::HookRelay;
pub use types::*;
