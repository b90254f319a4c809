//! Answers the agent's permission control requests.
//!
//! The agent process asks before running a tool. Two request kinds are
//! handled:
//! - `can_use_tool`: answered synchronously by the in-process gate
//! - `hook_callback`: a registered pre-tool-use hook, forwarded to the
//!   validator and answered with its decision verbatim

use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use warden_permissions::{AuthorizeError, Authorizer, HookRequest, PermissionDecision, Strategy};

/// Callback id used when registering the validator hook with the agent.
pub const RELAY_CALLBACK_ID: &str = "warden_relay";

/// Errors from handling a single control request.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unsupported control request: {0}")]
    Unsupported(String),

    #[error("Malformed control request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Authorize(#[from] AuthorizeError),
}

impl ControlError {
    /// Whether the exchange must be aborted after reporting this error.
    ///
    /// Only unknown request kinds are survivable; anything touching an
    /// authorization decision fails closed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ControlError::Unsupported(_))
    }
}

/// Answers control requests on behalf of a session.
#[derive(Clone)]
pub struct ControlHandler {
    authorizer: Arc<Authorizer>,
    cwd: String,
}

impl ControlHandler {
    pub fn new(authorizer: Arc<Authorizer>, cwd: impl Into<String>) -> Self {
        Self {
            authorizer,
            cwd: cwd.into(),
        }
    }

    /// The `initialize` request registering the validator hook, if the
    /// strategy routes anything to the validator.
    pub fn initialize_request(&self, request_id: &str) -> Option<Value> {
        if self.authorizer.strategy() == Strategy::Local {
            return None;
        }
        let relay = self.authorizer.relay()?;
        Some(json!({
            "type": "control_request",
            "request_id": request_id,
            "request": {
                "subtype": "initialize",
                "hooks": {
                    "PreToolUse": [{
                        "matcher": relay.config().matcher,
                        "hookCallbackIds": [RELAY_CALLBACK_ID],
                    }]
                }
            }
        }))
    }

    /// Produce the response payload for one control request body.
    pub async fn handle(&self, request: &Value) -> Result<Value, ControlError> {
        let subtype = request
            .get("subtype")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        match subtype {
            "can_use_tool" => {
                let tool_name = request
                    .get("tool_name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ControlError::Malformed("can_use_tool without tool_name".into()))?;
                let input = request.get("input").cloned().unwrap_or_else(|| json!({}));
                let decision = self.authorizer.check_gate(tool_name, &input);
                Ok(permission_payload(&decision))
            }
            "hook_callback" => {
                let input = request.get("input").cloned().unwrap_or_else(|| json!({}));
                let mut hook_request: HookRequest = serde_json::from_value(input)
                    .map_err(|e| ControlError::Malformed(e.to_string()))?;
                if hook_request.cwd.is_empty() {
                    hook_request.cwd = self.cwd.clone();
                }
                let decision = self.authorizer.consult_validator(&hook_request).await?;
                Ok(decision.map(|d| d.0).unwrap_or_else(|| json!({})))
            }
            other => Err(ControlError::Unsupported(other.to_string())),
        }
    }
}

/// Render a decision in the agent's `can_use_tool` response shape.
pub fn permission_payload(decision: &PermissionDecision) -> Value {
    match decision {
        PermissionDecision::Allow { updated_input } => json!({
            "behavior": "allow",
            "updatedInput": updated_input,
        }),
        PermissionDecision::Deny { message, interrupt } => json!({
            "behavior": "deny",
            "message": message,
            "interrupt": interrupt,
        }),
    }
}

pub fn success_response(request_id: &str, payload: Value) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": payload,
        }
    })
}

pub fn error_response(request_id: &str, message: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "error",
            "request_id": request_id,
            "error": message,
        }
    })
}
