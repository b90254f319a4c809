//! The single entry point for tool-call authorization.
//!
//! Wraps the in-process gate and the validator relay behind one interface.
//! Which of the two is consulted is decided by the configured [`Strategy`].

use crate::error::AuthorizeError;
use crate::gate::PermissionGate;
use crate::relay::HookRelay;
use crate::types::*;

/// Authorizes tool calls using the configured strategy.
pub struct Authorizer {
    strategy: Strategy,
    gate: Option<Box<dyn PermissionGate>>,
    relay: Option<HookRelay>,
}

impl Authorizer {
    /// Build an authorizer. Strategies that delegate require a relay.
    pub fn new(
        strategy: Strategy,
        gate: Box<dyn PermissionGate>,
        relay: Option<HookRelay>,
    ) -> Result<Self, AuthorizeError> {
        if strategy != Strategy::Local && relay.is_none() {
            return Err(AuthorizeError::MissingValidator {
                strategy: strategy.as_str().to_string(),
            });
        }
        Ok(Self {
            strategy,
            gate: Some(gate),
            relay,
        })
    }

    /// Gate only.
    pub fn local(gate: Box<dyn PermissionGate>) -> Self {
        Self {
            strategy: Strategy::Local,
            gate: Some(gate),
            relay: None,
        }
    }

    /// Validator only.
    pub fn delegated(relay: HookRelay) -> Self {
        Self {
            strategy: Strategy::Delegated,
            gate: None,
            relay: Some(relay),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn relay(&self) -> Option<&HookRelay> {
        self.relay.as_ref()
    }

    /// Ask the in-process gate. Synchronous; never yields.
    ///
    /// Under the delegated strategy there is no gate and every call is
    /// allowed unchanged here.
    pub fn check_gate(&self, tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision {
        match (&self.gate, self.strategy) {
            (Some(gate), Strategy::Local | Strategy::Layered) => gate.decide(tool_name, tool_input),
            _ => PermissionDecision::allow(tool_input.clone()),
        }
    }

    /// Send a request to the validator if the strategy and matcher route it there.
    ///
    /// Returns `None` when the validator is not consulted, otherwise its
    /// decision exactly as printed.
    pub async fn consult_validator(
        &self,
        request: &HookRequest,
    ) -> Result<Option<HookDecision>, AuthorizeError> {
        if self.strategy == Strategy::Local {
            return Ok(None);
        }
        let Some(relay) = self.relay.as_ref().filter(|r| r.matches(&request.tool_name)) else {
            return Ok(None);
        };

        let decision = relay.relay(request).await?;
        tracing::debug!(
            tool = %request.tool_name,
            pass_through = decision.is_empty(),
            "validator answered"
        );
        Ok(Some(decision))
    }

    /// Authorize a pending tool call.
    ///
    /// Evaluation order:
    /// 1. Local / Layered: the gate decides first; a deny is final.
    /// 2. Delegated / Layered: tools matching the relay's matcher are sent to
    ///    the validator, with the input the gate allowed.
    /// 3. Anything not denied is allowed.
    ///
    /// Validator failures are returned as errors, never as allows.
    pub async fn authorize(
        &self,
        request: &ToolRequest,
    ) -> Result<PermissionDecision, AuthorizeError> {
        let updated_input = match self.check_gate(&request.tool_name, &request.tool_input) {
            PermissionDecision::Allow { updated_input } => updated_input,
            deny => return Ok(deny),
        };

        let pending = HookRequest::from(&ToolRequest::new(
            request.tool_name.clone(),
            updated_input,
            request.cwd.clone(),
        ));
        match self.consult_validator(&pending).await? {
            Some(hook_decision) => Ok(interpret(&hook_decision, &pending.tool_input)),
            None => Ok(PermissionDecision::allow(pending.tool_input)),
        }
    }
}

/// Map a validator's verbatim decision onto a [`PermissionDecision`].
///
/// - `{}` means no opinion: allow `tool_input` unchanged.
/// - `hookSpecificOutput.permissionDecision` of `deny` or `ask` denies (there
///   is nobody to ask); `allow` allows, honouring `updatedInput` when present.
/// - Top-level `decision: "block"` denies, `decision: "approve"` allows.
/// - `continue: false` denies and interrupts the agent.
/// - Anything else is treated as no opinion.
pub fn interpret(decision: &HookDecision, tool_input: &serde_json::Value) -> PermissionDecision {
    let value = decision.as_value();
    let unchanged = || PermissionDecision::allow(tool_input.clone());

    if decision.is_empty() {
        return unchanged();
    }

    if value.get("continue").and_then(|v| v.as_bool()) == Some(false) {
        let reason = str_field(value, "stopReason").unwrap_or("Validator stopped the session");
        return PermissionDecision::deny(reason, true);
    }

    if let Some(specific) = value.get("hookSpecificOutput") {
        let reason = str_field(specific, "permissionDecisionReason").unwrap_or_default();
        match str_field(specific, "permissionDecision") {
            Some("deny") | Some("ask") => return PermissionDecision::deny(reason, false),
            Some("allow") => {
                let input = specific
                    .get("updatedInput")
                    .filter(|v| v.is_object())
                    .cloned()
                    .unwrap_or_else(|| tool_input.clone());
                return PermissionDecision::allow(input);
            }
            _ => {}
        }
    }

    match str_field(value, "decision") {
        Some("block") => {
            PermissionDecision::deny(str_field(value, "reason").unwrap_or_default(), false)
        }
        _ => unchanged(),
    }
}

fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}
