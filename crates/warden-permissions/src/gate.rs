//! In-process permission gates.
//!
//! A gate is consulted synchronously, once per proposed tool call, and must
//! answer without yielding.

use crate::matcher::RuleMatcher;
use crate::types::{GateRule, PermissionDecision, RuleLevel};

/// The tool denied by default: the agent's built-in, unsandboxed shell.
pub const DEFAULT_DENIED_TOOL: &str = "Bash";

/// Message returned when the legacy tool is denied.
pub const DEFAULT_DENY_REASON: &str = "use the sandboxed tool instead";

/// Synchronous policy callback invoked per tool call.
pub trait PermissionGate: Send + Sync {
    /// Decide whether `tool_name` may run with `tool_input`.
    fn decide(&self, tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision;
}

impl<G: PermissionGate + ?Sized> PermissionGate for Box<G> {
    fn decide(&self, tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision {
        (**self).decide(tool_name, tool_input)
    }
}

/// Denies one named legacy tool and allows everything else unmodified.
#[derive(Debug, Clone)]
pub struct LegacyToolGate {
    denied_tool: String,
    message: String,
}

impl LegacyToolGate {
    pub fn new(denied_tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            denied_tool: denied_tool.into(),
            message: message.into(),
        }
    }

    pub fn denied_tool(&self) -> &str {
        &self.denied_tool
    }
}

impl Default for LegacyToolGate {
    fn default() -> Self {
        Self::new(DEFAULT_DENIED_TOOL, DEFAULT_DENY_REASON)
    }
}

impl PermissionGate for LegacyToolGate {
    fn decide(&self, tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision {
        if tool_name == self.denied_tool {
            tracing::debug!(tool = tool_name, "gate denied legacy tool");
            PermissionDecision::deny(self.message.as_str(), true)
        } else {
            PermissionDecision::allow(tool_input.clone())
        }
    }
}

/// Allows every tool call unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughGate;

impl PermissionGate for PassThroughGate {
    fn decide(&self, _tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision {
        PermissionDecision::allow(tool_input.clone())
    }
}

/// Evaluates configured rules after a base gate has allowed the call.
///
/// Deny beats allow; a call no rule matches keeps the base gate's answer.
pub struct RuleGate<G> {
    base: G,
    rules: Vec<GateRule>,
}

impl<G: PermissionGate> RuleGate<G> {
    pub fn new(base: G, rules: Vec<GateRule>) -> Self {
        Self { base, rules }
    }
}

impl<G: PermissionGate> PermissionGate for RuleGate<G> {
    fn decide(&self, tool_name: &str, tool_input: &serde_json::Value) -> PermissionDecision {
        let decision = self.base.decide(tool_name, tool_input);
        if !decision.is_allow() {
            return decision;
        }

        match RuleMatcher::evaluate(&self.rules, tool_name, tool_input) {
            Some(result) if result.level == RuleLevel::Deny => {
                tracing::debug!(tool = tool_name, rule = %result.description, "gate rule denied");
                PermissionDecision::deny(
                    format!("Tool '{tool_name}' blocked by {}", result.description),
                    false,
                )
            }
            _ => decision,
        }
    }
}
