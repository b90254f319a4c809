//! Core types for the permission system.

use serde::{Deserialize, Serialize};

/// Message returned when a deny carries no explanation of its own.
pub const DEFAULT_DENY_MESSAGE: &str = "Tool call denied by policy";

/// The result of authorizing a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionDecision {
    /// Tool call may proceed with the (possibly rewritten) input.
    Allow { updated_input: serde_json::Value },
    /// Tool call is refused. `message` is never empty.
    Deny { message: String, interrupt: bool },
}

impl PermissionDecision {
    pub fn allow(updated_input: serde_json::Value) -> Self {
        PermissionDecision::Allow { updated_input }
    }

    /// Build a deny, substituting [`DEFAULT_DENY_MESSAGE`] for a blank message.
    pub fn deny(message: impl Into<String>, interrupt: bool) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_DENY_MESSAGE.to_string()
        } else {
            message
        };
        PermissionDecision::Deny { message, interrupt }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, PermissionDecision::Allow { .. })
    }
}

/// A pending tool invocation awaiting authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub cwd: String,
}

impl ToolRequest {
    pub fn new(
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        cwd: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_input,
            cwd: cwd.into(),
        }
    }
}

/// JSON payload written to the validator's stdin.
///
/// Field order is fixed: `tool_name`, `tool_input`, `cwd`. Deserializing a
/// payload with missing fields yields empty defaults, which is how the
/// `hook` command accepts whatever the agent sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRequest {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default = "empty_object", deserialize_with = "object_or_empty")]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub cwd: String,
}

impl Default for HookRequest {
    fn default() -> Self {
        Self {
            tool_name: String::new(),
            tool_input: empty_object(),
            cwd: String::new(),
        }
    }
}

impl HookRequest {
    /// The exact bytes written to the validator's stdin.
    ///
    /// Separators are `", "` and `": "`, so `(Bash, {"command":"ls"}, /tmp)`
    /// encodes as `{"tool_name": "Bash", "tool_input": {"command": "ls"}, "cwd": "/tmp"}`.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        self.serialize(&mut ser)?;
        Ok(out)
    }
}

/// Single-line JSON with a space after every `,` and `:`.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}

impl From<&ToolRequest> for HookRequest {
    fn from(request: &ToolRequest) -> Self {
        Self {
            tool_name: request.tool_name.clone(),
            tool_input: if request.tool_input.is_null() {
                empty_object()
            } else {
                request.tool_input.clone()
            },
            cwd: request.cwd.clone(),
        }
    }
}

impl From<HookRequest> for ToolRequest {
    fn from(request: HookRequest) -> Self {
        ToolRequest::new(request.tool_name, request.tool_input, request.cwd)
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(if value.is_null() { empty_object() } else { value })
}

/// Whatever the validator printed, parsed but otherwise untouched.
///
/// An empty decision means the validator had no opinion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookDecision(pub serde_json::Value);

impl HookDecision {
    /// The pass-through decision: `{}`.
    pub fn empty() -> Self {
        HookDecision(empty_object())
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for HookDecision {
    fn from(value: serde_json::Value) -> Self {
        HookDecision(value)
    }
}

/// Level applied by a gate rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Allow,
    Deny,
}

impl RuleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLevel::Allow => "allow",
            RuleLevel::Deny => "deny",
        }
    }
}

/// A gate rule matching a tool + optional argument pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRule {
    /// Tool name or glob pattern (e.g., "Bash", "mcp__*").
    pub tool: String,
    /// Optional argument matcher in `field_name:glob_pattern` format
    /// (e.g., "command:git *", "file_path:/etc/*").
    #[serde(default)]
    pub args: Option<String>,
    pub level: RuleLevel,
}

/// How tool calls are authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// In-process gate only.
    #[default]
    Local,
    /// External validator only.
    Delegated,
    /// Gate first; validator for matching tools the gate allowed.
    Layered,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Local => "local",
            Strategy::Delegated => "delegated",
            Strategy::Layered => "layered",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Strategy::Local),
            "delegated" => Ok(Strategy::Delegated),
            "layered" => Ok(Strategy::Layered),
            other => Err(format!(
                "unknown strategy '{other}' (expected local, delegated or layered)"
            )),
        }
    }
}

/// Configuration for the external validator process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Validator executable.
    pub command: String,
    /// The single argument the validator is invoked with.
    #[serde(default = "default_subcommand")]
    pub subcommand: String,
    /// Tool names routed to the validator (`|`-separated, globs allowed).
    #[serde(default = "default_matcher")]
    pub matcher: String,
    /// Timeout in milliseconds (default: 10000).
    #[serde(default = "default_validator_timeout")]
    pub timeout_ms: u64,
}

impl ValidatorConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            subcommand: default_subcommand(),
            matcher: default_matcher(),
            timeout_ms: default_validator_timeout(),
        }
    }
}

fn default_subcommand() -> String {
    "preflight".to_string()
}

fn default_matcher() -> String {
    "Bash".to_string()
}

fn default_validator_timeout() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deny_never_has_empty_message() {
        match PermissionDecision::deny("", false) {
            PermissionDecision::Deny { message, .. } => assert_eq!(message, DEFAULT_DENY_MESSAGE),
            other => panic!("expected deny, got {other:?}"),
        }
        match PermissionDecision::deny("   ", true) {
            PermissionDecision::Deny { message, interrupt } => {
                assert!(!message.trim().is_empty());
                assert!(interrupt);
            }
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[test]
    fn test_hook_request_serializes_in_fixed_order() {
        let request = HookRequest::from(&ToolRequest::new("Bash", json!({"command": "ls"}), "/tmp"));
        assert_eq!(
            String::from_utf8(request.to_wire().unwrap()).unwrap(),
            r#"{"tool_name": "Bash", "tool_input": {"command": "ls"}, "cwd": "/tmp"}"#
        );
    }

    #[test]
    fn test_wire_encoding_spaces_nested_values() {
        let request = HookRequest::from(&ToolRequest::new(
            "Write",
            json!({"file_path": "/tmp/a", "lines": [1, 2], "meta": {}, "empty": []}),
            "",
        ));
        let wire = String::from_utf8(request.to_wire().unwrap()).unwrap();
        assert_eq!(
            wire,
            r#"{"tool_name": "Write", "tool_input": {"file_path": "/tmp/a", "lines": [1, 2], "meta": {}, "empty": []}, "cwd": ""}"#
        );
        let back: HookRequest = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_hook_request_defaults_missing_fields() {
        let request: HookRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, HookRequest::default());
        assert_eq!(request.tool_input, json!({}));

        let request: HookRequest =
            serde_json::from_str(r#"{"tool_name":"Bash","tool_input":null}"#).unwrap();
        assert_eq!(request.tool_name, "Bash");
        assert_eq!(request.tool_input, json!({}));
        assert_eq!(request.cwd, "");
    }

    #[test]
    fn test_null_tool_input_becomes_empty_object() {
        let request = HookRequest::from(&ToolRequest::new("Bash", serde_json::Value::Null, ""));
        assert_eq!(request.tool_input, json!({}));
    }

    #[test]
    fn test_hook_decision_emptiness() {
        assert!(HookDecision::empty().is_empty());
        assert!(HookDecision::default().is_empty());
        assert!(!HookDecision(json!({"decision": "block"})).is_empty());
    }

    #[test]
    fn test_validator_config_defaults() {
        let config: ValidatorConfig =
            serde_json::from_value(json!({"command": "/bin/validator"})).unwrap();
        assert_eq!(config, ValidatorConfig::new("/bin/validator"));
        assert_eq!(config.subcommand, "preflight");
        assert_eq!(config.matcher, "Bash");
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn test_strategy_parses_case_insensitively() {
        assert_eq!("layered".parse::<Strategy>(), Ok(Strategy::Layered));
        assert_eq!(" Delegated ".parse::<Strategy>(), Ok(Strategy::Delegated));
        assert!("remote".parse::<Strategy>().unwrap_err().contains("remote"));
        assert_eq!(Strategy::default().as_str(), "local");
    }
}
