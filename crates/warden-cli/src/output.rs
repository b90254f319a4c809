//! Rendering of transcripts and decisions for the terminal and for hooks.

use serde_json::{Value, json};
use warden_core::TranscriptRecord;
use warden_permissions::PermissionDecision;

const SUMMARY_WIDTH: usize = 60;

/// The PreToolUse hook answer for `decision`, or `None` when the call is
/// allowed with its input untouched.
pub fn hook_output(decision: &PermissionDecision, original_input: &Value) -> Option<Value> {
    match decision {
        PermissionDecision::Allow { updated_input } if updated_input == original_input => None,
        PermissionDecision::Allow { updated_input } => Some(json!({
            "hookSpecificOutput": {
                "hookEventName": "PreToolUse",
                "permissionDecision": "allow",
                "updatedInput": updated_input,
            }
        })),
        PermissionDecision::Deny { message, interrupt } => {
            let mut out = json!({
                "hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "deny",
                    "permissionDecisionReason": message,
                }
            });
            if *interrupt {
                out["continue"] = json!(false);
                out["stopReason"] = json!(message);
            }
            Some(out)
        }
    }
}

/// Deny emitted when authorization itself failed.
pub fn hook_failure(error: &str) -> Value {
    json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": "deny",
            "permissionDecisionReason": format!("warden: {error}"),
        }
    })
}

/// Decision as printed by `warden check`.
pub fn decision_json(decision: &PermissionDecision) -> Value {
    match decision {
        PermissionDecision::Allow { updated_input } => json!({
            "decision": "allow",
            "updated_input": updated_input,
        }),
        PermissionDecision::Deny { message, interrupt } => json!({
            "decision": "deny",
            "message": message,
            "interrupt": interrupt,
        }),
    }
}

pub fn transcript_json(record: &TranscriptRecord) -> Value {
    json!({
        "text": record.text,
        "tool_calls": record.tool_calls,
        "tool_results": record.tool_results,
        "terminal": record.terminal,
    })
}

/// Human-readable transcript, one line per tool call and result.
pub fn transcript_text(record: &TranscriptRecord) -> String {
    let mut lines = Vec::new();
    if !record.text.is_empty() {
        lines.push(record.text.clone());
    }
    for call in &record.tool_calls {
        let summary = summarize_input(&call.input);
        if summary.is_empty() {
            lines.push(format!("  [tool: {}]", call.name));
        } else {
            lines.push(format!("  [tool: {}] {summary}", call.name));
        }
    }
    for result in &record.tool_results {
        lines.push(format!("  [result] {}", truncate(result)));
    }
    lines.join("\n")
}

/// One-line footer describing how the exchange ended.
pub fn terminal_summary(record: &TranscriptRecord) -> String {
    let Some(terminal) = &record.terminal else {
        return "session ended without a result frame".to_string();
    };
    let mut parts = vec![terminal.subtype.clone().unwrap_or_else(|| "done".into())];
    if let Some(turns) = terminal.num_turns {
        parts.push(format!("{turns} turns"));
    }
    if let Some(ms) = terminal.duration_ms {
        parts.push(format!("{ms} ms"));
    }
    if let Some(cost) = terminal.total_cost_usd {
        parts.push(format!("${cost:.4}"));
    }
    if terminal.is_error {
        parts.push("error".into());
    }
    parts.join(", ")
}

fn summarize_input(input: &Value) -> String {
    match input {
        Value::Object(map) => map
            .iter()
            .take(3)
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}: {}", truncate(s)),
                other => format!("{k}: {}", truncate(&other.to_string())),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(SUMMARY_WIDTH) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::{TerminalFrame, ToolCall};

    #[test]
    fn test_unchanged_allow_prints_nothing() {
        let input = json!({"command": "ls"});
        assert!(hook_output(&PermissionDecision::allow(input.clone()), &input).is_none());
    }

    #[test]
    fn test_modified_allow_carries_updated_input() {
        let out = hook_output(
            &PermissionDecision::allow(json!({"command": "ls -1"})),
            &json!({"command": "ls"}),
        )
        .unwrap();
        assert_eq!(out["hookSpecificOutput"]["permissionDecision"], "allow");
        assert_eq!(out["hookSpecificOutput"]["updatedInput"]["command"], "ls -1");
    }

    #[test]
    fn test_deny_without_interrupt_keeps_session_going() {
        let out = hook_output(&PermissionDecision::deny("use sandbox", false), &json!({})).unwrap();
        assert_eq!(
            out,
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "deny",
                    "permissionDecisionReason": "use sandbox",
                }
            })
        );
    }

    #[test]
    fn test_interrupting_deny_stops_the_agent() {
        let out = hook_output(&PermissionDecision::deny("stop", true), &json!({})).unwrap();
        assert_eq!(out["continue"], false);
        assert_eq!(out["stopReason"], "stop");
    }

    #[test]
    fn test_failure_is_rendered_as_deny() {
        let out = hook_failure("validator timed out");
        assert_eq!(out["hookSpecificOutput"]["permissionDecision"], "deny");
        assert_eq!(
            out["hookSpecificOutput"]["permissionDecisionReason"],
            "warden: validator timed out"
        );
    }

    #[test]
    fn test_transcript_lines() {
        let record = TranscriptRecord {
            tool_calls: vec![ToolCall {
                id: "1".into(),
                name: "mcp__lite-sandbox__bash".into(),
                input: json!({"command": "ls"}),
            }],
            text: "listing".into(),
            tool_results: vec!["go.mod  main.go".into()],
            terminal: None,
        };
        assert_eq!(
            transcript_text(&record),
            "listing\n  [tool: mcp__lite-sandbox__bash] command: ls\n  [result] go.mod  main.go"
        );
        assert_eq!(terminal_summary(&record), "session ended without a result frame");
    }

    #[test]
    fn test_terminal_summary_fields() {
        let record = TranscriptRecord {
            terminal: Some(TerminalFrame {
                subtype: Some("success".into()),
                num_turns: Some(2),
                duration_ms: Some(1500),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(terminal_summary(&record), "success, 2 turns, 1500 ms");
    }

    #[test]
    fn test_long_values_are_truncated_on_char_boundary() {
        let long = "é".repeat(100);
        let out = truncate(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), SUMMARY_WIDTH + 3);
    }
}
