//! Tool-name and argument matching for gate rules and the validator matcher.

use crate::types::{GateRule, RuleLevel};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// Result of evaluating rules: the winning level + a human-readable description.
#[derive(Debug, Clone)]
pub struct EvaluateResult {
    pub level: RuleLevel,
    pub description: String,
}

/// Evaluates whether a `GateRule` matches a given tool call.
pub struct RuleMatcher;

impl RuleMatcher {
    /// Check if a rule matches the given tool name and input.
    ///
    /// Tool name matching: exact string or glob (e.g., `*`, `mcp__*`).
    /// Argument matching: `field_name:glob_pattern` format
    /// (e.g., `command:git *`, `file_path:/etc/*`).
    pub fn matches(rule: &GateRule, tool_name: &str, tool_input: &serde_json::Value) -> bool {
        if !matches_glob(&rule.tool, tool_name) {
            return false;
        }

        if let Some(ref args_pattern) = rule.args {
            if !Self::matches_args(args_pattern, tool_input) {
                return false;
            }
        }

        true
    }

    /// Find the winning rule among those that match. Deny beats allow.
    pub fn evaluate(
        rules: &[GateRule],
        tool_name: &str,
        tool_input: &serde_json::Value,
    ) -> Option<EvaluateResult> {
        let matching: Vec<&GateRule> = rules
            .iter()
            .filter(|r| Self::matches(r, tool_name, tool_input))
            .collect();

        let winner = matching
            .iter()
            .find(|r| r.level == RuleLevel::Deny)
            .or_else(|| matching.first())?;

        Some(EvaluateResult {
            level: winner.level,
            description: Self::describe_rule(winner),
        })
    }

    fn describe_rule(rule: &GateRule) -> String {
        match &rule.args {
            Some(args) => format!("rule: {} [{}] -> {}", rule.tool, args, rule.level.as_str()),
            None => format!("rule: {} -> {}", rule.tool, rule.level.as_str()),
        }
    }

    fn matches_args(args_pattern: &str, tool_input: &serde_json::Value) -> bool {
        let Some((field_name, glob_pattern)) = args_pattern.split_once(':') else {
            return false;
        };

        match tool_input.get(field_name) {
            Some(serde_json::Value::String(s)) => matches_glob(glob_pattern, s),
            _ => false,
        }
    }
}

fn matches_glob(pattern: &str, value: &str) -> bool {
    if pattern == "*" || pattern == value {
        return true;
    }
    match GlobBuilder::new(pattern).case_insensitive(false).build() {
        Ok(glob) => glob.compile_matcher().is_match(value),
        // Unparseable patterns only match exactly, checked above
        Err(_) => false,
    }
}

/// Selects which tool names are routed to the validator.
///
/// The pattern is a `|`-separated list of exact names or globs, e.g.
/// `"Bash"`, `"Bash|Write"`, `"mcp__*"`. `"*"` matches every tool.
#[derive(Debug, Clone)]
pub struct ToolMatcher {
    pattern: String,
    exact: Vec<String>,
    globs: GlobSet,
}

impl ToolMatcher {
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let mut exact = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for alt in pattern.split('|').map(str::trim).filter(|a| !a.is_empty()) {
            if alt.contains(['*', '?', '[', '{']) {
                builder.add(Glob::new(alt)?);
            } else {
                exact.push(alt.to_string());
            }
        }
        Ok(Self {
            pattern: pattern.to_string(),
            exact,
            globs: builder.build()?,
        })
    }

    pub fn is_match(&self, tool_name: &str) -> bool {
        self.exact.iter().any(|name| name == tool_name) || self.globs.is_match(tool_name)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
