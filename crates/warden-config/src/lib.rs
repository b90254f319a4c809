//! Layered TOML configuration for Warden.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > project file > global file > defaults

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use warden_core::SessionConfig;
use warden_permissions::{
    Authorizer, GateRule, HookRelay, LegacyToolGate, PassThroughGate, PermissionGate, RuleGate,
    Strategy, ValidatorConfig,
    gate::{DEFAULT_DENIED_TOOL, DEFAULT_DENY_REASON},
};
use warden_types::ConfigError;

/// Name of the per-project config file, looked up in the working directory.
pub const PROJECT_FILE: &str = ".warden.toml";

/// Environment variable naming the validator command.
pub const ENV_VALIDATOR: &str = "WARDEN_VALIDATOR";

/// Environment variable selecting the authorization strategy.
pub const ENV_STRATEGY: &str = "WARDEN_STRATEGY";

/// Resolved configuration for a Warden process.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    pub strategy: Strategy,
    /// Tool the gate denies outright. Empty disables the legacy-tool check.
    pub denied_tool: String,
    pub deny_message: String,
    pub gate_rules: Vec<GateRule>,
    pub validator: Option<ValidatorConfig>,
    pub session: SessionConfig,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub authorization: AuthorizationSettings,
    #[serde(default)]
    pub gate: GateSettings,
    #[serde(default)]
    pub validator: ValidatorSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationSettings {
    pub strategy: Option<Strategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSettings {
    pub denied_tool: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub rules: Vec<GateRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorSettings {
    pub command: Option<String>,
    pub subcommand: Option<String>,
    pub matcher: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub env_remove: Option<Vec<String>>,
    pub cwd: Option<PathBuf>,
}

impl SettingsFile {
    /// Layer `higher` over `self`. Scalars from `higher` win; gate rules and
    /// session environment accumulate, with `higher` taking precedence.
    pub fn merge(self, higher: SettingsFile) -> SettingsFile {
        let mut rules = higher.gate.rules;
        rules.extend(self.gate.rules);

        let mut env = self.session.env;
        env.extend(higher.session.env);

        SettingsFile {
            authorization: AuthorizationSettings {
                strategy: higher.authorization.strategy.or(self.authorization.strategy),
            },
            gate: GateSettings {
                denied_tool: higher.gate.denied_tool.or(self.gate.denied_tool),
                message: higher.gate.message.or(self.gate.message),
                rules,
            },
            validator: ValidatorSettings {
                command: higher.validator.command.or(self.validator.command),
                subcommand: higher.validator.subcommand.or(self.validator.subcommand),
                matcher: higher.validator.matcher.or(self.validator.matcher),
                timeout_ms: higher.validator.timeout_ms.or(self.validator.timeout_ms),
            },
            session: SessionSettings {
                command: higher.session.command.or(self.session.command),
                args: higher.session.args.or(self.session.args),
                env,
                env_remove: higher.session.env_remove.or(self.session.env_remove),
                cwd: higher.session.cwd.or(self.session.cwd),
            },
        }
    }
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub strategy: Option<String>,
    pub validator: Option<String>,
    pub agent_command: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl WardenConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`WARDEN_VALIDATOR`, `WARDEN_STRATEGY`)
    /// 3. Project config (`./.warden.toml`)
    /// 4. Global config (`~/.warden/config.toml`)
    /// 5. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let global = load_settings_file(&config_dir.join("config.toml"));
        let project_root = overrides.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        let project = load_settings_file(&project_root.join(PROJECT_FILE));

        Self::resolve(
            global.merge(project),
            |key| std::env::var(key).ok(),
            overrides,
            config_dir,
        )
    }

    /// Resolve merged file settings against the environment and CLI flags.
    pub fn resolve(
        mut settings: SettingsFile,
        env: impl Fn(&str) -> Option<String>,
        overrides: CliOverrides,
        config_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        // Strategy: CLI > env > file > default
        let strategy = match overrides.strategy.or_else(|| env(ENV_STRATEGY)) {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "authorization.strategy".into(),
                message,
            })?,
            None => settings.authorization.strategy.unwrap_or_default(),
        };

        // Validator command: CLI > env > file
        let validator_command = overrides
            .validator
            .or_else(|| env(ENV_VALIDATOR))
            .or(settings.validator.command.take())
            .filter(|c| !c.trim().is_empty());
        let validator = match validator_command {
            Some(command) => Some(resolve_validator(command, settings.validator)?),
            None => None,
        };

        if strategy != Strategy::Local && validator.is_none() {
            return Err(ConfigError::InvalidValue {
                key: "validator.command".into(),
                message: format!(
                    "strategy '{}' needs a validator (set {ENV_VALIDATOR} or [validator] command)",
                    strategy.as_str()
                ),
            });
        }

        let defaults = SessionConfig::default();
        let mut session_env = defaults.env;
        session_env.extend(settings.session.env);
        let session = SessionConfig {
            command: overrides
                .agent_command
                .or(settings.session.command)
                .unwrap_or(defaults.command),
            args: settings.session.args.unwrap_or(defaults.args),
            env: session_env,
            env_remove: settings.session.env_remove.unwrap_or(defaults.env_remove),
            cwd: overrides.cwd.or(settings.session.cwd),
        };

        Ok(WardenConfig {
            strategy,
            denied_tool: settings
                .gate
                .denied_tool
                .unwrap_or_else(|| DEFAULT_DENIED_TOOL.to_string()),
            deny_message: settings
                .gate
                .message
                .unwrap_or_else(|| DEFAULT_DENY_REASON.to_string()),
            gate_rules: settings.gate.rules,
            validator,
            session,
            config_dir,
        })
    }

    /// The in-process gate described by the `[gate]` section.
    pub fn build_gate(&self) -> Box<dyn PermissionGate> {
        let base: Box<dyn PermissionGate> = if self.denied_tool.is_empty() {
            Box::new(PassThroughGate)
        } else {
            Box::new(LegacyToolGate::new(
                self.denied_tool.clone(),
                self.deny_message.clone(),
            ))
        };
        if self.gate_rules.is_empty() {
            base
        } else {
            Box::new(RuleGate::new(base, self.gate_rules.clone()))
        }
    }

    /// Build the authorizer for the configured strategy.
    pub fn build_authorizer(&self) -> Result<Authorizer, ConfigError> {
        let relay = self
            .validator
            .clone()
            .map(HookRelay::new)
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "validator.matcher".into(),
                message: e.to_string(),
            })?;

        Authorizer::new(self.strategy, self.build_gate(), relay).map_err(|e| {
            ConfigError::InvalidValue {
                key: "authorization.strategy".into(),
                message: e.to_string(),
            }
        })
    }
}

fn resolve_validator(
    command: String,
    settings: ValidatorSettings,
) -> Result<ValidatorConfig, ConfigError> {
    let mut config = ValidatorConfig::new(command);
    if let Some(subcommand) = settings.subcommand {
        config.subcommand = subcommand;
    }
    if let Some(matcher) = settings.matcher {
        config.matcher = matcher;
    }
    if let Some(timeout_ms) = settings.timeout_ms {
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "validator.timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        config.timeout_ms = timeout_ms;
    }
    Ok(config)
}

/// Get the Warden config directory path (~/.warden/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WARDEN_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".warden")
}

/// Parse TOML settings, attributing errors to `path`.
pub fn parse_settings(path: &Path, content: &str) -> Result<SettingsFile, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_settings(path, &content).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_permissions::{PermissionDecision, RuleLevel};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn resolve(settings: SettingsFile) -> Result<WardenConfig, ConfigError> {
        WardenConfig::resolve(settings, no_env, CliOverrides::default(), PathBuf::from("/cfg"))
    }

    #[test]
    fn test_defaults() {
        let config = resolve(SettingsFile::default()).unwrap();
        assert_eq!(config.strategy, Strategy::Local);
        assert_eq!(config.denied_tool, "Bash");
        assert_eq!(config.deny_message, "use the sandboxed tool instead");
        assert!(config.validator.is_none());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.config_dir, PathBuf::from("/cfg"));
    }

    #[test]
    fn test_full_settings_toml_parse() {
        let toml_str = r#"
[authorization]
strategy = "layered"

[gate]
denied_tool = "Bash"
message = "use mcp__lite-sandbox__bash"

[[gate.rules]]
tool = "Write"
args = "file_path:/etc/*"
level = "deny"

[validator]
command = "/usr/local/bin/lite-sandbox"
subcommand = "preflight"
matcher = "Bash|Shell"
timeout_ms = 2500

[session]
command = "claude"
args = ["--output-format", "stream-json"]
env_remove = ["CLAUDECODE", "ANTHROPIC_LOG"]

[session.env]
SANDBOX = "1"
"#;
        let settings = parse_settings(Path::new("config.toml"), toml_str).unwrap();
        assert_eq!(settings.authorization.strategy, Some(Strategy::Layered));
        assert_eq!(settings.gate.rules.len(), 1);
        assert_eq!(settings.gate.rules[0].level, RuleLevel::Deny);
        assert_eq!(settings.gate.rules[0].args.as_deref(), Some("file_path:/etc/*"));

        let config = resolve(settings).unwrap();
        let validator = config.validator.unwrap();
        assert_eq!(validator.command, "/usr/local/bin/lite-sandbox");
        assert_eq!(validator.matcher, "Bash|Shell");
        assert_eq!(validator.timeout_ms, 2500);
        assert_eq!(config.session.args, vec!["--output-format", "stream-json"]);
        assert_eq!(config.session.env_remove, vec!["CLAUDECODE", "ANTHROPIC_LOG"]);
        assert_eq!(config.session.env.get("SANDBOX").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_settings(Path::new("/x/.warden.toml"), "[gate\n").unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, "/x/.warden.toml"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_strategy_in_file_is_parse_error() {
        let result = parse_settings(
            Path::new("config.toml"),
            "[authorization]\nstrategy = \"remote\"\n",
        );
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_project_overrides_global() {
        let global = parse_settings(
            Path::new("global"),
            r#"
[authorization]
strategy = "delegated"
[validator]
command = "global-validator"
timeout_ms = 3000
[[gate.rules]]
tool = "Read"
level = "allow"
[session.env]
A = "global"
B = "global"
"#,
        )
        .unwrap();
        let project = parse_settings(
            Path::new("project"),
            r#"
[validator]
command = "project-validator"
[[gate.rules]]
tool = "Write"
level = "deny"
[session.env]
B = "project"
"#,
        )
        .unwrap();

        let merged = global.merge(project);
        assert_eq!(merged.authorization.strategy, Some(Strategy::Delegated));
        assert_eq!(merged.validator.command.as_deref(), Some("project-validator"));
        assert_eq!(merged.validator.timeout_ms, Some(3000));
        let tools: Vec<&str> = merged.gate.rules.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, vec!["Write", "Read"]);
        assert_eq!(merged.session.env["A"], "global");
        assert_eq!(merged.session.env["B"], "project");
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let settings = parse_settings(
            Path::new("config.toml"),
            "[authorization]\nstrategy = \"local\"\n[validator]\ncommand = \"file-validator\"\n",
        )
        .unwrap();
        let env = |key: &str| match key {
            ENV_STRATEGY => Some("delegated".to_string()),
            ENV_VALIDATOR => Some("env-validator".to_string()),
            _ => None,
        };

        let from_env = WardenConfig::resolve(
            settings.clone(),
            env,
            CliOverrides::default(),
            PathBuf::from("/cfg"),
        )
        .unwrap();
        assert_eq!(from_env.strategy, Strategy::Delegated);
        assert_eq!(from_env.validator.unwrap().command, "env-validator");

        let from_cli = WardenConfig::resolve(
            settings,
            env,
            CliOverrides {
                strategy: Some("layered".into()),
                validator: Some("cli-validator".into()),
                agent_command: Some("my-agent".into()),
                cwd: Some(PathBuf::from("/work")),
            },
            PathBuf::from("/cfg"),
        )
        .unwrap();
        assert_eq!(from_cli.strategy, Strategy::Layered);
        assert_eq!(from_cli.validator.unwrap().command, "cli-validator");
        assert_eq!(from_cli.session.command, "my-agent");
        assert_eq!(from_cli.session.cwd, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_invalid_env_strategy() {
        let env = |key: &str| (key == ENV_STRATEGY).then(|| "remote".to_string());
        let err = WardenConfig::resolve(
            SettingsFile::default(),
            env,
            CliOverrides::default(),
            PathBuf::from("/cfg"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "authorization.strategy"));
    }

    #[test]
    fn test_delegating_strategy_requires_validator() {
        let mut settings = SettingsFile::default();
        settings.authorization.strategy = Some(Strategy::Delegated);
        let err = resolve(settings).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "validator.command"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut settings = SettingsFile::default();
        settings.validator.command = Some("validator".into());
        settings.validator.timeout_ms = Some(0);
        assert!(matches!(
            resolve(settings),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "validator.timeout_ms"
        ));
    }

    #[test]
    fn test_gate_from_settings() {
        let mut settings = SettingsFile::default();
        settings.gate.rules.push(GateRule {
            tool: "Write".into(),
            args: Some("file_path:/etc/*".into()),
            level: RuleLevel::Deny,
        });
        let gate = resolve(settings).unwrap().build_gate();

        assert!(matches!(
            gate.decide("Bash", &json!({"command": "ls"})),
            PermissionDecision::Deny { interrupt: true, .. }
        ));
        assert!(matches!(
            gate.decide("Write", &json!({"file_path": "/etc/passwd"})),
            PermissionDecision::Deny { interrupt: false, .. }
        ));
        let input = json!({"file_path": "/tmp/x"});
        assert_eq!(gate.decide("Write", &input), PermissionDecision::allow(input.clone()));
    }

    #[test]
    fn test_empty_denied_tool_disables_legacy_check() {
        let mut settings = SettingsFile::default();
        settings.gate.denied_tool = Some(String::new());
        let gate = resolve(settings).unwrap().build_gate();
        assert!(gate.decide("Bash", &json!({})).is_allow());
    }

    #[test]
    fn test_build_authorizer() {
        let mut settings = SettingsFile::default();
        settings.authorization.strategy = Some(Strategy::Layered);
        settings.validator.command = Some("validator".into());
        let authorizer = resolve(settings).unwrap().build_authorizer().unwrap();
        assert_eq!(authorizer.strategy(), Strategy::Layered);
        assert_eq!(authorizer.relay().unwrap().config().command, "validator");
    }

    #[test]
    fn test_bad_matcher_rejected_at_build() {
        let mut settings = SettingsFile::default();
        settings.validator.command = Some("validator".into());
        settings.validator.matcher = Some("[".into());
        let config = resolve(settings).unwrap();
        assert!(matches!(
            config.build_authorizer(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "validator.matcher"
        ));
    }
}
