//! Delegates a pending tool call to an external validator process.
//!
//! Protocol:
//! - the validator is spawned with exactly one argument (the subcommand)
//! - the serialized [`HookRequest`] is written to its stdin, then stdin is closed
//! - all of stdout is captured until exit; stderr is discarded
//! - trimmed stdout that is empty means "no opinion"; otherwise it must be one
//!   JSON object, which is returned verbatim
//!
//! The exit code is logged but never consulted: stdout alone decides.

use crate::error::RelayError;
use crate::matcher::ToolMatcher;
use crate::types::{HookDecision, HookRequest, ValidatorConfig};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Relays tool calls matching the configured matcher to the validator.
#[derive(Debug, Clone)]
pub struct HookRelay {
    config: ValidatorConfig,
    matcher: ToolMatcher,
}

impl HookRelay {
    pub fn new(config: ValidatorConfig) -> Result<Self, RelayError> {
        let matcher = ToolMatcher::new(&config.matcher).map_err(|e| RelayError::Matcher {
            pattern: config.matcher.clone(),
            source: e,
        })?;
        Ok(Self { config, matcher })
    }

    /// Whether `tool_name` is routed to the validator.
    pub fn matches(&self, tool_name: &str) -> bool {
        self.matcher.is_match(tool_name)
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run one validator exchange for `request`.
    ///
    /// Spawns a fresh child per call. The child is killed if it outlives
    /// the configured timeout.
    pub async fn relay(&self, request: &HookRequest) -> Result<HookDecision, RelayError> {
        let payload = request.to_wire()?;
        let command = &self.config.command;

        let mut child = tokio::process::Command::new(command)
            .arg(&self.config.subcommand)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelayError::Spawn {
                command: command.clone(),
                source: e,
            })?;

        tracing::debug!(
            validator = %command,
            tool = %request.tool_name,
            "relaying tool call to validator"
        );

        // Write stdin and drain stdout concurrently: the validator may start
        // answering before it has read the whole request.
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let exchange = async move {
            let write = async move {
                match stdin {
                    Some(mut stdin) => write_request(&mut stdin, &payload).await,
                    None => Ok(()),
                }
            };
            let read = async move {
                let mut buf = Vec::new();
                if let Some(mut stdout) = stdout {
                    stdout.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(buf)
            };
            let (written, captured) = tokio::join!(write, read);
            written?;
            let captured = captured?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, captured))
        };

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let (status, stdout) = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result?,
            // Dropping the exchange drops the child, which kills it
            Err(_) => {
                return Err(RelayError::Timeout {
                    command: command.clone(),
                    timeout_ms: self.config.timeout_ms,
                });
            }
        };

        if !status.success() {
            tracing::warn!(
                validator = %command,
                status = %status,
                "validator exited unsuccessfully; using its stdout anyway"
            );
        }

        decode_decision(command, &stdout)
    }
}

/// Write the request and close stdin. A validator that exits without
/// reading its input is not an error; its stdout still decides.
async fn write_request(
    stdin: &mut tokio::process::ChildStdin,
    payload: &[u8],
) -> Result<(), std::io::Error> {
    let result = async {
        stdin.write_all(payload).await?;
        stdin.shutdown().await
    }
    .await;
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Turn captured validator stdout into a decision.
pub fn decode_decision(command: &str, stdout: &[u8]) -> Result<HookDecision, RelayError> {
    let malformed = |message: String| RelayError::ProtocolDecode {
        command: command.to_string(),
        message,
        output: String::from_utf8_lossy(stdout).into_owned(),
    };

    let text = std::str::from_utf8(stdout).map_err(|e| malformed(e.to_string()))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(HookDecision::empty());
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a JSON object".to_string()));
    }
    Ok(HookDecision(value))
}
