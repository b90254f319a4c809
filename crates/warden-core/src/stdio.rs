//! Drives an agent CLI over newline-delimited JSON.
//!
//! Prompts are written to the child's stdin as `user` messages; frames are
//! read from its stdout one line at a time. Control requests interleaved with
//! the frames are answered by the attached [`ControlHandler`] before reading
//! continues.

use crate::control::{ControlHandler, error_response, success_response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use warden_types::{Frame, FrameStream, Session, TransportError};

/// How to launch the agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Extra environment for the agent process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Variables removed from the agent's environment. The parent's own
    /// environment is never touched.
    #[serde(default = "default_env_remove")]
    pub env_remove: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: default_args(),
            env: HashMap::new(),
            env_remove: default_env_remove(),
            cwd: None,
        }
    }
}

fn default_args() -> Vec<String> {
    [
        "--output-format",
        "stream-json",
        "--input-format",
        "stream-json",
        "--verbose",
        "--permission-prompt-tool",
        "stdio",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_env_remove() -> Vec<String> {
    vec!["CLAUDECODE".to_string()]
}

/// A session backed by a child agent process.
pub struct StdioSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    controller: Option<ControlHandler>,
    next_request_id: u64,
}

impl StdioSession {
    /// Spawn the agent process. When a controller is attached and it routes
    /// tools to the validator, the hook registration is sent immediately.
    pub async fn connect(
        config: &SessionConfig,
        controller: Option<ControlHandler>,
    ) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for key in &config.env_remove {
            cmd.env_remove(key);
        }
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| TransportError::Spawn {
            command: config.command.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .map(|stdout| BufReader::new(stdout).lines());

        let mut session = Self {
            child,
            stdin,
            stdout,
            controller,
            next_request_id: 0,
        };

        let request_id = session.request_id();
        let init = session
            .controller
            .as_ref()
            .and_then(|c| c.initialize_request(&request_id));
        if let Some(init) = init {
            session.write_line(&init).await?;
        }

        tracing::debug!(command = %config.command, "agent session started");
        Ok(session)
    }

    fn request_id(&mut self) -> String {
        let id = format!("req_{}", self.next_request_id);
        self.next_request_id += 1;
        id
    }

    async fn write_line(&mut self, value: &Value) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Exhausted)?;
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read until the next frame, answering control requests on the way.
    /// `None` means the agent closed its stdout.
    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            let lines = self.stdout.as_mut().ok_or(TransportError::Exhausted)?;
            let Some(line) = lines.next_line().await? else {
                self.stdout = None;
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line).map_err(|e| decode_error(e, line))?;
            match value.get("type").and_then(|t| t.as_str()) {
                Some("control_request") => self.answer_control(&value).await?,
                Some("control_response") | Some("control_cancel_request") => {}
                _ => {
                    return serde_json::from_value(value)
                        .map(Some)
                        .map_err(|e| decode_error(e, line));
                }
            }
        }
    }

    async fn answer_control(&mut self, message: &Value) -> Result<(), TransportError> {
        let request_id = message
            .get("request_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let request = message.get("request").cloned().unwrap_or_else(|| json!({}));

        let Some(controller) = self.controller.clone() else {
            let reply = error_response(&request_id, "no permission controller attached");
            return self.write_line(&reply).await;
        };

        match controller.handle(&request).await {
            Ok(payload) => self.write_line(&success_response(&request_id, payload)).await,
            Err(e) => {
                let reply = error_response(&request_id, &e.to_string());
                self.write_line(&reply).await?;
                if e.is_fatal() {
                    return Err(TransportError::Authorization(e.to_string()));
                }
                tracing::debug!(error = %e, "ignored control request");
                Ok(())
            }
        }
    }

    /// Close stdin, give the agent a moment to exit, then kill it.
    pub async fn close(mut self) {
        drop(self.stdin.take());
        let graceful = tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await;
        if graceful.is_err() {
            let _ = self.child.kill().await;
        }
    }
}

fn decode_error(e: serde_json::Error, line: &str) -> TransportError {
    TransportError::Decode {
        message: e.to_string(),
        line: line.to_string(),
    }
}

impl Session for StdioSession {
    fn query<'a>(
        &'a mut self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let message = json!({
                "type": "user",
                "message": { "role": "user", "content": prompt },
                "parent_tool_use_id": null,
                "session_id": "default",
            });
            self.write_line(&message).await
        })
    }

    fn receive_response(&mut self) -> FrameStream<'_> {
        Box::pin(futures_util::stream::unfold(Some(self), |state| async move {
            let session = state?;
            match session.next_frame().await {
                Ok(Some(frame)) => {
                    let terminal = matches!(frame, Frame::Result(_));
                    Some((Ok(frame), (!terminal).then_some(session)))
                }
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        }))
    }
}
