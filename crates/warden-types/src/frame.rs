//! Frames emitted by an agent session and the blocks they carry.

use serde::{Deserialize, Serialize};

/// One message emitted by a session.
///
/// Frames arrive as newline-delimited JSON objects discriminated by `"type"`.
/// Only assistant frames and the terminal `result` frame matter to Warden;
/// everything else (`system`, `user`, `stream_event`, ...) decodes to
/// [`Frame::Other`] and is skipped by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Assistant { message: AssistantMessage },
    Result(TerminalFrame),
    #[serde(other)]
    Other,
}

impl Frame {
    /// Build an assistant frame from its blocks.
    pub fn assistant(content: Vec<Block>) -> Self {
        Frame::Assistant {
            message: AssistantMessage {
                content,
                model: None,
            },
        }
    }

    /// Build a bare terminal frame.
    pub fn terminal() -> Self {
        Frame::Result(TerminalFrame::default())
    }
}

/// Body of an assistant frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The final frame of a prompt exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    /// Final result text, when the agent produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// A block of content within an assistant frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default = "empty_object")]
        input: serde_json::Value,
    },
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Option<ToolResultContent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Any block type this crate does not know about (thinking, images, ...).
    #[serde(other)]
    Unknown,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    pub fn tool_use(
        name: impl Into<String>,
        id: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Block::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(content: ToolResultContent) -> Self {
        Block::ToolResult {
            tool_use_id: None,
            content: Some(content),
            is_error: None,
        }
    }
}

/// Content of a tool result: either a plain string or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl From<&str> for ToolResultContent {
    fn from(text: &str) -> Self {
        ToolResultContent::Text(text.to_string())
    }
}

impl ToolResultContent {
    /// Flatten the content into a single string.
    ///
    /// A list of parts becomes each object part's `"text"` field joined with
    /// single spaces. An object part without a string `"text"` contributes an
    /// empty fragment; parts that are not objects contribute nothing.
    pub fn flatten(&self) -> String {
        match self {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.as_object())
                .map(|part| part.get("text").and_then(|t| t.as_str()).unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A tool invocation observed in the stream. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}
