//! Reduces a session's frames into a transcript.

use futures_util::{Stream, StreamExt};
use warden_types::{Block, Frame, Session, TerminalFrame, ToolCall, TransportError};

/// Everything observed during one prompt exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptRecord {
    /// Tool calls in global emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Text blocks joined with newlines.
    pub text: String,
    /// Tool results, each flattened to one string.
    pub tool_results: Vec<String>,
    /// The terminal frame, absent if the stream simply ran out.
    pub terminal: Option<TerminalFrame>,
}

impl TranscriptRecord {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|c| c.name.as_str()).collect()
    }

    /// Transcript text followed by all tool results, space-joined.
    pub fn combined_output(&self) -> String {
        let mut out = self.text.clone();
        out.push_str(&self.tool_results.join(" "));
        out
    }
}

/// Folds frames into a [`TranscriptRecord`] one at a time.
#[derive(Debug, Default)]
pub struct Aggregator {
    tool_calls: Vec<ToolCall>,
    text_blocks: Vec<String>,
    tool_results: Vec<String>,
    terminal: Option<TerminalFrame>,
    frames_seen: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one frame. Returns `true` once the terminal frame has been seen;
    /// callers must stop feeding frames at that point.
    pub fn push(&mut self, frame: Frame) -> bool {
        self.frames_seen += 1;
        match frame {
            Frame::Assistant { message } => {
                for block in message.content {
                    self.push_block(block);
                }
                false
            }
            Frame::Result(terminal) => {
                self.terminal = Some(terminal);
                true
            }
            Frame::Other => false,
        }
    }

    fn push_block(&mut self, block: Block) {
        match block {
            Block::Text { text } => self.text_blocks.push(text),
            Block::ToolUse { id, name, input } => {
                self.tool_calls.push(ToolCall { id, name, input });
            }
            Block::ToolResult { content, .. } => {
                let flattened = content.map(|c| c.flatten()).unwrap_or_default();
                self.tool_results.push(flattened);
            }
            Block::Unknown => {}
        }
    }

    pub fn finish(self) -> TranscriptRecord {
        tracing::debug!(
            frames = self.frames_seen,
            tool_calls = ?self.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            terminal = self.terminal.is_some(),
            "transcript complete"
        );
        TranscriptRecord {
            tool_calls: self.tool_calls,
            text: self.text_blocks.join("\n"),
            tool_results: self.tool_results,
            terminal: self.terminal,
        }
    }
}

/// Reduce an already-captured frame sequence.
///
/// Frames after the first terminal frame are ignored.
pub fn reduce<I>(frames: I) -> TranscriptRecord
where
    I: IntoIterator<Item = Frame>,
{
    let mut aggregator = Aggregator::new();
    for frame in frames {
        if aggregator.push(frame) {
            break;
        }
    }
    aggregator.finish()
}

/// Consume a frame stream until a terminal frame or exhaustion.
///
/// The first stream error is returned as-is; nothing partial is kept.
pub async fn collect<S>(mut stream: S) -> Result<TranscriptRecord, TransportError>
where
    S: Stream<Item = Result<Frame, TransportError>> + Unpin,
{
    let mut aggregator = Aggregator::new();
    while let Some(frame) = stream.next().await {
        if aggregator.push(frame?) {
            break;
        }
    }
    Ok(aggregator.finish())
}

/// Send `prompt` on `session` and aggregate the response.
pub async fn run_prompt<S>(session: &mut S, prompt: &str) -> Result<TranscriptRecord, TransportError>
where
    S: Session + ?Sized,
{
    session.query(prompt).await?;
    collect(session.receive_response()).await
}
