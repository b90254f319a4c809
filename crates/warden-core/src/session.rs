//! In-memory session that replays captured frames.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use warden_types::{Frame, FrameStream, Session, TransportError};

/// A session that answers each prompt with the next scripted response.
///
/// Used for replaying captured transcripts and in tests. Each response is
/// handed out once; asking for a response with none queued yields
/// [`TransportError::Exhausted`].
#[derive(Debug, Default)]
pub struct ScriptedSession {
    responses: VecDeque<Vec<Result<Frame, String>>>,
    current: Option<Vec<Result<Frame, String>>>,
    prompts: Vec<String>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the frames returned for the next prompt.
    pub fn with_response(mut self, frames: Vec<Frame>) -> Self {
        self.responses
            .push_back(frames.into_iter().map(Ok).collect());
        self
    }

    /// Queue a response whose stream fails with a decode error after `frames`.
    pub fn with_failing_response(mut self, frames: Vec<Frame>, error: impl Into<String>) -> Self {
        let mut items: Vec<Result<Frame, String>> = frames.into_iter().map(Ok).collect();
        items.push(Err(error.into()));
        self.responses.push_back(items);
        self
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Session for ScriptedSession {
    fn query<'a>(
        &'a mut self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.prompts.push(prompt.to_string());
            self.current = self.responses.pop_front();
            Ok(())
        })
    }

    fn receive_response(&mut self) -> FrameStream<'_> {
        let items: Vec<Result<Frame, TransportError>> = match self.current.take() {
            Some(items) => items
                .into_iter()
                .map(|item| {
                    item.map_err(|message| TransportError::Decode {
                        message,
                        line: String::new(),
                    })
                })
                .collect(),
            None => vec![Err(TransportError::Exhausted)],
        };
        Box::pin(futures_util::stream::iter(items))
    }
}
