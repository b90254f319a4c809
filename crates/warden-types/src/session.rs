//! Session trait for bidirectional agent channels.

use crate::{Frame, TransportError};
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;

/// A boxed async stream of frames from an agent session.
pub type FrameStream<'a> = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send + 'a>>;

/// A channel to an autonomous agent capable of issuing tool calls.
///
/// Dyn-compatible so drivers can hold `Box<dyn Session>`. The stream returned
/// by `receive_response` is finite and cannot be restarted once exhausted.
pub trait Session: Send {
    /// Send a prompt to the agent.
    fn query<'a>(
        &'a mut self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Stream the frames produced in response to the last prompt.
    fn receive_response(&mut self) -> FrameStream<'_>;
}
