use super::StreamError;
use crate::events::Tick;

/// Lifecycle of one streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Closed,
}

/// What a pull does in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Produce a chunk and stay in `Streaming`.
    Produce,
    /// The horizon was crossed; the stream moves to `Closed`.
    Close,
    /// Nothing to do: not started yet, or already closed.
    Ignore,
}

impl StreamState {
    pub fn initialize(self) -> Result<Self, StreamError> {
        match self {
            StreamState::Idle => Ok(StreamState::Streaming),
            other => Err(StreamError::AlreadyStarted(other)),
        }
    }

    pub fn on_request(self, tick: Tick, horizon: Tick) -> (Self, Transition) {
        match self {
            StreamState::Streaming if tick > horizon => (StreamState::Closed, Transition::Close),
            StreamState::Streaming => (StreamState::Streaming, Transition::Produce),
            other => (other, Transition::Ignore),
        }
    }

    pub fn is_closed(self) -> bool {
        self == StreamState::Closed
    }
}
