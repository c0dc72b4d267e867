//! Per-channel conversation state.

use crate::message::ConversationEntry;
use tokio::time::Instant;

/// Opaque backend continuation data (e.g. reasoning carry-over tokens).
///
/// Only the adapter named by `provider_id` may interpret `payload`; everyone
/// else threads it through unexamined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub provider_id: String,
    pub payload: String,
}

impl Continuation {
    pub fn new(provider_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            payload: payload.into(),
        }
    }

    /// The payload, if it was produced by `provider_id`.
    pub fn payload_for(&self, provider_id: &str) -> Option<&str> {
        (self.provider_id == provider_id).then_some(self.payload.as_str())
    }
}

/// The live conversation of one channel.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// The provider this conversation's developer prompt was built for
    pub provider_id: String,

    /// Ordered entries, oldest first
    pub entries: Vec<ConversationEntry>,

    /// When the state was last written or touched
    pub last_touched: Instant,

    pub continuation: Option<Continuation>,
}

impl ConversationState {
    pub fn new(provider_id: impl Into<String>, entries: Vec<ConversationEntry>) -> Self {
        Self {
            provider_id: provider_id.into(),
            entries,
            last_touched: Instant::now(),
            continuation: None,
        }
    }

    pub fn with_continuation(mut self, continuation: Option<Continuation>) -> Self {
        self.continuation = continuation;
        self
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }
}
