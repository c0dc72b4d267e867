//! Error taxonomy.
//!
//! Backends, channels and tools each get their own enum. A turn collapses
//! them into [`Error`], which the orchestrator answers with an apology.

use thiserror::Error;

/// Anything that can end a turn early.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed call to a model backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Backend returned HTTP {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by the backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Backend rejected the credentials: {0}")]
    AuthenticationFailed(String),

    #[error("Unexpected backend response: {0}")]
    InvalidResponse(String),

    #[error("Backend does not support {0}")]
    Unsupported(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Channel is not set up: {0}")]
    NotConfigured(String),

    #[error("Could not deliver to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Chat platform returned HTTP {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Lost the channel: {0}")]
    ConnectionLost(String),

    #[error("Chat platform sent an unreadable payload: {0}")]
    InvalidPayload(String),
}

/// A host tool that could not produce its result.
///
/// The orchestrator turns these into tool result text, never into an apology.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Bad arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors raised by the provider registry.
///
/// The Display text is surfaced verbatim to the model when a provider switch
/// is rejected, so it names the ids that would have been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Provider \"{requested}\" is not registered. Available providers: {}.", .available.join(", "))]
    NotRegistered {
        requested: String,
        available: Vec<String>,
    },
}

/// Why a summarize request produced no summary.
///
/// Validation variants are user input problems; their Display text is what
/// the model reads back as the tool result.
#[derive(Debug, Clone, Error)]
pub enum SummarizeError {
    #[error("Invalid timestamp \"{0}\". Use ISO 8601 (e.g. 2024-01-01T12:00:00Z).")]
    InvalidTimestamp(String),

    #[error("The maximum timeframe for a summary is 7 days.")]
    WindowTooLarge,

    #[error("The start time must be before the end time.")]
    InvertedWindow,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl SummarizeError {
    /// Validation failures are answered with text; the rest are real errors.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimestamp(_) | Self::WindowTooLarge | Self::InvertedWindow
        )
    }
}
