//! AI backend adapters for Chorus.
//!
//! Every adapter implements `chorus_core::AiProvider`. The registry builds
//! one adapter per configured credential and tracks which channel is pinned
//! to which backend.

pub mod anthropic;
pub mod gemini;
mod http;
pub mod openai;
pub mod registry;
pub mod summarize;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;
