//! # Chorus Core
//!
//! Domain types, traits, and error definitions for the Chorus chat agent.
//! This crate has **no backend dependencies**: it defines the conversation
//! model and the seams (providers, channels, tools) that every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the orchestrator is a trait here. Implementations
//! live in their respective crates, so the agent loop can be driven against
//! scripted providers and in-memory channels in tests.

pub mod channel;
pub mod conversation;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Attachment, Author, ChannelId, ChatChannel, ChatMessage, GeneratedImage};
pub use conversation::{ConversationState, Continuation};
pub use error::{
    ChannelError, Error, ProviderError, RegistryError, Result, SummarizeError, ToolError,
};
pub use message::{ContentPart, ConversationEntry, Message, Role, ToolCall, ToolResult};
pub use provider::{
    AiProvider, ChatRequest, ChatResponse, ImageGenerator, LocalImageGenerator,
    MessageSummarizer, ProviderToolDefinition, ToolChoice, ToolKind,
};
pub use tool::{ProviderSwitch, Tool, ToolCatalog, ToolContext};
