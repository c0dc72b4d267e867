//! AiProvider trait: the abstraction over model backends.
//!
//! An adapter translates the normalized conversation into its backend's
//! request format, issues the request, and normalizes the reply back into
//! [`ConversationEntry`] values. Optional capabilities (summarizing a channel,
//! generating images) are exposed as separate traits the adapter may hand out.
//!
//! Implementations: OpenAI Responses, Gemini generateContent, Anthropic Messages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::channel::{ChannelId, ChatChannel, GeneratedImage};
use crate::conversation::Continuation;
use crate::error::{ProviderError, SummarizeError, ToolError};
use crate::message::{ConversationEntry, ToolCall};
use crate::tool::ToolContext;

/// The kind of a tool a backend is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Function,
    WebSearch,
    CodeInterpreter,
}

/// A tool as advertised to one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderToolDefinition {
    /// Join key against the host tool catalog
    pub name: String,

    pub kind: ToolKind,

    #[serde(default)]
    pub description: String,

    /// JSON Schema of the arguments (function tools only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    /// Executed by the host (true) or resolved natively by the backend (false)
    pub host_handled: bool,
}

impl ProviderToolDefinition {
    /// A function tool that the host executes.
    pub fn host_function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ToolKind::Function,
            description: description.into(),
            parameters: Some(parameters),
            host_handled: true,
        }
    }

    /// A tool the backend resolves on its own before replying.
    pub fn native(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            parameters: None,
            host_handled: false,
        }
    }
}

/// Whether the model may request tools on this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    /// Force a textual answer
    None,
}

/// A normalized chat request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub entries: Vec<ConversationEntry>,
    pub tools: Vec<ProviderToolDefinition>,
    pub tool_choice: ToolChoice,
    /// Continuation data from an earlier call, if any
    pub continuation: Option<Continuation>,
}

/// A normalized chat response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Plain assistant text, if the backend produced any
    pub text: Option<String>,

    /// Function calls requested by the model, in backend order
    pub tool_calls: Vec<ToolCall>,

    /// One tool_call entry per requested call, then the text message (if any)
    pub output_entries: Vec<ConversationEntry>,

    pub continuation: Option<Continuation>,
}

impl ChatResponse {
    /// Build a response and its audit trail of output entries.
    pub fn from_parts(
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
        continuation: Option<Continuation>,
    ) -> Self {
        let text = text.filter(|t| !t.trim().is_empty());
        let mut output_entries: Vec<ConversationEntry> = tool_calls
            .iter()
            .cloned()
            .map(ConversationEntry::ToolCall)
            .collect();
        if let Some(text) = &text {
            output_entries.push(ConversationEntry::assistant(text.clone()));
        }
        Self {
            text,
            tool_calls,
            output_entries,
            continuation,
        }
    }
}

/// The core AiProvider trait.
///
/// Adapters are registered once at startup and are immutable afterwards.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Registry key (e.g., "openai", "gemini").
    fn id(&self) -> &str;

    /// Name shown to users.
    fn display_name(&self) -> &str;

    /// Personality text woven into the developer prompt.
    fn personality(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Every tool this adapter advertises to its backend.
    fn tools(&self) -> &[ProviderToolDefinition];

    /// Send the conversation and normalize the reply.
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError>;

    fn summarizer(&self) -> Option<&dyn MessageSummarizer> {
        None
    }

    /// Direct image generation that delivers the image itself.
    fn image_generator(&self) -> Option<&dyn ImageGenerator> {
        None
    }

    /// Byte-level image generation with optional refinement of a prior image.
    fn local_image_generator(&self) -> Option<&dyn LocalImageGenerator> {
        None
    }

    /// Whether a requested function call is one the host must execute.
    fn is_host_handled(&self, tool_name: &str) -> bool {
        self.tools()
            .iter()
            .any(|t| t.host_handled && t.name == tool_name)
    }
}

/// Summarize a window of a channel's history.
#[async_trait]
pub trait MessageSummarizer: Send + Sync {
    /// Timestamps are ISO 8601 strings exactly as the model supplied them.
    async fn summarize_messages(
        &self,
        channel: &dyn ChatChannel,
        channel_id: &ChannelId,
        start_time: &str,
        end_time: &str,
    ) -> std::result::Result<String, SummarizeError>;
}

/// Generate an image and deliver it to the requesting channel.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns a short machine-readable confirmation, never the image.
    async fn generate_image(
        &self,
        ctx: &ToolContext,
        prompt: &str,
    ) -> std::result::Result<String, ToolError>;
}

/// Produce image bytes, optionally refining a previously generated image.
#[async_trait]
pub trait LocalImageGenerator: Send + Sync {
    async fn render(
        &self,
        prompt: &str,
        previous: Option<&GeneratedImage>,
    ) -> std::result::Result<GeneratedImage, ProviderError>;
}
