//! Claude over the Messages API (`POST /v1/messages`).
//!
//! Instruction entries are lifted into the top-level `system` field and
//! consecutive same-role entries are merged, since the API wants strictly
//! alternating turns. Tool calls travel as `tool_use` / `tool_result` blocks.
//! With extended thinking on, signed thinking blocks ride along as
//! continuation data and are replayed before the `tool_use` they preceded.

use async_trait::async_trait;
use chorus_core::channel::{ChannelId, ChatChannel};
use chorus_core::conversation::Continuation;
use chorus_core::error::{ProviderError, SummarizeError};
use chorus_core::message::{ContentPart, ConversationEntry, Role, ToolCall};
use chorus_core::provider::{
    AiProvider, ChatRequest, ChatResponse, MessageSummarizer, ProviderToolDefinition, ToolChoice,
    ToolKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::debug;

use crate::{http, summarize};

pub const PROVIDER_ID: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_PERSONALITY: &str = "You are warm and thoughtful. You take a moment to \
consider other points of view and you are honest when you are unsure.";

/// No image capability here, so `generate_image` is never offered.
const HOST_TOOLS: [&str; 2] = ["summarize_messages", "switch_provider"];

/// The Claude backend.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    personality: String,
    tools: Vec<ProviderToolDefinition>,
    client: reqwest::Client,
    /// Budget tokens for extended thinking (disabled when `None`).
    thinking_budget: Option<u32>,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            personality: DEFAULT_PERSONALITY.into(),
            tools: Vec::new(),
            // Anthropic can be slow with thinking
            client: http::client(std::time::Duration::from_secs(300)),
            thinking_budget: None,
        }
    }

    /// Point at another host, e.g. a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    pub fn with_host_tools(mut self, definitions: &[ProviderToolDefinition]) -> Self {
        self.tools = definitions
            .iter()
            .filter(|d| HOST_TOOLS.contains(&d.name.as_str()))
            .cloned()
            .collect();
        self
    }

    /// Turn on extended thinking with the given token budget.
    pub fn with_extended_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = Some(budget_tokens);
        self
    }

    /// Instruction entries joined into the top-level system prompt.
    fn extract_system(entries: &[ConversationEntry]) -> Option<String> {
        let parts: Vec<String> = entries
            .iter()
            .filter_map(ConversationEntry::as_message)
            .filter(|m| m.role.is_instruction())
            .map(|m| m.text())
            .collect();

        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// Convert entries to Anthropic messages.
    ///
    /// Consecutive entries with the same role merge into one message, so a run
    /// of tool results becomes a single user turn.
    fn to_api_messages(entries: &[ConversationEntry], carry: &ThinkingCarry) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for entry in entries {
            let (role, blocks) = match entry {
                ConversationEntry::Message(message) if message.role.is_instruction() => continue,
                ConversationEntry::Message(message) => {
                    let role = if message.role == Role::Assistant { "assistant" } else { "user" };
                    let blocks = message
                        .normalized_content()
                        .into_iter()
                        .map(|part| match part {
                            ContentPart::Text { text } => ContentBlock::Text { text },
                            ContentPart::Image { url } => ContentBlock::Image {
                                source: json!({ "type": "url", "url": url }),
                            },
                        })
                        .collect();
                    (role, blocks)
                }
                ConversationEntry::ToolCall(call) => {
                    let mut blocks = carry.before_call.get(&call.id).cloned().unwrap_or_default();
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: Value::Object(call.arguments.clone()),
                    });
                    ("assistant", blocks)
                }
                ConversationEntry::ToolResult(tool_result) => (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: tool_result.id.clone(),
                        content: tool_result.content.clone(),
                    }],
                ),
            };

            match result.last_mut() {
                Some(last) if last.role == role => last.content.extend(blocks),
                _ => result.push(AnthropicMessage {
                    role: role.into(),
                    content: blocks,
                }),
            }
        }

        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ProviderToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .filter(|t| t.kind == ToolKind::Function)
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t
                    .parameters
                    .clone()
                    .unwrap_or_else(|| json!({ "type": "object" })),
            })
            .collect()
    }

    /// Convert an Anthropic API response to a normalized response.
    fn normalize(
        resp: AnthropicResponse,
        mut carry: ThinkingCarry,
        history: &[ConversationEntry],
    ) -> ChatResponse {
        let mut text_content = String::new();
        let mut tool_calls = Vec::new();
        let mut pending_thinking = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => {
                    if !text_content.is_empty() {
                        text_content.push('\n');
                    }
                    text_content.push_str(&text);
                }
                ResponseContentBlock::ToolUse { id, name, input } => {
                    let arguments = match input {
                        Value::Object(map) => map,
                        Value::Null => Map::new(),
                        other => ToolCall::parse_arguments(&name, &other.to_string()),
                    };
                    if !pending_thinking.is_empty() {
                        carry
                            .before_call
                            .insert(id.clone(), std::mem::take(&mut pending_thinking));
                    }
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments,
                    });
                }
                ResponseContentBlock::Thinking {
                    thinking,
                    signature,
                } => pending_thinking.push(ContentBlock::Thinking {
                    thinking,
                    signature,
                }),
                ResponseContentBlock::RedactedThinking { data } => {
                    pending_thinking.push(ContentBlock::RedactedThinking { data })
                }
                ResponseContentBlock::Other => {}
            }
        }

        let live = http::call_ids(history);
        carry
            .before_call
            .retain(|id, _| live.contains(id.as_str()) || tool_calls.iter().any(|c| &c.id == id));

        ChatResponse::from_parts(Some(text_content), tool_calls, carry.into_continuation())
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "Claude"
    }

    fn personality(&self) -> &str {
        &self.personality
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn tools(&self) -> &[ProviderToolDefinition] {
        &self.tools
    }

    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let carry = ThinkingCarry::from_continuation(request.continuation.as_ref());
        let system = Self::extract_system(&request.entries);
        let api_messages = Self::to_api_messages(&request.entries, &carry);

        let max_tokens = DEFAULT_MAX_TOKENS + self.thinking_budget.unwrap_or(0);

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": max_tokens,
        });

        if let Some(ref sys) = system {
            body["system"] = json!(sys);
        }

        let tools = Self::to_api_tools(&request.tools);
        if !tools.is_empty() {
            body["tools"] = json!(tools);
            body["tool_choice"] = match request.tool_choice {
                ToolChoice::Auto => json!({ "type": "auto" }),
                ToolChoice::None => json!({ "type": "none" }),
            };
        }

        if let Some(budget) = self.thinking_budget {
            body["thinking"] = json!({
                "type": "enabled",
                "budget_tokens": budget
            });
        }

        debug!(provider = PROVIDER_ID, model = %self.model, "Sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(http::network_error)?;
        let response = http::check_status(PROVIDER_ID, response).await?;
        let api_resp: AnthropicResponse = http::json_body(PROVIDER_ID, response).await?;

        Ok(Self::normalize(api_resp, carry, &request.entries))
    }

    fn summarizer(&self) -> Option<&dyn MessageSummarizer> {
        Some(self)
    }
}

#[async_trait]
impl MessageSummarizer for AnthropicProvider {
    async fn summarize_messages(
        &self,
        channel: &dyn ChatChannel,
        channel_id: &ChannelId,
        start_time: &str,
        end_time: &str,
    ) -> std::result::Result<String, SummarizeError> {
        summarize::summarize_window(self, channel, channel_id, start_time, end_time).await
    }
}

/// Thinking blocks keyed by the tool_use they preceded.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ThinkingCarry {
    #[serde(default)]
    before_call: HashMap<String, Vec<ContentBlock>>,
}

impl ThinkingCarry {
    fn from_continuation(continuation: Option<&Continuation>) -> Self {
        continuation
            .and_then(|c| c.payload_for(PROVIDER_ID))
            .and_then(|payload| serde_json::from_str(payload).ok())
            .unwrap_or_default()
    }

    fn into_continuation(self) -> Option<Continuation> {
        if self.before_call.is_empty() {
            return None;
        }
        let payload = serde_json::to_string(&self).ok()?;
        Some(Continuation::new(PROVIDER_ID, payload))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: Value },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(rename = "thinking")]
    Thinking { thinking: String, signature: String },
    #[serde(rename = "redacted_thinking")]
    RedactedThinking { data: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },
    #[serde(rename = "redacted_thinking")]
    RedactedThinking { data: String },
    #[serde(other)]
    Other,
}
