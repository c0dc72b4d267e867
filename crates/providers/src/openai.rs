//! OpenAI provider over the Responses API.
//!
//! Features:
//! - Bearer authentication
//! - Developer and system roles sent natively
//! - Host function tools plus native `web_search_preview` and `code_interpreter`
//! - Stateless requests (`store: false`) that carry encrypted reasoning items
//!   forward as continuation data
//! - Image generation, and refinement of a previous image, via the Images API

use async_trait::async_trait;
use base64::Engine;
use chorus_core::channel::{ChannelId, ChatChannel, GeneratedImage};
use chorus_core::conversation::Continuation;
use chorus_core::error::{ProviderError, SummarizeError};
use chorus_core::message::{ContentPart, ConversationEntry, Message, Role, ToolCall};
use chorus_core::provider::{
    AiProvider, ChatRequest, ChatResponse, LocalImageGenerator, MessageSummarizer,
    ProviderToolDefinition, ToolChoice, ToolKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

use crate::{http, summarize};

pub const PROVIDER_ID: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5-mini";
const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";
const DEFAULT_PERSONALITY: &str = "You are upbeat and curious, quick with a pun, and happy \
to dig into technical detail when someone asks for it.";

/// Host tools offered to this backend.
const HOST_TOOLS: [&str; 3] = ["summarize_messages", "generate_image", "switch_provider"];

/// OpenAI Responses API provider.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
    personality: String,
    tools: Vec<ProviderToolDefinition>,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            personality: DEFAULT_PERSONALITY.into(),
            tools: Self::native_tools(),
            client: http::client(std::time::Duration::from_secs(180)),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    /// Advertise the supported host tools, followed by the native ones.
    pub fn with_host_tools(mut self, definitions: &[ProviderToolDefinition]) -> Self {
        let mut tools: Vec<ProviderToolDefinition> = definitions
            .iter()
            .filter(|d| HOST_TOOLS.contains(&d.name.as_str()))
            .cloned()
            .collect();
        tools.extend(Self::native_tools());
        self.tools = tools;
        self
    }

    fn native_tools() -> Vec<ProviderToolDefinition> {
        vec![
            ProviderToolDefinition::native("web_search", ToolKind::WebSearch),
            ProviderToolDefinition::native("code_interpreter", ToolKind::CodeInterpreter),
        ]
    }

    /// Convert conversation entries to Responses API input items.
    fn to_input(entries: &[ConversationEntry], carry: &ReasoningCarry) -> Vec<Value> {
        let mut items = Vec::with_capacity(entries.len());

        for entry in entries {
            match entry {
                ConversationEntry::Message(message) => items.push(Self::message_item(message)),
                ConversationEntry::ToolCall(call) => {
                    // Reasoning must precede the call it produced
                    if let Some(reasoning) = carry.before_call.get(&call.id) {
                        items.extend(reasoning.iter().cloned());
                    }
                    items.push(json!({
                        "type": "function_call",
                        "call_id": call.id,
                        "name": call.name,
                        "arguments": call.arguments_json(),
                    }));
                }
                ConversationEntry::ToolResult(result) => items.push(json!({
                    "type": "function_call_output",
                    "call_id": result.id,
                    "output": result.content,
                })),
            }
        }

        items
    }

    fn message_item(message: &Message) -> Value {
        let role = match message.role {
            Role::System => "system",
            Role::Developer => "developer",
            Role::Assistant => "assistant",
            Role::User => "user",
        };
        let content: Vec<Value> = message
            .normalized_content()
            .into_iter()
            .map(|part| match (message.role, part) {
                (Role::Assistant, ContentPart::Text { text }) => {
                    json!({ "type": "output_text", "text": text })
                }
                (Role::Assistant, ContentPart::Image { url }) => {
                    json!({ "type": "output_text", "text": url })
                }
                (_, ContentPart::Text { text }) => json!({ "type": "input_text", "text": text }),
                (_, ContentPart::Image { url }) => {
                    json!({ "type": "input_image", "image_url": url })
                }
            })
            .collect();

        json!({ "type": "message", "role": role, "content": content })
    }

    /// Convert tool definitions to Responses API tools.
    fn to_api_tools(tools: &[ProviderToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| match t.kind {
                ToolKind::Function => json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters.clone().unwrap_or_else(|| json!({ "type": "object" })),
                    "strict": false,
                }),
                ToolKind::WebSearch => json!({ "type": "web_search_preview" }),
                ToolKind::CodeInterpreter => json!({
                    "type": "code_interpreter",
                    "container": { "type": "auto" },
                }),
            })
            .collect()
    }

    /// Normalize a Responses API reply.
    ///
    /// `carry` is the continuation the request was sent with; reasoning items
    /// for new calls are added and entries for calls no longer in history are
    /// dropped.
    fn normalize_output(
        resp: ResponsesResponse,
        mut carry: ReasoningCarry,
        history: &[ConversationEntry],
    ) -> ChatResponse {
        let mut text = resp.output_text.filter(|t| !t.trim().is_empty());
        let mut tool_calls = Vec::new();
        let mut pending_reasoning = Vec::new();

        for item in resp.output {
            let kind = item["type"].as_str().unwrap_or_default().to_string();
            match kind.as_str() {
                "reasoning" => pending_reasoning.push(item),
                "function_call" => {
                    let id = item["call_id"]
                        .as_str()
                        .or_else(|| item["id"].as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                    let name = item["name"].as_str().unwrap_or_default().to_string();
                    let arguments =
                        ToolCall::parse_arguments(&name, item["arguments"].as_str().unwrap_or(""));
                    if !pending_reasoning.is_empty() {
                        carry
                            .before_call
                            .insert(id.clone(), std::mem::take(&mut pending_reasoning));
                    }
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments,
                    });
                }
                "message" if text.is_none() => text = first_output_text(&item),
                // Native tool calls were resolved by the backend
                _ => {}
            }
        }

        let live = http::call_ids(history);
        carry.before_call.retain(|id, _| {
            live.contains(id.as_str()) || tool_calls.iter().any(|c| &c.id == id)
        });

        ChatResponse::from_parts(text, tool_calls, carry.into_continuation())
    }
}

fn first_output_text(item: &Value) -> Option<String> {
    item["content"]
        .as_array()?
        .iter()
        .filter(|part| part["type"].as_str() == Some("output_text"))
        .filter_map(|part| part["text"].as_str())
        .find(|t| !t.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "ChatGPT"
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
        let url = format!("{}/responses", self.base_url);
        let carry = ReasoningCarry::from_continuation(request.continuation.as_ref());

        let mut body = json!({
            "model": self.model,
            "input": Self::to_input(&request.entries, &carry),
            "store": false,
            "include": ["reasoning.encrypted_content"],
        });

        if !request.tools.is_empty() {
            body["tools"] = json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = json!(match request.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::None => "none",
            });
        }

        debug!(provider = PROVIDER_ID, model = %self.model, entries = request.entries.len(), "Sending responses request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::network_error)?;
        let response = http::check_status(PROVIDER_ID, response).await?;
        let api_resp: ResponsesResponse = http::json_body(PROVIDER_ID, response).await?;

        Ok(Self::normalize_output(api_resp, carry, &request.entries))
    }

    fn summarizer(&self) -> Option<&dyn MessageSummarizer> {
        Some(self)
    }

    fn local_image_generator(&self) -> Option<&dyn LocalImageGenerator> {
        Some(self)
    }
}

#[async_trait]
impl MessageSummarizer for OpenAiProvider {
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

#[async_trait]
impl LocalImageGenerator for OpenAiProvider {
    async fn render(
        &self,
        prompt: &str,
        previous: Option<&GeneratedImage>,
    ) -> std::result::Result<GeneratedImage, ProviderError> {
        let sent = match previous {
            None => {
                debug!(provider = PROVIDER_ID, model = %self.image_model, "Generating image");
                self.client
                    .post(format!("{}/images/generations", self.base_url))
                    .bearer_auth(&self.api_key)
                    .json(&json!({ "model": self.image_model, "prompt": prompt, "n": 1 }))
                    .send()
                    .await
            }
            Some(previous) => {
                debug!(provider = PROVIDER_ID, model = %self.image_model, "Refining previous image");
                let image = reqwest::multipart::Part::bytes(previous.bytes.clone())
                    .file_name(previous.file_name())
                    .mime_str(&previous.mime_type)
                    .map_err(|_| {
                        ProviderError::Unsupported(format!("image type {}", previous.mime_type))
                    })?;
                let form = reqwest::multipart::Form::new()
                    .text("model", self.image_model.clone())
                    .text("prompt", prompt.to_string())
                    .part("image", image);
                self.client
                    .post(format!("{}/images/edits", self.base_url))
                    .bearer_auth(&self.api_key)
                    .multipart(form)
                    .send()
                    .await
            }
        };

        let response = sent.map_err(http::network_error)?;
        let response = http::check_status(PROVIDER_ID, response).await?;
        let images: ImagesResponse = http::json_body(PROVIDER_ID, response).await?;

        let encoded = images
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| ProviderError::InvalidResponse("image response contained no data".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid image data: {e}")))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: "image/png".into(),
            prompt: prompt.to_string(),
        })
    }
}

/// Reasoning items kept between calls, keyed by the call they preceded.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ReasoningCarry {
    #[serde(default)]
    before_call: HashMap<String, Vec<Value>>,
}

impl ReasoningCarry {
    fn from_continuation(continuation: Option<&Continuation>) -> Self {
        continuation
            .and_then(|c| c.payload_for(PROVIDER_ID))
            .and_then(|payload| match serde_json::from_str(payload) {
                Ok(carry) => Some(carry),
                Err(e) => {
                    debug!(error = %e, "Ignoring unreadable continuation");
                    None
                }
            })
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

// --- Responses API types ---

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    output_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
}
