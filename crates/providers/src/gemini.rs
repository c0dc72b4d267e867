//! Google Gemini provider.
//!
//! https://ai.google.dev/api/generate-content
//!
//! The backend only accepts inline image bytes, so image URLs in the
//! conversation are downloaded and embedded. Thought signatures returned with
//! function calls are carried as continuation data and re-attached to the
//! same calls on later requests.

use async_trait::async_trait;
use base64::Engine;
use chorus_core::channel::{ChannelId, ChatChannel, GeneratedImage};
use chorus_core::conversation::Continuation;
use chorus_core::error::{ProviderError, SummarizeError, ToolError};
use chorus_core::message::{ContentPart, ConversationEntry, Role, ToolCall};
use chorus_core::provider::{
    AiProvider, ChatRequest, ChatResponse, ImageGenerator, MessageSummarizer,
    ProviderToolDefinition, ToolChoice, ToolKind,
};
use chorus_core::tool::ToolContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{http, summarize};

pub const PROVIDER_ID: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
const DEFAULT_PERSONALITY: &str = "You are calm and precise. You like to lay out the \
facts first and keep your answers tidy.";

const HOST_TOOLS: [&str; 3] = ["summarize_messages", "generate_image", "switch_provider"];

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
    personality: String,
    tools: Vec<ProviderToolDefinition>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            personality: DEFAULT_PERSONALITY.into(),
            tools: Vec::new(),
            client: http::client(std::time::Duration::from_secs(120)),
        }
    }

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

    pub fn with_host_tools(mut self, definitions: &[ProviderToolDefinition]) -> Self {
        self.tools = definitions
            .iter()
            .filter(|d| HOST_TOOLS.contains(&d.name.as_str()))
            .cloned()
            .collect();
        self
    }

    async fn build_request(&self, request: &ChatRequest, carry: &SignatureCarry) -> GeminiRequest {
        let mut system_parts = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for entry in &request.entries {
            match entry {
                ConversationEntry::Message(message) if message.role.is_instruction() => {
                    system_parts.push(GeminiPart::text(message.text()));
                }
                ConversationEntry::Message(message) => {
                    let role = if message.role == Role::Assistant { "model" } else { "user" };
                    for part in message.normalized_content() {
                        let part = match part {
                            ContentPart::Text { text } => GeminiPart::text(text),
                            ContentPart::Image { url } => self.inline_image(&url).await,
                        };
                        push_part(&mut contents, role, part);
                    }
                }
                ConversationEntry::ToolCall(call) => {
                    let part = GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            id: Some(call.id.clone()),
                            name: call.name.clone(),
                            args: Value::Object(call.arguments.clone()),
                        }),
                        thought_signature: carry.signatures.get(&call.id).cloned(),
                        ..Default::default()
                    };
                    push_part(&mut contents, "model", part);
                }
                ConversationEntry::ToolResult(result) => {
                    let part = GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            id: Some(result.id.clone()),
                            name: result.name.clone(),
                            response: json!({ "result": result.content }),
                        }),
                        ..Default::default()
                    };
                    push_part(&mut contents, "user", part);
                }
            }
        }

        let declarations: Vec<GeminiFunctionDeclaration> = request
            .tools
            .iter()
            .filter(|t| t.kind == ToolKind::Function)
            .map(|t| GeminiFunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect();

        let (tools, tool_config) = if declarations.is_empty() {
            (None, None)
        } else {
            let mode = match request.tool_choice {
                ToolChoice::Auto => "AUTO",
                ToolChoice::None => "NONE",
            };
            (
                Some(vec![GeminiTool {
                    function_declarations: declarations,
                }]),
                Some(json!({ "functionCallingConfig": { "mode": mode } })),
            )
        };

        GeminiRequest {
            system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system_parts,
            }),
            contents,
            tools,
            tool_config,
        }
    }

    /// Download an image for inline embedding.
    ///
    /// A failed download degrades to a text part naming the URL.
    async fn inline_image(&self, url: &str) -> GeminiPart {
        match self.download(url).await {
            Ok((mime_type, bytes)) => GeminiPart {
                inline_data: Some(InlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                }),
                ..Default::default()
            },
            Err(e) => {
                warn!(url, error = %e, "Could not fetch image for Gemini");
                GeminiPart::text(format!("[image unavailable: {url}]"))
            }
        }
    }

    async fn download(&self, url: &str) -> Result<(String, Vec<u8>), reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/png".into());
        let bytes = response.bytes().await?;
        Ok((mime_type, bytes.to_vec()))
    }

    fn normalize(
        resp: GeminiResponse,
        mut carry: SignatureCarry,
        history: &[ConversationEntry],
    ) -> Result<ChatResponse, ProviderError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("Gemini returned no candidates".into()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(call) = part.function_call {
                let id = call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                if let Some(signature) = part.thought_signature {
                    carry.signatures.insert(id.clone(), signature);
                }
                let arguments = match call.args {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    other => ToolCall::parse_arguments(&call.name, &other.to_string()),
                };
                tool_calls.push(ToolCall {
                    id,
                    name: call.name,
                    arguments,
                });
            } else if let Some(t) = part.text {
                text.push_str(&t);
            }
        }

        let live = http::call_ids(history);
        carry
            .signatures
            .retain(|id, _| live.contains(id.as_str()) || tool_calls.iter().any(|c| &c.id == id));

        Ok(ChatResponse::from_parts(
            Some(text),
            tool_calls,
            carry.into_continuation(),
        ))
    }

    async fn predict_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        let url = format!("{}/models/{}:predict", self.base_url, self.image_model);
        debug!(provider = PROVIDER_ID, model = %self.image_model, "Generating image");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "instances": [{ "prompt": prompt }],
                "parameters": { "sampleCount": 1 },
            }))
            .send()
            .await
            .map_err(http::network_error)?;
        let response = http::check_status(PROVIDER_ID, response).await?;
        let body: PredictResponse = http::json_body(PROVIDER_ID, response).await?;

        let prediction = body
            .predictions
            .into_iter()
            .find(|p| p.bytes_base64_encoded.is_some())
            .ok_or_else(|| ProviderError::InvalidResponse("Imagen returned no image".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(prediction.bytes_base64_encoded.unwrap_or_default())
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid image data: {e}")))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: prediction.mime_type.unwrap_or_else(|| "image/png".into()),
            prompt: prompt.to_string(),
        })
    }
}

/// Append to the last content when it has the same role.
fn push_part(contents: &mut Vec<GeminiContent>, role: &str, part: GeminiPart) {
    match contents.last_mut() {
        Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
        _ => contents.push(GeminiContent {
            role: Some(role.to_string()),
            parts: vec![part],
        }),
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "Gemini"
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
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let carry = SignatureCarry::from_continuation(request.continuation.as_ref());
        let payload = self.build_request(&request, &carry).await;

        debug!(provider = PROVIDER_ID, model = %self.model, entries = request.entries.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(http::network_error)?;
        let response = http::check_status(PROVIDER_ID, response).await?;
        let body: GeminiResponse = http::json_body(PROVIDER_ID, response).await?;

        Self::normalize(body, carry, &request.entries)
    }

    fn summarizer(&self) -> Option<&dyn MessageSummarizer> {
        Some(self)
    }

    fn image_generator(&self) -> Option<&dyn ImageGenerator> {
        Some(self)
    }
}

#[async_trait]
impl MessageSummarizer for GeminiProvider {
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
impl ImageGenerator for GeminiProvider {
    async fn generate_image(
        &self,
        ctx: &ToolContext,
        prompt: &str,
    ) -> std::result::Result<String, ToolError> {
        let image = self.predict_image(prompt).await?;
        ctx.channel.send_image(ctx.channel_id(), &image).await?;

        Ok(json!({
            "status": "delivered",
            "mime_type": image.mime_type,
            "bytes": image.bytes.len(),
        })
        .to_string())
    }
}

/// Thought signatures keyed by the function call id they came with.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SignatureCarry {
    #[serde(default)]
    signatures: HashMap<String, String>,
}

impl SignatureCarry {
    fn from_continuation(continuation: Option<&Continuation>) -> Self {
        continuation
            .and_then(|c| c.payload_for(PROVIDER_ID))
            .and_then(|payload| serde_json::from_str(payload).ok())
            .unwrap_or_default()
    }

    fn into_continuation(self) -> Option<Continuation> {
        if self.signatures.is_empty() {
            return None;
        }
        let payload = serde_json::to_string(&self).ok()?;
        Some(Continuation::new(PROVIDER_ID, payload))
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}
