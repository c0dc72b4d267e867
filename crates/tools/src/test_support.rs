//! In-memory collaborators for tool tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chorus_core::channel::{Author, ChannelId, ChatChannel, ChatMessage, GeneratedImage};
use chorus_core::error::{ChannelError, ProviderError, RegistryError, SummarizeError, ToolError};
use chorus_core::provider::{
    AiProvider, ChatRequest, ChatResponse, ImageGenerator, LocalImageGenerator, MessageSummarizer,
    ProviderToolDefinition,
};
use chorus_core::tool::{ProviderSwitch, ToolContext};

#[derive(Default)]
pub struct StubProvider {
    pub id: String,
    pub display_name: String,
    pub summary: Option<Result<String, SummarizeError>>,
    pub local_images: bool,
    pub direct_images: bool,
    /// (prompt, prompt of the refined image)
    pub renders: Mutex<Vec<(String, Option<String>)>>,
}

impl StubProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            display_name: id.to_uppercase(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AiProvider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }
    fn display_name(&self) -> &str {
        &self.display_name
    }
    fn personality(&self) -> &str {
        ""
    }
    fn default_model(&self) -> &str {
        "stub"
    }
    fn tools(&self) -> &[ProviderToolDefinition] {
        &[]
    }
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Ok(ChatResponse::default())
    }
    fn summarizer(&self) -> Option<&dyn MessageSummarizer> {
        self.summary.as_ref().map(|_| self as &dyn MessageSummarizer)
    }
    fn image_generator(&self) -> Option<&dyn ImageGenerator> {
        self.direct_images.then_some(self as &dyn ImageGenerator)
    }
    fn local_image_generator(&self) -> Option<&dyn LocalImageGenerator> {
        self.local_images.then_some(self as &dyn LocalImageGenerator)
    }
}

#[async_trait]
impl MessageSummarizer for StubProvider {
    async fn summarize_messages(
        &self,
        _channel: &dyn ChatChannel,
        _channel_id: &ChannelId,
        start_time: &str,
        end_time: &str,
    ) -> Result<String, SummarizeError> {
        match &self.summary {
            Some(Ok(text)) => Ok(format!("{text} ({start_time}..{end_time})")),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl LocalImageGenerator for StubProvider {
    async fn render(
        &self,
        prompt: &str,
        previous: Option<&GeneratedImage>,
    ) -> Result<GeneratedImage, ProviderError> {
        self.renders
            .lock()
            .unwrap()
            .push((prompt.into(), previous.map(|p| p.prompt.clone())));
        Ok(GeneratedImage {
            bytes: prompt.as_bytes().to_vec(),
            mime_type: "image/png".into(),
            prompt: prompt.into(),
        })
    }
}

#[async_trait]
impl ImageGenerator for StubProvider {
    async fn generate_image(&self, _ctx: &ToolContext, prompt: &str) -> Result<String, ToolError> {
        Ok(format!("direct:{prompt}"))
    }
}

#[derive(Default)]
pub struct RecordingChannel {
    pub images: Mutex<Vec<GeneratedImage>>,
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }
    fn self_id(&self) -> &str {
        "bot"
    }
    async fn fetch_history(
        &self,
        _: &ChannelId,
        _: usize,
        _: Option<&str>,
    ) -> Result<Vec<ChatMessage>, ChannelError> {
        Ok(vec![])
    }
    async fn send_reply(&self, _: &ChannelId, _: &str) -> Result<(), ChannelError> {
        Ok(())
    }
    async fn send_image(&self, _: &ChannelId, image: &GeneratedImage) -> Result<(), ChannelError> {
        self.images.lock().unwrap().push(image.clone());
        Ok(())
    }
}

/// Accepts only the providers it was built with.
pub struct StubSwitch {
    pub registered: Vec<Arc<dyn AiProvider>>,
    pub pinned: Mutex<Option<String>>,
}

#[async_trait]
impl ProviderSwitch for StubSwitch {
    async fn set_for_channel(
        &self,
        _channel_id: &ChannelId,
        provider_id: &str,
    ) -> Result<Arc<dyn AiProvider>, RegistryError> {
        let found = self.registered.iter().find(|p| p.id() == provider_id).cloned();
        match found {
            Some(provider) => {
                *self.pinned.lock().unwrap() = Some(provider_id.into());
                Ok(provider)
            }
            None => Err(RegistryError::NotRegistered {
                requested: provider_id.into(),
                available: self.registered.iter().map(|p| p.id().to_string()).collect(),
            }),
        }
    }
}

pub fn inbound() -> ChatMessage {
    ChatMessage {
        id: "m1".into(),
        channel_id: ChannelId::new("chan"),
        author: Author {
            id: "u1".into(),
            display_name: "Ann".into(),
            is_bot: false,
        },
        content: "hey bot".into(),
        attachments: vec![],
        timestamp: chrono::Utc::now(),
    }
}

pub fn context(
    provider: Arc<StubProvider>,
    channel: Arc<RecordingChannel>,
    switch: Arc<dyn ProviderSwitch>,
) -> ToolContext {
    ToolContext::new(inbound(), channel, provider, switch)
}

pub fn no_switch() -> Arc<dyn ProviderSwitch> {
    Arc::new(StubSwitch {
        registered: vec![],
        pinned: Mutex::new(None),
    })
}
