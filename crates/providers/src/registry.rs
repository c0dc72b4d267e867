//! Provider registry: one adapter per configured backend, plus per-channel
//! pinning of the active provider.
//!
//! Adapters are built lazily on first access, exactly once per registry.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chorus_config::{AppConfig, PROVIDER_IDS};
use chorus_core::channel::ChannelId;
use chorus_core::error::RegistryError;
use chorus_core::provider::{AiProvider, ProviderToolDefinition};
use chorus_core::tool::ProviderSwitch;
use chorus_memory::ChannelPins;
use tracing::{info, warn};

use crate::{AnthropicProvider, GeminiProvider, OpenAiProvider};

/// What the registry builds its adapters from.
struct RegistrySource {
    config: AppConfig,
    host_tools: Vec<ProviderToolDefinition>,
}

pub struct ProviderRegistry {
    /// Registered adapters in priority order
    providers: OnceLock<Vec<Arc<dyn AiProvider>>>,
    source: Option<RegistrySource>,
    default_provider: String,
    pins: ChannelPins,
}

impl ProviderRegistry {
    /// A registry that builds adapters from `config` on first use.
    ///
    /// `host_tools` are the catalog's definitions; each adapter advertises the
    /// subset it supports.
    pub fn from_config(config: AppConfig, host_tools: Vec<ProviderToolDefinition>) -> Self {
        Self {
            providers: OnceLock::new(),
            default_provider: config.default_provider.clone(),
            source: Some(RegistrySource { config, host_tools }),
            pins: ChannelPins::new(),
        }
    }

    /// A registry over already-built adapters, kept in the given order.
    pub fn with_providers(
        default_provider: impl Into<String>,
        providers: Vec<Arc<dyn AiProvider>>,
    ) -> Self {
        let registered = OnceLock::new();
        let _ = registered.set(providers);
        Self {
            providers: registered,
            default_provider: default_provider.into(),
            source: None,
            pins: ChannelPins::new(),
        }
    }

    /// All registered adapters in priority order.
    pub fn providers(&self) -> &[Arc<dyn AiProvider>] {
        self.providers.get_or_init(|| match &self.source {
            Some(source) => build_providers(source, &self.default_provider),
            None => Vec::new(),
        })
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn AiProvider>> {
        self.providers()
            .iter()
            .find(|p| p.id() == provider_id)
            .cloned()
    }

    /// Registered provider ids in priority order.
    pub fn list(&self) -> Vec<String> {
        self.providers().iter().map(|p| p.id().to_string()).collect()
    }

    pub fn default_id(&self) -> &str {
        &self.default_provider
    }

    /// The default provider, or the first registered one if the default is
    /// not registered.
    pub fn default_provider(&self) -> Option<Arc<dyn AiProvider>> {
        self.get(&self.default_provider)
            .or_else(|| self.providers().first().cloned())
    }

    /// The provider serving `channel_id`: its pin, else the default.
    pub async fn get_for_channel(&self, channel_id: &ChannelId) -> Option<Arc<dyn AiProvider>> {
        if let Some(pinned) = self.pins.get(channel_id).await {
            if let Some(provider) = self.get(&pinned) {
                return Some(provider);
            }
        }
        self.default_provider()
    }

    /// Pin `channel_id` to `provider_id`.
    pub async fn set_for_channel(
        &self,
        channel_id: &ChannelId,
        provider_id: &str,
    ) -> Result<Arc<dyn AiProvider>, RegistryError> {
        let Some(provider) = self.get(provider_id) else {
            return Err(RegistryError::NotRegistered {
                requested: provider_id.to_string(),
                available: self.list(),
            });
        };
        self.pins.set(channel_id, provider_id).await;
        info!(channel_id = %channel_id, provider = provider_id, "Pinned channel to provider");
        Ok(provider)
    }
}

#[async_trait]
impl ProviderSwitch for ProviderRegistry {
    async fn set_for_channel(
        &self,
        channel_id: &ChannelId,
        provider_id: &str,
    ) -> Result<Arc<dyn AiProvider>, RegistryError> {
        ProviderRegistry::set_for_channel(self, channel_id, provider_id).await
    }
}

fn build_providers(source: &RegistrySource, default_provider: &str) -> Vec<Arc<dyn AiProvider>> {
    let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

    for id in PROVIDER_IDS {
        let Some(api_key) = source.config.api_key(id) else {
            warn!(provider = id, "No credential configured, skipping provider");
            continue;
        };
        if let Some(provider) = build_provider(id, api_key, source) {
            info!(provider = id, model = provider.default_model(), "Registered provider");
            providers.push(provider);
        }
    }

    if !providers.iter().any(|p| p.id() == default_provider) {
        match providers.first() {
            Some(fallback) => warn!(
                requested = default_provider,
                fallback = fallback.id(),
                "Default provider is not registered, falling back"
            ),
            None => warn!("No providers registered"),
        }
    }

    providers
}

fn build_provider(
    id: &str,
    api_key: &str,
    source: &RegistrySource,
) -> Option<Arc<dyn AiProvider>> {
    let settings = source.config.provider(id);
    let tools = &source.host_tools;

    let provider: Arc<dyn AiProvider> = match id {
        "openai" => {
            let mut p = OpenAiProvider::new(api_key).with_host_tools(tools);
            if let Some(url) = settings.api_url {
                p = p.with_base_url(url);
            }
            if let Some(model) = settings.model {
                p = p.with_model(model);
            }
            if let Some(model) = settings.image_model {
                p = p.with_image_model(model);
            }
            if let Some(personality) = settings.personality {
                p = p.with_personality(personality);
            }
            Arc::new(p)
        }
        "gemini" => {
            let mut p = GeminiProvider::new(api_key).with_host_tools(tools);
            if let Some(url) = settings.api_url {
                p = p.with_base_url(url);
            }
            if let Some(model) = settings.model {
                p = p.with_model(model);
            }
            if let Some(model) = settings.image_model {
                p = p.with_image_model(model);
            }
            if let Some(personality) = settings.personality {
                p = p.with_personality(personality);
            }
            Arc::new(p)
        }
        "anthropic" => {
            let mut p = AnthropicProvider::new(api_key).with_host_tools(tools);
            if let Some(url) = settings.api_url {
                p = p.with_base_url(url);
            }
            if let Some(model) = settings.model {
                p = p.with_model(model);
            }
            if let Some(personality) = settings.personality {
                p = p.with_personality(personality);
            }
            if let Some(budget) = settings.thinking_budget {
                p = p.with_extended_thinking(budget);
            }
            Arc::new(p)
        }
        other => {
            warn!(provider = other, "Unknown provider id");
            return None;
        }
    };

    Some(provider)
}
