pub mod chat;
pub mod init;
pub mod providers;

use std::sync::Arc;
use std::time::Duration;

use chorus_agent::{Orchestrator, OrchestratorSettings};
use chorus_config::AppConfig;
use chorus_memory::{ConversationStore, ImageCache};
use chorus_providers::ProviderRegistry;
use tracing::debug;

/// Wire the stores, tool catalog and provider registry into an orchestrator.
pub fn build_orchestrator(config: &AppConfig) -> Arc<Orchestrator> {
    let catalog = chorus_tools::default_catalog(Arc::new(ImageCache::new()));
    let registry = Arc::new(ProviderRegistry::from_config(
        config.clone(),
        catalog.definitions(),
    ));
    debug!(providers = ?registry.list(), "Provider registry built");
    let store = Arc::new(ConversationStore::new(Duration::from_secs(
        config.conversation.idle_timeout_secs,
    )));

    Arc::new(Orchestrator::new(
        registry,
        Arc::new(catalog),
        store,
        OrchestratorSettings::from_config(config),
    ))
}
