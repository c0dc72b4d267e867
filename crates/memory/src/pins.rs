//! Channel → provider pinning.

use chorus_core::channel::ChannelId;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Which provider id each channel is pinned to.
#[derive(Default)]
pub struct ChannelPins {
    pins: RwLock<HashMap<ChannelId, String>>,
}

impl ChannelPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, channel_id: &ChannelId) -> Option<String> {
        self.pins.read().await.get(channel_id).cloned()
    }

    pub async fn set(&self, channel_id: &ChannelId, provider_id: impl Into<String>) {
        self.pins
            .write()
            .await
            .insert(channel_id.clone(), provider_id.into());
    }
}
