//! The last generated image per channel, kept so it can be refined.

use chorus_core::channel::{ChannelId, GeneratedImage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ImageCache {
    images: RwLock<HashMap<ChannelId, Arc<GeneratedImage>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last(&self, channel_id: &ChannelId) -> Option<Arc<GeneratedImage>> {
        self.images.read().await.get(channel_id).cloned()
    }

    /// Replace the channel's cached image.
    pub async fn store(&self, channel_id: &ChannelId, image: GeneratedImage) -> Arc<GeneratedImage> {
        let image = Arc::new(image);
        self.images
            .write()
            .await
            .insert(channel_id.clone(), Arc::clone(&image));
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(prompt: &str) -> GeneratedImage {
        GeneratedImage {
            bytes: prompt.as_bytes().to_vec(),
            mime_type: "image/png".into(),
            prompt: prompt.into(),
        }
    }

    #[tokio::test]
    async fn store_replaces_previous_image() {
        let cache = ImageCache::new();
        let chan = ChannelId::new("c");
        assert!(cache.last(&chan).await.is_none());

        cache.store(&chan, image("a cat")).await;
        cache.store(&chan, image("a cat wearing a hat")).await;
        assert_eq!(cache.last(&chan).await.unwrap().prompt, "a cat wearing a hat");
        assert!(cache.last(&ChannelId::new("other")).await.is_none());
    }
}
