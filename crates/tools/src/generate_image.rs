//! Generate an image, or refine the last one generated in the channel.

use std::sync::Arc;

use async_trait::async_trait;
use chorus_core::error::ToolError;
use chorus_core::tool::{Tool, ToolContext};
use chorus_memory::ImageCache;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::required_str;

pub const UNSUPPORTED: &str = "This provider does not support image generation.";

pub struct GenerateImageTool {
    images: Arc<ImageCache>,
}

impl GenerateImageTool {
    pub fn new(images: Arc<ImageCache>) -> Self {
        Self { images }
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate an image from a text prompt and post it in this channel. Set \
         refine_previous to edit the last image generated here instead of starting over."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "What the image should show"
                },
                "refine_previous": {
                    "type": "boolean",
                    "description": "Edit the previous image rather than creating a new one"
                }
            },
            "required": ["prompt"]
        })
    }

    fn guidance(&self) -> &str {
        "Call generate_image when asked to draw or create a picture. The image is posted for \
         you; just tell the user it is there. Use refine_previous for follow-up tweaks."
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: Map<String, Value>,
    ) -> Result<String, ToolError> {
        let prompt = required_str(self, &arguments, "prompt")?;
        let refine = arguments
            .get("refine_previous")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if let Some(local) = ctx.provider.local_image_generator() {
            let previous = if refine {
                self.images.last(ctx.channel_id()).await
            } else {
                None
            };
            debug!(channel_id = %ctx.channel_id(), refine = previous.is_some(), "Rendering image");

            let image = local.render(prompt, previous.as_deref()).await?;
            ctx.channel.send_image(ctx.channel_id(), &image).await?;
            let stored = self.images.store(ctx.channel_id(), image).await;

            return Ok(json!({
                "status": "delivered",
                "refined": previous.is_some(),
                "mime_type": stored.mime_type,
            })
            .to_string());
        }

        if let Some(direct) = ctx.provider.image_generator() {
            return direct.generate_image(ctx, prompt).await;
        }

        Ok(UNSUPPORTED.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn args(prompt: &str, refine: bool) -> Map<String, Value> {
        json!({ "prompt": prompt, "refine_previous": refine })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn local_provider() -> Arc<StubProvider> {
        let mut provider = StubProvider::new("openai");
        provider.local_images = true;
        Arc::new(provider)
    }

    #[tokio::test]
    async fn local_generation_delivers_and_caches() {
        let cache = Arc::new(ImageCache::new());
        let tool = GenerateImageTool::new(cache.clone());
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(local_provider(), channel.clone(), no_switch());

        let out = tool.execute(&ctx, args("a fox", false)).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["status"], "delivered");
        assert_eq!(parsed["refined"], false);

        assert_eq!(channel.images.lock().unwrap().len(), 1);
        assert_eq!(cache.last(ctx.channel_id()).await.unwrap().prompt, "a fox");
    }

    #[tokio::test]
    async fn refinement_passes_the_cached_image() {
        let cache = Arc::new(ImageCache::new());
        let tool = GenerateImageTool::new(cache.clone());
        let provider = local_provider();
        let ctx = context(provider.clone(), Arc::default(), no_switch());

        tool.execute(&ctx, args("a fox", false)).await.unwrap();
        let out = tool.execute(&ctx, args("now in snow", true)).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["refined"], true);

        let renders = provider.renders.lock().unwrap();
        assert_eq!(renders[1], ("now in snow".to_string(), Some("a fox".to_string())));
    }

    #[tokio::test]
    async fn refine_without_a_cached_image_starts_fresh() {
        let provider = local_provider();
        let tool = GenerateImageTool::new(Arc::new(ImageCache::new()));
        let ctx = context(provider.clone(), Arc::default(), no_switch());

        tool.execute(&ctx, args("a fox", true)).await.unwrap();
        assert_eq!(provider.renders.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn falls_back_to_direct_generation() {
        let mut provider = StubProvider::new("gemini");
        provider.direct_images = true;
        let tool = GenerateImageTool::new(Arc::new(ImageCache::new()));
        let ctx = context(Arc::new(provider), Arc::default(), no_switch());

        let out = tool.execute(&ctx, args("a fox", false)).await.unwrap();
        assert_eq!(out, "direct:a fox");
    }

    #[tokio::test]
    async fn reports_unsupported() {
        let tool = GenerateImageTool::new(Arc::new(ImageCache::new()));
        let ctx = context(Arc::new(StubProvider::new("anthropic")), Arc::default(), no_switch());
        assert_eq!(tool.execute(&ctx, args("a fox", false)).await.unwrap(), UNSUPPORTED);
    }
}
