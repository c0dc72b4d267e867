//! Host-executed tools for Chorus.
//!
//! Tools let the model act on the channel it is talking in: summarize what
//! was said, generate an image, or hand the conversation to another backend.
//! Each returns plain text; the orchestrator records it as the tool result.

pub mod generate_image;
pub mod summarize_messages;
pub mod switch_provider;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use chorus_core::tool::{Tool, ToolCatalog};
use chorus_core::ToolError;
use chorus_memory::ImageCache;
use serde_json::{Map, Value};

pub use generate_image::GenerateImageTool;
pub use summarize_messages::SummarizeMessagesTool;
pub use switch_provider::SwitchProviderTool;

/// Create the catalog with every standing tool.
pub fn default_catalog(images: Arc<ImageCache>) -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.register(Box::new(SummarizeMessagesTool));
    catalog.register(Box::new(GenerateImageTool::new(images)));
    catalog.register(Box::new(SwitchProviderTool));
    catalog
}

/// A required string argument.
pub(crate) fn required_str<'a>(
    tool: &dyn Tool,
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            ToolError::InvalidArguments(format!("{} requires a '{key}' string", tool.name()))
        })
}
