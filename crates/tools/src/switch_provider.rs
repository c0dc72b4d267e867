//! Re-pin the channel to another AI provider.

use async_trait::async_trait;
use chorus_core::error::ToolError;
use chorus_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};
use tracing::info;

use crate::required_str;

pub struct SwitchProviderTool;

#[async_trait]
impl Tool for SwitchProviderTool {
    fn name(&self) -> &str {
        "switch_provider"
    }

    fn description(&self) -> &str {
        "Switch the AI provider that answers in this channel. Known ids: openai, gemini, anthropic."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "provider_id": {
                    "type": "string",
                    "description": "Id of the provider to switch to (e.g. \"gemini\")"
                }
            },
            "required": ["provider_id"]
        })
    }

    fn guidance(&self) -> &str {
        "If someone asks to talk to a different AI (ChatGPT, Gemini or Claude), call \
         switch_provider with its id."
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: Map<String, Value>,
    ) -> Result<String, ToolError> {
        let provider_id = required_str(self, &arguments, "provider_id")?;

        match ctx.switch_provider(provider_id).await {
            Ok(provider) => {
                info!(channel_id = %ctx.channel_id(), provider = provider_id, "Switched provider");
                Ok(format!(
                    "Switched this channel to {}. It will answer from now on.",
                    provider.display_name()
                ))
            }
            Err(e) => Ok(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chorus_core::provider::AiProvider;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn switch_with(ids: &[&str]) -> Arc<StubSwitch> {
        Arc::new(StubSwitch {
            registered: ids
                .iter()
                .map(|id| Arc::new(StubProvider::new(id)) as Arc<dyn AiProvider>)
                .collect(),
            pinned: Mutex::new(None),
        })
    }

    fn args(id: &str) -> Map<String, Value> {
        json!({ "provider_id": id }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn confirms_with_the_display_name() {
        let switch = switch_with(&["openai", "gemini"]);
        let ctx = context(Arc::new(StubProvider::new("openai")), Arc::default(), switch.clone());

        let out = SwitchProviderTool.execute(&ctx, args("gemini")).await.unwrap();
        assert_eq!(out, "Switched this channel to GEMINI. It will answer from now on.");
        assert_eq!(switch.pinned.lock().unwrap().as_deref(), Some("gemini"));
    }

    #[tokio::test]
    async fn unknown_ids_return_the_registry_error_verbatim() {
        let switch = switch_with(&["openai"]);
        let ctx = context(Arc::new(StubProvider::new("openai")), Arc::default(), switch.clone());

        let out = SwitchProviderTool.execute(&ctx, args("grok")).await.unwrap();
        assert_eq!(out, "Provider \"grok\" is not registered. Available providers: openai.");
        assert!(switch.pinned.lock().unwrap().is_none());
    }
}
