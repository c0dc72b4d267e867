//! Tool trait: host-executed capabilities the model can request.
//!
//! Tools never touch conversation history: they return text and the
//! orchestrator wraps that text into a tool_result entry.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{Map, Value};
use crate::channel::{ChannelId, ChatChannel, ChatMessage};
use crate::error::{RegistryError, ToolError};
use crate::provider::{AiProvider, ProviderToolDefinition};

/// Re-pins a channel to another provider.
#[async_trait]
pub trait ProviderSwitch: Send + Sync {
    async fn set_for_channel(
        &self,
        channel_id: &ChannelId,
        provider_id: &str,
    ) -> std::result::Result<Arc<dyn AiProvider>, RegistryError>;
}

/// Everything a tool may use while executing one call.
#[derive(Clone)]
pub struct ToolContext {
    /// The inbound message that started the turn
    pub message: ChatMessage,

    pub channel: Arc<dyn ChatChannel>,

    /// The provider serving the turn when the call was made
    pub provider: Arc<dyn AiProvider>,

    switcher: Arc<dyn ProviderSwitch>,
}

impl ToolContext {
    pub fn new(
        message: ChatMessage,
        channel: Arc<dyn ChatChannel>,
        provider: Arc<dyn AiProvider>,
        switcher: Arc<dyn ProviderSwitch>,
    ) -> Self {
        Self {
            message,
            channel,
            provider,
            switcher,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.message.channel_id
    }

    /// Pin this context's channel to `provider_id`.
    pub async fn switch_provider(
        &self,
        provider_id: &str,
    ) -> std::result::Result<Arc<dyn AiProvider>, RegistryError> {
        self.switcher
            .set_for_channel(&self.message.channel_id, provider_id)
            .await
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "summarize_messages").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// One line of usage advice for the developer prompt.
    fn guidance(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: Map<String, Value>,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a host-handled provider definition.
    fn to_definition(&self) -> ProviderToolDefinition {
        ProviderToolDefinition::host_function(
            self.name(),
            self.description(),
            self.parameters_schema(),
        )
    }
}

/// The catalog of host-executable tools, in registration order.
pub struct ToolCatalog {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Host-handled definitions for every tool (handed to adapters).
    pub fn definitions(&self) -> Vec<ProviderToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        fn guidance(&self) -> &str { "Use echo to repeat things." }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            arguments: Map<String, Value>,
        ) -> std::result::Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    struct ShoutTool;

    #[async_trait]
    impl Tool for ShoutTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes loudly" }
        fn parameters_schema(&self) -> Value { serde_json::json!({"type": "object"}) }
        fn guidance(&self) -> &str { "" }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            _arguments: Map<String, Value>,
        ) -> std::result::Result<String, ToolError> {
            Ok("LOUD".into())
        }
    }

    #[test]
    fn catalog_register_and_lookup() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Box::new(EchoTool));
        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn catalog_definitions_are_host_handled() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Box::new(EchoTool));
        let defs = catalog.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert!(defs[0].host_handled);
        assert!(defs[0].parameters.is_some());
    }

    #[test]
    fn register_replaces_same_name() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Box::new(EchoTool));
        catalog.register(Box::new(ShoutTool));
        assert_eq!(catalog.names(), vec!["echo"]);
        assert_eq!(catalog.get("echo").unwrap().description(), "Echoes loudly");
    }
}
