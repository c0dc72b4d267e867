//! The turn state machine.

use std::sync::Arc;
use std::time::Duration;

use chorus_config::AppConfig;
use chorus_core::channel::{ChannelId, ChatChannel, ChatMessage};
use chorus_core::conversation::{ConversationState, Continuation};
use chorus_core::message::{ConversationEntry, ToolCall};
use chorus_core::provider::{AiProvider, ChatRequest, ChatResponse, ToolChoice};
use chorus_core::tool::{ProviderSwitch, ToolCatalog, ToolContext};
use chorus_memory::ConversationStore;
use chorus_providers::ProviderRegistry;
use tracing::{debug, error, info, warn};

use crate::history::{render_user, seed_entries};
use crate::prompt::{developer_prompt, set_developer_prompt};
use crate::reply::{MAX_MESSAGE_CHARS, split_reply};
use crate::turn_locks::TurnLocks;
use crate::typing::TypingIndicator;

pub const APOLOGY: &str =
    "Sorry, something went wrong while I was thinking about that. Please try again.";
pub const NO_PROVIDER: &str = "No AI provider is configured right now, so I can't reply.";
pub const FILLER: &str = "I don't have anything to add to that.";

/// Knobs the orchestrator reads from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub bot_name: String,
    pub time_zone: chrono_tz::Tz,
    /// Channel messages seeded into a fresh conversation
    pub history_limit: usize,
    pub serialize_turns: bool,
    pub typing_interval: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bot_name: config.bot_name.clone(),
            time_zone: config.tz(),
            history_limit: config.conversation.history_limit,
            serialize_turns: config.conversation.serialize_turns,
            typing_interval: Duration::from_secs(config.conversation.typing_interval_secs),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What a successful turn produced: the reply and the state to persist.
struct Turn {
    reply: String,
    state: ConversationState,
}

/// Drives one turn per inbound chat message.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    catalog: Arc<ToolCatalog>,
    store: Arc<ConversationStore>,
    locks: TurnLocks,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        catalog: Arc<ToolCatalog>,
        store: Arc<ConversationStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            catalog,
            store,
            locks: TurnLocks::new(),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn turn_locks(&self) -> &TurnLocks {
        &self.locks
    }

    /// Handle `message` on a background task.
    pub fn spawn(
        self: &Arc<Self>,
        channel: Arc<dyn ChatChannel>,
        message: ChatMessage,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.handle_message(channel, message).await })
    }

    /// Run one turn for `message` and reply in its channel.
    ///
    /// Every outcome is delivered as a reply; nothing is returned.
    pub async fn handle_message(&self, channel: Arc<dyn ChatChannel>, message: ChatMessage) {
        if !self.settings.serialize_turns {
            self.answer(channel, message).await;
            return;
        }

        let turn = self.locks.acquire(&message.channel_id).await;
        self.answer(channel, message).await;
        drop(turn);
        self.locks.cleanup_unused().await;
    }

    async fn answer(&self, channel: Arc<dyn ChatChannel>, message: ChatMessage) {
        let channel_id = message.channel_id.clone();

        let Some(provider) = self.registry.get_for_channel(&channel_id).await else {
            warn!(channel_id = %channel_id, "No provider registered, cannot reply");
            self.deliver(channel.as_ref(), &channel_id, NO_PROVIDER).await;
            return;
        };

        info!(
            channel_id = %channel_id,
            provider = provider.id(),
            author = %message.author.display_name,
            "Starting turn"
        );

        let typing = TypingIndicator::start(
            Arc::clone(&channel),
            channel_id.clone(),
            self.settings.typing_interval,
        );
        let outcome = self.run_turn(&channel, &message, provider).await;
        typing.stop();

        match outcome {
            Ok(turn) => {
                self.deliver(channel.as_ref(), &channel_id, &turn.reply).await;
                info!(
                    channel_id = %channel_id,
                    provider = %turn.state.provider_id,
                    entries = turn.state.entries.len(),
                    "Turn complete"
                );
                self.store.insert(channel_id, turn.state).await;
            }
            Err(e) => {
                error!(channel_id = %channel_id, error = %e, "Turn failed");
                self.deliver(channel.as_ref(), &channel_id, APOLOGY).await;
            }
        }
    }

    async fn run_turn(
        &self,
        channel: &Arc<dyn ChatChannel>,
        message: &ChatMessage,
        mut provider: Arc<dyn AiProvider>,
    ) -> Result<Turn, chorus_core::Error> {
        let channel_id = &message.channel_id;

        let (mut entries, carried) = match self.store.get(channel_id).await {
            Some(state) => {
                let mut entries = state.entries;
                if state.provider_id != provider.id() {
                    debug!(
                        channel_id = %channel_id,
                        from = %state.provider_id,
                        to = provider.id(),
                        "Provider changed, rewriting developer prompt"
                    );
                    set_developer_prompt(&mut entries, self.prompt_for(provider.as_ref()));
                }
                (entries, state.continuation)
            }
            None => {
                let mut entries = vec![ConversationEntry::developer(
                    self.prompt_for(provider.as_ref()),
                )];
                entries.extend(
                    seed_entries(
                        channel.as_ref(),
                        channel_id,
                        &message.id,
                        self.settings.history_limit,
                    )
                    .await?,
                );
                debug!(channel_id = %channel_id, seeded = entries.len() - 1, "Built fresh conversation");
                (entries, None)
            }
        };

        entries.push(render_user(message));

        let first = self
            .call(provider.as_ref(), &entries, ToolChoice::Auto, carried.clone())
            .await?;
        entries.extend(first.output_entries.iter().cloned());

        let host_calls: Vec<&ToolCall> = first
            .tool_calls
            .iter()
            .filter(|call| !is_native(provider.as_ref(), &call.name))
            .collect();

        // A call that returns no continuation keeps the previous one alive
        let continuation = first.continuation.clone().or(carried);

        let (text, continuation) = if host_calls.is_empty() {
            (first.text, continuation)
        } else {
            let switcher: Arc<dyn ProviderSwitch> = self.registry.clone();
            let ctx = ToolContext::new(
                message.clone(),
                Arc::clone(channel),
                Arc::clone(&provider),
                switcher,
            );
            for call in host_calls {
                let content = self.execute_tool(&ctx, call).await;
                entries.push(ConversationEntry::tool_result(&call.id, &call.name, content));
            }

            // A switch_provider call may have re-pinned the channel
            if let Some(current) = self.registry.get_for_channel(channel_id).await {
                if current.id() != provider.id() {
                    info!(
                        channel_id = %channel_id,
                        from = provider.id(),
                        to = current.id(),
                        "Provider switched mid-turn"
                    );
                    set_developer_prompt(&mut entries, self.prompt_for(current.as_ref()));
                    provider = current;
                }
            }

            let follow_up = self
                .call(provider.as_ref(), &entries, ToolChoice::None, continuation.clone())
                .await?;
            entries.extend(follow_up.output_entries.iter().cloned());
            (follow_up.text, follow_up.continuation.or(continuation))
        };

        let reply = text.unwrap_or_else(|| FILLER.to_string());
        let state = ConversationState::new(provider.id(), entries).with_continuation(continuation);
        Ok(Turn { reply, state })
    }

    async fn call(
        &self,
        provider: &dyn AiProvider,
        entries: &[ConversationEntry],
        tool_choice: ToolChoice,
        continuation: Option<Continuation>,
    ) -> Result<ChatResponse, chorus_core::Error> {
        debug!(
            provider = provider.id(),
            entries = entries.len(),
            tool_choice = ?tool_choice,
            "Calling provider"
        );
        let response = provider
            .chat(ChatRequest {
                entries: entries.to_vec(),
                tools: provider.tools().to_vec(),
                tool_choice,
                continuation,
            })
            .await?;
        debug!(
            provider = provider.id(),
            tool_calls = response.tool_calls.len(),
            has_text = response.text.is_some(),
            "Provider responded"
        );
        Ok(response)
    }

    /// Run one host tool call. Failures become the result text.
    async fn execute_tool(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let Some(tool) = self.catalog.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return format!("Tool `{}` is not supported here.", call.name);
        };

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        match tool.execute(ctx, call.arguments.clone()).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                format!("Tool `{}` failed: {e}", call.name)
            }
        }
    }

    fn prompt_for(&self, provider: &dyn AiProvider) -> String {
        let now = chrono::Utc::now().with_timezone(&self.settings.time_zone);
        developer_prompt(&self.settings.bot_name, provider, &self.catalog, now)
    }

    async fn deliver(&self, channel: &dyn ChatChannel, channel_id: &ChannelId, text: &str) {
        for chunk in split_reply(text, MAX_MESSAGE_CHARS) {
            if let Err(e) = channel.send_reply(channel_id, &chunk).await {
                error!(channel_id = %channel_id, error = %e, "Failed to send reply");
                return;
            }
        }
    }
}

/// Calls to tools the backend resolves itself need nothing from the host.
///
/// Anything else, including names the provider never advertised, is answered
/// with a tool result so no call is left dangling.
fn is_native(provider: &dyn AiProvider, tool_name: &str) -> bool {
    !provider.is_host_handled(tool_name)
        && provider
            .tools()
            .iter()
            .any(|t| !t.host_handled && t.name == tool_name)
}
