//! Turn scenarios driven against scripted providers and an in-memory channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chorus_agent::orchestrator::{APOLOGY, FILLER, NO_PROVIDER};
use chorus_agent::{Orchestrator, OrchestratorSettings};
use chorus_core::channel::{Author, ChannelId, ChatChannel, ChatMessage, GeneratedImage};
use chorus_core::conversation::Continuation;
use chorus_core::error::{ChannelError, ProviderError, SummarizeError, ToolError};
use chorus_core::message::{ConversationEntry, Role, ToolCall};
use chorus_core::provider::{
    AiProvider, ChatRequest, ChatResponse, MessageSummarizer, ProviderToolDefinition, ToolChoice,
    ToolKind,
};
use chorus_core::tool::{Tool, ToolCatalog, ToolContext};
use chorus_memory::{ConversationStore, ImageCache};
use chorus_providers::ProviderRegistry;
use serde_json::{Map, Value, json};

// ── Scripted provider ───────────────────────────────────────────────────

struct ScriptedProvider {
    id: String,
    display_name: String,
    personality: String,
    tools: Vec<ProviderToolDefinition>,
    script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new(id: &str, script: Vec<Result<ChatResponse, ProviderError>>) -> Self {
        let mut tools = chorus_tools::default_catalog(Arc::new(ImageCache::new())).definitions();
        tools.push(ProviderToolDefinition::native("web_search", ToolKind::WebSearch));
        Self {
            id: id.into(),
            display_name: id.to_uppercase(),
            personality: format!("You are the {id} voice."),
            tools,
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }
    fn display_name(&self) -> &str {
        &self.display_name
    }
    fn personality(&self) -> &str {
        &self.personality
    }
    fn default_model(&self) -> &str {
        "scripted"
    }
    fn tools(&self) -> &[ProviderToolDefinition] {
        &self.tools
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("{}: script exhausted", self.id))
    }

    fn summarizer(&self) -> Option<&dyn MessageSummarizer> {
        Some(self)
    }
}

#[async_trait]
impl MessageSummarizer for ScriptedProvider {
    async fn summarize_messages(
        &self,
        _channel: &dyn ChatChannel,
        _channel_id: &ChannelId,
        _start_time: &str,
        _end_time: &str,
    ) -> Result<String, SummarizeError> {
        Ok("Alice talked about lunch.".into())
    }
}

fn text(t: &str) -> Result<ChatResponse, ProviderError> {
    Ok(ChatResponse::from_parts(Some(t.into()), vec![], None))
}

fn calls(calls: Vec<ToolCall>) -> Result<ChatResponse, ProviderError> {
    Ok(ChatResponse::from_parts(None, calls, None))
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.as_object().cloned().unwrap_or_default(),
    }
}

// ── Mock channel ────────────────────────────────────────────────────────

#[derive(Default)]
struct MockChannel {
    /// Oldest first
    history: Vec<ChatMessage>,
    replies: Mutex<Vec<String>>,
    fetches: Mutex<Vec<(usize, Option<String>)>>,
}

#[async_trait]
impl ChatChannel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }
    fn self_id(&self) -> &str {
        "bot"
    }

    async fn fetch_history(
        &self,
        _channel_id: &ChannelId,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<ChatMessage>, ChannelError> {
        self.fetches
            .lock()
            .unwrap()
            .push((limit, before.map(String::from)));
        let end = before
            .and_then(|id| self.history.iter().position(|m| m.id == id))
            .unwrap_or(self.history.len());
        Ok(self.history[..end].iter().rev().take(limit).cloned().collect())
    }

    async fn send_reply(&self, _channel_id: &ChannelId, content: &str) -> Result<(), ChannelError> {
        self.replies.lock().unwrap().push(content.into());
        Ok(())
    }

    async fn send_image(&self, _: &ChannelId, _: &GeneratedImage) -> Result<(), ChannelError> {
        Ok(())
    }
}

impl MockChannel {
    fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

fn chat_message(id: &str, author_id: &str, name: &str, is_bot: bool, content: &str) -> ChatMessage {
    ChatMessage {
        id: id.into(),
        channel_id: ChannelId::new("general"),
        author: Author {
            id: author_id.into(),
            display_name: name.into(),
            is_bot,
        },
        content: content.into(),
        attachments: vec![],
        timestamp: chrono::Utc::now(),
    }
}

fn from_ann(id: &str, content: &str) -> ChatMessage {
    chat_message(id, "u-ann", "Ann", false, content)
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    orchestrator: Orchestrator,
    channel: Arc<MockChannel>,
}

impl Harness {
    fn new(providers: Vec<Arc<dyn AiProvider>>) -> Self {
        Self::with_catalog(providers, chorus_tools::default_catalog(Arc::new(ImageCache::new())))
    }

    fn with_catalog(providers: Vec<Arc<dyn AiProvider>>, catalog: ToolCatalog) -> Self {
        Self::build(providers, catalog, MockChannel::default(), ConversationStore::default())
    }

    fn build(
        providers: Vec<Arc<dyn AiProvider>>,
        catalog: ToolCatalog,
        channel: MockChannel,
        store: ConversationStore,
    ) -> Self {
        let registry = Arc::new(ProviderRegistry::with_providers("openai", providers));
        let orchestrator = Orchestrator::new(
            registry,
            Arc::new(catalog),
            Arc::new(store),
            OrchestratorSettings::default(),
        );
        Self {
            orchestrator,
            channel: Arc::new(channel),
        }
    }

    async fn turn(&self, message: ChatMessage) {
        self.orchestrator
            .handle_message(self.channel.clone(), message)
            .await;
    }

    async fn state_entries(&self) -> Option<Vec<ConversationEntry>> {
        self.orchestrator
            .store()
            .get(&ChannelId::new("general"))
            .await
            .map(|s| s.entries)
    }
}

fn tool_results(request: &ChatRequest) -> Vec<(String, String)> {
    request
        .entries
        .iter()
        .filter_map(|e| match e {
            ConversationEntry::ToolResult(r) => Some((r.id.clone(), r.content.clone())),
            _ => None,
        })
        .collect()
}

fn roles(entries: &[ConversationEntry]) -> Vec<&'static str> {
    entries
        .iter()
        .map(|e| match e {
            ConversationEntry::Message(m) => match m.role {
                Role::System => "system",
                Role::Developer => "developer",
                Role::Assistant => "assistant",
                Role::User => "user",
            },
            ConversationEntry::ToolCall(_) => "tool_call",
            ConversationEntry::ToolResult(_) => "tool_result",
        })
        .collect()
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_channel_hello() {
    let provider = Arc::new(ScriptedProvider::new("openai", vec![text("Hi Ann!")]));
    let channel = MockChannel {
        history: vec![
            from_ann("1", "morning"),
            chat_message("2", "other-bot", "Webhooky", true, "beep"),
            chat_message("3", "bot", "Chorus", true, "Good morning!"),
        ],
        ..Default::default()
    };
    let h = Harness::build(
        vec![provider.clone()],
        chorus_tools::default_catalog(Arc::new(ImageCache::new())),
        channel,
        ConversationStore::default(),
    );

    h.turn(from_ann("4", "hello")).await;

    assert_eq!(h.channel.replies(), vec!["Hi Ann!"]);

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
    assert_eq!(requests[0].tools.len(), 4);

    let entries = &requests[0].entries;
    assert_eq!(roles(entries), vec!["developer", "user", "assistant", "user"]);
    let prompt = entries[0].as_message().unwrap().text();
    assert!(prompt.contains("You are Chorus"));
    assert!(prompt.contains("You are the openai voice."));
    assert_eq!(entries[1].as_message().unwrap().text(), "Ann: morning");
    assert_eq!(entries[3].as_message().unwrap().text(), "Ann: hello");

    let stored = h.state_entries().await.unwrap();
    assert_eq!(roles(&stored), vec!["developer", "user", "assistant", "user", "assistant"]);
    let state = h.orchestrator.store().get(&ChannelId::new("general")).await.unwrap();
    assert_eq!(state.provider_id, "openai");
}

#[tokio::test]
async fn fresh_history_is_capped_and_fetched_before_the_mention() {
    let provider = Arc::new(ScriptedProvider::new("openai", vec![text("ok")]));
    let channel = MockChannel {
        history: (1..=15)
            .map(|i| from_ann(&i.to_string(), &format!("message {i}")))
            .collect(),
        ..Default::default()
    };
    let h = Harness::build(
        vec![provider.clone()],
        chorus_tools::default_catalog(Arc::new(ImageCache::new())),
        channel,
        ConversationStore::default(),
    );

    h.turn(from_ann("16", "hello")).await;

    let fetches = h.channel.fetches.lock().unwrap().clone();
    assert_eq!(fetches, vec![(10, Some("16".to_string()))]);

    let entries = &provider.requests()[0].entries;
    // developer + 10 history + the mention
    assert_eq!(entries.len(), 12);
    assert_eq!(entries[1].as_message().unwrap().text(), "Ann: message 6");
    assert_eq!(entries[10].as_message().unwrap().text(), "Ann: message 15");
}

#[tokio::test]
async fn summarize_runs_tool_then_forces_text() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![
            calls(vec![call(
                "call_1",
                "summarize_messages",
                json!({"start_time": "2024-01-01T11:00:00Z", "end_time": "2024-01-01T12:00:00Z"}),
            )]),
            text("In the last hour Alice talked about lunch."),
        ],
    ));
    let h = Harness::new(vec![provider.clone()]);

    h.turn(from_ann("1", "summarize the last hour")).await;

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
    assert_eq!(requests[1].tool_choice, ToolChoice::None);
    assert_eq!(
        tool_results(&requests[1]),
        vec![("call_1".to_string(), "Alice talked about lunch.".to_string())]
    );
    assert_eq!(
        h.channel.replies(),
        vec!["In the last hour Alice talked about lunch."]
    );

    let stored = h.state_entries().await.unwrap();
    assert_eq!(
        roles(&stored)[1..],
        ["user", "tool_call", "tool_result", "assistant"]
    );
}

struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "generate_image"
    }
    fn description(&self) -> &str {
        "always fails"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    fn guidance(&self) -> &str {
        ""
    }
    async fn execute(&self, _: &ToolContext, _: Map<String, Value>) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "generate_image".into(),
            reason: "renderer offline".into(),
        })
    }
}

#[tokio::test]
async fn failing_tool_is_reported_and_the_turn_completes() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![
            calls(vec![
                call("call_1", "generate_image", json!({"prompt": "a fox"})),
                call("call_2", "summarize_messages", json!({
                    "start_time": "2024-01-01T11:00:00Z",
                    "end_time": "2024-01-01T12:00:00Z"
                })),
            ]),
            text("The image failed, but here is the summary."),
        ],
    ));
    let mut catalog = chorus_tools::default_catalog(Arc::new(ImageCache::new()));
    catalog.register(Box::new(BrokenTool));
    let h = Harness::with_catalog(vec![provider.clone()], catalog);

    h.turn(from_ann("1", "draw a fox and summarize")).await;

    let results = tool_results(&provider.requests()[1]);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "call_1");
    assert!(results[0].1.starts_with("Tool `generate_image` failed:"));
    assert!(results[0].1.contains("renderer offline"));
    assert_eq!(results[1].1, "Alice talked about lunch.");

    assert_eq!(
        h.channel.replies(),
        vec!["The image failed, but here is the summary."]
    );
}

#[tokio::test]
async fn unknown_tool_gets_a_declining_result() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![
            calls(vec![call("call_1", "teleport", json!({}))]),
            text("I can't teleport."),
        ],
    ));
    let h = Harness::new(vec![provider.clone()]);

    h.turn(from_ann("1", "teleport me")).await;

    assert_eq!(
        tool_results(&provider.requests()[1]),
        vec![("call_1".to_string(), "Tool `teleport` is not supported here.".to_string())]
    );
    assert_eq!(h.channel.replies(), vec!["I can't teleport."]);
}

#[tokio::test]
async fn native_tool_calls_need_no_follow_up() {
    let response = ChatResponse::from_parts(
        Some("It is sunny.".into()),
        vec![call("ws_1", "web_search", json!({"query": "weather"}))],
        None,
    );
    let provider = Arc::new(ScriptedProvider::new("openai", vec![Ok(response)]));
    let h = Harness::new(vec![provider.clone()]);

    h.turn(from_ann("1", "weather?")).await;

    assert_eq!(provider.requests().len(), 1);
    assert_eq!(h.channel.replies(), vec!["It is sunny."]);
}

#[tokio::test]
async fn switch_to_unregistered_provider_returns_registry_error() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![
            calls(vec![call("call_1", "switch_provider", json!({"provider_id": "grok"}))]),
            text("Grok isn't available."),
        ],
    ));
    let h = Harness::new(vec![provider.clone()]);

    h.turn(from_ann("1", "switch to grok")).await;

    assert_eq!(
        tool_results(&provider.requests()[1])[0].1,
        "Provider \"grok\" is not registered. Available providers: openai."
    );
    let active = h
        .orchestrator
        .registry()
        .get_for_channel(&ChannelId::new("general"))
        .await
        .unwrap();
    assert_eq!(active.id(), "openai");
}

#[tokio::test]
async fn switch_mid_turn_hands_the_follow_up_to_the_new_provider() {
    let openai = Arc::new(ScriptedProvider::new(
        "openai",
        vec![calls(vec![call(
            "call_1",
            "switch_provider",
            json!({"provider_id": "gemini"}),
        )])],
    ));
    let gemini = Arc::new(ScriptedProvider::new(
        "gemini",
        vec![text("Gemini here."), text("Still Gemini.")],
    ));
    let h = Harness::new(vec![openai.clone(), gemini.clone()]);

    h.turn(from_ann("1", "let me talk to gemini")).await;

    assert_eq!(openai.requests().len(), 1);
    let follow_up = &gemini.requests()[0];
    assert_eq!(follow_up.tool_choice, ToolChoice::None);
    let prompt = follow_up.entries[0].as_message().unwrap().text();
    assert!(prompt.contains("answering as GEMINI"));
    assert!(prompt.contains("You are the gemini voice."));
    assert_eq!(
        tool_results(follow_up)[0].1,
        "Switched this channel to GEMINI. It will answer from now on."
    );
    assert_eq!(h.channel.replies(), vec!["Gemini here."]);

    let state = h.orchestrator.store().get(&ChannelId::new("general")).await.unwrap();
    assert_eq!(state.provider_id, "gemini");

    // The next turn goes straight to gemini with the history intact
    h.turn(from_ann("2", "thanks")).await;
    let next = &gemini.requests()[1];
    assert_eq!(next.tool_choice, ToolChoice::Auto);
    assert!(next.entries.len() > state.entries.len());
    assert_eq!(h.channel.replies().last().unwrap(), "Still Gemini.");
}

#[tokio::test]
async fn provider_pinned_elsewhere_rewrites_only_the_prompt() {
    let openai = Arc::new(ScriptedProvider::new("openai", vec![text("one")]));
    let gemini = Arc::new(ScriptedProvider::new("gemini", vec![text("two")]));
    let h = Harness::new(vec![openai.clone(), gemini.clone()]);

    h.turn(from_ann("1", "hi")).await;
    h.orchestrator
        .registry()
        .set_for_channel(&ChannelId::new("general"), "gemini")
        .await
        .unwrap();
    h.turn(from_ann("2", "hi again")).await;

    let entries = &gemini.requests()[0].entries;
    assert_eq!(roles(entries), vec!["developer", "user", "assistant", "user"]);
    assert!(entries[0].as_message().unwrap().text().contains("gemini voice"));
    assert_eq!(entries[2].as_message().unwrap().text(), "one");
    assert_eq!(h.channel.fetch_count(), 1);
}

#[tokio::test]
async fn provider_failure_apologizes_and_keeps_prior_state() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![
            text("first"),
            Err(ProviderError::Network("connection reset".into())),
        ],
    ));
    let h = Harness::new(vec![provider.clone()]);

    h.turn(from_ann("1", "hi")).await;
    let before = h.state_entries().await.unwrap();

    h.turn(from_ann("2", "are you there?")).await;

    assert_eq!(h.channel.replies(), vec!["first", APOLOGY]);
    assert_eq!(h.state_entries().await.unwrap(), before);
}

#[tokio::test]
async fn failure_on_a_fresh_channel_persists_nothing() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![Err(ProviderError::RateLimited { retry_after_secs: 5 })],
    ));
    let h = Harness::new(vec![provider]);

    h.turn(from_ann("1", "hi")).await;

    assert_eq!(h.channel.replies(), vec![APOLOGY]);
    assert!(h.state_entries().await.is_none());
}

#[tokio::test]
async fn missing_text_yields_filler() {
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![Ok(ChatResponse::from_parts(Some("  ".into()), vec![], None))],
    ));
    let h = Harness::new(vec![provider]);

    h.turn(from_ann("1", "hmm")).await;

    assert_eq!(h.channel.replies(), vec![FILLER]);
}

#[tokio::test]
async fn no_registered_provider_replies_and_stops() {
    let h = Harness::new(vec![]);

    h.turn(from_ann("1", "hello?")).await;

    assert_eq!(h.channel.replies(), vec![NO_PROVIDER]);
    assert!(h.state_entries().await.is_none());
    assert_eq!(h.channel.fetch_count(), 0);
}

#[tokio::test]
async fn continuation_threads_through_both_calls_and_persists() {
    let first = ChatResponse::from_parts(
        None,
        vec![call("call_1", "summarize_messages", json!({
            "start_time": "2024-01-01T11:00:00Z",
            "end_time": "2024-01-01T12:00:00Z"
        }))],
        Some(Continuation::new("openai", "carry-1")),
    );
    let provider = Arc::new(ScriptedProvider::new(
        "openai",
        vec![Ok(first), text("done"), text("again")],
    ));
    let h = Harness::new(vec![provider.clone()]);

    h.turn(from_ann("1", "summarize")).await;
    h.turn(from_ann("2", "and now?")).await;

    let requests = provider.requests();
    assert_eq!(requests[0].continuation, None);
    assert_eq!(requests[1].continuation, Some(Continuation::new("openai", "carry-1")));
    assert_eq!(requests[2].continuation, Some(Continuation::new("openai", "carry-1")));
}

#[tokio::test]
async fn long_replies_are_split() {
    let long = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
    let provider = Arc::new(ScriptedProvider::new("openai", vec![text(&long)]));
    let h = Harness::new(vec![provider]);

    h.turn(from_ann("1", "essay please")).await;

    let replies = h.channel.replies();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], "a".repeat(1500));
    assert_eq!(replies[1], "b".repeat(1500));
}

#[tokio::test(start_paused = true)]
async fn idle_conversations_are_rebuilt_from_history() {
    let provider = Arc::new(ScriptedProvider::new("openai", vec![text("one"), text("two")]));
    let h = Harness::build(
        vec![provider.clone()],
        chorus_tools::default_catalog(Arc::new(ImageCache::new())),
        MockChannel::default(),
        ConversationStore::new(Duration::from_secs(300)),
    );

    h.turn(from_ann("1", "hi")).await;
    tokio::time::advance(Duration::from_secs(301)).await;
    h.turn(from_ann("2", "still there?")).await;

    assert_eq!(h.channel.fetch_count(), 2);
    assert_eq!(roles(&provider.requests()[1].entries), vec!["developer", "user"]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_turns_on_one_channel_are_serialized() {
    let provider = Arc::new(
        ScriptedProvider::new("openai", vec![text("one"), text("two")])
            .with_delay(Duration::from_millis(50)),
    );
    let h = Harness::new(vec![provider.clone()]);
    let orchestrator = Arc::new(h.orchestrator);

    let a = orchestrator.spawn(h.channel.clone(), from_ann("1", "first"));
    let b = orchestrator.spawn(h.channel.clone(), from_ann("2", "second"));
    a.await.unwrap();
    b.await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    // The second turn saw the first turn's reply
    assert!(requests[1].entries.iter().any(|e| {
        e.as_message()
            .is_some_and(|m| m.role == Role::Assistant && m.text() == "one")
    }));

    let state = orchestrator
        .store()
        .get(&ChannelId::new("general"))
        .await
        .unwrap();
    let users = state
        .entries
        .iter()
        .filter(|e| e.as_message().is_some_and(|m| m.role == Role::User))
        .count();
    assert_eq!(users, 2);
}

#[tokio::test]
async fn finished_turns_release_their_channel_locks() {
    let script = (0..20).map(|i| text(&format!("reply {i}"))).collect();
    let provider = Arc::new(ScriptedProvider::new("openai", script));
    let h = Harness::new(vec![provider]);

    for i in 0..20 {
        let mut message = from_ann(&format!("m{i}"), "hello");
        message.channel_id = ChannelId::new(format!("room-{i}"));
        h.turn(message).await;
    }

    assert_eq!(h.channel.replies().len(), 20);
    assert_eq!(h.orchestrator.turn_locks().len().await, 0);
}
