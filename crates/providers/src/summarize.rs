//! Channel summaries over a bounded time window.
//!
//! Shared by every adapter's `MessageSummarizer`: validate the window, page
//! the channel history backward, keep human messages inside the window and
//! ask the backend for one summary of the resulting transcript.

use chorus_core::channel::{ChannelId, ChatChannel, ChatMessage};
use chorus_core::error::{ChannelError, ProviderError, SummarizeError};
use chorus_core::message::ConversationEntry;
use chorus_core::provider::{AiProvider, ChatRequest, ToolChoice};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::debug;

/// Messages fetched per history page (the Discord maximum).
pub const PAGE_SIZE: usize = 100;

/// Upper bound on history pages fetched for one summary.
pub const MAX_BATCHES: usize = 50;

const SUMMARY_INSTRUCTIONS: &str = "You summarize chat transcripts. Write a concise \
summary of the conversation below: the main topics, any decisions or conclusions, and \
who contributed what. Refer to participants by name. Do not invent anything that is \
not in the transcript.";

/// A validated `[start, end]` window, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SummaryWindow {
    pub fn max_span() -> TimeDelta {
        TimeDelta::days(7)
    }

    /// Validate in order: both parse, the span fits, start is not after end.
    pub fn parse(start_time: &str, end_time: &str) -> Result<Self, SummarizeError> {
        let start = parse_timestamp(start_time)?;
        let end = parse_timestamp(end_time)?;

        if end - start > Self::max_span() {
            return Err(SummarizeError::WindowTooLarge);
        }
        if start > end {
            return Err(SummarizeError::InvertedWindow);
        }

        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Parse an ISO 8601 timestamp. Values without an offset are taken as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SummarizeError> {
    let trimmed = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SummarizeError::InvalidTimestamp(raw.to_string()))
}

/// Human messages inside `window`, oldest first.
///
/// History is paged backward and paging stops once a page reaches back past
/// the window start.
pub async fn collect_messages(
    channel: &dyn ChatChannel,
    channel_id: &ChannelId,
    window: &SummaryWindow,
) -> Result<Vec<ChatMessage>, ChannelError> {
    let mut collected = Vec::new();
    let mut before: Option<String> = None;

    for batch_no in 0..MAX_BATCHES {
        let batch = channel
            .fetch_history(channel_id, PAGE_SIZE, before.as_deref())
            .await?;
        let Some(oldest) = batch.last() else {
            break;
        };

        let reached_start = oldest.timestamp < window.start;
        let exhausted = batch.len() < PAGE_SIZE;
        before = Some(oldest.id.clone());
        debug!(channel_id = %channel_id, batch = batch_no, fetched = batch.len(), "Fetched history page");

        collected.extend(
            batch
                .into_iter()
                .filter(|m| !m.author.is_bot && window.contains(m.timestamp)),
        );

        if reached_start || exhausted {
            break;
        }
    }

    collected.reverse();
    Ok(collected)
}

/// One line per message: `[timestamp] Name: content`.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                m.timestamp.to_rfc3339(),
                m.author.display_name,
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarize a channel window with `provider`.
pub async fn summarize_window(
    provider: &dyn AiProvider,
    channel: &dyn ChatChannel,
    channel_id: &ChannelId,
    start_time: &str,
    end_time: &str,
) -> Result<String, SummarizeError> {
    let window = SummaryWindow::parse(start_time, end_time)?;
    let messages = collect_messages(channel, channel_id, &window).await?;

    if messages.is_empty() {
        return Ok(format!("No messages found between {start_time} and {end_time}."));
    }

    debug!(
        provider = provider.id(),
        channel_id = %channel_id,
        messages = messages.len(),
        "Summarizing channel window"
    );

    let request = ChatRequest {
        entries: vec![
            ConversationEntry::developer(SUMMARY_INSTRUCTIONS),
            ConversationEntry::user(
                vec![chorus_core::ContentPart::text(transcript(&messages))],
                None,
            ),
        ],
        tools: Vec::new(),
        tool_choice: ToolChoice::None,
        continuation: None,
    };

    let response = provider.chat(request).await?;
    response.text.ok_or_else(|| {
        SummarizeError::Provider(ProviderError::InvalidResponse(
            "summary response contained no text".into(),
        ))
    })
}
