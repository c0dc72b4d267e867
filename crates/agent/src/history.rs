//! Rendering channel messages into conversation entries.

use chorus_core::channel::{ChannelId, ChatChannel, ChatMessage};
use chorus_core::error::ChannelError;
use chorus_core::message::{ContentPart, ConversationEntry};

/// A participant's message: "DisplayName: content" plus its image attachments.
pub fn render_user(message: &ChatMessage) -> ConversationEntry {
    let mut content = vec![ContentPart::text(format!(
        "{}: {}",
        message.author.display_name, message.content
    ))];
    content.extend(
        message
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| ContentPart::image(&a.url)),
    );
    ConversationEntry::user(content, Some(message.author.display_name.clone()))
}

/// Render one history message as seen by the bot posting as `self_id`.
///
/// Other bots are skipped. The bot's own messages become assistant entries.
pub fn render_history_message(message: &ChatMessage, self_id: &str) -> Option<ConversationEntry> {
    if message.author.id == self_id {
        return Some(ConversationEntry::assistant(message.content.clone()));
    }
    if message.author.is_bot {
        return None;
    }
    Some(render_user(message))
}

/// Up to `limit` messages posted before `before`, rendered oldest first.
pub async fn seed_entries(
    channel: &dyn ChatChannel,
    channel_id: &ChannelId,
    before: &str,
    limit: usize,
) -> Result<Vec<ConversationEntry>, ChannelError> {
    let mut messages = channel.fetch_history(channel_id, limit, Some(before)).await?;
    messages.truncate(limit);
    messages.reverse();

    let self_id = channel.self_id();
    Ok(messages
        .iter()
        .filter_map(|m| render_history_message(m, self_id))
        .collect())
}
