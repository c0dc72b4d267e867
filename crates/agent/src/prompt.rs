//! The developer prompt that leads every conversation.

use chorus_core::message::ConversationEntry;
use chorus_core::provider::{AiProvider, ToolKind};
use chorus_core::tool::ToolCatalog;
use chrono::{DateTime, TimeZone};

/// Build the developer prompt for `provider`.
///
/// Lists one usage bullet per tool the provider advertises and ends with the
/// current time.
pub fn developer_prompt<Tz>(
    bot_name: &str,
    provider: &dyn AiProvider,
    catalog: &ToolCatalog,
    now: DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut prompt = format!(
        "You are {bot_name}, an assistant in a group chat, currently answering as {}. \
         Messages from people are prefixed with their display name. \
         Keep replies conversational and reasonably short.",
        provider.display_name()
    );

    let personality = provider.personality().trim();
    if !personality.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(personality);
    }

    let guidance: Vec<&str> = provider
        .tools()
        .iter()
        .filter_map(|tool| {
            if tool.host_handled {
                catalog.get(&tool.name).map(|t| t.guidance())
            } else {
                native_guidance(tool.kind)
            }
        })
        .filter(|g| !g.is_empty())
        .collect();

    if !guidance.is_empty() {
        prompt.push_str("\n\nTools:");
        for line in guidance {
            prompt.push_str("\n- ");
            prompt.push_str(line);
        }
    }

    prompt.push_str(&format!(
        "\n\nThe current time is {}.",
        now.format("%A, %B %-d, %Y %-I:%M %p %Z")
    ));
    prompt
}

fn native_guidance(kind: ToolKind) -> Option<&'static str> {
    match kind {
        ToolKind::WebSearch => Some("Search the web when asked about recent events or facts you are unsure of."),
        ToolKind::CodeInterpreter => Some("Run code when a question needs exact calculation or data processing."),
        ToolKind::Function => None,
    }
}

/// Replace the leading instruction entry with `prompt`, or insert one.
pub fn set_developer_prompt(entries: &mut Vec<ConversationEntry>, prompt: String) {
    let entry = ConversationEntry::developer(prompt);
    match entries.first() {
        Some(first) if first.is_instruction() => entries[0] = entry,
        _ => entries.insert(0, entry),
    }
}
