//! Conversation entry domain types.
//!
//! A conversation is an ordered list of [`ConversationEntry`] values:
//! chat messages, tool calls requested by a model, and the host's results for
//! those calls. Insertion order is chronological order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The role of a message author in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// Developer instructions (the seeded prompt)
    Developer,
    /// The AI assistant
    Assistant,
    /// A chat participant
    User,
}

impl Role {
    /// System and developer entries are instructions, not dialogue.
    pub fn is_instruction(self) -> bool {
        matches!(self, Role::System | Role::Developer)
    }
}

/// One part of a message's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// An externally hosted image, referenced by URL.
    Image { url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// A chat message entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    pub content: Vec<ContentPart>,

    /// Optional display name of the author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            name: None,
        }
    }

    /// Content with the empty case normalized to a single empty text part.
    ///
    /// Backends reject empty content arrays, so adapters translate this view.
    pub fn normalized_content(&self) -> Vec<ContentPart> {
        if self.content.is_empty() {
            vec![ContentPart::text("")]
        } else {
            self.content.clone()
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A tool invocation requested by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID (the backend's, or a generated one when the backend omits it)
    pub id: String,

    pub name: String,

    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Parse a backend-supplied JSON argument string.
    ///
    /// Malformed or non-object payloads yield an empty mapping so a single bad
    /// call never aborts the turn.
    pub fn parse_arguments(tool_name: &str, raw: &str) -> Map<String, Value> {
        if raw.trim().is_empty() {
            return Map::new();
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::warn!(tool = %tool_name, payload = %other, "Tool arguments are not an object, using empty arguments");
                Map::new()
            }
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "Malformed tool arguments, using empty arguments");
                Map::new()
            }
        }
    }

    /// Arguments re-encoded as a JSON string.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// The host's answer to a [`ToolCall`] with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub content: String,
}

/// A single entry of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationEntry {
    Message(Message),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl ConversationEntry {
    pub fn developer(text: impl Into<String>) -> Self {
        Self::Message(Message::new(Role::Developer, vec![ContentPart::text(text)]))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::Message(Message::new(Role::System, vec![ContentPart::text(text)]))
    }

    pub fn user(content: Vec<ContentPart>, name: Option<String>) -> Self {
        Self::Message(Message {
            role: Role::User,
            content,
            name,
        })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Message(Message::new(Role::Assistant, vec![ContentPart::text(text)]))
    }

    pub fn tool_result(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult(ToolResult {
            id: id.into(),
            name: name.into(),
            content: content.into(),
        })
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this is a system or developer message.
    pub fn is_instruction(&self) -> bool {
        self.as_message().is_some_and(|m| m.role.is_instruction())
    }
}
