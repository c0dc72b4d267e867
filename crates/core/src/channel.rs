//! Channel trait: the abstraction over the chat platform.
//!
//! A ChatChannel can page a channel's history backwards, send replies, show a
//! "working" indicator and upload generated images. The orchestrator never
//! talks to the platform any other way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Platform identifier of a chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Platform-specific user ID
    pub id: String,

    /// Human-readable name shown in the channel
    pub display_name: String,

    /// Whether the author is a bot account
    #[serde(default)]
    pub is_bot: bool,
}

/// An attachment on a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,

    /// MIME type, when the platform reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// A message as seen in a channel, either inbound or from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform message ID (used as the paging cursor)
    pub id: String,

    pub channel_id: ChannelId,

    pub author: Author,

    /// Raw text content
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    pub timestamp: DateTime<Utc>,
}

/// Image bytes produced by a generator, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// The prompt that produced the image
    pub prompt: String,
}

impl GeneratedImage {
    /// A file name matching the MIME type.
    pub fn file_name(&self) -> String {
        let ext = match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        };
        format!("image.{ext}")
    }
}

/// The core ChatChannel trait.
///
/// Message history is returned newest first, mirroring how platforms page.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Human-readable channel name (e.g., "discord", "cli").
    fn name(&self) -> &str;

    /// The user ID the bot itself posts as.
    fn self_id(&self) -> &str;

    /// Fetch up to `limit` messages older than the message `before`
    /// (exclusive), newest first. `None` starts at the latest message.
    async fn fetch_history(
        &self,
        channel_id: &ChannelId,
        limit: usize,
        before: Option<&str>,
    ) -> std::result::Result<Vec<ChatMessage>, ChannelError>;

    /// Send a text reply to the channel.
    async fn send_reply(
        &self,
        channel_id: &ChannelId,
        content: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Show a "working" indicator (if the platform supports it).
    async fn send_typing(&self, _channel_id: &ChannelId) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Upload a generated image to the channel.
    async fn send_image(
        &self,
        channel_id: &ChannelId,
        image: &GeneratedImage,
    ) -> std::result::Result<(), ChannelError>;
}
