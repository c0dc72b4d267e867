//! Discord REST channel.
//!
//! Pages history, posts replies, triggers the typing indicator and uploads
//! generated images over the Discord HTTP API. Gateway events are received by
//! the host; [`DiscordMessage`] converts their payloads into [`ChatMessage`]s.

use std::time::Duration;

use async_trait::async_trait;
use chorus_config::DiscordConfig;
use chorus_core::channel::{Attachment, Author, ChannelId, ChatChannel, ChatMessage, GeneratedImage};
use chorus_core::error::ChannelError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// Discord's cap on messages per history page.
const MAX_PAGE: usize = 100;

pub struct DiscordChannel {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    /// User id of the bot account
    self_id: String,
}

impl std::fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("api_url", &self.api_url)
            .field("bot_token", &"[REDACTED]")
            .field("self_id", &self.self_id)
            .finish()
    }
}

impl DiscordChannel {
    pub fn new(bot_token: impl Into<String>, self_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_url: DEFAULT_API_URL.into(),
            bot_token: bot_token.into(),
            self_id: self_id.into(),
        }
    }

    pub fn from_config(config: &DiscordConfig, self_id: impl Into<String>) -> Result<Self, ChannelError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ChannelError::NotConfigured("discord.bot_token is not set".into()))?;
        let mut channel = Self::new(token, self_id);
        if let Some(url) = &config.api_url {
            channel = channel.with_api_url(url.clone());
        }
        Ok(channel)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, channel_id: &ChannelId, path: &str) -> String {
        format!("{}/channels/{}/{path}", self.api_url, channel_id)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.bot_token))
    }

    async fn send(
        &self,
        channel_id: &ChannelId,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: format!("discord:{channel_id}"),
                reason: e.to_string(),
            })?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Discord API error");
    Err(ChannelError::ApiError {
        status_code: status.as_u16(),
        message: body,
    })
}

#[async_trait]
impl ChatChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn fetch_history(
        &self,
        channel_id: &ChannelId,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<ChatMessage>, ChannelError> {
        let mut query = vec![("limit", limit.clamp(1, MAX_PAGE).to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }

        debug!(channel_id = %channel_id, limit, before = ?before, "Fetching Discord history");
        let response = self
            .send(channel_id, self.client.get(self.url(channel_id, "messages")).query(&query))
            .await?;
        let messages: Vec<DiscordMessage> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;

        Ok(messages
            .into_iter()
            .map(|m| m.into_chat_message(&self.self_id))
            .collect())
    }

    async fn send_reply(&self, channel_id: &ChannelId, content: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "content": content,
            "allowed_mentions": { "parse": ["users"] },
        });
        self.send(
            channel_id,
            self.client.post(self.url(channel_id, "messages")).json(&body),
        )
        .await?;
        Ok(())
    }

    async fn send_typing(&self, channel_id: &ChannelId) -> Result<(), ChannelError> {
        self.send(channel_id, self.client.post(self.url(channel_id, "typing")))
            .await?;
        Ok(())
    }

    async fn send_image(&self, channel_id: &ChannelId, image: &GeneratedImage) -> Result<(), ChannelError> {
        let file_name = image.file_name();
        let file = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        let payload = serde_json::json!({
            "attachments": [{ "id": 0, "filename": file_name }],
        });
        let form = reqwest::multipart::Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", file);

        debug!(channel_id = %channel_id, bytes = image.bytes.len(), "Uploading image to Discord");
        self.send(
            channel_id,
            self.client.post(self.url(channel_id, "messages")).multipart(form),
        )
        .await?;
        Ok(())
    }
}

// ── Gateway / REST payloads ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMember {
    #[serde(default)]
    pub nick: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordAttachment {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A message object as delivered by REST history or a MESSAGE_CREATE event.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub member: Option<DiscordMember>,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<DiscordAttachment>,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
}

impl DiscordMessage {
    /// Whether the message pings `user_id`.
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
            || self.content.contains(&format!("<@{user_id}>"))
            || self.content.contains(&format!("<@!{user_id}>"))
    }

    /// Server nickname, then global name, then username.
    pub fn display_name(&self) -> &str {
        self.member
            .as_ref()
            .and_then(|m| m.nick.as_deref())
            .or(self.author.global_name.as_deref())
            .unwrap_or(&self.author.username)
    }

    /// Convert into the platform-neutral message, dropping pings of `bot_id`.
    pub fn into_chat_message(self, bot_id: &str) -> ChatMessage {
        let content = strip_mention(&self.content, bot_id);
        let display_name = self.display_name().to_string();
        ChatMessage {
            id: self.id,
            channel_id: ChannelId::new(self.channel_id),
            author: Author {
                id: self.author.id,
                display_name,
                is_bot: self.author.bot,
            },
            content,
            attachments: self
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    url: a.url,
                    content_type: a.content_type,
                    filename: Some(a.filename),
                })
                .collect(),
            timestamp: self.timestamp,
        }
    }
}

/// Remove `<@id>` and `<@!id>` pings of `user_id` and tidy the whitespace.
pub fn strip_mention(content: &str, user_id: &str) -> String {
    content
        .replace(&format!("<@!{user_id}>"), "")
        .replace(&format!("<@{user_id}>"), "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
