//! Local terminal channel.
//!
//! Keeps the session's history in process, prints replies to stdout and
//! writes generated images into a directory. Used by `chorus chat`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chorus_core::channel::{Author, ChannelId, ChatChannel, ChatMessage, GeneratedImage};
use chorus_core::error::ChannelError;
use tracing::info;

pub const CLI_CHANNEL_ID: &str = "cli";
const SELF_ID: &str = "chorus";

pub struct CliChannel {
    /// Oldest first
    history: Mutex<Vec<ChatMessage>>,
    next_id: AtomicU64,
    image_dir: PathBuf,
    bot_name: String,
    echo: bool,
}

impl CliChannel {
    pub fn new(image_dir: impl Into<PathBuf>, bot_name: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            image_dir: image_dir.into(),
            bot_name: bot_name.into(),
            echo: true,
        }
    }

    /// Keep replies in history without printing them.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(CLI_CHANNEL_ID)
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Record a message typed by `author` and return it for the orchestrator.
    pub fn user_message(&self, author: &str, content: &str) -> ChatMessage {
        let message = self.message(
            Author {
                id: format!("local:{author}"),
                display_name: author.into(),
                is_bot: false,
            },
            content,
        );
        self.push(message.clone());
        message
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn message(&self, author: Author, content: &str) -> ChatMessage {
        ChatMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            channel_id: self.channel_id(),
            author,
            content: content.into(),
            attachments: vec![],
            timestamp: chrono::Utc::now(),
        }
    }

    fn push(&self, message: ChatMessage) {
        if let Ok(mut history) = self.history.lock() {
            history.push(message);
        }
    }
}

#[async_trait]
impl ChatChannel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn self_id(&self) -> &str {
        SELF_ID
    }

    async fn fetch_history(
        &self,
        _channel_id: &ChannelId,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<ChatMessage>, ChannelError> {
        let history = self
            .history
            .lock()
            .map_err(|_| ChannelError::ConnectionLost("history lock poisoned".into()))?;
        let end = before
            .and_then(|id| history.iter().position(|m| m.id == id))
            .unwrap_or(history.len());
        Ok(history[..end].iter().rev().take(limit).cloned().collect())
    }

    async fn send_reply(&self, _channel_id: &ChannelId, content: &str) -> Result<(), ChannelError> {
        if self.echo {
            println!("{}: {content}", self.bot_name);
        }
        let reply = self.message(
            Author {
                id: SELF_ID.into(),
                display_name: self.bot_name.clone(),
                is_bot: true,
            },
            content,
        );
        self.push(reply);
        Ok(())
    }

    async fn send_image(&self, _channel_id: &ChannelId, image: &GeneratedImage) -> Result<(), ChannelError> {
        let delivery_failed = |e: std::io::Error| ChannelError::DeliveryFailed {
            channel: "cli".into(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(delivery_failed)?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let path = self.image_dir.join(format!("{n}-{}", image.file_name()));
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(delivery_failed)?;

        info!(path = %path.display(), "Saved generated image");
        if self.echo {
            println!("[image saved to {}]", path.display());
        }
        Ok(())
    }
}
