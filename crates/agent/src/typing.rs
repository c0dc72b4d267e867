//! The "still working" indicator shown while a turn is in flight.

use std::sync::Arc;
use std::time::Duration;

use chorus_core::channel::{ChannelId, ChatChannel};
use tokio::task::JoinHandle;
use tracing::debug;

/// Repeats the channel's typing indicator until stopped or dropped.
///
/// The first indicator is sent immediately. The loop ends on its own after the
/// first failed send.
pub struct TypingIndicator {
    handle: JoinHandle<()>,
}

impl TypingIndicator {
    pub fn start(channel: Arc<dyn ChatChannel>, channel_id: ChannelId, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = channel.send_typing(&channel_id).await {
                    debug!(channel_id = %channel_id, error = %e, "Typing indicator failed, stopping");
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        // Drop aborts
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
