//! Per-channel conversation state with idle expiry.
//!
//! Expiry is lazy: a state idle for at least the timeout is evicted by the
//! read that notices it. [`ConversationStore::spawn_sweeper`] can additionally
//! drop expired states on an interval to bound memory.

use chorus_core::channel::ChannelId;
use chorus_core::conversation::ConversationState;
use chorus_core::message::ConversationEntry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Conversations idle this long are forgotten.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct ConversationStore {
    states: Arc<RwLock<HashMap<ChannelId, ConversationState>>>,
    idle_timeout: Duration,
}

impl ConversationStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn is_expired(&self, state: &ConversationState, now: Instant) -> bool {
        now.saturating_duration_since(state.last_touched) >= self.idle_timeout
    }

    /// Remove `channel_id` if its state has expired.
    ///
    /// Returns whether a live state remains.
    fn evict_if_expired(
        &self,
        states: &mut HashMap<ChannelId, ConversationState>,
        channel_id: &ChannelId,
    ) -> bool {
        let expired = match states.get(channel_id) {
            Some(state) => self.is_expired(state, Instant::now()),
            None => return false,
        };
        if expired {
            states.remove(channel_id);
            debug!(channel_id = %channel_id, "Conversation expired");
        }
        !expired
    }

    /// Live state for a channel, or `None` if absent or expired.
    pub async fn get(&self, channel_id: &ChannelId) -> Option<ConversationState> {
        let mut states = self.states.write().await;
        if !self.evict_if_expired(&mut states, channel_id) {
            return None;
        }
        states.get(channel_id).cloned()
    }

    /// Create or replace a channel's state with a fresh timestamp.
    pub async fn insert(&self, channel_id: ChannelId, mut state: ConversationState) {
        state.touch();
        self.states.write().await.insert(channel_id, state);
    }

    /// Replace an existing state. No-op (returns false) when none is live.
    pub async fn set(&self, channel_id: &ChannelId, mut state: ConversationState) -> bool {
        let mut states = self.states.write().await;
        if !self.evict_if_expired(&mut states, channel_id) {
            return false;
        }
        state.touch();
        states.insert(channel_id.clone(), state);
        true
    }

    /// Replace only the entry list, keeping the provider id.
    pub async fn update(&self, channel_id: &ChannelId, entries: Vec<ConversationEntry>) -> bool {
        self.modify(channel_id, |state| state.entries = entries).await
    }

    /// Refresh the timestamp only.
    pub async fn touch(&self, channel_id: &ChannelId) -> bool {
        self.modify(channel_id, |_| {}).await
    }

    /// Update only the pinned provider id.
    pub async fn switch_provider(&self, channel_id: &ChannelId, provider_id: &str) -> bool {
        self.modify(channel_id, |state| state.provider_id = provider_id.to_string())
            .await
    }

    async fn modify(
        &self,
        channel_id: &ChannelId,
        apply: impl FnOnce(&mut ConversationState),
    ) -> bool {
        let mut states = self.states.write().await;
        if !self.evict_if_expired(&mut states, channel_id) {
            return false;
        }
        match states.get_mut(channel_id) {
            Some(state) => {
                apply(state);
                state.touch();
                true
            }
            None => false,
        }
    }

    /// Drop every expired state, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, state| !self.is_expired(state, now));
        let removed = before - states.len();
        if removed > 0 {
            debug!(removed, "Swept expired conversations");
        }
        removed
    }

    /// Number of stored states, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run [`sweep`](Self::sweep) every `period` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep().await;
            }
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}
