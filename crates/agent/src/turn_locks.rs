//! Per-channel turn sequencing.
//!
//! Turns on the same channel queue behind each other so the second turn reads
//! the state the first one wrote. Turns on different channels never wait on
//! each other.

use std::collections::HashMap;
use std::sync::Arc;

use chorus_core::channel::ChannelId;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Default)]
pub struct TurnLocks {
    locks: Arc<Mutex<HashMap<ChannelId, Arc<Semaphore>>>>,
}

/// Held for the duration of one turn; dropping it lets the next turn in.
pub struct TurnGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other turn holds `channel_id`.
    pub async fn acquire(&self, channel_id: &ChannelId) -> TurnGuard {
        let semaphore = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(channel_id.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        // The semaphores are never closed, so this only fails if that changes
        TurnGuard {
            _permit: semaphore.acquire_owned().await.ok(),
        }
    }

    /// Drop locks nobody holds or waits on.
    pub async fn cleanup_unused(&self) {
        let mut locks = self.locks.lock().await;
        // Holders and waiters each keep a clone of the semaphore
        locks.retain(|_, sem| Arc::strong_count(sem) > 1);
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
