//! Conversation state storage.
//!
//! [`ConversationStore`] is the injectable key-value seam for per-conversation
//! state; [`InMemoryConversationStore`] is the process-local default.
//! [`ConversationLocks`] serializes message handling per conversation so a
//! load-modify-save cycle is never interleaved with another one for the same
//! conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::state::ConversationState;

/// Storage for request flow state, keyed by conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the state of a conversation.
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationState>>;

    /// Save the state of a conversation, replacing any previous one.
    async fn set(&self, conversation_id: &str, state: ConversationState) -> Result<()>;

    /// Remove the state of a conversation. Returns whether one existed.
    async fn delete(&self, conversation_id: &str) -> Result<bool>;

    /// Remove states not written for longer than `max_idle`.
    /// Returns the number removed.
    async fn purge_idle(&self, max_idle: Duration) -> Result<usize>;
}

#[derive(Debug)]
struct Entry {
    state: ConversationState,
    touched: Instant,
}

/// Process-local conversation store.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationState>> {
        let entries = self.entries.read().await;
        Ok(entries.get(conversation_id).map(|e| e.state.clone()))
    }

    async fn set(&self, conversation_id: &str, state: ConversationState) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            conversation_id.to_string(),
            Entry {
                state,
                touched: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(conversation_id).is_some())
    }

    async fn purge_idle(&self, max_idle: Duration) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|id, entry| {
            let keep = entry.touched.elapsed() <= max_idle;
            if !keep {
                debug!(conversation_id = %id, "Dropping idle request flow");
            }
            keep
        });
        Ok(before - entries.len())
    }
}

/// Per-conversation mutual exclusion.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    /// Create an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a conversation.
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(conversation_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Forget locks nobody holds or waits on.
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }
}
