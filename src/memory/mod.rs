// src/memory/mod.rs
// Weighted memory store and conversation log

pub mod types;

pub use types::{ChatMessage, Conversation, ConversationId, Memory, MemoryId};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{EngramError, Result};
use crate::store::Store;

/// Weighted long-term memory store.
///
/// Writes degrade gracefully: when the backing store is unreachable the
/// repository returns `Ok(None)` instead of failing the caller, and reads
/// return empty results. The degraded path is chosen by the injected
/// [`Store`] implementation, never by this type.
pub struct MemoryRepository {
    store: Arc<dyn Store>,
}

impl MemoryRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist a new memory with full initial weight. Returns the generated
    /// id, or `None` when the store is unavailable.
    pub fn store(
        &self,
        content: impl Into<String>,
        tags: &[String],
        metadata: serde_json::Value,
    ) -> Result<Option<MemoryId>> {
        let memory = Memory::new(content, tags, metadata, Utc::now());
        match self.store.insert_memory(&memory) {
            Ok(()) => {
                debug!(id = %memory.id, tags = ?memory.tags, "[memory] stored");
                Ok(Some(memory.id))
            }
            Err(EngramError::StorageUnavailable) => {
                warn!("[memory] store unavailable, dropping memory");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Memories matching any of `tags` (or all memories when `None`),
    /// most recently accessed first, at most `limit` entries.
    ///
    /// Retrieval does not count as an access; callers decide which of the
    /// returned memories were actually used and [`touch`](Self::touch) those.
    pub fn retrieve(&self, tags: Option<&[String]>, limit: usize) -> Result<Vec<Memory>> {
        self.store.query_memories(tags, limit)
    }

    /// Record that a memory was used: bumps `access_count`, boosts `weight`
    /// and refreshes `last_accessed` in one atomic update. Returns false for
    /// an unknown id or a degraded store.
    pub fn touch(&self, id: &str) -> Result<bool> {
        match self.store.touch_memory(id, Utc::now()) {
            Ok(touched) => Ok(touched),
            Err(EngramError::StorageUnavailable) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Append-only transcript log, separate from weighted memories: entries
/// here are never decayed, rescored or evicted.
pub struct ConversationLog {
    store: Arc<dyn Store>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist a finished transcript. Returns the generated id, or `None`
    /// when the store is unavailable.
    pub fn append(
        &self,
        messages: Vec<ChatMessage>,
        metadata: serde_json::Value,
    ) -> Result<Option<ConversationId>> {
        let conversation = Conversation::new(messages, metadata, Utc::now());
        match self.store.insert_conversation(&conversation) {
            Ok(()) => Ok(Some(conversation.id)),
            Err(EngramError::StorageUnavailable) => {
                warn!("[memory] store unavailable, dropping conversation");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<Conversation>> {
        self.store.get_conversation(id)
    }
}
