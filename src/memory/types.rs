// src/memory/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque memory identifier (UUID v4, stored as text).
pub type MemoryId = String;

/// Opaque conversation identifier (UUID v4, stored as text).
pub type ConversationId = String;

/// One retained fact.
///
/// `content`, `tags` and `metadata` are immutable after creation.
/// `weight`, `access_count`, `last_accessed` and `tag_weights` are
/// mutated by access tracking and by the maintenance cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Retention strength, recomputed each maintenance tick. Always <= 1.0
    /// after a rescore; entries below the eviction floor are deleted.
    pub weight: f64,
    pub access_count: i64,
    /// Per-tag relationship weights, written only by the maintenance cycle.
    pub tag_weights: HashMap<String, f64>,
}

impl Memory {
    /// Create a fresh memory: weight 1.0, access_count 1, both timestamps `now`.
    pub fn new(
        content: impl Into<String>,
        tags: &[String],
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        // Tags are a set: drop duplicates, keep first-seen order.
        let mut seen = Vec::with_capacity(tags.len());
        for tag in tags {
            if !seen.contains(tag) {
                seen.push(tag.clone());
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            tags: seen,
            metadata,
            created_at: now,
            last_accessed: now,
            weight: 1.0,
            access_count: 1,
            tag_weights: HashMap::new(),
        }
    }
}

/// One message inside a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// An immutable conversation transcript, retrievable by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub messages: Vec<ChatMessage>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(messages: Vec<ChatMessage>, metadata: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages,
            metadata,
            created_at: now,
        }
    }
}
