// src/store/mod.rs
// Capability interface over the persistent document store

mod null;
mod sqlite;

pub use null::NullStore;
pub use sqlite::Database;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::memory::types::{Conversation, Memory};
use crate::relationship::{AffinityStatus, Relationship};

/// Multiplier applied to `weight` on every memory access.
pub const TOUCH_WEIGHT_BOOST: f64 = 1.1;

/// Row/record counts across the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub memories: usize,
    pub conversations: usize,
    pub relationships: usize,
}

/// Capability interface over the backing document store.
///
/// Two implementations exist and are selected once at construction:
/// [`Database`] (SQLite) and [`NullStore`] (degraded mode when the
/// store is unreachable at startup). Repositories never branch on
/// handle presence; degradation is expressed by `NullStore` returning
/// `StorageUnavailable` for mutations and empty results for reads.
///
/// Field-level updates (`touch_memory`'s increment/multiply, the decay
/// sweep's bulk multiply) must be atomic per document so concurrent
/// writers never lose updates.
pub trait Store: Send + Sync {
    /// Whether the backing store is reachable.
    fn available(&self) -> bool;

    // ── Memories ──

    fn insert_memory(&self, memory: &Memory) -> Result<()>;

    /// Memories whose tag set intersects `tags` (any-match), newest access
    /// first, truncated to `limit`. With `tags = None` the filter is empty.
    fn query_memories(&self, tags: Option<&[String]>, limit: usize) -> Result<Vec<Memory>>;

    /// Record an access: `last_accessed = now`, `access_count += 1`,
    /// `weight *= TOUCH_WEIGHT_BOOST`, all in one atomic document update.
    /// Returns false when no such memory exists.
    fn touch_memory(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Bulk-multiply `weight` by `factor` for every memory whose
    /// `last_accessed` is older than `cutoff`. Returns the affected count.
    fn decay_unaccessed(&self, cutoff: DateTime<Utc>, factor: f64) -> Result<usize>;

    /// Delete every memory with `weight < floor`. Returns the deleted count.
    fn evict_below(&self, floor: f64) -> Result<usize>;

    /// Full corpus scan, used by the rescore and tag-graph phases.
    fn all_memories(&self) -> Result<Vec<Memory>>;

    fn set_weight(&self, id: &str, weight: f64) -> Result<()>;

    /// Overwrite a memory's tag-relationship weights.
    fn set_tag_weights(&self, id: &str, weights: &HashMap<String, f64>) -> Result<()>;

    // ── Conversations ──

    fn insert_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Absent-id lookup yields `Ok(None)`, not an error.
    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    // ── Relationships ──

    fn get_relationship(&self, user_id: &str) -> Result<Option<Relationship>>;

    /// Insert the lazily-created default record; a pre-existing row wins.
    fn insert_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Apply a computed level/status, bump `interaction_count` atomically,
    /// and stamp `last_interaction`.
    fn apply_relationship_update(
        &self,
        user_id: &str,
        level: i64,
        status: AffinityStatus,
        now: DateTime<Utc>,
    ) -> Result<()>;

    // ── Diagnostics ──

    fn stats(&self) -> Result<StoreStats>;
}

/// Open the configured store, degrading to a [`NullStore`] when the
/// database cannot be opened. The selection happens exactly once; the
/// rest of the engine only ever sees the `Store` trait.
pub fn open_store(config: &StoreConfig) -> Arc<dyn Store> {
    match Database::open(&config.path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            warn!(
                path = %config.path,
                error = %e,
                "store unreachable, running degraded (mutations dropped, reads empty)"
            );
            Arc::new(NullStore)
        }
    }
}
