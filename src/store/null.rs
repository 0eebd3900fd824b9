// src/store/null.rs
// Null-object store used when the backing database is unreachable

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{Store, StoreStats};
use crate::error::{EngramError, Result};
use crate::memory::types::{Conversation, Memory};
use crate::relationship::{AffinityStatus, Relationship};

/// Degraded-mode store: every mutation reports `StorageUnavailable`,
/// every read returns an empty result. Selected once at construction
/// when the real database cannot be opened; never panics.
pub struct NullStore;

impl Store for NullStore {
    fn available(&self) -> bool {
        false
    }

    fn insert_memory(&self, _memory: &Memory) -> Result<()> {
        Err(EngramError::StorageUnavailable)
    }

    fn query_memories(&self, _tags: Option<&[String]>, _limit: usize) -> Result<Vec<Memory>> {
        Ok(Vec::new())
    }

    fn touch_memory(&self, _id: &str, _now: DateTime<Utc>) -> Result<bool> {
        Err(EngramError::StorageUnavailable)
    }

    fn decay_unaccessed(&self, _cutoff: DateTime<Utc>, _factor: f64) -> Result<usize> {
        Err(EngramError::StorageUnavailable)
    }

    fn evict_below(&self, _floor: f64) -> Result<usize> {
        Err(EngramError::StorageUnavailable)
    }

    fn all_memories(&self) -> Result<Vec<Memory>> {
        Ok(Vec::new())
    }

    fn set_weight(&self, _id: &str, _weight: f64) -> Result<()> {
        Err(EngramError::StorageUnavailable)
    }

    fn set_tag_weights(&self, _id: &str, _weights: &HashMap<String, f64>) -> Result<()> {
        Err(EngramError::StorageUnavailable)
    }

    fn insert_conversation(&self, _conversation: &Conversation) -> Result<()> {
        Err(EngramError::StorageUnavailable)
    }

    fn get_conversation(&self, _id: &str) -> Result<Option<Conversation>> {
        Ok(None)
    }

    fn get_relationship(&self, _user_id: &str) -> Result<Option<Relationship>> {
        Ok(None)
    }

    fn insert_relationship(&self, _relationship: &Relationship) -> Result<()> {
        Err(EngramError::StorageUnavailable)
    }

    fn apply_relationship_update(
        &self,
        _user_id: &str,
        _level: i64,
        _status: AffinityStatus,
        _now: DateTime<Utc>,
    ) -> Result<()> {
        Err(EngramError::StorageUnavailable)
    }

    fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_empty() {
        let store = NullStore;
        assert!(!store.available());
        assert!(store.query_memories(None, 10).unwrap().is_empty());
        assert!(store.all_memories().unwrap().is_empty());
        assert!(store.get_conversation("x").unwrap().is_none());
        assert!(store.get_relationship("u").unwrap().is_none());
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_mutations_report_unavailable() {
        let store = NullStore;
        let memory = Memory::new("x", &[], serde_json::json!({}), Utc::now());
        assert!(store.insert_memory(&memory).unwrap_err().is_unavailable());
        assert!(
            store
                .touch_memory("id", Utc::now())
                .unwrap_err()
                .is_unavailable()
        );
        assert!(store.evict_below(0.1).unwrap_err().is_unavailable());
    }
}
