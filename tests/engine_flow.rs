// tests/engine_flow.rs
// End-to-end flow through a real on-disk store

use std::sync::Arc;

use engram::config::{MaintenanceConfig, StoreConfig};
use engram::maintenance;
use engram::memory::{ChatMessage, ConversationLog, MemoryRepository};
use engram::relationship::{AffinityStatus, RelationshipRepository};
use engram::store::{NullStore, Store, open_store};

fn maintenance_config() -> MaintenanceConfig {
    MaintenanceConfig {
        enabled: true,
        interval_secs: 1800,
        decay_after_days: 7,
        decay_factor: 0.9,
        eviction_floor: 0.1,
    }
}

fn tags(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn full_engine_flow_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        path: dir
            .path()
            .join("engram.db")
            .to_string_lossy()
            .into_owned(),
    };

    let store = open_store(&config);
    assert!(store.available());

    // Memories: store, retrieve by tag, reinforce.
    let memories = MemoryRepository::new(store.clone());
    let id = memories
        .store(
            "prefers terse answers",
            &tags(&["style", "pref"]),
            serde_json::json!({"source": "chat"}),
        )
        .unwrap()
        .unwrap();
    memories
        .store("works on databases", &tags(&["work"]), serde_json::json!({}))
        .unwrap();

    let found = memories.retrieve(Some(&tags(&["style"])), 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);

    assert!(memories.touch(&id).unwrap());

    // Conversations: append and read back.
    let log = ConversationLog::new(store.clone());
    let conv_id = log
        .append(
            vec![
                ChatMessage::new("user", "hello"),
                ChatMessage::new("assistant", "hi"),
            ],
            serde_json::json!({}),
        )
        .unwrap()
        .unwrap();
    assert_eq!(log.get(&conv_id).unwrap().unwrap().messages.len(), 2);

    // Relationships: defaults, bounded updates, derived style.
    let relationships = RelationshipRepository::new(store.clone());
    assert_eq!(relationships.get("alice").unwrap().level, 50);
    let rel = relationships.update("alice", 35).unwrap().unwrap();
    assert_eq!(rel.level, 85);
    assert_eq!(rel.status, AffinityStatus::Friendly);
    assert_eq!(relationships.get_style("alice").unwrap().tone, "warm");

    // Maintenance: a fresh corpus is rescored and tag weights appear.
    let report =
        maintenance::run_cycle(store.as_ref(), &maintenance_config(), chrono::Utc::now()).unwrap();
    assert_eq!(report.evicted, 0);
    assert_eq!(report.rescored, 2);
    assert_eq!(report.distinct_tags, 3);

    let rescored = memories.retrieve(None, 10).unwrap();
    for memory in &rescored {
        assert!(memory.weight <= 1.0);
        assert!(!memory.tag_weights.is_empty());
    }

    // Counts reflect everything written above.
    let stats = store.stats().unwrap();
    assert_eq!(stats.memories, 2);
    assert_eq!(stats.conversations, 1);
    assert_eq!(stats.relationships, 1);

    // Reopening the same path sees the same data.
    drop(store);
    let reopened = open_store(&config);
    assert_eq!(reopened.stats().unwrap().memories, 2);
}

#[test]
fn degraded_engine_never_errors_at_the_surface() {
    let store: Arc<dyn Store> = Arc::new(NullStore);

    let memories = MemoryRepository::new(store.clone());
    assert!(
        memories
            .store("x", &tags(&["t"]), serde_json::json!({}))
            .unwrap()
            .is_none()
    );
    assert!(memories.retrieve(None, 10).unwrap().is_empty());
    assert!(!memories.touch("id").unwrap());

    let log = ConversationLog::new(store.clone());
    assert!(log.append(vec![], serde_json::json!({})).unwrap().is_none());

    let relationships = RelationshipRepository::new(store.clone());
    assert_eq!(relationships.get("bob").unwrap().level, 50);
    assert!(relationships.update("bob", 10).unwrap().is_none());

    // The maintenance cycle is the one surface that reports the outage.
    let err =
        maintenance::run_cycle(store.as_ref(), &maintenance_config(), chrono::Utc::now())
            .unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn scheduler_starts_and_stops_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        path: dir
            .path()
            .join("engram.db")
            .to_string_lossy()
            .into_owned(),
    };
    let store = open_store(&config);

    let (shutdown_tx, handle) = maintenance::spawn(store, maintenance_config());
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
