// src/store/sqlite.rs
// SQLite implementation of the Store capability interface

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use super::{Store, StoreStats, TOUCH_WEIGHT_BOOST};
use crate::error::Result;
use crate::memory::types::{ChatMessage, Conversation, Memory};
use crate::relationship::{AffinityStatus, Relationship};

/// Idempotent schema, applied at every open.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    access_count INTEGER NOT NULL DEFAULT 1,
    tag_weights TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_memories_last_accessed
    ON memories(last_accessed);

CREATE INDEX IF NOT EXISTS idx_memories_weight
    ON memories(weight);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    messages TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationships (
    user_id TEXT PRIMARY KEY,
    level INTEGER NOT NULL,
    status TEXT NOT NULL,
    last_interaction TEXT NOT NULL,
    interaction_count INTEGER NOT NULL DEFAULT 0
);
"#;

/// Timestamps are stored as fixed-width RFC 3339 text (nanosecond
/// precision, Z suffix) so lexicographic SQL comparisons order correctly
/// and a read-back is bit-identical to the value that was written.
fn to_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a Memory from a row with the standard column order:
/// (id, content, tags, metadata, created_at, last_accessed, weight,
///  access_count, tag_weights)
fn parse_memory_row(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let tags: String = row.get(2)?;
    let metadata: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let last_accessed: String = row.get(5)?;
    let tag_weights: String = row.get(8)?;

    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        tags: parse_json(2, &tags)?,
        metadata: parse_json(3, &metadata)?,
        created_at: parse_ts(4, &created_at)?,
        last_accessed: parse_ts(5, &last_accessed)?,
        weight: row.get(6)?,
        access_count: row.get(7)?,
        tag_weights: parse_json(8, &tag_weights)?,
    })
}

fn parse_relationship_row(row: &rusqlite::Row) -> rusqlite::Result<Relationship> {
    let status: String = row.get(2)?;
    let last_interaction: String = row.get(3)?;

    Ok(Relationship {
        user_id: row.get(0)?,
        level: row.get(1)?,
        status: status.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown affinity status: {status}").into(),
            )
        })?,
        last_interaction: parse_ts(3, &last_interaction)?,
        interaction_count: row.get(4)?,
    })
}

/// Store implementation backed by a single SQLite file.
///
/// Uses WAL mode so the maintenance sweep and request-path reads can
/// overlap. All per-document field updates are single SQL statements,
/// which gives the atomicity the `Store` contract requires.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `path`, creating file and schema if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        info!(path = %path.display(), "memory store opened");
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a lock on the connection.
    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        debug!("schema ensured");
        Ok(())
    }
}

impl Store for Database {
    fn available(&self) -> bool {
        true
    }

    fn insert_memory(&self, memory: &Memory) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO memories
                 (id, content, tags, metadata, created_at, last_accessed,
                  weight, access_count, tag_weights)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                memory.id,
                memory.content,
                serde_json::to_string(&memory.tags)?,
                serde_json::to_string(&memory.metadata)?,
                to_ts(memory.created_at),
                to_ts(memory.last_accessed),
                memory.weight,
                memory.access_count,
                serde_json::to_string(&memory.tag_weights)?,
            ],
        )?;
        Ok(())
    }

    fn query_memories(&self, tags: Option<&[String]>, limit: usize) -> Result<Vec<Memory>> {
        let conn = self.conn();

        let rows = match tags {
            Some(wanted) if !wanted.is_empty() => {
                // Any-match: the memory's tag array intersects the wanted set.
                let wanted_json = serde_json::to_string(wanted)?;
                let mut stmt = conn.prepare(
                    "SELECT id, content, tags, metadata, created_at, last_accessed,
                            weight, access_count, tag_weights
                     FROM memories m
                     WHERE EXISTS (
                         SELECT 1 FROM json_each(m.tags) mt
                         JOIN json_each(?1) q ON mt.value = q.value
                     )
                     ORDER BY last_accessed DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![wanted_json, limit as i64], parse_memory_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            _ => {
                let mut stmt = conn.prepare(
                    "SELECT id, content, tags, metadata, created_at, last_accessed,
                            weight, access_count, tag_weights
                     FROM memories
                     ORDER BY last_accessed DESC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], parse_memory_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(rows)
    }

    fn touch_memory(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE memories
             SET last_accessed = ?1,
                 access_count = access_count + 1,
                 weight = weight * ?2
             WHERE id = ?3",
            params![to_ts(now), TOUCH_WEIGHT_BOOST, id],
        )?;
        Ok(updated > 0)
    }

    fn decay_unaccessed(&self, cutoff: DateTime<Utc>, factor: f64) -> Result<usize> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE memories SET weight = weight * ?1 WHERE last_accessed < ?2",
            params![factor, to_ts(cutoff)],
        )?;
        Ok(affected)
    }

    fn evict_below(&self, floor: f64) -> Result<usize> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM memories WHERE weight < ?1", params![floor])?;
        Ok(deleted)
    }

    fn all_memories(&self) -> Result<Vec<Memory>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, content, tags, metadata, created_at, last_accessed,
                    weight, access_count, tag_weights
             FROM memories
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], parse_memory_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_weight(&self, id: &str, weight: f64) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE memories SET weight = ?1 WHERE id = ?2",
            params![weight, id],
        )?;
        Ok(())
    }

    fn set_tag_weights(&self, id: &str, weights: &HashMap<String, f64>) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE memories SET tag_weights = ?1 WHERE id = ?2",
            params![serde_json::to_string(weights)?, id],
        )?;
        Ok(())
    }

    fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO conversations (id, messages, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.id,
                serde_json::to_string(&conversation.messages)?,
                serde_json::to_string(&conversation.metadata)?,
                to_ts(conversation.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, messages, metadata, created_at FROM conversations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            let messages: String = row.get(1)?;
            let metadata: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok(Conversation {
                id: row.get(0)?,
                messages: parse_json::<Vec<ChatMessage>>(1, &messages)?,
                metadata: parse_json(2, &metadata)?,
                created_at: parse_ts(3, &created_at)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn get_relationship(&self, user_id: &str) -> Result<Option<Relationship>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, level, status, last_interaction, interaction_count
             FROM relationships WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![user_id], parse_relationship_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn insert_relationship(&self, relationship: &Relationship) -> Result<()> {
        let conn = self.conn();
        // OR IGNORE: two racing lazy creates both succeed, first row wins.
        conn.execute(
            "INSERT OR IGNORE INTO relationships
                 (user_id, level, status, last_interaction, interaction_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                relationship.user_id,
                relationship.level,
                relationship.status.as_str(),
                to_ts(relationship.last_interaction),
                relationship.interaction_count,
            ],
        )?;
        Ok(())
    }

    fn apply_relationship_update(
        &self,
        user_id: &str,
        level: i64,
        status: AffinityStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE relationships
             SET level = ?1,
                 status = ?2,
                 last_interaction = ?3,
                 interaction_count = interaction_count + 1
             WHERE user_id = ?4",
            params![level, status.as_str(), to_ts(now), user_id],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn();
        let memories: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?;
        let conversations: i64 =
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;
        let relationships: i64 =
            conn.query_row("SELECT COUNT(*) FROM relationships", [], |r| r.get(0))?;

        Ok(StoreStats {
            memories: memories as usize,
            conversations: conversations as usize,
            relationships: relationships as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn memory_with(content: &str, tags: &[&str], now: DateTime<Utc>) -> Memory {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        Memory::new(content, &tags, serde_json::json!({}), now)
    }

    #[test]
    fn test_open_in_memory() {
        let db = create_test_store();
        assert!(db.available());
        assert_eq!(db.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_memory_roundtrip() {
        let db = create_test_store();
        let now = Utc::now();
        let memory = memory_with("the user likes tea", &["drink", "preference"], now);
        db.insert_memory(&memory).unwrap();

        let all = db.all_memories().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "the user likes tea");
        assert_eq!(all[0].tags, vec!["drink", "preference"]);
        assert_eq!(all[0].weight, 1.0);
        assert_eq!(all[0].access_count, 1);
        assert_eq!(all[0].created_at, memory.created_at);
    }

    #[test]
    fn test_query_memories_any_match() {
        let db = create_test_store();
        let now = Utc::now();
        db.insert_memory(&memory_with("x", &["a"], now)).unwrap();
        db.insert_memory(&memory_with("y", &["b", "c"], now)).unwrap();

        let hits = db
            .query_memories(Some(&["a".to_string(), "z".to_string()]), 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "x");

        let misses = db.query_memories(Some(&["z".to_string()]), 10).unwrap();
        assert!(misses.is_empty());

        let both = db
            .query_memories(Some(&["a".to_string(), "c".to_string()]), 10)
            .unwrap();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_query_memories_unfiltered_order_and_limit() {
        let db = create_test_store();
        let now = Utc::now();
        db.insert_memory(&memory_with("old", &[], now - Duration::hours(2)))
            .unwrap();
        db.insert_memory(&memory_with("new", &[], now)).unwrap();
        db.insert_memory(&memory_with("mid", &[], now - Duration::hours(1)))
            .unwrap();

        let all = db.query_memories(None, 10).unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["new", "mid", "old"]);

        let top = db.query_memories(None, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].content, "new");
    }

    #[test]
    fn test_touch_memory_atomics() {
        let db = create_test_store();
        let now = Utc::now();
        let memory = memory_with("x", &[], now - Duration::days(1));
        db.insert_memory(&memory).unwrap();

        assert!(db.touch_memory(&memory.id, now).unwrap());
        let got = &db.all_memories().unwrap()[0];
        assert_eq!(got.access_count, 2);
        assert!((got.weight - 1.1).abs() < 1e-9);
        assert_eq!(got.last_accessed, now);

        assert!(!db.touch_memory("no-such-id", now).unwrap());
    }

    #[test]
    fn test_decay_and_evict() {
        let db = create_test_store();
        let now = Utc::now();
        let stale = memory_with("stale", &[], now - Duration::days(10));
        let fresh = memory_with("fresh", &[], now);
        db.insert_memory(&stale).unwrap();
        db.insert_memory(&fresh).unwrap();

        let cutoff = now - Duration::days(7);
        assert_eq!(db.decay_unaccessed(cutoff, 0.9).unwrap(), 1);

        let weights: HashMap<String, f64> = db
            .all_memories()
            .unwrap()
            .into_iter()
            .map(|m| (m.content.clone(), m.weight))
            .collect();
        assert!((weights["stale"] - 0.9).abs() < 1e-9);
        assert_eq!(weights["fresh"], 1.0);

        db.set_weight(&stale.id, 0.05).unwrap();
        assert_eq!(db.evict_below(0.1).unwrap(), 1);
        let survivors = db.all_memories().unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].content, "fresh");
    }

    #[test]
    fn test_set_tag_weights() {
        let db = create_test_store();
        let memory = memory_with("x", &["a", "b"], Utc::now());
        db.insert_memory(&memory).unwrap();

        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.5);
        weights.insert("b".to_string(), 1.0);
        db.set_tag_weights(&memory.id, &weights).unwrap();

        let got = &db.all_memories().unwrap()[0];
        assert_eq!(got.tag_weights, weights);
    }

    #[test]
    fn test_conversation_roundtrip() {
        let db = create_test_store();
        let conversation = Conversation::new(
            vec![
                ChatMessage::new("user", "hi"),
                ChatMessage::new("assistant", "hello"),
            ],
            serde_json::json!({"channel": "cli"}),
            Utc::now(),
        );
        db.insert_conversation(&conversation).unwrap();

        let got = db.get_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(got.messages.len(), 2);
        assert_eq!(got.messages[0].role, "user");
        assert_eq!(got.metadata["channel"], "cli");

        assert!(db.get_conversation("absent").unwrap().is_none());
    }

    #[test]
    fn test_timestamps_survive_storage_exactly() {
        let db = create_test_store();
        let now = Utc::now();

        let memory = memory_with("x", &[], now);
        db.insert_memory(&memory).unwrap();
        let got = &db.all_memories().unwrap()[0];
        assert_eq!(got.created_at, now);
        assert_eq!(got.last_accessed, now);

        db.insert_relationship(&Relationship::new("alice", now)).unwrap();
        let first = db.get_relationship("alice").unwrap().unwrap();
        let second = db.get_relationship("alice").unwrap().unwrap();
        assert_eq!(first.last_interaction, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_relationship_roundtrip() {
        let db = create_test_store();
        let now = Utc::now();
        let rel = Relationship::new("alice", now);
        db.insert_relationship(&rel).unwrap();

        let got = db.get_relationship("alice").unwrap().unwrap();
        assert_eq!(got.level, 50);
        assert_eq!(got.status, AffinityStatus::Normal);
        assert_eq!(got.interaction_count, 0);

        db.apply_relationship_update("alice", 85, AffinityStatus::Friendly, now)
            .unwrap();
        let got = db.get_relationship("alice").unwrap().unwrap();
        assert_eq!(got.level, 85);
        assert_eq!(got.status, AffinityStatus::Friendly);
        assert_eq!(got.interaction_count, 1);

        // OR IGNORE keeps the existing row
        db.insert_relationship(&Relationship::new("alice", now)).unwrap();
        let got = db.get_relationship("alice").unwrap().unwrap();
        assert_eq!(got.level, 85);
    }
}
