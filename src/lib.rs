// src/lib.rs
//! Adaptive memory and affinity engine for conversational agents.
//!
//! Three cooperating parts share one SQLite-backed [`store::Store`]:
//!
//! - [`memory`]: weighted long-term memories with access tracking, plus an
//!   append-only conversation log.
//! - [`maintenance`]: a periodic decay/evict/rescore cycle and tag-graph
//!   scoring that keep the memory corpus bounded and relevance-ordered.
//! - [`relationship`]: bounded per-user affinity levels with derived
//!   interaction styles.
//!
//! When the database cannot be opened the engine runs degraded behind a
//! null store: reads are empty, writes are dropped with a warning, nothing
//! panics.

pub mod config;
pub mod error;
pub mod maintenance;
pub mod memory;
pub mod relationship;
pub mod store;

pub use config::EngramConfig;
pub use error::{EngramError, Result};
pub use memory::{ConversationLog, MemoryRepository};
pub use relationship::RelationshipRepository;
pub use store::{Store, open_store};
