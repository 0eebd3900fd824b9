// src/relationship/mod.rs
// Per-user affinity scoring and interaction-style selection

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngramError, Result};
use crate::store::Store;

/// Level assigned to a user on first contact.
pub const DEFAULT_LEVEL: i64 = 50;

/// Affinity tier, a pure function of `level` under fixed thresholds:
/// `level >= 80` friendly, `level >= 50` normal, else cold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityStatus {
    Friendly,
    Normal,
    Cold,
}

impl AffinityStatus {
    /// Derive the tier from a level. Total over all of `[0, 100]`.
    pub fn from_level(level: i64) -> Self {
        if level >= 80 {
            Self::Friendly
        } else if level >= 50 {
            Self::Normal
        } else {
            Self::Cold
        }
    }

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Normal => "normal",
            Self::Cold => "cold",
        }
    }
}

impl std::fmt::Display for AffinityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AffinityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "friendly" => Ok(Self::Friendly),
            "normal" => Ok(Self::Normal),
            "cold" => Ok(Self::Cold),
            _ => Err(format!("unknown affinity status: {s}")),
        }
    }
}

/// One relationship record per user identifier.
///
/// `status` is never stored independently of `level`; both are written
/// together from the same threshold derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub user_id: String,
    pub level: i64,
    pub status: AffinityStatus,
    pub last_interaction: DateTime<Utc>,
    pub interaction_count: i64,
}

impl Relationship {
    /// The lazily-created default record for a first-seen user.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            level: DEFAULT_LEVEL,
            status: AffinityStatus::from_level(DEFAULT_LEVEL),
            last_interaction: now,
            interaction_count: 0,
        }
    }
}

/// Tone/persona hints derived from the affinity tier. Pure lookup,
/// no randomness, no hidden state beyond `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionStyle {
    pub level: i64,
    pub status: AffinityStatus,
    pub honorifics: Vec<String>,
    pub emoticons: Vec<String>,
    pub tone: String,
    pub response_length: String,
}

impl InteractionStyle {
    fn for_status(level: i64, status: AffinityStatus) -> Self {
        let (honorifics, emoticons, tone, response_length): (&[&str], &[&str], &str, &str) =
            match status {
                AffinityStatus::Friendly => (
                    &["dear", "my friend"],
                    &["❤️", "✨", "💕"],
                    "warm",
                    "detailed",
                ),
                AffinityStatus::Normal => (&["", "you"], &["😊", "👍"], "polite", "moderate"),
                AffinityStatus::Cold => (&["sir", "madam"], &[], "formal", "brief"),
            };

        Self {
            level,
            status,
            honorifics: honorifics.iter().map(|s| s.to_string()).collect(),
            emoticons: emoticons.iter().map(|s| s.to_string()).collect(),
            tone: tone.to_string(),
            response_length: response_length.to_string(),
        }
    }
}

/// Bounded per-user affinity score with a derived status tier.
pub struct RelationshipRepository {
    store: Arc<dyn Store>,
}

impl RelationshipRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Existing record, or the lazily-created default. On a degraded
    /// store the default is returned without being persisted, so the
    /// caller always gets a usable snapshot.
    pub fn get(&self, user_id: &str) -> Result<Relationship> {
        if let Some(existing) = self.store.get_relationship(user_id)? {
            return Ok(existing);
        }

        let fresh = Relationship::new(user_id, Utc::now());
        match self.store.insert_relationship(&fresh) {
            Ok(()) => {}
            Err(EngramError::StorageUnavailable) => {
                debug!(user_id, "store unavailable, serving default relationship");
            }
            Err(e) => return Err(e),
        }
        Ok(fresh)
    }

    /// Shift the affinity level by `delta`, clamped to `[0, 100]`, and
    /// rederive the status tier. Returns the updated snapshot, or `None`
    /// when the store is unavailable.
    pub fn update(&self, user_id: &str, delta: i64) -> Result<Option<Relationship>> {
        let current = self.get(user_id)?;
        let level = (current.level + delta).clamp(0, 100);
        let status = AffinityStatus::from_level(level);
        let now = Utc::now();

        match self
            .store
            .apply_relationship_update(user_id, level, status, now)
        {
            Ok(()) => Ok(Some(Relationship {
                user_id: user_id.to_string(),
                level,
                status,
                last_interaction: now,
                interaction_count: current.interaction_count + 1,
            })),
            Err(EngramError::StorageUnavailable) => {
                warn!(user_id, "store unavailable, dropping affinity update");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Interaction style for a user, keyed purely by the status tier.
    pub fn get_style(&self, user_id: &str) -> Result<InteractionStyle> {
        let relationship = self.get(user_id)?;
        Ok(InteractionStyle::for_status(
            relationship.level,
            relationship.status,
        ))
    }
}
