// src/maintenance/tag_graph.rs
// Tag-relationship scoring over the memory corpus

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::store::Store;

/// Outcome of one tag-graph pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagGraphReport {
    /// Distinct tags seen across the corpus.
    pub distinct_tags: usize,
    /// Distinct co-occurring tag pairs observed this pass.
    pub tag_pairs: usize,
    /// Memories whose tag weights were rewritten.
    pub updated: usize,
}

/// Recompute tag-relationship weights for every memory.
///
/// Each tag's weight is its corpus-wide occurrence count divided by the
/// number of distinct tags, so the same tag gets the same weight on every
/// memory carrying it. Pair co-occurrence is tallied for observability
/// only and is deliberately not persisted anywhere.
pub fn run(store: &dyn Store) -> Result<TagGraphReport> {
    let memories = store.all_memories()?;

    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    let mut pair_counts: HashMap<(String, String), usize> = HashMap::new();

    for memory in &memories {
        for tag in &memory.tags {
            *tag_counts.entry(tag.clone()).or_default() += 1;
        }
        for (i, a) in memory.tags.iter().enumerate() {
            for b in &memory.tags[i + 1..] {
                let pair = if a <= b {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                *pair_counts.entry(pair).or_default() += 1;
            }
        }
    }

    let distinct = tag_counts.len();
    if distinct == 0 {
        return Ok(TagGraphReport::default());
    }

    let mut updated = 0;
    for memory in &memories {
        if memory.tags.is_empty() {
            continue;
        }
        let weights: HashMap<String, f64> = memory
            .tags
            .iter()
            .map(|tag| (tag.clone(), tag_counts[tag] as f64 / distinct as f64))
            .collect();
        store.set_tag_weights(&memory.id, &weights)?;
        updated += 1;
    }

    debug!(
        distinct_tags = distinct,
        tag_pairs = pair_counts.len(),
        updated,
        "[maintenance] tag graph recomputed"
    );

    Ok(TagGraphReport {
        distinct_tags: distinct,
        tag_pairs: pair_counts.len(),
        updated,
    })
}
