// src/maintenance/mod.rs
// Periodic decay/evict/rescore cycle over the memory corpus

pub mod tag_graph;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::MaintenanceConfig;
use crate::error::Result;
use crate::store::Store;

/// What one maintenance tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Memories whose weight was decayed for inactivity.
    pub decayed: usize,
    /// Memories deleted for falling below the eviction floor.
    pub evicted: usize,
    /// Memories rescored from access frequency and age.
    pub rescored: usize,
    /// Distinct tags observed by the tag-graph pass.
    pub distinct_tags: usize,
    /// Distinct co-occurring tag pairs observed by the tag-graph pass.
    pub tag_pairs: usize,
}

/// Run one full maintenance cycle at the given instant.
///
/// Phase order is load-bearing: decay applies a penalty to stale entries,
/// eviction then removes everything under the floor, and only afterwards
/// does the rescore recompute weights from scratch. A stale entry therefore
/// gets one decayed tick to be accessed again before its rescored weight is
/// eligible for eviction on the next tick.
pub fn run_cycle(
    store: &dyn Store,
    config: &MaintenanceConfig,
    now: DateTime<Utc>,
) -> Result<CycleReport> {
    let cutoff = now - Duration::days(config.decay_after_days);
    let decayed = store.decay_unaccessed(cutoff, config.decay_factor)?;
    let evicted = store.evict_below(config.eviction_floor)?;

    let mut rescored = 0;
    for memory in store.all_memories()? {
        let age_days = (now - memory.created_at).num_days() + 1;
        let age = age_days as f64;
        let weight = ((memory.access_count as f64 / age) * (age + 1.0).log10()).min(1.0);
        store.set_weight(&memory.id, weight)?;
        rescored += 1;
    }

    let tag_report = tag_graph::run(store)?;

    Ok(CycleReport {
        decayed,
        evicted,
        rescored,
        distinct_tags: tag_report.distinct_tags,
        tag_pairs: tag_report.tag_pairs,
    })
}

/// Spawn the maintenance scheduler.
///
/// Ticks every `interval_secs`; a missed tick is skipped rather than
/// bursted. A failed cycle is logged and abandoned, the next tick starts
/// from a clean state. Returns the shutdown handle (send `true` to stop)
/// and the task handle to await for a clean exit.
pub fn spawn(
    store: Arc<dyn Store>,
    config: MaintenanceConfig,
) -> (watch::Sender<bool>, JoinHandle<()>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            config.interval_secs.max(1),
        ));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_secs = config.interval_secs,
            "[maintenance] scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let store = store.clone();
                    let config = config.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        run_cycle(store.as_ref(), &config, Utc::now())
                    })
                    .await;

                    match outcome {
                        Ok(Ok(report)) => info!(
                            decayed = report.decayed,
                            evicted = report.evicted,
                            rescored = report.rescored,
                            distinct_tags = report.distinct_tags,
                            "[maintenance] cycle complete"
                        ),
                        Ok(Err(e)) => error!("[maintenance] cycle failed: {e}"),
                        Err(e) => error!("[maintenance] cycle panicked: {e}"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("[maintenance] scheduler stopping");
                        break;
                    }
                }
            }
        }
    });

    (shutdown_tx, handle)
}
