//! Ladder cache
//!
//! Sorted projection of every player's rating, rebuilt lazily from the player
//! store after an invalidation. Concurrent readers that find the cache stale
//! share one rebuild: the first takes the rebuild lock and reads the store,
//! the rest wait on the lock and then serve the fresh entries.
//!
//! Staleness is tracked with generations rather than a bare flag. Every
//! invalidation bumps `generation`; a rebuild records the generation it
//! started from, so an invalidation that lands while the store read is in
//! flight leaves the cache stale and the next `get()` rebuilds again.

use crate::config::LadderOrder;
use crate::error::{LadderError, Result};
use crate::metrics::MetricsCollector;
use crate::store::PlayerStore;
use crate::types::{LadderEntry, PlayerId};
use crate::utils::with_store_timeout;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug)]
struct CachedLadder {
    /// Generation the entries were built from (0 = never built)
    built_from: u64,
    entries: Arc<Vec<LadderEntry>>,
}

/// Lazily rebuilt, coalescing ladder cache
pub struct LadderCache {
    store: Arc<dyn PlayerStore>,
    order: LadderOrder,
    store_timeout: Duration,
    generation: AtomicU64,
    cached: RwLock<CachedLadder>,
    rebuild_lock: tokio::sync::Mutex<()>,
    rebuilds: AtomicU64,
    metrics: Option<Arc<MetricsCollector>>,
}

impl LadderCache {
    /// Create a cache that starts dirty
    pub fn new(store: Arc<dyn PlayerStore>, order: LadderOrder, store_timeout: Duration) -> Self {
        Self {
            store,
            order,
            store_timeout,
            generation: AtomicU64::new(1),
            cached: RwLock::new(CachedLadder {
                built_from: 0,
                entries: Arc::new(Vec::new()),
            }),
            rebuild_lock: tokio::sync::Mutex::new(()),
            rebuilds: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Attach a metrics collector for rebuild timing
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn order(&self) -> LadderOrder {
        self.order
    }

    /// Mark the cache stale. Call after any rating mutation or player insert.
    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, AtomicOrdering::AcqRel) + 1;
        debug!("Ladder invalidated (generation {})", generation);
    }

    /// Whether the next `get()` will read the store
    pub fn is_dirty(&self) -> bool {
        match self.cached.read() {
            Ok(cached) => cached.built_from != self.generation.load(AtomicOrdering::Acquire),
            Err(_) => true,
        }
    }

    /// Number of store reads performed so far
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(AtomicOrdering::Relaxed)
    }

    /// Current ladder, rebuilding first if stale
    pub async fn get(&self) -> Result<Arc<Vec<LadderEntry>>> {
        if let Some(entries) = self.fresh_entries()? {
            return Ok(entries);
        }

        let _rebuild = self.rebuild_lock.lock().await;

        // Another caller may have rebuilt while we waited
        if let Some(entries) = self.fresh_entries()? {
            debug!("Ladder served from a rebuild that completed while waiting");
            return Ok(entries);
        }

        self.rebuild().await
    }

    /// 1-based ladder position of a player and the ladder size, both taken
    /// from the same snapshot
    pub async fn position_of(&self, player_id: &PlayerId) -> Result<Option<(usize, usize)>> {
        let entries = self.get().await?;
        Ok(entries
            .iter()
            .position(|entry| &entry.player_id == player_id)
            .map(|index| (index + 1, entries.len())))
    }

    fn fresh_entries(&self) -> Result<Option<Arc<Vec<LadderEntry>>>> {
        let cached = self.cached.read().map_err(|_| LadderError::Internal {
            message: "Failed to acquire ladder read lock".to_string(),
        })?;

        if cached.built_from == self.generation.load(AtomicOrdering::Acquire) {
            Ok(Some(cached.entries.clone()))
        } else {
            Ok(None)
        }
    }

    async fn rebuild(&self) -> Result<Arc<Vec<LadderEntry>>> {
        let started_from = self.generation.load(AtomicOrdering::Acquire);
        let start = Instant::now();
        self.rebuilds.fetch_add(1, AtomicOrdering::Relaxed);

        let records = match with_store_timeout(
            "all_records",
            self.store_timeout,
            self.store.all_records(),
        )
        .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Ladder rebuild failed, cache stays stale: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_store_error("all_records");
                }
                return Err(e);
            }
        };

        let mut entries: Vec<LadderEntry> = records.iter().map(LadderEntry::from).collect();
        sort_entries(&mut entries, self.order);
        let entries = Arc::new(entries);

        {
            let mut cached = self.cached.write().map_err(|_| LadderError::Internal {
                message: "Failed to acquire ladder write lock".to_string(),
            })?;
            cached.built_from = started_from;
            cached.entries = entries.clone();
        }

        let elapsed = start.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_ladder_rebuild(elapsed, entries.len());
        }

        info!(
            "Rebuilt ladder with {} entries in {:?} (generation {})",
            entries.len(),
            elapsed,
            started_from
        );

        Ok(entries)
    }
}

/// Sort by rating in the configured direction; ties by display name, then id
pub fn sort_entries(entries: &mut [LadderEntry], order: LadderOrder) {
    entries.sort_by(|a, b| {
        let by_rating = match order {
            LadderOrder::Descending => b.rating.total_cmp(&a.rating),
            LadderOrder::Ascending => a.rating.total_cmp(&b.rating),
        };
        by_rating
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
}
