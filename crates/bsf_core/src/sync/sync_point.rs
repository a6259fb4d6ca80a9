//! # Sync Point Driver
//!
//! ```text
//!   SyncPoint                       SyncBatch (owns one FrameAlloc)
//!  ┌───────────────┐  begin()   ┌───────────────────────────────┐
//!  │ allocator A ──┼──────────► │ push(obj) -> snapshot + target│
//!  │ allocator B   │            │ push(obj) -> ...              │
//!  └───────────────┘            └──────────────┬────────────────┘
//!          ▲                                   │ finish() -> core thread
//!          │          reclaim(alloc)           │ apply()
//!          └───────────────────────────────────┘
//! ```
//!
//! A batch owns its allocator until it has been applied, so the sim thread
//! cannot produce into memory the core thread is still reading. Two
//! allocators let the sim thread fill the next batch while the previous one
//! is consumed.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::SyncConfig;
use crate::memory::FrameAlloc;

use super::object::{CoreObject, CoreSync};
use super::snapshot::SyncSnapshot;

/// Object-safe view of a sim-side object, used by the driver.
pub trait SyncSource {
    /// Flags that changed since the last sync point.
    fn pending_flags(&self) -> u32;

    /// Produces a snapshot and returns it with the counterpart that consumes it.
    fn produce(&mut self, alloc: &mut FrameAlloc) -> (Arc<dyn SyncTarget>, SyncSnapshot);

    /// Called after `produce` with the flags that snapshot carried.
    fn complete_sync(&mut self, consumed: u32);
}

impl<T: CoreObject> SyncSource for T {
    #[inline]
    fn pending_flags(&self) -> u32 {
        self.core_object().dirty_flags()
    }

    fn produce(&mut self, alloc: &mut FrameAlloc) -> (Arc<dyn SyncTarget>, SyncSnapshot) {
        let snapshot = self.produce_sync_snapshot(alloc);
        let target: Arc<dyn SyncTarget> = self.core();
        (target, snapshot)
    }

    fn complete_sync(&mut self, consumed: u32) {
        self.after_sync(consumed);
        self.core_object_mut().clear_dirty(consumed);
    }
}

/// Object-safe view of a core-side object, used by the core thread.
pub trait SyncTarget: Send + Sync {
    /// Applies a snapshot produced from `alloc`.
    fn apply(&self, snapshot: SyncSnapshot, alloc: &FrameAlloc);
}

impl<C: CoreSync> SyncTarget for RwLock<C> {
    fn apply(&self, snapshot: SyncSnapshot, alloc: &FrameAlloc) {
        self.write().consume_sync_snapshot(snapshot, alloc);
    }
}

/// Counters for one sync point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Objects that produced a snapshot.
    pub objects: usize,
    /// Objects pushed while clean.
    pub skipped: usize,
    /// Total snapshot bytes.
    pub bytes: usize,
}

/// Snapshots of one sync point, ready to be consumed on the core thread.
pub struct SyncBatch {
    alloc: FrameAlloc,
    entries: Vec<(Arc<dyn SyncTarget>, SyncSnapshot)>,
    stats: SyncStats,
    generation: u64,
}

impl SyncBatch {
    /// Number of snapshots in the batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no object was dirty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters collected while the batch was built.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Sync point generation this batch was produced in.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Consumes every snapshot and returns the cleared allocator.
    ///
    /// Objects are applied in push order, though nothing depends on it.
    #[must_use]
    pub fn apply(self) -> FrameAlloc {
        let Self { mut alloc, entries, .. } = self;
        for (target, snapshot) in entries {
            target.apply(snapshot, &alloc);
        }
        alloc.clear();
        alloc
    }
}

impl std::fmt::Debug for SyncBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBatch")
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Collects snapshots for one sync point.
pub struct SyncBatchBuilder {
    batch: SyncBatch,
}

impl SyncBatchBuilder {
    /// Produces a snapshot for `source` if it is dirty.
    ///
    /// Returns true if a snapshot was produced. The flags it carried are
    /// cleared; anything else stays dirty.
    pub fn push(&mut self, source: &mut dyn SyncSource) -> bool {
        let flags = source.pending_flags();
        if flags == 0 {
            self.batch.stats.skipped += 1;
            return false;
        }

        let (target, snapshot) = source.produce(&mut self.batch.alloc);
        source.complete_sync(flags);

        self.batch.stats.objects += 1;
        self.batch.stats.bytes += snapshot.len();
        self.batch.entries.push((target, snapshot));
        true
    }

    /// Seals the batch.
    #[must_use]
    pub fn finish(self) -> SyncBatch {
        let stats = self.batch.stats;
        tracing::debug!(
            "Sync point {}: {} objects, {} clean, {} bytes",
            self.batch.generation,
            stats.objects,
            stats.skipped,
            stats.bytes
        );
        self.batch
    }
}

/// Hands out frame allocators for sync batches and takes them back.
#[derive(Debug)]
pub struct SyncPoint {
    pool: Vec<FrameAlloc>,
    capacity: usize,
    in_flight: usize,
    generation: u64,
}

impl SyncPoint {
    /// Allocators kept by a sync point.
    pub const BUFFERS: usize = 2;

    /// Creates a sync point with two allocators sized from `config`.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_capacity(config.frame_alloc_capacity)
    }

    /// Creates a sync point with two allocators of `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: (0..Self::BUFFERS).map(|_| FrameAlloc::new(capacity)).collect(),
            capacity,
            in_flight: 0,
            generation: 0,
        }
    }

    /// Batches produced but not reclaimed yet.
    #[inline]
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Number of batches begun so far.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new batch.
    ///
    /// If both allocators are still in flight a third one is created and a
    /// warning logged; the core thread is falling behind.
    pub fn begin(&mut self) -> SyncBatchBuilder {
        let alloc = if let Some(alloc) = self.pool.pop() {
            alloc
        } else {
            tracing::warn!(
                "All {} frame allocators in flight, allocating another",
                self.in_flight
            );
            FrameAlloc::new(self.capacity)
        };

        self.in_flight += 1;
        self.generation += 1;

        SyncBatchBuilder {
            batch: SyncBatch {
                alloc,
                entries: Vec::new(),
                stats: SyncStats::default(),
                generation: self.generation,
            },
        }
    }

    /// Returns an allocator from an applied batch.
    pub fn reclaim(&mut self, alloc: FrameAlloc) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.pool.len() < Self::BUFFERS {
            self.pool.push(alloc);
        }
    }

    /// Produces and applies a batch on the calling thread.
    ///
    /// Used when there is no separate core thread (tools, tests).
    pub fn sync_inline(&mut self, sources: &mut [&mut dyn SyncSource]) -> SyncStats {
        let mut builder = self.begin();
        for source in sources.iter_mut() {
            builder.push(&mut **source);
        }
        let batch = builder.finish();
        let stats = batch.stats();
        let alloc = batch.apply();
        self.reclaim(alloc);
        stats
    }
}
