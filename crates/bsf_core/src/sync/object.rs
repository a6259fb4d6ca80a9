//! # CoreObject
//!
//! The sim-side half of a dual-thread object and the contract its core-side
//! half fulfils.
//!
//! ## Lifecycle
//!
//! ```text
//!   new()            dirty = ALL, no core yet
//!     │
//!   core()           create_core() runs once, result cached
//!     │
//!   set_x()          mark_core_dirty(X)          ┐ coalesces until
//!   set_y()          mark_core_dirty(Y)          ┘ the next sync point
//!     │
//!   sync point       produce_sync_snapshot()     dirty X|Y written
//!                    after_sync(X|Y)
//!                    clear_dirty(X|Y)            by the driver
//!     │
//!   core thread      consume_sync_snapshot()
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::memory::FrameAlloc;

use super::domain::SimSide;
use super::snapshot::SyncSnapshot;
use super::stream::{SizeStream, SyncReader, SyncStream, SyncWriter};

/// Dirty mask of a freshly created object: everything must be synced.
pub const DIRTY_ALL: u32 = u32::MAX;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Bookkeeping embedded in every sim-side object.
pub struct CoreObjectCore<C> {
    id: u64,
    dirty: u32,
    core: OnceLock<Arc<RwLock<C>>>,
}

impl<C> Default for CoreObjectCore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CoreObjectCore<C> {
    /// Creates bookkeeping for a new object with every flag dirty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            dirty: DIRTY_ALL,
            core: OnceLock::new(),
        }
    }

    /// Process-unique object id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current dirty mask.
    #[inline]
    #[must_use]
    pub const fn dirty_flags(&self) -> u32 {
        self.dirty
    }

    /// Returns true if any flag is set.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty != 0
    }

    /// ORs `flags` into the dirty mask.
    #[inline]
    pub fn mark_dirty(&mut self, flags: u32) {
        self.dirty |= flags;
    }

    /// Clears only `flags`, leaving any others set.
    #[inline]
    pub fn clear_dirty(&mut self, flags: u32) {
        self.dirty &= !flags;
    }

    /// Returns the core counterpart, creating it with `create` on first use.
    pub fn core_or_init(&self, create: impl FnOnce() -> C) -> Arc<RwLock<C>> {
        Arc::clone(self.core.get_or_init(|| Arc::new(RwLock::new(create()))))
    }

    /// Returns the core counterpart if it was already created.
    #[must_use]
    pub fn core_if_created(&self) -> Option<Arc<RwLock<C>>> {
        self.core.get().map(Arc::clone)
    }
}

/// Core-thread half of a dual-thread object.
///
/// The core object is mutated only by consuming snapshots its sim-side owner
/// produced.
pub trait CoreSync: Send + Sync + 'static {
    /// Reads the fields written by the sim side's `write_sync`, in the same order.
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, flags: u32);

    /// Applies one snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the reader does not consume exactly the bytes and transferred
    /// objects that were written. That is a layout bug, never a runtime error.
    fn consume_sync_snapshot(&mut self, mut snapshot: SyncSnapshot, alloc: &FrameAlloc) {
        let mut reader = snapshot.read(alloc);
        let mut flags = 0u32;
        reader.pod(&mut flags);
        self.read_sync(&mut reader, flags);
        reader.finish();
    }
}

/// Sim-thread half of a dual-thread object.
pub trait CoreObject {
    /// Core-thread counterpart type.
    type Core: CoreSync;

    /// Embedded bookkeeping.
    fn core_object(&self) -> &CoreObjectCore<Self::Core>;

    /// Embedded bookkeeping, mutable.
    fn core_object_mut(&mut self) -> &mut CoreObjectCore<Self::Core>;

    /// Builds the core counterpart. Runs at most once per object.
    ///
    /// The counterpart starts from construction-time state only; everything
    /// else arrives with the first snapshot, which is always a full one.
    fn create_core(&self) -> Self::Core;

    /// Writes the fields selected by `flags`.
    ///
    /// Runs twice per snapshot (size, then write) and must produce the same
    /// sequence both times, so it must not change observable state.
    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, flags: u32);

    /// Bookkeeping after a snapshot of `flags` was produced.
    fn after_sync(&mut self, _flags: u32) {}

    /// Records that `flags` changed since the last sync point.
    #[inline]
    fn mark_core_dirty(&mut self, flags: u32) {
        self.core_object_mut().mark_dirty(flags);
    }

    /// Returns the core counterpart, creating it on first use.
    fn core(&self) -> Arc<RwLock<Self::Core>> {
        self.core_object().core_or_init(|| self.create_core())
    }

    /// Serializes the current dirty state into `alloc`.
    ///
    /// Dirty flags are left untouched; the sync point clears them.
    ///
    /// # Panics
    ///
    /// Panics if the write pass does not produce exactly the sized byte count.
    fn produce_sync_snapshot(&mut self, alloc: &mut FrameAlloc) -> SyncSnapshot
    where
        Self: Sized,
    {
        let mut flags = self.core_object().dirty_flags();

        let mut size = SizeStream::<SimSide>::new();
        size.pod(&mut flags);
        self.write_sync(&mut size, flags);

        let block = alloc.alloc(size.total());
        let mut writer = SyncWriter::new(alloc.block_mut(&block));
        writer.pod(&mut flags);
        self.write_sync(&mut writer, flags);
        let (written, objects) = writer.finish();

        assert_eq!(
            written,
            block.len(),
            "Sync size mismatch! Sized {} bytes but wrote {}",
            block.len(),
            written
        );

        SyncSnapshot::new(block, objects)
    }
}
