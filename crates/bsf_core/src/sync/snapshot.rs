//! # Sync Snapshot
//!
//! ```text
//!   FrameBlock                                     objects
//!  ┌───────────┬──────────────────────────────┐   ┌─────────┐
//!  │ dirty u32 │ fields in declaration order  │   │ Arc<..> │ ◄── reference index
//!  └───────────┴──────────────────────────────┘   │ Arc<..> │
//!                                                 └─────────┘
//! ```
//!
//! A snapshot is valid only for the frame of the allocator it was produced in.

use crate::memory::{FrameAlloc, FrameBlock};

use super::stream::{SyncReader, TransferSlot};

/// One object's serialized state for one sync cycle.
pub struct SyncSnapshot {
    block: FrameBlock,
    objects: Vec<TransferSlot>,
}

impl SyncSnapshot {
    pub(crate) fn new(block: FrameBlock, objects: Vec<TransferSlot>) -> Self {
        Self { block, objects }
    }

    /// Serialized size in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.block.len()
    }

    /// Returns true if the snapshot carries no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    /// Number of core pointers transferred with the snapshot.
    #[inline]
    #[must_use]
    pub fn transferred(&self) -> usize {
        self.objects.iter().filter(|o| o.is_some()).count()
    }

    /// Opens the snapshot for reading against the allocator that produced it.
    pub(crate) fn read<'a>(&'a mut self, alloc: &'a FrameAlloc) -> SyncReader<'a> {
        SyncReader::new(alloc.block(&self.block), &mut self.objects)
    }
}

impl std::fmt::Debug for SyncSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSnapshot")
            .field("len", &self.len())
            .field("frame", &self.block.frame())
            .field("transferred", &self.transferred())
            .finish()
    }
}
