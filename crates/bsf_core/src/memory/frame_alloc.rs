//! # Frame Allocator
//!
//! A bump allocator whose blocks are valid for exactly one frame.

/// A byte range handed out by [`FrameAlloc::alloc`].
///
/// A block remembers the frame it was allocated in. Accessing it after the
/// allocator was cleared is a logic error and panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBlock {
    offset: usize,
    len: usize,
    frame: u64,
}

impl FrameBlock {
    /// Length of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true for zero-sized blocks.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frame this block belongs to.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

/// Bump-pointer allocator for one sync cycle.
///
/// Unlike a general arena this type owns its storage outright, so the whole
/// allocator (and every block in it) can be moved to the core thread along
/// with the batch that references it.
///
/// # Example
///
/// ```rust,ignore
/// let mut alloc = FrameAlloc::new(64 * 1024);
///
/// let block = alloc.alloc(128);
/// alloc.block_mut(&block).fill(0xAB);
///
/// // End of cycle: every block is reclaimed at once
/// alloc.clear();
/// ```
#[derive(Debug)]
pub struct FrameAlloc {
    /// Backing storage. Grows if a frame needs more than the configured capacity.
    storage: Vec<u8>,
    /// Current allocation offset.
    offset: usize,
    /// Configured capacity, used to report growth.
    capacity: usize,
    /// Incremented on every `clear`.
    frame: u64,
}

impl FrameAlloc {
    /// Creates a new allocator with the specified capacity in bytes.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Initial size in bytes
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity],
            offset: 0,
            capacity,
            frame: 0,
        }
    }

    /// Returns the configured capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the bytes allocated so far this frame.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the current frame number.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Allocates `size` zeroed bytes for the current frame.
    ///
    /// Never fails: if the frame needs more than the configured capacity the
    /// storage grows and a warning is logged.
    pub fn alloc(&mut self, size: usize) -> FrameBlock {
        // Keep blocks 8-byte aligned relative to the storage start
        let aligned = (self.offset + 7) & !7;
        let end = aligned + size;

        if end > self.storage.len() {
            tracing::warn!(
                "Frame allocator exceeded capacity: need {} bytes, capacity {}",
                end,
                self.capacity
            );
            self.storage.resize(end.max(self.storage.len() * 2), 0);
        }

        self.storage[aligned..end].fill(0);
        self.offset = end;

        FrameBlock { offset: aligned, len: size, frame: self.frame }
    }

    /// Returns the bytes of a block.
    ///
    /// # Panics
    ///
    /// Panics if the block was allocated in an earlier frame.
    #[must_use]
    pub fn block(&self, block: &FrameBlock) -> &[u8] {
        self.check(block);
        &self.storage[block.offset..block.offset + block.len]
    }

    /// Returns the bytes of a block for writing.
    ///
    /// # Panics
    ///
    /// Panics if the block was allocated in an earlier frame.
    #[must_use]
    pub fn block_mut(&mut self, block: &FrameBlock) -> &mut [u8] {
        self.check(block);
        &mut self.storage[block.offset..block.offset + block.len]
    }

    /// Reclaims every block of the current frame and starts a new one.
    #[inline]
    pub fn clear(&mut self) {
        self.offset = 0;
        self.frame += 1;
    }

    fn check(&self, block: &FrameBlock) {
        assert_eq!(
            block.frame, self.frame,
            "Stale frame block! Allocated in frame {} but allocator is at frame {}",
            block.frame, self.frame
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_and_aligned() {
        let mut alloc = FrameAlloc::new(1024);
        let a = alloc.alloc(3);
        let b = alloc.alloc(16);
        assert_eq!(a.len(), 3);
        assert_eq!(b.offset % 8, 0);
        assert!(alloc.block(&b).iter().all(|&x| x == 0));
        assert_eq!(alloc.used(), 24);
    }

    #[test]
    fn test_blocks_do_not_overlap() {
        let mut alloc = FrameAlloc::new(64);
        let a = alloc.alloc(8);
        let b = alloc.alloc(8);
        alloc.block_mut(&a).fill(1);
        alloc.block_mut(&b).fill(2);
        assert!(alloc.block(&a).iter().all(|&x| x == 1));
        assert!(alloc.block(&b).iter().all(|&x| x == 2));
    }

    #[test]
    fn test_clear_rezeroes_reused_memory() {
        let mut alloc = FrameAlloc::new(64);
        let a = alloc.alloc(8);
        alloc.block_mut(&a).fill(9);
        alloc.clear();

        let b = alloc.alloc(8);
        assert_eq!(alloc.frame(), 1);
        assert!(alloc.block(&b).iter().all(|&x| x == 0));
    }

    #[test]
    fn test_grows_past_capacity() {
        let mut alloc = FrameAlloc::new(16);
        let block = alloc.alloc(100);
        assert_eq!(alloc.block(&block).len(), 100);
        assert_eq!(alloc.capacity(), 16);
    }

    #[test]
    #[should_panic(expected = "Stale frame block")]
    fn test_stale_block_panics() {
        let mut alloc = FrameAlloc::new(64);
        let block = alloc.alloc(8);
        alloc.clear();
        let _ = alloc.block(&block);
    }
}
