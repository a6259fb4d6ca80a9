//! # Memory Management
//!
//! Frame-scoped storage for sync snapshots.
//!
//! ## Design Rationale
//!
//! ```text
//! alloc()  alloc()  alloc()            clear()
//!   │        │        │                  │
//!   ▼        ▼        ▼                  ▼
//! [obj A ][obj B    ][obj C ]......   [..........]  frame + 1
//! ```
//!
//! Every snapshot of one sync point is bump-allocated from the same buffer and
//! the whole buffer is reclaimed at once when the core thread is done with it.

mod frame_alloc;

pub use frame_alloc::{FrameAlloc, FrameBlock};
