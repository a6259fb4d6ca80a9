//! # BSF Core
//!
//! Dual-threaded object synchronization. Every renderable object lives twice:
//!
//! ```text
//!   SIM THREAD                                   CORE THREAD
//!  ┌──────────────┐   produce    ┌──────────┐   consume   ┌──────────────┐
//!  │ CoreObject   │ ───────────► │ Snapshot │ ──────────► │ CoreSync     │
//!  │ (sim state)  │  FrameAlloc  │  bytes + │   SyncBatch │ (core state) │
//!  │ dirty flags  │              │  objects │             │              │
//!  └──────────────┘              └──────────┘             └──────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **The sim object is the only mutator** - the core object changes only by
//!    consuming snapshots.
//! 2. **One visitor, three passes** - size, write and read walk the same field
//!    enumeration, so they cannot drift apart.
//! 3. **Produce-all, then consume-all** - a batch owns its frame allocator; the
//!    sim thread cannot touch that memory again until the core thread hands it
//!    back.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bsf_core::{CoreThread, SyncConfig, SyncPoint};
//!
//! let config = SyncConfig::default();
//! let core_thread = CoreThread::spawn(&config)?;
//! let mut sync_point = SyncPoint::new(&config);
//!
//! let mut batch = sync_point.begin();
//! batch.push(&mut light);
//! core_thread.submit(batch.finish())?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod core_thread;
pub mod error;
pub mod memory;
pub mod resources;
pub mod sync;
pub mod task;

pub use config::SyncConfig;
pub use core_thread::CoreThread;
pub use error::{CoreError, CoreResult};
pub use memory::{FrameAlloc, FrameBlock};
pub use resources::{ResourceHandle, ResourceId, Resources};
pub use sync::{
    CoreObject, CoreObjectCore, CoreSide, CoreSync, Counterpart, SimSide, SizeStream, SyncBatch,
    SyncBatchBuilder, SyncDomain, SyncFields, SyncPayload, SyncPoint, SyncReader, SyncSnapshot, SyncSource,
    SyncStats, SyncStream, SyncTarget, SyncWriter,
};
pub use task::{RendererTask, TaskQueue, TaskSink, TaskState};
