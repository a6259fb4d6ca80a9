//! # Sim/Core Synchronization
//!
//! ## The Problem
//!
//! ```text
//! Sim thread:   mutates materials, lights, probes every frame
//! Core thread:  renders with GPU-visible copies of the same objects
//!
//! Shared mutable state: RACE CONDITION
//! Lock per object:      CONTENTION on every setter
//! ```
//!
//! ## The Solution: Dirty Flags + Snapshots
//!
//! ```text
//! Frame N (sim):
//!   setters OR bits into each object's dirty mask
//!
//! Sync point:
//!   every dirty object writes its current state into a FrameAlloc
//!   the batch (allocator + snapshots) moves to the core thread
//!
//! Frame N (core):
//!   every counterpart reads its snapshot, allocator goes back to the sim
//! ```
//!
//! Setters between two sync points coalesce: only the latest state travels.

mod domain;
mod object;
mod snapshot;
mod stream;
mod sync_point;

pub use domain::{CoreSide, Counterpart, SimSide, SyncDomain};
pub use object::{CoreObject, CoreObjectCore, CoreSync, DIRTY_ALL};
pub use snapshot::SyncSnapshot;
pub use stream::{SizeStream, SyncFields, SyncPayload, SyncReader, SyncStream, SyncWriter};
pub use sync_point::{SyncBatch, SyncBatchBuilder, SyncPoint, SyncSource, SyncStats, SyncTarget};
