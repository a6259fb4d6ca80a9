//! # Sync Domains
//!
//! Types that exist on both threads are written once, generic over a domain:
//!
//! ```text
//!   struct Params<D: SyncDomain> {
//!       texture: D::Ref<Texture>,   // SimSide:  Option<ResourceHandle<Texture>>
//!   }                               // CoreSide: Option<Arc<Texture>>
//! ```
//!
//! The sim side holds whatever handle the user gave it. The core side only
//! ever holds resolved core pointers, where `None` means "not ready yet".

use std::sync::Arc;

/// Selects how references to other objects are stored.
pub trait SyncDomain: Send + Sync + 'static {
    /// Storage type for a reference to `T`.
    type Ref<T: Counterpart>: Clone + Default + Send + Sync;

    /// True for the core (render) thread representation.
    const IS_CORE: bool;
}

/// Simulation-thread representation. References are user-facing handles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimSide;

/// Core-thread representation. References are resolved core pointers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreSide;

impl SyncDomain for SimSide {
    type Ref<T: Counterpart> = T::SimRef;
    const IS_CORE: bool = false;
}

impl SyncDomain for CoreSide {
    type Ref<T: Counterpart> = Option<Arc<T::Core>>;
    const IS_CORE: bool = true;
}

/// Links a sim-side handle type to the core-side object it resolves to.
///
/// `resolve` is a query, never a load trigger: a handle to a resource that is
/// not loaded yet resolves to `None`.
pub trait Counterpart: 'static {
    /// Handle type stored by sim-side objects.
    type SimRef: Clone + Default + Send + Sync;
    /// Object the core thread receives.
    type Core: Send + Sync + 'static;

    /// Converts a sim handle to its core pointer, if one is available.
    fn resolve(sim: &Self::SimRef) -> Option<Arc<Self::Core>>;
}
