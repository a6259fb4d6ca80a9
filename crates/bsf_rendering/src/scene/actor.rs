//! # Scene Actor
//!
//! The placement block shared by every scene object. It is always the first
//! thing in a scene object's snapshot:
//!
//! ```text
//!   actor:  transform, mobility, active      always written
//!   props:  object specific                  skipped when only TRANSFORM is dirty
//! ```

use bitflags::bitflags;
use bsf_core::{CoreObject, SyncDomain, SyncFields, SyncStream};
use bsf_shared::Transform;

bitflags! {
    /// Dirty bits shared by every scene object.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ActorDirtyFlags: u32 {
        /// Position, rotation or scale.
        const TRANSFORM = 1 << 0;
        /// Mobility.
        const MOBILITY = 1 << 1;
        /// Active state.
        const ACTIVE = 1 << 2;
        /// Any object specific property.
        const EVERYTHING = 1 << 3;
        /// Something the object references changed.
        const DEPENDENCY = 1 << 31;
    }
}

impl ActorDirtyFlags {
    /// Returns true if `flags` carries anything besides a transform change.
    #[inline]
    #[must_use]
    pub const fn needs_properties(flags: u32) -> bool {
        flags & !Self::TRANSFORM.bits() != 0
    }
}

/// How the renderer may treat an object that does not move.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mobility {
    /// Can move every frame.
    #[default]
    Movable = 0,
    /// Never moves; may be baked.
    Immovable = 1,
    /// Never moves but its other properties may change.
    Stationary = 2,
}

impl Mobility {
    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Immovable,
            2 => Self::Stationary,
            _ => Self::Movable,
        }
    }
}

/// Transform, mobility and active state of a scene object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneActor {
    /// World transform.
    pub transform: Transform,
    /// Mobility.
    pub mobility: Mobility,
    /// Inactive objects stay synced but are not rendered.
    pub active: bool,
}

impl Default for SceneActor {
    fn default() -> Self {
        Self { transform: Transform::IDENTITY, mobility: Mobility::Movable, active: true }
    }
}

impl<D: SyncDomain> SyncFields<D> for SceneActor {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        stream.pod(&mut self.transform);
        let mut mobility = self.mobility as u32;
        stream.pod(&mut mobility);
        self.mobility = Mobility::from_raw(mobility);
        stream.flag(&mut self.active);
    }
}

/// A sim-side object placed in the scene.
///
/// Setters record the matching [`ActorDirtyFlags`] bit.
pub trait Actor: CoreObject {
    /// Embedded actor state.
    fn actor(&self) -> &SceneActor;

    /// Embedded actor state, mutable. Does not mark anything dirty.
    fn actor_mut(&mut self) -> &mut SceneActor;

    /// Moves the object.
    fn set_transform(&mut self, transform: Transform) {
        self.actor_mut().transform = transform;
        self.mark_core_dirty(ActorDirtyFlags::TRANSFORM.bits());
    }

    /// Changes the mobility.
    fn set_mobility(&mut self, mobility: Mobility) {
        self.actor_mut().mobility = mobility;
        self.mark_core_dirty(ActorDirtyFlags::MOBILITY.bits());
    }

    /// Activates or deactivates the object.
    fn set_active(&mut self, active: bool) {
        self.actor_mut().active = active;
        self.mark_core_dirty(ActorDirtyFlags::ACTIVE.bits());
    }

    /// Current transform.
    fn transform(&self) -> &Transform {
        &self.actor().transform
    }

    /// Returns true if the object is active.
    fn is_active(&self) -> bool {
        self.actor().active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsf_core::SyncPayload;
    use bsf_shared::{Quaternion, Vec3};

    #[test]
    fn test_only_transform_skips_properties() {
        assert!(!ActorDirtyFlags::needs_properties(ActorDirtyFlags::TRANSFORM.bits()));
        assert!(ActorDirtyFlags::needs_properties(
            (ActorDirtyFlags::TRANSFORM | ActorDirtyFlags::ACTIVE).bits()
        ));
        assert!(ActorDirtyFlags::needs_properties(bsf_core::sync::DIRTY_ALL));
    }

    #[test]
    fn test_actor_round_trip() {
        let mut sim = SceneActor {
            transform: Transform::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::IDENTITY, Vec3::ONE),
            mobility: Mobility::Stationary,
            active: false,
        };
        let payload = SyncPayload::capture::<SceneActor>(&mut sim);
        assert_eq!(payload.len(), std::mem::size_of::<Transform>() + 4 + 1);

        let mut core = SceneActor::default();
        payload.restore::<SceneActor>(&mut core);
        assert_eq!(core, sim);
    }

    #[test]
    fn test_unknown_mobility_is_movable() {
        assert_eq!(Mobility::from_raw(7), Mobility::Movable);
        assert_eq!(Mobility::from_raw(Mobility::Immovable as u32), Mobility::Immovable);
    }
}
