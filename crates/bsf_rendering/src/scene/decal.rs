//! # Decal
//!
//! A material projected onto the geometry inside a box.
//!
//! The material travels as a reference: the core decal holds the material's
//! core counterpart, which is created once and never replaced, so later
//! material edits reach the decal without the decal being resynced.

use std::sync::Arc;

use bsf_core::{
    CoreObject, CoreObjectCore, CoreSide, CoreSync, SimSide, SyncDomain, SyncFields, SyncReader,
    SyncStream,
};
use bsf_shared::Vec2;
use parking_lot::RwLock;

use crate::material::{CoreMaterial, Material, SharedMaterial};

use super::actor::{Actor, ActorDirtyFlags, SceneActor};

/// Decal properties, generic over the side holding them.
pub struct DecalProperties<D: SyncDomain> {
    /// Material to project. Null on the core until the sim side has one.
    pub material: D::Ref<Material>,
    /// Width and height of the projection, in world units.
    pub size: Vec2,
    /// Projection depth.
    pub max_distance: f32,
    /// Layer the decal belongs to.
    pub layer: u64,
    /// Layers the decal projects onto.
    pub layer_mask: u32,
}

impl<D: SyncDomain> Default for DecalProperties<D> {
    fn default() -> Self {
        Self {
            material: Default::default(),
            size: Vec2::new(1.0, 1.0),
            max_distance: 5.0,
            layer: 1,
            layer_mask: u32::MAX,
        }
    }
}

impl<D: SyncDomain> Clone for DecalProperties<D> {
    fn clone(&self) -> Self {
        Self {
            material: self.material.clone(),
            size: self.size,
            max_distance: self.max_distance,
            layer: self.layer,
            layer_mask: self.layer_mask,
        }
    }
}

impl<D: SyncDomain> SyncFields<D> for DecalProperties<D> {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        stream.reference::<Material>(&mut self.material);
        stream.pod(&mut self.size);
        stream.pod(&mut self.max_distance);
        stream.pod(&mut self.layer);
        stream.pod(&mut self.layer_mask);
    }
}

/// Sim-thread decal.
#[derive(Default)]
pub struct Decal {
    object: CoreObjectCore<CoreDecal>,
    actor: SceneActor,
    props: DecalProperties<SimSide>,
}

impl std::fmt::Debug for Decal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decal")
            .field("id", &self.object.id())
            .field("has_material", &self.props.material.is_some())
            .field("size", &self.props.size)
            .finish_non_exhaustive()
    }
}

impl Decal {
    /// Creates a decal projecting `material`.
    #[must_use]
    pub fn new(material: Option<SharedMaterial>) -> Self {
        Self { props: DecalProperties { material, ..DecalProperties::default() }, ..Self::default() }
    }

    /// Projected material.
    #[must_use]
    pub fn material(&self) -> Option<&SharedMaterial> {
        self.props.material.as_ref()
    }

    /// Changes the projected material.
    pub fn set_material(&mut self, material: Option<SharedMaterial>) {
        self.props.material = material;
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Projection size.
    #[must_use]
    pub const fn size(&self) -> Vec2 {
        self.props.size
    }

    /// Changes the projection size.
    pub fn set_size(&mut self, size: Vec2) {
        self.props.size = Vec2::new(size.x.max(0.0), size.y.max(0.0));
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Changes the projection depth.
    pub fn set_max_distance(&mut self, distance: f32) {
        self.props.max_distance = distance.max(0.0);
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Moves the decal to another layer.
    pub fn set_layer(&mut self, layer: u64) {
        self.props.layer = layer;
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Changes which layers the decal projects onto.
    pub fn set_layer_mask(&mut self, mask: u32) {
        self.props.layer_mask = mask;
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }
}

impl Actor for Decal {
    fn actor(&self) -> &SceneActor {
        &self.actor
    }

    fn actor_mut(&mut self) -> &mut SceneActor {
        &mut self.actor
    }
}

impl CoreObject for Decal {
    type Core = CoreDecal;

    fn core_object(&self) -> &CoreObjectCore<CoreDecal> {
        &self.object
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<CoreDecal> {
        &mut self.object
    }

    fn create_core(&self) -> CoreDecal {
        CoreDecal::default()
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, flags: u32) {
        stream.nested(&mut self.actor);
        if ActorDirtyFlags::needs_properties(flags) {
            stream.nested(&mut self.props);
        }
    }
}

/// Core-thread decal.
#[derive(Default)]
pub struct CoreDecal {
    actor: SceneActor,
    props: DecalProperties<CoreSide>,
}

impl std::fmt::Debug for CoreDecal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreDecal")
            .field("actor", &self.actor)
            .field("has_material", &self.props.material.is_some())
            .field("size", &self.props.size)
            .finish_non_exhaustive()
    }
}

impl CoreDecal {
    /// Placement as of the last sync.
    #[must_use]
    pub const fn actor(&self) -> &SceneActor {
        &self.actor
    }

    /// Material core counterpart.
    #[must_use]
    pub fn material(&self) -> Option<&Arc<RwLock<CoreMaterial>>> {
        self.props.material.as_ref()
    }

    /// Projection size.
    #[must_use]
    pub const fn size(&self) -> Vec2 {
        self.props.size
    }

    /// Projection depth.
    #[must_use]
    pub const fn max_distance(&self) -> f32 {
        self.props.max_distance
    }

    /// Layer.
    #[must_use]
    pub const fn layer(&self) -> u64 {
        self.props.layer
    }

    /// Returns true if the decal projects onto objects in any of `layers`.
    #[must_use]
    pub const fn affects(&self, layers: u32) -> bool {
        self.actor.active && self.props.layer_mask & layers != 0
    }
}

impl CoreSync for CoreDecal {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, flags: u32) {
        reader.nested(&mut self.actor);
        if ActorDirtyFlags::needs_properties(flags) {
            reader.nested(&mut self.props);
        }
    }
}
