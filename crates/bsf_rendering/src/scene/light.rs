//! # Light
//!
//! ```text
//!   snapshot:  actor | props (unless only TRANSFORM is dirty)
//! ```
//!
//! Moving a light is the common case, so a transform-only change costs one
//! actor block.

use bsf_core::{
    CoreObject, CoreObjectCore, CoreSync, SimSide, SyncDomain, SyncFields, SyncReader, SyncStream,
};
use bsf_shared::Color;

use super::actor::{Actor, ActorDirtyFlags, SceneActor};

/// Shape of the light's influence.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Infinitely far away, parallel rays.
    Directional = 0,
    /// Point light with a radius of influence.
    #[default]
    Radial = 1,
    /// Cone.
    Spot = 2,
}

impl LightType {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Directional,
            2 => Self::Spot,
            _ => Self::Radial,
        }
    }
}

/// Everything about a light except its placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightProperties {
    /// Light type.
    pub light_type: LightType,
    /// Linear color.
    pub color: Color,
    /// Luminous intensity.
    pub intensity: f32,
    /// Distance past which the light has no effect. Ignored for directional lights.
    pub attenuation_radius: f32,
    /// Radius of the emitting surface, for area lighting.
    pub source_radius: f32,
    /// Total cone angle in degrees.
    pub spot_angle: f32,
    /// Angle in degrees where falloff starts.
    pub spot_falloff_angle: f32,
    /// Whether the light casts shadows.
    pub casts_shadows: bool,
}

impl Default for LightProperties {
    fn default() -> Self {
        Self {
            light_type: LightType::Radial,
            color: Color::WHITE,
            intensity: 100.0,
            attenuation_radius: 10.0,
            source_radius: 0.0,
            spot_angle: 45.0,
            spot_falloff_angle: 35.0,
            casts_shadows: false,
        }
    }
}

impl<D: SyncDomain> SyncFields<D> for LightProperties {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        let mut light_type = self.light_type as u32;
        stream.pod(&mut light_type);
        self.light_type = LightType::from_raw(light_type);
        stream.pod(&mut self.color);
        stream.pod(&mut self.intensity);
        stream.pod(&mut self.attenuation_radius);
        stream.pod(&mut self.source_radius);
        stream.pod(&mut self.spot_angle);
        stream.pod(&mut self.spot_falloff_angle);
        stream.flag(&mut self.casts_shadows);
    }
}

/// Sim-thread light.
pub struct Light {
    object: CoreObjectCore<CoreLight>,
    actor: SceneActor,
    props: LightProperties,
}

impl Default for Light {
    fn default() -> Self {
        Self::new(LightType::Radial)
    }
}

impl std::fmt::Debug for Light {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Light")
            .field("id", &self.object.id())
            .field("actor", &self.actor)
            .field("props", &self.props)
            .finish()
    }
}

impl Light {
    /// Creates a light with default properties.
    #[must_use]
    pub fn new(light_type: LightType) -> Self {
        Self {
            object: CoreObjectCore::new(),
            actor: SceneActor::default(),
            props: LightProperties { light_type, ..LightProperties::default() },
        }
    }

    /// Current properties.
    #[must_use]
    pub const fn properties(&self) -> &LightProperties {
        &self.props
    }

    fn edit(&mut self, f: impl FnOnce(&mut LightProperties)) {
        f(&mut self.props);
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Changes the light type.
    pub fn set_type(&mut self, light_type: LightType) {
        self.edit(|p| p.light_type = light_type);
    }

    /// Changes the color.
    pub fn set_color(&mut self, color: Color) {
        self.edit(|p| p.color = color);
    }

    /// Changes the intensity. Negative values clamp to zero.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.edit(|p| p.intensity = intensity.max(0.0));
    }

    /// Changes the attenuation radius.
    pub fn set_attenuation_radius(&mut self, radius: f32) {
        self.edit(|p| p.attenuation_radius = radius.max(0.0));
    }

    /// Changes the source radius.
    pub fn set_source_radius(&mut self, radius: f32) {
        self.edit(|p| p.source_radius = radius.max(0.0));
    }

    /// Changes both spot angles. The falloff angle never exceeds the cone.
    pub fn set_spot_angles(&mut self, angle: f32, falloff_angle: f32) {
        self.edit(|p| {
            p.spot_angle = angle.clamp(0.0, 179.0);
            p.spot_falloff_angle = falloff_angle.clamp(0.0, p.spot_angle);
        });
    }

    /// Enables or disables shadows.
    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.edit(|p| p.casts_shadows = casts_shadows);
    }
}

impl Actor for Light {
    fn actor(&self) -> &SceneActor {
        &self.actor
    }

    fn actor_mut(&mut self) -> &mut SceneActor {
        &mut self.actor
    }
}

impl CoreObject for Light {
    type Core = CoreLight;

    fn core_object(&self) -> &CoreObjectCore<CoreLight> {
        &self.object
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<CoreLight> {
        &mut self.object
    }

    fn create_core(&self) -> CoreLight {
        CoreLight::default()
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, flags: u32) {
        stream.nested(&mut self.actor);
        if ActorDirtyFlags::needs_properties(flags) {
            stream.nested(&mut self.props);
        }
    }
}

/// Core-thread light.
#[derive(Clone, Debug, Default)]
pub struct CoreLight {
    actor: SceneActor,
    props: LightProperties,
    syncs: u32,
}

impl CoreLight {
    /// Placement as of the last sync.
    #[must_use]
    pub const fn actor(&self) -> &SceneActor {
        &self.actor
    }

    /// Properties as of the last sync.
    #[must_use]
    pub const fn properties(&self) -> &LightProperties {
        &self.props
    }

    /// Snapshots applied so far.
    #[must_use]
    pub const fn sync_count(&self) -> u32 {
        self.syncs
    }

    /// Radius of the sphere that bounds the light's influence.
    #[must_use]
    pub fn bounds_radius(&self) -> f32 {
        match self.props.light_type {
            LightType::Directional => f32::INFINITY,
            LightType::Radial | LightType::Spot => self.props.attenuation_radius + self.props.source_radius,
        }
    }
}

impl CoreSync for CoreLight {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, flags: u32) {
        reader.nested(&mut self.actor);
        if ActorDirtyFlags::needs_properties(flags) {
            reader.nested(&mut self.props);
        }
        self.syncs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsf_core::SyncPoint;
    use bsf_shared::{Transform, Vec3};

    #[test]
    fn test_first_sync_sends_properties() {
        let mut light = Light::new(LightType::Spot);
        light.set_color(Color::new(1.0, 0.5, 0.0, 1.0));
        SyncPoint::with_capacity(256).sync_inline(&mut [&mut light]);

        let core = light.core();
        let core = core.read();
        assert_eq!(core.properties().light_type, LightType::Spot);
        assert_eq!(core.properties().color, Color::new(1.0, 0.5, 0.0, 1.0));
    }

    #[test]
    fn test_transform_only_sync_is_small() {
        let mut light = Light::default();
        let mut sync_point = SyncPoint::with_capacity(256);
        let full = sync_point.sync_inline(&mut [&mut light]).bytes;

        light.set_transform(Transform::IDENTITY.with_position(Vec3::new(0.0, 5.0, 0.0)));
        let moved = sync_point.sync_inline(&mut [&mut light]).bytes;
        assert!(moved < full);

        let core = light.core();
        assert_eq!(core.read().actor().transform.position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(core.read().sync_count(), 2);
    }

    #[test]
    fn test_clean_light_is_skipped() {
        let mut light = Light::default();
        let mut sync_point = SyncPoint::with_capacity(256);
        sync_point.sync_inline(&mut [&mut light]);
        let stats = sync_point.sync_inline(&mut [&mut light]);
        assert_eq!(stats.objects, 0);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_spot_falloff_clamped_to_cone() {
        let mut light = Light::new(LightType::Spot);
        light.set_spot_angles(30.0, 50.0);
        assert_eq!(light.properties().spot_falloff_angle, 30.0);
    }
}
