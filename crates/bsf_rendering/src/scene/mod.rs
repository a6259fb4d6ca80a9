//! # Scene Objects
//!
//! Renderable objects placed in the world. Each one embeds a [`SceneActor`]
//! and syncs it ahead of its own properties:
//!
//! ```text
//!   Light             actor | light properties
//!   Decal             actor | material ref, size, layers
//!   LightProbeVolume  actor | dirty probes | removed probes
//!   Viewport          target ref, area, clear state   (not an actor)
//! ```

mod actor;
mod decal;
mod light;
mod light_probe_volume;
mod viewport;

pub use actor::{Actor, ActorDirtyFlags, Mobility, SceneActor};
pub use decal::{CoreDecal, Decal, DecalProperties};
pub use light::{CoreLight, Light, LightProperties, LightType};
pub use light_probe_volume::{
    Aabb, AmbientBaker, CoreLightProbeVolume, LightProbeFlags, LightProbeInfo, LightProbeVolume,
    ProbeBaker, ProbeHandle, ShCoefficients, MIN_PROBES,
};
pub use viewport::{ClearFlags, ClearValues, CoreViewport, NormalizedRect, PixelRect, Viewport, ViewportState};
