//! # BSF Rendering
//!
//! Materials, passes and scene objects on top of the bsf_core sync layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SIM THREAD                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Shader ─► Technique ─► Pass        Material ◄── param handles│
//! │                                     Light, Decal, Viewport    │
//! │                                     LightProbeVolume          │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ SyncPoint (dirty snapshots)
//! ┌───────────────────────────▼──────────────────────────────────┐
//! │                        CORE THREAD                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  CoreMaterial ─► GpuParamsSet        CoreLight, CoreDecal ... │
//! │  CorePass ─► PipelineState (compiled once, shared)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - Shaders, techniques and passes are immutable and shared by both threads
//! - Materials and scene objects change only on the sim thread
//! - Unknown parameter names warn and hand out unbound handles; they never fail
//!
//! ## Example
//!
//! ```rust,ignore
//! use bsf_rendering::material::Material;
//!
//! let mut material = Material::with_shader(shader);
//! let tint = material.param_data::<Color>("tint")?;
//! tint.set(&mut material, Color::WHITE, 0);
//! sync_point.sync_inline(&mut [&mut material]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod gpu;
pub mod material;
pub mod scene;

pub use error::{MaterialError, MaterialResult, RenderError, RenderResult};
pub use material::{CoreMaterial, GpuParamsSet, Material, MaterialParams, Shader, SharedMaterial, Technique};
pub use scene::{Decal, Light, LightProbeVolume, Viewport};
