//! # Materials
//!
//! ```text
//!   Shader ──► Technique ──► Pass ──► PipelineState (compiled once)
//!     │
//!     └── ShaderParamTable ──► MaterialParams<D> ──► GpuParamsSet
//!                                      ▲
//!   Material (sim) ── sync ──► CoreMaterial (core)
//! ```
//!
//! Shaders, techniques and passes are immutable after creation and shared by
//! both threads. Materials and their parameters are the mutable part; they
//! reach the core thread through the sync protocol.

mod animation;
#[allow(clippy::module_inception)]
mod material;
mod param_handle;
mod params;
mod params_set;
mod pass;
mod shader;
mod technique;
mod variation;

pub use animation::{repeat, AnimationCurve, ColorGradient, CurveKey, GradientKey};
pub use material::{CoreMaterial, Material, MaterialDirtyFlags, SharedMaterial};
pub use param_handle::{
    BufferParam, CurveParam, DataParam, GradientParam, LoadStoreTextureParam, SamplerParam,
    SpriteTextureParam, StructParam, TextureParam,
};
pub use params::{MaterialParams, ParamData, ParamError, TextureBinding, TextureSlot};
pub use params_set::{BoundTexture, GpuParamsSet};
pub use pass::{CorePass, Pass, PassDesc};
pub use shader::{
    CoreShader, Shader, ShaderDataParamDesc, ShaderDesc, ShaderObjectParamDesc, ShaderParamTable,
};
pub use technique::{
    default_technique, find_technique, find_technique_by_tag, CoreTechnique, FindTechniqueDesc,
    Technique, TechniqueDesc, TechniqueInfo,
};
pub use variation::{ShaderVariation, VariationParam, VariationParamKind};
