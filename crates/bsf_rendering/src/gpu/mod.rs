//! # GPU Layer
//!
//! Parameter type table, GPU resources and the render API factory that
//! passes compile against.

mod param_type;
mod render_api;
mod resources;

pub use param_type::{
    GpuBool, GpuParamDataType, GpuParamDataTypeInfo, GpuParamObjectType, GpuParamValue,
    MaterialParamKind,
};
pub use render_api::{
    BlendFactor, BlendState, BlendStateDesc, CompareFunction, ComputePipelineState, CreationStats,
    CullMode, DepthStencilState, DepthStencilStateDesc, GpuProgram, GpuProgramDesc, GpuProgramType,
    GraphicsPipelineDesc, GraphicsPipelineState, HeadlessRenderApi, PipelineState, RasterizerState,
    RasterizerStateDesc, RenderApi, RenderCapabilities, RenderState,
};
pub use resources::{
    AddressMode, FilterMode, GpuBuffer, PixelFormat, SamplerState, SpriteAnimation, SpriteTexture,
    Texture, TextureDesc, TextureSurface,
};
