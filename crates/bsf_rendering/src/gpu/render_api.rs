//! # Render API
//!
//! Factory for the immutable GPU objects a pass compiles into. The backend is
//! injected; nothing here reaches for a global renderer.
//!
//! ```text
//!   PassDesc ──► create_program (per non-empty stage)
//!            ──► create_blend/rasterizer/depth_stencil_state
//!            ──► create_graphics_pipeline | create_compute_pipeline
//! ```
//!
//! [`HeadlessRenderApi`] builds plain CPU objects and counts every creation,
//! which is what tools and tests run against.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

/// Pipeline stage a program runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GpuProgramType {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Geometry stage.
    Geometry,
    /// Tessellation control stage.
    Hull,
    /// Tessellation evaluation stage.
    Domain,
    /// Compute dispatch.
    Compute,
}

/// Source of one program stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuProgramDesc {
    /// Stage.
    pub program_type: GpuProgramType,
    /// Program source. Empty means the stage is unused.
    pub source: String,
    /// Entry point name.
    pub entry_point: String,
    /// Shading language, e.g. "hlsl" or "glsl".
    pub language: String,
}

impl GpuProgramDesc {
    /// An unused stage.
    #[must_use]
    pub fn empty(program_type: GpuProgramType) -> Self {
        Self {
            program_type,
            source: String::new(),
            entry_point: String::new(),
            language: String::new(),
        }
    }

    /// A stage with source, entry point `main`.
    #[must_use]
    pub fn new(program_type: GpuProgramType, language: &str, source: &str) -> Self {
        Self {
            program_type,
            source: source.to_string(),
            entry_point: "main".to_string(),
            language: language.to_string(),
        }
    }

    /// Returns true if the stage has no source.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// A compiled program.
#[derive(Debug)]
pub struct GpuProgram {
    id: u64,
    desc: GpuProgramDesc,
}

impl GpuProgram {
    /// Backend object id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Description it was built from.
    #[must_use]
    pub const fn desc(&self) -> &GpuProgramDesc {
        &self.desc
    }
}

/// Blend factors used by [`BlendStateDesc`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 1
    #[default]
    One,
    /// 0
    Zero,
    /// Source alpha.
    SourceAlpha,
    /// 1 - source alpha.
    InvSourceAlpha,
}

/// Output merger blending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendStateDesc {
    /// Blending enabled for render target 0.
    pub enabled: bool,
    /// Source factor.
    pub source: BlendFactor,
    /// Destination factor.
    pub destination: BlendFactor,
    /// RGBA write mask, one bit per channel.
    pub write_mask: u8,
    /// Alpha to coverage.
    pub alpha_to_coverage: bool,
}

impl Default for BlendStateDesc {
    fn default() -> Self {
        Self {
            enabled: false,
            source: BlendFactor::One,
            destination: BlendFactor::Zero,
            write_mask: 0b1111,
            alpha_to_coverage: false,
        }
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Cull clockwise faces.
    #[default]
    Clockwise,
    /// Cull counter-clockwise faces.
    CounterClockwise,
}

/// Rasterizer state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizerStateDesc {
    /// Face culling.
    pub cull_mode: CullMode,
    /// Wireframe instead of solid fill.
    pub wireframe: bool,
    /// Constant depth bias.
    pub depth_bias: f32,
    /// Depth clipping enabled.
    pub depth_clip: bool,
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        Self { cull_mode: CullMode::Clockwise, wireframe: false, depth_bias: 0.0, depth_clip: true }
    }
}

/// Depth comparison function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Always passes.
    Always,
    /// Passes if less.
    #[default]
    Less,
    /// Passes if less or equal.
    LessEqual,
    /// Passes if greater.
    Greater,
}

/// Depth/stencil state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDesc {
    /// Depth test enabled.
    pub depth_read: bool,
    /// Depth writes enabled.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_compare: CompareFunction,
    /// Stencil test enabled.
    pub stencil: bool,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self { depth_read: true, depth_write: true, depth_compare: CompareFunction::Less, stencil: false }
    }
}

/// Immutable state object built from a description.
#[derive(Debug)]
pub struct RenderState<D> {
    id: u64,
    desc: D,
}

impl<D> RenderState<D> {
    /// Backend object id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Description it was built from.
    #[must_use]
    pub const fn desc(&self) -> &D {
        &self.desc
    }
}

/// Compiled blend state.
pub type BlendState = RenderState<BlendStateDesc>;
/// Compiled rasterizer state.
pub type RasterizerState = RenderState<RasterizerStateDesc>;
/// Compiled depth/stencil state.
pub type DepthStencilState = RenderState<DepthStencilStateDesc>;

/// Everything a graphics pipeline is built from.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineDesc {
    /// Vertex program.
    pub vertex: Option<Arc<GpuProgram>>,
    /// Fragment program.
    pub fragment: Option<Arc<GpuProgram>>,
    /// Geometry program.
    pub geometry: Option<Arc<GpuProgram>>,
    /// Hull program.
    pub hull: Option<Arc<GpuProgram>>,
    /// Domain program.
    pub domain: Option<Arc<GpuProgram>>,
    /// Blend state.
    pub blend: Arc<BlendState>,
    /// Rasterizer state.
    pub rasterizer: Arc<RasterizerState>,
    /// Depth/stencil state.
    pub depth_stencil: Arc<DepthStencilState>,
}

/// Compiled graphics pipeline.
#[derive(Debug)]
pub struct GraphicsPipelineState {
    id: u64,
    desc: GraphicsPipelineDesc,
}

impl GraphicsPipelineState {
    /// Backend object id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Programs and states it was built from.
    #[must_use]
    pub const fn desc(&self) -> &GraphicsPipelineDesc {
        &self.desc
    }
}

/// Compiled compute pipeline.
#[derive(Debug)]
pub struct ComputePipelineState {
    id: u64,
    program: Arc<GpuProgram>,
}

impl ComputePipelineState {
    /// Backend object id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The compute program.
    #[must_use]
    pub fn program(&self) -> &Arc<GpuProgram> {
        &self.program
    }
}

/// The compiled form of a pass.
#[derive(Clone, Debug)]
pub enum PipelineState {
    /// Rasterization pipeline.
    Graphics(Arc<GraphicsPipelineState>),
    /// Compute pipeline.
    Compute(Arc<ComputePipelineState>),
}

impl PipelineState {
    /// Backend object id of the pipeline.
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            Self::Graphics(state) => state.id(),
            Self::Compute(state) => state.id(),
        }
    }

    /// Returns true if both handles point to the same pipeline object.
    #[must_use]
    pub fn same_object(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Graphics(a), Self::Graphics(b)) => Arc::ptr_eq(a, b),
            (Self::Compute(a), Self::Compute(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns true for compute pipelines.
    #[must_use]
    pub const fn is_compute(&self) -> bool {
        matches!(self, Self::Compute(_))
    }
}

/// What the active backend can do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderCapabilities {
    /// Backend name, e.g. "vulkan".
    pub renderer: String,
    /// Shading languages the backend accepts.
    pub languages: Vec<String>,
}

impl RenderCapabilities {
    /// Capabilities of a backend accepting `languages`.
    #[must_use]
    pub fn new(renderer: &str, languages: &[&str]) -> Self {
        Self {
            renderer: renderer.to_string(),
            languages: languages.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    /// Returns true if programs in `language` can be compiled. "Any" always can.
    #[must_use]
    pub fn supports_language(&self, language: &str) -> bool {
        language == "Any" || self.languages.iter().any(|l| l == language)
    }
}

/// GPU object factory.
pub trait RenderApi: Send + Sync {
    /// Backend capabilities.
    fn capabilities(&self) -> &RenderCapabilities;

    /// Compiles a program stage.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the backend rejects the program.
    fn create_program(&self, desc: &GpuProgramDesc) -> RenderResult<Arc<GpuProgram>>;

    /// Creates a blend state.
    fn create_blend_state(&self, desc: &BlendStateDesc) -> Arc<BlendState>;

    /// Creates a rasterizer state.
    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Arc<RasterizerState>;

    /// Creates a depth/stencil state.
    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Arc<DepthStencilState>;

    /// Links a graphics pipeline.
    fn create_graphics_pipeline(&self, desc: GraphicsPipelineDesc) -> Arc<GraphicsPipelineState>;

    /// Links a compute pipeline.
    fn create_compute_pipeline(&self, program: Arc<GpuProgram>) -> Arc<ComputePipelineState>;
}

/// Creation counters of a [`HeadlessRenderApi`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreationStats {
    /// Programs compiled.
    pub programs: usize,
    /// Blend, rasterizer and depth/stencil states created.
    pub states: usize,
    /// Graphics and compute pipelines linked.
    pub pipelines: usize,
}

/// Render API without a GPU.
#[derive(Debug)]
pub struct HeadlessRenderApi {
    capabilities: RenderCapabilities,
    next_id: AtomicU64,
    programs: AtomicUsize,
    states: AtomicUsize,
    pipelines: AtomicUsize,
}

impl HeadlessRenderApi {
    /// Creates a backend accepting programs in any of `languages`.
    #[must_use]
    pub fn new(languages: &[&str]) -> Self {
        Self::with_capabilities(RenderCapabilities::new("headless", languages))
    }

    /// Creates a backend with explicit capabilities.
    #[must_use]
    pub fn with_capabilities(capabilities: RenderCapabilities) -> Self {
        Self {
            capabilities,
            next_id: AtomicU64::new(1),
            programs: AtomicUsize::new(0),
            states: AtomicUsize::new(0),
            pipelines: AtomicUsize::new(0),
        }
    }

    /// Creation counters so far.
    #[must_use]
    pub fn stats(&self) -> CreationStats {
        CreationStats {
            programs: self.programs.load(Ordering::Relaxed),
            states: self.states.load(Ordering::Relaxed),
            pipelines: self.pipelines.load(Ordering::Relaxed),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn state<D: Clone>(&self, desc: &D) -> Arc<RenderState<D>> {
        self.states.fetch_add(1, Ordering::Relaxed);
        Arc::new(RenderState { id: self.next_id(), desc: desc.clone() })
    }
}

impl RenderApi for HeadlessRenderApi {
    fn capabilities(&self) -> &RenderCapabilities {
        &self.capabilities
    }

    fn create_program(&self, desc: &GpuProgramDesc) -> RenderResult<Arc<GpuProgram>> {
        if !self.capabilities.supports_language(&desc.language) {
            return Err(RenderError::UnsupportedLanguage {
                stage: desc.program_type,
                language: desc.language.clone(),
            });
        }
        if desc.entry_point.is_empty() {
            return Err(RenderError::CompileFailed {
                stage: desc.program_type,
                message: "missing entry point".to_string(),
            });
        }

        self.programs.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(GpuProgram { id: self.next_id(), desc: desc.clone() }))
    }

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Arc<BlendState> {
        self.state(desc)
    }

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Arc<RasterizerState> {
        self.state(desc)
    }

    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Arc<DepthStencilState> {
        self.state(desc)
    }

    fn create_graphics_pipeline(&self, desc: GraphicsPipelineDesc) -> Arc<GraphicsPipelineState> {
        self.pipelines.fetch_add(1, Ordering::Relaxed);
        Arc::new(GraphicsPipelineState { id: self.next_id(), desc })
    }

    fn create_compute_pipeline(&self, program: Arc<GpuProgram>) -> Arc<ComputePipelineState> {
        self.pipelines.fetch_add(1, Ordering::Relaxed);
        Arc::new(ComputePipelineState { id: self.next_id(), program })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsupported_language() {
        let api = HeadlessRenderApi::new(&["hlsl"]);
        let desc = GpuProgramDesc::new(GpuProgramType::Vertex, "glsl", "void main() {}");

        let err = api.create_program(&desc).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedLanguage { stage: GpuProgramType::Vertex, .. }));
        assert_eq!(api.stats().programs, 0);
    }

    #[test]
    fn test_any_language_is_always_supported() {
        let caps = RenderCapabilities::new("headless", &[]);
        assert!(caps.supports_language("Any"));
        assert!(!caps.supports_language("hlsl"));
    }

    #[test]
    fn test_counts_every_creation() {
        let api = HeadlessRenderApi::new(&["hlsl"]);
        let program = api
            .create_program(&GpuProgramDesc::new(GpuProgramType::Compute, "hlsl", "[numthreads(8,8,1)]"))
            .unwrap();
        let _ = api.create_blend_state(&BlendStateDesc::default());
        let _ = api.create_depth_stencil_state(&DepthStencilStateDesc::default());
        let pipeline = api.create_compute_pipeline(Arc::clone(&program));

        assert_eq!(api.stats(), CreationStats { programs: 1, states: 2, pipelines: 1 });
        assert_ne!(pipeline.id(), program.id());
    }
}
