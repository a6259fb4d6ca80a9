//! # Passes
//!
//! One draw (or dispatch) of a technique: stage programs plus fixed-function
//! state, compiled once into a pipeline state.
//!
//! ```text
//!   Uncompiled ──create_pipeline_state()──► Compiled
//!        ▲                                     │
//!        └──────── never goes back ────────────┘ (further calls return the
//!                                                 same pipeline object)
//! ```
//!
//! The compiled state is immutable, so sim and core share one [`CorePass`].

use std::sync::{Arc, OnceLock};

use crate::error::{MaterialResult, RenderError};
use crate::gpu::{
    BlendStateDesc, DepthStencilStateDesc, GpuProgram, GpuProgramDesc, GpuProgramType,
    GraphicsPipelineDesc, PipelineState, RasterizerStateDesc, RenderApi,
};

/// Everything a pass is compiled from.
#[derive(Clone, Debug, PartialEq)]
pub struct PassDesc {
    /// Vertex stage.
    pub vertex: GpuProgramDesc,
    /// Fragment stage.
    pub fragment: GpuProgramDesc,
    /// Geometry stage.
    pub geometry: GpuProgramDesc,
    /// Hull stage.
    pub hull: GpuProgramDesc,
    /// Domain stage.
    pub domain: GpuProgramDesc,
    /// Compute stage. A pass with compute source is a compute pass.
    pub compute: GpuProgramDesc,
    /// Blend state.
    pub blend: BlendStateDesc,
    /// Rasterizer state.
    pub rasterizer: RasterizerStateDesc,
    /// Depth/stencil state.
    pub depth_stencil: DepthStencilStateDesc,
    /// Stencil reference value.
    pub stencil_ref: u32,
}

impl Default for PassDesc {
    fn default() -> Self {
        Self {
            vertex: GpuProgramDesc::empty(GpuProgramType::Vertex),
            fragment: GpuProgramDesc::empty(GpuProgramType::Fragment),
            geometry: GpuProgramDesc::empty(GpuProgramType::Geometry),
            hull: GpuProgramDesc::empty(GpuProgramType::Hull),
            domain: GpuProgramDesc::empty(GpuProgramType::Domain),
            compute: GpuProgramDesc::empty(GpuProgramType::Compute),
            blend: BlendStateDesc::default(),
            rasterizer: RasterizerStateDesc::default(),
            depth_stencil: DepthStencilStateDesc::default(),
            stencil_ref: 0,
        }
    }
}

impl PassDesc {
    /// A graphics pass with vertex and fragment source.
    #[must_use]
    pub fn graphics(language: &str, vertex: &str, fragment: &str) -> Self {
        Self {
            vertex: GpuProgramDesc::new(GpuProgramType::Vertex, language, vertex),
            fragment: GpuProgramDesc::new(GpuProgramType::Fragment, language, fragment),
            ..Self::default()
        }
    }

    /// A compute pass.
    #[must_use]
    pub fn compute(language: &str, source: &str) -> Self {
        Self {
            compute: GpuProgramDesc::new(GpuProgramType::Compute, language, source),
            ..Self::default()
        }
    }

    /// Returns true if the pass dispatches compute work.
    #[inline]
    #[must_use]
    pub fn is_compute(&self) -> bool {
        !self.compute.is_empty()
    }
}

/// Compiled half of a pass, shared by sim and core.
#[derive(Debug)]
pub struct CorePass {
    desc: PassDesc,
    pipeline: OnceLock<PipelineState>,
}

impl CorePass {
    /// Creates an uncompiled pass.
    #[must_use]
    pub fn new(desc: PassDesc) -> Self {
        Self { desc, pipeline: OnceLock::new() }
    }

    /// Source description.
    #[must_use]
    pub const fn desc(&self) -> &PassDesc {
        &self.desc
    }

    /// Returns true if the pass dispatches compute work.
    #[inline]
    #[must_use]
    pub fn is_compute(&self) -> bool {
        self.desc.is_compute()
    }

    /// Compiled pipeline, if [`create_pipeline_state`](Self::create_pipeline_state) ran.
    #[must_use]
    pub fn pipeline_state(&self) -> Option<&PipelineState> {
        self.pipeline.get()
    }

    /// Compiles the pass. A pass that is already compiled returns its
    /// existing pipeline.
    ///
    /// # Errors
    ///
    /// Fails if a stage does not compile, or if the pass has neither a vertex
    /// nor a compute program.
    pub fn create_pipeline_state(&self, api: &dyn RenderApi) -> MaterialResult<PipelineState> {
        if let Some(existing) = self.pipeline.get() {
            return Ok(existing.clone());
        }

        let built = self.build(api)?;
        // Two threads may race here; the first stored pipeline wins.
        Ok(self.pipeline.get_or_init(|| built).clone())
    }

    fn build(&self, api: &dyn RenderApi) -> MaterialResult<PipelineState> {
        let desc = &self.desc;

        if desc.is_compute() {
            let program = api.create_program(&desc.compute)?;
            tracing::info!("Compiled compute pass (program {})", program.id());
            return Ok(PipelineState::Compute(api.create_compute_pipeline(program)));
        }
        if desc.vertex.is_empty() {
            return Err(RenderError::EmptyPass.into());
        }

        let stage = |program: &GpuProgramDesc| -> MaterialResult<Option<Arc<GpuProgram>>> {
            if program.is_empty() {
                return Ok(None);
            }
            Ok(Some(api.create_program(program)?))
        };

        let pipeline = GraphicsPipelineDesc {
            vertex: stage(&desc.vertex)?,
            fragment: stage(&desc.fragment)?,
            geometry: stage(&desc.geometry)?,
            hull: stage(&desc.hull)?,
            domain: stage(&desc.domain)?,
            blend: api.create_blend_state(&desc.blend),
            rasterizer: api.create_rasterizer_state(&desc.rasterizer),
            depth_stencil: api.create_depth_stencil_state(&desc.depth_stencil),
        };

        let state = api.create_graphics_pipeline(pipeline);
        tracing::info!("Compiled graphics pass (pipeline {})", state.id());
        Ok(PipelineState::Graphics(state))
    }
}

/// Sim-side pass handle.
#[derive(Clone, Debug)]
pub struct Pass {
    core: Arc<CorePass>,
}

impl Pass {
    /// Creates an uncompiled pass.
    #[must_use]
    pub fn new(desc: PassDesc) -> Self {
        Self { core: Arc::new(CorePass::new(desc)) }
    }

    /// Source description.
    #[must_use]
    pub fn desc(&self) -> &PassDesc {
        self.core.desc()
    }

    /// Returns true if the pass dispatches compute work.
    #[must_use]
    pub fn is_compute(&self) -> bool {
        self.core.is_compute()
    }

    /// Compiles the pass; see [`CorePass::create_pipeline_state`].
    ///
    /// # Errors
    ///
    /// See [`CorePass::create_pipeline_state`].
    pub fn create_pipeline_state(&self, api: &dyn RenderApi) -> MaterialResult<PipelineState> {
        self.core.create_pipeline_state(api)
    }

    /// Compiled pipeline, if any.
    #[must_use]
    pub fn pipeline_state(&self) -> Option<&PipelineState> {
        self.core.pipeline_state()
    }

    /// The shared compiled half.
    #[must_use]
    pub fn core(&self) -> &Arc<CorePass> {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaterialError;
    use crate::gpu::HeadlessRenderApi;

    #[test]
    fn test_compile_is_idempotent() {
        let api = HeadlessRenderApi::new(&["hlsl"]);
        let pass = Pass::new(PassDesc::graphics("hlsl", "vs", "ps"));
        assert!(pass.pipeline_state().is_none());

        let first = pass.create_pipeline_state(&api).unwrap();
        let second = pass.create_pipeline_state(&api).unwrap();
        assert!(first.same_object(&second));
        assert_eq!(api.stats().pipelines, 1);
        assert_eq!(api.stats().programs, 2);
    }

    #[test]
    fn test_compute_pass_builds_compute_pipeline() {
        let api = HeadlessRenderApi::new(&["glsl"]);
        let pass = Pass::new(PassDesc::compute("glsl", "void main() {}"));
        assert!(pass.is_compute());
        assert!(pass.create_pipeline_state(&api).unwrap().is_compute());
        // compute passes never build fixed-function state
        assert_eq!(api.stats().states, 0);
    }

    #[test]
    fn test_failed_compile_stays_uncompiled() {
        let api = HeadlessRenderApi::new(&["hlsl"]);
        let pass = Pass::new(PassDesc::graphics("glsl", "vs", "ps"));
        let err = pass.create_pipeline_state(&api).unwrap_err();
        assert!(matches!(err, MaterialError::Render(RenderError::UnsupportedLanguage { .. })));
        assert!(pass.pipeline_state().is_none());
    }

    #[test]
    fn test_pass_without_programs_is_rejected() {
        let api = HeadlessRenderApi::new(&["hlsl"]);
        let pass = CorePass::new(PassDesc::default());
        assert_eq!(
            pass.create_pipeline_state(&api).unwrap_err(),
            MaterialError::Render(RenderError::EmptyPass)
        );
    }
}
