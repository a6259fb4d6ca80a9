//! # Rendering Error Types
//!
//! Two tiers:
//! - [`RenderError`]: the render API refused to build something.
//! - [`MaterialError`]: a material was used before it had a usable shader.
//!
//! Unknown parameter names are NOT errors. They log a warning and hand out an
//! unbound parameter handle instead.

use thiserror::Error;

use crate::gpu::GpuProgramType;

/// Failures reported by a [`RenderApi`](crate::gpu::RenderApi).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The program language is not supported by the active render backend.
    #[error("{stage:?} program uses unsupported language '{language}'")]
    UnsupportedLanguage {
        /// Stage of the rejected program.
        stage: GpuProgramType,
        /// Requested language.
        language: String,
    },

    /// The backend failed to compile a program.
    #[error("{stage:?} program failed to compile: {message}")]
    CompileFailed {
        /// Stage of the rejected program.
        stage: GpuProgramType,
        /// Compiler output.
        message: String,
    },

    /// A pass declared neither a compute program nor a vertex program.
    #[error("pass has no vertex or compute program")]
    EmptyPass,
}

/// Errors raised by material accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterialError {
    /// Material has no shader, or the shader is not loaded yet.
    #[error("Material does not have shader set.")]
    NoShader,

    /// The shader has no technique the current renderer supports.
    #[error("Shader does not contain a supported technique.")]
    NoSupportedTechnique,

    /// Technique index is out of range.
    #[error("technique index {index} out of range ({count} techniques)")]
    InvalidTechnique {
        /// Requested index.
        index: usize,
        /// Number of techniques.
        count: usize,
    },

    /// Pipeline compilation failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for material operations.
pub type MaterialResult<T> = Result<T, MaterialError>;

/// Result type for render API calls.
pub type RenderResult<T> = Result<T, RenderError>;
