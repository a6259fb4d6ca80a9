//! # BSF Shared
//!
//! Plain value types used on both sides of the sim/core boundary.
//!
//! ## CRITICAL RULE
//!
//! Every type exported from here must be `bytemuck::Pod`. The sync layer copies
//! them as raw bytes and the material layer stores them in GPU parameter
//! blocks, so padding or pointers are not allowed.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod color;
pub mod math;
pub mod matrix;

pub use color::Color;
pub use math::{IVec2, IVec3, IVec4, Quaternion, Transform, Vec2, Vec3, Vec4};
pub use matrix::{Mat2, Mat2x3, Mat2x4, Mat3, Mat3x2, Mat3x4, Mat4, Mat4x2, Mat4x3};
