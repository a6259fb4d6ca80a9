//! # GPU Parameter Types
//!
//! Closed set of data types a shader parameter can have, with their size and
//! layout. Two sizes matter:
//!
//! ```text
//!   packed size  rows * columns * 4   how MaterialParams stores an element
//!   gpu size     from the table       how a param block lays it out
//!
//!   FLOAT3:  packed 12, gpu 16 (aligned to 16)
//!   MAT3x3:  packed 36, gpu 48 (each row padded to 16)
//! ```

use bsf_shared::{
    Color, IVec2, IVec3, IVec4, Mat2, Mat2x3, Mat2x4, Mat3, Mat3x2, Mat3x4, Mat4, Mat4x2, Mat4x3,
    Vec2, Vec3, Vec4,
};
use bytemuck::{Pod, Zeroable};

/// Data type of a shader data parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum GpuParamDataType {
    /// `f32`
    Float1 = 1,
    /// [`Vec2`]
    Float2 = 2,
    /// [`Vec3`]
    Float3 = 3,
    /// [`Vec4`]
    Float4 = 4,
    /// [`Mat2`]
    Matrix2x2 = 11,
    /// [`Mat2x3`]
    Matrix2x3 = 12,
    /// [`Mat2x4`]
    Matrix2x4 = 13,
    /// [`Mat3x2`]
    Matrix3x2 = 14,
    /// [`Mat3`]
    Matrix3x3 = 15,
    /// [`Mat3x4`]
    Matrix3x4 = 16,
    /// [`Mat4x2`]
    Matrix4x2 = 17,
    /// [`Mat4x3`]
    Matrix4x3 = 18,
    /// [`Mat4`]
    Matrix4x4 = 19,
    /// `i32`
    Int1 = 20,
    /// [`IVec2`]
    Int2 = 21,
    /// [`IVec3`]
    Int3 = 22,
    /// [`IVec4`]
    Int4 = 23,
    /// [`GpuBool`], a 4 byte integer on the GPU.
    Bool = 24,
    /// Opaque structure; its size comes from the shader declaration.
    Struct = 25,
    /// [`Color`]. Laid out like `Float4`.
    Color = 26,
}

/// Size and layout of one [`GpuParamDataType`]. Sizes are in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuParamDataTypeInfo {
    /// Size of one scalar component.
    pub base_type_size: u32,
    /// Size inside a param block. Zero for structs.
    pub size: u32,
    /// Alignment inside a param block.
    pub alignment: u32,
    /// Matrix rows, 1 for vectors.
    pub rows: u32,
    /// Matrix columns or vector components.
    pub columns: u32,
}

const fn info(size: u32, alignment: u32, rows: u32, columns: u32) -> GpuParamDataTypeInfo {
    GpuParamDataTypeInfo { base_type_size: 4, size, alignment, rows, columns }
}

impl GpuParamDataType {
    /// Every data type, in declaration order.
    pub const ALL: [Self; 20] = [
        Self::Float1,
        Self::Float2,
        Self::Float3,
        Self::Float4,
        Self::Matrix2x2,
        Self::Matrix2x3,
        Self::Matrix2x4,
        Self::Matrix3x2,
        Self::Matrix3x3,
        Self::Matrix3x4,
        Self::Matrix4x2,
        Self::Matrix4x3,
        Self::Matrix4x4,
        Self::Int1,
        Self::Int2,
        Self::Int3,
        Self::Int4,
        Self::Bool,
        Self::Struct,
        Self::Color,
    ];

    /// Layout table entry.
    #[must_use]
    pub const fn info(self) -> GpuParamDataTypeInfo {
        match self {
            Self::Float1 | Self::Int1 | Self::Bool => info(4, 4, 1, 1),
            Self::Float2 | Self::Int2 => info(8, 8, 1, 2),
            Self::Float3 => info(16, 16, 1, 3),
            Self::Int3 => info(12, 16, 1, 3),
            Self::Float4 | Self::Int4 | Self::Color => info(16, 16, 1, 4),
            Self::Matrix2x2 => info(16, 8, 2, 2),
            Self::Matrix2x3 => info(32, 16, 2, 3),
            Self::Matrix2x4 => info(32, 16, 2, 4),
            Self::Matrix3x2 => info(24, 8, 3, 2),
            Self::Matrix3x3 => info(48, 16, 3, 3),
            Self::Matrix3x4 => info(48, 16, 3, 4),
            Self::Matrix4x2 => info(32, 8, 4, 2),
            Self::Matrix4x3 => info(64, 16, 4, 3),
            Self::Matrix4x4 => info(64, 16, 4, 4),
            Self::Struct => info(0, 16, 1, 1),
        }
    }

    /// Scalar components per element.
    #[inline]
    #[must_use]
    pub const fn element_count(self) -> usize {
        let info = self.info();
        (info.rows * info.columns) as usize
    }

    /// Packed size of one element. Zero for structs, whose size is declared
    /// per parameter.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Struct => 0,
            _ => self.element_count() * self.info().base_type_size as usize,
        }
    }

    /// Numeric tag.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Parses a numeric tag.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.raw() == raw)
    }
}

/// Kind of a shader object parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GpuParamObjectType {
    /// Sampled texture.
    Texture,
    /// Texture with unordered read/write access.
    LoadStoreTexture,
    /// Structured or raw buffer.
    Buffer,
    /// Sampler state.
    Sampler,
}

/// Storage class of a material parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MaterialParamKind {
    /// Plain data, including structs.
    Data,
    /// Texture, load-store texture or sprite texture.
    Texture,
    /// GPU buffer.
    Buffer,
    /// Sampler state.
    Sampler,
}

impl From<GpuParamObjectType> for MaterialParamKind {
    fn from(ty: GpuParamObjectType) -> Self {
        match ty {
            GpuParamObjectType::Texture | GpuParamObjectType::LoadStoreTexture => Self::Texture,
            GpuParamObjectType::Buffer => Self::Buffer,
            GpuParamObjectType::Sampler => Self::Sampler,
        }
    }
}

/// Boolean shader parameter, stored as a 4 byte integer.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuBool(pub u32);

impl From<bool> for GpuBool {
    fn from(value: bool) -> Self {
        Self(u32::from(value))
    }
}

impl From<GpuBool> for bool {
    fn from(value: GpuBool) -> Self {
        value.0 != 0
    }
}

/// A Rust type that can be stored in a data parameter.
///
/// Lookups are strict: a `Vec4` will not bind to a `Color` parameter even
/// though both are 16 bytes.
pub trait GpuParamValue: Pod {
    /// Data type this value binds to.
    const DATA_TYPE: GpuParamDataType;
}

macro_rules! gpu_param_values {
    ($($ty:ty => $data_type:ident),+ $(,)?) => {
        $(
            impl GpuParamValue for $ty {
                const DATA_TYPE: GpuParamDataType = GpuParamDataType::$data_type;
            }
        )+
    };
}

gpu_param_values!(
    f32 => Float1,
    Vec2 => Float2,
    Vec3 => Float3,
    Vec4 => Float4,
    Mat2 => Matrix2x2,
    Mat2x3 => Matrix2x3,
    Mat2x4 => Matrix2x4,
    Mat3x2 => Matrix3x2,
    Mat3 => Matrix3x3,
    Mat3x4 => Matrix3x4,
    Mat4x2 => Matrix4x2,
    Mat4x3 => Matrix4x3,
    Mat4 => Matrix4x4,
    i32 => Int1,
    IVec2 => Int2,
    IVec3 => Int3,
    IVec4 => Int4,
    GpuBool => Bool,
    Color => Color,
);
