//! # GPU Resources
//!
//! Objects a material parameter can point at.
//!
//! ```text
//!   Texture, SpriteTexture   loaded through Resources; sim side holds a
//!                            ResourceHandle, core side gets the loaded Arc
//!   GpuBuffer, SamplerState  immutable once created; both sides share the
//!                            same Arc
//! ```

use std::sync::Arc;

use bsf_core::{Counterpart, ResourceHandle};
use bsf_shared::Vec4;
use bytemuck::{Pod, Zeroable};

/// Pixel format of a texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bit RGBA.
    #[default]
    Rgba8,
    /// 16 bit float RGBA.
    Rgba16F,
    /// 32 bit float RGBA.
    Rgba32F,
    /// 32 bit float depth.
    Depth32F,
}

/// Shape of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Mip levels, including the top one.
    pub mip_levels: u32,
    /// Array slices.
    pub array_slices: u32,
    /// Pixel format.
    pub format: PixelFormat,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self { width: 1, height: 1, mip_levels: 1, array_slices: 1, format: PixelFormat::Rgba8 }
    }
}

impl TextureDesc {
    /// A single-mip 2D texture.
    #[must_use]
    pub fn new_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self { width, height, format, ..Self::default() }
    }
}

/// A loaded texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Asset name.
    pub name: String,
    /// Shape.
    pub desc: TextureDesc,
}

impl Texture {
    /// Creates a texture description.
    #[must_use]
    pub fn new(name: &str, desc: TextureDesc) -> Self {
        Self { name: name.to_string(), desc }
    }
}

impl Counterpart for Texture {
    type SimRef = Option<ResourceHandle<Texture>>;
    type Core = Texture;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<Texture>> {
        sim.as_ref().and_then(ResourceHandle::get)
    }
}

/// Mip and slice range of a texture view.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TextureSurface {
    /// First mip level.
    pub mip_level: u32,
    /// Number of mip levels.
    pub num_mip_levels: u32,
    /// First array slice.
    pub face: u32,
    /// Number of array slices.
    pub num_faces: u32,
}

impl TextureSurface {
    /// Every mip and every slice.
    pub const COMPLETE: Self = Self { mip_level: 0, num_mip_levels: 0, face: 0, num_faces: 0 };

    /// A single mip of every slice. Load-store bindings use this.
    #[must_use]
    pub const fn mip(mip_level: u32) -> Self {
        Self { mip_level, num_mip_levels: 1, face: 0, num_faces: 0 }
    }
}

impl Default for TextureSurface {
    fn default() -> Self {
        Self::COMPLETE
    }
}

/// Flip-book animation over a grid of atlas cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteAnimation {
    /// Columns in the grid.
    pub columns: u32,
    /// Rows in the grid.
    pub rows: u32,
    /// Frames actually used, read row by row.
    pub count: u32,
    /// Frames per second.
    pub fps: f32,
}

/// A sub-rectangle of an atlas texture, optionally animated.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteTexture {
    /// Atlas the sprite samples from.
    pub atlas: Option<Arc<Texture>>,
    /// UV offset of the sprite inside the atlas.
    pub uv_offset: [f32; 2],
    /// UV size of the sprite inside the atlas.
    pub uv_scale: [f32; 2],
    /// Flip-book animation, if any.
    pub animation: Option<SpriteAnimation>,
}

impl SpriteTexture {
    /// A static sprite covering the whole atlas.
    #[must_use]
    pub fn new(atlas: Option<Arc<Texture>>) -> Self {
        Self { atlas, uv_offset: [0.0, 0.0], uv_scale: [1.0, 1.0], animation: None }
    }

    /// Returns true if the UV transform changes over time.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.animation.map_or(false, |anim| anim.count > 1 && anim.fps > 0.0)
    }

    /// UV transform at time `t` as `(offset.x, offset.y, scale.x, scale.y)`.
    #[must_use]
    pub fn evaluate(&self, t: f32) -> Vec4 {
        let [ox, oy] = self.uv_offset;
        let [sx, sy] = self.uv_scale;

        let Some(anim) = self.animation.filter(|_| self.is_animated()) else {
            return Vec4::new(ox, oy, sx, sy);
        };

        let columns = anim.columns.max(1);
        let rows = anim.rows.max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frame = ((t.max(0.0) * anim.fps) as u32) % anim.count;
        let cell_w = sx / columns as f32;
        let cell_h = sy / rows as f32;
        let column = frame % columns;
        let row = (frame / columns) % rows;

        Vec4::new(ox + cell_w * column as f32, oy + cell_h * row as f32, cell_w, cell_h)
    }
}

impl Counterpart for SpriteTexture {
    type SimRef = Option<ResourceHandle<SpriteTexture>>;
    type Core = SpriteTexture;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<SpriteTexture>> {
        sim.as_ref().and_then(ResourceHandle::get)
    }
}

/// A GPU buffer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuBuffer {
    /// Debug name.
    pub name: String,
    /// Number of elements.
    pub elements: u32,
    /// Size of one element in bytes.
    pub element_size: u32,
}

impl GpuBuffer {
    /// Creates a buffer description.
    #[must_use]
    pub fn new(name: &str, elements: u32, element_size: u32) -> Self {
        Self { name: name.to_string(), elements, element_size }
    }
}

impl Counterpart for GpuBuffer {
    type SimRef = Option<Arc<GpuBuffer>>;
    type Core = GpuBuffer;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<GpuBuffer>> {
        sim.clone()
    }
}

/// Texture filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Point,
    /// Linear blend.
    #[default]
    Linear,
    /// Anisotropic.
    Anisotropic,
}

/// Texture coordinate wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Repeat.
    #[default]
    Wrap,
    /// Mirror on every repeat.
    Mirror,
    /// Clamp to edge.
    Clamp,
}

/// Sampler state. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplerState {
    /// Minification and magnification filter.
    pub filter: FilterMode,
    /// Coordinate wrapping on every axis.
    pub address: AddressMode,
    /// Maximum anisotropy, used with [`FilterMode::Anisotropic`].
    pub max_anisotropy: u32,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self { filter: FilterMode::Linear, address: AddressMode::Wrap, max_anisotropy: 1 }
    }
}

impl Counterpart for SamplerState {
    type SimRef = Option<Arc<SamplerState>>;
    type Core = SamplerState;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<SamplerState>> {
        sim.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_sprite_returns_its_rect() {
        let mut sprite = SpriteTexture::new(None);
        sprite.uv_offset = [0.25, 0.5];
        sprite.uv_scale = [0.5, 0.5];
        assert!(!sprite.is_animated());
        assert_eq!(sprite.evaluate(10.0), Vec4::new(0.25, 0.5, 0.5, 0.5));
    }

    #[test]
    fn test_animated_sprite_walks_grid() {
        let mut sprite = SpriteTexture::new(None);
        sprite.animation = Some(SpriteAnimation { columns: 2, rows: 2, count: 4, fps: 1.0 });
        assert!(sprite.is_animated());

        assert_eq!(sprite.evaluate(0.0), Vec4::new(0.0, 0.0, 0.5, 0.5));
        assert_eq!(sprite.evaluate(1.5), Vec4::new(0.5, 0.0, 0.5, 0.5));
        assert_eq!(sprite.evaluate(2.0), Vec4::new(0.0, 0.5, 0.5, 0.5));
        // wraps after the last frame
        assert_eq!(sprite.evaluate(4.0), sprite.evaluate(0.0));
    }

    #[test]
    fn test_unloaded_texture_resolves_to_none() {
        let resources = bsf_core::Resources::new();
        let handle = resources.handle::<Texture>("albedo.png");
        assert!(Texture::resolve(&Some(handle.clone())).is_none());

        resources.load(&handle, Texture::new("albedo.png", TextureDesc::default()));
        assert!(Texture::resolve(&Some(handle)).is_some());
    }
}
