//! # Viewport
//!
//! A normalized sub-rectangle of a render target plus how to clear it.
//!
//! The target is a texture handle. Until it loads the core viewport sees a
//! null target and renders nowhere; [`Viewport::notify_resource_loaded`]
//! resyncs it once the texture arrives.

use std::sync::Arc;

use bitflags::bitflags;
use bsf_core::{
    CoreObject, CoreObjectCore, CoreSide, CoreSync, ResourceHandle, ResourceId, SimSide,
    SyncDomain, SyncFields, SyncReader, SyncStream,
};
use bsf_shared::Color;
use bytemuck::{Pod, Zeroable};

use crate::gpu::Texture;

/// Viewports always sync their whole state.
const STATE_DIRTY: u32 = 1;

bitflags! {
    /// Buffers cleared before rendering into the viewport.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Color buffer.
        const COLOR = 1 << 0;
        /// Depth buffer.
        const DEPTH = 1 << 1;
        /// Stencil buffer.
        const STENCIL = 1 << 2;
    }
}

/// A rectangle in normalized `[0, 1]` target coordinates.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct NormalizedRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl NormalizedRect {
    /// The whole target.
    pub const FULL: Self = Self { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

    /// Creates a rectangle, clamped so it stays inside the target.
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        Self { x, y, width: width.clamp(0.0, 1.0 - x), height: height.clamp(0.0, 1.0 - y) }
    }
}

/// A rectangle in target pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Values written by a clear.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ClearValues {
    /// Color clear value.
    pub color: Color,
    /// Depth clear value.
    pub depth: f32,
    /// Stencil clear value.
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self { color: Color::new(0.0, 0.3685, 0.7, 1.0), depth: 1.0, stencil: 0 }
    }
}

/// Viewport state, generic over the side holding it.
pub struct ViewportState<D: SyncDomain> {
    /// Render target.
    pub target: D::Ref<Texture>,
    /// Area of the target covered.
    pub area: NormalizedRect,
    /// Buffers to clear.
    pub clear_flags: ClearFlags,
    /// Clear values.
    pub clear_values: ClearValues,
}

impl<D: SyncDomain> Default for ViewportState<D> {
    fn default() -> Self {
        Self {
            target: Default::default(),
            area: NormalizedRect::FULL,
            clear_flags: ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            clear_values: ClearValues::default(),
        }
    }
}

impl<D: SyncDomain> SyncFields<D> for ViewportState<D> {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        stream.reference::<Texture>(&mut self.target);
        stream.pod(&mut self.area);
        let mut clear_flags = self.clear_flags.bits();
        stream.pod(&mut clear_flags);
        self.clear_flags = ClearFlags::from_bits_truncate(clear_flags);
        stream.pod(&mut self.clear_values);
    }
}

/// Sim-thread viewport.
pub struct Viewport {
    object: CoreObjectCore<CoreViewport>,
    state: ViewportState<SimSide>,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport")
            .field("id", &self.object.id())
            .field("target", &self.state.target.as_ref().map(ResourceHandle::name))
            .field("area", &self.state.area)
            .finish_non_exhaustive()
    }
}

impl Viewport {
    /// Creates a viewport covering all of `target`.
    #[must_use]
    pub fn new(target: Option<ResourceHandle<Texture>>) -> Self {
        Self { object: CoreObjectCore::new(), state: ViewportState { target, ..ViewportState::default() } }
    }

    /// Render target handle.
    #[must_use]
    pub fn target(&self) -> Option<&ResourceHandle<Texture>> {
        self.state.target.as_ref()
    }

    /// Changes the render target.
    pub fn set_target(&mut self, target: Option<ResourceHandle<Texture>>) {
        self.state.target = target;
        self.mark_core_dirty(STATE_DIRTY);
    }

    /// Area of the target covered.
    #[must_use]
    pub const fn area(&self) -> NormalizedRect {
        self.state.area
    }

    /// Changes the covered area.
    pub fn set_area(&mut self, area: NormalizedRect) {
        self.state.area = area;
        self.mark_core_dirty(STATE_DIRTY);
    }

    /// Buffers cleared before rendering.
    #[must_use]
    pub const fn clear_flags(&self) -> ClearFlags {
        self.state.clear_flags
    }

    /// Changes which buffers are cleared.
    pub fn set_clear_flags(&mut self, flags: ClearFlags) {
        self.state.clear_flags = flags;
        self.mark_core_dirty(STATE_DIRTY);
    }

    /// Changes the clear values.
    pub fn set_clear_values(&mut self, values: ClearValues) {
        self.state.clear_values = values;
        self.mark_core_dirty(STATE_DIRTY);
    }

    /// Area in pixels, if the target is loaded.
    #[must_use]
    pub fn pixel_area(&self) -> Option<PixelRect> {
        let target = self.state.target.as_ref()?.get()?;
        Some(pixel_area(&target, self.state.area))
    }

    /// Resyncs the viewport if `id` is its render target.
    pub fn notify_resource_loaded(&mut self, id: ResourceId) {
        if self.state.target.as_ref().is_some_and(|t| t.id() == id) {
            self.mark_core_dirty(STATE_DIRTY);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn pixel_area(target: &Texture, area: NormalizedRect) -> PixelRect {
    let w = target.desc.width as f32;
    let h = target.desc.height as f32;
    PixelRect {
        x: (area.x * w).round() as u32,
        y: (area.y * h).round() as u32,
        width: (area.width * w).round() as u32,
        height: (area.height * h).round() as u32,
    }
}

impl CoreObject for Viewport {
    type Core = CoreViewport;

    fn core_object(&self) -> &CoreObjectCore<CoreViewport> {
        &self.object
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<CoreViewport> {
        &mut self.object
    }

    fn create_core(&self) -> CoreViewport {
        CoreViewport::default()
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, _flags: u32) {
        stream.nested(&mut self.state);
    }
}

/// Core-thread viewport.
#[derive(Default)]
pub struct CoreViewport {
    state: ViewportState<CoreSide>,
}

impl std::fmt::Debug for CoreViewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreViewport")
            .field("target", &self.state.target.as_ref().map(|t| &t.name))
            .field("area", &self.state.area)
            .finish_non_exhaustive()
    }
}

impl CoreViewport {
    /// Render target, if it was loaded at the last sync.
    #[must_use]
    pub fn target(&self) -> Option<&Arc<Texture>> {
        self.state.target.as_ref()
    }

    /// Area in pixels. Empty without a target.
    #[must_use]
    pub fn pixel_area(&self) -> PixelRect {
        self.state.target.as_ref().map_or(PixelRect::default(), |t| pixel_area(t, self.state.area))
    }

    /// Buffers to clear.
    #[must_use]
    pub const fn clear_flags(&self) -> ClearFlags {
        self.state.clear_flags
    }

    /// Clear values.
    #[must_use]
    pub const fn clear_values(&self) -> &ClearValues {
        &self.state.clear_values
    }
}

impl CoreSync for CoreViewport {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, _flags: u32) {
        reader.nested(&mut self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{PixelFormat, TextureDesc};
    use bsf_core::{Resources, SyncPoint};

    #[test]
    fn test_area_clamped_to_target() {
        let rect = NormalizedRect::new(0.75, -1.0, 0.5, 2.0);
        assert_eq!(rect, NormalizedRect { x: 0.75, y: 0.0, width: 0.25, height: 1.0 });
    }

    #[test]
    fn test_unloaded_target_syncs_as_null() {
        let resources = Resources::new();
        let target = resources.handle::<Texture>("backbuffer");
        let mut viewport = Viewport::new(Some(target.clone()));
        viewport.set_area(NormalizedRect::new(0.0, 0.0, 0.5, 0.5));

        let mut sync_point = SyncPoint::with_capacity(256);
        sync_point.sync_inline(&mut [&mut viewport]);
        assert!(viewport.core().read().target().is_none());
        assert_eq!(viewport.core().read().pixel_area(), PixelRect::default());

        resources.load(&target, Texture::new("backbuffer", TextureDesc::new_2d(1920, 1080, PixelFormat::Rgba8)));
        viewport.notify_resource_loaded(target.id());
        sync_point.sync_inline(&mut [&mut viewport]);

        let core = viewport.core();
        let core = core.read();
        assert_eq!(core.target().map(|t| t.name.as_str()), Some("backbuffer"));
        assert_eq!(core.pixel_area(), PixelRect { x: 0, y: 0, width: 960, height: 540 });
        assert_eq!(viewport.pixel_area(), Some(core.pixel_area()));
    }

    #[test]
    fn test_clear_state_synced() {
        let mut viewport = Viewport::new(None);
        viewport.set_clear_flags(ClearFlags::DEPTH);
        viewport.set_clear_values(ClearValues { color: Color::BLACK, depth: 0.0, stencil: 7 });
        SyncPoint::with_capacity(256).sync_inline(&mut [&mut viewport]);

        let core = viewport.core();
        let core = core.read();
        assert_eq!(core.clear_flags(), ClearFlags::DEPTH);
        assert_eq!(core.clear_values().stencil, 7);
        assert_eq!(core.clear_values().color, Color::BLACK);
    }
}
