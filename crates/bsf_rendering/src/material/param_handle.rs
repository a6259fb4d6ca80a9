//! # Parameter Handles
//!
//! A handle caches the lookup of one named parameter so repeated writes skip
//! the name search:
//!
//! ```text
//!   let tint = material.param_data::<Color>("tint")?;   // lookup once
//!   tint.set(&mut material, Color::WHITE, 0);           // index access
//! ```
//!
//! Handles remember the layout they were bound against. If the material's
//! shader changes, the next access looks the name up again and silently does
//! nothing if the parameter is gone. An unbound handle (unknown name) is
//! always a no-op and reads back zeroed values.

use std::marker::PhantomData;
use std::sync::Arc;

use bsf_core::{ResourceHandle, SimSide};

use crate::gpu::{
    GpuBuffer, GpuParamDataType, GpuParamValue, MaterialParamKind, SamplerState, SpriteTexture,
    Texture, TextureSurface,
};

use super::animation::{AnimationCurve, ColorGradient};
use super::material::{Material, MaterialDirtyFlags};
use super::params::{MaterialParams, ParamError, TextureBinding, TextureSlot};

#[derive(Clone, Debug, PartialEq, Eq)]
struct BoundParam {
    name: String,
    index: usize,
    table_id: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ParamKey {
    bound: Option<BoundParam>,
}

impl ParamKey {
    fn bind(
        params: &MaterialParams<SimSide>,
        name: &str,
        kind: MaterialParamKind,
        data_type: Option<GpuParamDataType>,
    ) -> Self {
        match params.find(name, kind, data_type, 0) {
            Ok(index) => Self {
                bound: Some(BoundParam { name: name.to_string(), index, table_id: params.table().id() }),
            },
            Err(err) => {
                tracing::warn!("{err}");
                Self::default()
            }
        }
    }

    fn name(&self) -> Option<&str> {
        self.bound.as_ref().map(|bound| bound.name.as_str())
    }

    fn resolve(
        &self,
        params: &MaterialParams<SimSide>,
        kind: MaterialParamKind,
        data_type: Option<GpuParamDataType>,
        array_idx: usize,
    ) -> Option<usize> {
        let bound = self.bound.as_ref()?;
        let index = if bound.table_id == params.table().id() {
            bound.index
        } else {
            params.find(&bound.name, kind, data_type, 0).ok()?
        };

        if array_idx >= params.param(index)?.array_size {
            tracing::warn!("{}", ParamError::IndexOutOfBounds { name: bound.name.clone(), index: array_idx });
            return None;
        }
        Some(index)
    }
}

fn read<'a>(material: &'a Material) -> Option<&'a MaterialParams<SimSide>> {
    material.params()
}

fn write(material: &mut Material) -> Option<&mut MaterialParams<SimSide>> {
    material.params_for_write(MaterialDirtyFlags::PARAM)
}

// ============================================================================
// DATA
// ============================================================================

/// Handle to a typed data parameter.
#[derive(Debug)]
pub struct DataParam<T> {
    key: ParamKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DataParam<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), _marker: PhantomData }
    }
}

impl<T: GpuParamValue> DataParam<T> {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Data, Some(T::DATA_TYPE)), _marker: PhantomData }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default(), _marker: PhantomData }
    }

    /// Returns true if the lookup succeeded.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.key.bound.is_some()
    }

    /// Parameter name, if bound.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.key.name()
    }

    fn index(&self, params: &MaterialParams<SimSide>, array_idx: usize) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Data, Some(T::DATA_TYPE), array_idx)
    }

    /// Writes element `array_idx`.
    pub fn set(&self, material: &mut Material, value: T, array_idx: usize) {
        let Some(index) = read(material).and_then(|params| self.index(params, array_idx)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_data_at(index, array_idx, value);
        }
    }

    /// Reads element `array_idx`. Zeroed when unbound.
    #[must_use]
    pub fn get(&self, material: &Material, array_idx: usize) -> T {
        read(material)
            .and_then(|params| Some(params.data_at(self.index(params, array_idx)?, array_idx)))
            .unwrap_or_else(T::zeroed)
    }
}

/// Handle to a struct parameter.
#[derive(Clone, Debug)]
pub struct StructParam {
    key: ParamKey,
}

impl StructParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Data, Some(GpuParamDataType::Struct)) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    /// Returns true if the lookup succeeded.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.key.bound.is_some()
    }

    fn index(&self, params: &MaterialParams<SimSide>, array_idx: usize) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Data, Some(GpuParamDataType::Struct), array_idx)
    }

    /// Overwrites element `array_idx`. Size mismatches are logged and ignored.
    pub fn set(&self, material: &mut Material, bytes: &[u8], array_idx: usize) {
        let Some(index) = read(material).and_then(|params| self.index(params, array_idx)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_struct_at(index, array_idx, bytes);
        }
    }

    /// Copy of element `array_idx`. Empty when unbound.
    #[must_use]
    pub fn get(&self, material: &Material, array_idx: usize) -> Vec<u8> {
        read(material)
            .and_then(|params| Some(params.struct_at(self.index(params, array_idx)?, array_idx).to_vec()))
            .unwrap_or_default()
    }

    /// Declared size of one element. Zero when unbound.
    #[must_use]
    pub fn element_size(&self, material: &Material) -> usize {
        read(material).and_then(|params| Some(params.struct_size(self.index(params, 0)?))).unwrap_or(0)
    }
}

/// Handle to the curve animating a `Float1` parameter.
#[derive(Clone, Debug)]
pub struct CurveParam {
    key: ParamKey,
}

impl CurveParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Data, Some(GpuParamDataType::Float1)) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    fn index(&self, params: &MaterialParams<SimSide>, array_idx: usize) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Data, Some(GpuParamDataType::Float1), array_idx)
    }

    /// Animates element `array_idx` with `curve`.
    pub fn set(&self, material: &mut Material, curve: AnimationCurve, array_idx: usize) {
        let Some(index) = read(material).and_then(|params| self.index(params, array_idx)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_curve_at(index, array_idx, curve);
        }
    }

    /// Curve of element `array_idx`, if any.
    #[must_use]
    pub fn get(&self, material: &Material, array_idx: usize) -> Option<AnimationCurve> {
        let params = read(material)?;
        params.curve_at(self.index(params, array_idx)?, array_idx).cloned()
    }
}

/// Handle to the gradient animating a `Color` parameter.
#[derive(Clone, Debug)]
pub struct GradientParam {
    key: ParamKey,
}

impl GradientParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Data, Some(GpuParamDataType::Color)) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    fn index(&self, params: &MaterialParams<SimSide>, array_idx: usize) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Data, Some(GpuParamDataType::Color), array_idx)
    }

    /// Animates element `array_idx` with `gradient`.
    pub fn set(&self, material: &mut Material, gradient: ColorGradient, array_idx: usize) {
        let Some(index) = read(material).and_then(|params| self.index(params, array_idx)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_gradient_at(index, array_idx, gradient);
        }
    }

    /// Gradient of element `array_idx`, if any.
    #[must_use]
    pub fn get(&self, material: &Material, array_idx: usize) -> Option<ColorGradient> {
        let params = read(material)?;
        params.gradient_at(self.index(params, array_idx)?, array_idx).cloned()
    }
}

// ============================================================================
// OBJECTS
// ============================================================================

/// Handle to a texture parameter bound as a sampled texture.
#[derive(Clone, Debug)]
pub struct TextureParam {
    key: ParamKey,
}

impl TextureParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Texture, None) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    /// Returns true if the lookup succeeded.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.key.bound.is_some()
    }

    fn index(&self, params: &MaterialParams<SimSide>) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Texture, None, 0)
    }

    /// Binds `texture`. Replaces any sprite or load-store binding.
    pub fn set(&self, material: &mut Material, texture: Option<ResourceHandle<Texture>>, surface: TextureSurface) {
        let Some(index) = read(material).and_then(|params| self.index(params)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_texture_at(
                index,
                TextureSlot { texture, binding: TextureBinding::Normal, surface, ..TextureSlot::default() },
            );
        }
    }

    /// Bound texture. `None` if the parameter holds a sprite or nothing.
    #[must_use]
    pub fn get(&self, material: &Material) -> Option<ResourceHandle<Texture>> {
        let params = read(material)?;
        let slot = params.texture_at(self.index(params)?);
        match slot.binding {
            TextureBinding::Sprite => None,
            TextureBinding::Normal | TextureBinding::LoadStore => slot.texture.clone(),
        }
    }
}

/// Handle to a texture parameter bound for unordered access.
#[derive(Clone, Debug)]
pub struct LoadStoreTextureParam {
    key: ParamKey,
}

impl LoadStoreTextureParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Texture, None) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    fn index(&self, params: &MaterialParams<SimSide>) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Texture, None, 0)
    }

    /// Binds one surface of `texture`.
    pub fn set(&self, material: &mut Material, texture: Option<ResourceHandle<Texture>>, surface: TextureSurface) {
        let Some(index) = read(material).and_then(|params| self.index(params)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_texture_at(
                index,
                TextureSlot { texture, binding: TextureBinding::LoadStore, surface, ..TextureSlot::default() },
            );
        }
    }

    /// Bound texture and surface, if the parameter is bound for load-store.
    #[must_use]
    pub fn get(&self, material: &Material) -> Option<(ResourceHandle<Texture>, TextureSurface)> {
        let params = read(material)?;
        let slot = params.texture_at(self.index(params)?);
        if slot.binding != TextureBinding::LoadStore {
            return None;
        }
        slot.texture.clone().map(|texture| (texture, slot.surface))
    }
}

/// Handle to a texture parameter bound to a sprite.
#[derive(Clone, Debug)]
pub struct SpriteTextureParam {
    key: ParamKey,
}

impl SpriteTextureParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Texture, None) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    fn index(&self, params: &MaterialParams<SimSide>) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Texture, None, 0)
    }

    /// Binds `sprite`; its atlas is what the GPU samples.
    pub fn set(&self, material: &mut Material, sprite: Option<ResourceHandle<SpriteTexture>>) {
        let Some(index) = read(material).and_then(|params| self.index(params)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_texture_at(
                index,
                TextureSlot { sprite, binding: TextureBinding::Sprite, ..TextureSlot::default() },
            );
        }
    }

    /// Bound sprite, if the parameter holds one.
    #[must_use]
    pub fn get(&self, material: &Material) -> Option<ResourceHandle<SpriteTexture>> {
        let params = read(material)?;
        let slot = params.texture_at(self.index(params)?);
        (slot.binding == TextureBinding::Sprite).then(|| slot.sprite.clone()).flatten()
    }
}

/// Handle to a buffer parameter.
#[derive(Clone, Debug)]
pub struct BufferParam {
    key: ParamKey,
}

impl BufferParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Buffer, None) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    fn index(&self, params: &MaterialParams<SimSide>) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Buffer, None, 0)
    }

    /// Binds `buffer`.
    pub fn set(&self, material: &mut Material, buffer: Option<Arc<GpuBuffer>>) {
        let Some(index) = read(material).and_then(|params| self.index(params)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_buffer_at(index, buffer);
        }
    }

    /// Bound buffer.
    #[must_use]
    pub fn get(&self, material: &Material) -> Option<Arc<GpuBuffer>> {
        let params = read(material)?;
        params.buffer_at(self.index(params)?).clone()
    }
}

/// Handle to a sampler parameter.
#[derive(Clone, Debug)]
pub struct SamplerParam {
    key: ParamKey,
}

impl SamplerParam {
    pub(crate) fn bind(params: &MaterialParams<SimSide>, name: &str) -> Self {
        Self { key: ParamKey::bind(params, name, MaterialParamKind::Sampler, None) }
    }

    /// A handle bound to nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { key: ParamKey::default() }
    }

    fn index(&self, params: &MaterialParams<SimSide>) -> Option<usize> {
        self.key.resolve(params, MaterialParamKind::Sampler, None, 0)
    }

    /// Binds `sampler`.
    pub fn set(&self, material: &mut Material, sampler: Option<Arc<SamplerState>>) {
        let Some(index) = read(material).and_then(|params| self.index(params)) else {
            return;
        };
        if let Some(params) = write(material) {
            params.set_sampler_at(index, sampler);
        }
    }

    /// Bound sampler.
    #[must_use]
    pub fn get(&self, material: &Material) -> Option<Arc<SamplerState>> {
        let params = read(material)?;
        params.sampler_at(self.index(params)?).clone()
    }
}
