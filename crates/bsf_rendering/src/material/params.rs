//! # Material Parameters
//!
//! Storage for every parameter a shader declares, generic over the sync
//! domain so the sim and core copies share one implementation.
//!
//! ## Layout
//!
//! ```text
//!   params:  [ data params (name order) | textures | buffers | samplers ]
//!               │
//!               ├─ non-struct ─► data_infos[index + i] ─► data[offset..offset + packed]
//!               └─ struct ─────► structs[index + i]
//! ```
//!
//! ## Versioning
//!
//! Every setter bumps the table version and stamps it on the parameter. A
//! sync writes only parameters stamped after the previous sync, unless it is
//! forced to write everything. The core side restamps whatever it received
//! with its own version, which parameter sets compare against.
//!
//! Lookups are strict: name, storage class, data type and array index must
//! all match. A failed lookup logs a warning and the call does nothing.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use bsf_core::{SyncDomain, SyncStream};
use thiserror::Error;

use crate::gpu::{
    GpuBuffer, GpuParamDataType, GpuParamValue, MaterialParamKind, SamplerState, SpriteTexture,
    Texture, TextureSurface,
};

use super::animation::{AnimationCurve, ColorGradient};
use super::shader::ShaderParamTable;

const ANIM_NONE: u8 = 0;
const ANIM_CURVE: u8 = 1;
const ANIM_GRADIENT: u8 = 2;

/// Why a parameter lookup failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// No parameter has this name.
    #[error("Material doesn't have a parameter named {0}.")]
    NotFound(String),

    /// The parameter exists with a different class or data type.
    #[error("Parameter \"{0}\" is not of the requested type.")]
    InvalidType(String),

    /// The array index is past the end of the parameter.
    #[error("Parameter \"{name}\" array index {index} out of range.")]
    IndexOutOfBounds {
        /// Parameter name.
        name: String,
        /// Requested index.
        index: usize,
    },
}

/// How a texture parameter is bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureBinding {
    /// Sampled texture.
    #[default]
    Normal = 0,
    /// Unordered read/write access to one surface.
    LoadStore = 1,
    /// Sprite texture; its atlas is bound.
    Sprite = 2,
}

impl TextureBinding {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::LoadStore,
            2 => Self::Sprite,
            _ => Self::Normal,
        }
    }
}

/// Bookkeeping of one parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamData {
    /// Storage class.
    pub kind: MaterialParamKind,
    /// Element type; `None` for object parameters.
    pub data_type: Option<GpuParamDataType>,
    /// First slot in the class storage.
    pub index: usize,
    /// Array length.
    pub array_size: usize,
    /// Table version of the last write.
    pub version: u64,
}

#[derive(Clone, Debug, Default)]
struct DataParamInfo {
    offset: usize,
    curve: Option<AnimationCurve>,
    gradient: Option<ColorGradient>,
    sprite_texture: Option<usize>,
}

/// Value of a texture parameter.
pub struct TextureSlot<D: SyncDomain> {
    /// Bound texture, for normal and load-store bindings.
    pub texture: D::Ref<Texture>,
    /// Bound sprite, for sprite bindings.
    pub sprite: D::Ref<SpriteTexture>,
    /// Binding kind.
    pub binding: TextureBinding,
    /// Bound surface.
    pub surface: TextureSurface,
}

impl<D: SyncDomain> Default for TextureSlot<D> {
    fn default() -> Self {
        Self {
            texture: Default::default(),
            sprite: Default::default(),
            binding: TextureBinding::Normal,
            surface: TextureSurface::COMPLETE,
        }
    }
}

impl<D: SyncDomain> Clone for TextureSlot<D> {
    fn clone(&self) -> Self {
        Self {
            texture: self.texture.clone(),
            sprite: self.sprite.clone(),
            binding: self.binding,
            surface: self.surface,
        }
    }
}

/// Parameter values of one material.
pub struct MaterialParams<D: SyncDomain> {
    table: Arc<ShaderParamTable>,
    params: Vec<ParamData>,
    names: Vec<String>,
    lookup: HashMap<String, usize>,
    data: Vec<u8>,
    data_infos: Vec<DataParamInfo>,
    structs: Vec<Vec<u8>>,
    textures: Vec<TextureSlot<D>>,
    buffers: Vec<D::Ref<GpuBuffer>>,
    samplers: Vec<D::Ref<SamplerState>>,
    param_version: u64,
    last_sync_version: u64,
}

impl<D: SyncDomain> MaterialParams<D> {
    /// Creates zeroed parameters for every declaration in `table`.
    #[must_use]
    pub fn new(table: Arc<ShaderParamTable>) -> Self {
        Self::with_version(table, 1)
    }

    /// Same as [`new`](Self::new), continuing from an existing table version.
    #[must_use]
    pub fn with_version(table: Arc<ShaderParamTable>, version: u64) -> Self {
        let mut out = Self {
            table: Arc::clone(&table),
            params: Vec::new(),
            names: Vec::new(),
            lookup: HashMap::new(),
            data: Vec::new(),
            data_infos: Vec::new(),
            structs: Vec::new(),
            textures: Vec::new(),
            buffers: Vec::new(),
            samplers: Vec::new(),
            param_version: version,
            last_sync_version: 1,
        };

        for (name, desc) in &table.data {
            let array_size = desc.array_size.max(1) as usize;
            let index = if desc.data_type == GpuParamDataType::Struct {
                let first = out.structs.len();
                out.structs.extend((0..array_size).map(|_| vec![0u8; desc.element_size as usize]));
                first
            } else {
                let first = out.data_infos.len();
                let size = desc.data_type.size();
                for _ in 0..array_size {
                    out.data_infos.push(DataParamInfo { offset: out.data.len(), ..Default::default() });
                    out.data.resize(out.data.len() + size, 0);
                }
                first
            };
            out.push_param(name, MaterialParamKind::Data, Some(desc.data_type), index, array_size);
        }

        for name in table.textures.keys() {
            let index = out.textures.len();
            out.textures.push(TextureSlot::default());
            out.push_param(name, MaterialParamKind::Texture, None, index, 1);
        }
        for name in table.buffers.keys() {
            let index = out.buffers.len();
            out.buffers.push(Default::default());
            out.push_param(name, MaterialParamKind::Buffer, None, index, 1);
        }
        for name in table.samplers.keys() {
            let index = out.samplers.len();
            out.samplers.push(Default::default());
            out.push_param(name, MaterialParamKind::Sampler, None, index, 1);
        }

        // Textures must exist before sprite UV params can point at them
        for (name, desc) in &table.data {
            let Some(texture_name) = &desc.sprite_uv else { continue };
            if desc.data_type != GpuParamDataType::Float4 {
                tracing::warn!("SpriteUV attribute can only be applied to 4D vectors.");
                continue;
            }
            let (Some(&texture), Some(&param)) = (out.lookup.get(texture_name), out.lookup.get(name)) else {
                continue;
            };
            if out.params[texture].kind == MaterialParamKind::Texture {
                let info = out.params[param].index;
                out.data_infos[info].sprite_texture = Some(texture);
            }
        }

        out
    }

    fn push_param(
        &mut self,
        name: &str,
        kind: MaterialParamKind,
        data_type: Option<GpuParamDataType>,
        index: usize,
        array_size: usize,
    ) {
        self.lookup.insert(name.to_string(), self.params.len());
        self.names.push(name.to_string());
        self.params.push(ParamData { kind, data_type, index, array_size, version: 1 });
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Parameter declarations these values were built from.
    #[must_use]
    pub fn table(&self) -> &Arc<ShaderParamTable> {
        &self.table
    }

    /// Current table version.
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.param_version
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the shader declares no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Bookkeeping of parameter `index`.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&ParamData> {
        self.params.get(index)
    }

    /// Index of the parameter called `name`.
    #[must_use]
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Name of parameter `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Every parameter with its name, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamData)> {
        self.names.iter().map(String::as_str).zip(&self.params)
    }

    /// Strict lookup.
    ///
    /// # Errors
    ///
    /// Fails if the name is unknown, the class or data type differ, or
    /// `array_idx` is out of range.
    pub fn find(
        &self,
        name: &str,
        kind: MaterialParamKind,
        data_type: Option<GpuParamDataType>,
        array_idx: usize,
    ) -> Result<usize, ParamError> {
        let &index = self.lookup.get(name).ok_or_else(|| ParamError::NotFound(name.to_string()))?;
        let param = &self.params[index];

        if param.kind != kind || (kind == MaterialParamKind::Data && param.data_type != data_type) {
            return Err(ParamError::InvalidType(name.to_string()));
        }
        if array_idx >= param.array_size {
            return Err(ParamError::IndexOutOfBounds { name: name.to_string(), index: array_idx });
        }
        Ok(index)
    }

    fn find_or_warn(
        &self,
        name: &str,
        kind: MaterialParamKind,
        data_type: Option<GpuParamDataType>,
        array_idx: usize,
    ) -> Option<usize> {
        match self.find(name, kind, data_type, array_idx) {
            Ok(index) => Some(index),
            Err(err) => {
                tracing::warn!("{err}");
                None
            }
        }
    }

    fn bump(&mut self, index: usize) {
        self.param_version += 1;
        self.params[index].version = self.param_version;
    }

    fn data_param(&self, index: usize, array_idx: usize) -> &ParamData {
        let param = &self.params[index];
        assert!(
            param.kind == MaterialParamKind::Data && array_idx < param.array_size,
            "Parameter '{}' has no data element {}",
            self.names[index],
            array_idx
        );
        param
    }

    fn element_range(&self, index: usize, array_idx: usize) -> Range<usize> {
        let param = self.data_param(index, array_idx);
        let size = param.data_type.map_or(0, GpuParamDataType::size);
        let offset = self.data_infos[param.index + array_idx].offset;
        offset..offset + size
    }

    // ========================================================================
    // DATA
    // ========================================================================

    /// Reads element `array_idx` of the data parameter `name`.
    #[must_use]
    pub fn get<T: GpuParamValue>(&self, name: &str, array_idx: usize) -> Option<T> {
        let index = self.find_or_warn(name, MaterialParamKind::Data, Some(T::DATA_TYPE), array_idx)?;
        Some(self.data_at(index, array_idx))
    }

    /// Writes element `array_idx` of the data parameter `name`. Returns false
    /// if the lookup failed.
    pub fn set<T: GpuParamValue>(&mut self, name: &str, value: T, array_idx: usize) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Data, Some(T::DATA_TYPE), array_idx) {
            Some(index) => {
                self.set_data_at(index, array_idx, value);
                true
            }
            None => false,
        }
    }

    /// Reads a data element by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if the parameter is not a `T` or `array_idx` is out of range.
    #[must_use]
    pub fn data_at<T: GpuParamValue>(&self, index: usize, array_idx: usize) -> T {
        assert_eq!(self.params[index].data_type, Some(T::DATA_TYPE), "Parameter type mismatch");
        bytemuck::pod_read_unaligned(&self.data[self.element_range(index, array_idx)])
    }

    /// Writes a data element by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if the parameter is not a `T` or `array_idx` is out of range.
    pub fn set_data_at<T: GpuParamValue>(&mut self, index: usize, array_idx: usize, value: T) {
        assert_eq!(self.params[index].data_type, Some(T::DATA_TYPE), "Parameter type mismatch");
        let range = self.element_range(index, array_idx);
        self.data[range].copy_from_slice(bytemuck::bytes_of(&value));
        self.bump(index);
    }

    /// Packed bytes of one data element. Empty for structs.
    #[must_use]
    pub fn element_bytes(&self, index: usize, array_idx: usize) -> &[u8] {
        &self.data[self.element_range(index, array_idx)]
    }

    // ========================================================================
    // STRUCTS
    // ========================================================================

    /// Bytes of element `array_idx` of the struct parameter `name`.
    #[must_use]
    pub fn get_struct(&self, name: &str, array_idx: usize) -> Option<&[u8]> {
        let index =
            self.find_or_warn(name, MaterialParamKind::Data, Some(GpuParamDataType::Struct), array_idx)?;
        Some(self.struct_at(index, array_idx))
    }

    /// Overwrites element `array_idx` of the struct parameter `name`.
    /// `bytes` must be exactly the declared struct size.
    pub fn set_struct(&mut self, name: &str, bytes: &[u8], array_idx: usize) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Data, Some(GpuParamDataType::Struct), array_idx) {
            Some(index) => self.set_struct_at(index, array_idx, bytes),
            None => false,
        }
    }

    /// Struct bytes by parameter index.
    #[must_use]
    pub fn struct_at(&self, index: usize, array_idx: usize) -> &[u8] {
        let param = self.data_param(index, array_idx);
        &self.structs[param.index + array_idx]
    }

    /// Writes struct bytes by parameter index. Returns false on a size mismatch.
    pub fn set_struct_at(&mut self, index: usize, array_idx: usize, bytes: &[u8]) -> bool {
        let slot = self.data_param(index, array_idx).index + array_idx;
        let size = self.structs[slot].len();
        if bytes.len() != size {
            tracing::warn!(
                "Size mismatch when writing to a struct. Provided size was {} bytes but the struct size is {} bytes",
                bytes.len(),
                size
            );
            return false;
        }
        self.structs[slot].copy_from_slice(bytes);
        self.bump(index);
        true
    }

    /// Declared size of one element of struct parameter `index`.
    #[must_use]
    pub fn struct_size(&self, index: usize) -> usize {
        self.struct_at(index, 0).len()
    }

    // ========================================================================
    // ANIMATION
    // ========================================================================

    /// Curve driving element `array_idx` of the `Float1` parameter `name`.
    #[must_use]
    pub fn curve(&self, name: &str, array_idx: usize) -> Option<&AnimationCurve> {
        let index =
            self.find_or_warn(name, MaterialParamKind::Data, Some(GpuParamDataType::Float1), array_idx)?;
        self.curve_at(index, array_idx)
    }

    /// Animates element `array_idx` of the `Float1` parameter `name`.
    pub fn set_curve(&mut self, name: &str, curve: AnimationCurve, array_idx: usize) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Data, Some(GpuParamDataType::Float1), array_idx) {
            Some(index) => {
                self.set_curve_at(index, array_idx, curve);
                true
            }
            None => false,
        }
    }

    /// Curve by parameter index.
    #[must_use]
    pub fn curve_at(&self, index: usize, array_idx: usize) -> Option<&AnimationCurve> {
        let param = self.data_param(index, array_idx);
        self.data_infos.get(param.index + array_idx)?.curve.as_ref()
    }

    /// Sets a curve by parameter index.
    pub fn set_curve_at(&mut self, index: usize, array_idx: usize, curve: AnimationCurve) {
        let slot = self.data_param(index, array_idx).index + array_idx;
        self.data_infos[slot].curve = Some(curve);
        self.bump(index);
    }

    /// Gradient driving element `array_idx` of the `Color` parameter `name`.
    #[must_use]
    pub fn gradient(&self, name: &str, array_idx: usize) -> Option<&ColorGradient> {
        let index =
            self.find_or_warn(name, MaterialParamKind::Data, Some(GpuParamDataType::Color), array_idx)?;
        self.gradient_at(index, array_idx)
    }

    /// Animates element `array_idx` of the `Color` parameter `name`.
    pub fn set_gradient(&mut self, name: &str, gradient: ColorGradient, array_idx: usize) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Data, Some(GpuParamDataType::Color), array_idx) {
            Some(index) => {
                self.set_gradient_at(index, array_idx, gradient);
                true
            }
            None => false,
        }
    }

    /// Gradient by parameter index.
    #[must_use]
    pub fn gradient_at(&self, index: usize, array_idx: usize) -> Option<&ColorGradient> {
        let param = self.data_param(index, array_idx);
        self.data_infos.get(param.index + array_idx)?.gradient.as_ref()
    }

    /// Sets a gradient by parameter index.
    pub fn set_gradient_at(&mut self, index: usize, array_idx: usize, gradient: ColorGradient) {
        let slot = self.data_param(index, array_idx).index + array_idx;
        self.data_infos[slot].gradient = Some(gradient);
        self.bump(index);
    }

    /// Returns true if the element changes over time: it has a curve, a
    /// gradient, or mirrors a sprite's UV transform.
    #[must_use]
    pub fn is_animated(&self, index: usize, array_idx: usize) -> bool {
        let param = self.data_param(index, array_idx);
        self.data_infos.get(param.index + array_idx).is_some_and(|info| {
            info.curve.is_some() || info.gradient.is_some() || info.sprite_texture.is_some()
        })
    }

    /// Texture parameter whose sprite UV transform data parameter `index` mirrors.
    #[must_use]
    pub fn sprite_uv_source(&self, index: usize) -> Option<usize> {
        let param = self.data_param(index, 0);
        self.data_infos.get(param.index)?.sprite_texture
    }

    // ========================================================================
    // OBJECTS
    // ========================================================================

    /// Value of the texture parameter `name`.
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&TextureSlot<D>> {
        let index = self.find_or_warn(name, MaterialParamKind::Texture, None, 0)?;
        Some(self.texture_at(index))
    }

    /// Binds a sampled texture.
    pub fn set_texture(&mut self, name: &str, texture: D::Ref<Texture>, surface: TextureSurface) -> bool {
        self.set_texture_slot(
            name,
            TextureSlot { texture, binding: TextureBinding::Normal, surface, ..TextureSlot::default() },
        )
    }

    /// Binds a texture for unordered access.
    pub fn set_load_store_texture(
        &mut self,
        name: &str,
        texture: D::Ref<Texture>,
        surface: TextureSurface,
    ) -> bool {
        self.set_texture_slot(
            name,
            TextureSlot { texture, binding: TextureBinding::LoadStore, surface, ..TextureSlot::default() },
        )
    }

    /// Binds a sprite texture. Its atlas is what the GPU samples.
    pub fn set_sprite_texture(&mut self, name: &str, sprite: D::Ref<SpriteTexture>) -> bool {
        self.set_texture_slot(name, TextureSlot { sprite, binding: TextureBinding::Sprite, ..TextureSlot::default() })
    }

    fn set_texture_slot(&mut self, name: &str, slot: TextureSlot<D>) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Texture, None, 0) {
            Some(index) => {
                self.set_texture_at(index, slot);
                true
            }
            None => false,
        }
    }

    /// Texture value by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if parameter `index` is not a texture.
    #[must_use]
    pub fn texture_at(&self, index: usize) -> &TextureSlot<D> {
        let param = &self.params[index];
        assert_eq!(param.kind, MaterialParamKind::Texture, "Parameter '{}' is not a texture", self.names[index]);
        &self.textures[param.index]
    }

    /// Replaces a texture value by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if parameter `index` is not a texture.
    pub fn set_texture_at(&mut self, index: usize, slot: TextureSlot<D>) {
        let param = self.params[index];
        assert_eq!(param.kind, MaterialParamKind::Texture, "Parameter '{}' is not a texture", self.names[index]);
        self.textures[param.index] = slot;
        self.bump(index);
    }

    /// Value of the buffer parameter `name`.
    #[must_use]
    pub fn buffer(&self, name: &str) -> Option<&D::Ref<GpuBuffer>> {
        let index = self.find_or_warn(name, MaterialParamKind::Buffer, None, 0)?;
        Some(self.buffer_at(index))
    }

    /// Binds a buffer.
    pub fn set_buffer(&mut self, name: &str, buffer: D::Ref<GpuBuffer>) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Buffer, None, 0) {
            Some(index) => {
                self.set_buffer_at(index, buffer);
                true
            }
            None => false,
        }
    }

    /// Buffer by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if parameter `index` is not a buffer.
    #[must_use]
    pub fn buffer_at(&self, index: usize) -> &D::Ref<GpuBuffer> {
        let param = &self.params[index];
        assert_eq!(param.kind, MaterialParamKind::Buffer, "Parameter '{}' is not a buffer", self.names[index]);
        &self.buffers[param.index]
    }

    /// Binds a buffer by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if parameter `index` is not a buffer.
    pub fn set_buffer_at(&mut self, index: usize, buffer: D::Ref<GpuBuffer>) {
        let param = self.params[index];
        assert_eq!(param.kind, MaterialParamKind::Buffer, "Parameter '{}' is not a buffer", self.names[index]);
        self.buffers[param.index] = buffer;
        self.bump(index);
    }

    /// Value of the sampler parameter `name`.
    #[must_use]
    pub fn sampler(&self, name: &str) -> Option<&D::Ref<SamplerState>> {
        let index = self.find_or_warn(name, MaterialParamKind::Sampler, None, 0)?;
        Some(self.sampler_at(index))
    }

    /// Binds a sampler.
    pub fn set_sampler(&mut self, name: &str, sampler: D::Ref<SamplerState>) -> bool {
        match self.find_or_warn(name, MaterialParamKind::Sampler, None, 0) {
            Some(index) => {
                self.set_sampler_at(index, sampler);
                true
            }
            None => false,
        }
    }

    /// Sampler by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if parameter `index` is not a sampler.
    #[must_use]
    pub fn sampler_at(&self, index: usize) -> &D::Ref<SamplerState> {
        let param = &self.params[index];
        assert_eq!(param.kind, MaterialParamKind::Sampler, "Parameter '{}' is not a sampler", self.names[index]);
        &self.samplers[param.index]
    }

    /// Binds a sampler by parameter index.
    ///
    /// # Panics
    ///
    /// Panics if parameter `index` is not a sampler.
    pub fn set_sampler_at(&mut self, index: usize, sampler: D::Ref<SamplerState>) {
        let param = self.params[index];
        assert_eq!(param.kind, MaterialParamKind::Sampler, "Parameter '{}' is not a sampler", self.names[index]);
        self.samplers[param.index] = sampler;
        self.bump(index);
    }

    // ========================================================================
    // MIGRATION
    // ========================================================================

    /// Copies every value of `old` whose parameter still exists here with the
    /// same name, class and data type.
    ///
    /// Arrays copy as many elements as both sides have. Structs copy only if
    /// their element size is unchanged. Anything else is skipped silently.
    pub fn migrate_from(&mut self, old: &Self) {
        for index in 0..self.params.len() {
            let param = self.params[index];
            let name = self.names[index].clone();
            let Ok(old_index) = old.find(&name, param.kind, param.data_type, 0) else {
                continue;
            };
            let old_param = old.params[old_index];

            match param.kind {
                MaterialParamKind::Data => self.migrate_data(index, old, old_index),
                MaterialParamKind::Texture => {
                    self.set_texture_at(index, old.textures[old_param.index].clone());
                }
                MaterialParamKind::Buffer => {
                    self.set_buffer_at(index, old.buffers[old_param.index].clone());
                }
                MaterialParamKind::Sampler => {
                    self.set_sampler_at(index, old.samplers[old_param.index].clone());
                }
            }
        }
    }

    fn migrate_data(&mut self, index: usize, old: &Self, old_index: usize) {
        let param = self.params[index];
        let elements = param.array_size.min(old.params[old_index].array_size);

        if param.data_type == Some(GpuParamDataType::Struct) {
            if self.struct_size(index) != old.struct_size(old_index) {
                return;
            }
            for i in 0..elements {
                self.set_struct_at(index, i, old.struct_at(old_index, i));
            }
            return;
        }

        for i in 0..elements {
            let range = self.element_range(index, i);
            self.data[range].copy_from_slice(old.element_bytes(old_index, i));

            if let Some(curve) = old.curve_at(old_index, i) {
                self.set_curve_at(index, i, curve.clone());
            }
            if let Some(gradient) = old.gradient_at(old_index, i) {
                self.set_gradient_at(index, i, gradient.clone());
            }
        }
        self.bump(index);
    }

    // ========================================================================
    // SYNC
    // ========================================================================

    /// Records that everything up to the current version reached the core.
    pub fn mark_synced(&mut self) {
        self.last_sync_version = self.param_version;
    }

    /// Number of parameters the next sync would write.
    #[must_use]
    pub fn dirty_count(&self, force_all: bool) -> usize {
        self.params.iter().filter(|param| force_all || param.version > self.last_sync_version).count()
    }

    /// Writes (sim) or reads (core) the parameters changed since the last sync.
    ///
    /// Both sides must have been built from the same parameter table.
    ///
    /// # Panics
    ///
    /// Panics on the reading side if the stream names a parameter that does
    /// not exist.
    pub fn sync<S: SyncStream<D>>(&mut self, stream: &mut S, force_all: bool) {
        let mut dirty: Vec<u32> = if S::READING {
            Vec::new()
        } else {
            self.params
                .iter()
                .enumerate()
                .filter(|(_, param)| force_all || param.version > self.last_sync_version)
                .map(|(index, _)| u32::try_from(index).unwrap_or(u32::MAX))
                .collect()
        };
        stream.pod_vec(&mut dirty);

        if S::READING {
            self.param_version += 1;
        }

        for index in dirty {
            let index = index as usize;
            let Some(param) = self.params.get_mut(index) else {
                panic!("Sync desync! Material parameter {index} does not exist");
            };
            if S::READING {
                param.version = self.param_version;
            }
            let param = *param;

            match param.kind {
                MaterialParamKind::Data => self.sync_data(stream, param),
                MaterialParamKind::Texture => {
                    let slot = &mut self.textures[param.index];
                    let mut binding = slot.binding as u8;
                    stream.pod(&mut binding);
                    slot.binding = TextureBinding::from_raw(binding);
                    stream.reference::<Texture>(&mut slot.texture);
                    stream.reference::<SpriteTexture>(&mut slot.sprite);
                    stream.pod(&mut slot.surface);
                }
                MaterialParamKind::Buffer => stream.reference::<GpuBuffer>(&mut self.buffers[param.index]),
                MaterialParamKind::Sampler => {
                    stream.reference::<SamplerState>(&mut self.samplers[param.index]);
                }
            }
        }
    }

    fn sync_data<S: SyncStream<D>>(&mut self, stream: &mut S, param: ParamData) {
        let elements = param.index..param.index + param.array_size;

        if param.data_type == Some(GpuParamDataType::Struct) {
            for element in &mut self.structs[elements] {
                stream.raw(element);
            }
            return;
        }

        // Elements of one parameter are contiguous
        let start = self.data_infos[param.index].offset;
        let size = param.data_type.map_or(0, GpuParamDataType::size) * param.array_size;
        stream.raw(&mut self.data[start..start + size]);

        for info in &mut self.data_infos[elements] {
            let mut tag = match (&info.curve, &info.gradient) {
                (Some(_), _) => ANIM_CURVE,
                (None, Some(_)) => ANIM_GRADIENT,
                (None, None) => ANIM_NONE,
            };
            stream.pod(&mut tag);

            if S::READING {
                info.curve = (tag == ANIM_CURVE).then(AnimationCurve::default);
                info.gradient = (tag == ANIM_GRADIENT).then(ColorGradient::default);
            }
            if let Some(curve) = info.curve.as_mut() {
                stream.pod_vec(&mut curve.keys);
            } else if let Some(gradient) = info.gradient.as_mut() {
                stream.pod(&mut gradient.duration);
                stream.pod_vec(&mut gradient.keys);
            }
        }
    }
}

impl<D: SyncDomain> fmt::Debug for MaterialParams<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialParams")
            .field("params", &self.params.len())
            .field("version", &self.param_version)
            .field("last_sync_version", &self.last_sync_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuParamObjectType, TextureDesc};
    use crate::material::{CurveKey, GradientKey, ShaderDataParamDesc, ShaderObjectParamDesc};
    use bsf_core::{CoreSide, SimSide, SyncFields, SyncPayload};
    use bsf_shared::{Color, Vec3, Vec4};

    fn table() -> Arc<ShaderParamTable> {
        let mut table = ShaderParamTable::default();
        table.add_data(ShaderDataParamDesc::new("roughness", GpuParamDataType::Float1));
        table.add_data(ShaderDataParamDesc::new("offsets", GpuParamDataType::Float3).with_array_size(3));
        table.add_data(ShaderDataParamDesc::new("tint", GpuParamDataType::Color));
        table.add_data(ShaderDataParamDesc::new("uv", GpuParamDataType::Float4).with_sprite_uv("albedo"));
        table.add_data(ShaderDataParamDesc::structure("light", 32).with_array_size(2));
        table.add_object(ShaderObjectParamDesc::new("albedo", GpuParamObjectType::Texture));
        table.add_object(ShaderObjectParamDesc::new("lights", GpuParamObjectType::Buffer));
        table.add_object(ShaderObjectParamDesc::new("linear", GpuParamObjectType::Sampler));
        Arc::new(table)
    }

    #[test]
    fn test_layout_follows_declaration_classes() {
        let params = MaterialParams::<SimSide>::new(table());
        let kinds: Vec<_> = params.iter().map(|(name, p)| (name, p.kind)).collect();
        assert_eq!(kinds[0], ("light", MaterialParamKind::Data));
        assert_eq!(kinds[5], ("albedo", MaterialParamKind::Texture));
        assert_eq!(kinds[6], ("lights", MaterialParamKind::Buffer));
        assert_eq!(kinds[7], ("linear", MaterialParamKind::Sampler));
        assert_eq!(params.version(), 1);
    }

    #[test]
    fn test_strict_lookup_errors() {
        let params = MaterialParams::<SimSide>::new(table());
        assert_eq!(
            params.find("missing", MaterialParamKind::Data, Some(GpuParamDataType::Float1), 0),
            Err(ParamError::NotFound("missing".to_string()))
        );
        assert_eq!(
            params.find("tint", MaterialParamKind::Data, Some(GpuParamDataType::Float4), 0),
            Err(ParamError::InvalidType("tint".to_string()))
        );
        assert_eq!(
            params.find("offsets", MaterialParamKind::Data, Some(GpuParamDataType::Float3), 3),
            Err(ParamError::IndexOutOfBounds { name: "offsets".to_string(), index: 3 })
        );
        assert_eq!(
            ParamError::IndexOutOfBounds { name: "offsets".to_string(), index: 3 }.to_string(),
            "Parameter \"offsets\" array index 3 out of range."
        );
    }

    #[test]
    fn test_set_get_bumps_version() {
        let mut params = MaterialParams::<SimSide>::new(table());
        assert!(params.set("offsets", Vec3::new(1.0, 2.0, 3.0), 2));
        assert_eq!(params.get::<Vec3>("offsets", 2), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(params.get::<Vec3>("offsets", 0), Some(Vec3::ZERO));
        assert_eq!(params.version(), 2);

        // wrong type is a no-op
        assert!(!params.set("offsets", Vec4::ZERO, 0));
        assert_eq!(params.version(), 2);
    }

    #[test]
    fn test_struct_size_must_match() {
        let mut params = MaterialParams::<SimSide>::new(table());
        assert!(!params.set_struct("light", &[1u8; 16], 0));
        assert!(params.set_struct("light", &[7u8; 32], 1));
        assert_eq!(params.get_struct("light", 1), Some(&[7u8; 32][..]));
        assert_eq!(params.get_struct("light", 0), Some(&[0u8; 32][..]));
    }

    #[test]
    fn test_sprite_uv_links_to_texture() {
        let params = MaterialParams::<SimSide>::new(table());
        let uv = params.param_index("uv").unwrap();
        assert_eq!(params.sprite_uv_source(uv), params.param_index("albedo"));
        assert!(params.is_animated(uv, 0));
        assert!(!params.is_animated(params.param_index("roughness").unwrap(), 0));
    }

    #[test]
    fn test_migrate_copies_matching_params() {
        let mut old = MaterialParams::<SimSide>::new(table());
        old.set("roughness", 0.75f32, 0);
        old.set("tint", Color::WHITE, 0);
        old.set_curve("roughness", AnimationCurve::new(vec![CurveKey::new(0.0, 1.0)]), 0);

        let mut smaller = ShaderParamTable::default();
        smaller.add_data(ShaderDataParamDesc::new("roughness", GpuParamDataType::Float1));
        smaller.add_data(ShaderDataParamDesc::new("tint", GpuParamDataType::Float4));
        let mut new = MaterialParams::<SimSide>::new(Arc::new(smaller));
        new.migrate_from(&old);

        assert_eq!(new.get::<f32>("roughness", 0), Some(0.75));
        assert!(new.curve("roughness", 0).is_some());
        // type changed, value not carried over
        assert_eq!(new.get::<Vec4>("tint", 0), Some(Vec4::ZERO));
    }

    struct Wire<'a, D: SyncDomain>(&'a mut MaterialParams<D>, bool);

    impl<D: SyncDomain> SyncFields<D> for Wire<'_, D> {
        fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
            self.0.sync(stream, self.1);
        }
    }

    fn sync_into(sim: &mut MaterialParams<SimSide>, core: &mut MaterialParams<CoreSide>, force_all: bool) {
        let payload = SyncPayload::capture(&mut Wire(sim, force_all));
        sim.mark_synced();
        payload.restore(&mut Wire(core, force_all));
    }

    #[test]
    fn test_only_changed_data_is_synced() {
        let table = table();
        let mut sim = MaterialParams::<SimSide>::new(Arc::clone(&table));
        let mut core = MaterialParams::<CoreSide>::new(table);
        sim.mark_synced();

        sim.set("roughness", 0.5f32, 0);
        sim.set_gradient(
            "tint",
            ColorGradient::new(vec![GradientKey::new(Color::BLACK, 0.0)], 2.0),
            0,
        );
        assert_eq!(sim.dirty_count(false), 2);
        sync_into(&mut sim, &mut core, false);

        assert_eq!(core.get::<f32>("roughness", 0), Some(0.5));
        assert_eq!(core.gradient("tint", 0).map(ColorGradient::duration), Some(2.0));
        assert_eq!(core.version(), 2);
        assert_eq!(sim.dirty_count(false), 0);

        let texture = bsf_core::ResourceHandle::loaded("t", Texture::new("t", TextureDesc::default()));
        sim.set_texture("albedo", Some(texture), TextureSurface::COMPLETE);
        assert_eq!(sim.dirty_count(false), 1);
        sync_into(&mut sim, &mut core, false);
        let slot = core.texture("albedo").unwrap();
        assert_eq!(slot.texture.as_ref().map(|t| t.name.clone()), Some("t".to_string()));
        assert_eq!(core.get::<f32>("roughness", 0), Some(0.5));
    }

    #[test]
    fn test_force_all_resends_everything() {
        let table = table();
        let mut sim = MaterialParams::<SimSide>::new(Arc::clone(&table));
        sim.set("roughness", 0.25f32, 0);
        sim.set_curve("roughness", AnimationCurve::new(vec![CurveKey::new(0.0, 2.0)]), 0);
        sync_into(&mut sim, &mut MaterialParams::<CoreSide>::new(Arc::clone(&table)), false);

        // a fresh core copy needs the full table
        let mut core = MaterialParams::<CoreSide>::new(table);
        assert_eq!(sim.dirty_count(false), 0);
        sync_into(&mut sim, &mut core, true);
        assert_eq!(core.get::<f32>("roughness", 0), Some(0.25));
        assert_eq!(core.curve("roughness", 0).map(|c| c.keys().len()), Some(1));
    }

    #[test]
    fn test_cleared_animation_clears_core_copy() {
        let table = table();
        let mut sim = MaterialParams::<SimSide>::new(Arc::clone(&table));
        let mut core = MaterialParams::<CoreSide>::new(Arc::clone(&table));
        sim.set_curve("roughness", AnimationCurve::new(vec![CurveKey::new(0.0, 2.0)]), 0);
        sync_into(&mut sim, &mut core, false);
        assert!(core.curve("roughness", 0).is_some());

        let mut replacement = MaterialParams::<SimSide>::new(table);
        replacement.set("roughness", 1.0f32, 0);
        sync_into(&mut replacement, &mut core, true);
        assert!(core.curve("roughness", 0).is_none());
    }
}
