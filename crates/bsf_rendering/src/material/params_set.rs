//! # GPU Parameter Sets
//!
//! What the renderer binds when it draws with one technique of a material:
//! a data block laid out with GPU alignment rules, plus the objects bound to
//! each pass.
//!
//! ```text
//!   MaterialParams (packed)            GpuParamsSet (GPU layout)
//!   ┌──────────────┐                   ┌──────────────────────────┐
//!   │ roughness f32│ ── update() ────► │ 0   roughness            │
//!   │ offsets  3xv3│   (changed or     │ 16  offsets[0] (pad 4)   │
//!   │ tint   color │    animated only) │ 32  offsets[1] ...       │
//!   └──────────────┘                   └──────────────────────────┘
//! ```
//!
//! Array elements and structs start on 16 byte boundaries. Matrix rows are
//! padded the same way as in the type table.

use std::collections::HashMap;
use std::sync::Arc;

use bsf_core::{CoreSide, ResourceHandle};

use crate::gpu::{
    GpuBuffer, GpuParamDataType, GpuParamValue, MaterialParamKind, SamplerState, Texture,
    TextureSurface,
};

use super::animation::repeat;
use super::params::{MaterialParams, TextureBinding};

const BLOCK_ALIGN: usize = 16;

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

#[derive(Clone, Copy, Debug)]
struct DataSlot {
    offset: usize,
    stride: usize,
    size: usize,
    elements: usize,
    data_type: GpuParamDataType,
}

/// A texture bound to a pass.
#[derive(Clone, Debug)]
pub struct BoundTexture {
    /// Texture, or the sprite's atlas.
    pub texture: Arc<Texture>,
    /// Bound surface.
    pub surface: TextureSurface,
    /// True for unordered read/write access.
    pub load_store: bool,
}

#[derive(Clone, Debug, Default)]
struct PassBindings {
    textures: HashMap<String, BoundTexture>,
    buffers: HashMap<String, Arc<GpuBuffer>>,
    samplers: HashMap<String, Arc<SamplerState>>,
}

/// Bindings of every pass of one technique.
#[derive(Debug)]
pub struct GpuParamsSet {
    technique: usize,
    data: Vec<u8>,
    slots: HashMap<String, DataSlot>,
    passes: Vec<PassBindings>,
    param_version: u64,
}

impl GpuParamsSet {
    /// Lays out the data block for `params`. Nothing is written until
    /// [`update`](Self::update).
    #[must_use]
    pub fn new(technique: usize, num_passes: usize, params: &MaterialParams<CoreSide>) -> Self {
        let mut slots = HashMap::new();
        let mut cursor = 0usize;

        for (index, (name, param)) in params.iter().enumerate() {
            if param.kind != MaterialParamKind::Data {
                continue;
            }
            let Some(data_type) = param.data_type else { continue };

            let (size, align) = match data_type {
                GpuParamDataType::Struct => (params.struct_size(index), BLOCK_ALIGN),
                ty => (ty.info().size as usize, ty.info().alignment as usize),
            };
            let (align, stride) = if param.array_size > 1 || data_type == GpuParamDataType::Struct {
                (BLOCK_ALIGN, round_up(size, BLOCK_ALIGN))
            } else {
                (align, size)
            };

            let offset = round_up(cursor, align);
            cursor = offset + stride * param.array_size;
            slots.insert(
                name.to_string(),
                DataSlot { offset, stride, size, elements: param.array_size, data_type },
            );
        }

        Self {
            technique,
            data: vec![0u8; round_up(cursor, BLOCK_ALIGN)],
            slots,
            passes: vec![PassBindings::default(); num_passes],
            param_version: 0,
        }
    }

    /// Technique the set was built for.
    #[must_use]
    pub const fn technique(&self) -> usize {
        self.technique
    }

    /// Number of passes.
    #[must_use]
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// Parameter version the set was last updated to.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.param_version
    }

    /// The data block in GPU layout.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copies changed parameters from `params`.
    ///
    /// A parameter is copied if it changed since the previous update, if
    /// `update_all` is set, or if it is animated. Animated values are
    /// evaluated at `t`.
    pub fn update(&mut self, params: &MaterialParams<CoreSide>, t: f32, update_all: bool) {
        for (index, (name, param)) in params.iter().enumerate() {
            let changed = update_all || param.version > self.param_version;

            match param.kind {
                MaterialParamKind::Data => {
                    let Some(slot) = self.slots.get(name).copied() else { continue };
                    if slot.data_type == GpuParamDataType::Struct {
                        if changed {
                            for i in 0..param.array_size {
                                self.write_struct(slot, i, params.struct_at(index, i));
                            }
                        }
                        continue;
                    }
                    for i in 0..param.array_size {
                        if changed || params.is_animated(index, i) {
                            self.write_element(params, index, slot, i, t);
                        }
                    }
                }
                MaterialParamKind::Texture if changed => {
                    let bound = Self::resolve_texture(params, index, name);
                    for pass in &mut self.passes {
                        match &bound {
                            Some(texture) => pass.textures.insert(name.to_string(), texture.clone()),
                            None => pass.textures.remove(name),
                        };
                    }
                }
                MaterialParamKind::Buffer if changed => {
                    let buffer = params.buffer_at(index).clone();
                    for pass in &mut self.passes {
                        match &buffer {
                            Some(buffer) => pass.buffers.insert(name.to_string(), Arc::clone(buffer)),
                            None => pass.buffers.remove(name),
                        };
                    }
                }
                MaterialParamKind::Sampler if changed => {
                    let sampler = params.sampler_at(index).clone().or_else(|| {
                        params.table().samplers.get(name).and_then(|desc| desc.default_sampler.clone())
                    });
                    for pass in &mut self.passes {
                        match &sampler {
                            Some(sampler) => pass.samplers.insert(name.to_string(), Arc::clone(sampler)),
                            None => pass.samplers.remove(name),
                        };
                    }
                }
                MaterialParamKind::Texture | MaterialParamKind::Buffer | MaterialParamKind::Sampler => {}
            }
        }

        self.param_version = params.version();
    }

    fn resolve_texture(params: &MaterialParams<CoreSide>, index: usize, name: &str) -> Option<BoundTexture> {
        let slot = params.texture_at(index);
        let texture = match slot.binding {
            TextureBinding::Sprite => slot.sprite.as_ref().and_then(|sprite| sprite.atlas.clone()),
            TextureBinding::Normal | TextureBinding::LoadStore => slot.texture.clone(),
        };
        let texture = texture.or_else(|| {
            params
                .table()
                .textures
                .get(name)
                .and_then(|desc| desc.default_texture.as_ref())
                .and_then(ResourceHandle::get)
        })?;

        Some(BoundTexture {
            texture,
            surface: slot.surface,
            load_store: slot.binding == TextureBinding::LoadStore,
        })
    }

    fn write_element(
        &mut self,
        params: &MaterialParams<CoreSide>,
        index: usize,
        slot: DataSlot,
        array_idx: usize,
        t: f32,
    ) {
        let animated: Option<Vec<u8>> = match slot.data_type {
            GpuParamDataType::Float1 => params
                .curve_at(index, array_idx)
                .map(|curve| bytemuck::bytes_of(&curve.evaluate(t, true)).to_vec()),
            GpuParamDataType::Color => params.gradient_at(index, array_idx).map(|gradient| {
                let color = gradient.evaluate(repeat(t, gradient.duration()));
                bytemuck::bytes_of(&color).to_vec()
            }),
            GpuParamDataType::Float4 if array_idx == 0 => params
                .sprite_uv_source(index)
                .and_then(|texture| params.texture_at(texture).sprite.clone())
                .map(|sprite| bytemuck::bytes_of(&sprite.evaluate(t)).to_vec()),
            _ => None,
        };

        match animated {
            Some(bytes) => self.write_rows(slot, array_idx, &bytes),
            None => self.write_rows(slot, array_idx, params.element_bytes(index, array_idx)),
        }
    }

    /// Copies one packed element into its padded GPU rows.
    fn write_rows(&mut self, slot: DataSlot, array_idx: usize, packed: &[u8]) {
        let info = slot.data_type.info();
        let rows = info.rows as usize;
        let row_bytes = info.columns as usize * info.base_type_size as usize;
        let row_stride = slot.size / rows;
        let base = slot.offset + slot.stride * array_idx;

        for row in 0..rows {
            let src = &packed[row * row_bytes..(row + 1) * row_bytes];
            let dst = base + row * row_stride;
            self.data[dst..dst + row_bytes].copy_from_slice(src);
        }
    }

    fn read_rows(&self, slot: DataSlot, array_idx: usize) -> Vec<u8> {
        let info = slot.data_type.info();
        let rows = info.rows as usize;
        let row_bytes = info.columns as usize * info.base_type_size as usize;
        let row_stride = slot.size / rows;
        let base = slot.offset + slot.stride * array_idx;

        let mut packed = Vec::with_capacity(rows * row_bytes);
        for row in 0..rows {
            let src = base + row * row_stride;
            packed.extend_from_slice(&self.data[src..src + row_bytes]);
        }
        packed
    }

    fn write_struct(&mut self, slot: DataSlot, array_idx: usize, bytes: &[u8]) {
        let start = slot.offset + slot.stride * array_idx;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn slot(&self, name: &str, array_idx: usize) -> Option<DataSlot> {
        let slot = *self.slots.get(name)?;
        (array_idx < slot.elements).then_some(slot)
    }

    /// Value of element `array_idx` of `name` as last written.
    #[must_use]
    pub fn value<T: GpuParamValue>(&self, name: &str, array_idx: usize) -> Option<T> {
        let slot = self.slot(name, array_idx)?;
        if slot.data_type != T::DATA_TYPE {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&self.read_rows(slot, array_idx)))
    }

    /// Bytes of element `array_idx` of the struct parameter `name`.
    #[must_use]
    pub fn struct_bytes(&self, name: &str, array_idx: usize) -> Option<&[u8]> {
        let slot = self.slot(name, array_idx)?;
        if slot.data_type != GpuParamDataType::Struct {
            return None;
        }
        let start = slot.offset + slot.stride * array_idx;
        Some(&self.data[start..start + slot.size])
    }

    /// Texture bound to `name` in pass `pass`.
    #[must_use]
    pub fn texture(&self, pass: usize, name: &str) -> Option<&BoundTexture> {
        self.passes.get(pass)?.textures.get(name)
    }

    /// Buffer bound to `name` in pass `pass`.
    #[must_use]
    pub fn buffer(&self, pass: usize, name: &str) -> Option<&Arc<GpuBuffer>> {
        self.passes.get(pass)?.buffers.get(name)
    }

    /// Sampler bound to `name` in pass `pass`.
    #[must_use]
    pub fn sampler(&self, pass: usize, name: &str) -> Option<&Arc<SamplerState>> {
        self.passes.get(pass)?.samplers.get(name)
    }
}
