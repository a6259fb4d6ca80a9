//! # Material
//!
//! A shader plus the values of its parameters, in two halves:
//!
//! ```text
//!   SIM: Material                          CORE: CoreMaterial
//!  ┌─────────────────────────────┐        ┌─────────────────────────────┐
//!  │ shader handle (may load)    │        │ CoreShader                  │
//!  │ compatible techniques       │ ─────► │ CoreTechniques              │
//!  │ MaterialParams<SimSide>     │  sync  │ MaterialParams<CoreSide>    │
//!  │ variation                   │        │ variation                   │
//!  └─────────────────────────────┘        └─────────────────────────────┘
//! ```
//!
//! ## Snapshot layout
//!
//! ```text
//!   sync_all: bool        anything other than PARAM is dirty
//!   shader:   ref         null until the shader handle is loaded
//!   techniques: refs
//!   has_params: bool
//!   params:   dirty params (all of them when sync_all)
//!   variation
//! ```
//!
//! ## Initialization
//!
//! The material is usable once its shader handle has loaded and the shader
//! has at least one technique the renderer supports. Until then the typed
//! accessors return [`MaterialError::NoShader`] or
//! [`MaterialError::NoSupportedTechnique`]. Loading a different version of
//! the same shader rebuilds the parameters and migrates every value whose
//! name, class and type still match.

use std::sync::{Arc, Weak};

use bitflags::bitflags;
use bsf_core::{
    CoreObject, CoreObjectCore, CoreSide, CoreSync, Counterpart, ResourceHandle, ResourceId,
    Resources, SimSide, SyncReader, SyncStream,
};
use parking_lot::RwLock;

use crate::error::{MaterialError, MaterialResult};
use crate::gpu::{
    GpuBool, GpuBuffer, GpuParamDataType, GpuParamValue, MaterialParamKind, SamplerState,
    SpriteTexture, Texture, TextureSurface,
};

use super::animation::{AnimationCurve, ColorGradient};
use super::param_handle::{
    BufferParam, CurveParam, DataParam, GradientParam, LoadStoreTextureParam, SamplerParam,
    SpriteTextureParam, StructParam, TextureParam,
};
use super::params::{MaterialParams, TextureBinding};
use super::params_set::GpuParamsSet;
use super::pass::{CorePass, Pass};
use super::shader::{CoreShader, Shader, ShaderDataParamDesc};
use super::technique::{
    default_technique, find_technique, CoreTechnique, FindTechniqueDesc, Technique,
};
use super::variation::ShaderVariation;

bitflags! {
    /// What changed on a material since the last sync.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MaterialDirtyFlags: u32 {
        /// Parameter values.
        const PARAM = 1 << 0;
        /// A resource a parameter references finished loading.
        const PARAM_RESOURCE = 1 << 1;
        /// Shader, techniques or variation.
        const SHADER = 1 << 2;
    }
}

/// A material shared between the scene objects that render with it.
pub type SharedMaterial = Arc<RwLock<Material>>;

/// Sim-thread material.
pub struct Material {
    object: CoreObjectCore<CoreMaterial>,
    shader: Option<ResourceHandle<Shader>>,
    loaded_shader: Option<Arc<Shader>>,
    techniques: Vec<Arc<Technique>>,
    params: Option<MaterialParams<SimSide>>,
    variation: ShaderVariation,
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("id", &self.object.id())
            .field("shader", &self.shader.as_ref().map(ResourceHandle::name))
            .field("techniques", &self.techniques.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Material {
    /// A material without a shader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            object: CoreObjectCore::new(),
            shader: None,
            loaded_shader: None,
            techniques: Vec::new(),
            params: None,
            variation: ShaderVariation::new(),
        }
    }

    /// A material using `shader`. Initialized right away if it is loaded.
    #[must_use]
    pub fn with_shader(shader: ResourceHandle<Shader>) -> Self {
        let mut material = Self::new();
        material.set_shader(Some(shader));
        material
    }

    /// Wraps the material for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedMaterial {
        Arc::new(RwLock::new(self))
    }

    /// Subscribes `material` to resource loads so it initializes when its
    /// shader arrives and resyncs when a referenced texture does.
    ///
    /// The subscription holds a weak reference. Do not hold the material's
    /// lock while loading resources.
    pub fn watch(material: &SharedMaterial, resources: &Resources) {
        let weak: Weak<RwLock<Material>> = Arc::downgrade(material);
        resources.on_loaded(move |id| {
            if let Some(material) = weak.upgrade() {
                material.write().notify_resource_loaded(id);
            }
        });
    }

    // ========================================================================
    // SHADER
    // ========================================================================

    /// Replaces the shader. Parameters of the previous shader are dropped.
    pub fn set_shader(&mut self, shader: Option<ResourceHandle<Shader>>) {
        if self.shader == shader {
            return;
        }

        self.shader = shader;
        self.loaded_shader = None;
        self.techniques.clear();
        self.params = None;
        self.mark_core_dirty(MaterialDirtyFlags::SHADER.bits());

        self.initialize_if_loaded();
    }

    /// Shader handle.
    #[must_use]
    pub fn shader(&self) -> Option<&ResourceHandle<Shader>> {
        self.shader.as_ref()
    }

    /// The shader the current parameters were built from.
    #[must_use]
    pub fn loaded_shader(&self) -> Option<&Arc<Shader>> {
        self.loaded_shader.as_ref()
    }

    /// Sets the material's own variation, used to pick techniques.
    pub fn set_variation(&mut self, variation: ShaderVariation) {
        self.variation = variation;
        self.mark_core_dirty(MaterialDirtyFlags::SHADER.bits());
    }

    /// The material's own variation.
    #[must_use]
    pub const fn variation(&self) -> &ShaderVariation {
        &self.variation
    }

    /// Returns true once the shader is loaded and has a supported technique.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.loaded_shader.is_some() && !self.techniques.is_empty()
    }

    /// Rebuilds techniques and parameters from the loaded shader, discarding
    /// current values. Leaves zero techniques if the shader has none the
    /// renderer supports.
    pub fn initialize_techniques(&mut self) {
        self.techniques.clear();

        let Some(shader) = self.loaded_shader.clone() else {
            self.params = None;
            return;
        };

        self.params = Some(MaterialParams::new(Arc::clone(shader.params())));
        self.techniques = shader.compatible_techniques().to_vec();
        if self.techniques.is_empty() {
            return;
        }
        self.init_default_parameters();
    }

    fn initialize_if_loaded(&mut self) {
        let Some(shader) = self.shader.as_ref().and_then(ResourceHandle::get) else {
            return;
        };
        if self.loaded_shader.as_ref().is_some_and(|current| Arc::ptr_eq(current, &shader)) {
            return;
        }

        // A reload keeps the values of the previous version where they fit
        let old_params = self.params.take();
        self.loaded_shader = Some(shader);
        self.initialize_techniques();
        self.mark_core_dirty(MaterialDirtyFlags::SHADER.bits());

        if self.techniques.is_empty() {
            return;
        }
        if let Some(old_params) = old_params {
            self.set_params(&old_params);
        }
    }

    /// Reacts to a resource finishing loading.
    ///
    /// The shader triggers initialization; a resource one of the parameters
    /// references triggers a parameter resync.
    pub fn notify_resource_loaded(&mut self, id: ResourceId) {
        if self.shader.as_ref().is_some_and(|shader| shader.id() == id) {
            self.initialize_if_loaded();
        } else if self.references_resource(id) {
            self.mark_core_dirty(MaterialDirtyFlags::PARAM_RESOURCE.bits());
        }
    }

    fn references_resource(&self, id: ResourceId) -> bool {
        let Some(params) = &self.params else {
            return false;
        };
        params.iter().enumerate().any(|(index, (_, param))| {
            if param.kind != MaterialParamKind::Texture {
                return false;
            }
            let slot = params.texture_at(index);
            match slot.binding {
                TextureBinding::Sprite => slot.sprite.as_ref().is_some_and(|sprite| sprite.id() == id),
                TextureBinding::Normal | TextureBinding::LoadStore => {
                    slot.texture.as_ref().is_some_and(|texture| texture.id() == id)
                }
            }
        })
    }

    /// Writes every default the shader declares into the parameters.
    pub fn init_default_parameters(&mut self) {
        let Some(shader) = self.loaded_shader.clone() else {
            return;
        };
        let Some(params) = self.params.as_mut() else {
            return;
        };
        let table = shader.params();

        for desc in table.data.values() {
            let Some(bytes) = desc.default.as_deref() else { continue };
            apply_data_default(params, desc, bytes);
        }
        for desc in table.textures.values() {
            if let Some(texture) = &desc.default_texture {
                params.set_texture(&desc.name, Some(texture.clone()), TextureSurface::COMPLETE);
            }
        }
        for desc in table.samplers.values() {
            if let Some(sampler) = &desc.default_sampler {
                params.set_sampler(&desc.name, Some(Arc::clone(sampler)));
            }
        }
        self.mark_core_dirty(MaterialDirtyFlags::PARAM.bits());
    }

    /// Copies matching values from `old` into the current parameters.
    ///
    /// Parameters match by name, class and data type. Arrays copy as many
    /// elements as both have. Anything else is skipped without a warning.
    pub fn set_params(&mut self, old: &MaterialParams<SimSide>) {
        if let Some(params) = self.params.as_mut() {
            params.migrate_from(old);
            self.mark_core_dirty(MaterialDirtyFlags::PARAM.bits());
        }
    }

    // ========================================================================
    // TECHNIQUES
    // ========================================================================

    /// Number of techniques the material can render with.
    #[must_use]
    pub fn num_techniques(&self) -> usize {
        self.techniques.len()
    }

    /// Technique at `index`.
    #[must_use]
    pub fn technique(&self, index: usize) -> Option<&Arc<Technique>> {
        self.techniques.get(index)
    }

    /// Best technique for `desc`; `None` if nothing qualifies.
    #[must_use]
    pub fn find_technique(&self, desc: &FindTechniqueDesc) -> Option<usize> {
        find_technique(&self.techniques, desc, &self.variation)
    }

    /// Best untagged technique. Index 0 if nothing qualifies.
    #[must_use]
    pub fn default_technique(&self) -> usize {
        default_technique(&self.techniques, &self.variation)
    }

    /// Passes of technique `technique`. Zero for an invalid index.
    #[must_use]
    pub fn num_passes(&self, technique: usize) -> usize {
        self.techniques.get(technique).map_or(0, |t| t.num_passes())
    }

    /// Pass `pass` of technique `technique`.
    #[must_use]
    pub fn pass(&self, pass: usize, technique: usize) -> Option<&Pass> {
        self.techniques.get(technique)?.pass(pass)
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    /// Parameter values, if the shader is loaded.
    #[must_use]
    pub fn params(&self) -> Option<&MaterialParams<SimSide>> {
        self.params.as_ref()
    }

    pub(crate) fn params_for_write(&mut self, flags: MaterialDirtyFlags) -> Option<&mut MaterialParams<SimSide>> {
        if self.params.is_some() {
            self.mark_core_dirty(flags.bits());
        }
        self.params.as_mut()
    }

    fn initialized_params(&self) -> MaterialResult<&MaterialParams<SimSide>> {
        if self.loaded_shader.is_none() {
            return Err(MaterialError::NoShader);
        }
        if self.techniques.is_empty() {
            return Err(MaterialError::NoSupportedTechnique);
        }
        self.params.as_ref().ok_or(MaterialError::NoShader)
    }

    /// Handle to a typed data parameter.
    ///
    /// # Errors
    ///
    /// Fails if the material is not initialized. An unknown name is not an
    /// error: it logs a warning and returns an unbound handle.
    pub fn param_data<T: GpuParamValue>(&self, name: &str) -> MaterialResult<DataParam<T>> {
        Ok(DataParam::bind(self.initialized_params()?, name))
    }

    /// Handle to a struct parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_struct(&self, name: &str) -> MaterialResult<StructParam> {
        Ok(StructParam::bind(self.initialized_params()?, name))
    }

    /// Handle to the curve of a `Float1` parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_curve(&self, name: &str) -> MaterialResult<CurveParam> {
        Ok(CurveParam::bind(self.initialized_params()?, name))
    }

    /// Handle to the gradient of a `Color` parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_gradient(&self, name: &str) -> MaterialResult<GradientParam> {
        Ok(GradientParam::bind(self.initialized_params()?, name))
    }

    /// Handle to a sampled texture parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_texture(&self, name: &str) -> MaterialResult<TextureParam> {
        Ok(TextureParam::bind(self.initialized_params()?, name))
    }

    /// Handle to a load-store texture parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_load_store_texture(&self, name: &str) -> MaterialResult<LoadStoreTextureParam> {
        Ok(LoadStoreTextureParam::bind(self.initialized_params()?, name))
    }

    /// Handle to a sprite texture parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_sprite_texture(&self, name: &str) -> MaterialResult<SpriteTextureParam> {
        Ok(SpriteTextureParam::bind(self.initialized_params()?, name))
    }

    /// Handle to a buffer parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_buffer(&self, name: &str) -> MaterialResult<BufferParam> {
        Ok(BufferParam::bind(self.initialized_params()?, name))
    }

    /// Handle to a sampler parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn param_sampler(&self, name: &str) -> MaterialResult<SamplerParam> {
        Ok(SamplerParam::bind(self.initialized_params()?, name))
    }

    /// Writes element `array_idx` of a data parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set<T: GpuParamValue>(&mut self, name: &str, value: T, array_idx: usize) -> MaterialResult<()> {
        self.param_data::<T>(name)?.set(self, value, array_idx);
        Ok(())
    }

    /// Reads element `array_idx` of a data parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn get<T: GpuParamValue>(&self, name: &str, array_idx: usize) -> MaterialResult<T> {
        Ok(self.param_data::<T>(name)?.get(self, array_idx))
    }

    /// Writes a boolean parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_bool(&mut self, name: &str, value: bool, array_idx: usize) -> MaterialResult<()> {
        self.set(name, GpuBool::from(value), array_idx)
    }

    /// Overwrites element `array_idx` of a struct parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_struct(&mut self, name: &str, bytes: &[u8], array_idx: usize) -> MaterialResult<()> {
        self.param_struct(name)?.set(self, bytes, array_idx);
        Ok(())
    }

    /// Animates element `array_idx` of a `Float1` parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_curve(&mut self, name: &str, curve: AnimationCurve, array_idx: usize) -> MaterialResult<()> {
        self.param_curve(name)?.set(self, curve, array_idx);
        Ok(())
    }

    /// Animates element `array_idx` of a `Color` parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_gradient(&mut self, name: &str, gradient: ColorGradient, array_idx: usize) -> MaterialResult<()> {
        self.param_gradient(name)?.set(self, gradient, array_idx);
        Ok(())
    }

    /// Binds a sampled texture.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_texture(&mut self, name: &str, texture: Option<ResourceHandle<Texture>>) -> MaterialResult<()> {
        self.param_texture(name)?.set(self, texture, TextureSurface::COMPLETE);
        Ok(())
    }

    /// Bound texture of a texture parameter.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn texture(&self, name: &str) -> MaterialResult<Option<ResourceHandle<Texture>>> {
        Ok(self.param_texture(name)?.get(self))
    }

    /// Binds one surface of a texture for unordered access.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_load_store_texture(
        &mut self,
        name: &str,
        texture: Option<ResourceHandle<Texture>>,
        surface: TextureSurface,
    ) -> MaterialResult<()> {
        self.param_load_store_texture(name)?.set(self, texture, surface);
        Ok(())
    }

    /// Binds a sprite texture.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_sprite_texture(
        &mut self,
        name: &str,
        sprite: Option<ResourceHandle<SpriteTexture>>,
    ) -> MaterialResult<()> {
        self.param_sprite_texture(name)?.set(self, sprite);
        Ok(())
    }

    /// Binds a buffer.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_buffer(&mut self, name: &str, buffer: Option<Arc<GpuBuffer>>) -> MaterialResult<()> {
        self.param_buffer(name)?.set(self, buffer);
        Ok(())
    }

    /// Binds a sampler.
    ///
    /// # Errors
    ///
    /// See [`param_data`](Self::param_data).
    pub fn set_sampler(&mut self, name: &str, sampler: Option<Arc<SamplerState>>) -> MaterialResult<()> {
        self.param_sampler(name)?.set(self, sampler);
        Ok(())
    }

    /// Returns true if element `array_idx` of `name` changes over time.
    #[must_use]
    pub fn is_animated(&self, name: &str, array_idx: usize) -> bool {
        let Some(params) = &self.params else {
            return false;
        };
        params.param_index(name).is_some_and(|index| {
            params.param(index).is_some_and(|param| {
                param.kind == MaterialParamKind::Data
                    && param.data_type != Some(GpuParamDataType::Struct)
                    && array_idx < param.array_size
                    && params.is_animated(index, array_idx)
            })
        })
    }
}

/// Writes one declared default through the typed setters.
fn apply_data_default(params: &mut MaterialParams<SimSide>, desc: &ShaderDataParamDesc, bytes: &[u8]) {
    use bsf_shared::{
        Color, IVec2, IVec3, IVec4, Mat2, Mat2x3, Mat2x4, Mat3, Mat3x2, Mat3x4, Mat4, Mat4x2,
        Mat4x3, Vec2, Vec3, Vec4,
    };

    fn apply<T: GpuParamValue>(params: &mut MaterialParams<SimSide>, name: &str, bytes: &[u8], array_size: usize) {
        let chunks = bytes.chunks_exact(std::mem::size_of::<T>()).take(array_size);
        for (index, chunk) in chunks.enumerate() {
            params.set(name, bytemuck::pod_read_unaligned::<T>(chunk), index);
        }
    }

    let name = desc.name.as_str();
    let array_size = desc.array_size.max(1) as usize;
    match desc.data_type {
        GpuParamDataType::Float1 => apply::<f32>(params, name, bytes, array_size),
        GpuParamDataType::Float2 => apply::<Vec2>(params, name, bytes, array_size),
        GpuParamDataType::Float3 => apply::<Vec3>(params, name, bytes, array_size),
        GpuParamDataType::Float4 => apply::<Vec4>(params, name, bytes, array_size),
        GpuParamDataType::Matrix2x2 => apply::<Mat2>(params, name, bytes, array_size),
        GpuParamDataType::Matrix2x3 => apply::<Mat2x3>(params, name, bytes, array_size),
        GpuParamDataType::Matrix2x4 => apply::<Mat2x4>(params, name, bytes, array_size),
        GpuParamDataType::Matrix3x2 => apply::<Mat3x2>(params, name, bytes, array_size),
        GpuParamDataType::Matrix3x3 => apply::<Mat3>(params, name, bytes, array_size),
        GpuParamDataType::Matrix3x4 => apply::<Mat3x4>(params, name, bytes, array_size),
        GpuParamDataType::Matrix4x2 => apply::<Mat4x2>(params, name, bytes, array_size),
        GpuParamDataType::Matrix4x3 => apply::<Mat4x3>(params, name, bytes, array_size),
        GpuParamDataType::Matrix4x4 => apply::<Mat4>(params, name, bytes, array_size),
        GpuParamDataType::Int1 => apply::<i32>(params, name, bytes, array_size),
        GpuParamDataType::Int2 => apply::<IVec2>(params, name, bytes, array_size),
        GpuParamDataType::Int3 => apply::<IVec3>(params, name, bytes, array_size),
        GpuParamDataType::Int4 => apply::<IVec4>(params, name, bytes, array_size),
        GpuParamDataType::Bool => apply::<GpuBool>(params, name, bytes, array_size),
        GpuParamDataType::Color => apply::<Color>(params, name, bytes, array_size),
        GpuParamDataType::Struct => {
            let element_size = desc.element_size as usize;
            if element_size == 0 {
                return;
            }
            for (index, chunk) in bytes.chunks_exact(element_size).take(array_size).enumerate() {
                params.set_struct(name, chunk, index);
            }
        }
    }
}

impl CoreObject for Material {
    type Core = CoreMaterial;

    fn core_object(&self) -> &CoreObjectCore<CoreMaterial> {
        &self.object
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<CoreMaterial> {
        &mut self.object
    }

    fn create_core(&self) -> CoreMaterial {
        CoreMaterial::new(self.variation.clone())
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, flags: u32) {
        let mut sync_all = flags & !MaterialDirtyFlags::PARAM.bits() != 0;
        stream.flag(&mut sync_all);

        let mut shader = self.loaded_shader.clone();
        stream.reference::<Shader>(&mut shader);

        let mut techniques: Vec<Option<Arc<Technique>>> = self.techniques.iter().cloned().map(Some).collect();
        stream.references::<Technique>(&mut techniques);

        let mut has_params = self.params.is_some();
        stream.flag(&mut has_params);
        if let Some(params) = self.params.as_mut() {
            params.sync(stream, sync_all);
        }

        stream.nested(&mut self.variation);
    }

    fn after_sync(&mut self, _flags: u32) {
        if let Some(params) = self.params.as_mut() {
            params.mark_synced();
        }
    }
}

impl Counterpart for Material {
    type SimRef = Option<SharedMaterial>;
    type Core = RwLock<CoreMaterial>;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<RwLock<CoreMaterial>>> {
        sim.as_ref().map(|material| material.read().core())
    }
}

// ============================================================================
// CORE
// ============================================================================

/// Core-thread material.
#[derive(Debug, Default)]
pub struct CoreMaterial {
    shader: Option<Arc<CoreShader>>,
    techniques: Vec<Arc<CoreTechnique>>,
    params: Option<MaterialParams<CoreSide>>,
    variation: ShaderVariation,
}

impl CoreMaterial {
    /// A material that has not received its first snapshot.
    #[must_use]
    pub fn new(variation: ShaderVariation) -> Self {
        Self { variation, ..Self::default() }
    }

    /// Shader, if the sim side had it loaded at the last sync.
    #[must_use]
    pub fn shader(&self) -> Option<&Arc<CoreShader>> {
        self.shader.as_ref()
    }

    /// Renderable techniques.
    #[must_use]
    pub fn techniques(&self) -> &[Arc<CoreTechnique>] {
        &self.techniques
    }

    /// Number of renderable techniques.
    #[must_use]
    pub fn num_techniques(&self) -> usize {
        self.techniques.len()
    }

    /// Best technique for `desc`.
    #[must_use]
    pub fn find_technique(&self, desc: &FindTechniqueDesc) -> Option<usize> {
        find_technique(&self.techniques, desc, &self.variation)
    }

    /// Best untagged technique, index 0 if none qualifies.
    #[must_use]
    pub fn default_technique(&self) -> usize {
        default_technique(&self.techniques, &self.variation)
    }

    /// Passes of technique `technique`. Zero for an invalid index.
    #[must_use]
    pub fn num_passes(&self, technique: usize) -> usize {
        self.techniques.get(technique).map_or(0, |t| t.num_passes())
    }

    /// Pass `pass` of technique `technique`.
    #[must_use]
    pub fn pass(&self, pass: usize, technique: usize) -> Option<&Arc<CorePass>> {
        self.techniques.get(technique)?.pass(pass)
    }

    /// Parameter values.
    #[must_use]
    pub fn params(&self) -> Option<&MaterialParams<CoreSide>> {
        self.params.as_ref()
    }

    /// Variation.
    #[must_use]
    pub const fn variation(&self) -> &ShaderVariation {
        &self.variation
    }

    /// GPU parameter bindings for every pass of technique `technique`,
    /// filled with the current values.
    ///
    /// Returns `None` for an invalid technique index or before the material
    /// has parameters.
    #[must_use]
    pub fn create_params_set(&self, technique: usize) -> Option<GpuParamsSet> {
        let core_technique = self.techniques.get(technique)?;
        let params = self.params.as_ref()?;
        let mut set = GpuParamsSet::new(technique, core_technique.num_passes(), params);
        set.update(params, 0.0, true);
        Some(set)
    }

    /// Pushes parameters changed since `set` was last updated, plus every
    /// animated parameter evaluated at `t`.
    pub fn update_params_set(&self, set: &mut GpuParamsSet, t: f32, update_all: bool) {
        if let Some(params) = &self.params {
            set.update(params, t, update_all);
        }
    }
}

impl CoreSync for CoreMaterial {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, _flags: u32) {
        let mut sync_all = false;
        reader.flag(&mut sync_all);

        let initial_version = self.params.as_ref().map_or(1, MaterialParams::version);
        if sync_all {
            self.params = None;
        }

        reader.reference::<Shader>(&mut self.shader);

        let mut techniques = Vec::new();
        reader.references::<Technique>(&mut techniques);
        self.techniques = techniques.into_iter().flatten().collect();

        let mut has_params = false;
        reader.flag(&mut has_params);

        if self.params.is_none() {
            if let Some(shader) = &self.shader {
                self.params = Some(MaterialParams::with_version(Arc::clone(shader.params()), initial_version));
            }
        }
        if has_params {
            let Some(params) = self.params.as_mut() else {
                panic!("Sync desync! Material parameters arrived without a shader");
            };
            params.sync(reader, sync_all);
        }

        reader.nested(&mut self.variation);
    }
}
