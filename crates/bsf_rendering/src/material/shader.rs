//! # Shaders
//!
//! A shader is the compiled front end's output as far as materials care:
//! a parameter table plus a list of techniques.
//!
//! ```text
//!   Shader
//!   ├── ShaderParamTable (shared, immutable)
//!   │     data:     name -> type, array size, default bytes
//!   │     textures / buffers / samplers: name -> object type, default
//!   └── techniques, filtered to what the backend supports
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bsf_core::{Counterpart, ResourceHandle};

use crate::gpu::{GpuParamDataType, GpuParamObjectType, GpuParamValue, RenderCapabilities, SamplerState, Texture};

use super::technique::{CoreTechnique, Technique, TechniqueDesc};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Declaration of a data parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderDataParamDesc {
    /// Parameter name.
    pub name: String,
    /// Element type.
    pub data_type: GpuParamDataType,
    /// Array length, 1 for non-arrays.
    pub array_size: u32,
    /// Size of one element in bytes. Only meaningful for structs.
    pub element_size: u32,
    /// Default value of every element, packed.
    pub default: Option<Vec<u8>>,
    /// Texture parameter whose sprite UV transform this `Float4` receives.
    pub sprite_uv: Option<String>,
}

impl ShaderDataParamDesc {
    /// A non-array parameter without a default.
    #[must_use]
    pub fn new(name: &str, data_type: GpuParamDataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            array_size: 1,
            element_size: u32::try_from(data_type.size()).unwrap_or(0),
            default: None,
            sprite_uv: None,
        }
    }

    /// A struct parameter whose elements are `element_size` bytes.
    #[must_use]
    pub fn structure(name: &str, element_size: u32) -> Self {
        Self { element_size, ..Self::new(name, GpuParamDataType::Struct) }
    }

    /// Makes the parameter an array.
    #[must_use]
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size.max(1);
        self
    }

    /// Sets the default value from typed elements.
    ///
    /// # Panics
    ///
    /// Panics if `T` does not match the declared type.
    #[must_use]
    pub fn with_default<T: GpuParamValue>(mut self, values: &[T]) -> Self {
        assert_eq!(
            T::DATA_TYPE,
            self.data_type,
            "Default value type does not match parameter '{}'",
            self.name
        );
        self.default = Some(bytemuck::cast_slice(values).to_vec());
        self
    }

    /// Sets the default value from raw bytes. Used for structs.
    #[must_use]
    pub fn with_default_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.default = Some(bytes);
        self
    }

    /// Links this `Float4` to a sprite texture parameter.
    #[must_use]
    pub fn with_sprite_uv(mut self, texture_param: &str) -> Self {
        self.sprite_uv = Some(texture_param.to_string());
        self
    }

    /// Packed size of one element.
    #[must_use]
    pub fn packed_element_size(&self) -> usize {
        match self.data_type {
            GpuParamDataType::Struct => self.element_size as usize,
            ty => ty.size(),
        }
    }
}

/// Declaration of a texture, buffer or sampler parameter.
#[derive(Clone, Debug)]
pub struct ShaderObjectParamDesc {
    /// Parameter name.
    pub name: String,
    /// Object type.
    pub object_type: GpuParamObjectType,
    /// Texture bound when the material sets none.
    pub default_texture: Option<ResourceHandle<Texture>>,
    /// Sampler bound when the material sets none.
    pub default_sampler: Option<Arc<SamplerState>>,
}

impl ShaderObjectParamDesc {
    /// A parameter without a default.
    #[must_use]
    pub fn new(name: &str, object_type: GpuParamObjectType) -> Self {
        Self { name: name.to_string(), object_type, default_texture: None, default_sampler: None }
    }

    /// Sets the default texture.
    #[must_use]
    pub fn with_default_texture(mut self, texture: ResourceHandle<Texture>) -> Self {
        self.default_texture = Some(texture);
        self
    }

    /// Sets the default sampler.
    #[must_use]
    pub fn with_default_sampler(mut self, sampler: Arc<SamplerState>) -> Self {
        self.default_sampler = Some(sampler);
        self
    }
}

/// Every parameter a shader declares, in name order per class.
#[derive(Debug)]
pub struct ShaderParamTable {
    id: u64,
    /// Data parameters.
    pub data: BTreeMap<String, ShaderDataParamDesc>,
    /// Texture and load-store texture parameters.
    pub textures: BTreeMap<String, ShaderObjectParamDesc>,
    /// Buffer parameters.
    pub buffers: BTreeMap<String, ShaderObjectParamDesc>,
    /// Sampler parameters.
    pub samplers: BTreeMap<String, ShaderObjectParamDesc>,
}

impl Default for ShaderParamTable {
    fn default() -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            data: BTreeMap::new(),
            textures: BTreeMap::new(),
            buffers: BTreeMap::new(),
            samplers: BTreeMap::new(),
        }
    }
}

impl Clone for ShaderParamTable {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            data: self.data.clone(),
            textures: self.textures.clone(),
            buffers: self.buffers.clone(),
            samplers: self.samplers.clone(),
        }
    }
}

impl ShaderParamTable {
    /// Process-unique id. Two tables with the same id have the same layout.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Adds a data parameter.
    pub fn add_data(&mut self, desc: ShaderDataParamDesc) {
        self.data.insert(desc.name.clone(), desc);
    }

    /// Adds an object parameter to the class matching its type.
    pub fn add_object(&mut self, desc: ShaderObjectParamDesc) {
        let class = match desc.object_type {
            GpuParamObjectType::Texture | GpuParamObjectType::LoadStoreTexture => &mut self.textures,
            GpuParamObjectType::Buffer => &mut self.buffers,
            GpuParamObjectType::Sampler => &mut self.samplers,
        };
        class.insert(desc.name.clone(), desc);
    }

    /// Looks up an object parameter of any class.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&ShaderObjectParamDesc> {
        self.textures.get(name).or_else(|| self.buffers.get(name)).or_else(|| self.samplers.get(name))
    }
}

/// Input of [`Shader::new`].
#[derive(Clone, Debug, Default)]
pub struct ShaderDesc {
    /// Parameter declarations.
    pub params: ShaderParamTable,
    /// Every technique, supported or not.
    pub techniques: Vec<TechniqueDesc>,
}

impl ShaderDesc {
    /// An empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a data parameter.
    #[must_use]
    pub fn with_data(mut self, desc: ShaderDataParamDesc) -> Self {
        self.params.add_data(desc);
        self
    }

    /// Adds an object parameter.
    #[must_use]
    pub fn with_object(mut self, desc: ShaderObjectParamDesc) -> Self {
        self.params.add_object(desc);
        self
    }

    /// Adds a technique.
    #[must_use]
    pub fn with_technique(mut self, technique: TechniqueDesc) -> Self {
        self.techniques.push(technique);
        self
    }
}

/// Core-thread shader.
#[derive(Debug)]
pub struct CoreShader {
    name: String,
    params: Arc<ShaderParamTable>,
    techniques: Vec<Arc<CoreTechnique>>,
}

impl CoreShader {
    /// Shader name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter declarations.
    #[must_use]
    pub fn params(&self) -> &Arc<ShaderParamTable> {
        &self.params
    }

    /// Techniques the backend supports.
    #[must_use]
    pub fn compatible_techniques(&self) -> &[Arc<CoreTechnique>] {
        &self.techniques
    }
}

/// Sim-thread shader.
#[derive(Debug)]
pub struct Shader {
    name: String,
    params: Arc<ShaderParamTable>,
    techniques: Vec<Arc<Technique>>,
    compatible: Vec<Arc<Technique>>,
    core: Arc<CoreShader>,
}

impl Shader {
    /// Builds a shader; techniques `caps` cannot compile are kept but never
    /// handed to materials.
    #[must_use]
    pub fn new(name: &str, desc: ShaderDesc, caps: &RenderCapabilities) -> Self {
        let params = Arc::new(desc.params);
        let techniques: Vec<Arc<Technique>> =
            desc.techniques.into_iter().map(|t| Arc::new(Technique::new(t))).collect();
        let compatible: Vec<Arc<Technique>> =
            techniques.iter().filter(|t| t.is_supported(caps)).cloned().collect();

        if compatible.is_empty() && !techniques.is_empty() {
            tracing::warn!("Shader '{}' has no technique supported by '{}'", name, caps.renderer);
        }

        let core = Arc::new(CoreShader {
            name: name.to_string(),
            params: Arc::clone(&params),
            techniques: compatible.iter().map(|t| Arc::clone(t.core())).collect(),
        });

        Self { name: name.to_string(), params, techniques, compatible, core }
    }

    /// Shader name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter declarations.
    #[must_use]
    pub fn params(&self) -> &Arc<ShaderParamTable> {
        &self.params
    }

    /// Every technique.
    #[must_use]
    pub fn techniques(&self) -> &[Arc<Technique>] {
        &self.techniques
    }

    /// Techniques the backend supports.
    #[must_use]
    pub fn compatible_techniques(&self) -> &[Arc<Technique>] {
        &self.compatible
    }

    /// The core-thread counterpart.
    #[must_use]
    pub fn core(&self) -> &Arc<CoreShader> {
        &self.core
    }
}

impl Counterpart for Shader {
    type SimRef = Option<Arc<Shader>>;
    type Core = CoreShader;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<CoreShader>> {
        sim.as_ref().map(|shader| Arc::clone(&shader.core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::PassDesc;

    #[test]
    fn test_unsupported_techniques_are_filtered() {
        let caps = RenderCapabilities::new("headless", &["hlsl"]);
        let desc = ShaderDesc::new()
            .with_technique(TechniqueDesc::new("glsl").with_pass(PassDesc::graphics("glsl", "v", "f")))
            .with_technique(TechniqueDesc::new("hlsl").with_pass(PassDesc::graphics("hlsl", "v", "f")))
            .with_technique(TechniqueDesc::new("Any"));
        let shader = Shader::new("lit", desc, &caps);

        assert_eq!(shader.techniques().len(), 3);
        assert_eq!(shader.compatible_techniques().len(), 2);
        assert_eq!(shader.core().compatible_techniques().len(), 2);
        assert_eq!(shader.compatible_techniques()[0].language(), "hlsl");
    }

    #[test]
    fn test_object_params_are_classified() {
        let desc = ShaderDesc::new()
            .with_object(ShaderObjectParamDesc::new("albedo", GpuParamObjectType::Texture))
            .with_object(ShaderObjectParamDesc::new("output", GpuParamObjectType::LoadStoreTexture))
            .with_object(ShaderObjectParamDesc::new("lights", GpuParamObjectType::Buffer))
            .with_object(ShaderObjectParamDesc::new("linear", GpuParamObjectType::Sampler));
        assert_eq!(desc.params.textures.len(), 2);
        assert_eq!(desc.params.buffers.len(), 1);
        assert!(desc.params.object("linear").is_some());
        assert!(desc.params.object("missing").is_none());
    }

    #[test]
    fn test_cloned_table_gets_new_id() {
        let table = ShaderParamTable::default();
        assert_ne!(table.clone().id(), table.id());
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_default_type_mismatch_panics() {
        let _ = ShaderDataParamDesc::new("tint", GpuParamDataType::Color).with_default(&[1.0f32]);
    }
}
