//! Material state reaching the core thread: coalesced dirty state, the real
//! core thread, and GPU parameter sets built from what arrived.

use std::sync::Arc;

use bsf_core::{CoreObject, CoreThread, ResourceHandle, Resources, SyncConfig, SyncPoint};
use bsf_rendering::gpu::{GpuParamDataType, GpuParamObjectType, RenderCapabilities, Texture, TextureDesc};
use bsf_rendering::material::{
    AnimationCurve, CurveKey, Material, PassDesc, Shader, ShaderDataParamDesc, ShaderDesc,
    ShaderObjectParamDesc, TechniqueDesc,
};
use bsf_shared::{Color, Vec3};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const OFFSETS: usize = 4;

fn lit_shader() -> ResourceHandle<Shader> {
    let desc = ShaderDesc::new()
        .with_data(ShaderDataParamDesc::new("roughness", GpuParamDataType::Float1).with_default(&[0.5f32]))
        .with_data(ShaderDataParamDesc::new("tint", GpuParamDataType::Color))
        .with_data(ShaderDataParamDesc::new("offsets", GpuParamDataType::Float3).with_array_size(4))
        .with_object(ShaderObjectParamDesc::new("albedo", GpuParamObjectType::Texture))
        .with_technique(TechniqueDesc::new("hlsl").with_pass(PassDesc::graphics("hlsl", "vs", "ps")));
    let caps = RenderCapabilities::new("headless", &["hlsl"]);
    ResourceHandle::loaded("lit", Shader::new("lit", desc, &caps))
}

fn random_color(rng: &mut ChaCha8Rng) -> Color {
    Color::new(rng.gen(), rng.gen(), rng.gen(), 1.0)
}

/// Snapshot of everything the core material exposes for `lit_shader`.
#[derive(Debug, PartialEq)]
struct CoreView {
    roughness: Option<f32>,
    tint: Option<Color>,
    offsets: Vec<Option<Vec3>>,
    albedo: Option<String>,
}

fn core_view(material: &Material) -> CoreView {
    let core = material.core();
    let core = core.read();
    let params = core.params().expect("core material has params after sync");
    CoreView {
        roughness: params.get::<f32>("roughness", 0),
        tint: params.get::<Color>("tint", 0),
        offsets: (0..OFFSETS).map(|i| params.get::<Vec3>("offsets", i)).collect(),
        albedo: params.texture("albedo").and_then(|slot| slot.texture.as_ref().map(|t| t.name.clone())),
    }
}

#[test]
fn test_coalesced_sync_matches_step_by_step_sync() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xb5f);
    let resources = Resources::new();
    let shader = lit_shader();
    let textures = [
        None,
        Some(ResourceHandle::loaded("brick", Texture::new("brick", TextureDesc::default()))),
        Some(ResourceHandle::loaded("moss", Texture::new("moss", TextureDesc::default()))),
        Some(resources.handle::<Texture>("streaming")),
    ];

    for _ in 0..20 {
        let mut eager = Material::with_shader(shader.clone());
        let mut lazy = Material::with_shader(shader.clone());
        let mut eager_point = SyncPoint::with_capacity(4096);
        let mut lazy_point = SyncPoint::with_capacity(4096);

        eager_point.sync_inline(&mut [&mut eager]);
        lazy_point.sync_inline(&mut [&mut lazy]);

        let steps = rng.gen_range(1..40);
        for _ in 0..steps {
            match rng.gen_range(0..4) {
                0 => {
                    let value: f32 = rng.gen();
                    eager.set("roughness", value, 0).unwrap();
                    lazy.set("roughness", value, 0).unwrap();
                }
                1 => {
                    let value = random_color(&mut rng);
                    eager.set("tint", value, 0).unwrap();
                    lazy.set("tint", value, 0).unwrap();
                }
                2 => {
                    let index = rng.gen_range(0..OFFSETS);
                    let value = Vec3::new(rng.gen(), rng.gen(), rng.gen());
                    eager.set("offsets", value, index).unwrap();
                    lazy.set("offsets", value, index).unwrap();
                }
                _ => {
                    let texture = textures[rng.gen_range(0..textures.len())].clone();
                    eager.set_texture("albedo", texture.clone()).unwrap();
                    lazy.set_texture("albedo", texture).unwrap();
                }
            }
            eager_point.sync_inline(&mut [&mut eager]);
        }
        let stats = lazy_point.sync_inline(&mut [&mut lazy]);
        assert_eq!(stats.objects, 1);
        assert!(!lazy.core_object().is_dirty());

        assert_eq!(core_view(&eager), core_view(&lazy));
        // the core agrees with the sim side
        let view = core_view(&lazy);
        assert_eq!(view.roughness, lazy.get::<f32>("roughness", 0).ok());
        assert_eq!(view.tint, lazy.get::<Color>("tint", 0).ok());
    }
}

#[test]
fn test_material_through_core_thread() {
    let config = SyncConfig::default();
    let core_thread = CoreThread::spawn(&config).unwrap();
    let mut sync_point = SyncPoint::new(&config);

    let mut material = Material::with_shader(lit_shader());
    material.set("tint", Color::WHITE, 0).unwrap();
    material.set("offsets", Vec3::new(1.0, 2.0, 3.0), 3).unwrap();

    let mut batch = sync_point.begin();
    assert!(batch.push(&mut material));
    core_thread.submit(batch.finish()).unwrap();

    let core = material.core();
    let seen = Arc::new(Mutex::new(None));
    {
        let seen = Arc::clone(&seen);
        let core = Arc::clone(&core);
        core_thread
            .run(move || {
                let core = core.read();
                let set = core.create_params_set(core.default_technique());
                *seen.lock() = set.map(|set| (set.value::<Color>("tint", 0), set.value::<Vec3>("offsets", 3)));
            })
            .unwrap();
    }
    core_thread.flush().unwrap();

    assert_eq!(*seen.lock(), Some((Some(Color::WHITE), Some(Vec3::new(1.0, 2.0, 3.0)))));
    assert_eq!(core_thread.reclaim(&mut sync_point), 1);
    assert_eq!(sync_point.in_flight(), 0);
    core_thread.shutdown().unwrap();
}

#[test]
fn test_params_set_follows_later_syncs() {
    let mut material = Material::with_shader(lit_shader());
    let mut sync_point = SyncPoint::with_capacity(4096);
    sync_point.sync_inline(&mut [&mut material]);

    let core = material.core();
    let mut set = core.read().create_params_set(0).unwrap();
    assert_eq!(set.value::<f32>("roughness", 0), Some(0.5));
    let version = set.version();

    // no changes, no new version
    core.read().update_params_set(&mut set, 0.0, false);
    assert_eq!(set.version(), version);

    material.set("roughness", 0.25f32, 0).unwrap();
    sync_point.sync_inline(&mut [&mut material]);
    core.read().update_params_set(&mut set, 0.0, false);
    assert_eq!(set.value::<f32>("roughness", 0), Some(0.25));
    assert_ne!(set.version(), version);
}

#[test]
fn test_animated_param_evaluated_on_core() {
    let mut material = Material::with_shader(lit_shader());
    material
        .set_curve("roughness", AnimationCurve::new(vec![CurveKey::new(0.0, 0.0), CurveKey::new(1.0, 10.0)]), 0)
        .unwrap();
    assert!(material.is_animated("roughness", 0));
    SyncPoint::with_capacity(4096).sync_inline(&mut [&mut material]);

    let core = material.core();
    let core = core.read();
    let mut set = core.create_params_set(0).unwrap();
    assert_eq!(set.value::<f32>("roughness", 0), Some(0.0));

    core.update_params_set(&mut set, 0.5, false);
    let value = set.value::<f32>("roughness", 0).unwrap();
    assert!((value - 5.0).abs() < 1e-4, "got {value}");
}

#[test]
fn test_shader_swap_resyncs_techniques() {
    let mut material = Material::new();
    let mut sync_point = SyncPoint::with_capacity(4096);
    sync_point.sync_inline(&mut [&mut material]);
    assert_eq!(material.core().read().num_techniques(), 0);

    material.set_shader(Some(lit_shader()));
    sync_point.sync_inline(&mut [&mut material]);
    let core = material.core();
    let core = core.read();
    assert_eq!(core.num_techniques(), 1);
    assert_eq!(core.num_passes(0), 1);
    assert!(core.pass(0, 0).is_some());
}
