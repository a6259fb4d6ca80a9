//! Scene objects crossing to the core thread.

use std::collections::HashSet;
use std::sync::Arc;

use bsf_core::{CoreObject, CoreThread, SyncConfig, SyncPoint, TaskQueue};
use bsf_rendering::gpu::{PixelFormat, Texture, TextureDesc};
use bsf_rendering::material::Material;
use bsf_rendering::scene::{
    Actor, Aabb, AmbientBaker, ClearFlags, Decal, Light, LightProbeVolume, LightType, NormalizedRect,
    PixelRect, ProbeHandle, Viewport, MIN_PROBES,
};
use bsf_shared::{Color, IVec3, Quaternion, Transform, Vec2, Vec3};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn probe_volume(config: &SyncConfig) -> LightProbeVolume {
    LightProbeVolume::new(
        Aabb::new(Vec3::ZERO, Vec3::ONE),
        IVec3::new(1, 1, 1),
        config,
        Arc::new(AmbientBaker { color: Color::WHITE }),
    )
}

fn random_point(rng: &mut ChaCha8Rng) -> Vec3 {
    Vec3::new(rng.gen(), rng.gen(), rng.gen())
}

/// Every handle the core knows sits in a distinct slot below its live count.
fn assert_core_compact(volume: &LightProbeVolume, max_handle: ProbeHandle) {
    let core = volume.core();
    let core = core.read();
    let slots: Vec<usize> = (0..max_handle).filter_map(|handle| core.compact_index(handle)).collect();
    assert_eq!(slots.len(), core.num_probes());
    let unique: HashSet<usize> = slots.iter().copied().collect();
    assert_eq!(unique.len(), slots.len(), "two probes share a slot");
    assert!(slots.iter().all(|&slot| slot < core.num_probes()));
    assert!(core.num_slots() >= core.num_probes());
}

#[test]
fn test_probe_edits_keep_core_consistent() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x9b0be);
    let config = SyncConfig { probe_render_batch: 4, ..SyncConfig::default() };
    let sink = Mutex::new(TaskQueue::new());
    let mut volume = probe_volume(&config);
    let mut sync_point = SyncPoint::with_capacity(1 << 16);
    let mut max_handle: ProbeHandle = 8;

    for _ in 0..400 {
        let live: Vec<ProbeHandle> = volume.probes().iter().map(|p| p.handle).collect();
        match rng.gen_range(0..7) {
            0 | 1 => {
                let handle = volume.add_probe(random_point(&mut rng));
                max_handle = max_handle.max(handle + 1);
            }
            2 => {
                let handle = live[rng.gen_range(0..live.len())];
                let removed = volume.remove_probe(handle);
                assert_eq!(removed, live.len() > MIN_PROBES);
            }
            3 => {
                let handle = live[rng.gen_range(0..live.len())];
                volume.set_probe_position(handle, random_point(&mut rng));
            }
            4 => {
                let handle = live[rng.gen_range(0..live.len())];
                volume.render_probe(handle, &sink);
            }
            5 => volume.render_probes(&sink),
            _ => {
                sink.lock().run_pending();
            }
        }
        if rng.gen_bool(0.4) {
            sync_point.sync_inline(&mut [&mut volume]);
            assert_core_compact(&volume, max_handle);
        }
        assert!(volume.num_probes() >= MIN_PROBES);
    }

    // push every probe across once more and let the bake finish
    sync_point.sync_inline(&mut [&mut volume]);
    volume.render_probes(&sink);
    sync_point.sync_inline(&mut [&mut volume]);
    while sink.lock().run_pending() > 0 {}
    assert_core_compact(&volume, max_handle);

    let core = volume.core();
    let core = core.read();
    assert_eq!(core.num_probes(), volume.num_probes());
    assert_eq!(core.num_dirty(), 0);
    for probe in volume.probes() {
        assert_eq!(core.probe_position(probe.handle), Some(probe.position));
    }
}

#[test]
fn test_scene_through_core_thread() {
    let config = SyncConfig::default();
    let core_thread = CoreThread::spawn(&config).unwrap();
    let mut sync_point = SyncPoint::new(&config);

    let material = Material::new().into_shared();
    let mut decal = Decal::new(Some(Arc::clone(&material)));
    decal.set_size(Vec2::new(4.0, 2.0));
    decal.set_layer_mask(0b10);

    let mut light = Light::new(LightType::Spot);
    light.set_color(Color::new(1.0, 0.5, 0.25, 1.0));
    light.set_attenuation_radius(10.0);
    light.set_transform(Transform::new(Vec3::new(0.0, 5.0, 0.0), Quaternion::IDENTITY, Vec3::ONE));

    let target = bsf_core::ResourceHandle::loaded(
        "backbuffer",
        Texture::new("backbuffer", TextureDesc::new_2d(800, 600, PixelFormat::Rgba8)),
    );
    let mut viewport = Viewport::new(Some(target));
    viewport.set_area(NormalizedRect::new(0.5, 0.0, 0.5, 1.0));
    viewport.set_clear_flags(ClearFlags::COLOR);

    let mut volume = probe_volume(&config);
    volume.set_transform(Transform::IDENTITY.with_position(Vec3::new(10.0, 0.0, 0.0)));
    volume.render_probes(&core_thread);

    let mut batch = sync_point.begin();
    batch.push(&mut *material.write());
    batch.push(&mut decal);
    batch.push(&mut light);
    batch.push(&mut viewport);
    batch.push(&mut volume);
    core_thread.submit(batch.finish()).unwrap();
    core_thread.flush().unwrap();
    assert_eq!(core_thread.reclaim(&mut sync_point), 1);

    {
        let core = decal.core();
        let core = core.read();
        assert!(Arc::ptr_eq(core.material().unwrap(), &material.read().core()));
        assert_eq!(core.size(), Vec2::new(4.0, 2.0));
        assert!(core.affects(0b11));
    }
    {
        let core = light.core();
        let core = core.read();
        assert_eq!(core.properties().light_type, LightType::Spot);
        assert_eq!(core.actor().transform.position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(core.sync_count(), 1);
    }
    assert_eq!(viewport.core().read().pixel_area(), PixelRect { x: 400, y: 0, width: 400, height: 600 });
    assert_eq!(viewport.core().read().clear_flags(), ClearFlags::COLOR);

    // eight probes fit in one render step, run right after the batch
    assert!(volume.render_task().is_some_and(|task| task.is_complete()));
    volume.update_coefficients();
    assert_eq!(volume.core().read().num_dirty(), 0);
    assert!(volume.probes().iter().all(|p| p.coefficients.r[0] > 0.0));

    // a moved light only ships its transform
    light.set_transform(Transform::IDENTITY);
    let mut batch = sync_point.begin();
    assert!(batch.push(&mut light));
    assert!(!batch.push(&mut decal));
    let batch = batch.finish();
    assert_eq!(batch.stats().objects, 1);
    assert_eq!(batch.stats().skipped, 1);
    core_thread.submit(batch).unwrap();
    core_thread.flush().unwrap();
    assert_eq!(light.core().read().actor().transform.position, Vec3::ZERO);
    assert_eq!(light.core().read().sync_count(), 2);

    drop(volume);
    core_thread.shutdown().unwrap();
}
