//! Size/write/read agreement and null-reference safety over randomized field values.

use std::sync::Arc;

use bsf_core::{
    CoreObject, CoreObjectCore, CoreSide, CoreSync, Counterpart, ResourceHandle, Resources, SimSide,
    SyncDomain, SyncFields, SyncPoint, SyncReader, SyncStream,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, PartialEq)]
struct Pixels(u32);

struct Tex;

impl Counterpart for Tex {
    type SimRef = Option<ResourceHandle<Pixels>>;
    type Core = Pixels;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<Pixels>> {
        sim.as_ref().and_then(ResourceHandle::get)
    }
}

#[derive(Default)]
struct Slot<D: SyncDomain> {
    index: u32,
    texture: D::Ref<Tex>,
}

impl<D: SyncDomain> SyncFields<D> for Slot<D> {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        stream.pod(&mut self.index);
        stream.reference::<Tex>(&mut self.texture);
    }
}

#[derive(Default)]
struct Record<D: SyncDomain> {
    scale: f32,
    head: D::Ref<Tex>,
    primary: Slot<D>,
    name: String,
    slots: Vec<Slot<D>>,
    weights: Vec<[f32; 4]>,
    visible: bool,
    tail: D::Ref<Tex>,
}

impl<D: SyncDomain + Default> SyncFields<D> for Record<D> {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        stream.pod(&mut self.scale);
        stream.reference::<Tex>(&mut self.head);
        stream.nested(&mut self.primary);
        stream.string(&mut self.name);
        stream.seq(&mut self.slots);
        stream.pod_vec(&mut self.weights);
        stream.flag(&mut self.visible);
        stream.reference::<Tex>(&mut self.tail);
    }
}

#[derive(Default)]
struct RecordCore {
    record: Record<CoreSide>,
}

impl CoreSync for RecordCore {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, _flags: u32) {
        self.record.visit(reader);
    }
}

struct RecordObject {
    core: CoreObjectCore<RecordCore>,
    record: Record<SimSide>,
}

impl CoreObject for RecordObject {
    type Core = RecordCore;

    fn core_object(&self) -> &CoreObjectCore<RecordCore> {
        &self.core
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<RecordCore> {
        &mut self.core
    }

    fn create_core(&self) -> RecordCore {
        RecordCore::default()
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, _flags: u32) {
        self.record.visit(stream);
    }
}

fn random_texture(rng: &mut ChaCha8Rng, resources: &Resources) -> Option<ResourceHandle<Pixels>> {
    match rng.gen_range(0..3) {
        0 => None,
        1 => Some(resources.handle::<Pixels>(&format!("unloaded{}", rng.gen::<u16>()))),
        _ => Some(ResourceHandle::loaded("loaded", Pixels(rng.gen()))),
    }
}

fn expected(handle: &Option<ResourceHandle<Pixels>>) -> Option<u32> {
    handle.as_ref().and_then(ResourceHandle::get).map(|p| p.0)
}

fn actual(core: &Option<Arc<Pixels>>) -> Option<u32> {
    core.as_ref().map(|p| p.0)
}

fn random_record(rng: &mut ChaCha8Rng, resources: &Resources) -> Record<SimSide> {
    let slot_count = rng.gen_range(0..5);
    Record {
        scale: rng.gen(),
        head: random_texture(rng, resources),
        primary: Slot { index: rng.gen(), texture: random_texture(rng, resources) },
        name: (0..rng.gen_range(0..12)).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect(),
        slots: (0..slot_count)
            .map(|_| Slot { index: rng.gen(), texture: random_texture(rng, resources) })
            .collect(),
        weights: (0..rng.gen_range(0..4)).map(|_| [rng.gen(), rng.gen(), rng.gen(), rng.gen()]).collect(),
        visible: rng.gen_bool(0.5),
        tail: random_texture(rng, resources),
    }
}

fn assert_mirrors(sim: &Record<SimSide>, core: &Record<CoreSide>) {
    assert_eq!(sim.scale.to_bits(), core.scale.to_bits());
    assert_eq!(expected(&sim.head), actual(&core.head));
    assert_eq!(sim.primary.index, core.primary.index);
    assert_eq!(expected(&sim.primary.texture), actual(&core.primary.texture));
    assert_eq!(sim.name, core.name);
    assert_eq!(sim.slots.len(), core.slots.len());
    for (s, c) in sim.slots.iter().zip(&core.slots) {
        assert_eq!(s.index, c.index);
        assert_eq!(expected(&s.texture), actual(&c.texture));
    }
    assert_eq!(sim.weights, core.weights);
    assert_eq!(sim.visible, core.visible);
    assert_eq!(expected(&sim.tail), actual(&core.tail));
}

#[test]
fn test_random_records_mirror_exactly() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let resources = Resources::new();
    let mut point = SyncPoint::with_capacity(256);

    for _ in 0..200 {
        let mut object = RecordObject {
            core: CoreObjectCore::new(),
            record: random_record(&mut rng, &resources),
        };

        let stats = point.sync_inline(&mut [&mut object]);
        assert_eq!(stats.objects, 1);

        let core = object.core();
        assert_mirrors(&object.record, &core.read().record);
    }
}

#[test]
fn test_resync_after_load_replaces_null() {
    let resources = Resources::new();
    let handle = resources.handle::<Pixels>("late.png");
    let mut object = RecordObject {
        core: CoreObjectCore::new(),
        record: Record { tail: Some(handle.clone()), ..Default::default() },
    };
    let mut point = SyncPoint::with_capacity(64);

    point.sync_inline(&mut [&mut object]);
    assert!(object.core().read().record.tail.is_none());

    resources.load(&handle, Pixels(77));
    object.mark_core_dirty(1);
    point.sync_inline(&mut [&mut object]);
    assert_eq!(actual(&object.core().read().record.tail), Some(77));
}

#[test]
fn test_coalesced_updates_match_stepwise_updates() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let resources = Resources::new();

    for _ in 0..50 {
        let updates: Vec<Record<SimSide>> =
            (0..rng.gen_range(1..6)).map(|_| random_record(&mut rng, &resources)).collect();

        let mut stepwise = RecordObject { core: CoreObjectCore::new(), record: Record::default() };
        let mut coalesced = RecordObject { core: CoreObjectCore::new(), record: Record::default() };
        let mut point = SyncPoint::with_capacity(256);

        for update in &updates {
            stepwise.record = clone_record(update);
            stepwise.mark_core_dirty(1);
            point.sync_inline(&mut [&mut stepwise]);

            coalesced.record = clone_record(update);
            coalesced.mark_core_dirty(1);
        }
        point.sync_inline(&mut [&mut coalesced]);

        let a = stepwise.core();
        let b = coalesced.core();
        let a = a.read();
        let b = b.read();
        assert_mirrors(&stepwise.record, &a.record);
        assert_mirrors(&coalesced.record, &b.record);
    }
}

fn clone_record(record: &Record<SimSide>) -> Record<SimSide> {
    Record {
        scale: record.scale,
        head: record.head.clone(),
        primary: Slot { index: record.primary.index, texture: record.primary.texture.clone() },
        name: record.name.clone(),
        slots: record.slots.iter().map(|s| Slot { index: s.index, texture: s.texture.clone() }).collect(),
        weights: record.weights.clone(),
        visible: record.visible,
        tail: record.tail.clone(),
    }
}
