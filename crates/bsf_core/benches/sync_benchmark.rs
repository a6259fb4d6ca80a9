//! # Sync Point Benchmark
//!
//! Measures one produce + apply cycle:
//! 1. Every object dirty (first frame after load)
//! 2. A fraction of objects dirty (steady state)
//!
//! Clean objects should cost a flag check and nothing else.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bsf_core::{CoreObject, CoreObjectCore, CoreSync, SimSide, SyncPoint, SyncReader, SyncSource, SyncStream};

#[derive(Default)]
struct EmitterCore {
    position: [f32; 3],
    color: [f32; 4],
    rate: f32,
}

impl CoreSync for EmitterCore {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, _flags: u32) {
        reader.pod(&mut self.position);
        reader.pod(&mut self.color);
        reader.pod(&mut self.rate);
    }
}

struct Emitter {
    core: CoreObjectCore<EmitterCore>,
    position: [f32; 3],
    color: [f32; 4],
    rate: f32,
}

impl CoreObject for Emitter {
    type Core = EmitterCore;

    fn core_object(&self) -> &CoreObjectCore<EmitterCore> {
        &self.core
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<EmitterCore> {
        &mut self.core
    }

    fn create_core(&self) -> EmitterCore {
        EmitterCore::default()
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, _flags: u32) {
        stream.pod(&mut self.position);
        stream.pod(&mut self.color);
        stream.pod(&mut self.rate);
    }
}

fn make_emitters(count: usize) -> Vec<Emitter> {
    (0..count)
        .map(|i| Emitter {
            core: CoreObjectCore::new(),
            position: [i as f32, 0.0, 0.0],
            color: [1.0; 4],
            rate: 10.0,
        })
        .collect()
}

fn sync_all(point: &mut SyncPoint, emitters: &mut [Emitter]) {
    let mut builder = point.begin();
    for emitter in emitters.iter_mut() {
        builder.push(emitter as &mut dyn SyncSource);
    }
    let alloc = builder.finish().apply();
    point.reclaim(alloc);
}

/// Every object dirty
fn bench_full_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_point_full");

    for count in [1_000, 10_000, 100_000] {
        let mut emitters = make_emitters(count);
        let mut point = SyncPoint::with_capacity(count * 64);
        sync_all(&mut point, &mut emitters);

        group.bench_with_input(BenchmarkId::new("all_dirty", count), &count, |b, _| {
            b.iter(|| {
                for emitter in &mut emitters {
                    emitter.mark_core_dirty(1);
                }
                sync_all(&mut point, black_box(&mut emitters));
            });
        });
    }

    group.finish();
}

/// A fraction of objects dirty
fn bench_sparse_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_point_sparse");
    let count = 100_000;

    for dirty_pct in [1, 5, 25] {
        let dirty_count = count * dirty_pct / 100;
        let mut emitters = make_emitters(count);
        let mut point = SyncPoint::with_capacity(count * 64);
        sync_all(&mut point, &mut emitters);

        group.bench_with_input(BenchmarkId::new("dirty_pct", dirty_pct), &dirty_pct, |b, _| {
            b.iter(|| {
                for emitter in emitters.iter_mut().take(dirty_count) {
                    emitter.rate += 1.0;
                    emitter.mark_core_dirty(1);
                }
                sync_all(&mut point, black_box(&mut emitters));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_sync, bench_sparse_sync);
criterion_main!(benches);
