//! # Light Probe Volume
//!
//! A grid of irradiance probes, baked a few at a time on the core thread.
//!
//! ## Probe Lifecycle (sim side)
//!
//! ```text
//!   add_probe ──► Clean ──render_probe(s)──► Dirty ──sync──► Clean
//!                   │                          │
//!                   └──remove_probe / clip──►  Removed ──sync──► gone
//! ```
//!
//! Only Dirty and Removed probes travel in a snapshot. A probe moved while
//! Clean reaches the core the next time it is rendered.
//!
//! ## Compact Array (core side)
//!
//! ```text
//!   slots:  [ live | live | live | live | empty | empty ]
//!             0      1      2      3      ▲
//!                                         └── probe_map.len()
//! ```
//!
//! Live probes are always contiguous. Removing one swaps the last live probe
//! into its slot; adding one reuses the first empty slot before growing.
//! Each slot keeps its coefficient buffer index when it moves.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bsf_core::{
    CoreObject, CoreObjectCore, CoreSync, RendererTask, SimSide, SyncConfig, SyncReader,
    SyncStream, TaskSink,
};
use bsf_shared::{Color, IVec3, Vec3};
use bytemuck::{Pod, Zeroable};

use super::actor::{Actor, ActorDirtyFlags, SceneActor};

/// A volume never has fewer live probes than this.
pub const MIN_PROBES: usize = 4;

/// Handle of a probe inside its volume.
pub type ProbeHandle = u32;

/// State of a single probe.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightProbeFlags {
    /// Up to date.
    Clean = 0,
    /// Needs to be rendered.
    Dirty = 1,
    /// Removed on the sim side, not yet on the core.
    Removed = 2,
    /// Unused core slot.
    Empty = 3,
}

/// Third order spherical harmonics, per color channel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ShCoefficients {
    /// Red channel.
    pub r: [f32; 9],
    /// Green channel.
    pub g: [f32; 9],
    /// Blue channel.
    pub b: [f32; 9],
}

/// Axis aligned box.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Extent along every axis.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns true if `p` is inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

/// Produces the irradiance at a point. Runs on the core thread.
pub trait ProbeBaker: Send + Sync {
    /// Captures and projects the lighting at world position `position`.
    fn bake(&self, position: Vec3) -> ShCoefficients;
}

/// Bakes a constant environment color into the first SH band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientBaker {
    /// Radiance arriving from every direction.
    pub color: Color,
}

impl AmbientBaker {
    /// Projection of a constant function onto the first SH basis, `2 * sqrt(pi)`.
    const L0: f32 = 3.544_907_7;
}

impl ProbeBaker for AmbientBaker {
    fn bake(&self, _position: Vec3) -> ShCoefficients {
        let mut out = ShCoefficients::default();
        out.r[0] = self.color.r * Self::L0;
        out.g[0] = self.color.g * Self::L0;
        out.b[0] = self.color.b * Self::L0;
        out
    }
}

/// Public view of one probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightProbeInfo {
    /// Probe handle.
    pub handle: ProbeHandle,
    /// Position relative to the volume.
    pub position: Vec3,
    /// Coefficients as of the last [`LightProbeVolume::update_coefficients`].
    pub coefficients: ShCoefficients,
}

#[derive(Clone, Copy, Debug)]
struct ProbeInfo {
    flags: LightProbeFlags,
    position: Vec3,
    coefficients: ShCoefficients,
}

/// One probe in a snapshot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct ProbeUpdate {
    handle: u32,
    position: Vec3,
}

// ============================================================================
// SIM
// ============================================================================

/// Sim-thread light probe volume.
pub struct LightProbeVolume {
    object: CoreObjectCore<CoreLightProbeVolume>,
    actor: SceneActor,
    volume: Aabb,
    cell_count: IVec3,
    probes: BTreeMap<ProbeHandle, ProbeInfo>,
    next_probe_id: ProbeHandle,
    baker: Arc<dyn ProbeBaker>,
    render_batch: usize,
    task: Option<Arc<RendererTask>>,
}

impl std::fmt::Debug for LightProbeVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightProbeVolume")
            .field("id", &self.object.id())
            .field("volume", &self.volume)
            .field("cell_count", &self.cell_count)
            .field("probes", &self.probes.len())
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl LightProbeVolume {
    /// Creates a volume with one probe at every grid corner of `volume`.
    ///
    /// `cell_count` components below one count as one.
    #[must_use]
    pub fn new(volume: Aabb, cell_count: IVec3, config: &SyncConfig, baker: Arc<dyn ProbeBaker>) -> Self {
        let mut probe_volume = Self {
            object: CoreObjectCore::new(),
            actor: SceneActor::default(),
            volume,
            cell_count,
            probes: BTreeMap::new(),
            next_probe_id: 0,
            baker,
            render_batch: config.probe_render_batch.max(1),
            task: None,
        };
        probe_volume.reset();
        probe_volume
    }

    /// Bounds of the grid.
    #[must_use]
    pub const fn volume(&self) -> &Aabb {
        &self.volume
    }

    /// Grid cells along every axis.
    #[must_use]
    pub const fn cell_count(&self) -> IVec3 {
        self.cell_count
    }

    /// Probes that are not removed.
    #[must_use]
    pub fn num_probes(&self) -> usize {
        self.probes.values().filter(|p| is_live(p.flags)).count()
    }

    /// Adds a probe at `position` and returns its handle.
    pub fn add_probe(&mut self, position: Vec3) -> ProbeHandle {
        let handle = self.next_probe_id;
        self.next_probe_id += 1;
        self.probes.insert(
            handle,
            ProbeInfo { flags: LightProbeFlags::Clean, position, coefficients: ShCoefficients::default() },
        );
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
        handle
    }

    /// Removes a probe. Refused when only [`MIN_PROBES`] remain.
    ///
    /// Returns true if the probe was removed.
    pub fn remove_probe(&mut self, handle: ProbeHandle) -> bool {
        if self.num_probes() <= MIN_PROBES {
            return false;
        }
        match self.probes.get_mut(&handle) {
            Some(probe) if is_live(probe.flags) => {
                probe.flags = LightProbeFlags::Removed;
                self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
                true
            }
            _ => false,
        }
    }

    /// Moves a probe. Takes effect on the core when the probe is next rendered.
    pub fn set_probe_position(&mut self, handle: ProbeHandle, position: Vec3) {
        if let Some(probe) = self.probes.get_mut(&handle) {
            probe.position = position;
            self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
        }
    }

    /// Position of a probe, relative to the volume.
    #[must_use]
    pub fn probe_position(&self, handle: ProbeHandle) -> Option<Vec3> {
        self.probes.get(&handle).filter(|p| is_live(p.flags)).map(|p| p.position)
    }

    /// Every probe that is not removed, in handle order.
    #[must_use]
    pub fn probes(&self) -> Vec<LightProbeInfo> {
        self.probes
            .iter()
            .filter(|(_, p)| is_live(p.flags))
            .map(|(&handle, p)| LightProbeInfo { handle, position: p.position, coefficients: p.coefficients })
            .collect()
    }

    /// Changes the grid and lays the probes out again.
    pub fn resize(&mut self, volume: Aabb, cell_count: IVec3) {
        self.volume = volume;
        self.cell_count = cell_count;
        self.reset();
    }

    /// Places probes on the grid corners, adding probes as needed and
    /// removing any extra ones.
    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn reset(&mut self) {
        let nx = self.cell_count.x.max(1) as usize + 1;
        let ny = self.cell_count.y.max(1) as usize + 1;
        let nz = self.cell_count.z.max(1) as usize + 1;
        let needed = nx * ny * nz;

        while self.probes.len() < needed {
            self.add_probe(Vec3::ZERO);
        }

        let min = self.volume.min;
        let size = self.volume.size();
        for (idx, probe) in self.probes.values_mut().enumerate() {
            if idx >= needed {
                probe.flags = LightProbeFlags::Removed;
                continue;
            }
            let x = idx % nx;
            let y = (idx / nx) % ny;
            let z = idx / (nx * ny);
            probe.position = Vec3::new(
                min.x + size.x * (x as f32 / (nx - 1) as f32),
                min.y + size.y * (y as f32 / (ny - 1) as f32),
                min.z + size.z * (z as f32 / (nz - 1) as f32),
            );
            probe.flags = LightProbeFlags::Clean;
        }

        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Removes every probe outside the volume.
    pub fn clip(&mut self) {
        let volume = self.volume;
        for probe in self.probes.values_mut() {
            if is_live(probe.flags) && !volume.contains(probe.position) {
                probe.flags = LightProbeFlags::Removed;
            }
        }
        self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
    }

    /// Queues one probe for rendering. Ignored unless the probe is Clean.
    pub fn render_probe(&mut self, handle: ProbeHandle, sink: &dyn TaskSink) {
        let Some(probe) = self.probes.get_mut(&handle) else {
            return;
        };
        if probe.flags == LightProbeFlags::Clean {
            probe.flags = LightProbeFlags::Dirty;
            self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
            self.run_render_task(sink);
        }
    }

    /// Queues every Clean probe for rendering.
    pub fn render_probes(&mut self, sink: &dyn TaskSink) {
        let mut any = false;
        for probe in self.probes.values_mut() {
            if probe.flags == LightProbeFlags::Clean {
                probe.flags = LightProbeFlags::Dirty;
                any = true;
            }
        }
        if any {
            self.mark_core_dirty(ActorDirtyFlags::EVERYTHING.bits());
            self.run_render_task(sink);
        }
    }

    /// Current render task, if one was started.
    #[must_use]
    pub fn render_task(&self) -> Option<&Arc<RendererTask>> {
        self.task.as_ref()
    }

    /// Returns true while a render task is queued or running.
    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.state().is_finished())
    }

    fn run_render_task(&mut self, sink: &dyn TaskSink) {
        // A cancelled task leaves the core's dirty probes in place; the new task picks them up
        if let Some(task) = self.task.take() {
            task.cancel();
        }

        let core = self.core();
        let batch = self.render_batch;
        let task = RendererTask::new("RenderLightProbes", move || core.write().render_probes(batch));
        sink.queue_task(Arc::clone(&task));
        self.task = Some(task);
    }

    /// Copies baked coefficients back from the core.
    ///
    /// Blocks until the current render task finishes. The snapshot carrying
    /// the rendered probes must already have been applied.
    pub fn update_coefficients(&mut self) {
        if let Some(task) = &self.task {
            task.wait();
        }
        let core = self.core();
        for (handle, coefficients) in core.read().probe_coefficients() {
            if let Some(probe) = self.probes.get_mut(&handle) {
                probe.coefficients = coefficients;
            }
        }
    }
}

impl Drop for LightProbeVolume {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}

#[inline]
fn is_live(flags: LightProbeFlags) -> bool {
    matches!(flags, LightProbeFlags::Clean | LightProbeFlags::Dirty)
}

impl Actor for LightProbeVolume {
    fn actor(&self) -> &SceneActor {
        &self.actor
    }

    fn actor_mut(&mut self) -> &mut SceneActor {
        &mut self.actor
    }
}

impl CoreObject for LightProbeVolume {
    type Core = CoreLightProbeVolume;

    fn core_object(&self) -> &CoreObjectCore<CoreLightProbeVolume> {
        &self.object
    }

    fn core_object_mut(&mut self) -> &mut CoreObjectCore<CoreLightProbeVolume> {
        &mut self.object
    }

    fn create_core(&self) -> CoreLightProbeVolume {
        let live = self.probes.iter().filter(|(_, p)| is_live(p.flags));
        CoreLightProbeVolume::new(
            live.map(|(&handle, p)| (handle, p.position, p.coefficients)),
            Arc::clone(&self.baker),
        )
    }

    fn write_sync<S: SyncStream<SimSide>>(&mut self, stream: &mut S, _flags: u32) {
        stream.nested(&mut self.actor);

        let mut dirty: Vec<ProbeUpdate> = self
            .probes
            .iter()
            .filter(|(_, p)| p.flags == LightProbeFlags::Dirty)
            .map(|(&handle, p)| ProbeUpdate { handle, position: p.position })
            .collect();
        let mut removed: Vec<u32> = self
            .probes
            .iter()
            .filter(|(_, p)| p.flags == LightProbeFlags::Removed)
            .map(|(&handle, _)| handle)
            .collect();

        stream.pod_vec(&mut dirty);
        stream.pod_vec(&mut removed);
    }

    fn after_sync(&mut self, _flags: u32) {
        self.probes.retain(|_, p| p.flags != LightProbeFlags::Removed);
        for probe in self.probes.values_mut() {
            if probe.flags == LightProbeFlags::Dirty {
                probe.flags = LightProbeFlags::Clean;
            }
        }
    }
}

// ============================================================================
// CORE
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct CoreProbeInfo {
    flags: LightProbeFlags,
    handle: ProbeHandle,
    buffer_idx: usize,
}

/// Core-thread light probe volume.
pub struct CoreLightProbeVolume {
    actor: SceneActor,
    probe_map: HashMap<ProbeHandle, usize>,
    positions: Vec<Vec3>,
    infos: Vec<CoreProbeInfo>,
    coefficients: Vec<ShCoefficients>,
    first_dirty: usize,
    baker: Arc<dyn ProbeBaker>,
}

impl std::fmt::Debug for CoreLightProbeVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreLightProbeVolume")
            .field("probes", &self.probe_map.len())
            .field("slots", &self.infos.len())
            .field("first_dirty", &self.first_dirty)
            .finish_non_exhaustive()
    }
}

impl CoreLightProbeVolume {
    /// Creates the core volume. Every initial probe starts Dirty.
    pub fn new(
        probes: impl IntoIterator<Item = (ProbeHandle, Vec3, ShCoefficients)>,
        baker: Arc<dyn ProbeBaker>,
    ) -> Self {
        let mut volume = Self {
            actor: SceneActor::default(),
            probe_map: HashMap::new(),
            positions: Vec::new(),
            infos: Vec::new(),
            coefficients: Vec::new(),
            first_dirty: 0,
            baker,
        };
        for (handle, position, coefficients) in probes {
            let idx = volume.infos.len();
            volume.probe_map.insert(handle, idx);
            volume.positions.push(position);
            volume.infos.push(CoreProbeInfo { flags: LightProbeFlags::Dirty, handle, buffer_idx: idx });
            volume.coefficients.push(coefficients);
        }
        volume
    }

    /// Placement as of the last sync.
    #[must_use]
    pub const fn actor(&self) -> &SceneActor {
        &self.actor
    }

    /// Live probes.
    #[must_use]
    pub fn num_probes(&self) -> usize {
        self.probe_map.len()
    }

    /// Allocated slots, live and empty.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.infos.len()
    }

    /// Slot a probe occupies.
    #[must_use]
    pub fn compact_index(&self, handle: ProbeHandle) -> Option<usize> {
        self.probe_map.get(&handle).copied()
    }

    /// Local position of a probe.
    #[must_use]
    pub fn probe_position(&self, handle: ProbeHandle) -> Option<Vec3> {
        self.compact_index(handle).map(|idx| self.positions[idx])
    }

    /// Probes waiting to be rendered.
    #[must_use]
    pub fn num_dirty(&self) -> usize {
        self.infos.iter().filter(|info| info.flags == LightProbeFlags::Dirty).count()
    }

    /// Coefficients of every live probe.
    #[must_use]
    pub fn probe_coefficients(&self) -> Vec<(ProbeHandle, ShCoefficients)> {
        self.infos[..self.probe_map.len()]
            .iter()
            .map(|info| (info.handle, self.coefficients[info.buffer_idx]))
            .collect()
    }

    /// Renders up to `max_probes` dirty probes, all of them if zero.
    ///
    /// Returns true when no dirty probe remains.
    pub fn render_probes(&mut self, max_probes: usize) -> bool {
        let mut rendered = 0;
        while self.first_dirty < self.infos.len() {
            let idx = self.first_dirty;
            if self.infos[idx].flags == LightProbeFlags::Dirty {
                if max_probes != 0 && rendered >= max_probes {
                    break;
                }
                let world = self.actor.transform.transform_point(self.positions[idx]);
                let buffer_idx = self.infos[idx].buffer_idx;
                self.coefficients[buffer_idx] = self.baker.bake(world);
                self.infos[idx].flags = LightProbeFlags::Clean;
                rendered += 1;
            }
            self.first_dirty += 1;
        }

        if rendered > 0 {
            tracing::debug!("Rendered {} light probes, {} remaining", rendered, self.num_dirty());
        }
        self.first_dirty == self.infos.len()
    }

    fn upsert_probe(&mut self, handle: ProbeHandle, position: Vec3) {
        if let Some(&idx) = self.probe_map.get(&handle) {
            self.infos[idx].flags = LightProbeFlags::Dirty;
            self.positions[idx] = position;
            self.first_dirty = self.first_dirty.min(idx);
            return;
        }

        // Live probes fill 0..len, so the first empty slot sits right after them
        let idx = self.probe_map.len();
        if idx < self.infos.len() {
            debug_assert_eq!(self.infos[idx].flags, LightProbeFlags::Empty);
            let info = &mut self.infos[idx];
            info.flags = LightProbeFlags::Dirty;
            info.handle = handle;
            self.positions[idx] = position;
        } else {
            self.infos.push(CoreProbeInfo {
                flags: LightProbeFlags::Dirty,
                handle,
                buffer_idx: self.coefficients.len(),
            });
            self.positions.push(position);
            self.coefficients.push(ShCoefficients::default());
        }

        self.probe_map.insert(handle, idx);
        self.first_dirty = self.first_dirty.min(idx);
    }

    fn remove_probe(&mut self, handle: ProbeHandle) {
        let Some(idx) = self.probe_map.remove(&handle) else {
            return;
        };
        self.infos[idx].flags = LightProbeFlags::Empty;

        let last = self.probe_map.len();
        if last != idx {
            self.infos.swap(idx, last);
            self.positions.swap(idx, last);
            let moved = self.infos[idx];
            self.probe_map.insert(moved.handle, idx);
            if moved.flags == LightProbeFlags::Dirty {
                self.first_dirty = self.first_dirty.min(idx);
            }
        }
    }
}

impl CoreSync for CoreLightProbeVolume {
    fn read_sync(&mut self, reader: &mut SyncReader<'_>, _flags: u32) {
        reader.nested(&mut self.actor);

        let mut dirty: Vec<ProbeUpdate> = Vec::new();
        let mut removed: Vec<u32> = Vec::new();
        reader.pod_vec(&mut dirty);
        reader.pod_vec(&mut removed);

        for update in dirty {
            self.upsert_probe(update.handle, update.position);
        }
        for handle in removed {
            self.remove_probe(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsf_core::{SyncPoint, TaskQueue};
    use parking_lot::Mutex;

    fn unit_volume() -> LightProbeVolume {
        LightProbeVolume::new(
            Aabb::new(Vec3::ZERO, Vec3::ONE),
            IVec3::new(1, 1, 1),
            &SyncConfig::default(),
            Arc::new(AmbientBaker { color: Color::WHITE }),
        )
    }

    #[test]
    fn test_reset_fills_grid_corners() {
        let volume = unit_volume();
        let probes = volume.probes();
        assert_eq!(probes.len(), 8);
        assert_eq!(probes[0].position, Vec3::ZERO);
        assert_eq!(probes[7].position, Vec3::ONE);
    }

    #[test]
    fn test_minimum_probe_count_enforced() {
        let mut volume = unit_volume();
        for handle in 0..4 {
            assert!(volume.remove_probe(handle));
        }
        assert!(!volume.remove_probe(4));
        assert_eq!(volume.num_probes(), MIN_PROBES);
    }

    #[test]
    fn test_resize_removes_extra_probes() {
        let mut volume = unit_volume();
        volume.resize(Aabb::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0)), IVec3::new(2, 1, 1));
        assert_eq!(volume.num_probes(), 12);

        volume.resize(Aabb::new(Vec3::ZERO, Vec3::ONE), IVec3::new(1, 1, 1));
        assert_eq!(volume.num_probes(), 8);

        SyncPoint::with_capacity(1024).sync_inline(&mut [&mut volume]);
        assert_eq!(volume.probes.len(), 8);
    }

    #[test]
    fn test_clip_removes_outside_probes() {
        let mut volume = unit_volume();
        volume.set_probe_position(3, Vec3::new(5.0, 0.0, 0.0));
        volume.clip();
        assert_eq!(volume.num_probes(), 7);
        assert!(volume.probe_position(3).is_none());
    }

    #[test]
    fn test_render_in_batches_then_read_back() {
        let sink = Mutex::new(TaskQueue::new());
        let config = SyncConfig { probe_render_batch: 3, ..SyncConfig::default() };
        let mut volume = LightProbeVolume::new(
            Aabb::new(Vec3::ZERO, Vec3::ONE),
            IVec3::new(1, 1, 1),
            &config,
            Arc::new(AmbientBaker { color: Color::WHITE }),
        );

        volume.render_probes(&sink);
        SyncPoint::with_capacity(1024).sync_inline(&mut [&mut volume]);

        // 8 probes, 3 per step
        assert_eq!(sink.lock().run_pending(), 1);
        assert_eq!(volume.core().read().num_dirty(), 5);
        assert_eq!(sink.lock().run_pending(), 1);
        assert_eq!(sink.lock().run_pending(), 0);
        assert!(volume.render_task().is_some_and(|task| task.is_complete()));

        volume.update_coefficients();
        for probe in volume.probes() {
            assert!((probe.coefficients.r[0] - AmbientBaker::L0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rerender_cancels_previous_task() {
        let sink = Mutex::new(TaskQueue::new());
        let mut volume = unit_volume();
        volume.render_probe(0, &sink);
        let first = Arc::clone(volume.render_task().unwrap());

        volume.render_probe(1, &sink);
        assert!(first.is_cancelled());
        assert!(volume.is_rendering());
        // clean probes only
        volume.render_probe(1, &sink);
        assert_eq!(sink.lock().len(), 2);
    }

    #[test]
    fn test_drop_cancels_task() {
        let sink = Mutex::new(TaskQueue::new());
        let mut volume = unit_volume();
        volume.render_probes(&sink);
        let task = Arc::clone(volume.render_task().unwrap());
        drop(volume);
        assert!(task.is_cancelled());
        assert_eq!(sink.lock().run_pending(), 0);
    }

    #[test]
    fn test_core_removal_keeps_array_compact() {
        let mut volume = unit_volume();
        let mut sync_point = SyncPoint::with_capacity(1024);
        sync_point.sync_inline(&mut [&mut volume]);
        assert_eq!(volume.core().read().num_probes(), 8);

        assert!(volume.remove_probe(2));
        sync_point.sync_inline(&mut [&mut volume]);
        {
            let core = volume.core();
            let core = core.read();
            assert_eq!(core.num_probes(), 7);
            assert_eq!(core.num_slots(), 8);
            assert_eq!(core.compact_index(2), None);
            assert_eq!(core.compact_index(7), Some(2));
            assert_eq!(core.probe_position(7), Some(Vec3::ONE));
        }

        let sink = Mutex::new(TaskQueue::new());
        let handle = volume.add_probe(Vec3::new(0.5, 0.5, 0.5));
        volume.render_probe(handle, &sink);
        sync_point.sync_inline(&mut [&mut volume]);

        let core = volume.core();
        let core = core.read();
        assert_eq!(core.num_probes(), 8);
        assert_eq!(core.num_slots(), 8);
        assert_eq!(core.compact_index(handle), Some(7));
    }

    #[test]
    fn test_render_uses_volume_transform() {
        struct PositionBaker;
        impl ProbeBaker for PositionBaker {
            fn bake(&self, position: Vec3) -> ShCoefficients {
                let mut out = ShCoefficients::default();
                out.r[0] = position.x;
                out
            }
        }

        let mut volume = LightProbeVolume::new(
            Aabb::new(Vec3::ZERO, Vec3::ONE),
            IVec3::new(1, 1, 1),
            &SyncConfig::default(),
            Arc::new(PositionBaker),
        );
        volume.set_transform(bsf_shared::Transform::IDENTITY.with_position(Vec3::new(10.0, 0.0, 0.0)));
        SyncPoint::with_capacity(1024).sync_inline(&mut [&mut volume]);

        let core = volume.core();
        assert!(core.write().render_probes(0));
        let coefficients = core.read().probe_coefficients();
        assert_eq!(coefficients[0].1.r[0], 10.0);
        assert_eq!(coefficients[7].1.r[0], 11.0);
    }
}
