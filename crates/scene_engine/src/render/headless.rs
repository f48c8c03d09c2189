//! In-process render device
//!
//! [`HeadlessDevice`] keeps handle tables instead of GPU objects, counts
//! every creation and destruction, and simulates occlusion queries by adding
//! a configurable sample count for each draw issued while a query is open.
//! It backs tests and tools that run the pipeline without a GPU.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::device::{
    BufferHandle, BufferUsage, DeviceResult, DrawCall, Primitive, QueryHandle, RenderDevice,
    RenderError, ShaderHandle, ShaderSource, TargetDesc, TargetHandle,
};
use crate::scene::MaterialId;
use crate::spatial::Aabb;

/// Resource kinds used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Shader programs
    Shader,
    /// Buffers
    Buffer,
    /// Occlusion queries
    Query,
    /// Render targets
    Target,
}

/// Counters collected by [`HeadlessDevice`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Shaders compiled
    pub shaders_created: usize,
    /// Shaders destroyed
    pub shaders_destroyed: usize,
    /// Buffers created
    pub buffers_created: usize,
    /// Buffers destroyed
    pub buffers_destroyed: usize,
    /// Buffer writes after creation
    pub buffer_writes: usize,
    /// Queries created
    pub queries_created: usize,
    /// Queries destroyed
    pub queries_destroyed: usize,
    /// Queries begun
    pub queries_begun: usize,
    /// Queries ended
    pub queries_ended: usize,
    /// Targets created
    pub targets_created: usize,
    /// Targets destroyed
    pub targets_destroyed: usize,
    /// Target clears
    pub clears: usize,
    /// Draw calls
    pub draw_calls: usize,
    /// Instances submitted across all draw calls
    pub instances_drawn: usize,
    /// Bounding proxies drawn
    pub proxy_draws: usize,
    /// Full-screen passes drawn
    pub fullscreen_draws: usize,
    /// Destroy calls naming a handle that was not live
    pub invalid_destroys: usize,
}

/// A recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Program used
    pub shader: ShaderHandle,
    /// Geometry drawn
    pub primitive: Primitive,
    /// Material slot
    pub material: Option<MaterialId>,
    /// Instance count
    pub instances: usize,
}

#[derive(Debug, Default)]
struct QueryRecord {
    open: bool,
    samples: u64,
    ready: bool,
}

#[derive(Debug)]
struct HeadlessState {
    shaders: HashMap<u64, String>,
    buffers: HashMap<u64, (BufferUsage, usize)>,
    queries: HashMap<u64, QueryRecord>,
    targets: HashMap<u64, TargetDesc>,
    bound_target: Option<TargetHandle>,
    materials: Option<BufferHandle>,
    fragments_per_draw: u64,
    defer_results: bool,
    failures: Vec<ResourceKind>,
    draws: Vec<DrawRecord>,
    last_clear: Option<(TargetHandle, Vec<[f32; 4]>, Option<f32>)>,
    stats: DeviceStats,
}

impl HeadlessState {
    fn take_failure(&mut self, kind: ResourceKind) -> DeviceResult<()> {
        match self.failures.iter().position(|k| *k == kind) {
            Some(index) => {
                self.failures.remove(index);
                Err(RenderError::ResourceCreationFailed(format!("{kind:?} creation failed")))
            }
            None => Ok(()),
        }
    }

    fn add_samples(&mut self, draws: u64) {
        let samples = self.fragments_per_draw.saturating_mul(draws);
        for query in self.queries.values_mut().filter(|q| q.open) {
            query.samples = query.samples.saturating_add(samples);
        }
    }
}

/// Render device that runs without a GPU
#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: AtomicU64,
    state: Mutex<HeadlessState>,
}

impl HeadlessDevice {
    /// Create a device whose draws produce 100 samples each
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(HeadlessState {
                shaders: HashMap::new(),
                buffers: HashMap::new(),
                queries: HashMap::new(),
                targets: HashMap::new(),
                bound_target: None,
                materials: None,
                fragments_per_draw: 100,
                defer_results: false,
                failures: Vec::new(),
                draws: Vec::new(),
                last_clear: None,
                stats: DeviceStats::default(),
            }),
        }
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Samples each draw adds to open queries
    pub fn set_fragments(&self, fragments: u64) {
        self.state.lock().fragments_per_draw = fragments;
    }

    /// Keep query results unavailable until [`HeadlessDevice::resolve_queries`]
    pub fn set_deferred_results(&self, deferred: bool) {
        self.state.lock().defer_results = deferred;
    }

    /// Make every ended query readable
    pub fn resolve_queries(&self) {
        for query in self.state.lock().queries.values_mut().filter(|q| !q.open) {
            query.ready = true;
        }
    }

    /// Fail the next creation of `kind`
    pub fn fail_next(&self, kind: ResourceKind) {
        self.state.lock().failures.push(kind);
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> DeviceStats {
        self.state.lock().stats
    }

    /// Drain recorded draw calls
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.state.lock().draws)
    }

    /// Live shader count
    pub fn live_shaders(&self) -> usize {
        self.state.lock().shaders.len()
    }

    /// Live buffer count
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Size in bytes of a live buffer
    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.state.lock().buffers.get(&buffer.0).map(|(_, len)| *len)
    }

    /// Live query count
    pub fn live_queries(&self) -> usize {
        self.state.lock().queries.len()
    }

    /// Description of a live target
    pub fn target(&self, target: TargetHandle) -> Option<TargetDesc> {
        self.state.lock().targets.get(&target.0).cloned()
    }

    /// Live target count
    pub fn live_targets(&self) -> usize {
        self.state.lock().targets.len()
    }

    /// Currently bound target
    pub fn bound_target(&self) -> Option<TargetHandle> {
        self.state.lock().bound_target
    }

    /// Currently bound material buffer
    pub fn bound_materials(&self) -> Option<BufferHandle> {
        self.state.lock().materials
    }

    /// Arguments of the most recent clear
    pub fn last_clear(&self) -> Option<(TargetHandle, Vec<[f32; 4]>, Option<f32>)> {
        self.state.lock().last_clear.clone()
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_shader(&self, source: &ShaderSource) -> DeviceResult<ShaderHandle> {
        let mut state = self.state.lock();
        state.take_failure(ResourceKind::Shader)?;
        if source.code.trim().is_empty() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "shader '{}' has no code",
                source.label
            )));
        }
        let id = self.allocate();
        state.shaders.insert(id, source.label.clone());
        state.stats.shaders_created += 1;
        Ok(ShaderHandle(id))
    }

    fn destroy_shader(&self, shader: ShaderHandle) {
        let mut state = self.state.lock();
        if state.shaders.remove(&shader.0).is_some() {
            state.stats.shaders_destroyed += 1;
        } else {
            state.stats.invalid_destroys += 1;
        }
    }

    fn create_buffer(&self, usage: BufferUsage, data: &[u8]) -> DeviceResult<BufferHandle> {
        let mut state = self.state.lock();
        state.take_failure(ResourceKind::Buffer)?;
        let id = self.allocate();
        state.buffers.insert(id, (usage, data.len()));
        state.stats.buffers_created += 1;
        Ok(BufferHandle(id))
    }

    fn write_buffer(&self, buffer: BufferHandle, data: &[u8]) -> DeviceResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or(RenderError::InvalidHandle(buffer.0))?;
        entry.1 = data.len();
        state.stats.buffer_writes += 1;
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer.0).is_some() {
            state.stats.buffers_destroyed += 1;
        } else {
            state.stats.invalid_destroys += 1;
        }
    }

    fn create_query(&self) -> DeviceResult<QueryHandle> {
        let mut state = self.state.lock();
        state.take_failure(ResourceKind::Query)?;
        let id = self.allocate();
        state.queries.insert(id, QueryRecord::default());
        state.stats.queries_created += 1;
        Ok(QueryHandle(id))
    }

    fn destroy_query(&self, query: QueryHandle) {
        let mut state = self.state.lock();
        if state.queries.remove(&query.0).is_some() {
            state.stats.queries_destroyed += 1;
        } else {
            state.stats.invalid_destroys += 1;
        }
    }

    fn begin_query(&self, query: QueryHandle) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(record) = state.queries.get_mut(&query.0) {
            *record = QueryRecord {
                open: true,
                samples: 0,
                ready: false,
            };
            state.stats.queries_begun += 1;
        }
    }

    fn end_query(&self, query: QueryHandle) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let ready = !state.defer_results;
        if let Some(record) = state.queries.get_mut(&query.0) {
            record.open = false;
            record.ready = ready;
            state.stats.queries_ended += 1;
        }
    }

    fn query_result(&self, query: QueryHandle) -> Option<u64> {
        let state = self.state.lock();
        state
            .queries
            .get(&query.0)
            .filter(|q| q.ready && !q.open)
            .map(|q| q.samples)
    }

    fn create_target(&self, desc: &TargetDesc) -> DeviceResult<TargetHandle> {
        let mut state = self.state.lock();
        state.take_failure(ResourceKind::Target)?;
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "target size {}x{}",
                desc.width, desc.height
            )));
        }
        let id = self.allocate();
        state.targets.insert(id, desc.clone());
        state.stats.targets_created += 1;
        Ok(TargetHandle(id))
    }

    fn destroy_target(&self, target: TargetHandle) {
        let mut state = self.state.lock();
        if state.targets.remove(&target.0).is_some() {
            state.stats.targets_destroyed += 1;
            if state.bound_target == Some(target) {
                state.bound_target = None;
            }
        } else {
            state.stats.invalid_destroys += 1;
        }
    }

    fn bind_target(&self, target: Option<TargetHandle>) {
        self.state.lock().bound_target = target;
    }

    fn clear_target(&self, target: TargetHandle, colors: &[[f32; 4]], depth: Option<f32>) {
        let mut state = self.state.lock();
        state.stats.clears += 1;
        state.last_clear = Some((target, colors.to_vec(), depth));
    }

    fn bind_materials(&self, buffer: BufferHandle) {
        self.state.lock().materials = Some(buffer);
    }

    fn draw(&self, call: &DrawCall<'_>) {
        let mut state = self.state.lock();
        let instances = call.transforms.len().max(1);
        state.stats.draw_calls += 1;
        state.stats.instances_drawn += instances;
        state.add_samples(instances as u64);
        state.draws.push(DrawRecord {
            shader: call.shader,
            primitive: call.primitive,
            material: call.material,
            instances,
        });
    }

    fn draw_proxy(&self, _bounds: &Aabb, _transform: &[f32; 16]) {
        let mut state = self.state.lock();
        state.stats.proxy_draws += 1;
        state.add_samples(1);
    }

    fn draw_fullscreen(&self, _shader: ShaderHandle) {
        self.state.lock().stats.fullscreen_draws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_counts_samples_of_enclosed_draws() {
        let device = HeadlessDevice::new();
        device.set_fragments(7);
        let query = device.create_query().unwrap();

        device.begin_query(query);
        device.draw_proxy(&Aabb::unit(), &[0.0; 16]);
        device.draw_proxy(&Aabb::unit(), &[0.0; 16]);
        assert_eq!(device.query_result(query), None);
        device.end_query(query);

        assert_eq!(device.query_result(query), Some(14));
    }

    #[test]
    fn test_deferred_results_wait_for_resolve() {
        let device = HeadlessDevice::new();
        device.set_deferred_results(true);
        let query = device.create_query().unwrap();
        device.begin_query(query);
        device.end_query(query);
        assert_eq!(device.query_result(query), None);
        device.resolve_queries();
        assert_eq!(device.query_result(query), Some(0));
    }

    #[test]
    fn test_failure_injection_is_one_shot() {
        let device = HeadlessDevice::new();
        device.fail_next(ResourceKind::Shader);
        let source = ShaderSource::new("basic", "void main() {}");
        assert!(device.create_shader(&source).is_err());
        assert!(device.create_shader(&source).is_ok());
        assert_eq!(device.live_shaders(), 1);
    }

    #[test]
    fn test_double_destroy_is_counted() {
        let device = HeadlessDevice::new();
        let buffer = device.create_buffer(BufferUsage::Vertex, &[0; 12]).unwrap();
        device.destroy_buffer(buffer);
        device.destroy_buffer(buffer);
        let stats = device.stats();
        assert_eq!(stats.buffers_destroyed, 1);
        assert_eq!(stats.invalid_destroys, 1);
    }
}
