//! Primitive cache
//!
//! Reference-counted vertex/index buffer pairs keyed by name. Same locking
//! rules as the shader cache.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::pool::{RefPool, Release};
use crate::render::{BufferUsage, Geometry, Primitive, RenderDevice};

/// Reference-counted GPU geometry
pub struct PrimitiveCache {
    device: Arc<dyn RenderDevice>,
    pool: Mutex<RefPool<Primitive>>,
}

impl PrimitiveCache {
    /// Create an empty cache on `device`
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            pool: Mutex::new(RefPool::default()),
        }
    }

    fn upload(&self, geometry: &Geometry) -> Option<Primitive> {
        let vertices = match self
            .device
            .create_buffer(BufferUsage::Vertex, bytemuck::cast_slice(&geometry.vertices))
        {
            Ok(buffer) => buffer,
            Err(e) => {
                log::error!("Failed to create vertex buffer: {e}");
                return None;
            }
        };

        let indices = if geometry.indices.is_empty() {
            None
        } else {
            match self
                .device
                .create_buffer(BufferUsage::Index, bytemuck::cast_slice(&geometry.indices))
            {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    log::error!("Failed to create index buffer: {e}");
                    self.device.destroy_buffer(vertices);
                    return None;
                }
            }
        };

        Some(Primitive {
            vertices,
            indices,
            element_count: geometry.element_count(),
        })
    }

    fn destroy(&self, primitive: Primitive) {
        self.device.destroy_buffer(primitive.vertices);
        if let Some(indices) = primitive.indices {
            self.device.destroy_buffer(indices);
        }
    }

    /// Return the cached primitive for `name` (adding a reference) or upload `geometry`
    pub fn build(&self, name: &str, geometry: &Geometry) -> Option<Primitive> {
        let mut pool = self.pool.lock();
        if let Some(primitive) = pool.acquire(name) {
            return Some(primitive);
        }
        let primitive = self.upload(geometry)?;
        pool.insert(name, primitive);
        log::debug!(
            "Built primitive '{name}' ({} elements, indexed: {})",
            primitive.element_count,
            primitive.indices.is_some()
        );
        Some(primitive)
    }

    /// Add a reference to a cached primitive
    pub fn get(&self, name: &str) -> Option<Primitive> {
        self.pool.lock().acquire(name)
    }

    /// Drop one reference; destroys the buffers at zero
    pub fn free(&self, name: &str, primitive: Primitive) -> Release {
        let release = self.pool.lock().release(name, primitive);
        match release {
            Release::Destroyed => {
                self.destroy(primitive);
                log::debug!("Destroyed primitive '{name}'");
            }
            Release::Stale => log::warn!("Stale free of primitive '{name}'"),
            Release::Missing => log::warn!("Free of unknown primitive '{name}'"),
            Release::Retained(_) => {}
        }
        release
    }

    /// Whether `name` is cached
    pub fn has(&self, name: &str) -> bool {
        self.pool.lock().contains(name)
    }

    /// Name of a cached primitive
    pub fn find(&self, primitive: Primitive) -> Option<String> {
        self.pool.lock().find(primitive)
    }

    /// Current reference count of `name`
    pub fn refcount(&self, name: &str) -> usize {
        self.pool.lock().refcount(name)
    }

    /// Number of cached primitives
    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build (or reuse) a primitive behind a lease that frees it on drop
    pub fn lease(self: &Arc<Self>, name: &str, geometry: &Geometry) -> Option<PrimitiveLease> {
        let primitive = self.build(name, geometry)?;
        Some(PrimitiveLease {
            cache: Arc::clone(self),
            name: name.to_string(),
            primitive,
        })
    }

    /// Lease an already cached primitive
    pub fn lease_cached(self: &Arc<Self>, name: &str) -> Option<PrimitiveLease> {
        let primitive = self.get(name)?;
        Some(PrimitiveLease {
            cache: Arc::clone(self),
            name: name.to_string(),
            primitive,
        })
    }
}

impl Drop for PrimitiveCache {
    fn drop(&mut self) {
        let leaked = self.pool.get_mut().drain();
        for (name, primitive) in leaked {
            log::warn!("Primitive '{name}' still referenced when the cache was dropped");
            self.destroy(primitive);
        }
    }
}

impl fmt::Debug for PrimitiveCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveCache").field("len", &self.len()).finish()
    }
}

/// One reference to a cached primitive
pub struct PrimitiveLease {
    cache: Arc<PrimitiveCache>,
    name: String,
    primitive: Primitive,
}

impl PrimitiveLease {
    /// GPU geometry
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Cache key
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Clone for PrimitiveLease {
    fn clone(&self) -> Self {
        // The entry is alive while this lease exists
        let primitive = self.cache.get(&self.name).unwrap_or(self.primitive);
        Self {
            cache: Arc::clone(&self.cache),
            name: self.name.clone(),
            primitive,
        }
    }
}

impl Drop for PrimitiveLease {
    fn drop(&mut self) {
        self.cache.free(&self.name, self.primitive);
    }
}

impl fmt::Debug for PrimitiveLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveLease")
            .field("name", &self.name)
            .field("primitive", &self.primitive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessDevice, ResourceKind};

    fn triangle() -> Geometry {
        Geometry {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            stride: 3,
        }
    }

    fn cache() -> (Arc<HeadlessDevice>, Arc<PrimitiveCache>) {
        let device = Arc::new(HeadlessDevice::new());
        let cache = Arc::new(PrimitiveCache::new(device.clone()));
        (device, cache)
    }

    #[test]
    fn test_build_uploads_once() {
        let (device, cache) = cache();
        let first = cache.build("triangle", &triangle()).unwrap();
        let second = cache.build("triangle", &triangle()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.element_count, 3);
        assert_eq!(device.buffer_len(first.vertices), Some(36));
        assert_eq!(device.stats().buffers_created, 2);
        assert_eq!(cache.refcount("triangle"), 2);
        assert_eq!(cache.find(first).as_deref(), Some("triangle"));
    }

    #[test]
    fn test_last_free_destroys_both_buffers() {
        let (device, cache) = cache();
        let primitive = cache.build("triangle", &triangle()).unwrap();
        cache.get("triangle");

        assert_eq!(cache.free("triangle", primitive), Release::Retained(1));
        assert_eq!(device.live_buffers(), 2);
        assert_eq!(cache.free("triangle", primitive), Release::Destroyed);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(cache.free("triangle", primitive), Release::Missing);
        assert_eq!(device.stats().invalid_destroys, 0);
    }

    #[test]
    fn test_upload_failure_caches_nothing() {
        let (device, cache) = cache();
        device.fail_next(ResourceKind::Buffer);
        assert!(cache.build("triangle", &triangle()).is_none());
        assert_eq!(device.live_buffers(), 0);
        assert!(!cache.has("triangle"));
    }

    #[test]
    fn test_lease_clone_adds_reference() {
        let (device, cache) = cache();
        let lease = cache.lease("triangle", &triangle()).unwrap();
        let copy = lease.clone();
        assert_eq!(cache.refcount("triangle"), 2);
        drop(lease);
        drop(copy);
        assert_eq!(device.live_buffers(), 0);
        assert!(cache.lease_cached("triangle").is_none());
    }
}
