//! # Shader Cache
//!
//! Scene-wide pool of compiled shader programs keyed by name. Compiling a
//! name that is already cached returns the existing program and adds a
//! reference; the program is destroyed exactly when the last reference is
//! freed.
//!
//! All bookkeeping happens under one mutex. Handles are copied out before
//! the lock is released, and device destruction runs after it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::pool::{RefPool, Release};
use crate::render::{RenderDevice, ShaderHandle, ShaderSource};

/// Reference-counted shader programs
pub struct ShaderCache {
    device: Arc<dyn RenderDevice>,
    pool: Mutex<RefPool<ShaderHandle>>,
}

impl ShaderCache {
    /// Create an empty cache on `device`
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            pool: Mutex::new(RefPool::default()),
        }
    }

    /// Return the cached program for `name` (adding a reference) or compile it.
    ///
    /// Compilation failures are logged and return `None`.
    pub fn compile(&self, name: &str, source: &ShaderSource) -> Option<ShaderHandle> {
        let mut pool = self.pool.lock();
        if let Some(handle) = pool.acquire(name) {
            log::trace!("Shader '{name}' reused ({} refs)", pool.refcount(name));
            return Some(handle);
        }

        match self.device.create_shader(source) {
            Ok(handle) => {
                pool.insert(name, handle);
                log::debug!("Compiled shader '{name}' as {handle:?}");
                Some(handle)
            }
            Err(e) => {
                log::error!("Failed to compile shader '{name}': {e}");
                None
            }
        }
    }

    /// Add a reference to a cached program
    pub fn get(&self, name: &str) -> Option<ShaderHandle> {
        self.pool.lock().acquire(name)
    }

    /// Drop one reference; destroys the program at zero
    pub fn free(&self, name: &str, handle: ShaderHandle) -> Release {
        let release = self.pool.lock().release(name, handle);
        match release {
            Release::Destroyed => {
                self.device.destroy_shader(handle);
                log::debug!("Destroyed shader '{name}'");
            }
            Release::Stale => log::warn!("Stale free of shader '{name}' with {handle:?}"),
            Release::Missing => log::warn!("Free of unknown shader '{name}'"),
            Release::Retained(_) => {}
        }
        release
    }

    /// Whether `name` is cached
    pub fn has(&self, name: &str) -> bool {
        self.pool.lock().contains(name)
    }

    /// Name of a cached program
    pub fn find(&self, handle: ShaderHandle) -> Option<String> {
        self.pool.lock().find(handle)
    }

    /// Current reference count of `name` (0 when not cached)
    pub fn refcount(&self, name: &str) -> usize {
        self.pool.lock().refcount(name)
    }

    /// Number of cached programs
    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compile (or reuse) a program behind a lease that frees it on drop
    pub fn lease(self: &Arc<Self>, name: &str, source: &ShaderSource) -> Option<ShaderLease> {
        let handle = self.compile(name, source)?;
        Some(ShaderLease {
            cache: Arc::clone(self),
            name: name.to_string(),
            handle,
        })
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        for (name, handle) in self.pool.get_mut().drain() {
            log::warn!("Shader '{name}' still referenced when the cache was dropped");
            self.device.destroy_shader(handle);
        }
    }
}

impl fmt::Debug for ShaderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderCache").field("len", &self.len()).finish()
    }
}

/// One reference to a cached shader program
pub struct ShaderLease {
    cache: Arc<ShaderCache>,
    name: String,
    handle: ShaderHandle,
}

impl ShaderLease {
    /// Program handle
    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    /// Cache key
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ShaderLease {
    fn drop(&mut self) {
        self.cache.free(&self.name, self.handle);
    }
}

impl fmt::Debug for ShaderLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderLease")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessDevice, ResourceKind};

    fn cache() -> (Arc<HeadlessDevice>, Arc<ShaderCache>) {
        let device = Arc::new(HeadlessDevice::new());
        let cache = Arc::new(ShaderCache::new(device.clone()));
        (device, cache)
    }

    fn source() -> ShaderSource {
        ShaderSource::new("basic", "void main() {}")
    }

    #[test]
    fn test_basic_compiled_got_three_times_freed_four_times() {
        let (device, cache) = cache();

        let handle = cache.compile("basic", &source()).unwrap();
        for _ in 0..3 {
            assert_eq!(cache.get("basic"), Some(handle));
        }
        assert_eq!(cache.refcount("basic"), 4);

        for remaining in [3, 2, 1] {
            assert_eq!(cache.free("basic", handle), Release::Retained(remaining));
            assert_eq!(device.stats().shaders_destroyed, 0);
        }
        assert_eq!(cache.free("basic", handle), Release::Destroyed);

        assert_eq!(device.stats().shaders_created, 1);
        assert_eq!(device.stats().shaders_destroyed, 1);
        assert!(!cache.has("basic"));
        assert_eq!(cache.get("basic"), None);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let (device, cache) = cache();
        let handle = cache.compile("basic", &source()).unwrap();

        assert_eq!(cache.free("basic", ShaderHandle(handle.0 + 100)), Release::Stale);
        assert_eq!(cache.free("other", handle), Release::Missing);
        assert_eq!(cache.refcount("basic"), 1);
        assert_eq!(device.live_shaders(), 1);
    }

    #[test]
    fn test_compile_failure_caches_nothing() {
        let (device, cache) = cache();
        device.fail_next(ResourceKind::Shader);
        assert!(cache.compile("basic", &source()).is_none());
        assert!(!cache.has("basic"));
        assert!(cache.compile("basic", &source()).is_some());
    }

    #[test]
    fn test_find_and_lease() {
        let (device, cache) = cache();
        let lease = cache.lease("basic", &source()).unwrap();
        assert_eq!(cache.find(lease.handle()).as_deref(), Some("basic"));

        let second = cache.lease("basic", &source()).unwrap();
        assert_eq!(second.handle(), lease.handle());
        drop(lease);
        assert_eq!(device.live_shaders(), 1);
        drop(second);
        assert_eq!(device.live_shaders(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_compiles_share_one_program() {
        let (device, cache) = cache();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.compile("basic", &source()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_some());
        }
        assert_eq!(device.stats().shaders_created, 1);
        assert_eq!(cache.refcount("basic"), 8);
    }
}
