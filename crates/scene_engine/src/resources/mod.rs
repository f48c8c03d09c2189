//! Shared GPU resource caches
//!
//! One [`ShaderCache`] and one [`PrimitiveCache`] exist per scene. Both are
//! thread-safe and reference counted by name; leases free their reference
//! on drop.

mod pool;
mod primitive_cache;
mod shader_cache;

use std::sync::Arc;

pub use pool::Release;
pub use primitive_cache::{PrimitiveCache, PrimitiveLease};
pub use shader_cache::{ShaderCache, ShaderLease};

use crate::render::RenderDevice;

/// The caches of one scene
#[derive(Debug, Clone)]
pub struct ResourceCaches {
    /// Shader programs
    pub shaders: Arc<ShaderCache>,
    /// Vertex/index buffers
    pub primitives: Arc<PrimitiveCache>,
}

impl ResourceCaches {
    /// Create both caches on `device`
    pub fn new(device: &Arc<dyn RenderDevice>) -> Self {
        Self {
            shaders: Arc::new(ShaderCache::new(Arc::clone(device))),
            primitives: Arc::new(PrimitiveCache::new(Arc::clone(device))),
        }
    }
}
