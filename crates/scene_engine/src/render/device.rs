//! Render device abstraction
//!
//! The device is the only place GPU work happens. Everything above it works
//! with opaque handles; a Vulkan or GL backend implements [`RenderDevice`],
//! and [`HeadlessDevice`](super::HeadlessDevice) runs the same contract
//! in-process.

use std::fmt;

use crate::scene::MaterialId;
use crate::spatial::Aabb;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, RenderError>;

/// Handle to a compiled shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderHandle(pub u64);

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(pub u64);

/// Handle to an occlusion query object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryHandle(pub u64);

/// Handle to a render target (one or more colour attachments plus depth)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetHandle(pub u64);

/// Geometry uploaded to the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Primitive {
    /// Vertex buffer
    pub vertices: BufferHandle,
    /// Optional index buffer
    pub indices: Option<BufferHandle>,
    /// Number of indices (or vertices when not indexed)
    pub element_count: u32,
}

/// CPU-side geometry used to build a [`Primitive`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// Interleaved vertex data
    pub vertices: Vec<f32>,
    /// Triangle indices, empty for non-indexed geometry
    pub indices: Vec<u32>,
    /// Floats per vertex
    pub stride: u32,
}

impl Geometry {
    /// Elements drawn for this geometry
    pub fn element_count(&self) -> u32 {
        if self.indices.is_empty() {
            let stride = self.stride.max(1) as usize;
            u32::try_from(self.vertices.len() / stride).unwrap_or(u32::MAX)
        } else {
            u32::try_from(self.indices.len()).unwrap_or(u32::MAX)
        }
    }
}

/// Shader program source handed to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Label used in diagnostics
    pub label: String,
    /// Program text
    pub code: String,
}

impl ShaderSource {
    /// Create a shader source
    pub fn new(label: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }
}

/// Intended use of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex data
    Vertex,
    /// Index data
    Index,
    /// Structured (storage) buffer
    Structured,
}

/// Pixel format of a colour attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 16-bit float RGBA
    Rgba16F,
    /// 32-bit float single channel
    R32F,
}

/// Render target description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Colour attachments in binding order
    pub color: Vec<TargetFormat>,
    /// Whether a depth attachment is created
    pub depth: bool,
}

/// One draw submission
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// Program to draw with
    pub shader: ShaderHandle,
    /// Geometry to draw
    pub primitive: Primitive,
    /// Material slot in the structured material buffer
    pub material: Option<MaterialId>,
    /// Column-major world matrices, one per instance
    pub transforms: &'a [[f32; 16]],
}

/// Rendering errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A handle does not name a live resource
    #[error("Invalid handle: {0}")]
    InvalidHandle(u64),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// GPU device contract consumed by caches, renderers and the scene
pub trait RenderDevice: Send + Sync + fmt::Debug {
    /// Compile a shader program
    fn create_shader(&self, source: &ShaderSource) -> DeviceResult<ShaderHandle>;

    /// Destroy a shader program
    fn destroy_shader(&self, shader: ShaderHandle);

    /// Create a buffer initialised with `data`
    fn create_buffer(&self, usage: BufferUsage, data: &[u8]) -> DeviceResult<BufferHandle>;

    /// Overwrite a buffer's contents
    fn write_buffer(&self, buffer: BufferHandle, data: &[u8]) -> DeviceResult<()>;

    /// Destroy a buffer
    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Create an occlusion query object
    fn create_query(&self) -> DeviceResult<QueryHandle>;

    /// Destroy an occlusion query object
    fn destroy_query(&self, query: QueryHandle);

    /// Start counting samples for `query`
    fn begin_query(&self, query: QueryHandle);

    /// Stop counting samples for `query`
    fn end_query(&self, query: QueryHandle);

    /// Sample count of a finished query, `None` while the result is not ready
    fn query_result(&self, query: QueryHandle) -> Option<u64>;

    /// Create a render target
    fn create_target(&self, desc: &TargetDesc) -> DeviceResult<TargetHandle>;

    /// Destroy a render target
    fn destroy_target(&self, target: TargetHandle);

    /// Bind a render target (`None` binds the presentation surface)
    fn bind_target(&self, target: Option<TargetHandle>);

    /// Clear colour attachments (in order) and optionally depth
    fn clear_target(&self, target: TargetHandle, colors: &[[f32; 4]], depth: Option<f32>);

    /// Bind the structured material buffer
    fn bind_materials(&self, buffer: BufferHandle);

    /// Submit a draw
    fn draw(&self, call: &DrawCall<'_>);

    /// Draw a depth-tested bounding box without colour writes
    fn draw_proxy(&self, bounds: &Aabb, transform: &[f32; 16]);

    /// Draw a full-screen triangle with `shader`
    fn draw_fullscreen(&self, shader: ShaderHandle);
}
