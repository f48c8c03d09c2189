//! Rendering pipeline
//!
//! - [`RenderDevice`]: GPU contract, implemented in-process by [`HeadlessDevice`]
//! - [`RenderSystem`]: per-camera stage list and render-state machine
//! - [`GeometryRenderer`] / [`EffectRenderer`]: built-in stages
//! - [`Occlusion`]: per-drawable GPU occlusion query state
//! - [`Viewer`]: per-frame camera snapshot used for culling

pub mod device;
pub mod effect;
pub mod geometry;
pub mod headless;
pub mod occlusion;
pub mod render_system;
pub mod renderer;
pub mod state;
pub mod viewer;

pub use device::{
    BufferHandle, BufferUsage, DeviceResult, DrawCall, Geometry, Primitive, QueryHandle,
    RenderDevice, RenderError, ShaderHandle, ShaderSource, TargetDesc, TargetFormat, TargetHandle,
};
pub use effect::EffectRenderer;
pub use geometry::{GeometryRenderer, GeometryStats};
pub use headless::{DeviceStats, DrawRecord, HeadlessDevice, ResourceKind};
pub use occlusion::{Occlusion, QueryBudget, QueryLease, QueryStatus};
pub use render_system::RenderSystem;
pub use renderer::{RenderCx, Renderer, StageSetup};
pub use state::{PassState, RenderOpt, RenderState};
pub use viewer::{CullingMode, Projection, Viewer};
