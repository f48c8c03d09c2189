//! # Scene
//!
//! The [`SceneGraph`] and the scene-owned data it coordinates:
//!
//! - [`SceneBarrier`]: reentrant exclusive lock over the engine phases
//! - [`MaterialTable`]: named materials packed into one GPU buffer
//! - [`DisplayTargets`]: g-buffer and output render targets
//! - [`Camera`], [`MeshDrawable`], [`InstancedDrawable`]: built-in components

pub mod barrier;
pub mod camera;
pub mod display;
pub mod material;
pub mod mesh;
pub mod scene_graph;

#[cfg(test)]
mod tests;

pub use barrier::{BarrierGuard, Phase, PhaseGuard, SceneBarrier};
pub use camera::Camera;
pub use display::{
    scaled_size, DisplayTargets, ATTACHMENT_DEPTH, ATTACHMENT_DIFFUSE, ATTACHMENT_MATERIAL,
    ATTACHMENT_NORMAL,
};
pub use material::{Material, MaterialId, MaterialMaps, MaterialTable, MATERIAL_WORDS};
pub use mesh::{InstancedDrawable, MeshDrawable};
pub use scene_graph::{ListenerId, SceneGraph};
