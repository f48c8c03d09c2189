//! # Scene Engine
//!
//! Scene graph and render pipeline core for a real-time 3D engine.
//!
//! ## Features
//!
//! - **Scene Graph**: entities with typed components, per-type spatial indices
//! - **Render Pipeline**: per-camera stage lists with nested subpasses
//! - **Occlusion Culling**: GPU occlusion queries with a per-pass budget
//! - **Resource Caches**: reference-counted shader and primitive caches
//! - **Phase Barrier**: render, simulation, synchronize and update phases that
//!   run concurrently and pause for bulk edits
//! - **Content**: processor-based loading with owner counting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scene_engine::prelude::*;
//!
//! let context = EngineContext::new(EngineConfig::default())
//!     .with_device(Arc::new(HeadlessDevice::new()));
//! let scene = SceneGraph::new(&context);
//!
//! let camera = scene.create_entity("camera");
//! scene.add(camera, Camera::new(scene.create_render_system()));
//! scene.set_camera(camera);
//!
//! while context.is_active() {
//!     scene.tick(1.0 / 60.0, 0.0);
//!     context.terminate();
//! }
//! ```

pub mod config;
pub mod content;
pub mod context;
pub mod core;
pub mod ecs;
pub mod events;
pub mod foundation;
pub mod physics;
pub mod render;
pub mod resources;
pub mod scene;
pub mod spatial;

pub use context::{EngineContext, RunState};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        content::{ContentManager, Processor},
        core::{Config, EngineConfig, RenderConfig, SceneConfig},
        ecs::{Component, ComponentCx, Drawable, Entity, EntityId, Named, TypeKey},
        events::{Event, EventTarget, EventValue},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        physics::{PhysicsWorld, Pose},
        render::{
            EffectRenderer, GeometryRenderer, HeadlessDevice, RenderDevice, RenderSystem, Renderer,
        },
        scene::{Camera, InstancedDrawable, Material, MeshDrawable, Phase, SceneGraph},
        spatial::Aabb,
        EngineContext, RunState,
    };
}
