//! Render stages
//!
//! A [`Renderer`] is one stage of a camera's pipeline. The owning
//! [`RenderSystem`] configures it once when it is added, then calls
//! [`Renderer::render_pass`] for every pass (and subpass) of every frame
//! with a [`RenderCx`] describing the pass.

use std::sync::Arc;

use super::device::RenderDevice;
use super::render_system::RenderSystem;
use super::state::{PassState, RenderOpt, RenderState};
use super::viewer::{CullingMode, Viewer};
use crate::core::{OcclusionConfig, RenderConfig};
use crate::ecs::{Component, EntityCore, IndexFilter, Named, SpatialQuery};
use crate::resources::ResourceCaches;
use crate::scene::SceneGraph;

/// Resources a stage may acquire while being configured
#[derive(Debug, Clone, Default)]
pub struct StageSetup {
    /// Device, absent when rendering headless without a backend
    pub device: Option<Arc<dyn RenderDevice>>,
    /// Scene caches, present whenever a device is
    pub caches: Option<ResourceCaches>,
    /// Pipeline tunables
    pub config: RenderConfig,
}

/// One stage of a render pipeline
pub trait Renderer: Send {
    /// Stage name used in logs and lookups
    fn name(&self) -> &str;

    /// Acquire resources; returning false rejects the stage
    fn configure(&mut self, _setup: &StageSetup) -> bool {
        true
    }

    /// Render the current pass
    fn render_pass(&mut self, cx: &mut RenderCx<'_>);

    /// Drop acquired resources
    fn release(&mut self) {}

    /// Inactive stages are skipped
    fn is_active(&self) -> bool {
        true
    }
}

/// Pass context handed to [`Renderer::render_pass`]
pub struct RenderCx<'a> {
    pub(crate) system: &'a mut RenderSystem,
    pub(crate) scene: &'a SceneGraph,
    pub(crate) viewer: &'a Viewer,
    pub(crate) time: f32,
}

impl<'a> RenderCx<'a> {
    /// Pass kind, options and depth
    pub fn pass(&self) -> PassState {
        self.system.pass()
    }

    /// Pass kind
    pub fn state(&self) -> RenderState {
        self.system.pass().state
    }

    /// Pass options
    pub fn options(&self) -> RenderOpt {
        self.system.pass().options
    }

    /// Subpass depth
    pub fn depth(&self) -> u32 {
        self.system.pass().depth
    }

    /// Whether this is the top-level pass
    pub fn is_top_level(&self) -> bool {
        self.system.pass().is_top_level()
    }

    /// Camera snapshot of this pass
    pub fn viewer(&self) -> &Viewer {
        self.viewer
    }

    /// Frame time
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Scene being rendered
    pub fn scene(&self) -> &SceneGraph {
        self.scene
    }

    /// Render device
    pub fn device(&self) -> Option<&Arc<dyn RenderDevice>> {
        self.system.setup().device.as_ref()
    }

    /// Scene caches
    pub fn caches(&self) -> Option<&ResourceCaches> {
        self.system.setup().caches.as_ref()
    }

    /// Pipeline tunables
    pub fn config(&self) -> &RenderConfig {
        &self.system.setup().config
    }

    /// Occlusion tunables
    pub fn occlusion(&self) -> &OcclusionConfig {
        &self.system.setup().config.occlusion
    }

    /// Whether geometry stages run occlusion queries in this pass.
    ///
    /// Queries run only in top-level `GeometryResult` passes with a device.
    pub fn occlusion_active(&self) -> bool {
        self.occlusion().enabled
            && self.state() == RenderState::GeometryResult
            && self.is_top_level()
            && self.device().is_some()
    }

    /// Visit every active `T` that survives the viewer's culling mode.
    ///
    /// Frustum mode walks the octree against the view frustum, bounding mode
    /// against the culling sphere and disabled mode scans every component.
    /// Each surviving component is visited once, with its entity locked for
    /// the duration of `f`; `f` must not call back into the scene. Returns
    /// the number of components visited.
    pub fn query_bounding<T, F>(&self, filter: IndexFilter, mut f: F) -> usize
    where
        T: Component + Named,
        F: FnMut(&mut EntityCore, &mut T),
    {
        let spatial = match &self.viewer.culling {
            CullingMode::Frustum => SpatialQuery::Frustum(&self.viewer.frustum),
            CullingMode::Bounding(sphere) => SpatialQuery::Sphere(*sphere),
            CullingMode::Disabled => SpatialQuery::Everything,
        };

        let mut visited = 0;
        for entity in self.scene.candidates(T::KEY, filter, spatial) {
            let mut entity = entity.lock();
            if entity.is_active(T::KEY) != Some(true) {
                continue;
            }
            if let Some((core, component)) = entity.split_mut::<T>() {
                f(core, component);
                visited += 1;
            }
        }
        visited
    }

    /// Render a nested pass with another viewer and state.
    ///
    /// The calling stage is skipped inside its own subpass.
    pub fn subpass(&mut self, viewer: &Viewer, state: RenderState, options: RenderOpt) {
        self.system.render(self.scene, viewer, self.time, state, options);
    }
}
