//! # Render System
//!
//! Ordered list of [`Renderer`] stages for one camera plus the render-state
//! machine they run under. A frame renders the opaque `GeometryResult` pass
//! followed by the transparent one; stages may open nested subpasses (shadow
//! depth, voxelization) through [`RenderCx::subpass`].
//!
//! While a stage runs it is taken out of its slot, so a subpass opened by a
//! stage runs every other stage but not the caller itself.

use std::fmt;

use super::renderer::{RenderCx, Renderer, StageSetup};
use super::state::{PassState, RenderOpt, RenderState};
use super::viewer::Viewer;
use crate::scene::SceneGraph;

/// Pipeline of one camera
pub struct RenderSystem {
    stages: Vec<Option<Box<dyn Renderer>>>,
    pass: PassState,
    setup: StageSetup,
    frames: u64,
}

impl RenderSystem {
    /// Create an empty pipeline
    pub fn new(setup: StageSetup) -> Self {
        Self {
            stages: Vec::new(),
            pass: PassState::default(),
            setup,
            frames: 0,
        }
    }

    /// Resources handed to stages on configuration
    pub fn setup(&self) -> &StageSetup {
        &self.setup
    }

    /// State of the pass being rendered (depth 0 between frames)
    pub fn pass(&self) -> PassState {
        self.pass
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Configure and append a stage; false (stage released) when configuration fails
    pub fn add_stage(&mut self, mut stage: Box<dyn Renderer>) -> bool {
        if !stage.configure(&self.setup) {
            log::error!("Render stage '{}' failed to configure", stage.name());
            stage.release();
            return false;
        }
        log::debug!("Added render stage '{}'", stage.name());
        self.stages.push(Some(stage));
        true
    }

    /// Remove a stage by name; it is released before being returned
    pub fn remove_stage(&mut self, name: &str) -> Option<Box<dyn Renderer>> {
        let index = self
            .stages
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|stage| stage.name() == name))?;
        let mut stage = self.stages.remove(index)?;
        stage.release();
        Some(stage)
    }

    /// Stage by name
    pub fn stage(&self, name: &str) -> Option<&dyn Renderer> {
        self.stages
            .iter()
            .flatten()
            .find(|stage| stage.name() == name)
            .map(|stage| stage.as_ref())
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in registration order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().flatten().map(|stage| stage.name().to_string()).collect()
    }

    /// Render one pass: every active stage in registration order.
    ///
    /// The pass state is restored afterwards, so this is also how nested
    /// subpasses run.
    pub fn render(
        &mut self,
        scene: &SceneGraph,
        viewer: &Viewer,
        time: f32,
        state: RenderState,
        options: RenderOpt,
    ) {
        let saved = self.pass;
        self.pass = PassState {
            state,
            options,
            depth: saved.depth + 1,
        };
        log::trace!("Render pass {state:?} {options:?} at depth {}", self.pass.depth);

        for index in 0..self.stages.len() {
            let Some(mut stage) = self.stages[index].take() else {
                continue;
            };
            if stage.is_active() {
                let mut cx = RenderCx {
                    system: self,
                    scene,
                    viewer,
                    time,
                };
                stage.render_pass(&mut cx);
            }
            self.stages[index] = Some(stage);
        }

        self.pass = saved;
    }

    /// Render a frame: opaque then transparent `GeometryResult` passes
    pub fn render_frame(&mut self, scene: &SceneGraph, viewer: &Viewer, time: f32) {
        self.render(scene, viewer, time, RenderState::GeometryResult, RenderOpt::empty());
        self.render(scene, viewer, time, RenderState::GeometryResult, RenderOpt::TRANSPARENT);
        self.frames += 1;
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        for stage in self.stages.iter_mut().flatten() {
            stage.release();
        }
    }
}

impl fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSystem")
            .field("stages", &self.stage_names())
            .field("pass", &self.pass)
            .field("frames", &self.frames)
            .finish()
    }
}
