//! Full-screen effect stage

use super::device::ShaderSource;
use super::renderer::{RenderCx, Renderer, StageSetup};
use super::state::{RenderOpt, RenderState};
use crate::resources::ShaderLease;

/// Stage drawing one full-screen pass into the scene's output target.
///
/// Runs only in top-level passes whose state and options match exactly.
pub struct EffectRenderer {
    name: String,
    source: ShaderSource,
    state: RenderState,
    options: RenderOpt,
    shader: Option<ShaderLease>,
    active: bool,
    passes: u64,
}

impl EffectRenderer {
    /// Effect running in opaque `GeometryResult` passes
    pub fn new(name: impl Into<String>, source: ShaderSource) -> Self {
        Self {
            name: name.into(),
            source,
            state: RenderState::GeometryResult,
            options: RenderOpt::empty(),
            shader: None,
            active: true,
            passes: 0,
        }
    }

    /// Pass the effect runs in
    #[must_use]
    pub fn with_pass(mut self, state: RenderState, options: RenderOpt) -> Self {
        self.state = state;
        self.options = options;
        self
    }

    /// Enable or disable the stage
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Full-screen passes drawn so far
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl Renderer for EffectRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, setup: &StageSetup) -> bool {
        let Some(caches) = &setup.caches else {
            return true;
        };
        self.shader = caches.shaders.lease(&self.name, &self.source);
        self.shader.is_some()
    }

    fn render_pass(&mut self, cx: &mut RenderCx<'_>) {
        if cx.state() != self.state || cx.options() != self.options || !cx.is_top_level() {
            return;
        }
        let (Some(shader), Some(device)) = (&self.shader, cx.device()) else {
            return;
        };

        if let Some(output) = cx.scene().display_output() {
            device.bind_target(Some(output));
        }
        device.draw_fullscreen(shader.handle());
        self.passes += 1;
    }

    fn release(&mut self) {
        self.shader = None;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
