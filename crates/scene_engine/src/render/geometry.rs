//! # Geometry Stage
//!
//! [`GeometryRenderer<T>`] draws every visible drawable component of type
//! `T`. Per pass it:
//!
//! 1. walks the scene index through [`RenderCx::query_bounding`], keeping
//!    the category matching the pass (opaque or transparent) and, in
//!    `STATIC` passes, only static drawables
//! 2. in top-level `GeometryResult` passes, runs each drawable's occlusion
//!    state machine with a bounding-box proxy draw
//! 3. groups the surviving instances by primitive and material and submits
//!    one instanced draw per group (or one draw per instance when batching
//!    is off)

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::device::{DrawCall, Primitive, RenderDevice, ShaderSource};
use super::occlusion::{QueryBudget, QueryStatus};
use super::renderer::{RenderCx, Renderer, StageSetup};
use super::state::RenderState;
use crate::core::OcclusionConfig;
use crate::ecs::{Component, Drawable, IndexFilter, Named};
use crate::foundation::math::{to_cols_array, Mat4};
use crate::resources::{PrimitiveLease, ShaderLease};
use crate::scene::MaterialId;

type Batches = BTreeMap<(Primitive, Option<MaterialId>), Vec<[f32; 16]>>;

/// Counters of the last pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryStats {
    /// Components returned by the culling query
    pub candidates: usize,
    /// Components drawn
    pub drawn: usize,
    /// Components rejected by occlusion
    pub occluded: usize,
    /// Queries opened
    pub queries: usize,
    /// Components that took the overflow visibility
    pub overflowed: usize,
    /// Draw calls submitted
    pub draw_calls: usize,
}

/// Stage drawing drawable components of type `T`
pub struct GeometryRenderer<T> {
    name: String,
    source: ShaderSource,
    states: Vec<RenderState>,
    batching: Option<bool>,
    shader: Option<ShaderLease>,
    active: bool,
    stats: GeometryStats,
    queries: QueryBudget,
    _marker: PhantomData<fn() -> T>,
}

impl<T> GeometryRenderer<T>
where
    T: Component + Named + Drawable,
{
    /// Stage compiling `source` under `name`, drawing in `GeometryResult` passes
    pub fn new(name: impl Into<String>, source: ShaderSource) -> Self {
        Self {
            name: name.into(),
            source,
            states: vec![RenderState::GeometryResult],
            batching: None,
            shader: None,
            active: true,
            stats: GeometryStats::default(),
            queries: QueryBudget::new(),
            _marker: PhantomData,
        }
    }

    /// Pass kinds this stage draws in
    #[must_use]
    pub fn with_states(mut self, states: &[RenderState]) -> Self {
        self.states = states.to_vec();
        self
    }

    /// Override the pipeline's batching setting
    #[must_use]
    pub fn with_batching(mut self, batching: bool) -> Self {
        self.batching = Some(batching);
        self
    }

    /// Enable or disable the stage
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Counters of the last pass this stage drew
    pub fn stats(&self) -> GeometryStats {
        self.stats
    }

    /// Queries this stage issued that no drawable has fetched yet
    pub fn outstanding_queries(&self) -> usize {
        self.queries.outstanding()
    }

    /// Whether the stage holds a compiled program
    pub fn is_configured(&self) -> bool {
        self.shader.is_some()
    }
}

/// Run the occlusion state machine of one drawable; returns its visibility
fn occlusion_visible<D: Drawable + ?Sized>(
    drawable: &mut D,
    world: &Mat4,
    device: &Arc<dyn RenderDevice>,
    config: &OcclusionConfig,
    budget: &QueryBudget,
    stats: &mut GeometryStats,
) -> bool {
    let bounds = drawable.local_bounds();
    let occlusion = drawable.occlusion_mut();

    if occlusion.satisfied() == -1 {
        occlusion.fetch(device.as_ref(), |fragments| config.skips_for(fragments));
        if occlusion.satisfied() == -1 {
            return occlusion.visible();
        }
    }

    if occlusion.is_due() && budget.outstanding() >= config.max_queries {
        stats.overflowed += 1;
        return config.overflow_visibility;
    }

    match occlusion.begin(device) {
        QueryStatus::Issued => {
            device.draw_proxy(&bounds, &to_cols_array(world));
            occlusion.end(device.as_ref());
            occlusion.charge(budget);
            stats.queries += 1;
            occlusion.visible()
        }
        QueryStatus::Cached(visible) => visible,
        QueryStatus::Pending => occlusion.visible(),
        QueryStatus::Unavailable => true,
    }
}

/// Add every visible surface instance of a drawable to the batches
fn collect<D: Drawable + ?Sized>(drawable: &D, world: &Mat4, batches: &mut Batches) {
    let transforms: Vec<[f32; 16]> = match drawable.instances() {
        Some(instances) => instances
            .iter()
            .map(|instance| to_cols_array(&(world * instance)))
            .collect(),
        None => vec![to_cols_array(world)],
    };

    for appearance in drawable.surfaces().values().filter(|a| !a.hidden) {
        let Some(primitive) = appearance.primitive.as_ref().map(PrimitiveLease::primitive) else {
            continue;
        };
        batches
            .entry((primitive, appearance.material))
            .or_default()
            .extend_from_slice(&transforms);
    }
}

impl<T> Renderer for GeometryRenderer<T>
where
    T: Component + Named + Drawable,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, setup: &StageSetup) -> bool {
        let Some(caches) = &setup.caches else {
            log::debug!("Geometry stage '{}' has no device, drawing disabled", self.name);
            return true;
        };
        self.shader = caches.shaders.lease(&self.name, &self.source);
        self.shader.is_some()
    }

    fn render_pass(&mut self, cx: &mut RenderCx<'_>) {
        if !self.active || !self.states.contains(&cx.state()) {
            return;
        }
        let (Some(shader), Some(device)) = (self.shader.as_ref().map(ShaderLease::handle), cx.device().cloned())
        else {
            return;
        };

        let pass = cx.pass();
        let filter = if pass.is_transparent() {
            IndexFilter::Transparent
        } else {
            IndexFilter::Opaque
        };
        let static_only = pass.is_static();
        let occlusion = cx.occlusion_active().then(|| cx.occlusion().clone());
        let batching = self.batching.unwrap_or(cx.config().batching);

        let mut stats = GeometryStats::default();
        let mut batches = Batches::new();
        let budget = self.queries.clone();

        cx.query_bounding::<T, _>(filter, |core, drawable| {
            stats.candidates += 1;
            if static_only && !drawable.is_static() {
                return;
            }
            let world = *core.world_matrix();
            let visible = occlusion.as_ref().map_or(true, |config| {
                occlusion_visible(drawable, &world, &device, config, &budget, &mut stats)
            });
            if !visible {
                stats.occluded += 1;
                return;
            }
            stats.drawn += 1;
            collect(drawable, &world, &mut batches);
        });

        for ((primitive, material), transforms) in &batches {
            if batching {
                device.draw(&DrawCall {
                    shader,
                    primitive: *primitive,
                    material: *material,
                    transforms,
                });
                stats.draw_calls += 1;
            } else {
                for transform in transforms {
                    device.draw(&DrawCall {
                        shader,
                        primitive: *primitive,
                        material: *material,
                        transforms: std::slice::from_ref(transform),
                    });
                    stats.draw_calls += 1;
                }
            }
        }

        log::trace!(
            "Stage '{}' drew {}/{} ({} occluded, {} queries)",
            self.name,
            stats.drawn,
            stats.candidates,
            stats.occluded,
            stats.queries
        );
        self.stats = stats;
    }

    fn release(&mut self) {
        self.shader = None;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
