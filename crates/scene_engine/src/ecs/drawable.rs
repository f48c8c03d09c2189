//! Drawable components
//!
//! A drawable is a component that takes part in culling and rendering. It
//! reports a visibility category, local bounds, the occlusion state its
//! geometry stage drives, and one [`Appearance`] per surface.

use std::collections::BTreeMap;

use crate::foundation::math::Mat4;
use crate::render::Occlusion;
use crate::resources::PrimitiveLease;
use crate::scene::MaterialId;
use crate::spatial::{Aabb, Sphere};

/// Visibility category used to split the per-type index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Rendered in the opaque pass
    Opaque,
    /// Rendered in the transparent pass
    Transparent,
}

/// Key of one surface inside a multi-surface drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceKey(pub u32);

/// Per-surface material binding
#[derive(Debug, Default)]
pub struct Appearance {
    /// Geometry drawn for the surface
    pub primitive: Option<PrimitiveLease>,
    /// Material slot
    pub material: Option<MaterialId>,
    /// Hidden surfaces are skipped by geometry stages
    pub hidden: bool,
}

impl Appearance {
    /// Bind a primitive and material
    pub fn new(primitive: PrimitiveLease, material: Option<MaterialId>) -> Self {
        Self {
            primitive: Some(primitive),
            material,
            hidden: false,
        }
    }
}

/// Surfaces of a drawable keyed by optional surface key
///
/// Simple drawables hold one entry under `None`.
pub type Surfaces = BTreeMap<Option<SurfaceKey>, Appearance>;

/// Rendering side of a component
pub trait Drawable {
    /// Visibility category
    fn category(&self) -> Category;

    /// Bounds in entity space, covering every instance
    fn local_bounds(&self) -> Aabb;

    /// Occlusion query state
    fn occlusion(&self) -> &Occlusion;

    /// Mutable occlusion query state
    fn occlusion_mut(&mut self) -> &mut Occlusion;

    /// Surfaces to draw
    fn surfaces(&self) -> &Surfaces;

    /// Per-instance transforms relative to the entity; `None` draws a single
    /// instance at the entity transform
    fn instances(&self) -> Option<&[Mat4]> {
        None
    }

    /// Static drawables are the only ones drawn in `STATIC` passes
    fn is_static(&self) -> bool {
        false
    }

    /// World-space bounding sphere
    fn world_sphere(&self, world: &Mat4) -> Sphere {
        self.local_bounds().world_sphere(world)
    }
}
