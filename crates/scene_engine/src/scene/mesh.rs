//! Built-in drawable components
//!
//! - [`MeshDrawable`]: one primitive per surface, drawn at the entity transform
//! - [`InstancedDrawable`]: the same surfaces repeated at many local transforms

use crate::ecs::{Appearance, Category, Component, Drawable, Named, SurfaceKey, Surfaces, TypeKey};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::Occlusion;
use crate::resources::PrimitiveLease;
use crate::scene::MaterialId;
use crate::spatial::Aabb;

/// Drawable mesh with per-surface appearances
#[derive(Debug)]
pub struct MeshDrawable {
    category: Category,
    bounds: Aabb,
    surfaces: Surfaces,
    occlusion: Occlusion,
    is_static: bool,
}

impl MeshDrawable {
    /// Opaque mesh drawing `primitive` with `material`
    pub fn new(primitive: PrimitiveLease, material: Option<MaterialId>, bounds: Aabb) -> Self {
        let mut surfaces = Surfaces::new();
        surfaces.insert(None, Appearance::new(primitive, material));
        Self {
            category: Category::Opaque,
            bounds,
            surfaces,
            occlusion: Occlusion::new(),
            is_static: false,
        }
    }

    /// Mesh with no surfaces yet
    pub fn empty(bounds: Aabb) -> Self {
        Self {
            category: Category::Opaque,
            bounds,
            surfaces: Surfaces::new(),
            occlusion: Occlusion::new(),
            is_static: false,
        }
    }

    /// Set the visibility category (builder)
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Mark as static geometry (builder)
    #[must_use]
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Add or replace a keyed surface (builder)
    #[must_use]
    pub fn with_surface(mut self, key: SurfaceKey, appearance: Appearance) -> Self {
        self.surfaces.insert(Some(key), appearance);
        self
    }

    /// Mutable surfaces
    pub fn surfaces_mut(&mut self) -> &mut Surfaces {
        &mut self.surfaces
    }
}

impl Named for MeshDrawable {
    const NAME: &'static str = "MeshDrawable";
}

impl Component for MeshDrawable {
    fn type_key(&self) -> TypeKey {
        Self::KEY
    }

    fn as_drawable(&self) -> Option<&dyn Drawable> {
        Some(self)
    }

    fn as_drawable_mut(&mut self) -> Option<&mut dyn Drawable> {
        Some(self)
    }
}

impl Drawable for MeshDrawable {
    fn category(&self) -> Category {
        self.category
    }

    fn local_bounds(&self) -> Aabb {
        self.bounds
    }

    fn occlusion(&self) -> &Occlusion {
        &self.occlusion
    }

    fn occlusion_mut(&mut self) -> &mut Occlusion {
        &mut self.occlusion
    }

    fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }

    fn is_static(&self) -> bool {
        self.is_static
    }
}

/// Surfaces repeated at many transforms relative to the entity
#[derive(Debug)]
pub struct InstancedDrawable {
    category: Category,
    instances: Vec<Mat4>,
    instance_bounds: Aabb,
    surfaces: Surfaces,
    occlusion: Occlusion,
}

impl InstancedDrawable {
    /// Instances of one surface whose geometry fits `instance_bounds`
    pub fn new(primitive: PrimitiveLease, material: Option<MaterialId>, instance_bounds: Aabb) -> Self {
        let mut surfaces = Surfaces::new();
        surfaces.insert(None, Appearance::new(primitive, material));
        Self {
            category: Category::Opaque,
            instances: Vec::new(),
            instance_bounds,
            surfaces,
            occlusion: Occlusion::new(),
        }
    }

    /// Set the visibility category (builder)
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Add or replace a keyed surface (builder)
    #[must_use]
    pub fn with_surface(mut self, key: SurfaceKey, appearance: Appearance) -> Self {
        self.surfaces.insert(Some(key), appearance);
        self
    }

    /// Add an instance at a transform relative to the entity
    pub fn push(&mut self, transform: Mat4) {
        self.instances.push(transform);
        self.occlusion.reset();
    }

    /// Drop every instance
    pub fn clear(&mut self) {
        self.instances.clear();
        self.occlusion.reset();
    }

    /// Instance count
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether there are no instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Named for InstancedDrawable {
    const NAME: &'static str = "InstancedDrawable";
}

impl Component for InstancedDrawable {
    fn type_key(&self) -> TypeKey {
        Self::KEY
    }

    fn as_drawable(&self) -> Option<&dyn Drawable> {
        Some(self)
    }

    fn as_drawable_mut(&mut self) -> Option<&mut dyn Drawable> {
        Some(self)
    }
}

impl Drawable for InstancedDrawable {
    fn category(&self) -> Category {
        self.category
    }

    fn local_bounds(&self) -> Aabb {
        let corners = |bounds: &Aabb| {
            let (min, max) = (bounds.min, bounds.max);
            [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(min.x, min.y, max.z),
                Vec3::new(max.x, min.y, max.z),
                Vec3::new(min.x, max.y, max.z),
                Vec3::new(max.x, max.y, max.z),
            ]
        };

        let mut points = self.instances.iter().flat_map(|instance| {
            corners(&self.instance_bounds)
                .map(|corner| instance.transform_point(&corner.into()).coords)
        });
        let Some(first) = points.next() else {
            return self.instance_bounds;
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Aabb::new(min, max)
    }

    fn occlusion(&self) -> &Occlusion {
        &self.occlusion
    }

    fn occlusion_mut(&mut self) -> &mut Occlusion {
        &mut self.occlusion
    }

    fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }

    fn instances(&self) -> Option<&[Mat4]> {
        Some(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::render::{Geometry, HeadlessDevice, RenderDevice};
    use crate::resources::PrimitiveCache;
    use approx::assert_relative_eq;

    fn lease() -> (Arc<PrimitiveCache>, PrimitiveLease) {
        let device: Arc<dyn RenderDevice> = Arc::new(HeadlessDevice::new());
        let cache = Arc::new(PrimitiveCache::new(device));
        let geometry = Geometry {
            vertices: vec![0.0; 9],
            indices: Vec::new(),
            stride: 3,
        };
        let lease = cache.lease("tri", &geometry).unwrap();
        (cache, lease)
    }

    #[test]
    fn test_mesh_is_a_drawable() {
        let (_cache, primitive) = lease();
        let mut mesh = MeshDrawable::new(primitive, Some(MaterialId(2)), Aabb::unit())
            .with_category(Category::Transparent)
            .with_static(true);

        let component: &mut dyn Component = &mut mesh;
        let drawable = component.as_drawable_mut().unwrap();
        assert_eq!(drawable.category(), Category::Transparent);
        assert!(drawable.is_static());
        assert_eq!(drawable.surfaces()[&None].material, Some(MaterialId(2)));
        assert!(drawable.instances().is_none());
    }

    #[test]
    fn test_instanced_bounds_cover_every_instance() {
        let (_cache, primitive) = lease();
        let mut trees = InstancedDrawable::new(primitive, None, Aabb::unit());
        assert_eq!(trees.local_bounds(), Aabb::unit());

        trees.push(Mat4::new_translation(&Vec3::new(-5.0, 0.0, 0.0)));
        trees.push(Mat4::new_translation(&Vec3::new(5.0, 2.0, 0.0)));
        let bounds = trees.local_bounds();
        let unit = Aabb::unit();

        assert_relative_eq!(bounds.min, unit.min + Vec3::new(-5.0, 0.0, 0.0));
        assert_relative_eq!(bounds.max, unit.max + Vec3::new(5.0, 2.0, 0.0));
        assert_eq!(trees.instances().map(<[Mat4]>::len), Some(2));
    }
}
