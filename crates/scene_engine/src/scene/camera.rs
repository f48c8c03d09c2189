//! Camera component
//!
//! A camera owns the render pipeline it drives. The scene renders through
//! the pipeline of its active camera, building a [`Viewer`] from the
//! camera's entity each frame.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ecs::{Component, EntityCore, Named, TypeKey};
use crate::render::{CullingMode, Projection, RenderSystem, Viewer};

/// Component turning an entity into a viewpoint
pub struct Camera {
    /// Projection parameters
    pub projection: Projection,
    /// Culling traversal used by geometry stages
    pub culling: CullingMode,
    system: Arc<Mutex<RenderSystem>>,
}

impl Camera {
    /// Camera driving `system` with the default projection and frustum culling
    pub fn new(system: RenderSystem) -> Self {
        Self {
            projection: Projection::default(),
            culling: CullingMode::Frustum,
            system: Arc::new(Mutex::new(system)),
        }
    }

    /// Set the projection (builder)
    #[must_use]
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Set the culling mode (builder)
    #[must_use]
    pub fn with_culling(mut self, culling: CullingMode) -> Self {
        self.culling = culling;
        self
    }

    /// Pipeline rendered by this camera
    pub fn render_system(&self) -> Arc<Mutex<RenderSystem>> {
        Arc::clone(&self.system)
    }

    /// Snapshot of this camera placed at `core`
    pub fn viewer(&self, core: &EntityCore) -> Viewer {
        Viewer::from_camera(self, core)
    }
}

impl Viewer {
    /// Snapshot of `camera` as placed by its entity's world matrix
    pub fn from_camera(camera: &Camera, core: &EntityCore) -> Self {
        Self::from_world(
            core.world_matrix(),
            core.world_rotation(),
            &camera.projection,
            camera.culling,
        )
    }
}

impl Named for Camera {
    const NAME: &'static str = "Camera";
}

impl Component for Camera {
    fn type_key(&self) -> TypeKey {
        Self::KEY
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("projection", &self.projection)
            .field("culling", &self.culling)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::StageSetup;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    #[test]
    fn test_viewer_follows_entity() {
        let mut ids: SlotMap<crate::ecs::EntityId, ()> = SlotMap::with_key();
        let mut entity = crate::ecs::Entity::new(ids.insert(()), "eye");
        entity
            .core_mut()
            .set_transform(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
        entity.core_mut().refresh_world(None);

        let camera = Camera::new(RenderSystem::new(StageSetup::default())).with_culling(CullingMode::Disabled);
        let viewer = camera.viewer(entity.core());

        assert_relative_eq!(viewer.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(viewer.culling, CullingMode::Disabled);
        assert_relative_eq!(viewer.near, camera.projection.near);
    }

    #[test]
    fn test_viewer_uses_world_rotation() {
        use crate::foundation::math::{Quat, Vector3};
        use std::f32::consts::FRAC_PI_2;

        let mut ids: SlotMap<crate::ecs::EntityId, ()> = SlotMap::with_key();
        let mut rig = crate::ecs::Entity::new(ids.insert(()), "rig");
        let turn = Quat::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        rig.core_mut().set_transform(Transform::default().with_rotation(turn));
        let rig_world = rig.core_mut().refresh_world(None);

        let mut eye = crate::ecs::Entity::new(ids.insert(()), "eye");
        eye.core_mut()
            .set_transform(Transform::from_position(Vec3::new(0.0, 0.0, 2.0)));
        eye.core_mut().refresh_world(Some(&rig_world));

        let camera = Camera::new(RenderSystem::new(StageSetup::default()));
        let viewer = camera.viewer(eye.core());
        assert_relative_eq!(viewer.rotation.angle(), FRAC_PI_2, epsilon = 1e-5);
        assert_relative_eq!(viewer.position, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_render_system_is_shared() {
        let camera = Camera::new(RenderSystem::new(StageSetup::default()));
        let system = camera.render_system();
        assert!(Arc::ptr_eq(&system, &camera.render_system()));
        assert_eq!(system.lock().stage_count(), 0);
    }
}
