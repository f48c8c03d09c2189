//! # Viewer Snapshot
//!
//! A [`Viewer`] freezes everything a render pass needs to know about the
//! camera for one frame: matrices, position, clip distances, the frustum
//! extracted from the combined matrix and the culling mode that decides how
//! geometry stages traverse the scene index.
//!
//! ## Matrix Chain
//!
//! `combined = projection * vulkan_coordinate_transform * view`
//!
//! View space is right-handed and Y-up; the axis flip maps it to clip space
//! with Y down and depth in [0, 1].

use std::f32::consts::FRAC_PI_2;

use crate::foundation::math::{translation_of, Mat4, Mat4Ext, Quat, Vec3};
use crate::spatial::{Frustum, Sphere};

/// Traversal used by culling queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CullingMode {
    /// Octree traversal against the view frustum
    Frustum,
    /// Octree traversal against a bounding sphere
    Bounding(Sphere),
    /// Linear scan over every component
    Disabled,
}

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Projection matrix with depth mapped to [0, 1]
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }
}

/// Cube face directions and up vectors in +X, -X, +Y, -Y, +Z, -Z order
const CUBE_FACES: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

/// Per-frame camera snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// World to clip
    pub combined: Mat4,
    /// Clip to world
    pub inverse: Mat4,
    /// World to clip for each cube face, +X, -X, +Y, -Y, +Z, -Z
    pub cube: [Mat4; 6],
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: Quat,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Frustum of `combined`
    pub frustum: Frustum,
    /// Culling traversal
    pub culling: CullingMode,
}

impl Viewer {
    /// Snapshot a camera whose entity has world matrix `world`
    pub fn from_world(world: &Mat4, rotation: Quat, projection: &Projection, culling: CullingMode) -> Self {
        let view = world.try_inverse().unwrap_or_else(Mat4::identity);
        Self::from_view(view, translation_of(world), rotation, projection, culling)
    }

    /// Snapshot from an explicit view matrix
    pub fn from_view(
        view: Mat4,
        position: Vec3,
        rotation: Quat,
        projection: &Projection,
        culling: CullingMode,
    ) -> Self {
        let proj = projection.matrix();
        let combined = proj * Mat4::vulkan_coordinate_transform() * view;
        let inverse = combined.try_inverse().unwrap_or_else(Mat4::identity);

        let cube_proj = Mat4::perspective(FRAC_PI_2, 1.0, projection.near, projection.far)
            * Mat4::vulkan_coordinate_transform();
        let cube = CUBE_FACES.map(|(direction, up)| {
            let direction = Vec3::from(direction);
            cube_proj * Mat4::look_at(position, position + direction, Vec3::from(up))
        });

        Self {
            view,
            projection: proj,
            combined,
            inverse,
            cube,
            position,
            rotation,
            near: projection.near,
            far: projection.far,
            frustum: Frustum::from_matrix(&combined),
            culling,
        }
    }

    /// Same snapshot with another culling mode
    #[must_use]
    pub fn with_culling(mut self, culling: CullingMode) -> Self {
        self.culling = culling;
        self
    }

    /// Whether a world sphere survives the culling mode
    pub fn is_visible(&self, sphere: &Sphere) -> bool {
        match self.culling {
            CullingMode::Frustum => self.frustum.intersects_sphere(sphere),
            CullingMode::Bounding(bounds) => bounds.intersects(sphere),
            CullingMode::Disabled => true,
        }
    }

    /// Distance from the viewer to a world point
    pub fn distance_to(&self, point: &Vec3) -> f32 {
        (point - self.position).magnitude()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Point3, Transform};
    use approx::assert_relative_eq;

    fn viewer_at(position: Vec3) -> Viewer {
        let world = Transform::from_position(position).to_matrix();
        Viewer::from_world(&world, Quat::identity(), &Projection::default(), CullingMode::Frustum)
    }

    #[test]
    fn test_view_is_inverse_world() {
        let viewer = viewer_at(Vec3::new(1.0, 2.0, 3.0));
        let p = viewer.view.transform_point(&Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(p.coords, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(viewer.position, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(viewer.combined * viewer.inverse, Mat4::identity(), epsilon = 1e-3);
    }

    #[test]
    fn test_frustum_culls_behind_camera() {
        let viewer = viewer_at(Vec3::zeros());
        assert!(viewer.is_visible(&Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
        assert!(!viewer.is_visible(&Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));

        let unculled = viewer.clone().with_culling(CullingMode::Disabled);
        assert!(unculled.is_visible(&Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
    }

    #[test]
    fn test_bounding_culling() {
        let viewer = viewer_at(Vec3::zeros())
            .with_culling(CullingMode::Bounding(Sphere::new(Vec3::zeros(), 5.0)));
        assert!(viewer.is_visible(&Sphere::new(Vec3::new(0.0, 0.0, 5.5), 1.0)));
        assert!(!viewer.is_visible(&Sphere::new(Vec3::new(0.0, 0.0, 7.0), 1.0)));
    }

    #[test]
    fn test_cube_faces_look_along_axes() {
        let viewer = viewer_at(Vec3::zeros());
        for (index, (direction, _)) in CUBE_FACES.iter().enumerate() {
            let ahead = Vec3::from(*direction) * 10.0;
            let clip = viewer.cube[index] * ahead.push(1.0);
            let depth = clip.z / clip.w;
            assert!(clip.w > 0.0, "face {index} looks away from its axis");
            assert!((0.0..=1.0).contains(&depth), "face {index} depth {depth}");
            assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
            assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        }
    }
}
