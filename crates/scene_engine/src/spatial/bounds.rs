//! Bounding volumes and the view frustum

use crate::foundation::math::{max_axis_scale, Mat4, Point3, Vec3, Vec4};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Unit cube centered at the origin
    pub fn unit() -> Self {
        Self::from_center_extents(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5))
    }

    /// Center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.y >= self.min.y && point.y <= self.max.y
            && point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
            && self.min.y <= other.max.y && self.max.y >= other.min.y
            && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Bounding sphere of this box after applying `transform`
    pub fn world_sphere(&self, transform: &Mat4) -> Sphere {
        let center = transform.transform_point(&Point3::from(self.center()));
        Sphere::new(center.coords, self.extents().magnitude() * max_axis_scale(transform))
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center in world space
    pub center: Vec3,
    /// Radius
    pub radius: f32,
}

impl Sphere {
    /// Create a sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check whether two spheres overlap
    pub fn intersects(&self, other: &Self) -> bool {
        let reach = self.radius + other.radius;
        (self.center - other.center).magnitude_squared() <= reach * reach
    }

    /// Check whether the sphere overlaps a box
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let closest = Vec3::new(
            self.center.x.clamp(aabb.min.x, aabb.max.x),
            self.center.y.clamp(aabb.min.y, aabb.max.y),
            self.center.z.clamp(aabb.min.z, aabb.max.z),
        );
        (closest - self.center).magnitude_squared() <= self.radius * self.radius
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the kept half-space
    pub normal: Vec3,
    /// Signed distance term
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize(),
            distance,
        }
    }

    /// Build a normalized plane from `ax + by + cz + d` coefficients
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = Vec3::new(coefficients.x, coefficients.y, coefficients.z);
        let length = normal.magnitude();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::zeros(),
                distance: 0.0,
            };
        }
        Self {
            normal: normal / length,
            distance: coefficients.w / length,
        }
    }

    /// Signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Six-plane view frustum
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Planes in order left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix (Gribb-Hartmann)
    ///
    /// Expects clip-space depth in [0, 1].
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { view_projection.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Check if a sphere is inside or intersects the frustum
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // Corner furthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
            if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
            if plane.normal.z >= 0.0 { p.z = aabb.max.z; }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use approx::assert_relative_eq;

    fn camera_frustum() -> Frustum {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let combined = proj * Mat4::vulkan_coordinate_transform() * Mat4::identity();
        Frustum::from_matrix(&combined)
    }

    #[test]
    fn test_frustum_keeps_points_in_front() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -5.0), 0.1)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 0.1)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -150.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(20.0, 0.0, -5.0), 1.0)));
    }

    #[test]
    fn test_frustum_plane_normals_are_unit() {
        for plane in camera_frustum().planes {
            assert_relative_eq!(plane.normal.magnitude(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_frustum_aabb_test() {
        let frustum = camera_frustum();
        let visible = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::new(1.0, 1.0, 1.0));
        let behind = Aabb::from_center_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&behind));
    }

    #[test]
    fn test_world_sphere_scales_radius() {
        let transform = Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0)) * Mat4::new_scaling(2.0);
        let sphere = Aabb::unit().world_sphere(&transform);
        assert_relative_eq!(sphere.center, Vec3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(sphere.radius, Vec3::new(0.5, 0.5, 0.5).magnitude() * 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_overlaps() {
        let a = Sphere::new(Vec3::zeros(), 1.0);
        assert!(a.intersects(&Sphere::new(Vec3::new(1.5, 0.0, 0.0), 0.6)));
        assert!(!a.intersects(&Sphere::new(Vec3::new(3.0, 0.0, 0.0), 0.6)));
        assert!(a.intersects_aabb(&Aabb::from_center_extents(Vec3::new(1.5, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0))));
    }
}
