//! Math utilities and types
//!
//! nalgebra aliases plus the transform and projection helpers shared by the
//! scene graph, the culling code and the render stages.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Local transform of an entity: position, rotation and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position relative to the parent entity
    pub position: Vec3,

    /// Rotation relative to the parent entity
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Set the rotation (builder)
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set a uniform scale (builder)
    #[must_use]
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Translation column of an affine matrix
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Rotation of an affine matrix with its axis scale removed
pub fn rotation_of(matrix: &Mat4) -> Quat {
    let axis = |column: usize, fallback: Vec3| {
        let axis = Vec3::new(matrix[(0, column)], matrix[(1, column)], matrix[(2, column)]);
        axis.try_normalize(f32::EPSILON).unwrap_or(fallback)
    };
    let basis = Matrix3::from_columns(&[axis(0, Vec3::x()), axis(1, Vec3::y()), axis(2, Vec3::z())]);
    Quat::from_matrix(&basis)
}

/// Largest axis scale of an affine matrix, used to grow bounding radii
pub fn max_axis_scale(matrix: &Mat4) -> f32 {
    let x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
    let y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
    let z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
    x.max(y).max(z)
}

/// Column-major float array for GPU upload
pub fn to_cols_array(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Extension trait for Mat4 with projection helpers
pub trait Mat4Ext {
    /// Perspective projection with depth mapped to [0, 1]
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Axis flip applied between view and projection (Y down, Z into the screen)
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new_translation(&-eye);
        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0, -1.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_matrix_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).with_uniform_scale(2.0);
        let matrix = transform.to_matrix();
        assert_relative_eq!(translation_of(&matrix), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(max_axis_scale(&matrix), 2.0);
    }

    #[test]
    fn test_rotation_ignores_scale() {
        let rotation = Quat::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2);
        let matrix = Transform::from_position(Vec3::new(4.0, 0.0, 0.0))
            .with_rotation(rotation)
            .with_uniform_scale(3.0)
            .to_matrix();
        assert_relative_eq!(rotation_of(&matrix).angle_to(&rotation), 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotation_of(&Mat4::identity()).angle(), 0.0);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());
        let p = view.transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(p.coords, Vec3::zeros(), epsilon = 1e-5);

        // Target lies down the negative Z axis in view space
        let t = view.transform_point(&Point3::origin());
        assert_relative_eq!(t.z, -5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = Mat4::perspective(1.0, 1.0, 0.5, 50.0);
        let near = proj * Vec4::new(0.0, 0.0, 0.5, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, 50.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_cols_array_layout() {
        let matrix = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let cols = to_cols_array(&matrix);
        assert_eq!(&cols[12..15], &[4.0, 5.0, 6.0]);
    }
}
