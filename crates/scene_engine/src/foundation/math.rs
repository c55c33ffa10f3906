//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of helpers the transform
//! engine needs: pose composition, camera matrices and guarded normalization.
//!
//! ## Matrix convention
//!
//! Column vectors throughout. A pose composes as `T * R * S` and a child's
//! world matrix is `parent_world * local`. This is the column-major form of the
//! row-vector `Scale * Rotate * Translate` / `local * parent_world` ordering.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, UnitQuaternion, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Unit quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Magnitude below which a vector is treated as zero-length.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Errors raised by degenerate geometric input.
///
/// None of these are fatal: callers fall back to a default basis and keep going.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// A vector that had to be normalized was (nearly) zero-length
    #[error("vector is too short to normalize")]
    ZeroLengthVector,

    /// A rotation axis or cross product collapsed to (nearly) zero
    #[error("rotation axis is degenerate")]
    DegenerateRotationAxis,
}

/// Normalize `v`, refusing vectors shorter than [`NORMALIZE_EPSILON`].
pub fn try_normalize(v: &Vec3) -> Result<Vec3, MathError> {
    if !is_finite(v) {
        return Err(MathError::ZeroLengthVector);
    }
    v.try_normalize(NORMALIZE_EPSILON)
        .ok_or(MathError::ZeroLengthVector)
}

/// Build a rotation of `angle` radians about `axis` (need not be unit length).
pub fn axis_angle(axis: &Vec3, angle: f32) -> Result<Quat, MathError> {
    if !is_finite(axis) || !angle.is_finite() {
        return Err(MathError::DegenerateRotationAxis);
    }
    Unit::try_new(*axis, NORMALIZE_EPSILON)
        .map(|unit| Quat::from_axis_angle(&unit, angle))
        .ok_or(MathError::DegenerateRotationAxis)
}

/// True when every component of `v` is finite.
pub fn is_finite(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// True when every quaternion component is finite.
pub fn is_finite_quat(q: &Quat) -> bool {
    q.coords.iter().all(|c| c.is_finite())
}

/// Snapshot of position, rotation and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in parent space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Pose {
    /// Identity pose
    pub fn identity() -> Self {
        Self::default()
    }

    /// Pose with only a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder: replace the rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder: replace the scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Compose into a matrix (`T * R * S`).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose a TRS matrix, e.g. a node transform handed over by scene import.
    ///
    /// Shear is discarded. Axes with zero scale produce an identity rotation
    /// for that column instead of dividing by zero.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let columns = [
            Vec3::new(matrix.m11, matrix.m21, matrix.m31),
            Vec3::new(matrix.m12, matrix.m22, matrix.m32),
            Vec3::new(matrix.m13, matrix.m23, matrix.m33),
        ];
        let scale = Vec3::new(columns[0].norm(), columns[1].norm(), columns[2].norm());

        let axis = |i: usize, fallback: Vec3| {
            if scale[i] > NORMALIZE_EPSILON {
                columns[i] / scale[i]
            } else {
                fallback
            }
        };
        let rotation_matrix = Mat3::from_columns(&[
            axis(0, Vec3::x()),
            axis(1, Vec3::y()),
            axis(2, Vec3::z()),
        ]);
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        is_finite(&self.position) && is_finite_quat(&self.rotation) && is_finite(&self.scale)
    }
}

/// Orthonormal camera basis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    /// Viewing direction
    pub front: Vec3,
    /// Up direction
    pub up: Vec3,
    /// Right direction
    pub right: Vec3,
}

impl Default for Basis {
    /// Canonical basis: looking down -Z with +Y up.
    fn default() -> Self {
        Self {
            front: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            right: Vec3::new(1.0, 0.0, 0.0),
        }
    }
}

impl Basis {
    /// Rotate the canonical basis by `rotation`.
    pub fn from_rotation(rotation: &Quat) -> Self {
        let canonical = Self::default();
        Self {
            front: rotation * canonical.front,
            up: rotation * canonical.up,
            right: rotation * canonical.right,
        }
    }

    /// Orthonormal basis looking along `forward` with `up_hint` as approximate up.
    pub fn looking_along(forward: &Vec3, up_hint: &Vec3) -> Result<Self, MathError> {
        let front = try_normalize(forward)?;
        let right = try_normalize(&front.cross(up_hint))
            .map_err(|_| MathError::DegenerateRotationAxis)?;
        let up = right.cross(&front);
        Ok(Self { front, up, right })
    }
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians.to_degrees()
    }
}

/// Extension trait for Mat4 with camera matrix constructors
pub trait Mat4Ext {
    /// Right-handed perspective projection with depth mapped to `[0, 1]`.
    fn perspective_fov(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed view matrix looking from `eye` towards `target`.
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Result<Mat4, MathError>;

    /// View matrix from an already orthonormal basis.
    fn view_from_basis(eye: Vec3, basis: &Basis) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective_fov(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let focal = 1.0 / (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = focal / aspect;
        result[(1, 1)] = focal;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = (near * far) / (near - far);
        result[(3, 2)] = -1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Result<Mat4, MathError> {
        let basis = Basis::looking_along(&(target - eye), &up)?;
        Ok(Self::view_from_basis(eye, &basis))
    }

    fn view_from_basis(eye: Vec3, basis: &Basis) -> Mat4 {
        let Basis { front, up, right } = *basis;

        let translation = Mat4::new_translation(&-eye);
        #[rustfmt::skip]
        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            up.x, up.y, up.z, 0.0,
            -front.x, -front.y, -front.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_pose_matrix_places_translation_last() {
        let pose = Pose::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2))
            .with_scale(Vec3::new(2.0, 2.0, 2.0));

        // Local +X: scaled to 2, rotated onto -Z, then translated.
        let moved = pose.to_matrix().transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(moved.coords, Vec3::new(1.0, 2.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_pose_matrix_roundtrip() {
        let pose = Pose::from_position(Vec3::new(-4.0, 0.5, 9.0))
            .with_rotation(Quat::from_axis_angle(&Unit::new_normalize(Vec3::new(1.0, 1.0, 0.0)), 0.7))
            .with_scale(Vec3::new(0.5, 3.0, 1.25));

        let decomposed = Pose::from_matrix(&pose.to_matrix());

        assert_relative_eq!(decomposed.position, pose.position, epsilon = EPSILON);
        assert_relative_eq!(decomposed.scale, pose.scale, epsilon = EPSILON);
        let dot = decomposed.rotation.coords.dot(&pose.rotation.coords);
        assert!(dot.abs() > 0.9999, "rotation mismatch: dot = {dot}");
    }

    #[test]
    fn test_try_normalize_rejects_zero() {
        assert_eq!(try_normalize(&Vec3::zeros()), Err(MathError::ZeroLengthVector));
        assert_eq!(
            try_normalize(&Vec3::new(f32::NAN, 0.0, 1.0)),
            Err(MathError::ZeroLengthVector)
        );
        assert_relative_eq!(
            try_normalize(&Vec3::new(0.0, 3.0, 0.0)).unwrap(),
            Vec3::y(),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_axis_angle_rejects_zero_axis() {
        assert_eq!(axis_angle(&Vec3::zeros(), 1.0), Err(MathError::DegenerateRotationAxis));

        let q = axis_angle(&Vec3::new(0.0, 5.0, 0.0), FRAC_PI_2).unwrap();
        assert_relative_eq!(q * Vec3::x(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_basis_from_identity_is_canonical() {
        let basis = Basis::from_rotation(&Quat::identity());
        assert_eq!(basis, Basis::default());
    }

    #[test]
    fn test_look_at_degenerate_up() {
        let result = Mat4::look_at(Vec3::zeros(), Vec3::new(0.0, 5.0, 0.0), Vec3::y());
        assert_eq!(result, Err(MathError::DegenerateRotationAxis));

        let result = Mat4::look_at(Vec3::zeros(), Vec3::zeros(), Vec3::y());
        assert_eq!(result, Err(MathError::ZeroLengthVector));
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y()).unwrap();

        let origin_in_view = view.transform_point(&nalgebra::Point3::origin());
        // Target sits straight ahead, along -Z in view space.
        assert_relative_eq!(origin_in_view.coords, Vec3::new(0.0, 0.0, -5.0), epsilon = EPSILON);
    }

    #[test]
    fn test_view_from_basis_rows_are_camera_axes() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let basis = Basis::from_rotation(&Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2));
        let view = Mat4::view_from_basis(eye, &basis);

        let to_view = |offset: Vec3| view.transform_point(&nalgebra::Point3::from(eye + offset)).coords;
        assert_relative_eq!(to_view(basis.right), Vec3::x(), epsilon = EPSILON);
        assert_relative_eq!(to_view(basis.up), Vec3::y(), epsilon = EPSILON);
        assert_relative_eq!(to_view(basis.front), -Vec3::z(), epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_depth_range() {
        let near = 0.1;
        let far = 100.0;
        let projection = Mat4::perspective_fov(FRAC_PI_2, 1.0, near, far);

        let project_depth = |z: f32| {
            let clip = projection * Vec4::new(0.0, 0.0, z, 1.0);
            clip.z / clip.w
        };
        assert_relative_eq!(project_depth(-near), 0.0, epsilon = EPSILON);
        assert_relative_eq!(project_depth(-far), 1.0, epsilon = 1e-4);
    }
}
