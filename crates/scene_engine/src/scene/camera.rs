//! # Camera rig
//!
//! A camera is a transform plus a lens. The view matrix depends only on the
//! pose and the projection matrix only on the lens, so each is cached behind its
//! own dirty flag and rebuilt lazily when queried.
//!
//! ## Coordinate System
//! Right-handed, Y-up. With identity rotation the camera looks down -Z:
//! - front = rotation * (0, 0, -1)
//! - up    = rotation * (0, 1, 0)
//! - right = rotation * (1, 0, 0)

use crate::config::{ConfigError, LensConfig};
use crate::foundation::math::utils::{deg_to_rad, rad_to_deg};
use crate::foundation::math::{try_normalize, Basis, Mat4, Mat4Ext, MathError, Quat, Vec3};
use crate::transform::{ChangeFlags, TransformError, TransformState};

/// Perspective camera driven by an interpolated transform
#[derive(Debug, Clone)]
pub struct CameraRig {
    transform: TransformState,

    /// Vertical field of view in radians
    field_of_view: f32,
    near_plane: f32,
    far_plane: f32,
    aspect_ratio: f32,

    basis: Basis,
    /// Pose the basis and view matrix were derived from
    synced_position: Vec3,
    synced_rotation: Quat,

    view_dirty: bool,
    project_dirty: bool,
    view_matrix: Mat4,
    project_matrix: Mat4,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::build(TransformState::new(), &LensConfig::default())
    }
}

impl CameraRig {
    /// Camera at the origin looking down -Z with the given lens.
    ///
    /// Fails with [`ConfigError::Invalid`] when the lens does not pass
    /// [`LensConfig::validate`].
    pub fn from_lens(lens: &LensConfig) -> Result<Self, ConfigError> {
        Self::with_transform(TransformState::new(), lens)
    }

    /// Camera around an existing transform.
    pub fn with_transform(transform: TransformState, lens: &LensConfig) -> Result<Self, ConfigError> {
        lens.validate()?;
        Ok(Self::build(transform, lens))
    }

    /// `lens` must already have passed [`LensConfig::validate`].
    pub(crate) fn build(transform: TransformState, lens: &LensConfig) -> Self {
        let rotation = transform.rotation().current();
        Self {
            basis: Basis::from_rotation(&rotation),
            synced_position: transform.position().current(),
            synced_rotation: rotation,
            transform,
            field_of_view: deg_to_rad(lens.field_of_view_degrees),
            near_plane: lens.near_plane,
            far_plane: lens.far_plane,
            aspect_ratio: lens.aspect_ratio,
            view_dirty: true,
            project_dirty: true,
            view_matrix: Mat4::identity(),
            project_matrix: Mat4::identity(),
        }
    }

    /// Underlying transform
    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    /// Mutable transform access.
    ///
    /// Pose edits made here are picked up by the next [`update`](Self::update)
    /// or view query.
    pub fn transform_mut(&mut self) -> &mut TransformState {
        &mut self.transform
    }

    /// Advance the transform and refresh the derived basis if it moved.
    pub fn update(&mut self, delta_time: f32) -> ChangeFlags {
        let changes = self.transform.advance(delta_time);
        self.sync_pose();
        changes
    }

    fn sync_pose(&mut self) {
        let position = self.transform.position().current();
        let rotation = self.transform.rotation().current();

        if rotation != self.synced_rotation {
            self.basis = Basis::from_rotation(&rotation);
            self.synced_rotation = rotation;
            self.view_dirty = true;
        }
        if position != self.synced_position {
            self.synced_position = position;
            self.view_dirty = true;
        }
    }

    /// Viewing direction
    pub fn front(&self) -> Vec3 {
        self.basis.front
    }

    /// Camera up vector
    pub fn up(&self) -> Vec3 {
        self.basis.up
    }

    /// Camera right vector
    pub fn right(&self) -> Vec3 {
        self.basis.right
    }

    /// Derived basis
    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    /// True when the next view query will rebuild.
    pub fn is_view_dirty(&self) -> bool {
        self.view_dirty
            || self.transform.position().current() != self.synced_position
            || self.transform.rotation().current() != self.synced_rotation
    }

    /// True when the next projection query will rebuild.
    pub fn is_project_dirty(&self) -> bool {
        self.project_dirty
    }

    /// World-to-view matrix, rebuilt only when the pose changed.
    pub fn view_matrix(&mut self) -> Mat4 {
        self.sync_pose();
        if self.view_dirty {
            let eye = self.synced_position;
            self.view_matrix = match Mat4::look_at(eye, eye + self.basis.front, self.basis.up) {
                Ok(view) => view,
                Err(err) => {
                    log::warn!("Camera basis degenerate ({err}), using canonical basis");
                    Mat4::view_from_basis(eye, &Basis::default())
                }
            };
            self.view_dirty = false;
            log::trace!("Camera view matrix rebuilt at {eye:?}");
        }
        self.view_matrix
    }

    /// Projection matrix, rebuilt only when a lens setting changed.
    pub fn project_matrix(&mut self) -> Mat4 {
        if self.project_dirty {
            self.project_matrix = Mat4::perspective_fov(
                self.field_of_view,
                self.aspect_ratio,
                self.near_plane,
                self.far_plane,
            );
            self.project_dirty = false;
            log::trace!(
                "Camera projection rebuilt: fov {:.3} rad, aspect {:.3}, planes {}..{}",
                self.field_of_view,
                self.aspect_ratio,
                self.near_plane,
                self.far_plane
            );
        }
        self.project_matrix
    }

    /// Vertical field of view in radians
    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    /// Vertical field of view in degrees
    pub fn field_of_view_degrees(&self) -> f32 {
        rad_to_deg(self.field_of_view)
    }

    /// Near clipping plane distance
    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    /// Far clipping plane distance
    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    /// Viewport width / height
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Set the vertical field of view in radians, exclusive range `(0, PI)`.
    pub fn set_field_of_view(&mut self, radians: f32) -> Result<(), TransformError> {
        let radians = finite(radians, "field of view")?;
        if radians <= 0.0 || radians >= std::f32::consts::PI {
            return Err(TransformError::OutOfRange { what: "field of view", value: radians });
        }
        self.field_of_view = radians;
        self.project_dirty = true;
        Ok(())
    }

    /// Set the vertical field of view in degrees.
    pub fn set_field_of_view_degrees(&mut self, degrees: f32) -> Result<(), TransformError> {
        self.set_field_of_view(deg_to_rad(finite(degrees, "field of view")?))
    }

    /// Set the near clipping plane; must stay in front of the far plane.
    pub fn set_near_plane(&mut self, near: f32) -> Result<(), TransformError> {
        let near = finite(near, "near plane")?;
        if near <= 0.0 || near >= self.far_plane {
            return Err(TransformError::OutOfRange { what: "near plane", value: near });
        }
        self.near_plane = near;
        self.project_dirty = true;
        Ok(())
    }

    /// Set the far clipping plane; must lie beyond the near plane.
    pub fn set_far_plane(&mut self, far: f32) -> Result<(), TransformError> {
        let far = finite(far, "far plane")?;
        if far <= self.near_plane {
            return Err(TransformError::OutOfRange { what: "far plane", value: far });
        }
        self.far_plane = far;
        self.project_dirty = true;
        Ok(())
    }

    /// Set the aspect ratio (width / height).
    pub fn set_aspect_ratio(&mut self, aspect: f32) -> Result<(), TransformError> {
        let aspect = finite(aspect, "aspect ratio")?;
        if aspect <= 0.0 {
            return Err(TransformError::OutOfRange { what: "aspect ratio", value: aspect });
        }
        if (self.aspect_ratio - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect_ratio, aspect);
        }
        self.aspect_ratio = aspect;
        self.project_dirty = true;
        Ok(())
    }

    /// Derive the aspect ratio from viewport dimensions.
    // Viewport sides stay far below 2^24, where f32 stops being exact.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::OutOfRange {
                what: "viewport",
                value: if width == 0 { width as f32 } else { height as f32 },
            });
        }
        self.set_aspect_ratio(width as f32 / height as f32)
    }

    /// Snap the rotation so the camera faces `target`.
    ///
    /// Looking straight up or down falls back to +Z as the up reference.
    pub fn look_at(&mut self, target: Vec3) -> Result<(), TransformError> {
        if !crate::foundation::math::is_finite(&target) {
            return Err(TransformError::NonFiniteValue { what: "look-at target" });
        }
        let direction = try_normalize(&(target - self.transform.position().current()))?;

        let up = if direction.cross(&Vec3::y()).norm() < 1e-4 {
            log::warn!("Camera look-at parallel to world up, {}", MathError::DegenerateRotationAxis);
            Vec3::z()
        } else {
            Vec3::y()
        };

        // face_towards aligns +Z with its argument; the camera looks down -Z.
        self.transform.set_rotation(Quat::face_towards(&-direction, &up))?;
        self.sync_pose();
        Ok(())
    }
}

fn finite(value: f32, what: &'static str) -> Result<f32, TransformError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TransformError::NonFiniteValue { what })
    }
}
