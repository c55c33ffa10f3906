//! Position/rotation/scale state with blending and change tracking.

use bitflags::bitflags;

use super::interpolated::{Interpolate, InterpolatedValue};
use crate::foundation::math::{Mat4, MathError, Pose, Quat, Vec3, NORMALIZE_EPSILON};

bitflags! {
    /// Which transform channels changed during an advance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u8 {
        /// Position moved
        const POSITION = 1 << 0;
        /// Rotation moved
        const ROTATION = 1 << 1;
        /// Scale moved
        const SCALE = 1 << 2;
    }
}

/// Errors raised by transform setters. State is untouched when one is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// NaN or infinity in a vector, quaternion or scalar argument
    #[error("rejected non-finite {what}")]
    NonFiniteValue {
        /// Which argument carried the bad value
        what: &'static str,
    },

    /// A finite value outside the accepted range
    #[error("{what} out of range: {value}")]
    OutOfRange {
        /// Which argument was out of range
        what: &'static str,
        /// The rejected value
        value: f32,
    },

    /// Degenerate geometry in the argument
    #[error(transparent)]
    Math(#[from] MathError),
}

fn ensure_finite<T: Interpolate>(value: &T, what: &'static str) -> Result<(), TransformError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TransformError::NonFiniteValue { what })
    }
}

/// Re-project onto the unit sphere; a (near) zero quaternion names no rotation.
fn renormalize(rotation: &Quat) -> Result<Quat, TransformError> {
    ensure_finite(rotation, "rotation")?;
    Quat::try_new(rotation.into_inner(), NORMALIZE_EPSILON)
        .ok_or(TransformError::Math(MathError::DegenerateRotationAxis))
}

/// Smoothly interpolated position, rotation and scale.
///
/// Pose-changing calls come in two flavours: the `set_*` family snaps
/// immediately (spawn, reset, re-centering) while `move_*`, `rotate*` and
/// `scale_to` only move the target and let [`advance`](Self::advance) blend.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformState {
    position: InterpolatedValue<Vec3>,
    rotation: InterpolatedValue<Quat>,
    scale: InterpolatedValue<Vec3>,
    matrix_dirty: bool,
}

impl Default for TransformState {
    fn default() -> Self {
        Self::settled(&Pose::default())
    }
}

impl TransformState {
    /// Identity transform
    pub fn new() -> Self {
        Self::default()
    }

    fn settled(pose: &Pose) -> Self {
        Self {
            position: InterpolatedValue::new(pose.position),
            rotation: InterpolatedValue::new(pose.rotation),
            scale: InterpolatedValue::new(pose.scale),
            matrix_dirty: true,
        }
    }

    /// Settled transform at `pose`.
    pub fn from_pose(pose: &Pose) -> Result<Self, TransformError> {
        if !pose.is_finite() {
            return Err(TransformError::NonFiniteValue { what: "pose" });
        }
        let rotation = renormalize(&pose.rotation)?;
        Ok(Self::settled(&Pose { rotation, ..*pose }))
    }

    /// Settled transform decomposed from a TRS matrix (scene import).
    pub fn from_matrix(matrix: &Mat4) -> Result<Self, TransformError> {
        if matrix.iter().any(|c| !c.is_finite()) {
            return Err(TransformError::NonFiniteValue { what: "matrix" });
        }
        Self::from_pose(&Pose::from_matrix(matrix))
    }

    /// Position channel
    pub fn position(&self) -> &InterpolatedValue<Vec3> {
        &self.position
    }

    /// Rotation channel
    pub fn rotation(&self) -> &InterpolatedValue<Quat> {
        &self.rotation
    }

    /// Scale channel
    pub fn scale(&self) -> &InterpolatedValue<Vec3> {
        &self.scale
    }

    /// Blended pose as of the last advance.
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position.current(),
            rotation: self.rotation.current(),
            scale: self.scale.current(),
        }
    }

    /// Pose being approached.
    pub fn target_pose(&self) -> Pose {
        Pose {
            position: self.position.target(),
            rotation: self.rotation.target(),
            scale: self.scale.target(),
        }
    }

    /// True when every channel has reached its target.
    pub fn is_settled(&self) -> bool {
        self.position.is_settled() && self.rotation.is_settled() && self.scale.is_settled()
    }

    /// True when a current value changed since the last matrix build.
    pub fn is_matrix_dirty(&self) -> bool {
        self.matrix_dirty
    }

    /// Build the local matrix if dirty, clearing the flag. Returns `None` when clean.
    pub fn rebuild_matrix(&mut self) -> Option<Mat4> {
        if !self.matrix_dirty {
            return None;
        }
        self.matrix_dirty = false;
        Some(self.pose().to_matrix())
    }

    /// Blend every channel by `factor` and report which ones moved.
    pub fn advance(&mut self, factor: f32) -> ChangeFlags {
        let mut changes = ChangeFlags::empty();
        if self.position.advance(factor) {
            changes |= ChangeFlags::POSITION;
        }
        if self.rotation.advance(factor) {
            changes |= ChangeFlags::ROTATION;
        }
        if self.scale.advance(factor) {
            changes |= ChangeFlags::SCALE;
        }

        if !changes.is_empty() {
            self.matrix_dirty = true;
        }
        changes
    }

    /// Shift the position target by `delta`.
    pub fn move_by(&mut self, delta: Vec3) -> Result<(), TransformError> {
        ensure_finite(&delta, "position delta")?;
        let target = self.position.target() + delta;
        ensure_finite(&target, "position")?;
        self.position.set_target(target);
        Ok(())
    }

    /// Replace the position target.
    pub fn move_to(&mut self, position: Vec3) -> Result<(), TransformError> {
        ensure_finite(&position, "position")?;
        self.position.set_target(position);
        Ok(())
    }

    /// Carry the whole position channel by `delta`, including any transition
    /// in flight. Used when a parent drags its children along.
    pub fn translate(&mut self, delta: Vec3) -> Result<(), TransformError> {
        ensure_finite(&delta, "position delta")?;
        let mut moved = self.position;
        moved.translate(delta);
        for value in [moved.previous(), moved.current(), moved.target()] {
            ensure_finite(&value, "position")?;
        }
        if moved != self.position {
            self.position = moved;
            self.matrix_dirty = true;
        }
        Ok(())
    }

    /// Snap to `position` without blending.
    pub fn set_position(&mut self, position: Vec3) -> Result<(), TransformError> {
        ensure_finite(&position, "position")?;
        self.position.set_immediate(position);
        self.matrix_dirty = true;
        Ok(())
    }

    /// Snap to `rotation` without blending.
    pub fn set_rotation(&mut self, rotation: Quat) -> Result<(), TransformError> {
        let rotation = renormalize(&rotation)?;
        self.rotation.set_immediate(rotation);
        self.matrix_dirty = true;
        Ok(())
    }

    /// Snap to `scale` without blending.
    pub fn set_scale(&mut self, scale: Vec3) -> Result<(), TransformError> {
        ensure_finite(&scale, "scale")?;
        self.scale.set_immediate(scale);
        self.matrix_dirty = true;
        Ok(())
    }

    /// Snap to a uniform scale.
    pub fn set_uniform_scale(&mut self, scale: f32) -> Result<(), TransformError> {
        self.set_scale(Vec3::new(scale, scale, scale))
    }

    /// Blend towards `scale`.
    pub fn scale_to(&mut self, scale: Vec3) -> Result<(), TransformError> {
        ensure_finite(&scale, "scale")?;
        self.scale.set_target(scale);
        Ok(())
    }

    /// Compose `rotation` onto the rotation target (`target * rotation`).
    pub fn rotate(&mut self, rotation: Quat) -> Result<(), TransformError> {
        renormalize(&rotation)?;
        let target = renormalize(&(self.rotation.target() * rotation))?;
        self.rotation.set_target(target);
        Ok(())
    }

    /// Revolve the position target about `pivot` and spin by the same rotation.
    ///
    /// Position and orientation move together so an orbiting body keeps facing
    /// consistently while it travels around the pivot.
    pub fn rotate_around(&mut self, rotation: Quat, pivot: Vec3) -> Result<(), TransformError> {
        renormalize(&rotation)?;
        ensure_finite(&pivot, "pivot")?;

        let offset = self.position.target() - pivot;
        self.position.set_target(pivot + rotation * offset);
        self.rotate(rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn quarter_turn_y() -> Quat {
        Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2)
    }

    #[test]
    fn test_new_is_identity_and_dirty() {
        let state = TransformState::new();

        assert_eq!(state.pose(), Pose::identity());
        assert!(state.is_settled());
        assert!(state.is_matrix_dirty());
    }

    #[test]
    fn test_move_by_accumulates_on_target() {
        let mut state = TransformState::new();
        state.move_by(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        state.move_by(Vec3::new(0.0, 2.0, 0.0)).unwrap();

        assert_eq!(state.position().target(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(state.position().current(), Vec3::zeros());
    }

    #[test]
    fn test_advance_reports_changed_channels() {
        let mut state = TransformState::new();
        state.rebuild_matrix();
        state.move_to(Vec3::new(3.0, 0.0, 0.0)).unwrap();
        state.scale_to(Vec3::new(2.0, 2.0, 2.0)).unwrap();

        let changes = state.advance(1.0);

        assert_eq!(changes, ChangeFlags::POSITION | ChangeFlags::SCALE);
        assert!(state.is_matrix_dirty());
        assert!(state.advance(1.0).is_empty());
    }

    #[test]
    fn test_matrix_dirty_cleared_by_rebuild_only() {
        let mut state = TransformState::new();
        assert!(state.rebuild_matrix().is_some());
        assert!(state.rebuild_matrix().is_none());

        // Advancing a settled transform leaves the cached matrix valid.
        state.advance(0.5);
        assert!(!state.is_matrix_dirty());

        state.set_position(Vec3::new(0.0, 1.0, 0.0)).unwrap();
        assert!(state.is_matrix_dirty());
    }

    #[test]
    fn test_rotate_composes_instead_of_replacing() {
        let mut state = TransformState::new();
        state.rotate(quarter_turn_y()).unwrap();
        state.rotate(quarter_turn_y()).unwrap();

        let expected = Quat::from_axis_angle(&Vec3::y_axis(), 2.0 * FRAC_PI_2);
        assert_relative_eq!(state.rotation().target(), expected, epsilon = EPSILON);
        assert_relative_eq!(state.rotation().target().norm(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_rotate_around_pivot_orbit() {
        let mut state = TransformState::new();
        state.set_position(Vec3::new(2.0, 0.0, 0.0)).unwrap();

        state.rotate_around(quarter_turn_y(), Vec3::zeros()).unwrap();

        assert_relative_eq!(state.position().target(), Vec3::new(0.0, 0.0, -2.0), epsilon = EPSILON);
        assert_relative_eq!(state.rotation().target(), quarter_turn_y(), epsilon = EPSILON);
    }

    #[test]
    fn test_rotate_around_offset_pivot() {
        let mut state = TransformState::new();
        state.set_position(Vec3::new(4.0, 1.0, 0.0)).unwrap();

        state.rotate_around(quarter_turn_y(), Vec3::new(3.0, 1.0, 0.0)).unwrap();

        assert_relative_eq!(state.position().target(), Vec3::new(3.0, 1.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_non_finite_input_leaves_state_untouched() {
        let mut state = TransformState::new();
        state.set_position(Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let before = state.clone();

        assert_eq!(
            state.set_position(Vec3::new(f32::NAN, 0.0, 0.0)),
            Err(TransformError::NonFiniteValue { what: "position" })
        );
        assert!(state.move_by(Vec3::new(0.0, f32::INFINITY, 0.0)).is_err());
        assert!(state.set_scale(Vec3::new(1.0, f32::NEG_INFINITY, 1.0)).is_err());
        assert!(state
            .rotate_around(quarter_turn_y(), Vec3::new(f32::NAN, 0.0, 0.0))
            .is_err());

        let bad_rotation = Quat::new_unchecked(nalgebra::Quaternion::new(f32::NAN, 0.0, 0.0, 0.0));
        assert!(state.set_rotation(bad_rotation).is_err());
        assert!(state.rotate(bad_rotation).is_err());

        assert_eq!(state, before);
    }

    #[test]
    fn test_zero_quaternion_is_rejected() {
        let mut state = TransformState::new();
        state.set_rotation(quarter_turn_y()).unwrap();
        let before = state.clone();

        let zero = Quat::new_unchecked(nalgebra::Quaternion::new(0.0, 0.0, 0.0, 0.0));
        let degenerate = Err(TransformError::Math(MathError::DegenerateRotationAxis));
        assert_eq!(state.set_rotation(zero), degenerate);
        assert_eq!(state.rotate(zero), degenerate);
        assert_eq!(state.rotate_around(zero, Vec3::zeros()), degenerate);

        assert_eq!(state, before);
        assert!(state.rotation().current().coords.iter().all(|c| c.is_finite()));

        let pose = Pose {
            rotation: zero,
            ..Pose::identity()
        };
        assert_eq!(
            TransformState::from_pose(&pose),
            Err(TransformError::Math(MathError::DegenerateRotationAxis))
        );
    }

    #[test]
    fn test_translate_carries_transition() {
        let mut state = TransformState::new();
        state.move_to(Vec3::new(2.0, 0.0, 0.0)).unwrap();
        state.advance(0.5);
        state.rebuild_matrix();

        state.translate(Vec3::new(0.0, 0.0, 5.0)).unwrap();

        assert_eq!(state.position().current(), Vec3::new(1.0, 0.0, 5.0));
        assert_eq!(state.position().target(), Vec3::new(2.0, 0.0, 5.0));
        assert!(state.is_matrix_dirty());

        let before = state.clone();
        assert!(state.translate(Vec3::new(f32::NAN, 0.0, 0.0)).is_err());
        assert!(state.translate(Vec3::new(f32::MAX, 0.0, 0.0)).is_ok());
        let far = state.clone();
        assert_eq!(
            state.translate(Vec3::new(f32::MAX, 0.0, 0.0)),
            Err(TransformError::NonFiniteValue { what: "position" })
        );
        assert_eq!(state, far);
        assert_ne!(far, before);
    }

    #[test]
    fn test_from_matrix_seeds_settled_pose() {
        let pose = Pose::from_position(Vec3::new(1.0, 2.0, 3.0)).with_scale(Vec3::new(2.0, 2.0, 2.0));
        let state = TransformState::from_matrix(&pose.to_matrix()).unwrap();

        assert!(state.is_settled());
        assert_relative_eq!(state.position().current(), pose.position, epsilon = EPSILON);
        assert_relative_eq!(state.scale().current(), pose.scale, epsilon = EPSILON);

        let mut bad = Mat4::identity();
        bad[(0, 3)] = f32::NAN;
        assert!(TransformState::from_matrix(&bad).is_err());
    }
}
