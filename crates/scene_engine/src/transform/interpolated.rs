//! Previous/current/target triples with per-type blend laws.

use std::ops::Add;

use crate::foundation::math::{is_finite, is_finite_quat, Quat, Vec3};

/// Remaining distance below which positions and scales snap to their target.
pub const LINEAR_SNAP_EPSILON: f32 = 1e-3;

/// `|dot(current, target)|` above which rotations snap to their target.
pub const ROTATION_SNAP_DOT: f32 = 0.9985;

/// A value type that knows how to blend towards a target.
pub trait Interpolate: Copy + PartialEq + std::fmt::Debug {
    /// Move `t` of the way from `self` towards `target`.
    fn blend(&self, target: &Self, t: f32) -> Self;

    /// True once `self` is close enough to `target` to snap.
    fn within_snap_range(&self, target: &Self) -> bool;

    /// True when no component is NaN or infinite.
    fn is_finite(&self) -> bool;
}

impl Interpolate for f32 {
    fn blend(&self, target: &Self, t: f32) -> Self {
        self + (target - self) * t
    }

    fn within_snap_range(&self, target: &Self) -> bool {
        (target - self).abs() < LINEAR_SNAP_EPSILON
    }

    fn is_finite(&self) -> bool {
        f32::is_finite(*self)
    }
}

impl Interpolate for Vec3 {
    fn blend(&self, target: &Self, t: f32) -> Self {
        self.lerp(target, t)
    }

    fn within_snap_range(&self, target: &Self) -> bool {
        (target - self).norm() < LINEAR_SNAP_EPSILON
    }

    fn is_finite(&self) -> bool {
        is_finite(self)
    }
}

impl Interpolate for Quat {
    fn blend(&self, target: &Self, t: f32) -> Self {
        // `None` means the two are too close to define an arc; treat as arrived.
        self.try_slerp(target, t, f32::EPSILON).unwrap_or(*target)
    }

    fn within_snap_range(&self, target: &Self) -> bool {
        self.coords.dot(&target.coords).abs() > ROTATION_SNAP_DOT
    }

    fn is_finite(&self) -> bool {
        is_finite_quat(self)
    }
}

/// A smoothly interpolated value.
///
/// `current` drifts towards `target` each time [`advance`](Self::advance) is
/// called and snaps exactly onto it once the remaining distance falls inside the
/// type's snap range. `previous` holds `current` from before the last step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedValue<T> {
    previous: T,
    current: T,
    target: T,
}

impl<T: Interpolate> InterpolatedValue<T> {
    /// A settled value.
    pub fn new(value: T) -> Self {
        Self {
            previous: value,
            current: value,
            target: value,
        }
    }

    /// Value before the last step
    pub fn previous(&self) -> T {
        self.previous
    }

    /// Blended value
    pub fn current(&self) -> T {
        self.current
    }

    /// Value being approached
    pub fn target(&self) -> T {
        self.target
    }

    /// True when `current == target`.
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Snap all three slots to `value`.
    pub fn set_immediate(&mut self, value: T) {
        self.previous = value;
        self.current = value;
        self.target = value;
    }

    /// Start drifting towards `value` on the next advance.
    pub fn set_target(&mut self, value: T) {
        self.target = value;
    }

    /// Jump straight to the target, finishing any transition.
    pub fn settle(&mut self) {
        self.set_immediate(self.target);
    }

    /// Blend `current` towards `target` by `factor` (clamped to `[0, 1]`).
    ///
    /// Returns true when `current` moved. A step that makes no representable
    /// progress snaps to the target so transitions always terminate.
    pub fn advance(&mut self, factor: f32) -> bool {
        if self.current == self.target {
            return false;
        }
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }

        let blended = self.current.blend(&self.target, factor.min(1.0));
        let next = if blended == self.current
            || !blended.is_finite()
            || blended.within_snap_range(&self.target)
        {
            self.target
        } else {
            blended
        };

        self.previous = self.current;
        self.current = next;
        true
    }
}

impl<T: Interpolate + Add<Output = T>> InterpolatedValue<T> {
    /// Shift `previous`, `current` and `target` by `delta`.
    ///
    /// The transition in flight keeps its remaining distance, so a follower
    /// carried along by its parent neither loses nor gains blend progress.
    pub fn translate(&mut self, delta: T) {
        self.previous = self.previous + delta;
        self.current = self.current + delta;
        self.target = self.target + delta;
    }
}

impl<T: Interpolate + Default> Default for InterpolatedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
