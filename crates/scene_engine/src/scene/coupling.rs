//! Parent-to-child coupling policies.
//!
//! A child may attach one policy to its parent link. After the parent advances
//! in a tick, the scheduler hands every coupled child a [`ParentMotion`]
//! snapshot and the policy turns it into a mutation of the child's state.
//! Policies only ever write to the child.
//!
//! Positional following is exact: the child's whole position channel is
//! carried by the parent's delta, independent of the blend factor.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{axis_angle, MathError, Quat, Unit, Vec3, NORMALIZE_EPSILON};
use crate::transform::{ChangeFlags, TransformError, TransformState};

/// What a parent did during the current tick, as seen by its children.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentMotion {
    /// Channels that changed this tick
    pub changes: ChangeFlags,
    /// Parent position after this tick's advance
    pub position: Vec3,
    /// Parent position at the start of this tick, before any coupling or advance
    pub previous_position: Vec3,
    /// Parent rotation after this tick's advance
    pub rotation: Quat,
}

impl ParentMotion {
    /// Capture the motion of `parent` given the changes its advance reported.
    pub fn capture(parent: &TransformState, changes: ChangeFlags) -> Self {
        Self::since(parent.position().previous(), parent, changes)
    }

    /// Motion of `parent` relative to where it stood at `origin` when the tick began.
    ///
    /// Use this when the parent was itself carried by its own parent before
    /// advancing, so `previous` no longer marks the start of the tick.
    pub fn since(origin: Vec3, parent: &TransformState, changes: ChangeFlags) -> Self {
        Self {
            changes,
            position: parent.position().current(),
            previous_position: origin,
            rotation: parent.rotation().current(),
        }
    }

    /// Positional delta applied this tick, zero when the parent did not move.
    pub fn position_delta(&self) -> Vec3 {
        if self.changes.contains(ChangeFlags::POSITION) {
            self.position - self.previous_position
        } else {
            Vec3::zeros()
        }
    }
}

/// How a child follows its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CouplingPolicy {
    /// Copy the parent's rotation and follow its positional delta.
    Mirror,

    /// Orbit the parent's position every tick while following its positional delta.
    PivotOrbit {
        /// Radians per second
        angular_velocity: f32,
        /// Unit rotation axis
        axis: Vec3,
    },

    /// Follow the parent's positional delta only, keeping an independent orientation.
    Inherit,
}

impl CouplingPolicy {
    /// Orbit policy with a validated axis.
    pub fn pivot_orbit(angular_velocity: f32, axis: Vec3) -> Result<Self, TransformError> {
        if !angular_velocity.is_finite() {
            return Err(TransformError::NonFiniteValue { what: "angular velocity" });
        }
        let axis = Unit::try_new(axis, NORMALIZE_EPSILON)
            .filter(|unit| unit.iter().all(|c| c.is_finite()))
            .ok_or(MathError::DegenerateRotationAxis)?;
        Ok(Self::PivotOrbit {
            angular_velocity,
            axis: axis.into_inner(),
        })
    }

    /// Apply the policy to `child` for one tick of `delta_time` seconds.
    ///
    /// Returns the channels whose current value was changed directly, which
    /// the caller reports as part of the child's own changes. Targets queued
    /// for blending (the orbit step) are not included; they show up when the
    /// child advances.
    pub fn apply(
        &self,
        child: &mut TransformState,
        parent: &ParentMotion,
        delta_time: f32,
    ) -> Result<ChangeFlags, TransformError> {
        match *self {
            Self::Mirror => {
                let mut changes = ChangeFlags::empty();
                if parent.changes.contains(ChangeFlags::ROTATION) {
                    let before = child.rotation().current();
                    child.set_rotation(parent.rotation)?;
                    if child.rotation().current() != before {
                        changes |= ChangeFlags::ROTATION;
                    }
                }
                Ok(changes | follow_delta(child, parent)?)
            }
            Self::PivotOrbit { angular_velocity, axis } => {
                let step = axis_angle(&axis, angular_velocity * delta_time)?;
                let changes = follow_delta(child, parent)?;
                child.rotate_around(step, parent.position)?;
                Ok(changes)
            }
            Self::Inherit => follow_delta(child, parent),
        }
    }
}

fn follow_delta(child: &mut TransformState, parent: &ParentMotion) -> Result<ChangeFlags, TransformError> {
    let delta = parent.position_delta();
    if delta == Vec3::zeros() {
        return Ok(ChangeFlags::empty());
    }
    child.translate(delta)?;
    Ok(ChangeFlags::POSITION)
}
