//! Interpolated transform state
//!
//! [`InterpolatedValue`] is the building block: a previous/current/target
//! triple that blends linearly (vectors, scalars) or spherically (rotations).
//! [`TransformState`] bundles one per channel and tracks whether the composed
//! matrix needs rebuilding.

mod interpolated;
mod state;

pub use interpolated::{Interpolate, InterpolatedValue, LINEAR_SNAP_EPSILON, ROTATION_SNAP_DOT};
pub use state::{ChangeFlags, TransformError, TransformState};
