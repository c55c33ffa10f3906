//! # Scene Engine
//!
//! Hierarchical transforms with smoothing for real-time 3D scenes.
//!
//! ## Features
//!
//! - **Interpolated transforms**: position, rotation and scale drift towards
//!   their targets and snap once close enough
//! - **Scene graph**: arena-backed parent/child hierarchy with cycle checks
//!   and lazily cached world matrices
//! - **Coupling policies**: children can mirror, orbit or follow their parent
//! - **Camera rig**: view and projection matrices cached behind separate dirty flags
//! - **Update scheduler**: one parent-before-child pass per tick with change events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut graph = SceneGraph::new();
//!     let sun = graph.create_node("sun", None)?;
//!     let planet = graph.create_node("planet", Some(sun))?;
//!     graph.transform_mut(planet)?.set_position(Vec3::new(5.0, 0.0, 0.0))?;
//!     graph.set_coupling(planet, Some(CouplingPolicy::pivot_orbit(1.0, Vec3::y())?))?;
//!     graph.set_composition(planet, Composition::Absolute)?;
//!
//!     let mut scheduler = UpdateScheduler::default();
//!     scheduler.tick(&mut graph, 1.0 / 60.0)?;
//!
//!     let frame = FrameTransforms::collect(&mut graph)?;
//!     assert_eq!(frame.models().len(), 2);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod scene;
pub mod transform;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, LensConfig, SceneConfig, SmoothingConfig},
        foundation::math::{Mat4, MathError, Pose, Quat, Vec3},
        scene::{
            CameraRig, Composition, CouplingPolicy, FrameTransforms, NodeId, NodeKind, SceneError,
            SceneGraph, SceneNode, Spin, TickReport, TransformEvent, TransformObserver,
            UpdateScheduler,
        },
        transform::{ChangeFlags, InterpolatedValue, TransformError, TransformState},
    };
}
