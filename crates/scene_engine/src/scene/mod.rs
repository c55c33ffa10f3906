//! Scene graph, coupling policies, cameras and the per-tick scheduler

pub mod camera;
pub mod coupling;
pub mod frame;
pub mod graph;
pub mod node;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use camera::CameraRig;
pub use coupling::{CouplingPolicy, ParentMotion};
pub use frame::{CameraUniform, FrameTransforms, ModelUniform};
pub use graph::{SceneError, SceneGraph};
pub use node::{Composition, NodeId, NodeKind, SceneNode, Spin};
pub use scheduler::{ObserverId, TickFault, TickReport, TransformEvent, TransformObserver, UpdateScheduler};
