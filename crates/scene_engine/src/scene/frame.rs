//! Per-frame matrix snapshots laid out for GPU upload.
//!
//! Collected after a tick has completed; every matrix is pulled through the
//! graph's lazy caches, so unchanged nodes cost a cache read.

// The Pod/Zeroable derives expand to unsafe impls.
#![allow(unsafe_code)]

use bytemuck::{Pod, Zeroable};

use super::graph::{SceneError, SceneGraph};
use super::node::{NodeId, NodeKind};
use crate::foundation::math::{Mat4, Vec3};

/// Model matrix for one object, column-major
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelUniform {
    /// Local-to-world transform
    pub model: [[f32; 4]; 4],
}

impl From<Mat4> for ModelUniform {
    fn from(model: Mat4) -> Self {
        Self { model: model.into() }
    }
}

/// Camera matrices, column-major
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    /// World to camera space
    pub view: [[f32; 4]; 4],
    /// Camera to clip space
    pub projection: [[f32; 4]; 4],
    /// `projection * view`
    pub view_projection: [[f32; 4]; 4],
    /// Camera position (w = 1)
    pub position: [f32; 4],
}

impl CameraUniform {
    fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view: view.into(),
            projection: projection.into(),
            view_projection: (projection * view).into(),
            position: [position.x, position.y, position.z, 1.0],
        }
    }
}

/// All matrices a renderer needs for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTransforms {
    object_ids: Vec<NodeId>,
    models: Vec<ModelUniform>,
    camera_ids: Vec<NodeId>,
    cameras: Vec<CameraUniform>,
}

impl FrameTransforms {
    /// Snapshot every node in pre-order.
    pub fn collect(graph: &mut SceneGraph) -> Result<Self, SceneError> {
        graph.update_world_matrices();

        let mut frame = Self::default();
        for id in graph.preorder() {
            match graph.node(id)?.kind() {
                NodeKind::Object => {
                    let world = graph.world_matrix(id)?;
                    frame.object_ids.push(id);
                    frame.models.push(world.into());
                }
                NodeKind::Camera => {
                    let camera = graph.camera_mut(id)?;
                    let view = camera.view_matrix();
                    let projection = camera.project_matrix();
                    let position = camera.transform().position().current();
                    frame.camera_ids.push(id);
                    frame.cameras.push(CameraUniform::new(view, projection, position));
                }
            }
        }
        Ok(frame)
    }

    /// Object nodes, parallel to [`models`](Self::models)
    pub fn object_ids(&self) -> &[NodeId] {
        &self.object_ids
    }

    /// Model matrices in pre-order
    pub fn models(&self) -> &[ModelUniform] {
        &self.models
    }

    /// Camera nodes, parallel to [`cameras`](Self::cameras)
    pub fn camera_ids(&self) -> &[NodeId] {
        &self.camera_ids
    }

    /// Camera matrices in pre-order
    pub fn cameras(&self) -> &[CameraUniform] {
        &self.cameras
    }

    /// Model matrix for `id`, if it is an object in this frame
    pub fn model_of(&self, id: NodeId) -> Option<&ModelUniform> {
        let index = self.object_ids.iter().position(|&object| object == id)?;
        self.models.get(index)
    }

    /// Raw bytes of the model array
    pub fn model_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.models)
    }

    /// Raw bytes of the camera array
    pub fn camera_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cameras)
    }
}
