//! Scene graph nodes

use serde::{Deserialize, Serialize};

use super::camera::CameraRig;
use super::coupling::CouplingPolicy;
use crate::foundation::math::{axis_angle, Mat4, Vec3};
use crate::transform::{ChangeFlags, TransformError, TransformState};

slotmap::new_key_type! {
    /// Stable handle to a scene node.
    ///
    /// Keys carry a generation, so a removed node's id never aliases a later node.
    pub struct NodeId;
}

/// What a node is, which selects its smoothing speed and derived data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Generic scene object with a model matrix
    Object,
    /// Camera with view and projection matrices
    Camera,
}

/// How a node's world matrix relates to its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Composition {
    /// `world = parent_world * local`
    #[default]
    Parented,
    /// The node's transform is already in world space; its coupling policy keeps it attached.
    Absolute,
}

/// Constant self-rotation applied every tick before the node advances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spin {
    /// Rotation axis in local space
    pub axis: Vec3,
    /// Radians per second
    pub angular_velocity: f32,
}

impl Spin {
    /// Spin about `axis` at `angular_velocity` radians per second.
    pub fn new(axis: Vec3, angular_velocity: f32) -> Result<Self, TransformError> {
        if !angular_velocity.is_finite() {
            return Err(TransformError::NonFiniteValue { what: "angular velocity" });
        }
        axis_angle(&axis, 0.0)?;
        Ok(Self { axis, angular_velocity })
    }

    /// Queue this tick's share of the spin on `transform`.
    pub fn apply(&self, transform: &mut TransformState, delta_time: f32) -> Result<(), TransformError> {
        let step = axis_angle(&self.axis, self.angular_velocity * delta_time)?;
        transform.rotate(step)
    }
}

#[derive(Debug, Clone)]
enum NodeBody {
    Object(TransformState),
    Camera(Box<CameraRig>),
}

/// An element of the scene graph.
///
/// Structure (parent and children) is owned by [`SceneGraph`](super::SceneGraph);
/// the node itself owns its transform and matrix caches.
#[derive(Debug, Clone)]
pub struct SceneNode {
    id: NodeId,
    name: String,
    body: NodeBody,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
    pub(super) coupling: Option<CouplingPolicy>,
    pub(super) spin: Option<Spin>,
    pub(super) composition: Composition,
    pub(super) last_changes: ChangeFlags,

    local_matrix: Mat4,
    world_matrix: Mat4,
    /// Bumped every time `world_matrix` is rebuilt
    world_version: u64,
    /// Parent world version the cached world matrix was built against
    parent_version_seen: Option<u64>,
    world_valid: bool,
}

impl SceneNode {
    fn with_body(id: NodeId, name: String, body: NodeBody) -> Self {
        Self {
            id,
            name,
            body,
            parent: None,
            children: Vec::new(),
            coupling: None,
            spin: None,
            composition: Composition::default(),
            last_changes: ChangeFlags::empty(),
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            world_version: 0,
            parent_version_seen: None,
            world_valid: false,
        }
    }

    pub(super) fn new_object(id: NodeId, name: String, transform: TransformState) -> Self {
        Self::with_body(id, name, NodeBody::Object(transform))
    }

    pub(super) fn new_camera(id: NodeId, name: String, camera: CameraRig) -> Self {
        Self::with_body(id, name, NodeBody::Camera(Box::new(camera)))
    }

    /// Stable id assigned at creation
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object or camera
    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Object(_) => NodeKind::Object,
            NodeBody::Camera(_) => NodeKind::Camera,
        }
    }

    /// Parent node, `None` for roots
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Policy attached to the parent link
    pub fn coupling(&self) -> Option<CouplingPolicy> {
        self.coupling
    }

    /// Per-tick self-rotation
    pub fn spin(&self) -> Option<Spin> {
        self.spin
    }

    /// World matrix composition mode
    pub fn composition(&self) -> Composition {
        self.composition
    }

    /// Channels that changed during the most recent tick
    pub fn last_changes(&self) -> ChangeFlags {
        self.last_changes
    }

    /// Transform state
    pub fn transform(&self) -> &TransformState {
        match &self.body {
            NodeBody::Object(transform) => transform,
            NodeBody::Camera(camera) => camera.transform(),
        }
    }

    /// Mutable transform state
    pub fn transform_mut(&mut self) -> &mut TransformState {
        match &mut self.body {
            NodeBody::Object(transform) => transform,
            NodeBody::Camera(camera) => camera.transform_mut(),
        }
    }

    /// Camera data, when this node is a camera
    pub fn camera(&self) -> Option<&CameraRig> {
        match &self.body {
            NodeBody::Camera(camera) => Some(camera.as_ref()),
            NodeBody::Object(_) => None,
        }
    }

    /// Mutable camera data, when this node is a camera
    pub fn camera_mut(&mut self) -> Option<&mut CameraRig> {
        match &mut self.body {
            NodeBody::Camera(camera) => Some(camera.as_mut()),
            NodeBody::Object(_) => None,
        }
    }

    /// Local matrix as of the last world matrix build
    pub fn local_matrix(&self) -> Mat4 {
        self.local_matrix
    }

    /// Advance the transform; cameras also refresh their basis.
    pub(crate) fn advance(&mut self, factor: f32) -> ChangeFlags {
        match &mut self.body {
            NodeBody::Object(transform) => transform.advance(factor),
            NodeBody::Camera(camera) => camera.update(factor),
        }
    }

    pub(super) fn invalidate_world(&mut self) {
        self.world_valid = false;
    }

    /// Bring the cached world matrix up to date given the parent's `(world, version)`.
    pub(super) fn refresh_world(&mut self, parent: Option<(Mat4, u64)>) -> (Mat4, u64) {
        let local_changed = match self.transform_mut().rebuild_matrix() {
            Some(local) => {
                self.local_matrix = local;
                true
            }
            None => false,
        };

        let parent = match self.composition {
            Composition::Parented => parent,
            Composition::Absolute => None,
        };
        let parent_version = parent.map(|(_, version)| version);

        if !self.world_valid || local_changed || parent_version != self.parent_version_seen {
            self.world_matrix = match parent {
                Some((parent_world, _)) => parent_world * self.local_matrix,
                None => self.local_matrix,
            };
            self.world_version += 1;
            self.parent_version_seen = parent_version;
            self.world_valid = true;
        }

        (self.world_matrix, self.world_version)
    }
}
