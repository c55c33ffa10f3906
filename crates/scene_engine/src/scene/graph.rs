//! Scene graph arena.
//!
//! Nodes live in a generational slot map and refer to each other by
//! [`NodeId`]. The parent link is a plain id lookup and each node owns the
//! list of its children's ids, so removing a node removes its subtree.
//!
//! World matrices are pulled, never pushed: [`SceneGraph::world_matrix`]
//! walks the ancestor chain top-down and each node rebuilds only if its own
//! transform or its parent's world matrix changed since the last build.

use slotmap::SlotMap;
use thiserror::Error;

use super::camera::CameraRig;
use super::coupling::CouplingPolicy;
use super::node::{Composition, NodeId, SceneNode, Spin};
use crate::config::{ConfigError, LensConfig};
use crate::foundation::math::{Mat4, Vec3};
use crate::transform::{TransformError, TransformState};

/// Errors raised by graph structure edits and scheduling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// Attaching `child` under `parent` would make a node its own ancestor
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },

    /// Id does not refer to a live node
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// `child` is not directly attached under `parent`
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Claimed parent
        parent: NodeId,
        /// Claimed child
        child: NodeId,
    },

    /// Coupling requires a parent link
    #[error("node {0:?} is a root and cannot be coupled")]
    Orphan(NodeId),

    /// Camera operation on a non-camera node
    #[error("node {0:?} is not a camera")]
    NotACamera(NodeId),

    /// Tick called with a negative or non-finite delta time
    #[error("invalid delta time: {0}")]
    InvalidDeltaTime(f32),

    /// Transform edit rejected
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Arena of scene nodes
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    roots: Vec<NodeId>,
    lens: LensConfig,
}

impl SceneGraph {
    /// Empty graph using the default lens for new cameras.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty graph whose cameras start with `lens`.
    ///
    /// The lens is validated once here so camera creation cannot fail on it.
    pub fn with_lens(lens: LensConfig) -> Result<Self, ConfigError> {
        lens.validate()?;
        Ok(Self {
            lens,
            ..Self::default()
        })
    }

    /// Lens applied by [`create_camera`](Self::create_camera)
    pub fn lens(&self) -> &LensConfig {
        &self.lens
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Root nodes in creation order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Node lookup
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutable node lookup
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Node lookup that fails with [`SceneError::NodeNotFound`].
    pub fn node(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Mutable node lookup that fails with [`SceneError::NodeNotFound`].
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Every live node, in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Create an object node at the identity pose.
    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        self.create_node_with(name, parent, TransformState::new())
    }

    /// Create an object node with an initial transform.
    pub fn create_node_with(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
        transform: TransformState,
    ) -> Result<NodeId, SceneError> {
        self.check_parent(parent)?;
        let name = name.into();
        let id = self
            .nodes
            .insert_with_key(|id| SceneNode::new_object(id, name, transform));
        self.link(parent, id);
        Ok(id)
    }

    /// Create a camera node using the graph's lens.
    pub fn create_camera(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        let camera = CameraRig::build(TransformState::new(), &self.lens);
        self.create_camera_with(name, parent, camera)
    }

    /// Create a camera node from a configured rig.
    pub fn create_camera_with(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
        camera: CameraRig,
    ) -> Result<NodeId, SceneError> {
        self.check_parent(parent)?;
        let name = name.into();
        let id = self
            .nodes
            .insert_with_key(|id| SceneNode::new_camera(id, name, camera));
        self.link(parent, id);
        Ok(id)
    }

    fn check_parent(&self, parent: Option<NodeId>) -> Result<(), SceneError> {
        match parent {
            Some(parent) if !self.nodes.contains_key(parent) => Err(SceneError::NodeNotFound(parent)),
            _ => Ok(()),
        }
    }

    /// Attach a freshly created or freshly unlinked node.
    fn link(&mut self, parent: Option<NodeId>, child: NodeId) {
        let parent = match parent.and_then(|p| self.nodes.get_mut(p).map(|node| (p, node))) {
            Some((p, node)) => {
                node.children.push(child);
                Some(p)
            }
            None => {
                self.roots.push(child);
                None
            }
        };
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = parent;
            node.invalidate_world();
            log::debug!("Linked {:?} ({}) under {:?}", child, node.name(), parent);
        }
    }

    /// Detach `child` from wherever it currently hangs, leaving it parentless.
    fn unlink(&mut self, child: NodeId) {
        let old_parent = self.nodes.get_mut(child).and_then(|node| node.parent.take());
        match old_parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.retain(|&c| c != child),
            None => self.roots.retain(|&r| r != child),
        }
    }

    /// True when `ancestor` lies on the parent chain above `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node).and_then(SceneNode::parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(SceneNode::parent);
        }
        false
    }

    /// Reparent `child` under `parent`.
    ///
    /// Rejects the edit with [`SceneError::CycleDetected`] when `child` is
    /// `parent` itself or one of its ancestors; the graph is left untouched.
    /// Moving a node to a new parent clears its coupling policy.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        let current_parent = self.node(child)?.parent();

        if child == parent || self.is_ancestor(child, parent) {
            log::warn!("Rejected attaching {:?} under {:?}: cycle", child, parent);
            return Err(SceneError::CycleDetected { parent, child });
        }
        if current_parent == Some(parent) {
            return Ok(());
        }

        self.unlink(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.coupling = None;
        }
        self.link(Some(parent), child);
        Ok(())
    }

    /// Make `node` a root, keeping its subtree. Clears its coupling policy.
    pub fn detach(&mut self, node: NodeId) -> Result<(), SceneError> {
        if self.node(node)?.parent().is_none() {
            return Ok(());
        }
        self.unlink(node);
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.coupling = None;
        }
        self.link(None, node);
        Ok(())
    }

    /// Remove `child` from under `parent`, destroying its subtree.
    ///
    /// Returns the number of nodes destroyed.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize, SceneError> {
        self.node(parent)?;
        if self.node(child)?.parent() != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }
        self.remove(child)
    }

    /// Destroy `node` and everything below it.
    ///
    /// Returns the number of nodes destroyed. Ids of destroyed nodes are never reissued.
    pub fn remove(&mut self, node: NodeId) -> Result<usize, SceneError> {
        self.node(node)?;
        let doomed = self.subtree(node);
        self.unlink(node);
        for id in &doomed {
            self.nodes.remove(*id);
        }
        log::debug!("Removed {:?} and {} descendants", node, doomed.len() - 1);
        Ok(doomed.len())
    }

    /// `root` and all of its descendants, pre-order.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.nodes.contains_key(root) {
            return order;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }

    /// Every node, depth-first pre-order from each root in turn.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            order.extend(self.subtree(root));
        }
        order
    }

    /// Mutable access to a node's transform.
    pub fn transform_mut(&mut self, id: NodeId) -> Result<&mut TransformState, SceneError> {
        Ok(self.node_mut(id)?.transform_mut())
    }

    /// Camera data for a camera node.
    pub fn camera(&self, id: NodeId) -> Result<&CameraRig, SceneError> {
        self.node(id)?.camera().ok_or(SceneError::NotACamera(id))
    }

    /// Mutable camera data for a camera node.
    pub fn camera_mut(&mut self, id: NodeId) -> Result<&mut CameraRig, SceneError> {
        self.node_mut(id)?.camera_mut().ok_or(SceneError::NotACamera(id))
    }

    /// Attach or clear the coupling policy on `child`'s parent link.
    pub fn set_coupling(
        &mut self,
        child: NodeId,
        policy: Option<CouplingPolicy>,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(child)?;
        if policy.is_some() && node.parent().is_none() {
            return Err(SceneError::Orphan(child));
        }
        node.coupling = policy;
        Ok(())
    }

    /// Attach or clear a constant self-rotation.
    pub fn set_spin(&mut self, id: NodeId, spin: Option<Spin>) -> Result<(), SceneError> {
        self.node_mut(id)?.spin = spin;
        Ok(())
    }

    /// Choose how `id` composes its world matrix.
    pub fn set_composition(&mut self, id: NodeId, composition: Composition) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.composition != composition {
            node.composition = composition;
            node.invalidate_world();
        }
        Ok(())
    }

    /// Root-first chain ending at `id`.
    fn ancestry(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let mut chain = vec![id];
        let mut current = self.node(id)?.parent();
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent)?.parent();
        }
        chain.reverse();
        Ok(chain)
    }

    /// World matrix of `id`, rebuilding stale entries along its ancestor chain.
    ///
    /// Ancestors are refreshed before descendants, and a node whose transform
    /// and parent world matrix are both unchanged returns its cached matrix.
    pub fn world_matrix(&mut self, id: NodeId) -> Result<Mat4, SceneError> {
        let mut parent_world = None;
        for link in self.ancestry(id)? {
            let node = self.node_mut(link)?;
            parent_world = Some(node.refresh_world(parent_world));
        }
        parent_world
            .map(|(world, _)| world)
            .ok_or(SceneError::NodeNotFound(id))
    }

    /// Translation column of [`world_matrix`](Self::world_matrix).
    pub fn world_position(&mut self, id: NodeId) -> Result<Vec3, SceneError> {
        let world = self.world_matrix(id)?;
        Ok(Vec3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]))
    }

    /// Refresh every world matrix in a single top-down pass.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeId, Option<(Mat4, u64)>)> =
            self.roots.iter().rev().map(|&root| (root, None)).collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let world = node.refresh_world(parent_world);
            stack.extend(node.children.iter().rev().map(|&child| (child, Some(world))));
        }
    }
}
