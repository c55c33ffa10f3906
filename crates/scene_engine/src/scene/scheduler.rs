//! Per-tick transform propagation
//!
//! Walks the graph depth-first, pre-order, once per tick. Each node is
//! advanced and its observers notified before any of its children run, and
//! coupled children receive the parent's motion immediately after that, so a
//! child always sees this tick's parent state.
//!
//! A coupled child that was carried by its parent reports that movement as
//! its own change, measured from where it stood when the tick began, so a
//! whole chain moves by the root's delta within one tick.

use slotmap::SecondaryMap;

use super::coupling::ParentMotion;
use super::graph::{SceneError, SceneGraph};
use super::node::{NodeId, NodeKind};
use crate::config::SmoothingConfig;
use crate::foundation::math::Vec3;
use crate::transform::{ChangeFlags, TransformError};

/// A node's transform changed during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformEvent {
    /// Node that advanced
    pub node: NodeId,
    /// Channels that moved
    pub changes: ChangeFlags,
    /// Unscaled tick delta time
    pub delta_time: f32,
}

/// Receives [`TransformEvent`]s as nodes settle.
pub trait TransformObserver {
    /// Called once per changed node per tick, before that node's children advance.
    fn on_transform_changed(&mut self, event: &TransformEvent);
}

impl<F> TransformObserver for F
where
    F: FnMut(&TransformEvent),
{
    fn on_transform_changed(&mut self, event: &TransformEvent) {
        self(event);
    }
}

/// Handle returned by [`UpdateScheduler::add_observer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A per-node failure that did not stop the tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickFault {
    /// Node whose update was rejected
    pub node: NodeId,
    /// Why
    pub error: TransformError,
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick counter, starting at 1
    pub tick: u64,
    /// Nodes visited and advanced
    pub nodes_advanced: usize,
    /// Change events in the order they fired
    pub events: Vec<TransformEvent>,
    /// Spin or coupling updates that were rejected
    pub faults: Vec<TickFault>,
}

impl TickReport {
    /// Changes reported for `node` this tick
    pub fn changes_for(&self, node: NodeId) -> ChangeFlags {
        self.events
            .iter()
            .filter(|event| event.node == node)
            .fold(ChangeFlags::empty(), |acc, event| acc | event.changes)
    }
}

/// Drives every node's transform forward once per tick
pub struct UpdateScheduler {
    smoothing: SmoothingConfig,
    observers: Vec<(ObserverId, Box<dyn TransformObserver>)>,
    next_observer: u64,
    tick: u64,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("smoothing", &self.smoothing)
            .field("observers", &self.observers.len())
            .field("tick", &self.tick)
            .finish()
    }
}

impl UpdateScheduler {
    /// Scheduler with the given per-kind smoothing speeds.
    pub fn new(smoothing: SmoothingConfig) -> Self {
        Self {
            smoothing,
            observers: Vec::new(),
            next_observer: 0,
            tick: 0,
        }
    }

    /// Smoothing speeds in use
    pub fn smoothing(&self) -> &SmoothingConfig {
        &self.smoothing
    }

    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Register an observer; it stays until removed.
    pub fn add_observer(&mut self, observer: impl TransformObserver + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Unregister an observer. Returns false if it was already gone.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    fn factor_for(&self, kind: NodeKind) -> f32 {
        match kind {
            NodeKind::Object => self.smoothing.object,
            NodeKind::Camera => self.smoothing.camera,
        }
    }

    /// Advance every node by `delta_time` seconds.
    ///
    /// A rejected spin or coupling update is logged and recorded in the
    /// report; the rest of the graph still advances.
    pub fn tick(&mut self, graph: &mut SceneGraph, delta_time: f32) -> Result<TickReport, SceneError> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(SceneError::InvalidDeltaTime(delta_time));
        }

        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        // Tick-start position and directly applied changes of every child a coupling moved.
        let mut carried: SecondaryMap<NodeId, (Vec3, ChangeFlags)> = SecondaryMap::new();
        let mut stack: Vec<NodeId> = graph.roots().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = graph.get_mut(id) else {
                continue;
            };
            let factor = self.factor_for(node.kind());
            let (origin, coupled) = carried
                .remove(id)
                .unwrap_or_else(|| (node.transform().position().current(), ChangeFlags::empty()));

            if let Some(spin) = node.spin() {
                if let Err(error) = spin.apply(node.transform_mut(), delta_time) {
                    log::warn!("Spin on {:?} rejected: {}", id, error);
                    report.faults.push(TickFault { node: id, error });
                }
            }

            let changes = node.advance(delta_time * factor) | coupled;
            node.last_changes = changes;
            report.nodes_advanced += 1;

            let motion = ParentMotion::since(origin, node.transform(), changes);
            let children = node.children().to_vec();

            if !changes.is_empty() {
                let event = TransformEvent {
                    node: id,
                    changes,
                    delta_time,
                };
                for (_, observer) in &mut self.observers {
                    observer.on_transform_changed(&event);
                }
                report.events.push(event);
            }

            for &child_id in &children {
                let Some(child) = graph.get_mut(child_id) else {
                    continue;
                };
                let Some(policy) = child.coupling() else {
                    continue;
                };
                let origin = child.transform().position().current();
                match policy.apply(child.transform_mut(), &motion, delta_time) {
                    Ok(applied) if !applied.is_empty() => {
                        carried.insert(child_id, (origin, applied));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        log::warn!("Coupling {:?} on {:?} rejected: {}", policy, child_id, error);
                        report.faults.push(TickFault { node: child_id, error });
                    }
                }
            }

            stack.extend(children.iter().rev());
        }

        log::trace!(
            "Tick {}: advanced {} nodes, {} changed, {} faults",
            report.tick,
            report.nodes_advanced,
            report.events.len(),
            report.faults.len()
        );
        Ok(report)
    }
}
