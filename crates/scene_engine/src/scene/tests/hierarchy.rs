//! Graph structure and world matrix composition
//!
//! Convention under test: column vectors, `local = T * R * S` and
//! `world = parent_world * local`.

use crate::foundation::math::{Mat4, Pose, Quat, Vec3};
use crate::scene::{Composition, SceneError, SceneGraph};
use crate::transform::TransformState;
use approx::assert_relative_eq;
use std::f32::consts::FRAC_PI_2;

const EPSILON: f32 = 1e-5;

fn posed(pose: &Pose) -> TransformState {
    TransformState::from_pose(pose).unwrap()
}

#[test]
fn test_cycle_rejection_leaves_graph_intact() {
    let mut graph = SceneGraph::new();
    let a = graph.create_node("a", None).unwrap();
    let b = graph.create_node("b", None).unwrap();

    graph.add_child(a, b).unwrap();
    let before = graph.preorder();

    assert_eq!(
        graph.add_child(b, a),
        Err(SceneError::CycleDetected { parent: b, child: a })
    );
    assert_eq!(graph.preorder(), before);
    assert_eq!(graph.roots(), &[a]);
    assert_eq!(graph.node(b).unwrap().parent(), Some(a));
    assert_eq!(graph.node(a).unwrap().parent(), None);
}

#[test]
fn test_deep_cycle_is_rejected() {
    let mut graph = SceneGraph::new();
    let a = graph.create_node("a", None).unwrap();
    let b = graph.create_node("b", Some(a)).unwrap();
    let c = graph.create_node("c", Some(b)).unwrap();

    assert!(matches!(graph.add_child(c, a), Err(SceneError::CycleDetected { .. })));
    assert_eq!(graph.preorder(), vec![a, b, c]);
}

#[test]
fn test_removing_a_node_destroys_its_subtree() {
    let mut graph = SceneGraph::new();
    let a = graph.create_node("a", None).unwrap();
    let b = graph.create_node("b", Some(a)).unwrap();
    let c = graph.create_node("c", Some(b)).unwrap();
    let d = graph.create_node("d", Some(a)).unwrap();

    assert_eq!(graph.remove(b), Ok(2));

    assert!(!graph.contains(b));
    assert!(!graph.contains(c));
    assert_eq!(graph.node(a).unwrap().children(), &[d]);
    assert_eq!(graph.len(), 2);
}

#[test]
fn test_ids_are_never_reused() {
    let mut graph = SceneGraph::new();
    let first = graph.create_node("first", None).unwrap();
    graph.remove(first).unwrap();
    let second = graph.create_node("second", None).unwrap();

    assert_ne!(first, second);
    assert!(graph.get(first).is_none());
    assert_eq!(graph.remove(first), Err(SceneError::NodeNotFound(first)));
}

#[test]
fn test_world_matrix_matches_literal_composition() {
    let mut graph = SceneGraph::new();
    let parent_pose = Pose::from_position(Vec3::new(10.0, 0.0, 0.0))
        .with_rotation(Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2));
    let child_pose = Pose::from_position(Vec3::new(1.0, 0.0, 0.0)).with_scale(Vec3::new(2.0, 2.0, 2.0));

    let parent = graph.create_node_with("parent", None, posed(&parent_pose)).unwrap();
    let child = graph.create_node_with("child", Some(parent), posed(&child_pose)).unwrap();

    let expected = parent_pose.to_matrix() * child_pose.to_matrix();
    assert_relative_eq!(graph.world_matrix(child).unwrap(), expected, epsilon = EPSILON);

    // +X rotated a quarter turn about +Y lands on -Z, then offset by the parent.
    assert_relative_eq!(
        graph.world_position(child).unwrap(),
        Vec3::new(10.0, 0.0, -1.0),
        epsilon = EPSILON
    );
}

#[test]
fn test_local_matrix_is_translate_rotate_scale() {
    let mut graph = SceneGraph::new();
    let pose = Pose::from_position(Vec3::new(1.0, 2.0, 3.0))
        .with_rotation(Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2))
        .with_scale(Vec3::new(2.0, 1.0, 1.0));
    let node = graph.create_node_with("node", None, posed(&pose)).unwrap();

    let world = graph.world_matrix(node).unwrap();
    let tip = world * Vec3::x().push(1.0);

    // Scaled to (2,0,0), turned onto +Y, then translated.
    assert_relative_eq!(tip.xyz(), Vec3::new(1.0, 4.0, 3.0), epsilon = EPSILON);
    assert_relative_eq!(graph.node(node).unwrap().local_matrix(), world, epsilon = EPSILON);
}

#[test]
fn test_world_matrix_is_deterministic() {
    let mut graph = SceneGraph::new();
    let parent = graph
        .create_node_with(
            "parent",
            None,
            posed(&Pose::from_position(Vec3::new(0.3, -1.7, 2.9))
                .with_rotation(Quat::from_euler_angles(0.1, 0.7, -0.4))),
        )
        .unwrap();
    let child = graph
        .create_node_with(
            "child",
            Some(parent),
            posed(&Pose::from_position(Vec3::new(4.1, 0.2, -3.3)).with_scale(Vec3::new(0.5, 1.5, 1.0))),
        )
        .unwrap();

    let first = graph.world_matrix(child).unwrap();
    let second = graph.world_matrix(child).unwrap();
    assert_eq!(first, second);

    let parent_world = graph.world_matrix(parent).unwrap();
    let local = graph.node(child).unwrap().local_matrix();
    assert_eq!(first, parent_world * local);
}

#[test]
fn test_parent_edit_invalidates_descendants() {
    let mut graph = SceneGraph::new();
    let a = graph.create_node("a", None).unwrap();
    let b = graph.create_node("b", Some(a)).unwrap();
    let c = graph
        .create_node_with("c", Some(b), posed(&Pose::from_position(Vec3::new(0.0, 1.0, 0.0))))
        .unwrap();

    assert_relative_eq!(graph.world_position(c).unwrap(), Vec3::new(0.0, 1.0, 0.0));

    graph
        .transform_mut(a)
        .unwrap()
        .set_position(Vec3::new(5.0, 0.0, 0.0))
        .unwrap();

    assert_relative_eq!(graph.world_position(c).unwrap(), Vec3::new(5.0, 1.0, 0.0));
}

#[test]
fn test_bulk_refresh_agrees_with_pull() {
    let a_pose = Pose::from_position(Vec3::new(1.0, 0.0, 0.0))
        .with_rotation(Quat::from_axis_angle(&Vec3::x_axis(), 0.3));
    let b_pose = Pose::from_position(Vec3::new(0.0, 2.0, 0.0));

    let mut pulled = SceneGraph::new();
    let a = pulled.create_node_with("a", None, posed(&a_pose)).unwrap();
    let b = pulled.create_node_with("b", Some(a), posed(&b_pose)).unwrap();
    let mut bulk = pulled.clone();

    bulk.update_world_matrices();

    assert_eq!(bulk.world_matrix(b).unwrap(), pulled.world_matrix(b).unwrap());
    assert_relative_eq!(
        bulk.world_matrix(b).unwrap(),
        a_pose.to_matrix() * b_pose.to_matrix(),
        epsilon = EPSILON
    );
}

#[test]
fn test_absolute_composition_ignores_parent_matrix() {
    let mut graph = SceneGraph::new();
    let sun = graph
        .create_node_with("sun", None, posed(&Pose::from_position(Vec3::new(10.0, 0.0, 0.0))))
        .unwrap();
    let planet = graph
        .create_node_with("planet", Some(sun), posed(&Pose::from_position(Vec3::new(3.0, 0.0, 0.0))))
        .unwrap();

    assert_relative_eq!(graph.world_position(planet).unwrap(), Vec3::new(13.0, 0.0, 0.0));

    graph.set_composition(planet, Composition::Absolute).unwrap();
    assert_relative_eq!(graph.world_position(planet).unwrap(), Vec3::new(3.0, 0.0, 0.0));
}

#[test]
fn test_reparent_recomposes_world() {
    let mut graph = SceneGraph::new();
    let left = graph
        .create_node_with("left", None, posed(&Pose::from_position(Vec3::new(-4.0, 0.0, 0.0))))
        .unwrap();
    let right = graph
        .create_node_with("right", None, posed(&Pose::from_position(Vec3::new(4.0, 0.0, 0.0))))
        .unwrap();
    let item = graph.create_node("item", Some(left)).unwrap();

    assert_relative_eq!(graph.world_position(item).unwrap(), Vec3::new(-4.0, 0.0, 0.0));

    graph.add_child(right, item).unwrap();
    assert_relative_eq!(graph.world_position(item).unwrap(), Vec3::new(4.0, 0.0, 0.0));

    graph.detach(item).unwrap();
    assert_eq!(graph.world_matrix(item).unwrap(), Mat4::identity());
}
