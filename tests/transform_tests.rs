//! Transform and hierarchy tests
//!
//! Tests for:
//! - Transform TRS operations and dirty checking
//! - apply_local_matrix decomposition
//! - Hierarchical matrix propagation through Scene
//! - Reparenting and subtree removal
//! - Animated node properties reaching world matrices

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use myth_animation::animation::{
    AnimationValue, Curve, FrameScheduler, PlaybackOptions, TargetHandle, TargetProperty,
};
use myth_animation::scene::{Node, NodeHandle, Scene, Transform};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

fn world_position(scene: &Scene, handle: NodeHandle) -> Vec3 {
    scene.get_node(handle).unwrap().transform.world_matrix().translation.into()
}

/// Chain of `length` nodes, each translated +1 in X from its parent.
fn create_chain(length: usize) -> (Scene, Vec<NodeHandle>) {
    let mut scene = Scene::new();
    let mut handles: Vec<NodeHandle> = Vec::with_capacity(length);
    for i in 0..length {
        let mut node = Node::new(&format!("n{i}"));
        node.transform.position = Vec3::X;
        let handle = match handles.last() {
            Some(&parent) => scene.add_to_parent(node, parent),
            None => scene.add_node(node),
        };
        handles.push(handle);
    }
    (scene, handles)
}

// ============================================================================
// Transform Unit Tests
// ============================================================================

#[test]
fn transform_default_is_identity() {
    let t = Transform::new();
    assert_eq!(t.position, Vec3::ZERO);
    assert_eq!(t.rotation, Quat::IDENTITY);
    assert_eq!(t.scale, Vec3::ONE);
}

#[test]
fn transform_update_local_matrix_dirty_check() {
    let mut t = Transform::new();

    // First call always updates
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.position = Vec3::new(1.0, 2.0, 3.0);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.rotation = Quat::from_rotation_y(FRAC_PI_2);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.scale = Vec3::splat(2.0);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());
}

#[test]
fn transform_local_matrix_reflects_trs() {
    let mut t = Transform::new();
    t.position = Vec3::new(10.0, 20.0, 30.0);
    t.scale = Vec3::splat(2.0);
    t.update_local_matrix();

    let mat = Mat4::from(*t.local_matrix());
    assert!(vec3_approx(mat.w_axis.truncate(), Vec3::new(10.0, 20.0, 30.0)));
    assert!(mat.abs_diff_eq(t.compose_local(), EPSILON));
}

#[test]
fn transform_apply_local_matrix_decomposition() {
    let position = Vec3::new(5.0, -3.0, 7.0);
    let rotation = Quat::from_rotation_y(0.7);
    let scale = Vec3::new(2.0, 3.0, 1.5);

    let mut t = Transform::new();
    t.apply_local_matrix(Mat4::from_scale_rotation_translation(scale, rotation, position));

    assert!(vec3_approx(t.position, position));
    assert!(vec3_approx(t.scale, scale));
    assert!(t.rotation.abs_diff_eq(rotation, 1e-4) || t.rotation.abs_diff_eq(-rotation, 1e-4));
    assert!(t.is_dirty());
}

#[test]
fn transform_mark_dirty_forces_update() {
    let mut t = Transform::new();
    t.update_local_matrix();
    assert!(!t.update_local_matrix());

    t.mark_dirty();
    assert!(t.update_local_matrix());
}

// ============================================================================
// Hierarchy Tests
// ============================================================================

#[test]
fn hierarchy_chain_world_positions() {
    let (mut scene, handles) = create_chain(5);
    scene.update_matrix_world();

    for (i, &handle) in handles.iter().enumerate() {
        let x = world_position(&scene, handle).x;
        let expected = (i + 1) as f32;
        assert!(approx_eq(x, expected), "node {i}: expected x={expected}, got x={x}");
    }
}

#[test]
fn hierarchy_with_rotation_and_scale() {
    let mut scene = Scene::new();
    let mut parent = Node::new("parent");
    parent.transform.rotation = Quat::from_rotation_z(FRAC_PI_2);
    parent.transform.scale = Vec3::splat(2.0);
    let parent = scene.add_node(parent);

    let mut child = Node::new("child");
    child.transform.position = Vec3::X;
    let child = scene.add_to_parent(child, parent);

    scene.update_matrix_world();
    // +X rotated a quarter turn about Z, then doubled
    assert!(vec3_approx(world_position(&scene, child), Vec3::new(0.0, 2.0, 0.0)));
}

#[test]
fn hierarchy_parent_change_propagates() {
    let (mut scene, handles) = create_chain(3);
    scene.update_matrix_world();

    scene.get_node_mut(handles[0]).unwrap().transform.position = Vec3::new(10.0, 0.0, 0.0);
    scene.update_matrix_world();
    assert!(approx_eq(world_position(&scene, handles[2]).x, 12.0));
}

#[test]
fn attach_refuses_cycles() {
    let (mut scene, handles) = create_chain(3);
    scene.attach(handles[0], handles[2]);
    assert_eq!(scene.get_node(handles[0]).unwrap().parent(), None);
    assert_eq!(scene.root_nodes, vec![handles[0]]);
}

#[test]
fn remove_node_drops_subtree() {
    let (mut scene, handles) = create_chain(4);
    scene.remove_node(handles[1]);
    assert_eq!(scene.nodes.len(), 1);
    assert!(scene.get_node(handles[0]).unwrap().children().is_empty());
    assert_eq!(scene.find_node_by_name("n3"), None);
}

#[test]
fn deeply_nested_hierarchy_no_stack_overflow() {
    let (mut scene, handles) = create_chain(2_000);
    scene.update_matrix_world();
    let last = *handles.last().unwrap();
    assert!((world_position(&scene, last).x - 2_000.0).abs() < 1e-2);
}

// ============================================================================
// Animated Transforms
// ============================================================================

#[test]
fn animated_position_reaches_world_matrix() {
    let (mut scene, handles) = create_chain(2);
    let curve = Curve::tween(
        "slide",
        TargetProperty::Position,
        10.0,
        10.0,
        AnimationValue::Vector3(Vec3::ZERO),
        AnimationValue::Vector3(Vec3::new(0.0, 4.0, 0.0)),
    )
    .unwrap();
    scene.get_node_mut(handles[0]).unwrap().animations.push(Arc::new(curve));

    let mut scheduler = FrameScheduler::default();
    scheduler.begin_animation(
        &mut scene,
        TargetHandle::Node(handles[0]),
        PlaybackOptions::range(0.0, 10.0),
        None,
    );
    scheduler.advance(0.0, &mut scene);
    scheduler.advance(500.0, &mut scene);
    scene.update_matrix_world();

    assert!(vec3_approx(world_position(&scene, handles[0]), Vec3::new(0.0, 2.0, 0.0)));
    assert!(vec3_approx(world_position(&scene, handles[1]), Vec3::new(1.0, 2.0, 0.0)));
}
