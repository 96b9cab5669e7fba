//! Skeleton Tests
//!
//! Tests for:
//! - Skinning buffer preparation and dirty tracking
//! - Bone animation end to end through the scheduler
//! - Weighted bone matrices blending against the rest pose
//! - Relative looping of matrix curves
//! - Linked nodes driving bones
//! - Skeleton ranges and JSON round trip

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use myth_animation::animation::{
    AnimationValue, Curve, CurveLoopMode, FrameScheduler, PlaybackOptions, TargetHandle,
    TargetProperty,
};
use myth_animation::scene::{Bone, Node, Scene, Skeleton, SkeletonKey};
use myth_animation::settings::AnimationSettings;

const EPSILON: f32 = 1e-4;

fn translation(m: Mat4) -> Vec3 {
    m.w_axis.truncate()
}

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

/// Identity to +1 Y over frames 0..10 at 10 fps.
fn lift_curve() -> Curve {
    Curve::tween(
        "lift",
        TargetProperty::Matrix,
        10.0,
        10.0,
        AnimationValue::Matrix(Mat4::IDENTITY),
        AnimationValue::Matrix(Mat4::from_translation(Vec3::Y)),
    )
    .unwrap()
}

/// Root `R` carrying [`lift_curve`], child `C` two units above it.
fn rig(scene: &mut Scene) -> SkeletonKey {
    let mut skeleton = Skeleton::new("rig");
    let mut root = Bone::new("R", Mat4::IDENTITY);
    root.animations.push(Arc::new(lift_curve()));
    let root = skeleton.add_bone(root, None).unwrap();
    skeleton
        .add_bone(Bone::new("C", Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0))), Some(root))
        .unwrap();
    scene.add_skeleton(skeleton)
}

fn interpolating_scheduler() -> FrameScheduler {
    let mut settings = AnimationSettings::default();
    settings.interpolation.matrix_interpolation = true;
    FrameScheduler::new(settings)
}

// ============================================================================
// Preparation
// ============================================================================

#[test]
fn prepare_is_idempotent_until_a_write() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);

    assert!(scene.prepare_skeleton(key));
    assert_eq!(scene.skeleton(key).unwrap().compute_count(), 1);

    assert!(!scene.prepare_skeleton(key));
    assert_eq!(scene.skeleton(key).unwrap().compute_count(), 1);

    assert!(scene.set_property(
        TargetHandle::Bone(key, 1),
        &TargetProperty::Position,
        AnimationValue::Vector3(Vec3::new(0.0, 3.0, 0.0)),
    ));
    assert!(scene.prepare_skeleton(key));
    assert_eq!(scene.skeleton(key).unwrap().compute_count(), 2);
}

#[test]
fn skinning_buffer_has_identity_guard_slot() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    scene.prepare_skeleton(key);

    let skeleton = scene.skeleton(key).unwrap();
    assert_eq!(skeleton.transform_matrices().len(), 3 * 16);
    assert_eq!(skeleton.transform_matrices_bytes().len(), 3 * 16 * 4);
    assert_eq!(skeleton.skinning_matrix(2), Some(Mat4::IDENTITY));
    assert!(skeleton.skinning_matrix(3).is_none());
}

#[test]
fn pose_matrix_moves_every_root() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    scene
        .skeleton_mut(key)
        .unwrap()
        .set_pose_matrix(Mat4::from_translation(Vec3::X));
    scene.prepare_skeleton(key);

    let skeleton = scene.skeleton(key).unwrap();
    for slot in 0..2 {
        let m = skeleton.skinning_matrix(slot).unwrap();
        assert!(approx_vec3(translation(m), Vec3::X), "slot {slot}: {m:?}");
    }
}

// ============================================================================
// Animated Bones
// ============================================================================

#[test]
fn animated_root_moves_child_skinning_matrix() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    let mut scheduler = FrameScheduler::default();

    let controller = scheduler.begin_animation(
        &mut scene,
        TargetHandle::Skeleton(key),
        PlaybackOptions::range(0.0, 10.0),
        None,
    );
    scheduler.advance(0.0, &mut scene);
    scheduler.advance(1100.0, &mut scene);
    assert!(scheduler.is_stopped(controller));

    scene.prepare_skeleton(key);
    let skeleton = scene.skeleton(key).unwrap();
    let child = skeleton.skinning_matrix(1).unwrap();
    assert!(approx_vec3(translation(child), Vec3::Y), "{child:?}");
    let absolute = skeleton.bone(1).unwrap().absolute_transform();
    assert!(approx_vec3(translation(absolute), Vec3::new(0.0, 3.0, 0.0)));
}

#[test]
fn matrix_interpolation_blends_mid_segment() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    let mut scheduler = interpolating_scheduler();

    scheduler.begin_animation(
        &mut scene,
        TargetHandle::Skeleton(key),
        PlaybackOptions::range(0.0, 10.0),
        None,
    );
    scheduler.advance(0.0, &mut scene);
    scheduler.advance(500.0, &mut scene);

    scene.prepare_skeleton(key);
    let root = scene.skeleton(key).unwrap().skinning_matrix(0).unwrap();
    assert!(approx_vec3(translation(root), Vec3::new(0.0, 0.5, 0.0)), "{root:?}");
}

#[test]
fn skinned_node_animates_its_bones() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    let mut mesh = Node::new("mesh");
    mesh.skeleton = Some(key);
    let mesh = scene.add_node(mesh);

    let mut scheduler = FrameScheduler::default();
    let controller = scheduler.begin_animation(
        &mut scene,
        TargetHandle::Node(mesh),
        PlaybackOptions::range(0.0, 10.0),
        None,
    );
    assert_eq!(scheduler.controllers_for(TargetHandle::Node(mesh)), vec![controller]);
    let players = scheduler.controller(controller).unwrap().players();
    assert_eq!(players.len(), 1);
    assert!(players[0].targets_include(TargetHandle::Bone(key, 0)));
}

#[test]
fn weighted_bone_matrix_blends_with_rest_pose() {
    let mut scene = Scene::new();
    let mut skeleton = Skeleton::new("rig");
    skeleton
        .add_bone(
            Bone::new("b", Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)))
                .with_rest_pose(Mat4::IDENTITY),
            None,
        )
        .unwrap();
    let key = scene.add_skeleton(skeleton);

    let target = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
    let curve = Arc::new(
        Curve::tween(
            "hold",
            TargetProperty::Matrix,
            10.0,
            10.0,
            AnimationValue::Matrix(target),
            AnimationValue::Matrix(target),
        )
        .unwrap(),
    );

    let mut scheduler = FrameScheduler::default();
    let controller = scheduler
        .begin_direct_animation(
            &scene,
            TargetHandle::Bone(key, 0),
            &[curve],
            PlaybackOptions::range(0.0, 10.0),
        )
        .unwrap();
    scheduler.set_weight(controller, Some(0.5));
    scheduler.advance(0.0, &mut scene);

    let local = scene.skeleton(key).unwrap().bone(0).unwrap().local_matrix();
    assert!(approx_vec3(translation(local), Vec3::new(0.0, 1.0, 0.0)), "{local:?}");
}

#[test]
fn relative_matrix_loop_does_not_accumulate() {
    let mut scene = Scene::new();
    let mut skeleton = Skeleton::new("rig");
    let mut bone = Bone::new("R", Mat4::IDENTITY);
    bone.animations
        .push(Arc::new(lift_curve().with_loop_mode(CurveLoopMode::Relative)));
    skeleton.add_bone(bone, None).unwrap();
    let key = scene.add_skeleton(skeleton);

    let mut scheduler = interpolating_scheduler();
    scheduler.begin_animation(
        &mut scene,
        TargetHandle::Skeleton(key),
        PlaybackOptions::range(0.0, 10.0).looping(true),
        None,
    );
    scheduler.advance(0.0, &mut scene);
    scheduler.advance(1500.0, &mut scene);

    let local = scene.skeleton(key).unwrap().bone(0).unwrap().local_matrix();
    assert!(approx_vec3(translation(local), Vec3::new(0.0, 0.5, 0.0)), "{local:?}");
}

#[test]
fn unequal_bone_matrix_weights_decompose_and_blend() {
    let mut scene = Scene::new();
    let mut skeleton = Skeleton::new("rig");
    skeleton
        .add_bone(Bone::new("b", Mat4::IDENTITY), None)
        .unwrap();
    let key = scene.add_skeleton(skeleton);

    let mut scheduler = FrameScheduler::default();
    let poses = [
        (Mat4::from_rotation_translation(Quat::from_rotation_z(0.4), Vec3::X), 0.8),
        (Mat4::from_rotation_translation(Quat::from_rotation_z(1.0), Vec3::Y), 0.4),
        (Mat4::from_rotation_z(1.6), 0.4),
    ];
    for (pose, weight) in poses {
        let curve = Curve::tween(
            "hold",
            TargetProperty::Matrix,
            10.0,
            10.0,
            AnimationValue::Matrix(pose),
            AnimationValue::Matrix(pose),
        )
        .unwrap();
        let controller = scheduler
            .begin_direct_animation(
                &scene,
                TargetHandle::Bone(key, 0),
                &[Arc::new(curve)],
                PlaybackOptions::range(0.0, 10.0),
            )
            .unwrap();
        scheduler.set_weight(controller, Some(weight));
    }
    scheduler.advance(0.0, &mut scene);

    // Weights renormalize to 0.5, 0.25, 0.25.
    let local = scene.skeleton(key).unwrap().bone(0).unwrap().local_matrix();
    let (scale, rotation, position) = local.to_scale_rotation_translation();
    assert!(approx_vec3(scale, Vec3::ONE), "{scale:?}");
    assert!(approx_vec3(position, Vec3::new(0.5, 0.25, 0.0)), "{position:?}");
    let expected = Quat::from_rotation_z(0.85);
    assert!(
        rotation.abs_diff_eq(expected, EPSILON) || rotation.abs_diff_eq(-expected, EPSILON),
        "{rotation:?}"
    );
}

#[test]
fn skeleton_range_drives_bone_playback() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    scene
        .skeleton_mut(key)
        .unwrap()
        .create_animation_range("rise", 0.0, 5.0);

    let mut scheduler = interpolating_scheduler();
    let controller = scheduler
        .begin_animation_range(&mut scene, TargetHandle::Skeleton(key), "rise", false, 1.0)
        .unwrap();
    scheduler.advance(0.0, &mut scene);
    scheduler.advance(800.0, &mut scene);
    assert!(scheduler.is_stopped(controller));

    let local = scene.skeleton(key).unwrap().bone(0).unwrap().local_matrix();
    assert!(approx_vec3(translation(local), Vec3::new(0.0, 0.5, 0.0)), "{local:?}");

    assert!(scheduler
        .begin_animation_range(&mut scene, TargetHandle::Skeleton(key), "fall", false, 1.0)
        .is_none());
}

#[test]
fn return_to_rest_after_animation() {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    let mut scheduler = FrameScheduler::default();
    scheduler.begin_animation(
        &mut scene,
        TargetHandle::Skeleton(key),
        PlaybackOptions::range(0.0, 10.0),
        None,
    );
    scheduler.advance(0.0, &mut scene);
    scheduler.advance(1100.0, &mut scene);

    let skeleton = scene.skeleton_mut(key).unwrap();
    skeleton.return_to_rest();
    assert_eq!(skeleton.bone(0).unwrap().local_matrix(), Mat4::IDENTITY);
}

// ============================================================================
// Linked Nodes
// ============================================================================

#[test]
fn linked_node_drives_bone_on_prepare() {
    let mut scene = Scene::new();
    let node = scene.add_node(Node::new("joint"));
    let mut skeleton = Skeleton::new("rig");
    skeleton
        .add_bone(Bone::new("b", Mat4::IDENTITY).with_linked_node(node), None)
        .unwrap();
    let key = scene.add_skeleton(skeleton);
    scene.prepare_skeleton(key);
    assert!(!scene.prepare_skeleton(key));

    {
        let transform = &mut scene.get_node_mut(node).unwrap().transform;
        transform.position = Vec3::new(0.0, 0.0, 4.0);
        transform.rotation = Quat::from_rotation_y(0.5);
    }
    assert!(scene.prepare_skeleton(key));

    let slot = scene.skeleton(key).unwrap().skinning_matrix(0).unwrap();
    assert!(approx_vec3(translation(slot), Vec3::new(0.0, 0.0, 4.0)));
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn skeleton_json_round_trip_keeps_bones_curves_and_ranges() -> anyhow::Result<()> {
    let mut scene = Scene::new();
    let key = rig(&mut scene);
    let skeleton = scene.skeleton_mut(key).unwrap();
    skeleton.create_animation_range("rise", 0.0, 5.0);

    let json = skeleton.to_json()?;
    let parsed = Skeleton::from_json(&json)?;

    assert_eq!(parsed.bone_count(), 2);
    assert_eq!(parsed.bone(1).unwrap().parent(), Some(0));
    assert_eq!(parsed.animation_range("rise").map(|r| r.to), Some(5.0));

    let root = parsed.bone(0).unwrap();
    assert_eq!(root.animations.len(), 1);
    assert_eq!(root.animations[0].name(), "lift");
    assert_eq!(
        root.animations[0].last_value(),
        AnimationValue::Matrix(Mat4::from_translation(Vec3::Y))
    );
    assert_eq!(
        parsed.bone(1).unwrap().base_matrix(),
        Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0))
    );
    Ok(())
}

#[test]
fn skeleton_json_rejects_short_matrix() {
    let json = r#"{"name":"rig","bones":[{"name":"b","index":0,"parentBoneIndex":-1,"matrix":[1,0,0]}]}"#;
    let err = Skeleton::from_json(json).unwrap_err();
    assert!(matches!(
        err,
        myth_animation::AnimationError::InvalidBoneMatrix { found: 3, .. }
    ));
}
