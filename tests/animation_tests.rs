//! Curve Interpolation Tests
//!
//! Tests for:
//! - Two-key boundaries and midpoints (f32, Vec3, Quat, Color3)
//! - STEP keys holding their value
//! - Hermite tangents
//! - Loop modes: Cycle wrap, Relative accumulation, Constant freeze
//! - Easing functions reshaping the gradient
//! - Matrix interpolation switches

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Quat, Vec3};

use myth_animation::animation::{
    AnimationValue, Color3, Curve, CurveDataType, CurveLoopMode, EasingFunction, EasingKind,
    EasingMode, InterpolationState, KeyInterpolation, Keyframe, KeyframeTrack, TargetProperty,
};
use myth_animation::settings::InterpolationOptions;

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn float_curve(keys: &[(f32, f32)]) -> Curve {
    let keys: Vec<_> = keys
        .iter()
        .map(|&(frame, value)| Keyframe::new(frame, AnimationValue::Float(value)))
        .collect();
    Curve::from_keys("f", TargetProperty::from_path("value"), 30.0, CurveDataType::Float, &keys)
        .unwrap()
}

fn float_at(curve: &Curve, frame: f32) -> f32 {
    curve
        .evaluate(frame, &InterpolationOptions::default())
        .as_float()
        .unwrap()
}

// ============================================================================
// Boundaries & Midpoints
// ============================================================================

#[test]
fn two_key_float_boundaries() {
    let curve = float_curve(&[(0.0, 2.0), (10.0, 6.0)]);
    assert!(approx(float_at(&curve, 0.0), 2.0));
    assert!(approx(float_at(&curve, 10.0), 6.0));
    assert!(approx(float_at(&curve, 5.0), 4.0));
}

#[test]
fn frames_outside_keys_clamp_to_end_values() {
    let curve = float_curve(&[(5.0, 1.0), (10.0, 3.0)]);
    assert!(approx(float_at(&curve, 0.0), 1.0));
    assert!(approx(float_at(&curve, 50.0), 3.0));
}

#[test]
fn single_key_returns_its_value() {
    let curve = float_curve(&[(3.0, 7.0)]);
    assert!(approx(float_at(&curve, 0.0), 7.0));
    assert!(approx(float_at(&curve, 100.0), 7.0));
}

#[test]
fn empty_curve_is_rejected() {
    let result = Curve::from_keys("empty", TargetProperty::Position, 30.0, CurveDataType::Vector3, &[]);
    assert!(result.is_err());
}

#[test]
fn mixed_key_types_are_rejected() {
    let result = Curve::from_keys(
        "mixed",
        TargetProperty::Position,
        30.0,
        CurveDataType::Vector3,
        &[
            Keyframe::new(0.0, AnimationValue::Vector3(Vec3::ZERO)),
            Keyframe::new(1.0, AnimationValue::Float(1.0)),
        ],
    );
    assert!(result.is_err());
}

#[test]
fn vec3_midpoint_is_componentwise() {
    let curve = Curve::tween(
        "move",
        TargetProperty::Position,
        30.0,
        10.0,
        AnimationValue::Vector3(Vec3::new(0.0, 0.0, 0.0)),
        AnimationValue::Vector3(Vec3::new(2.0, 4.0, -6.0)),
    )
    .unwrap();
    let value = curve.evaluate(5.0, &InterpolationOptions::default());
    assert!(approx_vec3(value.as_vec3().unwrap(), Vec3::new(1.0, 2.0, -3.0)));
}

#[test]
fn quaternion_midpoint_is_normalized_slerp() {
    let start = Quat::IDENTITY;
    let end = Quat::from_rotation_y(FRAC_PI_2);
    let curve = Curve::tween(
        "turn",
        TargetProperty::Rotation,
        30.0,
        10.0,
        AnimationValue::Quaternion(start),
        AnimationValue::Quaternion(end),
    )
    .unwrap();

    let mid = curve
        .evaluate(5.0, &InterpolationOptions::default())
        .as_quat()
        .unwrap();
    assert!(mid.is_normalized());
    assert!(mid.abs_diff_eq(Quat::from_rotation_y(FRAC_PI_2 / 2.0), EPSILON));
}

#[test]
fn color3_midpoint() {
    let curve = Curve::tween(
        "tint",
        TargetProperty::from_path("diffuse"),
        30.0,
        2.0,
        AnimationValue::Color3(Color3::new(0.0, 0.0, 1.0)),
        AnimationValue::Color3(Color3::new(1.0, 0.5, 0.0)),
    )
    .unwrap();
    match curve.evaluate(1.0, &InterpolationOptions::default()) {
        AnimationValue::Color3(c) => {
            assert!(approx(c.r, 0.5) && approx(c.g, 0.25) && approx(c.b, 0.5));
        }
        other => panic!("expected Color3, got {other:?}"),
    }
}

// ============================================================================
// STEP Interpolation
// ============================================================================

#[test]
fn step_key_holds_until_next_frame() {
    let keys = vec![
        Keyframe::new(0.0, 1.0_f32).step(),
        Keyframe::new(10.0, 5.0_f32),
        Keyframe::new(20.0, 9.0_f32),
    ];
    let track = KeyframeTrack::new(keys);
    let options = InterpolationOptions::default();

    for frame in [0.0, 2.5, 9.0, 9.999] {
        assert!(approx(track.sample(frame, &options), 1.0), "frame {frame}");
    }
    assert!(approx(track.sample(10.0, &options), 5.0));
    // The second key is linear again
    assert!(approx(track.sample(15.0, &options), 7.0));
}

#[test]
fn step_flag_is_exposed_on_keys() {
    let key = Keyframe::new(0.0, 1.0_f32).step();
    assert_eq!(key.interpolation, KeyInterpolation::Step);
}

// ============================================================================
// Hermite Tangents
// ============================================================================

#[test]
fn hermite_hits_endpoints() {
    let track = KeyframeTrack::new(vec![
        Keyframe::new(0.0, 0.0_f32).with_tangents(0.0, 3.0),
        Keyframe::new(1.0, 1.0_f32).with_tangents(-3.0, 0.0),
    ]);
    let options = InterpolationOptions::default();
    assert!(approx(track.sample(0.0, &options), 0.0));
    assert!(approx(track.sample(1.0, &options), 1.0));
}

#[test]
fn hermite_with_flat_tangents_eases_in_and_out() {
    let track = KeyframeTrack::new(vec![
        Keyframe::new(0.0, 0.0_f32).with_tangents(0.0, 0.0),
        Keyframe::new(10.0, 10.0_f32).with_tangents(0.0, 0.0),
    ]);
    let options = InterpolationOptions::default();
    // Smoothstep: slower than linear near the start, symmetric at the middle
    assert!(track.sample(1.0, &options) < 1.0);
    assert!(approx(track.sample(5.0, &options), 5.0));
    assert!(track.sample(9.0, &options) > 9.0);
}

// ============================================================================
// Loop Modes
// ============================================================================

#[test]
fn relative_loop_accumulates_offset() {
    let curve = float_curve(&[(0.0, 1.0), (10.0, 4.0)]).with_loop_mode(CurveLoopMode::Relative);
    let options = InterpolationOptions::default();

    for repeat_count in 0..4 {
        let mut state = InterpolationState::new(CurveLoopMode::Relative);
        state.repeat_count = repeat_count;
        state.offset_value = Some(AnimationValue::Float(3.0));

        let value = curve.data().interpolate(5.0, &mut state, None, &options);
        let expected = 2.5 + repeat_count as f32 * 3.0;
        assert!(approx(value.as_float().unwrap(), expected), "cycle {repeat_count}");
    }
}

#[test]
fn relative_quaternion_offset_is_additive() {
    let track = KeyframeTrack::new(vec![
        Keyframe::new(0.0, Quat::IDENTITY),
        Keyframe::new(10.0, Quat::IDENTITY),
    ]);
    let offset = Quat::from_xyzw(0.1, 0.0, 0.0, 0.0);
    let mut state = InterpolationState::new(CurveLoopMode::Relative);
    state.repeat_count = 2;
    state.offset_value = Some(AnimationValue::Quaternion(offset));

    let value = track.interpolate(5.0, &mut state, None, &InterpolationOptions::default());
    // Component-wise add, no renormalization
    assert!(value.abs_diff_eq(Quat::from_xyzw(0.2, 0.0, 0.0, 1.0), EPSILON));
}

#[test]
fn constant_loop_freezes_on_high_limit() {
    let curve = float_curve(&[(0.0, 0.0), (10.0, 10.0)]);
    let mut state = InterpolationState::new(CurveLoopMode::Constant);
    state.repeat_count = 1;
    state.high_limit_value = Some(AnimationValue::Float(10.0));

    let value = curve
        .data()
        .interpolate(2.0, &mut state, None, &InterpolationOptions::default());
    assert!(approx(value.as_float().unwrap(), 10.0));
}

#[test]
fn cursor_rewinds_for_backward_sampling() {
    let curve = float_curve(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]);
    let options = InterpolationOptions::default();
    let mut state = InterpolationState::default();

    let forward = curve.data().interpolate(15.0, &mut state, None, &options);
    assert_eq!(state.key, 1);
    let backward = curve.data().interpolate(5.0, &mut state, None, &options);
    assert_eq!(state.key, 0);

    assert!(approx(forward.as_float().unwrap(), 5.0));
    assert!(approx(backward.as_float().unwrap(), 5.0));
}

// ============================================================================
// Easing
// ============================================================================

#[test]
fn easing_reshapes_gradient() {
    let eased = float_curve(&[(0.0, 0.0), (10.0, 10.0)])
        .with_easing(EasingFunction::new(EasingKind::Quadratic, EasingMode::EaseIn));
    // t = 0.5 -> 0.25
    assert!(approx(float_at(&eased, 5.0), 2.5));
    assert!(approx(float_at(&eased, 10.0), 10.0));
}

#[test]
fn easing_modes_are_symmetric() {
    let kinds = [
        EasingKind::Circle,
        EasingKind::Cubic,
        EasingKind::Sine,
        EasingKind::Quartic,
        EasingKind::Quintic,
        EasingKind::Power { power: 3.0 },
        EasingKind::Exponential { exponent: 2.0 },
    ];
    for kind in kinds {
        let ease_in = EasingFunction::new(kind, EasingMode::EaseIn);
        let ease_out = EasingFunction::new(kind, EasingMode::EaseOut);
        let in_out = EasingFunction::new(kind, EasingMode::EaseInOut);

        assert!(approx(ease_in.ease(0.0), 0.0), "{kind:?}");
        assert!(approx(ease_in.ease(1.0), 1.0), "{kind:?}");
        assert!(approx(ease_out.ease(0.3), 1.0 - ease_in.ease(0.7)), "{kind:?}");
        assert!(approx(in_out.ease(0.5), 0.5), "{kind:?}");
    }
}

// ============================================================================
// Matrices
// ============================================================================

fn matrix_curve() -> Curve {
    Curve::tween(
        "m",
        TargetProperty::Matrix,
        30.0,
        10.0,
        AnimationValue::Matrix(Mat4::IDENTITY),
        AnimationValue::Matrix(Mat4::from_rotation_translation(
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(0.0, 2.0, 0.0),
        )),
    )
    .unwrap()
}

#[test]
fn matrix_holds_start_key_when_interpolation_disabled() {
    let value = matrix_curve().evaluate(5.0, &InterpolationOptions::default());
    assert_eq!(value, AnimationValue::Matrix(Mat4::IDENTITY));
}

#[test]
fn matrix_decompose_lerp_keeps_rigid_transform() {
    let options = InterpolationOptions {
        matrix_interpolation: true,
        matrix_decomposition: true,
    };
    let m = matrix_curve().evaluate(5.0, &options).as_mat4().unwrap();
    let (scale, rotation, translation) = m.to_scale_rotation_translation();

    assert!(approx_vec3(scale, Vec3::ONE));
    assert!(approx_vec3(translation, Vec3::new(0.0, 1.0, 0.0)));
    assert!(rotation.abs_diff_eq(Quat::from_rotation_z(FRAC_PI_2 / 2.0), 1e-4));
}

// ============================================================================
// Curve Editing
// ============================================================================

#[test]
fn add_key_keeps_frames_sorted() {
    let mut curve = float_curve(&[(0.0, 0.0), (10.0, 10.0)]);
    curve.add_key(Keyframe::new(5.0, AnimationValue::Float(0.0))).unwrap();
    assert!(approx(float_at(&curve, 5.0), 0.0));
    assert!(approx(float_at(&curve, 7.5), 5.0));
    assert!(curve.add_key(Keyframe::new(1.0, AnimationValue::Vector3(Vec3::ONE))).is_err());
}

#[test]
fn delete_range_removes_frames_inside() {
    let mut curve = float_curve(&[(0.0, 0.0), (5.0, 5.0), (10.0, 10.0), (20.0, 0.0)]);
    curve.create_range("middle", 4.0, 11.0);
    assert_eq!(curve.range("middle").map(|r| (r.from, r.to)), Some((4.0, 11.0)));

    curve.delete_range("middle", true);
    assert!(curve.range("middle").is_none());
    assert_eq!(curve.min_frame(), 0.0);
    assert_eq!(curve.max_frame(), 20.0);
    assert!(approx(float_at(&curve, 10.0), 0.0));
}

#[test]
fn cloned_curve_has_fresh_identity() {
    let curve = float_curve(&[(0.0, 0.0), (1.0, 1.0)]);
    let copy = curve.clone();
    assert_ne!(curve.id(), copy.id());
    assert_eq!(curve.name(), copy.name());
}
