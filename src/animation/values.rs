use std::fmt;
use std::ops::{Add, Mul, Sub};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::settings::InterpolationOptions;

/// Value family of a curve. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveDataType {
    Float,
    Vector3,
    Quaternion,
    Matrix,
    Color3,
    Vector2,
    Size,
}

impl CurveDataType {
    /// Numeric code used by the serialized form.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Float => 0,
            Self::Vector3 => 1,
            Self::Quaternion => 2,
            Self::Matrix => 3,
            Self::Color3 => 4,
            Self::Vector2 => 5,
            Self::Size => 6,
        }
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Float,
            1 => Self::Vector3,
            2 => Self::Quaternion,
            3 => Self::Matrix,
            4 => Self::Color3,
            5 => Self::Vector2,
            6 => Self::Size,
            _ => return None,
        })
    }

    /// Number of floats in one value of this type.
    #[must_use]
    pub const fn component_count(self) -> usize {
        match self {
            Self::Float => 1,
            Self::Vector2 | Self::Size => 2,
            Self::Vector3 | Self::Color3 => 3,
            Self::Quaternion => 4,
            Self::Matrix => 16,
        }
    }
}

// ============================================================================
// Value types without a glam counterpart
// ============================================================================

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Add for Color3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl Sub for Color3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b)
    }
}

impl Mul<f32> for Color3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

/// Two-dimensional extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Add for Size {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.width + rhs.width, self.height + rhs.height)
    }
}

impl Sub for Size {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.width - rhs.width, self.height - rhs.height)
    }
}

impl Mul<f32> for Size {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.width * rhs, self.height * rhs)
    }
}

// ============================================================================
// Type-erased value
// ============================================================================

/// A single animated value, tagged with its data type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationValue {
    Float(f32),
    Vector2(Vec2),
    Vector3(Vec3),
    Quaternion(Quat),
    Matrix(Mat4),
    Color3(Color3),
    Size(Size),
}

impl AnimationValue {
    #[must_use]
    pub fn data_type(&self) -> CurveDataType {
        match self {
            Self::Float(_) => CurveDataType::Float,
            Self::Vector2(_) => CurveDataType::Vector2,
            Self::Vector3(_) => CurveDataType::Vector3,
            Self::Quaternion(_) => CurveDataType::Quaternion,
            Self::Matrix(_) => CurveDataType::Matrix,
            Self::Color3(_) => CurveDataType::Color3,
            Self::Size(_) => CurveDataType::Size,
        }
    }

    /// Additive identity of a data type (all components zero).
    #[must_use]
    pub fn zero(data_type: CurveDataType) -> Self {
        match data_type {
            CurveDataType::Float => Self::Float(0.0),
            CurveDataType::Vector2 => Self::Vector2(Vec2::ZERO),
            CurveDataType::Vector3 => Self::Vector3(Vec3::ZERO),
            CurveDataType::Quaternion => Self::Quaternion(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)),
            CurveDataType::Matrix => Self::Matrix(Mat4::ZERO),
            CurveDataType::Color3 => Self::Color3(Color3::BLACK),
            CurveDataType::Size => Self::Size(Size::default()),
        }
    }

    /// Type-correct blend from `self` to `other`.
    ///
    /// Quaternions slerp, matrices follow `options.matrix_decomposition`,
    /// everything else lerps. Mismatched variants yield `other`.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f32, options: &InterpolationOptions) -> Self {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => Self::Float(a + (b - a) * t),
            (Self::Vector2(a), Self::Vector2(b)) => Self::Vector2(a.lerp(*b, t)),
            (Self::Vector3(a), Self::Vector3(b)) => Self::Vector3(a.lerp(*b, t)),
            (Self::Quaternion(a), Self::Quaternion(b)) => Self::Quaternion(a.slerp(*b, t)),
            (Self::Matrix(a), Self::Matrix(b)) => Self::Matrix(if options.matrix_decomposition {
                decompose_lerp(a, b, t)
            } else {
                Mat4::interpolate_linear(*a, *b, t)
            }),
            (Self::Color3(a), Self::Color3(b)) => Self::Color3(a.lerp(*b, t)),
            (Self::Size(a), Self::Size(b)) => Self::Size(a.lerp(*b, t)),
            _ => *other,
        }
    }

    /// Component-wise scale.
    #[must_use]
    pub fn scaled(&self, s: f32) -> Self {
        match *self {
            Self::Float(v) => Self::Float(v * s),
            Self::Vector2(v) => Self::Vector2(v * s),
            Self::Vector3(v) => Self::Vector3(v * s),
            Self::Quaternion(v) => Self::Quaternion(v * s),
            Self::Matrix(v) => Self::Matrix(v * s),
            Self::Color3(v) => Self::Color3(v * s),
            Self::Size(v) => Self::Size(v * s),
        }
    }

    /// `self += other * s`. Mismatched variants are ignored.
    pub fn add_scaled(&mut self, other: &Self, s: f32) {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => *a += b * s,
            (Self::Vector2(a), Self::Vector2(b)) => *a += *b * s,
            (Self::Vector3(a), Self::Vector3(b)) => *a += *b * s,
            (Self::Quaternion(a), Self::Quaternion(b)) => *a = *a + *b * s,
            (Self::Matrix(a), Self::Matrix(b)) => *a = *a + *b * s,
            (Self::Color3(a), Self::Color3(b)) => *a = *a + *b * s,
            (Self::Size(a), Self::Size(b)) => *a = *a + *b * s,
            _ => {}
        }
    }

    /// Appends the flat components (`x, y, z, w` order for quaternions,
    /// column-major for matrices).
    pub fn write_components(&self, out: &mut Vec<f32>) {
        match self {
            Self::Float(v) => out.push(*v),
            Self::Vector2(v) => out.extend_from_slice(&v.to_array()),
            Self::Vector3(v) => out.extend_from_slice(&v.to_array()),
            Self::Quaternion(v) => out.extend_from_slice(&v.to_array()),
            Self::Matrix(v) => out.extend_from_slice(&v.to_cols_array()),
            Self::Color3(v) => out.extend_from_slice(&[v.r, v.g, v.b]),
            Self::Size(v) => out.extend_from_slice(&[v.width, v.height]),
        }
    }

    /// Rebuilds a value from flat components. `None` if `data` is too short.
    #[must_use]
    pub fn from_components(data_type: CurveDataType, data: &[f32]) -> Option<Self> {
        if data.len() < data_type.component_count() {
            return None;
        }
        Some(match data_type {
            CurveDataType::Float => Self::Float(data[0]),
            CurveDataType::Vector2 => Self::Vector2(Vec2::new(data[0], data[1])),
            CurveDataType::Vector3 => Self::Vector3(Vec3::new(data[0], data[1], data[2])),
            CurveDataType::Quaternion => {
                Self::Quaternion(Quat::from_xyzw(data[0], data[1], data[2], data[3]))
            }
            CurveDataType::Matrix => Self::Matrix(Mat4::from_cols_slice(&data[..16])),
            CurveDataType::Color3 => Self::Color3(Color3::new(data[0], data[1], data[2])),
            CurveDataType::Size => Self::Size(Size::new(data[0], data[1])),
        })
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_quat(&self) -> Option<Quat> {
        match self {
            Self::Quaternion(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Self::Matrix(v) => Some(*v),
            _ => None,
        }
    }
}

/// Decompose both matrices, blend each channel, recompose.
#[must_use]
pub fn decompose_lerp(start: &Mat4, end: &Mat4, t: f32) -> Mat4 {
    let (s0, r0, t0) = start.to_scale_rotation_translation();
    let (s1, r1, t1) = end.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(s0.lerp(s1, t), r0.slerp(r1, t), t0.lerp(t1, t))
}

/// Hermite basis `(h00, h10, h01, h11)` for a normalized gradient.
#[inline]
fn hermite_weights(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;

    let s2 = -2.0 * t3 + 3.0 * t2;
    let s3 = t3 - t2;
    let s0 = 1.0 - s2;
    let s1 = s3 - t2 + t;
    (s0, s1, s2, s3)
}

// ============================================================================
// Per-type interpolation strategies
// ============================================================================

pub trait Interpolatable: Copy + PartialEq + fmt::Debug + Sized {
    const DATA_TYPE: CurveDataType;

    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self;

    /// Cubic Hermite. Tangents are per-frame and scaled by the segment
    /// length `dt`.
    fn interpolate_cubic(
        v0: Self,
        out_tangent0: Self,
        in_tangent1: Self,
        v1: Self,
        t: f32,
        dt: f32,
    ) -> Self;

    /// Linear segment honouring matrix options. Only matrices override this.
    fn interpolate_with(start: Self, end: Self, t: f32, _options: &InterpolationOptions) -> Self {
        Self::interpolate_linear(start, end, t)
    }

    /// Per-cycle offset accumulated by relative looping (`to - from`).
    fn offset(from: Self, to: Self) -> Self;

    /// `self + offset * repeat_count`.
    fn add_offset(self, offset: Self, repeat_count: f32) -> Self;

    fn into_value(self) -> AnimationValue;

    fn from_value(value: &AnimationValue) -> Option<Self>;
}

macro_rules! impl_value_conversion {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for AnimationValue {
            fn from(value: $ty) -> Self {
                AnimationValue::$variant(value)
            }
        }
    };
}

impl_value_conversion!(f32, Float);
impl_value_conversion!(Vec2, Vector2);
impl_value_conversion!(Vec3, Vector3);
impl_value_conversion!(Quat, Quaternion);
impl_value_conversion!(Mat4, Matrix);
impl_value_conversion!(Color3, Color3);
impl_value_conversion!(Size, Size);

/// Linear, Hermite and offset arithmetic for types closed under
/// `Add`/`Sub`/`Mul<f32>`.
macro_rules! impl_vector_interpolatable {
    ($ty:ty, $variant:ident) => {
        impl Interpolatable for $ty {
            const DATA_TYPE: CurveDataType = CurveDataType::$variant;

            fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
                start + (end - start) * t
            }

            fn interpolate_cubic(
                v0: Self,
                out_tangent0: Self,
                in_tangent1: Self,
                v1: Self,
                t: f32,
                dt: f32,
            ) -> Self {
                let (s0, s1, s2, s3) = hermite_weights(t);
                let m0 = out_tangent0 * dt;
                let m1 = in_tangent1 * dt;
                v0 * s0 + m0 * s1 + v1 * s2 + m1 * s3
            }

            fn offset(from: Self, to: Self) -> Self {
                to - from
            }

            fn add_offset(self, offset: Self, repeat_count: f32) -> Self {
                self + offset * repeat_count
            }

            fn into_value(self) -> AnimationValue {
                AnimationValue::$variant(self)
            }

            fn from_value(value: &AnimationValue) -> Option<Self> {
                match value {
                    AnimationValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

impl_vector_interpolatable!(f32, Float);
impl_vector_interpolatable!(Vec2, Vector2);
impl_vector_interpolatable!(Vec3, Vector3);
impl_vector_interpolatable!(Color3, Color3);
impl_vector_interpolatable!(Size, Size);

impl Interpolatable for Quat {
    const DATA_TYPE: CurveDataType = CurveDataType::Quaternion;

    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start.slerp(end, t)
    }

    fn interpolate_cubic(
        v0: Self,
        out_tangent0: Self,
        in_tangent1: Self,
        v1: Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_weights(t);

        let v0_v = Vec4::from(v0);
        let v1_v = Vec4::from(v1);
        let m0_v = Vec4::from(out_tangent0) * dt;
        let m1_v = Vec4::from(in_tangent1) * dt;

        let result = v0_v * s0 + m0_v * s1 + v1_v * s2 + m1_v * s3;

        Quat::from_vec4(result).normalize()
    }

    fn offset(from: Self, to: Self) -> Self {
        to - from
    }

    // Component-wise and non-normalizing: an approximation that only holds
    // for small per-cycle deltas.
    fn add_offset(self, offset: Self, repeat_count: f32) -> Self {
        self + offset * repeat_count
    }

    fn into_value(self) -> AnimationValue {
        AnimationValue::Quaternion(self)
    }

    fn from_value(value: &AnimationValue) -> Option<Self> {
        value.as_quat()
    }
}

/// Relative looping replays matrix keys unchanged on every cycle: the
/// per-cycle offset of a matrix curve is always zero and never accumulated.
impl Interpolatable for Mat4 {
    const DATA_TYPE: CurveDataType = CurveDataType::Matrix;

    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start + (end - start) * t
    }

    // Matrix keys carry no meaningful tangents.
    fn interpolate_cubic(
        v0: Self,
        _out_tangent0: Self,
        _in_tangent1: Self,
        v1: Self,
        t: f32,
        _dt: f32,
    ) -> Self {
        decompose_lerp(&v0, &v1, t)
    }

    fn interpolate_with(start: Self, end: Self, t: f32, options: &InterpolationOptions) -> Self {
        if !options.matrix_interpolation {
            return start;
        }
        if options.matrix_decomposition {
            decompose_lerp(&start, &end, t)
        } else {
            Self::interpolate_linear(start, end, t)
        }
    }

    fn offset(_from: Self, _to: Self) -> Self {
        Mat4::ZERO
    }

    fn add_offset(self, _offset: Self, _repeat_count: f32) -> Self {
        self
    }

    fn into_value(self) -> AnimationValue {
        AnimationValue::Matrix(self)
    }

    fn from_value(value: &AnimationValue) -> Option<Self> {
        value.as_mat4()
    }
}
