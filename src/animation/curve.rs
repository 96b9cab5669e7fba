use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::animation::binding::TargetProperty;
use crate::animation::easing::EasingFunction;
use crate::animation::tracks::{InterpolationState, Keyframe, KeyframeTrack};
use crate::animation::values::{AnimationValue, Color3, CurveDataType, Interpolatable, Size};
use crate::errors::{AnimationError, Result};
use crate::settings::InterpolationOptions;
use crate::utils::interner::{self, Symbol};

/// Behaviour once playback runs past the curve's frame window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveLoopMode {
    /// Each cycle continues from where the previous one ended.
    Relative,
    /// Restart from the first frame.
    #[default]
    Cycle,
    /// Freeze on the terminal value.
    Constant,
}

impl CurveLoopMode {
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Relative => 0,
            Self::Cycle => 1,
            Self::Constant => 2,
        }
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Relative),
            1 => Some(Self::Cycle),
            2 => Some(Self::Constant),
            _ => None,
        }
    }
}

/// Process-unique curve identity, used for non-owning back-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurveId(u64);

impl CurveId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Named sub-window of a curve.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRange {
    pub name: String,
    pub from: f32,
    pub to: f32,
}

impl AnimationRange {
    #[must_use]
    pub fn new(name: &str, from: f32, to: f32) -> Self {
        Self {
            name: name.to_string(),
            from,
            to,
        }
    }
}

/// Callback invoked with the frame at which the event was crossed.
pub type EventAction = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Clone)]
pub struct CurveEvent {
    pub frame: f32,
    pub action: EventAction,
    pub only_once: bool,
    pub is_done: bool,
}

impl CurveEvent {
    pub fn new(frame: f32, action: impl Fn(f32) + Send + Sync + 'static, only_once: bool) -> Self {
        Self {
            frame,
            action: Arc::new(action),
            only_once,
            is_done: false,
        }
    }
}

impl fmt::Debug for CurveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveEvent")
            .field("frame", &self.frame)
            .field("only_once", &self.only_once)
            .field("is_done", &self.is_done)
            .finish_non_exhaustive()
    }
}

/// Typed keyframes. The variant is chosen once and selects the interpolation
/// strategy for the lifetime of the curve.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveData {
    Float(KeyframeTrack<f32>),
    Vector2(KeyframeTrack<Vec2>),
    Vector3(KeyframeTrack<Vec3>),
    Quaternion(KeyframeTrack<Quat>),
    Matrix(KeyframeTrack<Mat4>),
    Color3(KeyframeTrack<Color3>),
    Size(KeyframeTrack<Size>),
}

macro_rules! dispatch_track {
    ($data:expr, $track:ident => $body:expr) => {
        match $data {
            CurveData::Float($track) => $body,
            CurveData::Vector2($track) => $body,
            CurveData::Vector3($track) => $body,
            CurveData::Quaternion($track) => $body,
            CurveData::Matrix($track) => $body,
            CurveData::Color3($track) => $body,
            CurveData::Size($track) => $body,
        }
    };
}

fn erase_keys<T: Interpolatable>(keys: &[Keyframe<T>]) -> Vec<Keyframe<AnimationValue>> {
    keys.iter()
        .map(|k| Keyframe {
            frame: k.frame,
            value: k.value.into_value(),
            in_tangent: k.in_tangent.map(Interpolatable::into_value),
            out_tangent: k.out_tangent.map(Interpolatable::into_value),
            interpolation: k.interpolation,
        })
        .collect()
}

fn typed_keys<T: Interpolatable>(
    name: &str,
    keys: &[Keyframe<AnimationValue>],
) -> Result<Vec<Keyframe<T>>> {
    let convert = |value: &AnimationValue| {
        T::from_value(value).ok_or_else(|| AnimationError::KeyTypeMismatch {
            name: name.to_string(),
            expected: T::DATA_TYPE,
            found: value.data_type(),
        })
    };

    keys.iter()
        .map(|k| {
            Ok(Keyframe {
                frame: k.frame,
                value: convert(&k.value)?,
                in_tangent: k.in_tangent.as_ref().map(convert).transpose()?,
                out_tangent: k.out_tangent.as_ref().map(convert).transpose()?,
                interpolation: k.interpolation,
            })
        })
        .collect()
}

/// Prepends/appends copies of the boundary keys so the track covers
/// `[begin, end]`.
fn extend_track<T: Interpolatable>(track: &mut KeyframeTrack<T>, begin: f32, end: f32) {
    let keys = track.keys_mut();
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return;
    };
    if first.frame > begin {
        keys.insert(0, Keyframe { frame: begin, ..first });
    }
    if last.frame < end {
        keys.push(Keyframe { frame: end, ..last });
    }
}

impl CurveData {
    /// Builds typed keys from type-erased ones; every value and tangent must
    /// match `data_type`.
    pub fn from_keys(
        name: &str,
        data_type: CurveDataType,
        keys: &[Keyframe<AnimationValue>],
    ) -> Result<Self> {
        Ok(match data_type {
            CurveDataType::Float => Self::Float(KeyframeTrack::new(typed_keys(name, keys)?)),
            CurveDataType::Vector2 => Self::Vector2(KeyframeTrack::new(typed_keys(name, keys)?)),
            CurveDataType::Vector3 => Self::Vector3(KeyframeTrack::new(typed_keys(name, keys)?)),
            CurveDataType::Quaternion => {
                Self::Quaternion(KeyframeTrack::new(typed_keys(name, keys)?))
            }
            CurveDataType::Matrix => Self::Matrix(KeyframeTrack::new(typed_keys(name, keys)?)),
            CurveDataType::Color3 => Self::Color3(KeyframeTrack::new(typed_keys(name, keys)?)),
            CurveDataType::Size => Self::Size(KeyframeTrack::new(typed_keys(name, keys)?)),
        })
    }

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

    #[must_use]
    pub fn len(&self) -> usize {
        dispatch_track!(self, t => t.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frame of key `index`.
    #[must_use]
    pub fn frame_at(&self, index: usize) -> Option<f32> {
        dispatch_track!(self, t => t.keys().get(index).map(|k| k.frame))
    }

    /// Value of key `index`.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<AnimationValue> {
        dispatch_track!(self, t => t.keys().get(index).map(|k| k.value.into_value()))
    }

    /// Type-erased copy of every key.
    #[must_use]
    pub fn erased_keys(&self) -> Vec<Keyframe<AnimationValue>> {
        dispatch_track!(self, t => erase_keys(t.keys()))
    }

    pub fn interpolate(
        &self,
        frame: f32,
        state: &mut InterpolationState,
        easing: Option<&EasingFunction>,
        options: &InterpolationOptions,
    ) -> AnimationValue {
        dispatch_track!(self, t => t.interpolate(frame, state, easing, options).into_value())
    }

    fn extend_to(&mut self, begin: f32, end: f32) {
        dispatch_track!(self, t => extend_track(t, begin, end));
    }

    fn retain_frames(&mut self, keep: impl Fn(f32) -> bool) {
        dispatch_track!(self, t => t.keys_mut().retain(|k| keep(k.frame)));
    }
}

/// A named, typed, keyframed property track.
///
/// Curves are immutable once shared (`Arc<Curve>`) across players. Every
/// mutator here is meant for authoring time.
pub struct Curve {
    id: CurveId,
    name: Symbol,
    property: TargetProperty,
    frames_per_second: f32,
    loop_mode: CurveLoopMode,
    data: CurveData,
    ranges: Vec<AnimationRange>,
    events: Vec<CurveEvent>,
    easing: Option<EasingFunction>,
    pub enable_blending: bool,
    pub blending_speed: f32,
}

impl Curve {
    pub const DEFAULT_BLENDING_SPEED: f32 = 0.01;

    pub fn new(
        name: &str,
        property: TargetProperty,
        frames_per_second: f32,
        data: CurveData,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(AnimationError::EmptyCurve {
                name: name.to_string(),
            });
        }
        Ok(Self {
            id: CurveId::next(),
            name: interner::intern(name),
            property,
            frames_per_second,
            loop_mode: CurveLoopMode::default(),
            data,
            ranges: Vec::new(),
            events: Vec::new(),
            easing: None,
            enable_blending: false,
            blending_speed: Self::DEFAULT_BLENDING_SPEED,
        })
    }

    /// Builds a curve from type-erased keys.
    pub fn from_keys(
        name: &str,
        property: TargetProperty,
        frames_per_second: f32,
        data_type: CurveDataType,
        keys: &[Keyframe<AnimationValue>],
    ) -> Result<Self> {
        let data = CurveData::from_keys(name, data_type, keys)?;
        Self::new(name, property, frames_per_second, data)
    }

    /// Two-key curve from `from` at frame 0 to `to` at `total_frames`.
    pub fn tween(
        name: &str,
        property: TargetProperty,
        frames_per_second: f32,
        total_frames: f32,
        from: AnimationValue,
        to: AnimationValue,
    ) -> Result<Self> {
        Self::from_keys(
            name,
            property,
            frames_per_second,
            from.data_type(),
            &[Keyframe::new(0.0, from), Keyframe::new(total_frames, to)],
        )
    }

    #[must_use]
    pub fn with_loop_mode(mut self, loop_mode: CurveLoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    #[must_use]
    pub fn with_blending(mut self, blending_speed: f32) -> Self {
        self.enable_blending = true;
        self.blending_speed = blending_speed;
        self
    }

    #[must_use]
    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = Some(easing);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn id(&self) -> CurveId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        interner::resolve(self.name)
    }

    #[inline]
    #[must_use]
    pub fn name_symbol(&self) -> Symbol {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn property(&self) -> &TargetProperty {
        &self.property
    }

    #[inline]
    #[must_use]
    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }

    #[inline]
    #[must_use]
    pub fn loop_mode(&self) -> CurveLoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, loop_mode: CurveLoopMode) {
        self.loop_mode = loop_mode;
    }

    #[inline]
    #[must_use]
    pub fn data_type(&self) -> CurveDataType {
        self.data.data_type()
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &CurveData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn easing(&self) -> Option<&EasingFunction> {
        self.easing.as_ref()
    }

    pub fn set_easing(&mut self, easing: Option<EasingFunction>) {
        self.easing = easing;
    }

    /// Frame of the first key.
    #[must_use]
    pub fn min_frame(&self) -> f32 {
        self.data.frame_at(0).unwrap_or(0.0)
    }

    /// Frame of the last key.
    #[must_use]
    pub fn max_frame(&self) -> f32 {
        self.data
            .frame_at(self.data.len().saturating_sub(1))
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn first_value(&self) -> AnimationValue {
        self.data
            .value_at(0)
            .unwrap_or_else(|| AnimationValue::zero(self.data_type()))
    }

    #[must_use]
    pub fn last_value(&self) -> AnimationValue {
        self.data
            .value_at(self.data.len().saturating_sub(1))
            .unwrap_or_else(|| AnimationValue::zero(self.data_type()))
    }

    // ========================================================================
    // Keys
    // ========================================================================

    /// Inserts a key in frame order. The value must match the data type.
    pub fn add_key(&mut self, key: Keyframe<AnimationValue>) -> Result<()> {
        let name = self.name();
        match &mut self.data {
            CurveData::Float(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
            CurveData::Vector2(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
            CurveData::Vector3(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
            CurveData::Quaternion(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
            CurveData::Matrix(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
            CurveData::Color3(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
            CurveData::Size(t) => t.insert_key(typed_keys(name, &[key])?.remove(0)),
        }
        Ok(())
    }

    /// Replaces every key. The data type cannot change.
    pub fn set_keys(&mut self, keys: &[Keyframe<AnimationValue>]) -> Result<()> {
        if keys.is_empty() {
            return Err(AnimationError::EmptyCurve {
                name: self.name().to_string(),
            });
        }
        self.data = CurveData::from_keys(self.name(), self.data_type(), keys)?;
        Ok(())
    }

    /// Value at `frame` with fresh cycle-mode state.
    #[must_use]
    pub fn evaluate(&self, frame: f32, options: &InterpolationOptions) -> AnimationValue {
        let mut state = InterpolationState::new(CurveLoopMode::Cycle);
        self.interpolate(frame, &mut state, options)
    }

    pub(crate) fn interpolate(
        &self,
        frame: f32,
        state: &mut InterpolationState,
        options: &InterpolationOptions,
    ) -> AnimationValue {
        self.data
            .interpolate(frame, state, self.easing.as_ref(), options)
    }

    /// Duplicates boundary keys so the curve spans `[begin, end]`.
    pub(crate) fn extend_to(&mut self, begin: f32, end: f32) {
        self.data.extend_to(begin, end);
    }

    // ========================================================================
    // Ranges
    // ========================================================================

    /// Creates a named range; an existing range with the same name is kept.
    pub fn create_range(&mut self, name: &str, from: f32, to: f32) {
        if self.range(name).is_none() {
            self.ranges.push(AnimationRange::new(name, from, to));
        }
    }

    /// Removes a range and, if `delete_frames`, the keys inside it. The last
    /// remaining key is never removed.
    pub fn delete_range(&mut self, name: &str, delete_frames: bool) {
        let Some(index) = self.ranges.iter().position(|r| r.name == name) else {
            return;
        };
        let range = self.ranges.remove(index);
        if delete_frames {
            let before = self.data.clone();
            self.data
                .retain_frames(|frame| frame < range.from || frame > range.to);
            if self.data.is_empty() {
                self.data = before.clone();
                self.data.retain_frames(|frame| frame <= range.from);
                if self.data.is_empty() {
                    self.data = before;
                }
            }
        }
    }

    #[must_use]
    pub fn range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn ranges(&self) -> &[AnimationRange] {
        &self.ranges
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn add_event(&mut self, event: CurveEvent) {
        self.events.push(event);
        self.events.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    }

    pub fn remove_events(&mut self, frame: f32) {
        self.events.retain(|e| e.frame != frame);
    }

    #[must_use]
    pub fn events(&self) -> &[CurveEvent] {
        &self.events
    }
}

impl Clone for Curve {
    /// Clones carry a fresh identity: players bound to the original keep
    /// reporting against it.
    fn clone(&self) -> Self {
        Self {
            id: CurveId::next(),
            name: self.name,
            property: self.property,
            frames_per_second: self.frames_per_second,
            loop_mode: self.loop_mode,
            data: self.data.clone(),
            ranges: self.ranges.clone(),
            events: self.events.clone(),
            easing: self.easing,
            enable_blending: self.enable_blending,
            blending_speed: self.blending_speed,
        }
    }
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Curve")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("property", &self.property)
            .field("data_type", &self.data_type())
            .field("loop_mode", &self.loop_mode)
            .field("keys", &self.data.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_curve() -> Curve {
        Curve::from_keys(
            "fade",
            TargetProperty::Visibility,
            30.0,
            CurveDataType::Float,
            &[
                Keyframe::new(0.0, AnimationValue::Float(0.0)),
                Keyframe::new(10.0, AnimationValue::Float(1.0)),
                Keyframe::new(20.0, AnimationValue::Float(0.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_curve_is_rejected() {
        let result = Curve::from_keys("empty", TargetProperty::Visibility, 30.0, CurveDataType::Float, &[]);
        assert!(matches!(result, Err(AnimationError::EmptyCurve { .. })));
    }

    #[test]
    fn test_mixed_key_types_are_rejected() {
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
        assert!(matches!(result, Err(AnimationError::KeyTypeMismatch { .. })));
    }

    #[test]
    fn test_add_key_wrong_type_keeps_curve() {
        let mut curve = float_curve();
        let err = curve.add_key(Keyframe::new(5.0, AnimationValue::Vector2(Vec2::ONE)));
        assert!(err.is_err());
        assert_eq!(curve.data().len(), 3);
    }

    #[test]
    fn test_delete_range_removes_frames() {
        let mut curve = float_curve();
        curve.create_range("out", 15.0, 20.0);
        curve.delete_range("out", true);
        assert!(curve.range("out").is_none());
        assert_eq!(curve.data().len(), 2);
        assert_eq!(curve.max_frame(), 10.0);
    }

    #[test]
    fn test_clone_has_new_identity() {
        let curve = float_curve();
        let copy = curve.clone();
        assert_ne!(curve.id(), copy.id());
        assert_eq!(copy.name(), "fade");
    }

    #[test]
    fn test_extend_to_duplicates_boundaries() {
        let mut curve = float_curve();
        curve.extend_to(-5.0, 30.0);
        assert_eq!(curve.min_frame(), -5.0);
        assert_eq!(curve.max_frame(), 30.0);
        assert_eq!(curve.first_value(), AnimationValue::Float(0.0));
        assert_eq!(curve.last_value(), AnimationValue::Float(0.0));
    }
}
