use crate::animation::curve::CurveLoopMode;
use crate::animation::easing::EasingFunction;
use crate::animation::values::{AnimationValue, CurveDataType, Interpolatable};
use crate::settings::InterpolationOptions;

/// How a key blends towards the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyInterpolation {
    /// Linear, or Hermite when both facing tangents exist.
    #[default]
    Linear,
    /// Hold this key's value until the next key's frame.
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub frame: f32,
    pub value: T,
    pub in_tangent: Option<T>,
    pub out_tangent: Option<T>,
    pub interpolation: KeyInterpolation,
}

impl<T> Keyframe<T> {
    #[must_use]
    pub fn new(frame: f32, value: T) -> Self {
        Self {
            frame,
            value,
            in_tangent: None,
            out_tangent: None,
            interpolation: KeyInterpolation::Linear,
        }
    }

    #[must_use]
    pub fn with_tangents(mut self, in_tangent: T, out_tangent: T) -> Self {
        self.in_tangent = Some(in_tangent);
        self.out_tangent = Some(out_tangent);
        self
    }

    #[must_use]
    pub fn step(mut self) -> Self {
        self.interpolation = KeyInterpolation::Step;
        self
    }
}

/// Mutable lookup state threaded through [`KeyframeTrack::interpolate`].
///
/// `key` caches the last bracketing index so sequential playback scans at
/// most one or two keys per call.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationState {
    pub key: usize,
    pub repeat_count: i32,
    pub loop_mode: CurveLoopMode,
    pub offset_value: Option<AnimationValue>,
    pub high_limit_value: Option<AnimationValue>,
}

impl InterpolationState {
    #[must_use]
    pub fn new(loop_mode: CurveLoopMode) -> Self {
        Self {
            key: 0,
            repeat_count: 0,
            loop_mode,
            offset_value: None,
            high_limit_value: None,
        }
    }
}

impl Default for InterpolationState {
    fn default() -> Self {
        Self::new(CurveLoopMode::Cycle)
    }
}

/// Ordered keys of one value type. Ordering by frame is assumed, not checked,
/// except by [`insert_key`](Self::insert_key).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<T: Interpolatable> {
    keys: Vec<Keyframe<T>>,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(keys: Vec<Keyframe<T>>) -> Self {
        Self { keys }
    }

    /// Builds a linear track from parallel frame/value lists.
    #[must_use]
    pub fn linear(frames: &[f32], values: &[T]) -> Self {
        Self::new(
            frames
                .iter()
                .zip(values)
                .map(|(&frame, &value)| Keyframe::new(frame, value))
                .collect(),
        )
    }

    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    pub(crate) fn keys_mut(&mut self) -> &mut Vec<Keyframe<T>> {
        &mut self.keys
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Inserts a key after every key with a frame `<=` its own.
    pub fn insert_key(&mut self, key: Keyframe<T>) {
        let index = self.keys.partition_point(|k| k.frame <= key.frame);
        self.keys.insert(index, key);
    }

    /// Stateless sampling with cycle semantics.
    #[must_use]
    pub fn sample(&self, frame: f32, options: &InterpolationOptions) -> T {
        let mut state = InterpolationState::default();
        self.interpolate(frame, &mut state, None, options)
    }

    /// Value of the track at `frame`.
    ///
    /// The track must not be empty; [`Curve`](crate::animation::Curve)
    /// rejects empty tracks at construction.
    pub fn interpolate(
        &self,
        frame: f32,
        state: &mut InterpolationState,
        easing: Option<&EasingFunction>,
        options: &InterpolationOptions,
    ) -> T {
        if state.loop_mode == CurveLoopMode::Constant
            && state.repeat_count > 0
            && let Some(high_limit) = state.high_limit_value.as_ref().and_then(T::from_value)
        {
            return high_limit;
        }

        let keys = &self.keys;
        let len = keys.len();
        if len == 1 {
            return keys[0].value;
        }

        // Rewind first to support backward playback, then scan forward.
        let mut key = state.key.min(len - 1);
        while key > 0 && frame < keys[key].frame {
            key -= 1;
        }
        while key + 1 < len && frame >= keys[key + 1].frame {
            key += 1;
        }
        state.key = key;

        if frame < keys[0].frame {
            return keys[0].value;
        }
        if key + 1 >= len {
            return keys[len - 1].value;
        }

        let start = &keys[key];
        let end = &keys[key + 1];

        if start.interpolation == KeyInterpolation::Step {
            return if end.frame > frame { start.value } else { end.value };
        }

        let frame_delta = end.frame - start.frame;
        let mut gradient = if frame_delta > 1e-6 {
            (frame - start.frame) / frame_delta
        } else {
            0.0
        };
        if let Some(easing) = easing {
            gradient = easing.ease(gradient);
        }

        let tangents = match (start.out_tangent, end.in_tangent) {
            (Some(out_tangent), Some(in_tangent)) if T::DATA_TYPE != CurveDataType::Matrix => {
                Some((out_tangent, in_tangent))
            }
            _ => None,
        };

        let value = match tangents {
            Some((out_tangent, in_tangent)) => T::interpolate_cubic(
                start.value,
                out_tangent,
                in_tangent,
                end.value,
                gradient,
                frame_delta,
            ),
            None => T::interpolate_with(start.value, end.value, gradient, options),
        };

        match state.loop_mode {
            CurveLoopMode::Relative => match state.offset_value.as_ref().and_then(T::from_value) {
                Some(offset) => value.add_offset(offset, state.repeat_count as f32),
                None => value,
            },
            CurveLoopMode::Cycle | CurveLoopMode::Constant => value,
        }
    }
}
