use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::animation::binding::{PropertyBinding, TargetHandle};
use crate::animation::controller::PlaybackNotification;
use crate::animation::curve::{Curve, CurveEvent, CurveLoopMode};
use crate::animation::late_binding::LateBindingResolver;
use crate::animation::tracks::InterpolationState;
use crate::animation::values::AnimationValue;
use crate::scene::Scene;
use crate::settings::InterpolationOptions;

/// Process-unique player identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

impl PlayerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything a tick may touch besides the controllers themselves.
pub struct TickContext<'a> {
    pub scene: &'a mut Scene,
    pub resolver: &'a mut LateBindingResolver,
    pub options: InterpolationOptions,
    pub notifications: &'a mut Vec<PlaybackNotification>,
}

/// Position of a sync root at the moment a dependent player advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPosition {
    pub master_frame: f32,
    pub from: f32,
    pub to: f32,
}

impl SyncPosition {
    /// Root position normalized to `[0, 1]` over its range.
    #[must_use]
    pub fn normalized(&self) -> f32 {
        let range = self.to - self.from;
        if range == 0.0 {
            0.0
        } else {
            (self.master_frame - self.from) / range
        }
    }
}

/// Parameters of one [`CurvePlayer::animate`] step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Milliseconds since playback started.
    pub delay: f64,
    pub from: f32,
    pub to: f32,
    pub looping: bool,
    pub speed_ratio: f32,
    /// `None` writes directly, `Some` goes through late binding.
    pub weight: Option<f32>,
    pub sync: Option<SyncPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerStep {
    pub running: bool,
    /// The frame wrapped back this step.
    pub looped: bool,
}

#[derive(Debug, Clone)]
struct BoundTarget {
    binding: PropertyBinding,
    /// Target value captured when blending started.
    original_blend_value: Option<AnimationValue>,
}

type RangeKey = (u32, u32);

/// One curve playing against one or more targets.
#[derive(Debug)]
pub struct CurvePlayer {
    id: PlayerId,
    curve: Arc<Curve>,
    targets: SmallVec<[BoundTarget; 1]>,

    current_value: Option<AnimationValue>,
    current_frame: f32,
    weight: Option<f32>,

    enable_blending: bool,
    blending_speed: f32,
    blending_factor: f32,

    min_frame: f32,
    max_frame: f32,
    min_value: AnimationValue,
    max_value: AnimationValue,

    offsets_cache: FxHashMap<RangeKey, AnimationValue>,
    high_limits_cache: FxHashMap<RangeKey, AnimationValue>,

    state: InterpolationState,
    events: Vec<CurveEvent>,

    ratio_offset: f32,
    previous_delay: f64,
    previous_ratio: f32,
    stopped: bool,
}

impl CurvePlayer {
    #[must_use]
    pub fn new(curve: Arc<Curve>, bindings: Vec<PropertyBinding>) -> Self {
        Self {
            id: PlayerId::next(),
            targets: bindings
                .into_iter()
                .map(|binding| BoundTarget {
                    binding,
                    original_blend_value: None,
                })
                .collect(),
            current_value: None,
            current_frame: 0.0,
            weight: None,
            enable_blending: curve.enable_blending,
            blending_speed: curve.blending_speed,
            blending_factor: 0.0,
            min_frame: curve.min_frame(),
            max_frame: curve.max_frame(),
            min_value: curve.first_value(),
            max_value: curve.last_value(),
            offsets_cache: FxHashMap::default(),
            high_limits_cache: FxHashMap::default(),
            state: InterpolationState::new(curve.loop_mode()),
            events: curve.events().to_vec(),
            ratio_offset: 0.0,
            previous_delay: 0.0,
            previous_ratio: 0.0,
            stopped: false,
            curve,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn curve(&self) -> &Arc<Curve> {
        &self.curve
    }

    pub fn bindings(&self) -> impl Iterator<Item = &PropertyBinding> {
        self.targets.iter().map(|t| &t.binding)
    }

    #[must_use]
    pub fn targets_include(&self, target: TargetHandle) -> bool {
        self.targets.iter().any(|t| t.binding.target == target)
    }

    #[inline]
    #[must_use]
    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    /// Last value written or registered, after blending.
    #[inline]
    #[must_use]
    pub fn current_value(&self) -> Option<AnimationValue> {
        self.current_value
    }

    #[inline]
    #[must_use]
    pub fn weight(&self) -> Option<f32> {
        self.weight
    }

    #[inline]
    #[must_use]
    pub fn blending_factor(&self) -> f32 {
        self.blending_factor
    }

    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// This player's copy of the curve events.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[CurveEvent] {
        &self.events
    }

    /// Per-player blending override. The shared curve is left untouched.
    pub fn set_blending(&mut self, enable: bool, speed: Option<f32>) {
        self.enable_blending = enable;
        if let Some(speed) = speed {
            self.blending_speed = speed;
        }
    }

    /// Advances to the frame reached after `params.delay` milliseconds.
    pub fn animate(&mut self, params: &StepParams, ctx: &mut TickContext<'_>) -> PlayerStep {
        let StepParams {
            delay,
            mut from,
            mut to,
            looping,
            speed_ratio,
            weight,
            sync,
        } = *params;

        if from < self.min_frame || from > self.max_frame {
            from = self.min_frame;
        }
        if to < self.min_frame || to > self.max_frame {
            to = self.max_frame;
        }
        let range = to - from;

        let fps = self.curve.frames_per_second();
        let ratio = (delay * f64::from(fps * speed_ratio) / 1000.0) as f32 + self.ratio_offset;
        self.previous_delay = delay;
        self.previous_ratio = ratio;

        let mut running = true;
        let mut high_limit = None;
        let mut offset = None;
        if !looping && to >= from && ((ratio >= range && speed_ratio > 0.0) || (ratio <= 0.0 && speed_ratio < 0.0)) {
            running = false;
            high_limit = Some(self.max_value);
        } else if !looping
            && from >= to
            && ((ratio <= range && speed_ratio < 0.0) || (ratio >= 0.0 && speed_ratio > 0.0))
        {
            running = false;
            high_limit = Some(self.min_value);
        } else if self.state.loop_mode != CurveLoopMode::Cycle {
            let (limit, delta) = self.range_offsets(from, to, &ctx.options);
            high_limit = Some(limit);
            offset = Some(delta);
        }
        let offset = offset.unwrap_or_else(|| AnimationValue::zero(self.curve.data_type()));

        let current_frame = if let Some(sync) = sync {
            from + (to - from) * sync.normalized()
        } else if (ratio > 0.0 && from > to) || (ratio < 0.0 && from < to) {
            if running && range != 0.0 { to + ratio % range } else { from }
        } else if running && range != 0.0 {
            from + ratio % range
        } else {
            to
        };

        let looped = (speed_ratio > 0.0 && self.current_frame > current_frame)
            || (speed_ratio < 0.0 && self.current_frame < current_frame);
        if looped {
            for event in &mut self.events {
                if !event.only_once {
                    event.is_done = false;
                }
            }
            self.state.key = if speed_ratio > 0.0 {
                0
            } else {
                self.curve.data().len().saturating_sub(1)
            };
        }

        self.current_frame = current_frame;
        self.state.repeat_count = if range == 0.0 { 0 } else { (ratio / range) as i32 };
        self.state.high_limit_value = high_limit;
        self.state.offset_value = Some(offset);

        let value = self
            .curve
            .interpolate(current_frame, &mut self.state, &ctx.options);
        self.set_value(value, weight, ctx);

        self.fire_events(current_frame, from, range);

        if !running {
            self.stopped = true;
        }
        PlayerStep { running, looped }
    }

    /// Terminal value and per-cycle offset for a `(from, to)` window,
    /// evaluated once with cycle semantics.
    fn range_offsets(
        &mut self,
        from: f32,
        to: f32,
        options: &InterpolationOptions,
    ) -> (AnimationValue, AnimationValue) {
        let key = (to.to_bits(), from.to_bits());
        if let (Some(limit), Some(offset)) =
            (self.high_limits_cache.get(&key), self.offsets_cache.get(&key))
        {
            return (*limit, *offset);
        }

        let loop_mode = self.state.loop_mode;
        self.state.repeat_count = 0;
        self.state.loop_mode = CurveLoopMode::Cycle;
        let from_value = self.curve.interpolate(from, &mut self.state, options);
        let to_value = self.curve.interpolate(to, &mut self.state, options);
        self.state.loop_mode = loop_mode;

        let mut offset = to_value;
        offset.add_scaled(&from_value, -1.0);
        self.offsets_cache.insert(key, offset);
        self.high_limits_cache.insert(key, to_value);
        (to_value, offset)
    }

    fn fire_events(&mut self, current_frame: f32, from: f32, range: f32) {
        let mut index = 0;
        while index < self.events.len() {
            let event = &self.events[index];
            let crossed = (range >= 0.0 && current_frame >= event.frame && event.frame >= from)
                || (range < 0.0 && current_frame <= event.frame && event.frame <= from);
            if !crossed || event.is_done {
                index += 1;
                continue;
            }

            let action = Arc::clone(&event.action);
            if event.only_once {
                self.events.remove(index);
            } else {
                self.events[index].is_done = true;
                index += 1;
            }
            action(current_frame);
        }
    }

    /// Applies `value` to every target, blending from the pre-animation pose
    /// while the blend factor has not reached 1.
    fn set_value(&mut self, value: AnimationValue, weight: Option<f32>, ctx: &mut TickContext<'_>) {
        self.weight = weight;
        let blending = self.enable_blending && self.blending_factor <= 1.0;
        let factor = self.blending_factor;

        let mut applied = value;
        for target in &mut self.targets {
            let binding = &target.binding;
            applied = if blending {
                let original = *target.original_blend_value.get_or_insert_with(|| {
                    ctx.scene
                        .property(binding.target, &binding.property)
                        .unwrap_or(value)
                });
                original.lerp(&value, factor, &ctx.options)
            } else {
                value
            };

            match weight {
                Some(weight) => ctx.resolver.register(
                    binding.target,
                    binding.property,
                    binding.original_value,
                    applied,
                    weight,
                ),
                None => {
                    ctx.scene
                        .set_property(binding.target, &binding.property, applied);
                }
            }
        }

        if blending {
            self.blending_factor += self.blending_speed;
        }
        self.current_value = Some(applied);
    }

    /// Seeks to `frame` (clamped to the key span) and applies the value.
    /// Events after `frame` become pending again.
    pub fn go_to_frame(&mut self, frame: f32, weight: Option<f32>, ctx: &mut TickContext<'_>) {
        let frame = frame.clamp(self.min_frame, self.max_frame);
        for event in &mut self.events {
            if !event.only_once {
                event.is_done = event.frame < frame;
            }
        }
        self.current_frame = frame;
        let value = self.curve.interpolate(frame, &mut self.state, &ctx.options);
        self.set_value(value, weight, ctx);
    }

    /// Rebases the ratio so the next step at the same delay lands on the same
    /// frame under `speed_ratio`.
    pub fn prepare_for_speed_ratio_change(&mut self, speed_ratio: f32) {
        let fps = self.curve.frames_per_second();
        let ratio = (self.previous_delay * f64::from(fps * speed_ratio) / 1000.0) as f32;
        self.ratio_offset = self.previous_ratio - ratio;
    }

    /// Clears caches, frame and blending; optionally writes the original value
    /// back to every target.
    pub fn reset(&mut self, restore_original: bool, scene: &mut Scene) {
        if restore_original {
            for target in &self.targets {
                let binding = &target.binding;
                scene.set_property(binding.target, &binding.property, binding.original_value);
            }
        }
        self.offsets_cache.clear();
        self.high_limits_cache.clear();
        self.current_frame = 0.0;
        self.blending_factor = 0.0;
        self.state.key = 0;
        self.state.repeat_count = 0;
        self.stopped = false;
        for target in &mut self.targets {
            target.original_blend_value = None;
        }
        for event in &mut self.events {
            event.is_done = false;
        }
    }
}
