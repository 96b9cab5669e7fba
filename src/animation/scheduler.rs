//! Frame Scheduler
//!
//! Owns every active [`PlaybackController`] and advances them once per frame:
//!
//! 1. Compute the frame delta (constant or real, times `time_scale`)
//! 2. Advance controllers in registration order; a controller with a sync
//!    root reads the root's position at the moment it advances
//! 3. Dispose controllers that ended with `dispose_on_end`
//! 4. Resolve late-bound weighted writes
//!
//! Skinning buffers are not touched here. Call
//! [`Scene::prepare_skeletons`] once the tick is done.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut scheduler = FrameScheduler::new(AnimationSettings::default());
//! let walk = scheduler.begin_animation(&mut scene, target, PlaybackOptions::range(0.0, 30.0).looping(true), None);
//!
//! // every frame
//! scheduler.tick(clock.tick(), &mut scene);
//! scene.prepare_skeletons();
//! for event in scheduler.drain_notifications() { /* ... */ }
//! ```

use std::sync::Arc;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::animation::binder::Binder;
use crate::animation::binding::TargetHandle;
use crate::animation::controller::{ControllerKey, PlaybackController, PlaybackNotification};
use crate::animation::curve::{Curve, CurveId};
use crate::animation::group::{GroupKey, PlaybackGroup};
use crate::animation::late_binding::LateBindingResolver;
use crate::animation::player::{CurvePlayer, PlayerId, TickContext};
use crate::errors::{AnimationError, Result};
use crate::scene::Scene;
use crate::settings::AnimationSettings;
use crate::utils::FrameClock;

/// Target-filter predicate used by begin and stop calls.
pub type TargetMask<'a> = &'a dyn Fn(TargetHandle) -> bool;

/// Frame window and rate of a playback request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub from: f32,
    pub to: f32,
    pub looping: bool,
    /// Negative plays backwards.
    pub speed_ratio: f32,
    /// Stop the target's running controllers first.
    pub stop_current: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            from: 0.0,
            to: 100.0,
            looping: false,
            speed_ratio: 1.0,
            stop_current: true,
        }
    }
}

impl PlaybackOptions {
    #[must_use]
    pub fn range(from: f32, to: f32) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    #[must_use]
    pub fn speed(mut self, speed_ratio: f32) -> Self {
        self.speed_ratio = speed_ratio;
        self
    }

    #[must_use]
    pub fn stop_current(mut self, stop_current: bool) -> Self {
        self.stop_current = stop_current;
        self
    }

    /// A negative speed plays `to -> from`; `from > to` always plays backwards.
    pub(crate) fn directed(&self) -> (f32, f32, f32) {
        let (mut from, mut to, mut speed) = (self.from, self.to, self.speed_ratio);
        if speed < 0.0 {
            std::mem::swap(&mut from, &mut to);
            speed = -speed;
        }
        if from > to {
            speed = -speed;
        }
        (from, to, speed)
    }
}

type PlayerRefs = SmallVec<[(ControllerKey, PlayerId); 2]>;

/// Advances playback controllers and groups against a [`Scene`].
pub struct FrameScheduler {
    settings: AnimationSettings,

    pub(crate) controllers: SlotMap<ControllerKey, PlaybackController>,
    /// Advance order.
    pub(crate) active: Vec<ControllerKey>,
    pub(crate) groups: SlotMap<GroupKey, PlaybackGroup>,

    pub(crate) resolver: LateBindingResolver,
    curve_players: FxHashMap<CurveId, PlayerRefs>,

    animation_time: f64,
    last_time: Option<f64>,
    pub(crate) notifications: Vec<PlaybackNotification>,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(AnimationSettings::default())
    }
}

impl FrameScheduler {
    #[must_use]
    pub fn new(settings: AnimationSettings) -> Self {
        Self {
            settings,
            controllers: SlotMap::with_key(),
            active: Vec::new(),
            groups: SlotMap::with_key(),
            resolver: LateBindingResolver::new(),
            curve_players: FxHashMap::default(),
            animation_time: 0.0,
            last_time: None,
            notifications: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut AnimationSettings {
        &mut self.settings
    }

    /// Accumulated scheduler time in milliseconds.
    #[inline]
    #[must_use]
    pub fn animation_time(&self) -> f64 {
        self.animation_time
    }

    // ========================================================================
    // Starting playback
    // ========================================================================

    /// Plays the curves attached to `target` and, recursively, to its
    /// sub-targets (a node's skeleton, a skeleton's bones) in one controller.
    ///
    /// `mask` filters which of the visited targets contribute players.
    pub fn begin_animation(
        &mut self,
        scene: &mut Scene,
        target: TargetHandle,
        options: PlaybackOptions,
        mask: Option<TargetMask<'_>>,
    ) -> ControllerKey {
        let (from, to, speed_ratio) = options.directed();

        let mut players = Vec::new();
        let mut stack = vec![target];
        while let Some(current) = stack.pop() {
            if options.stop_current {
                self.stop_animation(current, None, mask);
            }
            if mask.is_none_or(|mask| mask(current)) {
                players.extend(Self::build_players(scene, current, &scene.attached_curves(current)));
            }
            stack.extend(scene.sub_targets(current).into_iter().rev());
        }

        let key = self.insert_controller(target, from, to, options.looping, speed_ratio, players);
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.reset(scene);
        }
        key
    }

    /// Plays explicit curves on `target`.
    pub fn begin_direct_animation(
        &mut self,
        scene: &Scene,
        target: TargetHandle,
        curves: &[Arc<Curve>],
        options: PlaybackOptions,
    ) -> Result<ControllerKey> {
        if !scene.contains(target) {
            return Err(AnimationError::TargetNotFound(format!("{target:?}")));
        }
        let (from, to, speed_ratio) = options.directed();
        let players = Self::build_players(scene, target, curves);
        Ok(self.insert_controller(target, from, to, options.looping, speed_ratio, players))
    }

    /// Like [`begin_animation`](Self::begin_animation) but never stops the
    /// target's other controllers, and plays through late binding with
    /// `weight`.
    pub fn begin_weighted_animation(
        &mut self,
        scene: &mut Scene,
        target: TargetHandle,
        options: PlaybackOptions,
        weight: f32,
        mask: Option<TargetMask<'_>>,
    ) -> ControllerKey {
        let key = self.begin_animation(scene, target, options.stop_current(false), mask);
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.set_weight(Some(weight));
        }
        key
    }

    /// Plays the named range of `target`. Skeletons look the range up on
    /// themselves, other targets on their attached curves.
    pub fn begin_animation_range(
        &mut self,
        scene: &mut Scene,
        target: TargetHandle,
        name: &str,
        looping: bool,
        speed_ratio: f32,
    ) -> Option<ControllerKey> {
        let range = match target {
            TargetHandle::Skeleton(key) => scene
                .skeleton(key)
                .and_then(|s| s.animation_range(name))
                .cloned(),
            _ => scene
                .attached_curves(target)
                .iter()
                .find_map(|c| c.range(name).cloned()),
        };
        let Some(range) = range else {
            warn!("Animation range '{name}' not found on {}", scene.describe(target));
            return None;
        };
        let options = PlaybackOptions::range(range.from, range.to)
            .looping(looping)
            .speed(speed_ratio);
        Some(self.begin_animation(scene, target, options, None))
    }

    fn build_players(scene: &Scene, target: TargetHandle, curves: &[Arc<Curve>]) -> Vec<CurvePlayer> {
        curves
            .iter()
            .filter_map(|curve| {
                let bindings = Binder::bind_all(scene, &[target], curve);
                (!bindings.is_empty()).then(|| CurvePlayer::new(Arc::clone(curve), bindings))
            })
            .collect()
    }

    pub(crate) fn insert_controller(
        &mut self,
        target: TargetHandle,
        from: f32,
        to: f32,
        looping: bool,
        speed_ratio: f32,
        players: Vec<CurvePlayer>,
    ) -> ControllerKey {
        let count = players.len();
        let key = self.controllers.insert_with_key(|key| {
            PlaybackController::new(key, target, from, to, looping, speed_ratio, Vec::new())
        });
        self.attach_players(key, players);
        self.active.push(key);
        debug!("Controller {key:?} registered on {target:?} with {count} player(s), frames {from}..{to}");
        key
    }

    fn attach_players(&mut self, key: ControllerKey, players: Vec<CurvePlayer>) {
        for player in &players {
            self.curve_players
                .entry(player.curve().id())
                .or_default()
                .push((key, player.id()));
        }
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.append_players(players);
        }
    }

    // ========================================================================
    // Stopping
    // ========================================================================

    /// Stops controllers whose main target is `target`. With a name or mask
    /// only matching players are removed; a controller left empty is removed.
    pub fn stop_animation(
        &mut self,
        target: TargetHandle,
        name: Option<&str>,
        mask: Option<TargetMask<'_>>,
    ) {
        for key in self.controllers_for(target) {
            self.stop_controller(key, name, mask);
        }
    }

    /// Stops one controller. No-op if it is already gone.
    pub fn stop(&mut self, key: ControllerKey) {
        self.stop_controller(key, None, None);
    }

    pub(crate) fn stop_controller(
        &mut self,
        key: ControllerKey,
        name: Option<&str>,
        mask: Option<TargetMask<'_>>,
    ) {
        let Some(controller) = self.controllers.get_mut(key) else {
            return;
        };
        if name.is_none() && mask.is_none() {
            self.dispose_controller(key, true);
            return;
        }

        let removed = controller.remove_players(name, mask);
        let now_empty = controller.players().is_empty();
        self.forget_players(&removed);
        if now_empty {
            self.dispose_controller(key, true);
        }
    }

    /// Removes a controller and its players. When `raise_end` is set the end
    /// callback and notifications fire.
    pub(crate) fn dispose_controller(&mut self, key: ControllerKey, raise_end: bool) {
        let Some(mut controller) = self.controllers.remove(key) else {
            return;
        };
        self.active.retain(|&k| k != key);
        let removed = controller.take_players();
        self.forget_players(&removed);
        for other in self.controllers.values_mut() {
            other.clear_sync_root(key);
        }

        if raise_end && !controller.has_ended() {
            controller.raise_end(&mut self.notifications);
            if let Some((group, _)) = controller.group {
                self.route_group_end(group, key);
            }
        }
        debug!("Controller {key:?} disposed");
    }

    fn forget_players(&mut self, removed: &[(PlayerId, CurveId)]) {
        for (player, curve) in removed {
            if let Some(refs) = self.curve_players.get_mut(curve) {
                refs.retain(|(_, p)| p != player);
                if refs.is_empty() {
                    self.curve_players.remove(curve);
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn controller(&self, key: ControllerKey) -> Option<&PlaybackController> {
        self.controllers.get(key)
    }

    /// Direct controller access for fields and callbacks. Seeks and speed
    /// changes go through the scheduler.
    pub fn controller_mut(&mut self, key: ControllerKey) -> Option<&mut PlaybackController> {
        self.controllers.get_mut(key)
    }

    /// Advance order.
    #[must_use]
    pub fn active_controllers(&self) -> &[ControllerKey] {
        &self.active
    }

    /// Controllers whose main target is `target`, in advance order.
    #[must_use]
    pub fn controllers_for(&self, target: TargetHandle) -> Vec<ControllerKey> {
        self.active
            .iter()
            .copied()
            .filter(|&key| self.controllers.get(key).is_some_and(|c| c.target() == target))
            .collect()
    }

    /// Every live player of `curve`.
    #[must_use]
    pub fn runtime_players(&self, curve: &Curve) -> Vec<&CurvePlayer> {
        self.curve_players
            .get(&curve.id())
            .into_iter()
            .flatten()
            .filter_map(|&(key, id)| {
                self.controllers
                    .get(key)?
                    .players()
                    .iter()
                    .find(|p| p.id() == id)
            })
            .collect()
    }

    /// `true` once every player reached its end, or the controller is gone.
    #[must_use]
    pub fn is_stopped(&self, key: ControllerKey) -> bool {
        self.controllers.get(key).is_none_or(|c| {
            c.has_ended() || (!c.players().is_empty() && c.players().iter().all(CurvePlayer::is_stopped))
        })
    }

    // ========================================================================
    // Controller operations
    // ========================================================================

    pub fn pause(&mut self, key: ControllerKey) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.pause();
        }
    }

    /// Resumes a paused controller.
    pub fn restart(&mut self, key: ControllerKey) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.restart();
        }
    }

    pub fn reset(&mut self, key: ControllerKey, scene: &mut Scene) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.reset(scene);
        }
    }

    pub fn set_weight(&mut self, key: ControllerKey, weight: Option<f32>) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.set_weight(weight);
        }
    }

    pub fn set_looping(&mut self, key: ControllerKey, looping: bool) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.looping = looping;
        }
    }

    pub fn enable_blending(&mut self, key: ControllerKey, speed: f32) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.enable_blending(speed);
        }
    }

    pub fn disable_blending(&mut self, key: ControllerKey) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.disable_blending();
        }
    }

    /// Seeks immediately. Weighted seeks are resolved on the spot.
    pub fn go_to_frame(&mut self, key: ControllerKey, frame: f32, use_weight: bool, scene: &mut Scene) {
        let Some(controller) = self.controllers.get_mut(key) else {
            return;
        };
        let mut ctx = TickContext {
            scene: &mut *scene,
            resolver: &mut self.resolver,
            options: self.settings.interpolation,
            notifications: &mut self.notifications,
        };
        controller.go_to_frame(frame, use_weight, &mut ctx);
        self.resolver.resolve(scene, &self.settings.interpolation);
    }

    pub fn set_speed_ratio(&mut self, key: ControllerKey, speed_ratio: f32, scene: &mut Scene) {
        let Some(controller) = self.controllers.get_mut(key) else {
            return;
        };
        let mut ctx = TickContext {
            scene: &mut *scene,
            resolver: &mut self.resolver,
            options: self.settings.interpolation,
            notifications: &mut self.notifications,
        };
        controller.set_speed_ratio(speed_ratio, &mut ctx);
    }

    /// Makes `key` mirror `root`'s normalized position and moves it to the end
    /// of the advance order so the root always advances first.
    pub fn sync_with(&mut self, key: ControllerKey, root: Option<ControllerKey>) {
        let Some(controller) = self.controllers.get_mut(key) else {
            return;
        };
        controller.sync_root = root.filter(|&r| r != key);
        if controller.sync_root.is_some() {
            self.active.retain(|&k| k != key);
            self.active.push(key);
        }
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// Advances to `now_ms`. The first tick only records the time, unless a
    /// constant delta is configured.
    pub fn tick(&mut self, now_ms: f64, scene: &mut Scene) {
        if !self.settings.enabled {
            return;
        }
        let last = *self.last_time.get_or_insert(now_ms);
        let delta = if self.settings.use_constant_delta {
            self.settings.constant_delta_ms
        } else {
            now_ms - last
        };
        self.last_time = Some(now_ms);
        self.advance(delta * self.settings.time_scale, scene);
    }

    /// [`tick`](Self::tick) driven by a [`FrameClock`].
    pub fn tick_clock(&mut self, clock: &mut FrameClock, scene: &mut Scene) {
        let now = clock.tick();
        self.tick(now, scene);
    }

    /// Advances every controller by `delta_ms` of scaled time, then resolves
    /// weighted writes. Time does not accumulate while nothing is playing.
    pub fn advance(&mut self, delta_ms: f64, scene: &mut Scene) {
        if self.active.is_empty() {
            return;
        }
        self.animation_time += delta_ms;
        let time = self.animation_time;
        let options = self.settings.interpolation;

        let mut index = 0;
        while index < self.active.len() {
            let key = self.active[index];
            let sync = self
                .controllers
                .get(key)
                .and_then(PlaybackController::sync_root)
                .and_then(|root| self.controllers.get(root))
                .map(PlaybackController::sync_position);

            let Some(controller) = self.controllers.get_mut(key) else {
                self.active.remove(index);
                continue;
            };
            let mut ctx = TickContext {
                scene: &mut *scene,
                resolver: &mut self.resolver,
                options,
                notifications: &mut self.notifications,
            };
            let step = controller.animate(time, sync, &mut ctx);
            let group = controller.group;
            let dispose = step.ended && controller.dispose_on_end;

            if let Some((group_key, slot)) = group {
                if step.looped {
                    self.route_group_loop(group_key, slot);
                }
                if step.ended {
                    self.route_group_end(group_key, key);
                }
            }

            if dispose {
                debug!("Controller {key:?} ended");
                self.dispose_controller(key, false);
                continue;
            }
            index += 1;
        }

        self.resolver.resolve(scene, &options);
    }

    /// Takes the notifications raised since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<PlaybackNotification> {
        std::mem::take(&mut self.notifications)
    }
}
