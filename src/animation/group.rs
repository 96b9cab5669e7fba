//! Playback Groups
//!
//! A [`PlaybackGroup`] is a named set of `(curve, target)` pairs played as one
//! clip. Starting a group creates one controller per pair over the group's
//! common frame window; the group ends when the last of them ends and loops
//! once every pair has looped.

use std::sync::Arc;

use log::{debug, warn};
use slotmap::new_key_type;

use crate::animation::binding::TargetHandle;
use crate::animation::controller::{ControllerKey, PlaybackNotification};
use crate::animation::curve::{AnimationRange, Curve};
use crate::animation::scheduler::{FrameScheduler, PlaybackOptions};
use crate::scene::Scene;

new_key_type! {
    pub struct GroupKey;
}

#[derive(Debug, Clone)]
pub struct TargetedCurve {
    pub curve: Arc<Curve>,
    pub target: TargetHandle,
}

#[derive(Debug, Clone)]
pub struct PlaybackGroup {
    pub name: String,
    targeted: Vec<TargetedCurve>,
    controllers: Vec<ControllerKey>,

    from: f32,
    to: f32,

    is_started: bool,
    is_paused: bool,
    looping: bool,
    speed_ratio: f32,
    weight: Option<f32>,
    blending_speed: Option<f32>,

    loop_flags: Vec<bool>,
    loop_count: usize,
}

impl PlaybackGroup {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            targeted: Vec::new(),
            controllers: Vec::new(),
            from: f32::MAX,
            to: f32::MIN,
            is_started: false,
            is_paused: false,
            looping: false,
            speed_ratio: 1.0,
            weight: None,
            blending_speed: None,
            loop_flags: Vec::new(),
            loop_count: 0,
        }
    }

    /// Adds a pair and widens the group window to the curve's key span.
    pub fn add_targeted_curve(&mut self, curve: Arc<Curve>, target: TargetHandle) -> &TargetedCurve {
        self.from = self.from.min(curve.min_frame());
        self.to = self.to.max(curve.max_frame());
        self.targeted.push(TargetedCurve { curve, target });
        &self.targeted[self.targeted.len() - 1]
    }

    /// Pads every curve with copies of its end keys so all of them span
    /// `[begin, end]`, defaulting to the group window. Curves shared with
    /// other owners are copied first.
    pub fn normalize(&mut self, begin: Option<f32>, end: Option<f32>) -> &mut Self {
        let begin = begin.unwrap_or(self.from);
        let end = end.unwrap_or(self.to);
        for targeted in &mut self.targeted {
            Arc::make_mut(&mut targeted.curve).extend_to(begin, end);
        }
        self.from = begin;
        self.to = end;
        self
    }

    #[inline]
    #[must_use]
    pub fn targeted(&self) -> &[TargetedCurve] {
        &self.targeted
    }

    /// Controllers still running for this group.
    #[inline]
    #[must_use]
    pub fn controllers(&self) -> &[ControllerKey] {
        &self.controllers
    }

    #[inline]
    #[must_use]
    pub fn from_frame(&self) -> f32 {
        self.from
    }

    #[inline]
    #[must_use]
    pub fn to_frame(&self) -> f32 {
        self.to
    }

    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    #[inline]
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_started && !self.is_paused
    }

    #[inline]
    #[must_use]
    pub fn looping(&self) -> bool {
        self.looping
    }

    #[inline]
    #[must_use]
    pub fn speed_ratio(&self) -> f32 {
        self.speed_ratio
    }

    #[inline]
    #[must_use]
    pub fn weight(&self) -> Option<f32> {
        self.weight
    }

    /// Blend speed applied to controllers created by the next start.
    pub fn set_blending(&mut self, speed: Option<f32>) {
        self.blending_speed = speed;
    }

    /// First range named `name` among the targeted curves.
    #[must_use]
    pub fn range(&self, name: &str) -> Option<AnimationRange> {
        self.targeted
            .iter()
            .find_map(|t| t.curve.range(name).cloned())
    }

    /// Records a loop of pair `slot`. Returns `true` when every pair looped.
    fn record_loop(&mut self, slot: usize) -> bool {
        if self.loop_flags.len() < self.targeted.len() {
            self.loop_flags.resize(self.targeted.len(), false);
        }
        match self.loop_flags.get_mut(slot) {
            Some(flag) if !*flag => *flag = true,
            _ => return false,
        }
        self.loop_count += 1;
        if self.loop_count == self.targeted.len() {
            self.loop_count = 0;
            self.loop_flags.clear();
            return true;
        }
        false
    }

    /// Drops an ended controller. Returns `true` when it was the last one.
    fn record_end(&mut self, controller: ControllerKey) -> bool {
        let before = self.controllers.len();
        self.controllers.retain(|&k| k != controller);
        if before != self.controllers.len() && self.controllers.is_empty() {
            self.is_started = false;
            return true;
        }
        false
    }
}

impl FrameScheduler {
    pub fn add_group(&mut self, group: PlaybackGroup) -> GroupKey {
        self.groups.insert(group)
    }

    #[must_use]
    pub fn group(&self, key: GroupKey) -> Option<&PlaybackGroup> {
        self.groups.get(key)
    }

    /// Edit a group; changes to the pairs apply from the next start.
    pub fn group_mut(&mut self, key: GroupKey) -> Option<&mut PlaybackGroup> {
        self.groups.get_mut(key)
    }

    /// Stops and removes a group.
    pub fn remove_group(&mut self, key: GroupKey) -> Option<PlaybackGroup> {
        self.stop_group(key);
        self.groups.remove(key)
    }

    /// Starts one controller per pair over `[from, to]`, defaulting to the
    /// group window. No-op if already started or empty.
    pub fn start_group(
        &mut self,
        key: GroupKey,
        scene: &Scene,
        looping: bool,
        speed_ratio: f32,
        from: Option<f32>,
        to: Option<f32>,
    ) -> bool {
        let Some(group) = self.groups.get_mut(key) else {
            return false;
        };
        if group.is_started || group.targeted.is_empty() {
            return false;
        }
        group.looping = looping;
        group.loop_count = 0;
        group.loop_flags.clear();

        let options = PlaybackOptions::range(from.unwrap_or(group.from), to.unwrap_or(group.to))
            .looping(looping)
            .speed(speed_ratio);
        let weight = group.weight;
        let blending = group.blending_speed;
        let targeted = group.targeted.clone();
        let name = group.name.clone();

        let mut controllers = Vec::with_capacity(targeted.len());
        for (slot, pair) in targeted.iter().enumerate() {
            let controller_key = match self.begin_direct_animation(
                scene,
                pair.target,
                std::slice::from_ref(&pair.curve),
                options,
            ) {
                Ok(k) => k,
                Err(err) => {
                    warn!("Group '{name}' skipped curve '{}': {err}", pair.curve.name());
                    continue;
                }
            };
            if let Some(controller) = self.controllers.get_mut(controller_key) {
                controller.set_weight(weight);
                controller.group = Some((key, slot));
                if let Some(speed) = blending {
                    controller.enable_blending(speed);
                }
            }
            controllers.push(controller_key);
        }

        let Some(group) = self.groups.get_mut(key) else {
            return false;
        };
        group.controllers = controllers;
        group.speed_ratio = speed_ratio;
        group.is_started = true;
        group.is_paused = false;
        debug!("Group '{}' started with {} controller(s)", group.name, group.controllers.len());
        true
    }

    /// Starts the group over the named range. `false` when no pair defines it.
    pub fn start_group_range(
        &mut self,
        key: GroupKey,
        scene: &Scene,
        name: &str,
        looping: bool,
        speed_ratio: f32,
    ) -> bool {
        let Some(range) = self.groups.get(key).and_then(|g| g.range(name)) else {
            warn!("Group range '{name}' not found");
            return false;
        };
        self.start_group(key, scene, looping, speed_ratio, Some(range.from), Some(range.to))
    }

    fn group_controllers(&self, key: GroupKey) -> Vec<ControllerKey> {
        self.groups
            .get(key)
            .map(|g| g.controllers.clone())
            .unwrap_or_default()
    }

    pub fn pause_group(&mut self, key: GroupKey) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        if !group.is_started {
            return;
        }
        group.is_paused = true;
        for controller in self.group_controllers(key) {
            self.pause(controller);
        }
    }

    /// Resumes a started group, or (re)starts it from the beginning.
    pub fn play_group(&mut self, key: GroupKey, scene: &Scene, looping: Option<bool>) {
        let Some(group) = self.groups.get(key) else {
            return;
        };
        if group.is_started && group.controllers.len() == group.targeted.len() {
            if let Some(looping) = looping {
                self.set_group_looping(key, looping);
            }
            self.restart_group(key);
        } else {
            let looping = looping.unwrap_or(group.looping);
            let speed_ratio = group.speed_ratio;
            self.stop_group(key);
            self.start_group(key, scene, looping, speed_ratio, None, None);
        }
        if let Some(group) = self.groups.get_mut(key) {
            group.is_paused = false;
        }
    }

    /// Resumes every paused controller of a started group.
    pub fn restart_group(&mut self, key: GroupKey) {
        if !self.groups.get(key).is_some_and(PlaybackGroup::is_started) {
            return;
        }
        for controller in self.group_controllers(key) {
            self.restart(controller);
        }
        if let Some(group) = self.groups.get_mut(key) {
            group.is_paused = false;
        }
    }

    /// Restores original values. A stopped group is played, sent to frame 0
    /// and stopped again.
    pub fn reset_group(&mut self, key: GroupKey, scene: &mut Scene) {
        let Some(group) = self.groups.get(key) else {
            return;
        };
        if !group.is_started {
            self.play_group(key, scene, None);
            self.go_to_frame_group(key, 0.0, scene);
            self.stop_group(key);
            return;
        }
        for controller in self.group_controllers(key) {
            self.reset(controller, scene);
        }
    }

    pub fn stop_group(&mut self, key: GroupKey) {
        if !self.groups.get(key).is_some_and(PlaybackGroup::is_started) {
            return;
        }
        for controller in self.group_controllers(key) {
            self.stop(controller);
        }
        if let Some(group) = self.groups.get_mut(key) {
            group.controllers.clear();
            group.is_started = false;
            group.is_paused = false;
        }
    }

    pub fn go_to_frame_group(&mut self, key: GroupKey, frame: f32, scene: &mut Scene) {
        if !self.groups.get(key).is_some_and(PlaybackGroup::is_started) {
            return;
        }
        for controller in self.group_controllers(key) {
            self.go_to_frame(controller, frame, false, scene);
        }
    }

    pub fn set_group_speed_ratio(&mut self, key: GroupKey, speed_ratio: f32, scene: &mut Scene) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        if group.speed_ratio == speed_ratio {
            return;
        }
        group.speed_ratio = speed_ratio;
        for controller in self.group_controllers(key) {
            self.set_speed_ratio(controller, speed_ratio, scene);
        }
    }

    pub fn set_group_weight(&mut self, key: GroupKey, weight: Option<f32>) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        group.weight = weight;
        for controller in self.group_controllers(key) {
            self.set_weight(controller, weight);
        }
    }

    pub fn set_group_looping(&mut self, key: GroupKey, looping: bool) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        group.looping = looping;
        for controller in self.group_controllers(key) {
            self.set_looping(controller, looping);
        }
    }

    /// Syncs every running controller of the group with `root`.
    pub fn sync_group_with(&mut self, key: GroupKey, root: Option<ControllerKey>) {
        for controller in self.group_controllers(key) {
            self.sync_with(controller, root);
        }
    }

    pub(crate) fn route_group_loop(&mut self, key: GroupKey, slot: usize) {
        if self.groups.get_mut(key).is_some_and(|g| g.record_loop(slot)) {
            self.notifications.push(PlaybackNotification::GroupLooped(key));
        }
    }

    pub(crate) fn route_group_end(&mut self, key: GroupKey, controller: ControllerKey) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        if group.record_end(controller) {
            debug!("Group '{}' ended", group.name);
            self.notifications.push(PlaybackNotification::GroupEnded(key));
        }
    }
}
