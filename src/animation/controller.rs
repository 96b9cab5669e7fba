use std::fmt;

use slotmap::new_key_type;

use crate::animation::binding::TargetHandle;
use crate::animation::curve::CurveId;
use crate::animation::group::GroupKey;
use crate::animation::player::{CurvePlayer, PlayerId, StepParams, SyncPosition, TickContext};
use crate::scene::Scene;

new_key_type! {
    pub struct ControllerKey;
}

/// Events raised during a tick, drained with
/// [`FrameScheduler::drain_notifications`](crate::animation::FrameScheduler::drain_notifications).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackNotification {
    ControllerEnded(ControllerKey),
    ControllerLooped(ControllerKey),
    GroupEnded(GroupKey),
    GroupLooped(GroupKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerStep {
    pub running: bool,
    pub looped: bool,
    /// End was raised on this step.
    pub ended: bool,
}

type Callback = Box<dyn FnMut()>;

/// Drives a set of players over one `[from, to]` window.
pub struct PlaybackController {
    key: ControllerKey,
    target: TargetHandle,
    players: Vec<CurvePlayer>,

    pub from_frame: f32,
    pub to_frame: f32,
    pub looping: bool,
    speed_ratio: f32,
    weight: Option<f32>,
    previous_weight: Option<f32>,

    pub(crate) sync_root: Option<ControllerKey>,
    /// Remove from the scheduler when playback ends.
    pub dispose_on_end: bool,

    paused: bool,
    local_delay_offset: Option<f64>,
    paused_delay: Option<f64>,
    manual_jump_delay: Option<f64>,
    frame_to_sync_from_jump: Option<f32>,
    go_to_frame: Option<f32>,

    animation_started: bool,
    ended: bool,

    pub(crate) group: Option<(GroupKey, usize)>,

    /// Called when playback ends or the controller is stopped.
    pub on_end: Option<Callback>,
    /// Called on every step in which a player wrapped.
    pub on_loop: Option<Callback>,
}

impl PlaybackController {
    #[must_use]
    pub fn new(
        key: ControllerKey,
        target: TargetHandle,
        from_frame: f32,
        to_frame: f32,
        looping: bool,
        speed_ratio: f32,
        players: Vec<CurvePlayer>,
    ) -> Self {
        Self {
            key,
            target,
            players,
            from_frame,
            to_frame,
            looping,
            speed_ratio,
            weight: None,
            previous_weight: None,
            sync_root: None,
            dispose_on_end: true,
            paused: false,
            local_delay_offset: None,
            paused_delay: None,
            manual_jump_delay: None,
            frame_to_sync_from_jump: None,
            go_to_frame: None,
            animation_started: false,
            ended: false,
            group: None,
            on_end: None,
            on_loop: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn key(&self) -> ControllerKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> TargetHandle {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn players(&self) -> &[CurvePlayer] {
        &self.players
    }

    pub(crate) fn append_players(&mut self, players: Vec<CurvePlayer>) {
        self.players.extend(players);
    }

    /// Frame of the first player, or 0.
    #[must_use]
    pub fn master_frame(&self) -> f32 {
        self.players.first().map_or(0.0, CurvePlayer::current_frame)
    }

    #[must_use]
    pub fn sync_position(&self) -> SyncPosition {
        SyncPosition {
            master_frame: self.master_frame(),
            from: self.from_frame,
            to: self.to_frame,
        }
    }

    #[inline]
    #[must_use]
    pub fn sync_root(&self) -> Option<ControllerKey> {
        self.sync_root
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

    /// `None` plays unweighted; weights are clamped to `[0, 1]`.
    pub fn set_weight(&mut self, weight: Option<f32>) {
        self.weight = weight.map(|w| w.clamp(0.0, 1.0));
    }

    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether any player advanced on the last tick.
    #[inline]
    #[must_use]
    pub fn animation_started(&self) -> bool {
        self.animation_started
    }

    /// Playback reached its end (only observable with `dispose_on_end` off).
    #[inline]
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    #[inline]
    #[must_use]
    pub fn group(&self) -> Option<GroupKey> {
        self.group.map(|(key, _)| key)
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes after [`pause`](Self::pause) without skipping paused time.
    pub fn restart(&mut self) {
        self.paused = false;
    }

    /// Restores original values and restarts the local timeline.
    pub fn reset(&mut self, scene: &mut Scene) {
        for player in &mut self.players {
            player.reset(true, scene);
        }
        self.local_delay_offset = None;
        self.paused_delay = None;
        self.ended = false;
    }

    /// Blends every player in from the current pose at `speed` per tick.
    pub fn enable_blending(&mut self, speed: f32) {
        for player in &mut self.players {
            player.set_blending(true, Some(speed));
        }
    }

    pub fn disable_blending(&mut self) {
        for player in &mut self.players {
            player.set_blending(false, None);
        }
    }

    /// Changes speed without moving the current frame.
    pub fn set_speed_ratio(&mut self, speed_ratio: f32, ctx: &mut TickContext<'_>) {
        for player in &mut self.players {
            player.prepare_for_speed_ratio_change(speed_ratio);
        }
        self.speed_ratio = speed_ratio;
        if let Some(frame) = self.go_to_frame {
            self.go_to_frame(frame, false, ctx);
        }
    }

    /// Seeks every player to `frame` now and shifts the local timeline so the
    /// next tick continues from there.
    pub fn go_to_frame(&mut self, frame: f32, use_weight: bool, ctx: &mut TickContext<'_>) {
        if let Some(first) = self.players.first() {
            let fps = first.curve().frames_per_second();
            let sync_frame = *self
                .frame_to_sync_from_jump
                .get_or_insert(first.current_frame());
            let delay = if self.speed_ratio == 0.0 {
                0.0
            } else {
                f64::from((frame - sync_frame) / fps * 1000.0 / self.speed_ratio)
            };
            self.manual_jump_delay = Some(-delay);
        }

        let weight = if use_weight { self.weight } else { None };
        for player in &mut self.players {
            player.go_to_frame(frame, weight, ctx);
        }
        self.go_to_frame = Some(frame);
    }

    /// Advances all players to `delay` milliseconds of scheduler time.
    pub fn animate(
        &mut self,
        delay: f64,
        sync: Option<SyncPosition>,
        ctx: &mut TickContext<'_>,
    ) -> ControllerStep {
        if self.paused {
            self.animation_started = false;
            if self.paused_delay.is_none() {
                self.paused_delay = Some(delay);
            }
            return ControllerStep {
                running: true,
                ..ControllerStep::default()
            };
        }

        match (self.local_delay_offset, self.paused_delay) {
            (None, _) => {
                self.local_delay_offset = Some(delay);
                self.paused_delay = None;
            }
            (Some(offset), Some(paused)) => {
                self.local_delay_offset = Some(offset + delay - paused);
                self.paused_delay = None;
            }
            (Some(_), None) => {}
        }

        if let Some(jump) = self.manual_jump_delay.take() {
            let jump = if self.speed_ratio < 0.0 { -jump } else { jump };
            self.local_delay_offset = Some(self.local_delay_offset.unwrap_or(0.0) + jump);
            self.frame_to_sync_from_jump = None;
        }
        self.go_to_frame = None;

        if self.weight == Some(0.0) && self.previous_weight == Some(0.0) {
            return ControllerStep {
                running: true,
                ..ControllerStep::default()
            };
        }
        self.previous_weight = self.weight;

        let params = StepParams {
            delay: delay - self.local_delay_offset.unwrap_or(0.0),
            from: self.from_frame,
            to: self.to_frame,
            looping: self.looping,
            speed_ratio: self.speed_ratio,
            weight: self.weight,
            sync,
        };

        let mut step = ControllerStep::default();
        for player in &mut self.players {
            let player_step = player.animate(&params, ctx);
            step.running |= player_step.running;
            step.looped |= player_step.looped;
        }
        self.animation_started = step.running;

        if step.looped {
            if let Some(on_loop) = self.on_loop.as_mut() {
                on_loop();
            }
            ctx.notifications
                .push(PlaybackNotification::ControllerLooped(self.key));
        }

        if !step.running && !self.ended {
            step.ended = true;
            self.raise_end(ctx.notifications);
            if self.dispose_on_end {
                self.on_end = None;
                self.on_loop = None;
            } else {
                self.ended = true;
            }
        }
        step
    }

    pub(crate) fn raise_end(&mut self, notifications: &mut Vec<PlaybackNotification>) {
        if let Some(on_end) = self.on_end.as_mut() {
            on_end();
        }
        notifications.push(PlaybackNotification::ControllerEnded(self.key));
    }

    /// Removes players whose curve name and target pass the filters. Returns
    /// the removed player ids.
    pub(crate) fn remove_players(
        &mut self,
        name: Option<&str>,
        mask: Option<&dyn Fn(TargetHandle) -> bool>,
    ) -> Vec<(PlayerId, CurveId)> {
        let mut removed = Vec::new();
        self.players.retain(|player| {
            let name_matches = name.is_none_or(|n| player.curve().name() == n);
            let target_matches =
                mask.is_none_or(|mask| player.bindings().any(|b| mask(b.target)));
            if name_matches && target_matches {
                removed.push((player.id(), player.curve().id()));
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn take_players(&mut self) -> Vec<(PlayerId, CurveId)> {
        std::mem::take(&mut self.players)
            .iter()
            .map(|p| (p.id(), p.curve().id()))
            .collect()
    }

    /// A sync root was disposed.
    pub(crate) fn clear_sync_root(&mut self, root: ControllerKey) {
        if self.sync_root == Some(root) {
            self.sync_root = None;
        }
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("key", &self.key)
            .field("target", &self.target)
            .field("players", &self.players.len())
            .field("from_frame", &self.from_frame)
            .field("to_frame", &self.to_frame)
            .field("looping", &self.looping)
            .field("speed_ratio", &self.speed_ratio)
            .field("weight", &self.weight)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}
