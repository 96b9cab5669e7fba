//! Keyframe animation and playback.
//!
//! - [`Curve`]: typed keyframe track bound to one property path
//! - [`CurvePlayer`]: one curve advancing against its bound targets
//! - [`PlaybackController`]: players sharing a frame window, speed and weight
//! - [`PlaybackGroup`]: `(curve, target)` pairs started and stopped together
//! - [`LateBindingResolver`]: merges weighted writes once per tick
//! - [`FrameScheduler`]: owns controllers and groups and runs the frame loop

pub mod binder;
pub mod binding;
pub mod controller;
pub mod curve;
pub mod easing;
pub mod group;
pub mod late_binding;
pub mod player;
pub mod scheduler;
pub mod serialize;
pub mod tracks;
pub mod values;

pub use binder::Binder;
pub use binding::{Axis, Channel, PropertyBinding, TargetHandle, TargetProperty};
pub use controller::{ControllerKey, ControllerStep, PlaybackController, PlaybackNotification};
pub use curve::{AnimationRange, Curve, CurveData, CurveEvent, CurveId, CurveLoopMode};
pub use easing::{EasingFunction, EasingKind, EasingMode};
pub use group::{GroupKey, PlaybackGroup, TargetedCurve};
pub use late_binding::LateBindingResolver;
pub use player::{CurvePlayer, PlayerId, PlayerStep, StepParams, SyncPosition, TickContext};
pub use scheduler::{FrameScheduler, PlaybackOptions, TargetMask};
pub use serialize::{SerializedCurve, SerializedKey, SerializedRange};
pub use tracks::{InterpolationState, KeyInterpolation, Keyframe, KeyframeTrack};
pub use values::{AnimationValue, Color3, CurveDataType, Interpolatable, Size};
