#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod errors;
pub mod scene;
pub mod settings;
pub mod utils;

pub use animation::{
    AnimationValue, Binder, Curve, CurveDataType, CurveLoopMode, CurvePlayer, FrameScheduler,
    Keyframe, PlaybackController, PlaybackGroup, PlaybackNotification, PlaybackOptions,
    TargetHandle, TargetProperty,
};
pub use errors::{AnimationError, Result};
pub use scene::{AnimatedObject, Bone, Node, Scene, Skeleton};
pub use settings::{AnimationSettings, InterpolationOptions};
pub use utils::{FrameClock, interner};
