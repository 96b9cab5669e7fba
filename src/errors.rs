//! Error Types
//!
//! This module defines the error types used throughout the animation core.
//!
//! # Overview
//!
//! The main error type [`AnimationError`] covers the failure modes that can be
//! detected eagerly:
//! - Malformed curve data (empty curves, mixed key types, bad flat arrays)
//! - Binding failures (missing targets, properties a target does not expose)
//! - Skeleton topology errors (bad bone indices, parenting cycles)
//! - Singular matrices met by world-space bone operations
//!
//! Playback requests that cannot be honoured (e.g. a named range that does not
//! exist) are not errors: they return `None`/`false` instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_animation::errors::{AnimationError, Result};
//!
//! fn build_curve() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::animation::values::CurveDataType;

/// The main error type for the animation core.
#[derive(Error, Debug)]
pub enum AnimationError {
    // ========================================================================
    // Curve Data Errors
    // ========================================================================
    /// A curve was built or parsed without any keyframe.
    #[error("Curve '{name}' has no keyframes")]
    EmptyCurve {
        /// Curve name
        name: String,
    },

    /// A keyframe value does not match the curve data type.
    #[error("Curve '{name}' expects {expected:?} keys, found {found:?}")]
    KeyTypeMismatch {
        /// Curve name
        name: String,
        /// Data type fixed at construction
        expected: CurveDataType,
        /// Data type of the offending value
        found: CurveDataType,
    },

    /// A serialized key holds fewer components than its data type needs.
    #[error("Invalid key data at frame {frame}: expected {expected} values, found {found}")]
    InvalidKeyData {
        /// Frame of the offending key
        frame: f32,
        /// Minimum number of components
        expected: usize,
        /// Number of components present
        found: usize,
    },

    /// Unknown data type or loop behavior code in serialized data.
    #[error("Unknown {kind} code: {code}")]
    UnknownCode {
        /// What the code describes
        kind: &'static str,
        /// The invalid code
        code: u32,
    },

    // ========================================================================
    // Binding Errors
    // ========================================================================
    /// The target handle does not refer to a live object.
    #[error("Animation target not found: {0}")]
    TargetNotFound(String),

    /// The target does not expose the property with the curve's data type.
    #[error("Property '{property}' ({data_type:?}) is not supported by target {target}")]
    UnsupportedProperty {
        /// Property path
        property: String,
        /// Data type of the curve
        data_type: CurveDataType,
        /// Debug description of the target
        target: String,
    },

    // ========================================================================
    // Skeleton Errors
    // ========================================================================
    /// Bone index out of bounds.
    #[error("Bone index out of bounds: {index} (bone count: {len})")]
    BoneIndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Number of bones in the skeleton
        len: usize,
    },

    /// Reparenting would make a bone its own ancestor.
    #[error("Parenting bone {bone} to {parent} would create a cycle")]
    BoneCycle {
        /// Bone being reparented
        bone: usize,
        /// Requested parent
        parent: usize,
    },

    /// A serialized bone matrix does not hold 16 values.
    #[error("Bone '{name}' matrix has {found} values, expected 16")]
    InvalidBoneMatrix {
        /// Bone name
        name: String,
        /// Number of values present
        found: usize,
    },

    /// A matrix required by a world-space operation could not be inverted.
    #[error("Matrix could not be inverted (zero scale?)")]
    NonInvertibleMatrix,

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, AnimationError>`.
pub type Result<T> = std::result::Result<T, AnimationError>;
