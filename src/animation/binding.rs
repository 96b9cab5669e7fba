use std::fmt;

use crate::animation::values::{AnimationValue, CurveDataType};
use crate::scene::{NodeHandle, ObjectKey, SkeletonKey};
use crate::utils::interner::{self, Symbol};

/// Vector channel addressed by a component path such as `position.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Position,
    Scaling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "z" => Some(Self::Z),
            _ => None,
        }
    }
}

/// Animatable property, parsed once from its dot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetProperty {
    /// `position` (Vector3)
    Position,
    /// `rotationQuaternion` (Quaternion)
    Rotation,
    /// `scaling` (Vector3)
    Scaling,
    /// `_matrix`, the local matrix of a node or bone (Matrix)
    Matrix,
    /// `visibility` (Float)
    Visibility,
    /// `position.x`, `scaling.z`, ... (Float)
    Component(Channel, Axis),
    /// Any other path, resolved against [`AnimatedObject`](crate::scene::AnimatedObject)
    /// properties.
    Custom(Symbol),
}

impl TargetProperty {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path {
            "position" => Self::Position,
            "rotationQuaternion" | "rotation" => Self::Rotation,
            "scaling" | "scale" => Self::Scaling,
            "_matrix" | "matrix" => Self::Matrix,
            "visibility" => Self::Visibility,
            _ => {
                if let Some((head, tail)) = path.split_once('.')
                    && let Some(axis) = Axis::parse(tail)
                {
                    match head {
                        "position" => return Self::Component(Channel::Position, axis),
                        "scaling" | "scale" => return Self::Component(Channel::Scaling, axis),
                        _ => {}
                    }
                }
                Self::Custom(interner::intern(path))
            }
        }
    }

    /// Canonical dot path.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Position => "position".to_string(),
            Self::Rotation => "rotationQuaternion".to_string(),
            Self::Scaling => "scaling".to_string(),
            Self::Matrix => "_matrix".to_string(),
            Self::Visibility => "visibility".to_string(),
            Self::Component(channel, axis) => {
                let head = match channel {
                    Channel::Position => "position",
                    Channel::Scaling => "scaling",
                };
                let tail = match axis {
                    Axis::X => "x",
                    Axis::Y => "y",
                    Axis::Z => "z",
                };
                format!("{head}.{tail}")
            }
            Self::Custom(symbol) => interner::resolve(*symbol).to_string(),
        }
    }

    /// Data type implied by the property, `None` for custom paths.
    #[must_use]
    pub fn data_type(&self) -> Option<CurveDataType> {
        match self {
            Self::Position | Self::Scaling => Some(CurveDataType::Vector3),
            Self::Rotation => Some(CurveDataType::Quaternion),
            Self::Matrix => Some(CurveDataType::Matrix),
            Self::Visibility | Self::Component(..) => Some(CurveDataType::Float),
            Self::Custom(_) => None,
        }
    }
}

impl fmt::Display for TargetProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Non-owning reference to something a curve can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetHandle {
    Node(NodeHandle),
    /// Bone `usize` of a skeleton.
    Bone(SkeletonKey, usize),
    Skeleton(SkeletonKey),
    Object(ObjectKey),
}

impl TargetHandle {
    /// Skeleton owning this target, if any.
    #[must_use]
    pub fn skeleton(&self) -> Option<SkeletonKey> {
        match self {
            Self::Bone(key, _) | Self::Skeleton(key) => Some(*key),
            Self::Node(_) | Self::Object(_) => None,
        }
    }
}

/// A curve resolved against one target.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    pub target: TargetHandle,
    pub property: TargetProperty,
    /// Value before any player touched it. For a bone matrix this is the
    /// rest pose.
    pub original_value: AnimationValue,
}
