//! Scene graph and animation targets.
//!
//! Everything a curve can drive lives in one of the [`Scene`] arenas:
//! - Node: transform hierarchy entries
//! - Skeleton: ordered bones feeding a flattened skinning buffer
//! - AnimatedObject: named property bags for non-transform targets
//!
//! Cross references (bone parents, linked nodes, player back-references) are
//! arena keys or indices, never owning pointers.

pub mod bone;
pub mod node;
pub mod object;
pub mod scene;
pub mod skeleton;
pub mod transform;
pub mod transform_system;

pub use bone::{Bone, SkinSlot, Space};
pub use node::Node;
pub use object::AnimatedObject;
pub use scene::Scene;
pub use skeleton::{BoneTexture, Skeleton};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct SkeletonKey;
    pub struct ObjectKey;
}
