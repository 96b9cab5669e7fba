use std::sync::Arc;

use crate::animation::Curve;
use crate::scene::transform::Transform;
use crate::scene::{NodeHandle, SkeletonKey};

/// A transform node.
///
/// Only hierarchy, transform and the few animatable scalars live here.
/// `animations` holds the curves attached to this node, which
/// [`FrameScheduler::begin_animation`](crate::animation::FrameScheduler::begin_animation)
/// plays.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,

    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub transform: Transform,

    /// Visibility factor in `[0, 1]`.
    pub visibility: f32,

    /// Skeleton deforming this node's mesh. Its bones are sub-targets of the
    /// node when beginning attached animations.
    pub skeleton: Option<SkeletonKey>,

    pub animations: Vec<Arc<Curve>>,
}

impl Node {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visibility: 1.0,
            skeleton: None,
            animations: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("")
    }
}
