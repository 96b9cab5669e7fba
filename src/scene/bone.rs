use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::animation::Curve;
use crate::scene::NodeHandle;

/// Coordinate space for bone operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    /// Relative to the parent bone.
    #[default]
    Local,
    /// Skeleton space, including the skeleton pose matrix.
    World,
}

/// Where a bone writes in the skinning buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinSlot {
    /// The bone's position in the skeleton's bone list.
    #[default]
    Auto,
    Index(usize),
    /// Not written to the buffer.
    Excluded,
}

/// One joint of a [`Skeleton`](crate::scene::Skeleton).
///
/// The local matrix is the source of truth. Position, rotation and scaling are
/// derived from it on demand (`need_to_decompose`) and written back lazily
/// (`need_to_compose`); at most one of the two flags is set at any time.
///
/// Bones are only mutated through the owning skeleton so every change marks it
/// dirty.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,

    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,

    local_matrix: Mat4,
    rest_pose: Mat4,
    base_matrix: Mat4,

    pub(crate) absolute_bind: Mat4,
    pub(crate) inverse_bind: Mat4,
    pub(crate) absolute_transform: Mat4,
    /// `-1.0` when the bind chain mirrors, `1.0` otherwise.
    pub(crate) scaling_determinant: f32,

    position: Vec3,
    rotation: Quat,
    scaling: Vec3,
    need_to_decompose: bool,
    need_to_compose: bool,

    pub slot: SkinSlot,
    /// Node whose local TRS drives this bone on every prepare.
    pub linked_node: Option<NodeHandle>,

    pub animations: Vec<Arc<Curve>>,
}

impl Bone {
    /// Creates a bone whose local, base and rest matrices are all `matrix`.
    #[must_use]
    pub fn new(name: &str, matrix: Mat4) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            local_matrix: matrix,
            rest_pose: matrix,
            base_matrix: matrix,
            absolute_bind: matrix,
            inverse_bind: Mat4::IDENTITY,
            absolute_transform: matrix,
            scaling_determinant: 1.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scaling: Vec3::ONE,
            need_to_decompose: true,
            need_to_compose: false,
            slot: SkinSlot::Auto,
            linked_node: None,
            animations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rest_pose(mut self, rest_pose: Mat4) -> Self {
        self.rest_pose = rest_pose;
        self
    }

    #[must_use]
    pub fn with_slot(mut self, slot: SkinSlot) -> Self {
        self.slot = slot;
        self
    }

    #[must_use]
    pub fn with_linked_node(mut self, node: NodeHandle) -> Self {
        self.linked_node = Some(node);
        self
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Local matrix, composed from TRS if a component was set since.
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        if self.need_to_compose {
            Mat4::from_scale_rotation_translation(self.scaling, self.rotation, self.position)
        } else {
            self.local_matrix
        }
    }

    #[inline]
    #[must_use]
    pub fn rest_pose(&self) -> Mat4 {
        self.rest_pose
    }

    #[inline]
    #[must_use]
    pub fn base_matrix(&self) -> Mat4 {
        self.base_matrix
    }

    /// Inverse of the absolute bind matrix.
    #[inline]
    #[must_use]
    pub fn inverse_bind_matrix(&self) -> Mat4 {
        self.inverse_bind
    }

    /// Skeleton-space transform as of the last
    /// [`compute_absolute_transforms`](crate::scene::Skeleton::compute_absolute_transforms).
    #[inline]
    #[must_use]
    pub fn absolute_transform(&self) -> Mat4 {
        self.absolute_transform
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.trs().2
    }

    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.trs().1
    }

    #[must_use]
    pub fn scaling(&self) -> Vec3 {
        self.trs().0
    }

    fn trs(&self) -> (Vec3, Quat, Vec3) {
        if self.need_to_decompose {
            self.local_matrix.to_scale_rotation_translation()
        } else {
            (self.scaling, self.rotation, self.position)
        }
    }

    fn decompose(&mut self) {
        if self.need_to_decompose {
            let (scaling, rotation, position) = self.local_matrix.to_scale_rotation_translation();
            self.scaling = scaling;
            self.rotation = rotation;
            self.position = position;
            self.need_to_decompose = false;
        }
    }

    /// Writes pending TRS changes back into the local matrix.
    pub(crate) fn compose(&mut self) {
        if self.need_to_compose {
            self.local_matrix =
                Mat4::from_scale_rotation_translation(self.scaling, self.rotation, self.position);
            self.need_to_compose = false;
        }
    }

    pub(crate) fn set_local_matrix(&mut self, matrix: Mat4) {
        self.local_matrix = matrix;
        self.need_to_compose = false;
        self.need_to_decompose = true;
    }

    pub(crate) fn set_base_matrix(&mut self, matrix: Mat4) {
        self.base_matrix = matrix;
    }

    pub(crate) fn set_rest_pose(&mut self, matrix: Mat4) {
        self.rest_pose = matrix;
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.decompose();
        self.position = position;
        self.need_to_compose = true;
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quat) {
        self.decompose();
        self.rotation = rotation;
        self.need_to_compose = true;
    }

    pub(crate) fn set_scaling(&mut self, scaling: Vec3) {
        self.decompose();
        self.scaling = scaling;
        self.need_to_compose = true;
    }

    /// Sets all three components at once. Returns whether the local matrix
    /// changed.
    pub(crate) fn set_trs(&mut self, position: Vec3, rotation: Quat, scaling: Vec3) -> bool {
        let matrix = Mat4::from_scale_rotation_translation(scaling, rotation, position);
        if matrix == self.local_matrix() {
            return false;
        }
        self.set_local_matrix(matrix);
        true
    }
}
