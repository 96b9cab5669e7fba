use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::animation::binding::{Channel, TargetProperty};
use crate::animation::serialize::{SerializedCurve, SerializedRange};
use crate::animation::{AnimationRange, AnimationValue, Curve};
use crate::errors::{AnimationError, Result};
use crate::scene::bone::{Bone, SkinSlot, Space};
use crate::scene::{Node, NodeHandle};

/// GPU-texture mirror of the skinning buffer: one RGBA32F row, four texels per
/// matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTexture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    /// Incremented on every rewrite.
    pub version: u64,
}

/// Ordered bones plus the flattened skinning buffer they produce.
///
/// Buffer layout: `(bone_count + 1) * 16` floats, column-major, slot `i` holds
/// `absolute_transform * inverse_bind`. The trailing slot is always identity.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub name: String,
    bones: Vec<Bone>,
    dirty: bool,
    pose_matrix: Mat4,

    transform_matrices: Vec<f32>,
    compute_count: u64,

    /// Above this many slots (identity guard included) a [`BoneTexture`] is
    /// maintained.
    pub max_uniform_bones: usize,
    bone_texture: Option<BoneTexture>,

    ranges: Vec<AnimationRange>,
}

impl Skeleton {
    pub const DEFAULT_MAX_UNIFORM_BONES: usize = 64;

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bones: Vec::new(),
            dirty: true,
            pose_matrix: Mat4::IDENTITY,
            transform_matrices: Vec::new(),
            compute_count: 0,
            max_uniform_bones: Self::DEFAULT_MAX_UNIFORM_BONES,
            bone_texture: None,
            ranges: Vec::new(),
        }
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Appends a bone under `parent`, computing its bind matrices.
    pub fn add_bone(&mut self, mut bone: Bone, parent: Option<usize>) -> Result<usize> {
        if let Some(p) = parent {
            self.check_index(p)?;
        }
        let index = self.bones.len();
        bone.parent = parent;
        bone.children.clear();
        self.bones.push(bone);
        if let Some(p) = parent {
            self.bones[p].children.push(index);
        }
        self.update_difference_matrix(index, false)?;
        Ok(index)
    }

    /// Reparents a bone and recomputes the bind matrices of its subtree.
    pub fn set_bone_parent(&mut self, index: usize, parent: Option<usize>) -> Result<()> {
        self.check_index(index)?;
        if let Some(p) = parent {
            self.check_index(p)?;
            let mut cursor = Some(p);
            while let Some(ancestor) = cursor {
                if ancestor == index {
                    return Err(AnimationError::BoneCycle { bone: index, parent: p });
                }
                cursor = self.bones[ancestor].parent;
            }
        }

        if let Some(old) = self.bones[index].parent {
            self.bones[old].children.retain(|&c| c != index);
        }
        self.bones[index].parent = parent;
        if let Some(p) = parent {
            self.bones[p].children.push(index);
        }
        self.update_difference_matrix(index, true)
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Mutable bone access. Marks the skeleton dirty.
    pub fn bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        let bone = self.bones.get_mut(index)?;
        self.dirty = true;
        Some(bone)
    }

    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.bones.len() {
            Ok(())
        } else {
            Err(AnimationError::BoneIndexOutOfBounds {
                index,
                len: self.bones.len(),
            })
        }
    }

    fn roots(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.is_none())
            .map(|(i, _)| i)
    }

    // ========================================================================
    // Dirty tracking & pose
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub fn pose_matrix(&self) -> Mat4 {
        self.pose_matrix
    }

    /// Transform applied above every root bone.
    pub fn set_pose_matrix(&mut self, matrix: Mat4) {
        if self.pose_matrix != matrix {
            self.pose_matrix = matrix;
            self.dirty = true;
        }
    }

    /// Number of times the skinning buffer was recomputed.
    #[inline]
    #[must_use]
    pub fn compute_count(&self) -> u64 {
        self.compute_count
    }

    // ========================================================================
    // Matrix composition
    // ========================================================================

    /// Recomputes the absolute bind matrix, its inverse and the scaling
    /// determinant of `index`, and of its descendants if `update_children`.
    ///
    /// A singular bind matrix keeps the bone's previous inverse.
    pub fn update_difference_matrix(&mut self, index: usize, update_children: bool) -> Result<()> {
        self.check_index(index)?;
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            let parent_bind = self.bones[i]
                .parent
                .map_or(Mat4::IDENTITY, |p| self.bones[p].absolute_bind);
            let bone = &mut self.bones[i];
            bone.absolute_bind = parent_bind * bone.base_matrix();
            match checked_inverse(bone.absolute_bind) {
                Ok(inverse) => bone.inverse_bind = inverse,
                Err(_) => warn!(
                    "Skeleton '{}': bind matrix of bone '{}' is not invertible, keeping its previous inverse",
                    self.name, bone.name
                ),
            }
            bone.scaling_determinant = if bone.absolute_bind.determinant() < 0.0 {
                -1.0
            } else {
                1.0
            };
            if update_children {
                stack.extend(bone.children.iter().copied());
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Composes every bone's absolute transform, parents first. Roots are
    /// composed with the pose matrix.
    pub fn compute_absolute_transforms(&mut self) {
        let mut stack: Vec<usize> = self.roots().rev().collect();
        while let Some(i) = stack.pop() {
            let parent_absolute = self.bones[i]
                .parent
                .map_or(self.pose_matrix, |p| self.bones[p].absolute_transform);
            let bone = &mut self.bones[i];
            bone.compose();
            bone.absolute_transform = parent_absolute * bone.local_matrix();
            stack.extend(bone.children.iter().rev().copied());
        }
    }

    /// Absolute transform of one bone from the current local matrices.
    fn absolute_of(&self, index: usize) -> Mat4 {
        let mut matrix = self.bones[index].local_matrix();
        let mut cursor = self.bones[index].parent;
        while let Some(p) = cursor {
            matrix = self.bones[p].local_matrix() * matrix;
            cursor = self.bones[p].parent;
        }
        self.pose_matrix * matrix
    }

    fn parent_absolute_of(&self, index: usize) -> Mat4 {
        self.bones[index]
            .parent
            .map_or(self.pose_matrix, |p| self.absolute_of(p))
    }

    /// Copies linked nodes' local TRS into their bones.
    fn sync_linked_nodes(&mut self, nodes: &SlotMap<NodeHandle, Node>) {
        let mut changed = false;
        for bone in &mut self.bones {
            if let Some(handle) = bone.linked_node
                && let Some(node) = nodes.get(handle)
            {
                let t = &node.transform;
                changed |= bone.set_trs(t.position, t.rotation, t.scale);
            }
        }
        if changed {
            self.dirty = true;
        }
    }

    /// Refreshes the skinning buffer if anything changed since the last call.
    ///
    /// Returns whether the buffer was recomputed.
    pub fn prepare(&mut self, nodes: &SlotMap<NodeHandle, Node>) -> bool {
        self.sync_linked_nodes(nodes);
        if !self.dirty {
            return false;
        }

        let slot_count = self.bones.len();
        let required = (slot_count + 1) * 16;
        if self.transform_matrices.len() != required {
            debug!(
                "Skeleton '{}': skinning buffer reallocated for {} bones",
                self.name, slot_count
            );
            self.transform_matrices = vec![0.0; required];
        }

        self.compute_absolute_transforms();

        for (i, bone) in self.bones.iter().enumerate() {
            let slot = match bone.slot {
                SkinSlot::Auto => i,
                SkinSlot::Index(slot) => slot,
                SkinSlot::Excluded => continue,
            };
            if slot >= slot_count {
                warn!(
                    "Skeleton '{}': bone '{}' slot {} is outside the skinning buffer ({} slots)",
                    self.name, bone.name, slot, slot_count
                );
                continue;
            }
            let matrix = bone.absolute_transform * bone.inverse_bind;
            self.transform_matrices[slot * 16..(slot + 1) * 16]
                .copy_from_slice(&matrix.to_cols_array());
        }
        self.transform_matrices[slot_count * 16..]
            .copy_from_slice(&Mat4::IDENTITY.to_cols_array());

        if slot_count + 1 > self.max_uniform_bones {
            let version = self.bone_texture.as_ref().map_or(0, |t| t.version + 1);
            self.bone_texture = Some(BoneTexture {
                width: ((slot_count + 1) * 4) as u32,
                height: 1,
                data: self.transform_matrices.clone(),
                version,
            });
        } else {
            self.bone_texture = None;
        }

        self.dirty = false;
        self.compute_count += 1;
        trace!("Skeleton '{}': skinning buffer recomputed", self.name);
        true
    }

    /// Flattened skinning buffer as of the last [`prepare`](Self::prepare).
    #[inline]
    #[must_use]
    pub fn transform_matrices(&self) -> &[f32] {
        &self.transform_matrices
    }

    #[inline]
    #[must_use]
    pub fn transform_matrices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.transform_matrices)
    }

    /// Skinning matrix at `slot`, if the buffer holds it.
    #[must_use]
    pub fn skinning_matrix(&self, slot: usize) -> Option<Mat4> {
        self.transform_matrices
            .get(slot * 16..(slot + 1) * 16)
            .map(Mat4::from_cols_slice)
    }

    #[inline]
    #[must_use]
    pub fn bone_texture(&self) -> Option<&BoneTexture> {
        self.bone_texture.as_ref()
    }

    // ========================================================================
    // Bone matrices & properties
    // ========================================================================

    pub fn set_bone_local_matrix(&mut self, index: usize, matrix: Mat4) -> Result<()> {
        self.check_index(index)?;
        self.bones[index].set_local_matrix(matrix);
        self.dirty = true;
        Ok(())
    }

    /// Replaces the bind matrix; optionally refreshes the bind chain and
    /// resets the local matrix to it.
    pub fn update_bone_matrix(
        &mut self,
        index: usize,
        matrix: Mat4,
        update_difference: bool,
        update_local: bool,
    ) -> Result<()> {
        self.check_index(index)?;
        self.bones[index].set_base_matrix(matrix);
        if update_difference {
            self.update_difference_matrix(index, true)?;
        }
        if update_local {
            self.bones[index].set_local_matrix(matrix);
        }
        self.dirty = true;
        Ok(())
    }

    pub fn set_bone_rest_pose(&mut self, index: usize, matrix: Mat4) -> Result<()> {
        self.check_index(index)?;
        self.bones[index].set_rest_pose(matrix);
        Ok(())
    }

    /// Current value of an animatable bone property.
    #[must_use]
    pub fn bone_property(&self, index: usize, property: &TargetProperty) -> Option<AnimationValue> {
        let bone = self.bones.get(index)?;
        Some(match property {
            TargetProperty::Position => AnimationValue::Vector3(bone.position()),
            TargetProperty::Rotation => AnimationValue::Quaternion(bone.rotation()),
            TargetProperty::Scaling => AnimationValue::Vector3(bone.scaling()),
            TargetProperty::Matrix => AnimationValue::Matrix(bone.local_matrix()),
            TargetProperty::Component(Channel::Position, axis) => {
                AnimationValue::Float(bone.position()[axis.index()])
            }
            TargetProperty::Component(Channel::Scaling, axis) => {
                AnimationValue::Float(bone.scaling()[axis.index()])
            }
            TargetProperty::Visibility | TargetProperty::Custom(_) => return None,
        })
    }

    /// Writes a bone property. Returns `false` if the bone or property does not
    /// exist or the value has the wrong type.
    pub fn set_bone_property(
        &mut self,
        index: usize,
        property: &TargetProperty,
        value: AnimationValue,
    ) -> bool {
        let Some(bone) = self.bones.get_mut(index) else {
            return false;
        };
        let applied = match (property, value) {
            (TargetProperty::Position, AnimationValue::Vector3(v)) => {
                bone.set_position(v);
                true
            }
            (TargetProperty::Rotation, AnimationValue::Quaternion(q)) => {
                bone.set_rotation(q);
                true
            }
            (TargetProperty::Scaling, AnimationValue::Vector3(v)) => {
                bone.set_scaling(v);
                true
            }
            (TargetProperty::Matrix, AnimationValue::Matrix(m)) => {
                bone.set_local_matrix(m);
                true
            }
            (TargetProperty::Component(Channel::Position, axis), AnimationValue::Float(f)) => {
                let mut position = bone.position();
                position[axis.index()] = f;
                bone.set_position(position);
                true
            }
            (TargetProperty::Component(Channel::Scaling, axis), AnimationValue::Float(f)) => {
                let mut scaling = bone.scaling();
                scaling[axis.index()] = f;
                bone.set_scaling(scaling);
                true
            }
            _ => false,
        };
        if applied {
            self.dirty = true;
        }
        applied
    }

    /// Resets every bone's local matrix to its rest pose.
    ///
    /// Bones with a linked node are overwritten again on the next prepare.
    pub fn return_to_rest(&mut self) {
        for bone in &mut self.bones {
            let rest = bone.rest_pose();
            bone.set_local_matrix(rest);
        }
        self.dirty = true;
    }

    pub fn return_bone_to_rest(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let rest = self.bones[index].rest_pose();
        self.set_bone_local_matrix(index, rest)
    }

    // ========================================================================
    // World-space bone operations
    // ========================================================================

    /// Skeleton-space transform of a bone from current local matrices.
    pub fn absolute_matrix(&self, index: usize) -> Result<Mat4> {
        self.check_index(index)?;
        Ok(self.absolute_of(index))
    }

    pub fn absolute_position(&self, index: usize, space: Space) -> Result<Vec3> {
        self.check_index(index)?;
        Ok(match space {
            Space::Local => self.bones[index].position(),
            Space::World => self.absolute_of(index).w_axis.truncate(),
        })
    }

    pub fn set_position(&mut self, index: usize, position: Vec3, space: Space) -> Result<()> {
        self.check_index(index)?;
        let local = match space {
            Space::Local => position,
            Space::World => {
                let inverse = checked_inverse(self.parent_absolute_of(index))?;
                inverse.transform_point3(position)
            }
        };
        self.bones[index].set_position(local);
        self.dirty = true;
        Ok(())
    }

    pub fn set_scale(&mut self, index: usize, scale: Vec3) -> Result<()> {
        self.check_index(index)?;
        self.bones[index].set_scaling(scale);
        self.dirty = true;
        Ok(())
    }

    /// Rotates a bone by `angle` radians around `axis` about its own origin.
    pub fn rotate(&mut self, index: usize, axis: Vec3, angle: f32, space: Space) -> Result<()> {
        self.check_index(index)?;
        let rotation = Mat4::from_axis_angle(axis.normalize_or_zero(), angle);
        self.rotate_with_matrix(index, rotation, space)
    }

    /// `World` rotations are conjugated by the parent's absolute transform.
    /// The local translation is always preserved.
    fn rotate_with_matrix(&mut self, index: usize, rotation: Mat4, space: Space) -> Result<()> {
        let local = self.bones[index].local_matrix();
        let mut result = match space {
            Space::Local => rotation * local,
            Space::World => {
                let parent = self.parent_absolute_of(index);
                let parent_inverse = checked_inverse(parent)?;
                parent_inverse * rotation * parent * local
            }
        };
        result.w_axis = local.w_axis;
        self.bones[index].set_local_matrix(result);
        self.dirty = true;
        Ok(())
    }

    /// Rotation matrix undoing the bone's current absolute rotation, with the
    /// mirror flag of the bind chain applied.
    fn negative_rotation(&self, index: usize) -> Result<Mat4> {
        let inverse = checked_inverse(self.absolute_of(index))?;
        let mirror = Mat4::from_scale(Vec3::new(self.bones[index].scaling_determinant, 1.0, 1.0));
        Ok(mirror * inverse)
    }

    pub fn set_rotation_quaternion(&mut self, index: usize, rotation: Quat, space: Space) -> Result<()> {
        self.check_index(index)?;
        match space {
            Space::Local => {
                self.bones[index].set_rotation(rotation);
                self.dirty = true;
                Ok(())
            }
            Space::World => {
                let undo = self.negative_rotation(index)?;
                self.rotate_with_matrix(index, Mat4::from_quat(rotation) * undo, Space::World)
            }
        }
    }

    pub fn set_rotation_matrix(&mut self, index: usize, rotation: Mat4, space: Space) -> Result<()> {
        self.check_index(index)?;
        match space {
            Space::Local => {
                self.bones[index].set_rotation(Quat::from_mat4(&rotation).normalize());
                self.dirty = true;
                Ok(())
            }
            Space::World => {
                let undo = self.negative_rotation(index)?;
                self.rotate_with_matrix(index, rotation * undo, Space::World)
            }
        }
    }

    pub fn rotation_quaternion(&self, index: usize, space: Space) -> Result<Quat> {
        self.check_index(index)?;
        Ok(match space {
            Space::Local => self.bones[index].rotation(),
            Space::World => {
                // Inverse of the mirror the world-space setters apply.
                let mut matrix = self.absolute_of(index);
                matrix.x_axis *= self.bones[index].scaling_determinant;
                matrix.to_scale_rotation_translation().1
            }
        })
    }

    /// `local_axis` expressed in skeleton space, normalized.
    pub fn direction(&self, index: usize, local_axis: Vec3) -> Result<Vec3> {
        self.check_index(index)?;
        Ok(self
            .absolute_of(index)
            .transform_vector3(local_axis)
            .normalize_or_zero())
    }

    // ========================================================================
    // Animation ranges
    // ========================================================================

    /// Creates a named range; an existing range with the same name is kept.
    pub fn create_animation_range(&mut self, name: &str, from: f32, to: f32) {
        if self.animation_range(name).is_none() {
            self.ranges.push(AnimationRange::new(name, from, to));
        }
    }

    pub fn delete_animation_range(&mut self, name: &str) {
        self.ranges.retain(|r| r.name != name);
    }

    #[must_use]
    pub fn animation_range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn animation_ranges(&self) -> &[AnimationRange] {
        &self.ranges
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    #[must_use]
    pub fn serialize(&self) -> SerializedSkeleton {
        SerializedSkeleton {
            name: self.name.clone(),
            bones: self
                .bones
                .iter()
                .enumerate()
                .map(|(i, bone)| SerializedBone {
                    name: bone.name.clone(),
                    index: match bone.slot {
                        SkinSlot::Auto => i as i64,
                        SkinSlot::Index(slot) => slot as i64,
                        SkinSlot::Excluded => -1,
                    },
                    parent_bone_index: bone.parent.map_or(-1, |p| p as i64),
                    matrix: bone.base_matrix().to_cols_array().to_vec(),
                    rest: Some(bone.rest_pose().to_cols_array().to_vec()),
                    animation: bone.animations.first().map(|c| c.serialize()),
                })
                .collect(),
            ranges: self.ranges.iter().map(SerializedRange::from).collect(),
        }
    }

    /// Rebuilds a skeleton. Parents must precede their children.
    pub fn parse(data: &SerializedSkeleton) -> Result<Self> {
        let mut skeleton = Self::new(&data.name);
        for (i, bone_data) in data.bones.iter().enumerate() {
            let matrix = matrix_from(&bone_data.name, &bone_data.matrix)?;
            let rest = match &bone_data.rest {
                Some(values) => matrix_from(&bone_data.name, values)?,
                None => matrix,
            };
            let slot = match bone_data.index {
                index if index < 0 => SkinSlot::Excluded,
                index if index as usize == i => SkinSlot::Auto,
                index => SkinSlot::Index(index as usize),
            };
            let mut bone = Bone::new(&bone_data.name, matrix)
                .with_rest_pose(rest)
                .with_slot(slot);
            if let Some(curve) = &bone_data.animation {
                bone.animations.push(Arc::new(Curve::parse(curve)?));
            }

            let parent = usize::try_from(bone_data.parent_bone_index).ok();
            if let Some(p) = parent
                && p >= i
            {
                return Err(AnimationError::BoneIndexOutOfBounds { index: p, len: i });
            }
            skeleton.add_bone(bone, parent)?;
        }
        for range in &data.ranges {
            skeleton.create_animation_range(&range.name, range.from, range.to);
        }
        Ok(skeleton)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.serialize())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::parse(&serde_json::from_str(json)?)
    }
}

fn checked_inverse(matrix: Mat4) -> Result<Mat4> {
    let inverse = matrix.inverse();
    if inverse.is_finite() {
        Ok(inverse)
    } else {
        Err(AnimationError::NonInvertibleMatrix)
    }
}

fn matrix_from(name: &str, values: &[f32]) -> Result<Mat4> {
    if values.len() == 16 {
        Ok(Mat4::from_cols_slice(values))
    } else {
        Err(AnimationError::InvalidBoneMatrix {
            name: name.to_string(),
            found: values.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedBone {
    pub name: String,
    /// Skin slot, `-1` when excluded.
    pub index: i64,
    /// `-1` for roots.
    pub parent_bone_index: i64,
    pub matrix: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<SerializedCurve>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSkeleton {
    pub name: String,
    pub bones: Vec<SerializedBone>,
    #[serde(default)]
    pub ranges: Vec<SerializedRange>,
}
