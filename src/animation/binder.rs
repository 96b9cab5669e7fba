use log::warn;

use crate::animation::binding::{PropertyBinding, TargetHandle, TargetProperty};
use crate::animation::curve::Curve;
use crate::animation::values::AnimationValue;
use crate::errors::{AnimationError, Result};
use crate::scene::Scene;

/// Resolves curves against scene targets, once per player.
pub struct Binder;

impl Binder {
    /// Validates that `target` is live and exposes the curve's property with
    /// the curve's data type, and captures the original value.
    pub fn bind(scene: &Scene, target: TargetHandle, curve: &Curve) -> Result<PropertyBinding> {
        if !scene.contains(target) {
            return Err(AnimationError::TargetNotFound(format!("{target:?}")));
        }

        let property = *curve.property();
        let unsupported = || AnimationError::UnsupportedProperty {
            property: property.path(),
            data_type: curve.data_type(),
            target: scene.describe(target),
        };

        let current = scene.property(target, &property).ok_or_else(unsupported)?;
        if current.data_type() != curve.data_type() {
            return Err(unsupported());
        }

        let original_value = match (target, property) {
            (TargetHandle::Bone(..), TargetProperty::Matrix) => scene
                .rest_pose(target)
                .map_or(current, AnimationValue::Matrix),
            _ => current,
        };

        Ok(PropertyBinding {
            target,
            property,
            original_value,
        })
    }

    /// Binds every target, logging and skipping the ones that fail.
    pub fn bind_all(scene: &Scene, targets: &[TargetHandle], curve: &Curve) -> Vec<PropertyBinding> {
        targets
            .iter()
            .filter_map(|&target| match Self::bind(scene, target, curve) {
                Ok(binding) => Some(binding),
                Err(err) => {
                    warn!("Curve '{}' skipped: {err}", curve.name());
                    None
                }
            })
            .collect()
    }

    /// Depth-first search for a node named `name` under `root`, then over
    /// every skeleton bone of the scene.
    #[must_use]
    pub fn find_target_by_name(scene: &Scene, root: TargetHandle, name: &str) -> Option<TargetHandle> {
        if let TargetHandle::Node(handle) = root {
            let mut stack = vec![handle];
            while let Some(current) = stack.pop() {
                let Some(node) = scene.get_node(current) else {
                    continue;
                };
                if node.name == name {
                    return Some(TargetHandle::Node(current));
                }
                stack.extend(node.children().iter().rev().copied());
            }
        }

        let skeleton = match root {
            TargetHandle::Skeleton(key) | TargetHandle::Bone(key, _) => Some(key),
            TargetHandle::Node(handle) => scene.get_node(handle).and_then(|n| n.skeleton),
            TargetHandle::Object(_) => None,
        }?;
        scene
            .skeleton(skeleton)?
            .bone_index(name)
            .map(|index| TargetHandle::Bone(skeleton, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::values::CurveDataType;
    use crate::animation::Keyframe;
    use crate::scene::{AnimatedObject, Bone, Node, Skeleton};
    use glam::{Mat4, Vec3};

    fn curve(path: &str, value: AnimationValue) -> Curve {
        Curve::from_keys(
            "c",
            TargetProperty::from_path(path),
            30.0,
            value.data_type(),
            &[Keyframe::new(0.0, value)],
        )
        .unwrap()
    }

    #[test]
    fn test_bone_matrix_original_is_rest_pose() {
        let mut scene = Scene::new();
        let mut skeleton = Skeleton::new("rig");
        let rest = Mat4::from_translation(Vec3::Z);
        skeleton
            .add_bone(Bone::new("b", Mat4::IDENTITY).with_rest_pose(rest), None)
            .unwrap();
        let key = scene.add_skeleton(skeleton);

        let binding = Binder::bind(
            &scene,
            TargetHandle::Bone(key, 0),
            &curve("_matrix", AnimationValue::Matrix(Mat4::IDENTITY)),
        )
        .unwrap();
        assert_eq!(binding.original_value, AnimationValue::Matrix(rest));
    }

    #[test]
    fn test_type_mismatch_is_unsupported() {
        let mut scene = Scene::new();
        let object = scene.add_object(AnimatedObject::new("o").with_property("alpha", 1.0_f32));

        let err = Binder::bind(
            &scene,
            TargetHandle::Object(object),
            &curve("alpha", AnimationValue::Vector3(Vec3::ONE)),
        );
        assert!(matches!(err, Err(AnimationError::UnsupportedProperty { .. })));

        let ok = Binder::bind(
            &scene,
            TargetHandle::Object(object),
            &curve("alpha", AnimationValue::Float(0.0)),
        );
        assert_eq!(ok.unwrap().original_value.data_type(), CurveDataType::Float);
    }

    #[test]
    fn test_find_target_by_name_walks_children() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::new("root"));
        let child = scene.add_to_parent(Node::new("arm"), root);
        assert_eq!(
            Binder::find_target_by_name(&scene, TargetHandle::Node(root), "arm"),
            Some(TargetHandle::Node(child))
        );
        assert_eq!(Binder::find_target_by_name(&scene, TargetHandle::Node(root), "leg"), None);
    }
}
