use std::sync::Arc;

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use crate::animation::binding::{Channel, TargetHandle, TargetProperty};
use crate::animation::{AnimationValue, Curve};
use crate::scene::node::Node;
use crate::scene::object::AnimatedObject;
use crate::scene::skeleton::Skeleton;
use crate::scene::transform_system;
use crate::scene::{NodeHandle, ObjectKey, SkeletonKey};

/// Arena of everything animations can target.
///
/// [`property`](Self::property) and [`set_property`](Self::set_property) are
/// the only path by which players read and write values; writes always run the
/// target's mark-dirty hook.
#[derive(Debug, Default)]
pub struct Scene {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,
    pub skeletons: SlotMap<SkeletonKey, Skeleton>,
    pub objects: SlotMap<ObjectKey, AnimatedObject>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Adds a root node.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        handle
    }

    pub fn add_to_parent(&mut self, child: Node, parent: NodeHandle) -> NodeHandle {
        let handle = self.nodes.insert(child);
        self.root_nodes.push(handle);
        self.attach(handle, parent);
        handle
    }

    /// Reparents `child` under `parent`. No-op if either is missing, they are
    /// the same node, or `parent` is a descendant of `child`.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent || !self.nodes.contains_key(child) || !self.nodes.contains_key(parent) {
            return;
        }
        let mut cursor = Some(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return;
            }
            cursor = self.nodes.get(ancestor).and_then(|n| n.parent);
        }

        self.detach(child);
        self.root_nodes.retain(|&h| h != child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[child].transform.mark_dirty();
    }

    fn detach(&mut self, child: NodeHandle) {
        if let Some(old) = self.nodes.get_mut(child).and_then(|n| n.parent.take())
            && let Some(parent) = self.nodes.get_mut(old)
        {
            parent.children.retain(|&h| h != child);
            self.root_nodes.push(child);
        }
    }

    /// Removes a node and its subtree.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        if !self.nodes.contains_key(handle) {
            return;
        }
        self.detach(handle);
        self.root_nodes.retain(|&h| h != handle);

        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            if let Some(node) = self.nodes.remove(h) {
                stack.extend(node.children);
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    #[inline]
    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(handle, _)| handle)
    }

    /// Propagates world matrices through the node hierarchy.
    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy_iterative(&mut self.nodes, &self.root_nodes);
    }

    // ========================================================================
    // Skeletons & objects
    // ========================================================================

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonKey {
        self.skeletons.insert(skeleton)
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self, key: SkeletonKey) -> Option<&Skeleton> {
        self.skeletons.get(key)
    }

    #[inline]
    pub fn skeleton_mut(&mut self, key: SkeletonKey) -> Option<&mut Skeleton> {
        self.skeletons.get_mut(key)
    }

    /// Runs [`Skeleton::prepare`] for one skeleton.
    pub fn prepare_skeleton(&mut self, key: SkeletonKey) -> bool {
        match self.skeletons.get_mut(key) {
            Some(skeleton) => skeleton.prepare(&self.nodes),
            None => false,
        }
    }

    /// Prepares every skeleton; returns how many were recomputed.
    pub fn prepare_skeletons(&mut self) -> usize {
        let nodes = &self.nodes;
        self.skeletons
            .values_mut()
            .map(|s| s.prepare(nodes))
            .filter(|&recomputed| recomputed)
            .count()
    }

    pub fn add_object(&mut self, object: AnimatedObject) -> ObjectKey {
        self.objects.insert(object)
    }

    #[inline]
    #[must_use]
    pub fn object(&self, key: ObjectKey) -> Option<&AnimatedObject> {
        self.objects.get(key)
    }

    #[inline]
    pub fn object_mut(&mut self, key: ObjectKey) -> Option<&mut AnimatedObject> {
        self.objects.get_mut(key)
    }

    // ========================================================================
    // Targets
    // ========================================================================

    #[must_use]
    pub fn contains(&self, target: TargetHandle) -> bool {
        match target {
            TargetHandle::Node(h) => self.nodes.contains_key(h),
            TargetHandle::Bone(key, index) => self
                .skeletons
                .get(key)
                .is_some_and(|s| index < s.bone_count()),
            TargetHandle::Skeleton(key) => self.skeletons.contains_key(key),
            TargetHandle::Object(key) => self.objects.contains_key(key),
        }
    }

    /// Human-readable target name for logs and errors.
    #[must_use]
    pub fn describe(&self, target: TargetHandle) -> String {
        let name = match target {
            TargetHandle::Node(h) => self.nodes.get(h).map(|n| n.name.clone()),
            TargetHandle::Bone(key, index) => self
                .skeletons
                .get(key)
                .and_then(|s| s.bone(index))
                .map(|b| b.name.clone()),
            TargetHandle::Skeleton(key) => self.skeletons.get(key).map(|s| s.name.clone()),
            TargetHandle::Object(key) => self.objects.get(key).map(|o| o.name.clone()),
        };
        match name {
            Some(name) => format!("{target:?} '{name}'"),
            None => format!("{target:?} (missing)"),
        }
    }

    /// Curves attached to a target.
    #[must_use]
    pub fn attached_curves(&self, target: TargetHandle) -> Vec<Arc<Curve>> {
        match target {
            TargetHandle::Node(h) => self
                .nodes
                .get(h)
                .map(|n| n.animations.clone())
                .unwrap_or_default(),
            TargetHandle::Bone(key, index) => self
                .skeletons
                .get(key)
                .and_then(|s| s.bone(index))
                .map(|b| b.animations.clone())
                .unwrap_or_default(),
            TargetHandle::Skeleton(_) => Vec::new(),
            TargetHandle::Object(key) => self
                .objects
                .get(key)
                .map(|o| o.animations.clone())
                .unwrap_or_default(),
        }
    }

    /// Targets animated along with `target`: a skeleton's bones, a skinned
    /// node's skeleton.
    #[must_use]
    pub fn sub_targets(&self, target: TargetHandle) -> Vec<TargetHandle> {
        match target {
            TargetHandle::Node(h) => self
                .nodes
                .get(h)
                .and_then(|n| n.skeleton)
                .map(|key| vec![TargetHandle::Skeleton(key)])
                .unwrap_or_default(),
            TargetHandle::Skeleton(key) => self
                .skeletons
                .get(key)
                .map(|s| (0..s.bone_count()).map(|i| TargetHandle::Bone(key, i)).collect())
                .unwrap_or_default(),
            TargetHandle::Bone(..) | TargetHandle::Object(_) => Vec::new(),
        }
    }

    /// Current value of `property` on `target`, `None` if the target does not
    /// expose it.
    #[must_use]
    pub fn property(&self, target: TargetHandle, property: &TargetProperty) -> Option<AnimationValue> {
        match target {
            TargetHandle::Node(h) => {
                let node = self.nodes.get(h)?;
                let t = &node.transform;
                Some(match property {
                    TargetProperty::Position => AnimationValue::Vector3(t.position),
                    TargetProperty::Rotation => AnimationValue::Quaternion(t.rotation),
                    TargetProperty::Scaling => AnimationValue::Vector3(t.scale),
                    TargetProperty::Matrix => AnimationValue::Matrix(t.compose_local()),
                    TargetProperty::Visibility => AnimationValue::Float(node.visibility),
                    TargetProperty::Component(channel, axis) => {
                        AnimationValue::Float(node_channel(node, *channel)[axis.index()])
                    }
                    TargetProperty::Custom(_) => return None,
                })
            }
            TargetHandle::Bone(key, index) => self.skeletons.get(key)?.bone_property(index, property),
            TargetHandle::Skeleton(_) => None,
            TargetHandle::Object(key) => self.objects.get(key)?.get(property),
        }
    }

    /// Writes `value` and marks the target dirty. Returns `false` if the
    /// target or property does not exist or the type does not match.
    pub fn set_property(
        &mut self,
        target: TargetHandle,
        property: &TargetProperty,
        value: AnimationValue,
    ) -> bool {
        match target {
            TargetHandle::Node(h) => {
                let Some(node) = self.nodes.get_mut(h) else {
                    return false;
                };
                let applied = match (property, value) {
                    (TargetProperty::Position, AnimationValue::Vector3(v)) => {
                        node.transform.position = v;
                        true
                    }
                    (TargetProperty::Rotation, AnimationValue::Quaternion(q)) => {
                        node.transform.rotation = q;
                        true
                    }
                    (TargetProperty::Scaling, AnimationValue::Vector3(v)) => {
                        node.transform.scale = v;
                        true
                    }
                    (TargetProperty::Matrix, AnimationValue::Matrix(m)) => {
                        node.transform.apply_local_matrix(m);
                        true
                    }
                    (TargetProperty::Visibility, AnimationValue::Float(f)) => {
                        node.visibility = f;
                        true
                    }
                    (TargetProperty::Component(channel, axis), AnimationValue::Float(f)) => {
                        let slot = match channel {
                            Channel::Position => &mut node.transform.position,
                            Channel::Scaling => &mut node.transform.scale,
                        };
                        slot[axis.index()] = f;
                        true
                    }
                    _ => false,
                };
                if applied {
                    node.transform.mark_dirty();
                }
                applied
            }
            TargetHandle::Bone(key, index) => self
                .skeletons
                .get_mut(key)
                .is_some_and(|s| s.set_bone_property(index, property, value)),
            TargetHandle::Skeleton(_) => false,
            TargetHandle::Object(key) => self
                .objects
                .get_mut(key)
                .is_some_and(|o| o.set(property, value)),
        }
    }

    /// Rest pose of a bone target.
    #[must_use]
    pub fn rest_pose(&self, target: TargetHandle) -> Option<Mat4> {
        match target {
            TargetHandle::Bone(key, index) => {
                self.skeletons.get(key)?.bone(index).map(|b| b.rest_pose())
            }
            _ => None,
        }
    }
}

fn node_channel(node: &Node, channel: Channel) -> Vec3 {
    match channel {
        Channel::Position => node.transform.position,
        Channel::Scaling => node.transform.scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Bone;

    #[test]
    fn test_component_write_marks_dirty() {
        let mut scene = Scene::new();
        let handle = scene.add_node(Node::new("n"));
        scene.update_matrix_world();
        assert!(!scene.nodes[handle].transform.is_dirty());

        let property = TargetProperty::from_path("position.y");
        assert!(scene.set_property(TargetHandle::Node(handle), &property, AnimationValue::Float(3.0)));
        assert!(scene.nodes[handle].transform.is_dirty());
        assert_eq!(scene.nodes[handle].transform.position, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_wrong_type_write_is_rejected() {
        let mut scene = Scene::new();
        let handle = scene.add_node(Node::new("n"));
        assert!(!scene.set_property(
            TargetHandle::Node(handle),
            &TargetProperty::Position,
            AnimationValue::Float(1.0)
        ));
    }

    #[test]
    fn test_bone_write_marks_skeleton_dirty() {
        let mut scene = Scene::new();
        let mut skeleton = Skeleton::new("rig");
        skeleton.add_bone(Bone::new("root", Mat4::IDENTITY), None).unwrap();
        let key = scene.add_skeleton(skeleton);
        assert!(scene.prepare_skeleton(key));
        assert!(!scene.prepare_skeleton(key));

        assert!(scene.set_property(
            TargetHandle::Bone(key, 0),
            &TargetProperty::Position,
            AnimationValue::Vector3(Vec3::X)
        ));
        assert!(scene.skeleton(key).unwrap().is_dirty());
    }

    #[test]
    fn test_attach_refuses_cycles() {
        let mut scene = Scene::new();
        let a = scene.add_node(Node::new("a"));
        let b = scene.add_to_parent(Node::new("b"), a);
        scene.attach(a, b);
        assert_eq!(scene.nodes[a].parent(), None);
        assert_eq!(scene.nodes[b].parent(), Some(a));
        assert_eq!(scene.root_nodes, vec![a]);
    }
}
