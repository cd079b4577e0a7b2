//! Immutable joint snapshots
//!
//! An [`ImmutableJointTree`] is a point-in-time deep copy of a live
//! [`JointTree`] with every smoothed value frozen. It is what gets exported:
//! each joint serializes as
//!
//! ```json
//! {
//!   "name": "hips_joint",
//!   "relativeTranslation": [0.0, 0.9, 0.0],
//!   "absoluteTranslation": [0.0, 0.9, 0.0],
//!   "rotation": [0.0, 0.0, 0.0, 1.0],
//!   "children": [ ... ]
//! }
//! ```
//!
//! and an empty tree serializes as `null`. Parent links are never written.

use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::info;

use crate::error::TreeError;
use crate::joint::JointId;
use crate::tree::JointTree;
use crate::types::{Quat, Vec3};

/// Handle to a joint inside the snapshot that produced it.
///
/// Distinct from the live tree's [`JointId`]: the snapshot lays its joints
/// out breadth-first, so live indices do not carry over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrozenJointId(usize);

impl FrozenJointId {
    /// Position of the joint in breadth-first order
    pub fn index(self) -> usize {
        self.0
    }
}

/// A joint whose values were captured once and are never recomputed
#[derive(Debug, Clone, PartialEq)]
pub struct ImmutableJoint {
    name: String,
    relative_translation: Vec3,
    absolute_translation: Vec3,
    rotation: Quat,
    children: Vec<FrozenJointId>,
    parent: Option<FrozenJointId>,
}

impl ImmutableJoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relative_translation(&self) -> Vec3 {
        self.relative_translation
    }

    pub fn absolute_translation(&self) -> Vec3 {
        self.absolute_translation
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Children in discovery order, as handles into the owning snapshot
    pub fn children(&self) -> &[FrozenJointId] {
        &self.children
    }

    pub fn parent(&self) -> Option<FrozenJointId> {
        self.parent
    }
}

impl fmt::Display for ImmutableJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | absolute: {} | rotation: {}",
            self.name, self.absolute_translation, self.rotation
        )
    }
}

/// An immutable tree representing a skeleton's joints at one instant
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImmutableJointTree {
    joints: Box<[ImmutableJoint]>,
}

impl ImmutableJointTree {
    /// Snapshot with no root
    pub fn empty() -> Self {
        Self::default()
    }

    /// Freeze the current state of `tree`.
    ///
    /// Joints are visited breadth-first; each one is paired with the frozen
    /// counterpart of its parent so the copy has the same shape.
    pub fn construct_from(tree: &JointTree) -> Self {
        let Some(source_root) = tree.root() else {
            return Self::empty();
        };

        let mut joints: Vec<ImmutableJoint> = Vec::with_capacity(tree.tree_size().unwrap_or(0));
        let mut queue: VecDeque<(JointId, Option<FrozenJointId>)> = VecDeque::new();
        queue.push_back((source_root, None));

        while let Some((source, frozen_parent)) = queue.pop_front() {
            let Some(joint) = tree.joint(source) else {
                continue;
            };

            let id = FrozenJointId(joints.len());
            joints.push(ImmutableJoint {
                name: joint.name().to_string(),
                relative_translation: joint.relative_translation(),
                absolute_translation: tree.absolute_translation(source).unwrap_or_default(),
                rotation: joint.rotation(),
                children: Vec::with_capacity(joint.children().len()),
                parent: frozen_parent,
            });

            if let Some(parent) = frozen_parent {
                joints[parent.0].children.push(id);
            }

            queue.extend(joint.children().iter().map(|&child| (child, Some(id))));
        }

        info!(joints = joints.len(), "Immutable joint tree created");

        Self {
            joints: joints.into_boxed_slice(),
        }
    }

    /// Root handle; the root is always the first joint of a non-empty snapshot
    pub fn root(&self) -> Option<FrozenJointId> {
        (!self.joints.is_empty()).then_some(FrozenJointId(0))
    }

    pub fn joint(&self, id: FrozenJointId) -> Option<&ImmutableJoint> {
        self.joints.get(id.0)
    }

    /// All joints in breadth-first order
    pub fn joints(&self) -> &[ImmutableJoint] {
        &self.joints
    }

    pub fn children(&self, id: FrozenJointId) -> &[FrozenJointId] {
        self.joint(id).map(ImmutableJoint::children).unwrap_or_default()
    }

    pub fn parent(&self, id: FrozenJointId) -> Option<FrozenJointId> {
        self.joint(id)?.parent
    }

    /// Number of joints, `None` for an empty snapshot
    pub fn tree_size(&self) -> Option<usize> {
        self.root()
            .and_then(|root| self.descendant_count(root))
            .map(|count| count + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn descendant_count(&self, id: FrozenJointId) -> Option<usize> {
        let joint = self.joint(id)?;
        Some(
            joint
                .children
                .iter()
                .map(|&child| 1 + self.descendant_count(child).unwrap_or(0))
                .sum(),
        )
    }

    /// Level-order walk from the root
    pub fn traverse_bfs(&self) -> impl Iterator<Item = FrozenJointId> + '_ {
        let mut queue: VecDeque<FrozenJointId> = self.root().into_iter().collect();
        std::iter::from_fn(move || {
            let id = queue.pop_front()?;
            queue.extend(self.children(id).iter().copied());
            Some(id)
        })
    }

    /// Search by name from the root: the root itself, then direct children,
    /// then each child's subtree in order
    pub fn find_self_or_descendant(&self, name: &str) -> Option<FrozenJointId> {
        let root = self.root()?;
        if self.joints[root.0].name == name {
            return Some(root);
        }
        self.find_descendant(root, name)
    }

    fn find_descendant(&self, id: FrozenJointId, name: &str) -> Option<FrozenJointId> {
        let children = self.children(id);
        if let Some(&child) = children.iter().find(|c| self.joints[c.0].name == name) {
            return Some(child);
        }
        children
            .iter()
            .find_map(|&child| self.find_descendant(child, name))
    }

    /// One line per joint in BFS order
    pub fn describe_bfs(&self) -> Vec<String> {
        self.traverse_bfs()
            .map(|id| self.joints[id.0].to_string())
            .collect()
    }

    /// Parse an exported joint document of any depth.
    ///
    /// Every joint level nests two JSON containers, so a plain
    /// `serde_json::from_str` stops at roughly 64 joints deep.
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        from_json_unbounded(json)
    }

    /// Rebuild the arena from a nested document
    fn from_document(document: Option<JointDocument>) -> Self {
        let mut joints = Vec::new();
        let mut queue: VecDeque<(JointDocument, Option<FrozenJointId>)> = document
            .into_iter()
            .map(|doc| (doc, None))
            .collect();

        while let Some((mut doc, parent)) = queue.pop_front() {
            let id = FrozenJointId(joints.len());
            let children = std::mem::take(&mut doc.children);

            joints.push(ImmutableJoint {
                name: doc.name,
                relative_translation: doc.relative_translation,
                absolute_translation: doc.absolute_translation,
                rotation: doc.rotation,
                children: Vec::with_capacity(children.len()),
                parent,
            });

            if let Some(parent) = parent {
                let parent_joint: &mut ImmutableJoint = &mut joints[parent.0];
                parent_joint.children.push(id);
            }

            queue.extend(children.into_iter().map(|child| (child, Some(id))));
        }

        Self {
            joints: joints.into_boxed_slice(),
        }
    }
}

impl From<&JointTree> for ImmutableJointTree {
    fn from(tree: &JointTree) -> Self {
        Self::construct_from(tree)
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// Borrowed view of one joint and its subtree, serialized as a nested object
struct JointView<'a> {
    tree: &'a ImmutableJointTree,
    id: FrozenJointId,
}

impl Serialize for JointView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let joint = &self.tree.joints[self.id.0];
        let children: Vec<JointView<'_>> = joint
            .children
            .iter()
            .map(|&id| JointView { tree: self.tree, id })
            .collect();

        let mut state = serializer.serialize_struct("ImmutableJoint", 5)?;
        state.serialize_field("name", &joint.name)?;
        state.serialize_field("relativeTranslation", &joint.relative_translation)?;
        state.serialize_field("absoluteTranslation", &joint.absolute_translation)?;
        state.serialize_field("rotation", &joint.rotation)?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

impl Serialize for ImmutableJointTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let root = self.root().map(|id| JointView { tree: self, id });
        root.serialize(serializer)
    }
}

/// Owned nested joint object, used when reading an exported document back
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JointDocument {
    name: String,
    relative_translation: Vec3,
    absolute_translation: Vec3,
    rotation: Quat,
    #[serde(default)]
    children: Vec<JointDocument>,
}

impl<'de> Deserialize<'de> for ImmutableJointTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Option::<JointDocument>::deserialize(deserializer)?;
        Ok(Self::from_document(document))
    }
}

/// Deserialize without serde_json's nesting limit
pub(crate) fn from_json_unbounded<T: DeserializeOwned>(json: &str) -> Result<T, TreeError> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    deserializer.disable_recursion_limit();
    let value = T::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}
