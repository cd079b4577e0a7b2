//! Joint model
//!
//! A joint is one node of the skeleton tree. Joints live in the arena owned by
//! their [`JointTree`](crate::tree::JointTree) and refer to each other through
//! [`JointId`] handles: children are owned by the tree, the parent handle is
//! only an observer link.

use std::fmt;

use crate::smoothing::SmoothingBuffer;
use crate::types::{Quat, Vec3};

/// Handle to a joint inside the arena of the tree that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub(crate) usize);

impl JointId {
    /// Position of the joint in its tree's arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single joint with smoothed translation and rotation histories
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    name: String,
    translation_history: SmoothingBuffer<3>,
    rotation_history: SmoothingBuffer<4>,
    pub(crate) children: Vec<JointId>,
    pub(crate) parent: Option<JointId>,
}

impl Joint {
    /// Create a detached joint seeded with one translation and rotation sample
    pub(crate) fn new(name: impl Into<String>, translation: Vec3, rotation: Quat) -> Self {
        Self {
            name: name.into(),
            translation_history: SmoothingBuffer::new(translation.to_array()),
            rotation_history: SmoothingBuffer::new(rotation.to_array()),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Children in insertion order
    pub fn children(&self) -> &[JointId] {
        &self.children
    }

    pub fn parent(&self) -> Option<JointId> {
        self.parent
    }

    /// Smoothed translation relative to the parent joint
    pub fn relative_translation(&self) -> Vec3 {
        Vec3::from(self.translation_history.mean())
    }

    /// Smoothed rotation (component-wise mean, not re-normalized)
    pub fn rotation(&self) -> Quat {
        Quat::from(self.rotation_history.mean())
    }

    pub fn translation_history(&self) -> &SmoothingBuffer<3> {
        &self.translation_history
    }

    pub fn rotation_history(&self) -> &SmoothingBuffer<4> {
        &self.rotation_history
    }

    /// Push a new sample pair; `relative_translation` must already be parent-relative
    pub(crate) fn push_sample(&mut self, relative_translation: Vec3, rotation: Quat) {
        self.translation_history.push(relative_translation.to_array());
        self.rotation_history.push(rotation.to_array());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_joint_is_detached_and_seeded() {
        let joint = Joint::new("arm", Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        assert_eq!(joint.name(), "arm");
        assert!(joint.parent().is_none());
        assert!(joint.children().is_empty());
        assert_eq!(joint.translation_history().len(), 1);
        assert_eq!(joint.relative_translation(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(joint.rotation(), Quat::IDENTITY);
    }

    #[test]
    fn test_push_sample_smooths_both_channels() {
        let mut joint = Joint::new("arm", Vec3::ZERO, Quat::new(0.0, 0.0, 0.0, 1.0));
        joint.push_sample(Vec3::new(2.0, 2.0, 2.0), Quat::new(1.0, 0.0, 0.0, 0.0));

        assert_eq!(joint.relative_translation(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(joint.rotation(), Quat::new(0.5, 0.0, 0.0, 0.5));
    }
}
