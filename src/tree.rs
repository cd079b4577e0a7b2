//! Joint tree
//!
//! [`JointTree`] owns every joint of a tracked skeleton in a flat arena and
//! rebuilds the parent/child hierarchy from the path-encoded names a body
//! tracker reports. Every frame then flows through [`JointTree::update_joints`],
//! which pushes new samples into each joint's smoothing window.
//!
//! Lifecycle: empty → built (`build_from_flat_list`) → live (`update_joints`
//! while `can_update`) ⇄ frozen (`can_update == false` while a snapshot is
//! taken).

use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

use crate::error::{ResolutionError, TreeError};
use crate::joint::{Joint, JointId};
use crate::path::HierarchyPath;
use crate::types::{FrameEntry, Quat, TranslationMode, Vec3};

/// A tree representing a skeleton's joints
#[derive(Debug, Clone)]
pub struct JointTree {
    joints: Vec<Joint>,
    root: Option<JointId>,
    can_update: bool,
}

impl Default for JointTree {
    fn default() -> Self {
        Self::new()
    }
}

impl JointTree {
    /// Create an empty tree with no root
    pub fn new() -> Self {
        Self {
            joints: Vec::new(),
            root: None,
            can_update: true,
        }
    }

    /// Create a tree holding a single root joint
    pub fn with_root(entry: &FrameEntry) -> Self {
        let mut tree = Self::new();
        let root = tree.insert_joint(entry.name.clone(), entry.translation, entry.rotation);
        tree.root = Some(root);
        tree
    }

    /// Build a tree from one frame, returning it with any unresolved entries
    pub fn from_flat_list(
        entries: &[FrameEntry],
        mode: TranslationMode,
    ) -> (Self, Vec<ResolutionError>) {
        let mut tree = Self::new();
        let unresolved = tree.build_from_flat_list(entries, mode);
        (tree, unresolved)
    }

    /// Rebuild the hierarchy from a flat frame.
    ///
    /// Entries are processed shallowest first, so the input order does not
    /// matter. The shallowest entry becomes the root. An entry naming a joint
    /// that already exists under the same ancestor is folded into that joint's
    /// history. Entries whose ancestor cannot be found are skipped and returned.
    pub fn build_from_flat_list(
        &mut self,
        entries: &[FrameEntry],
        mode: TranslationMode,
    ) -> Vec<ResolutionError> {
        self.joints.clear();
        self.root = None;

        let mut ordered = Self::depth_ordered(entries).into_iter();

        let Some((root_path, root_entry)) = ordered.next() else {
            warn!("Cannot build joint tree from an empty frame");
            return Vec::new();
        };

        let root_name = root_path.first().to_string();
        let root = self.insert_joint(
            root_name.clone(),
            root_entry.translation,
            root_entry.rotation,
        );
        self.root = Some(root);

        let mut unresolved = Vec::new();

        for (path, entry) in ordered {
            let ancestor_name = path.ancestor_name(&root_name);

            let Some(ancestor) = self.find_self_or_descendant(root, ancestor_name) else {
                let error = ResolutionError {
                    entry_name: entry.name.clone(),
                    ancestor_name: ancestor_name.to_string(),
                };
                warn!(%error, "Error creating joint tree");
                unresolved.push(error);
                continue;
            };

            let leaf = path.leaf();
            let translation = self.relative_to(Some(ancestor), entry.translation, mode);

            if let Some(existing) = self.find_child(ancestor, leaf) {
                debug!(hierarchy = %entry.name, "Repeated joint found, folding into history");
                self.joints[existing.0].push_sample(translation, entry.rotation);
            } else {
                let child = self.insert_joint(leaf, translation, entry.rotation);
                self.attach(ancestor, child);
            }
        }

        info!(
            root = %root_name,
            joints = self.tree_size().unwrap_or(0),
            unresolved = unresolved.len(),
            mode = mode.as_str(),
            "Joint tree created"
        );

        unresolved
    }

    /// Attach entries of a frame that are not yet part of the tree.
    ///
    /// Existing joints and their histories are left alone, so this pairs with
    /// [`update_joints`](Self::update_joints) to let joints dropped by an
    /// earlier build join once their ancestor shows up. Builds from scratch
    /// when the tree is empty. Returns the entries that still cannot be placed.
    pub fn graft_from_flat_list(
        &mut self,
        entries: &[FrameEntry],
        mode: TranslationMode,
    ) -> Vec<ResolutionError> {
        let Some(root) = self.root else {
            return self.build_from_flat_list(entries, mode);
        };

        let root_name = self.joints[root.0].name().to_string();
        let mut attached = 0;
        let mut unresolved = Vec::new();

        for (path, entry) in Self::depth_ordered(entries) {
            if self.find_self_or_descendant(root, path.leaf()).is_some() {
                continue;
            }

            let ancestor_name = path.ancestor_name(&root_name);
            let Some(ancestor) = self.find_self_or_descendant(root, ancestor_name) else {
                let error = ResolutionError {
                    entry_name: entry.name.clone(),
                    ancestor_name: ancestor_name.to_string(),
                };
                debug!(%error, "Joint still unresolved");
                unresolved.push(error);
                continue;
            };

            let translation = self.relative_to(Some(ancestor), entry.translation, mode);
            let child = self.insert_joint(path.leaf(), translation, entry.rotation);
            self.attach(ancestor, child);
            attached += 1;
        }

        if attached > 0 {
            info!(
                attached,
                joints = self.tree_size().unwrap_or(0),
                unresolved = unresolved.len(),
                "Late joints attached"
            );
        }

        unresolved
    }

    /// Push one frame of samples into the existing joints.
    ///
    /// Does nothing while updates are paused. Entries are matched by their leaf
    /// name; unknown joints are skipped and never inserted. Returns the number
    /// of joints that received a sample.
    pub fn update_joints(&mut self, entries: &[FrameEntry], mode: TranslationMode) -> usize {
        if !self.can_update {
            trace!("Joint tree is frozen, skipping update");
            return 0;
        }

        let Some(root) = self.root else {
            return 0;
        };

        let mut updated = 0;
        for (path, entry) in Self::depth_ordered(entries) {
            match self.find_self_or_descendant(root, path.leaf()) {
                Some(id) => {
                    self.apply_sample(id, entry.translation, entry.rotation, mode);
                    updated += 1;
                }
                None => trace!(hierarchy = %entry.name, "Skipping update for unknown joint"),
            }
        }

        updated
    }

    /// Whether `update_joints` currently applies samples
    pub fn can_update(&self) -> bool {
        self.can_update
    }

    /// Pause (`false`) or resume (`true`) frame updates.
    ///
    /// This is a cooperative flag for a single driver, not a lock.
    pub fn set_can_update(&mut self, can_update: bool) {
        self.can_update = can_update;
    }

    // ------------------------------------------------------------------
    // Joint operations
    // ------------------------------------------------------------------

    /// Create a detached joint in this tree's arena, seeded with one sample
    pub fn insert_joint(
        &mut self,
        name: impl Into<String>,
        translation: Vec3,
        rotation: Quat,
    ) -> JointId {
        let id = JointId(self.joints.len());
        self.joints.push(Joint::new(name, translation, rotation));
        id
    }

    /// Push a new sample into a joint.
    ///
    /// In absolute mode the stored translation is `translation` minus the
    /// parent's current (already smoothed) absolute translation, so smoothing
    /// error compounds with depth.
    pub fn update(
        &mut self,
        id: JointId,
        translation: Vec3,
        rotation: Quat,
        mode: TranslationMode,
    ) -> Result<(), TreeError> {
        self.check(id)?;
        self.apply_sample(id, translation, rotation, mode);
        Ok(())
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    ///
    /// A joint name therefore appears as a child in at most one place.
    pub fn add_child(&mut self, parent: JointId, child: JointId) -> Result<(), TreeError> {
        self.check(parent)?;
        self.check(child)?;

        let child_name = self.joints[child.0].name().to_string();
        let parent_name = self.joints[parent.0].name().to_string();

        if self.root == Some(child) {
            return Err(TreeError::RootReparent(child_name));
        }

        if self.is_self_or_ancestor(child, parent) {
            return Err(TreeError::WouldCreateCycle {
                parent: parent_name,
                child: child_name,
            });
        }

        if let Some(existing) = self.find_child(parent, &child_name) {
            if existing != child {
                return Err(TreeError::DuplicateSibling {
                    parent: parent_name,
                    child: child_name,
                });
            }
        }

        self.attach(parent, child);
        Ok(())
    }

    /// First direct child of `id` with the given name
    pub fn find_child(&self, id: JointId, name: &str) -> Option<JointId> {
        self.joint(id)?
            .children
            .iter()
            .copied()
            .find(|child| self.joints[child.0].name() == name)
    }

    /// Depth-first search below `id`: direct children first, then each child's
    /// subtree in declaration order
    pub fn find_descendant(&self, id: JointId, name: &str) -> Option<JointId> {
        if let Some(child) = self.find_child(id, name) {
            return Some(child);
        }

        self.joint(id)?
            .children
            .iter()
            .find_map(|&child| self.find_descendant(child, name))
    }

    /// `id` itself if it carries `name`, otherwise [`find_descendant`](Self::find_descendant)
    pub fn find_self_or_descendant(&self, id: JointId, name: &str) -> Option<JointId> {
        if self.joint(id)?.name() == name {
            return Some(id);
        }
        self.find_descendant(id, name)
    }

    /// Look a joint up by name starting at the root
    pub fn find(&self, name: &str) -> Option<JointId> {
        self.find_self_or_descendant(self.root?, name)
    }

    /// Structural comparison of the subtree at `id` against `other_id` in `other`.
    ///
    /// Children are matched by name, so sibling order does not matter. Joint
    /// values are ignored.
    pub fn is_equivalent(&self, id: JointId, other: &JointTree, other_id: JointId) -> bool {
        let (Some(joint), Some(other_joint)) = (self.joint(id), other.joint(other_id)) else {
            return false;
        };

        if joint.children.len() != other_joint.children.len() {
            return false;
        }

        joint.children.iter().all(|&child| {
            let name = self.joints[child.0].name();
            match other.find_child(other_id, name) {
                Some(other_child) => self.is_equivalent(child, other, other_child),
                None => false,
            }
        })
    }

    /// Copy the joint at `id` into a new tree where it is the root.
    ///
    /// The copy carries the current smoothed values as single-sample histories.
    pub fn copy_joint(&self, id: JointId, with_children: bool) -> Result<JointTree, TreeError> {
        self.check(id)?;
        let mut copy = JointTree::new();
        let root = copy.copy_from(self, id, with_children);
        copy.root = Some(root);
        Ok(copy)
    }

    // ------------------------------------------------------------------
    // Whole-tree operations
    // ------------------------------------------------------------------

    /// True when both trees have a root, the same size, and the same shape
    pub fn structural_equivalence(&self, other: &JointTree) -> bool {
        let (Some(root), Some(other_root)) = (self.root, other.root) else {
            return false;
        };

        if self.tree_size() != other.tree_size() {
            return false;
        }

        self.is_equivalent(root, other, other_root)
    }

    /// Independent copy of the whole tree with collapsed histories
    pub fn deep_copy(&self) -> JointTree {
        match self.root {
            Some(root) => {
                let mut copy = JointTree::new();
                let new_root = copy.copy_from(self, root, true);
                copy.root = Some(new_root);
                copy
            }
            None => JointTree::new(),
        }
    }

    /// Level-order walk from the root, children in declaration order
    pub fn traverse_bfs(&self) -> Bfs<'_> {
        Bfs::new(self, self.root)
    }

    /// Level-order walk of the subtree at `id`
    pub fn traverse_bfs_from(&self, id: JointId) -> Bfs<'_> {
        Bfs::new(self, self.joint(id).map(|_| id))
    }

    /// One `name | absolute: [x, y, z]` line per joint, in BFS order
    pub fn describe_bfs(&self) -> Vec<String> {
        self.traverse_bfs()
            .map(|id| {
                format!(
                    "{} | absolute: {}",
                    self.joints[id.0].name(),
                    self.absolute_translation_of(id)
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn root(&self) -> Option<JointId> {
        self.root
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0)
    }

    /// Number of joints in the tree, `None` without a root
    pub fn tree_size(&self) -> Option<usize> {
        self.root.map(|root| self.descendant_count_of(root) + 1)
    }

    /// Number of joints in the arena, including detached ones
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// True when the tree has no root
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn name(&self, id: JointId) -> Option<&str> {
        self.joint(id).map(Joint::name)
    }

    pub fn parent(&self, id: JointId) -> Option<JointId> {
        self.joint(id)?.parent
    }

    pub fn children(&self, id: JointId) -> &[JointId] {
        self.joint(id).map(Joint::children).unwrap_or_default()
    }

    pub fn relative_translation(&self, id: JointId) -> Option<Vec3> {
        self.joint(id).map(Joint::relative_translation)
    }

    /// Relative translation accumulated over every ancestor
    pub fn absolute_translation(&self, id: JointId) -> Option<Vec3> {
        self.joint(id)?;
        Some(self.absolute_translation_of(id))
    }

    pub fn rotation(&self, id: JointId) -> Option<Quat> {
        self.joint(id).map(Joint::rotation)
    }

    /// Number of joints below `id`
    pub fn descendant_count(&self, id: JointId) -> Option<usize> {
        self.joint(id)?;
        Some(self.descendant_count_of(id))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check(&self, id: JointId) -> Result<(), TreeError> {
        match self.joints.get(id.0) {
            Some(_) => Ok(()),
            None => Err(TreeError::UnknownJoint(id)),
        }
    }

    /// Entries paired with their parsed paths, stably sorted by depth
    fn depth_ordered(entries: &[FrameEntry]) -> Vec<(HierarchyPath<'_>, &FrameEntry)> {
        let mut ordered: Vec<_> = entries
            .iter()
            .map(|entry| (HierarchyPath::parse(&entry.name), entry))
            .collect();
        ordered.sort_by_key(|(path, _)| path.depth());
        ordered
    }

    fn relative_to(
        &self,
        parent: Option<JointId>,
        translation: Vec3,
        mode: TranslationMode,
    ) -> Vec3 {
        match (mode, parent) {
            (TranslationMode::Absolute, Some(parent)) => {
                translation - self.absolute_translation_of(parent)
            }
            _ => translation,
        }
    }

    fn apply_sample(
        &mut self,
        id: JointId,
        translation: Vec3,
        rotation: Quat,
        mode: TranslationMode,
    ) {
        let relative = self.relative_to(self.joints[id.0].parent, translation, mode);
        self.joints[id.0].push_sample(relative, rotation);
    }

    fn absolute_translation_of(&self, id: JointId) -> Vec3 {
        let mut chain = vec![id];
        let mut current = self.joints[id.0].parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.joints[parent.0].parent;
        }

        // Accumulate root first: parent absolute + own relative at every level
        chain
            .iter()
            .rev()
            .fold(Vec3::ZERO, |acc, joint| acc + self.joints[joint.0].relative_translation())
    }

    fn descendant_count_of(&self, id: JointId) -> usize {
        self.joints[id.0]
            .children
            .iter()
            .map(|&child| 1 + self.descendant_count_of(child))
            .sum()
    }

    /// True when `candidate` is `id` or one of its ancestors
    fn is_self_or_ancestor(&self, candidate: JointId, id: JointId) -> bool {
        let mut current = Some(id);
        while let Some(joint) = current {
            if joint == candidate {
                return true;
            }
            current = self.joints[joint.0].parent;
        }
        false
    }

    fn attach(&mut self, parent: JointId, child: JointId) {
        if let Some(old_parent) = self.joints[child.0].parent {
            let name = self.joints[child.0].name().to_string();
            let siblings = std::mem::take(&mut self.joints[old_parent.0].children);
            self.joints[old_parent.0].children = siblings
                .into_iter()
                .filter(|sibling| self.joints[sibling.0].name() != name)
                .collect();
        }

        self.joints[parent.0].children.push(child);
        self.joints[child.0].parent = Some(parent);
    }

    fn copy_from(&mut self, source: &JointTree, id: JointId, with_children: bool) -> JointId {
        let joint = &source.joints[id.0];
        let copy = self.insert_joint(joint.name(), joint.relative_translation(), joint.rotation());

        if with_children {
            for &child in &joint.children {
                let child_copy = self.copy_from(source, child, true);
                self.attach(copy, child_copy);
            }
        }

        copy
    }
}

/// Lazy breadth-first iterator over the joints of a [`JointTree`]
#[derive(Debug, Clone)]
pub struct Bfs<'a> {
    tree: &'a JointTree,
    queue: VecDeque<JointId>,
}

impl<'a> Bfs<'a> {
    fn new(tree: &'a JointTree, start: Option<JointId>) -> Self {
        Self {
            tree,
            queue: start.into_iter().collect(),
        }
    }
}

impl Iterator for Bfs<'_> {
    type Item = JointId;

    fn next(&mut self) -> Option<JointId> {
        let id = self.queue.pop_front()?;
        self.queue.extend(self.tree.joints[id.0].children.iter().copied());
        Some(id)
    }
}
