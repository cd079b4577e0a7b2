//! Frame processing
//!
//! This module provides the public API for driving a joint tree from a body
//! tracker: the first usable frame builds the tree, every later frame updates
//! it, and snapshots are taken on demand.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encoder::{tree_to_json, SkeletonExport, SnapshotEncoder};
use crate::error::{ResolutionError, TreeError};
use crate::snapshot::ImmutableJointTree;
use crate::tree::JointTree;
use crate::types::{FrameEntry, TranslationMode};

/// Settings for a [`SkeletonTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How frame translations are interpreted
    pub translation_mode: TranslationMode,
    /// Attach joints missing from the live tree once their ancestor appears,
    /// keeping the histories of joints already tracked
    pub attach_late_joints: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            translation_mode: TranslationMode::Absolute,
            attach_late_joints: true,
        }
    }
}

impl TrackerConfig {
    pub fn with_translation_mode(mut self, translation_mode: TranslationMode) -> Self {
        self.translation_mode = translation_mode;
        self
    }

    pub fn with_attach_late_joints(mut self, attach: bool) -> Self {
        self.attach_late_joints = attach;
        self
    }

    /// Load config from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What happened to a frame passed to [`SkeletonTracker::process_frame`]
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The tree was built from the frame
    Built {
        tree_size: usize,
        unresolved: Vec<ResolutionError>,
    },
    /// Existing joints received new samples
    Updated { joints: usize },
    /// Existing joints received new samples and joints missing from the tree
    /// were looked up again
    Extended {
        joints: usize,
        attached: usize,
        unresolved: Vec<ResolutionError>,
    },
    /// Updates are paused; the frame was ignored
    Frozen,
    /// The frame carried no joints and there was nothing to build
    Empty,
}

/// Stateful processor that owns a live joint tree.
///
/// Use this when frames arrive one at a time and snapshots are exported
/// between them.
#[derive(Debug, Clone)]
pub struct SkeletonTracker {
    config: TrackerConfig,
    tree: JointTree,
    encoder: SnapshotEncoder,
    frames_processed: u64,
    unresolved: Vec<ResolutionError>,
}

impl Default for SkeletonTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonTracker {
    /// Create a tracker with default settings (absolute translations)
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            tree: JointTree::new(),
            encoder: SnapshotEncoder::new(),
            frames_processed: 0,
            unresolved: Vec::new(),
        }
    }

    /// Create a tracker with a specific translation mode
    pub fn with_translation_mode(mode: TranslationMode) -> Self {
        Self::with_config(TrackerConfig::default().with_translation_mode(mode))
    }

    /// Feed one frame: build the tree if needed, otherwise update it.
    ///
    /// With `attach_late_joints`, entries the tree does not know yet are
    /// grafted on after the update; the tree is never rebuilt once live.
    pub fn process_frame(&mut self, entries: &[FrameEntry]) -> FrameOutcome {
        if !self.tree.can_update() {
            return FrameOutcome::Frozen;
        }

        let mode = self.config.translation_mode;

        let outcome = if self.tree.is_empty() {
            if entries.is_empty() {
                return FrameOutcome::Empty;
            }

            self.unresolved = self.tree.build_from_flat_list(entries, mode);

            for line in self.tree.describe_bfs() {
                debug!("{line}");
            }

            FrameOutcome::Built {
                tree_size: self.tree.tree_size().unwrap_or(0),
                unresolved: self.unresolved.clone(),
            }
        } else {
            let joints = self.tree.update_joints(entries, mode);

            if self.config.attach_late_joints && joints < entries.len() {
                let before = self.tree.tree_size().unwrap_or(0);
                self.unresolved = self.tree.graft_from_flat_list(entries, mode);
                let attached = self.tree.tree_size().unwrap_or(0).saturating_sub(before);

                FrameOutcome::Extended {
                    joints,
                    attached,
                    unresolved: self.unresolved.clone(),
                }
            } else {
                FrameOutcome::Updated { joints }
            }
        };

        self.frames_processed += 1;
        outcome
    }

    /// Pause or resume frame processing; paused frames are not counted
    pub fn set_paused(&mut self, paused: bool) {
        self.tree.set_can_update(!paused);
    }

    pub fn is_paused(&self) -> bool {
        !self.tree.can_update()
    }

    /// Freeze the tree, take an immutable snapshot, then restore the previous gate
    pub fn snapshot(&mut self) -> ImmutableJointTree {
        let could_update = self.tree.can_update();
        self.tree.set_can_update(false);
        let snapshot = ImmutableJointTree::construct_from(&self.tree);
        self.tree.set_can_update(could_update);
        snapshot
    }

    /// Snapshot wrapped in an export envelope
    pub fn export(&mut self) -> SkeletonExport {
        let snapshot = self.snapshot();
        info!(
            frames = self.frames_processed,
            joints = snapshot.tree_size().unwrap_or(0),
            "Exporting skeleton snapshot"
        );
        self.encoder
            .encode(snapshot, self.frames_processed, self.config.translation_mode)
    }

    /// Export envelope as pretty JSON
    pub fn export_json(&mut self) -> Result<String, TreeError> {
        let export = self.export();
        self.encoder.encode_to_json(&export)
    }

    /// Drop the tree and start over with the next frame
    pub fn reset(&mut self) {
        self.tree = JointTree::new();
        self.unresolved.clear();
        self.frames_processed = 0;
    }

    pub fn tree(&self) -> &JointTree {
        &self.tree
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Entries that could not be placed by the most recent build or graft
    pub fn unresolved(&self) -> &[ResolutionError] {
        &self.unresolved
    }
}

/// Run a sequence of frames through a fresh tracker and snapshot the result
/// (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let snapshot = frames_to_snapshot(&frames, TranslationMode::Absolute);
/// ```
pub fn frames_to_snapshot(
    frames: &[Vec<FrameEntry>],
    mode: TranslationMode,
) -> ImmutableJointTree {
    let mut tracker = SkeletonTracker::with_translation_mode(mode);
    for frame in frames {
        tracker.process_frame(frame);
    }
    tracker.snapshot()
}

/// Same as [`frames_to_snapshot`], encoded as the bare joint document
pub fn frames_to_snapshot_json(
    frames: &[Vec<FrameEntry>],
    mode: TranslationMode,
) -> Result<String, TreeError> {
    tree_to_json(&frames_to_snapshot(frames, mode), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;
    use pretty_assertions::assert_eq;

    fn frame(offset: f32) -> Vec<FrameEntry> {
        vec![
            FrameEntry::at("root", Vec3::new(offset, 0.0, 0.0)),
            FrameEntry::at("root/arm", Vec3::new(offset, 1.0, 0.0)),
            FrameEntry::at("root/arm/hand", Vec3::new(offset, 1.0, 1.0)),
        ]
    }

    #[test]
    fn test_first_frame_builds_then_updates() {
        let mut tracker = SkeletonTracker::new();

        match tracker.process_frame(&frame(0.0)) {
            FrameOutcome::Built { tree_size, unresolved } => {
                assert_eq!(tree_size, 3);
                assert!(unresolved.is_empty());
            }
            other => panic!("expected build, got {other:?}"),
        }

        assert_eq!(tracker.process_frame(&frame(1.0)), FrameOutcome::Updated { joints: 3 });
        assert_eq!(tracker.frames_processed(), 2);
    }

    #[test]
    fn test_empty_first_frame_is_ignored() {
        let mut tracker = SkeletonTracker::new();
        assert_eq!(tracker.process_frame(&[]), FrameOutcome::Empty);
        assert_eq!(tracker.frames_processed(), 0);
        assert!(tracker.tree().is_empty());
    }

    #[test]
    fn test_late_joints_attach_without_rebuild() {
        let mut tracker = SkeletonTracker::new();
        let partial = vec![
            FrameEntry::at("root", Vec3::ZERO),
            FrameEntry::at("root/arm/hand", Vec3::ZERO),
        ];

        tracker.process_frame(&partial);
        assert_eq!(tracker.unresolved().len(), 1);

        assert_eq!(
            tracker.process_frame(&frame(0.0)),
            FrameOutcome::Extended {
                joints: 1,
                attached: 2,
                unresolved: Vec::new(),
            }
        );
        assert!(tracker.unresolved().is_empty());

        let root = tracker.tree().root().unwrap();
        assert_eq!(tracker.tree().joint(root).unwrap().translation_history().len(), 2);
        assert_eq!(tracker.process_frame(&frame(0.0)), FrameOutcome::Updated { joints: 3 });
    }

    #[test]
    fn test_persistent_orphan_does_not_reset_smoothing() {
        let mut tracker = SkeletonTracker::with_translation_mode(TranslationMode::Relative);

        let outcomes: Vec<FrameOutcome> = [0.0, 10.0, 20.0, 30.0, 40.0]
            .into_iter()
            .map(|x| {
                tracker.process_frame(&[
                    FrameEntry::at("root", Vec3::ZERO),
                    FrameEntry::at("root/arm", Vec3::new(x, 0.0, 0.0)),
                    FrameEntry::at("root/ghost/hand", Vec3::ZERO),
                ])
            })
            .collect();

        assert!(matches!(outcomes[0], FrameOutcome::Built { tree_size: 2, .. }));
        for outcome in &outcomes[1..] {
            match outcome {
                FrameOutcome::Extended {
                    joints,
                    attached,
                    unresolved,
                } => {
                    assert_eq!((*joints, *attached, unresolved.len()), (2, 0, 1));
                }
                other => panic!("expected extended update, got {other:?}"),
            }
        }
        assert_eq!(tracker.unresolved().len(), 1);
        assert_eq!(tracker.tree().tree_size(), Some(2));

        let arm = tracker.tree().find("arm").unwrap();
        let joint = tracker.tree().joint(arm).unwrap();
        assert_eq!(joint.translation_history().len(), 5);
        assert_eq!(joint.relative_translation(), Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn test_late_joints_ignored_when_attach_disabled() {
        let config = TrackerConfig::default().with_attach_late_joints(false);
        let mut tracker = SkeletonTracker::with_config(config);
        let partial = vec![
            FrameEntry::at("root", Vec3::ZERO),
            FrameEntry::at("root/arm/hand", Vec3::ZERO),
        ];

        tracker.process_frame(&partial);
        assert_eq!(tracker.process_frame(&frame(0.0)), FrameOutcome::Updated { joints: 1 });
        assert_eq!(tracker.tree().tree_size(), Some(1));
    }

    #[test]
    fn test_paused_tracker_ignores_frames() {
        let mut tracker = SkeletonTracker::with_translation_mode(TranslationMode::Relative);
        tracker.process_frame(&frame(0.0));
        let before = tracker.snapshot();

        tracker.set_paused(true);
        assert!(tracker.is_paused());
        assert_eq!(tracker.process_frame(&frame(5.0)), FrameOutcome::Frozen);
        assert_eq!(tracker.snapshot(), before);

        tracker.set_paused(false);
        assert_eq!(tracker.process_frame(&frame(5.0)), FrameOutcome::Updated { joints: 3 });
        assert_ne!(tracker.snapshot(), before);
    }

    #[test]
    fn test_snapshot_restores_gate() {
        let mut tracker = SkeletonTracker::new();
        tracker.process_frame(&frame(0.0));

        tracker.snapshot();
        assert!(!tracker.is_paused());

        tracker.set_paused(true);
        tracker.snapshot();
        assert!(tracker.is_paused());
    }

    #[test]
    fn test_export_envelope() {
        let mut tracker = SkeletonTracker::new();
        tracker.process_frame(&frame(0.0));
        tracker.process_frame(&frame(0.5));

        let export = tracker.export();
        assert_eq!(export.frames_processed, 2);
        assert_eq!(export.tree_size, Some(3));
        assert_eq!(export.translation_mode, TranslationMode::Absolute);

        let json = tracker.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["skeleton"]["children"][0]["children"][0]["name"], "hand");
    }

    #[test]
    fn test_reset() {
        let mut tracker = SkeletonTracker::new();
        tracker.process_frame(&frame(0.0));
        tracker.reset();

        assert!(tracker.tree().is_empty());
        assert_eq!(tracker.frames_processed(), 0);
        assert!(matches!(tracker.process_frame(&frame(0.0)), FrameOutcome::Built { .. }));
    }

    #[test]
    fn test_frames_to_snapshot_smooths_across_frames() {
        let frames: Vec<Vec<FrameEntry>> = (0..3).map(|i| frame(i as f32)).collect();
        let snapshot = frames_to_snapshot(&frames, TranslationMode::Relative);

        let root = snapshot.root().unwrap();
        let joint = snapshot.joint(root).unwrap();
        assert_eq!(joint.relative_translation(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_frames_to_snapshot_json_empty() {
        let json = frames_to_snapshot_json(&[], TranslationMode::Absolute).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn test_config_json() {
        let config = TrackerConfig::from_json(r#"{"translation_mode":"relative"}"#).unwrap();
        assert_eq!(config.translation_mode, TranslationMode::Relative);
        assert!(config.attach_late_joints);

        let back = TrackerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
