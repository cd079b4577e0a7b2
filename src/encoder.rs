//! Snapshot encoding
//!
//! This module turns immutable snapshots into exportable JSON. The bare tree
//! document can be written on its own, or wrapped in a [`SkeletonExport`]
//! envelope that records who produced it and when.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TreeError;
use crate::snapshot::{from_json_unbounded, ImmutableJointTree};
use crate::types::TranslationMode;
use crate::{PRODUCER_NAME, VERSION};

/// Current export envelope version
pub const EXPORT_VERSION: &str = "1.0.0";

/// Producer metadata embedded in every export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A snapshot together with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonExport {
    pub export_version: String,
    pub producer: ExportProducer,
    /// RFC 3339 timestamp of when the snapshot was taken
    pub captured_at_utc: String,
    /// Frames fed to the tree before the snapshot
    pub frames_processed: u64,
    pub translation_mode: TranslationMode,
    pub tree_size: Option<usize>,
    /// Nested joint document, `null` when the tree was empty
    pub skeleton: ImmutableJointTree,
}

impl SkeletonExport {
    /// Read an envelope back, however deep its skeleton is
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        from_json_unbounded(json)
    }
}

/// Encoder for producing export payloads
#[derive(Debug, Clone)]
pub struct SnapshotEncoder {
    instance_id: String,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap a snapshot in an export envelope stamped with the current time
    pub fn encode(
        &self,
        skeleton: ImmutableJointTree,
        frames_processed: u64,
        translation_mode: TranslationMode,
    ) -> SkeletonExport {
        SkeletonExport {
            export_version: EXPORT_VERSION.to_string(),
            producer: ExportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            captured_at_utc: Utc::now().to_rfc3339(),
            frames_processed,
            translation_mode,
            tree_size: skeleton.tree_size(),
            skeleton,
        }
    }

    /// Encode an export envelope to pretty JSON
    pub fn encode_to_json(&self, export: &SkeletonExport) -> Result<String, TreeError> {
        serde_json::to_string_pretty(export).map_err(TreeError::Json)
    }
}

/// Serialize just the joint document of a snapshot
pub fn tree_to_json(skeleton: &ImmutableJointTree, pretty: bool) -> Result<String, TreeError> {
    let json = if pretty {
        serde_json::to_string_pretty(skeleton)?
    } else {
        serde_json::to_string(skeleton)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::JointTree;
    use crate::types::{FrameEntry, Vec3};
    use pretty_assertions::assert_eq;

    fn snapshot() -> ImmutableJointTree {
        let frame = vec![
            FrameEntry::at("root", Vec3::ZERO),
            FrameEntry::at("root/arm", Vec3::new(0.0, 1.0, 0.0)),
        ];
        let (tree, _) = JointTree::from_flat_list(&frame, TranslationMode::Absolute);
        ImmutableJointTree::construct_from(&tree)
    }

    #[test]
    fn test_encode_envelope() {
        let encoder = SnapshotEncoder::with_instance_id("test-instance".to_string());
        let export = encoder.encode(snapshot(), 12, TranslationMode::Absolute);

        assert_eq!(export.export_version, EXPORT_VERSION);
        assert_eq!(export.producer.name, PRODUCER_NAME);
        assert_eq!(export.producer.instance_id, "test-instance");
        assert_eq!(export.frames_processed, 12);
        assert_eq!(export.tree_size, Some(2));
        assert!(chrono::DateTime::parse_from_rfc3339(&export.captured_at_utc).is_ok());
    }

    #[test]
    fn test_envelope_json_round_trip() {
        let encoder = SnapshotEncoder::new();
        let export = encoder.encode(snapshot(), 1, TranslationMode::Relative);
        let json = encoder.encode_to_json(&export).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["translation_mode"], "relative");
        assert_eq!(value["skeleton"]["name"], "root");
        assert_eq!(value["skeleton"]["children"][0]["name"], "arm");

        let parsed = SkeletonExport::from_json(&json).unwrap();
        assert_eq!(parsed, export);
    }

    #[test]
    fn test_empty_tree_envelope() {
        let encoder = SnapshotEncoder::new();
        let export = encoder.encode(ImmutableJointTree::empty(), 0, TranslationMode::Absolute);
        let value = serde_json::to_value(&export).unwrap();

        assert!(value["skeleton"].is_null());
        assert!(value["tree_size"].is_null());
    }

    #[test]
    fn test_unique_instance_ids() {
        assert_ne!(SnapshotEncoder::new().instance_id(), SnapshotEncoder::new().instance_id());
    }

    #[test]
    fn test_tree_to_json_compact() {
        let json = tree_to_json(&snapshot(), false).unwrap();
        assert!(json.starts_with("{\"name\":\"root\""));
        assert!(!json.contains('\n'));
    }
}
