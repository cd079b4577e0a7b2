//! Frame decoding and validation
//!
//! A frame is a JSON array of [`FrameEntry`] objects. Streams of frames arrive
//! either as NDJSON (one frame per line) or as a JSON array of frames.

use serde::Serialize;

use crate::error::{ResolutionError, TreeError};
use crate::path::HierarchyPath;
use crate::tree::JointTree;
use crate::types::{FrameEntry, TranslationMode};

/// Allowed deviation of a rotation's length from 1
pub const UNIT_QUATERNION_TOLERANCE: f32 = 0.05;

/// One frame of tracker output
pub type Frame = Vec<FrameEntry>;

/// Adapter for decoding tracker frames
pub struct FrameAdapter;

impl FrameAdapter {
    /// Parse a single frame (JSON array of entries)
    pub fn parse_frame(json: &str) -> Result<Frame, TreeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a JSON array of frames
    pub fn parse_array(json: &str) -> Result<Vec<Frame>, TreeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse newline-delimited frames, skipping blank lines
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Frame>, TreeError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Frame>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(TreeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Check a single entry for values the tree cannot use
    pub fn validate_entry(entry: &FrameEntry) -> Result<(), TreeError> {
        if entry.name.is_empty() {
            return Err(TreeError::InvalidEntry("joint name is empty".to_string()));
        }

        if HierarchyPath::parse(&entry.name)
            .segments()
            .iter()
            .any(|segment| segment.is_empty())
        {
            return Err(TreeError::InvalidEntry(format!(
                "joint '{}' has an empty path segment",
                entry.name
            )));
        }

        if !entry.translation.is_finite() {
            return Err(TreeError::InvalidEntry(format!(
                "joint '{}' has a non-finite translation",
                entry.name
            )));
        }

        if !entry.rotation.is_finite() {
            return Err(TreeError::InvalidEntry(format!(
                "joint '{}' has a non-finite rotation",
                entry.name
            )));
        }

        let length = entry
            .rotation
            .to_array()
            .iter()
            .map(|c| c * c)
            .sum::<f32>()
            .sqrt();
        if (length - 1.0).abs() > UNIT_QUATERNION_TOLERANCE {
            return Err(TreeError::InvalidEntry(format!(
                "joint '{}' rotation is not a unit quaternion (length {length})",
                entry.name
            )));
        }

        Ok(())
    }

    /// Validate every entry of every frame, including hierarchy resolution
    pub fn validate_frames(frames: &[Frame]) -> Vec<FrameIssue> {
        let mut issues = Vec::new();

        for (frame_index, frame) in frames.iter().enumerate() {
            if frame.is_empty() {
                issues.push(FrameIssue {
                    frame_index,
                    joint: None,
                    error: "frame contains no joints".to_string(),
                });
                continue;
            }

            for entry in frame {
                if let Err(e) = Self::validate_entry(entry) {
                    issues.push(FrameIssue {
                        frame_index,
                        joint: Some(entry.name.clone()),
                        error: e.to_string(),
                    });
                }
            }

            // Building is the only reliable way to find unresolvable ancestors
            let (_, unresolved) = JointTree::from_flat_list(frame, TranslationMode::Relative);
            issues.extend(unresolved.into_iter().map(|e: ResolutionError| FrameIssue {
                frame_index,
                joint: Some(e.entry_name.clone()),
                error: e.to_string(),
            }));
        }

        issues
    }
}

/// A problem found while validating a frame stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameIssue {
    pub frame_index: usize,
    pub joint: Option<String>,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quat, Vec3};

    const FRAME: &str = r#"[
        {"name": "root", "translation": [0.0, 0.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0]},
        {"name": "root/arm", "translation": [0.0, 1.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0]}
    ]"#;

    #[test]
    fn test_parse_frame() {
        let frame = FrameAdapter::parse_frame(FRAME).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1].name, "root/arm");
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let line = FRAME.replace('\n', " ");
        let ndjson = format!("{line}\n\n{line}\n");
        let frames = FrameAdapter::parse_ndjson(&ndjson).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let line = FRAME.replace('\n', " ");
        let ndjson = format!("{line}\nnot json\n");
        let err = FrameAdapter::parse_ndjson(&ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array_of_frames() {
        let json = format!("[{FRAME}, {FRAME}, []]");
        let frames = FrameAdapter::parse_array(&json).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[2].is_empty());
    }

    #[test]
    fn test_validate_entry() {
        assert!(FrameAdapter::validate_entry(&FrameEntry::at("root/arm", Vec3::ZERO)).is_ok());
        assert!(FrameAdapter::validate_entry(&FrameEntry::at("", Vec3::ZERO)).is_err());
        assert!(FrameAdapter::validate_entry(&FrameEntry::at("root//arm", Vec3::ZERO)).is_err());
        assert!(
            FrameAdapter::validate_entry(&FrameEntry::at("root", Vec3::new(f32::NAN, 0.0, 0.0)))
                .is_err()
        );
        assert!(FrameAdapter::validate_entry(&FrameEntry::new(
            "root",
            Vec3::ZERO,
            Quat::new(0.0, 0.0, 0.0, 2.0)
        ))
        .is_err());
    }

    #[test]
    fn test_validate_frames_reports_unresolved_ancestors() {
        let frames = vec![
            FrameAdapter::parse_frame(FRAME).unwrap(),
            vec![
                FrameEntry::at("root", Vec3::ZERO),
                FrameEntry::at("root/arm/hand", Vec3::ZERO),
            ],
            vec![],
        ];
        let issues = FrameAdapter::validate_frames(&frames);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].frame_index, 1);
        assert_eq!(issues[0].joint.as_deref(), Some("root/arm/hand"));
        assert_eq!(issues[1].frame_index, 2);
        assert!(issues[1].joint.is_none());
    }
}
