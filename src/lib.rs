//! Skeleton Flux - Live joint hierarchy for body-tracking frames
//!
//! Flux turns the flat, path-named joint transforms a body tracker reports each
//! frame into a smoothed parent/child joint tree: path parsing → hierarchy
//! build → per-frame smoothing → immutable snapshot → JSON export.
//!
//! ## Modules
//!
//! - **Tree**: [`JointTree`] builds and updates the hierarchy, with a five-sample
//!   moving average per joint
//! - **Snapshot**: [`ImmutableJointTree`] freezes the live tree for export
//! - **Pipeline**: [`SkeletonTracker`] drives a tree frame by frame

pub mod encoder;
pub mod error;
pub mod frame;
pub mod joint;
pub mod path;
pub mod pipeline;
pub mod smoothing;
pub mod snapshot;
pub mod tree;
pub mod types;

pub use encoder::{SkeletonExport, SnapshotEncoder};
pub use error::{ResolutionError, TreeError};
pub use frame::{Frame, FrameAdapter};
pub use joint::{Joint, JointId};
pub use pipeline::{
    frames_to_snapshot, frames_to_snapshot_json, FrameOutcome, SkeletonTracker, TrackerConfig,
};
pub use snapshot::{FrozenJointId, ImmutableJoint, ImmutableJointTree};
pub use tree::JointTree;
pub use types::{FrameEntry, Quat, TranslationMode, Vec3};

/// Crate version embedded in every export
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exports
pub const PRODUCER_NAME: &str = "skeleton-flux";
