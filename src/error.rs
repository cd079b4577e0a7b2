//! Error types for Skeleton Flux

use thiserror::Error;

use crate::joint::JointId;

/// A frame entry whose ancestor joint could not be found while building a tree.
///
/// Non-fatal: the entry is dropped and the build carries on with the rest of
/// the frame. A later frame that contains the missing ancestor succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ancestor '{ancestor_name}' for joint with hierarchy '{entry_name}' not found")]
pub struct ResolutionError {
    /// Full hierarchy path of the dropped entry
    pub entry_name: String,
    /// Name of the ancestor that was searched for
    pub ancestor_name: String,
}

/// Errors that can occur while operating on joint trees
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Attaching joint '{child}' under '{parent}' would create a cycle")]
    WouldCreateCycle { parent: String, child: String },

    #[error("Joint '{parent}' already has a different child named '{child}'")]
    DuplicateSibling { parent: String, child: String },

    #[error("Root joint '{0}' cannot be attached under another joint")]
    RootReparent(String),

    #[error("Unknown joint handle: {0}")]
    UnknownJoint(JointId),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse frame: {0}")]
    ParseError(String),

    #[error("Invalid frame entry: {0}")]
    InvalidEntry(String),
}
