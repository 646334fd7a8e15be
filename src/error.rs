//! Engine errors.
//!
//! Every failure is recoverable: an operation that errors leaves the record
//! store, the item table, and the working tree exactly as they were, so the
//! caller can correct the input and retry.

use thiserror::Error;

use crate::model::change::ChangeKind;
use crate::model::ident::ItemId;
use crate::model::path::{PathError, SandboxPath};
use crate::tree::TreeError;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors surfaced by sandbox operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested operation cannot merge with the item's pending change.
    #[error("conflicting change at '{path}': {}", conflict_detail(existing.as_ref(), requested))]
    ConflictingChange {
        /// Working path the operation addressed.
        path: SandboxPath,
        /// Kind of the change already pending, if any.
        existing: Option<ChangeKind>,
        /// Label of the rejected operation.
        requested: &'static str,
    },

    /// No item or pending change exists where one was required.
    #[error("nothing to do at '{path}': no such item or pending change")]
    NotFound {
        /// The path that failed to resolve.
        path: SandboxPath,
    },

    /// The destination is occupied by a different item.
    #[error("path conflict at '{path}': destination is already occupied")]
    PathConflict {
        /// The contested destination path.
        path: SandboxPath,
    },

    /// A folder cannot be moved beneath its own subtree.
    #[error("cannot move '{path}' beneath its own subtree at '{destination}'")]
    Cycle {
        /// The folder being moved.
        path: SandboxPath,
        /// The offending destination.
        destination: SandboxPath,
    },

    /// A path string failed validation.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// Commit or rollback addressed an item with no pending change.
    #[error("no pending change for item {item}")]
    NothingPending {
        /// The item addressed.
        item: ItemId,
    },

    /// Internal bookkeeping lost track of an item. This is a defect in the
    /// engine, reported as an error rather than a panic.
    #[error("item {item} is detached from the tree")]
    Detached {
        /// The detached item.
        item: ItemId,
    },

    /// A change summary could not be serialized.
    #[error("could not serialize pending changes: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The working tree failed underneath the engine. The pending record
    /// involved is left in place and the operation can be retried.
    #[error("working tree failure: {0}")]
    Tree(#[from] TreeError),
}

fn conflict_detail(existing: Option<&ChangeKind>, requested: &str) -> String {
    match existing {
        Some(kind) => format!("cannot {requested} while a {kind} change is pending"),
        None => format!("cannot {requested} in the item's current state"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> SandboxPath {
        SandboxPath::parse(s).unwrap()
    }

    #[test]
    fn conflicting_change_names_both_sides() {
        let err = EngineError::ConflictingChange {
            path: path("a/b.txt"),
            existing: Some(ChangeKind::Delete),
            requested: "edit",
        };
        let msg = err.to_string();
        assert!(msg.contains("a/b.txt"), "got: {msg}");
        assert!(msg.contains("delete"), "got: {msg}");
        assert!(msg.contains("edit"), "got: {msg}");
    }

    #[test]
    fn path_conflict_names_the_destination() {
        let err = EngineError::PathConflict { path: path("x/y") };
        assert!(err.to_string().contains("x/y"));
    }

    #[test]
    fn tree_errors_pass_through() {
        let err = EngineError::from(TreeError::ReadOnly { path: path("f.txt") });
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn invalid_path_passes_through() {
        let parse_err = SandboxPath::parse("/abs").unwrap_err();
        let err = EngineError::from(parse_err);
        assert!(err.to_string().contains("relative"));
    }
}
