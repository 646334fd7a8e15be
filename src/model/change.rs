//! Pending-change records and the record-merge algebra.
//!
//! At most one [`PendingChange`] exists per item. A local operation on an
//! item that already carries a record does not stack a second record; it
//! *merges* into the existing one so the record always describes the net
//! difference between the committed state and the working tree:
//!
//! - editing a pending add stays an add (with fresh content),
//! - renaming an edited file becomes a combined relocate-and-edit,
//! - renaming an item back to its committed placement cancels the record,
//! - deleting an item that was never committed removes the record outright,
//! - anything after a pending delete is a conflict.
//!
//! The record variants are deliberately minimal: a record stores only what
//! the committed side does not already know. Rename and move are a single
//! [`PendingChange::Relocate`] family; [`ChangeKind`] re-derives the
//! fine-grained kind for display and queries.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::blob::ContentDigest;
use super::item::{Item, Placement};

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// The displayed kind of a pending change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Scheduled for addition.
    Add,
    /// Scheduled for deletion.
    Delete,
    /// New name, same parent folder.
    Rename,
    /// New parent folder (name possibly new as well).
    Move,
    /// Content changed in place.
    Edit,
    /// Placement and content both changed.
    RenameAndEdit,
    /// Present locally but not under version control.
    Unversioned,
}

impl ChangeKind {
    /// Return `true` for the rename/move family (including combined edits).
    #[must_use]
    pub const fn is_renamed_or_moved(self) -> bool {
        matches!(self, Self::Rename | Self::Move | Self::RenameAndEdit)
    }

    /// Return `true` if the change carries modified content.
    #[must_use]
    pub const fn is_modification(self) -> bool {
        matches!(self, Self::Edit | Self::RenameAndEdit)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "delete"),
            Self::Rename => write!(f, "rename"),
            Self::Move => write!(f, "move"),
            Self::Edit => write!(f, "edit"),
            Self::RenameAndEdit => write!(f, "rename, edit"),
            Self::Unversioned => write!(f, "unversioned"),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentEdit
// ---------------------------------------------------------------------------

/// Digest pair for an in-place content change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEdit {
    /// Digest of the committed content.
    pub base: ContentDigest,
    /// Digest of the current working content.
    pub working: ContentDigest,
}

// ---------------------------------------------------------------------------
// PendingChange
// ---------------------------------------------------------------------------

/// The net uncommitted difference for one item.
///
/// Placements are id-anchored, so a recorded destination survives any number
/// of uncommitted ancestor renames. `source` fields repeat the committed
/// placement so a serialized record is self-describing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PendingChange {
    /// Scheduled for addition; the item has no committed placement yet.
    Add {
        /// Where the item will live once committed.
        destination: Placement,
        /// Digest of the working content (files only).
        content: Option<ContentDigest>,
    },
    /// Present in the working tree, neither versioned nor scheduled.
    Unversioned {
        /// Where the item currently sits.
        destination: Placement,
    },
    /// Content changed in place; placement untouched.
    Edit {
        /// Before/after digests.
        edit: ContentEdit,
    },
    /// Renamed and/or moved, content possibly changed as well.
    Relocate {
        /// The committed placement being vacated.
        source: Placement,
        /// The pending placement.
        destination: Placement,
        /// `Some` when the content was also edited.
        edit: Option<ContentEdit>,
    },
    /// Scheduled for deletion.
    Delete {
        /// The committed placement being vacated.
        source: Placement,
    },
}

impl PendingChange {
    /// Derive the displayed [`ChangeKind`].
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Add { .. } => ChangeKind::Add,
            Self::Unversioned { .. } => ChangeKind::Unversioned,
            Self::Edit { .. } => ChangeKind::Edit,
            Self::Relocate { source, destination, edit } => {
                if edit.is_some() {
                    ChangeKind::RenameAndEdit
                } else if source.parent == destination.parent {
                    ChangeKind::Rename
                } else {
                    ChangeKind::Move
                }
            }
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// The pending placement, if this record carries one.
    ///
    /// Add, Unversioned, and Relocate records position the item; Edit leaves
    /// the committed placement in force and Delete removes the item from the
    /// working tree entirely.
    #[must_use]
    pub const fn destination(&self) -> Option<&Placement> {
        match self {
            Self::Add { destination, .. }
            | Self::Unversioned { destination }
            | Self::Relocate { destination, .. } => Some(destination),
            Self::Edit { .. } | Self::Delete { .. } => None,
        }
    }

    /// The committed placement this record vacates, if any.
    #[must_use]
    pub const fn source(&self) -> Option<&Placement> {
        match self {
            Self::Relocate { source, .. } | Self::Delete { source } => Some(source),
            Self::Add { .. } | Self::Unversioned { .. } | Self::Edit { .. } => None,
        }
    }

    /// Return `true` if the working content differs from (or does not exist
    /// in) the committed state. For files this is exactly "checked out for
    /// edit": the working copy is writable while this holds.
    #[must_use]
    pub const fn is_content_bearing(&self) -> bool {
        match self {
            Self::Add { .. } | Self::Unversioned { .. } | Self::Edit { .. } => true,
            Self::Relocate { edit, .. } => edit.is_some(),
            Self::Delete { .. } => false,
        }
    }

    /// Digest the working-tree content is expected to match, if tracked.
    #[must_use]
    pub const fn working_digest(&self) -> Option<ContentDigest> {
        match self {
            Self::Add { content, .. } => *content,
            Self::Edit { edit } => Some(edit.working),
            Self::Relocate { edit: Some(e), .. } => Some(e.working),
            Self::Relocate { edit: None, .. }
            | Self::Unversioned { .. }
            | Self::Delete { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LocalOp
// ---------------------------------------------------------------------------

/// A reported local mutation, before merging into the record set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalOp {
    /// A file or folder appeared in the working tree.
    Create {
        /// Where it appeared.
        destination: Placement,
        /// Digest of the created bytes (files only).
        content: Option<ContentDigest>,
        /// `true` to schedule it for addition immediately.
        scheduled: bool,
    },
    /// Promote an unversioned item to a pending add.
    Schedule {
        /// Digest of the current bytes (files only).
        content: Option<ContentDigest>,
    },
    /// The item was renamed or moved.
    Relocate {
        /// The new placement.
        destination: Placement,
    },
    /// File content was written.
    Edit {
        /// Digest of the new bytes.
        working: ContentDigest,
    },
    /// The item was removed from the working tree.
    Delete,
}

impl LocalOp {
    /// Short label for error messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Schedule { .. } => "schedule for addition",
            Self::Relocate { .. } => "rename or move",
            Self::Edit { .. } => "edit",
            Self::Delete => "delete",
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeConflict
// ---------------------------------------------------------------------------

/// A local operation that cannot merge with the item's pending record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeConflict {
    /// Kind of the record already pending, if one exists.
    pub existing: Option<ChangeKind>,
    /// Label of the rejected operation.
    pub requested: &'static str,
}

impl ChangeConflict {
    const fn new(existing: Option<ChangeKind>, requested: &'static str) -> Self {
        Self { existing, requested }
    }
}

impl fmt::Display for ChangeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.existing {
            Some(kind) => write!(
                f,
                "cannot {} while a {} change is pending",
                self.requested, kind
            ),
            None => write!(f, "cannot {} here", self.requested),
        }
    }
}

impl std::error::Error for ChangeConflict {}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Merge a local operation into an item's pending record.
///
/// Returns the record that should be stored afterwards; `Ok(None)` means no
/// record remains (the operation canceled the pending state, e.g. deleting a
/// never-committed item or renaming back to the committed placement). Pure:
/// `item` supplies the committed placement and content digest, nothing here
/// touches a tree.
///
/// # Errors
/// [`ChangeConflict`] when the operation cannot be expressed against the
/// existing record (anything after a pending delete, double schedules,
/// operations that require a committed state the item does not have).
pub fn merge(
    item: &Item,
    existing: Option<&PendingChange>,
    op: &LocalOp,
) -> Result<Option<PendingChange>, ChangeConflict> {
    let conflict = |existing: Option<&PendingChange>, op: &LocalOp| {
        ChangeConflict::new(existing.map(PendingChange::kind), op.label())
    };

    match op {
        LocalOp::Create {
            destination,
            content,
            scheduled,
        } => match existing {
            None => Ok(Some(if *scheduled {
                PendingChange::Add {
                    destination: destination.clone(),
                    content: *content,
                }
            } else {
                PendingChange::Unversioned {
                    destination: destination.clone(),
                }
            })),
            Some(_) => Err(conflict(existing, op)),
        },

        LocalOp::Schedule { content } => match existing {
            Some(PendingChange::Unversioned { destination }) => Ok(Some(PendingChange::Add {
                destination: destination.clone(),
                content: *content,
            })),
            _ => Err(conflict(existing, op)),
        },

        LocalOp::Relocate { destination } => match existing {
            None => match &item.base {
                Some(base) if base == destination => Ok(None),
                Some(base) => Ok(Some(PendingChange::Relocate {
                    source: base.clone(),
                    destination: destination.clone(),
                    edit: None,
                })),
                None => Err(conflict(existing, op)),
            },
            Some(PendingChange::Add { content, .. }) => Ok(Some(PendingChange::Add {
                destination: destination.clone(),
                content: *content,
            })),
            Some(PendingChange::Unversioned { .. }) => Ok(Some(PendingChange::Unversioned {
                destination: destination.clone(),
            })),
            Some(PendingChange::Edit { edit }) => match &item.base {
                Some(base) if base == destination => Ok(Some(PendingChange::Edit { edit: *edit })),
                Some(base) => Ok(Some(PendingChange::Relocate {
                    source: base.clone(),
                    destination: destination.clone(),
                    edit: Some(*edit),
                })),
                None => Err(conflict(existing, op)),
            },
            Some(PendingChange::Relocate { source, edit, .. }) => {
                if source == destination {
                    // Back at the committed placement: only the edit survives.
                    Ok(edit.map(|e| PendingChange::Edit { edit: e }))
                } else {
                    Ok(Some(PendingChange::Relocate {
                        source: source.clone(),
                        destination: destination.clone(),
                        edit: *edit,
                    }))
                }
            }
            Some(PendingChange::Delete { .. }) => Err(conflict(existing, op)),
        },

        LocalOp::Edit { working } => match existing {
            None => match item.base_digest() {
                Some(base) => Ok(Some(PendingChange::Edit {
                    edit: ContentEdit {
                        base,
                        working: *working,
                    },
                })),
                None => Err(conflict(existing, op)),
            },
            Some(PendingChange::Add { destination, .. }) => Ok(Some(PendingChange::Add {
                destination: destination.clone(),
                content: Some(*working),
            })),
            // Unversioned content is not tracked; the record is unchanged.
            Some(PendingChange::Unversioned { destination }) => {
                Ok(Some(PendingChange::Unversioned {
                    destination: destination.clone(),
                }))
            }
            Some(PendingChange::Edit { edit }) => Ok(Some(PendingChange::Edit {
                edit: ContentEdit {
                    base: edit.base,
                    working: *working,
                },
            })),
            Some(PendingChange::Relocate {
                source,
                destination,
                edit,
            }) => {
                let base = match edit {
                    Some(e) => e.base,
                    None => match item.base_digest() {
                        Some(d) => d,
                        None => return Err(conflict(existing, op)),
                    },
                };
                Ok(Some(PendingChange::Relocate {
                    source: source.clone(),
                    destination: destination.clone(),
                    edit: Some(ContentEdit {
                        base,
                        working: *working,
                    }),
                }))
            }
            Some(PendingChange::Delete { .. }) => Err(conflict(existing, op)),
        },

        LocalOp::Delete => match existing {
            None => match &item.base {
                Some(base) => Ok(Some(PendingChange::Delete {
                    source: base.clone(),
                })),
                None => Err(conflict(existing, op)),
            },
            // Never committed: deleting it leaves nothing to track.
            Some(PendingChange::Add { .. } | PendingChange::Unversioned { .. }) => Ok(None),
            Some(PendingChange::Edit { .. }) => match &item.base {
                Some(base) => Ok(Some(PendingChange::Delete {
                    source: base.clone(),
                })),
                None => Err(conflict(existing, op)),
            },
            Some(PendingChange::Relocate { source, .. }) => Ok(Some(PendingChange::Delete {
                source: source.clone(),
            })),
            Some(PendingChange::Delete { .. }) => Err(conflict(existing, op)),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
