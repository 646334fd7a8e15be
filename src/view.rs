//! Read-only views over a sandbox: change queries, snapshot assertions,
//! and the internal consistency check.
//!
//! [`ChangesView`] answers "is this change pending" questions and verifies
//! full tree snapshots without ever mutating engine state; two calls with no
//! intervening mutation always agree. The assertion forms return a
//! [`VerifyError`] naming exactly what did not hold, so scenario tables can
//! report a useful failure instead of a bare boolean.
//!
//! [`Sandbox::verify_consistency`] cross-checks the record store, the item
//! table, and the working tree against each other and reports every
//! discrepancy it finds. Tests run it after every transition.

#![allow(clippy::missing_errors_doc)]

use thiserror::Error;

use crate::model::blob::ContentDigest;
use crate::model::change::PendingChange;
use crate::model::ident::ItemId;
use crate::model::path::SandboxPath;
use crate::resolve;
use crate::sandbox::Sandbox;
use crate::tree::{TreeError, WorkTree};

// ---------------------------------------------------------------------------
// VerifyError
// ---------------------------------------------------------------------------

/// A snapshot assertion that did not hold.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Wrong number of pending changes.
    #[error("expected {expected} pending changes, found {actual}")]
    TotalItems {
        /// Expected record count (unversioned entries included).
        expected: usize,
        /// Actual record count.
        actual: usize,
    },

    /// No pending rename or move matches the given endpoints.
    #[error("no pending rename or move from '{from}' to '{to}'")]
    MissingRenamedOrMoved {
        /// Expected committed path.
        from: SandboxPath,
        /// Expected working path.
        to: SandboxPath,
    },

    /// Nothing is scheduled for addition at the path.
    #[error("'{path}' is not scheduled for addition")]
    MissingAdd {
        /// The path checked.
        path: SandboxPath,
    },

    /// No pending content change at the path.
    #[error("'{path}' has no pending content change")]
    MissingModification {
        /// The path checked.
        path: SandboxPath,
    },

    /// The path is not tracked as unversioned.
    #[error("'{path}' is not tracked as unversioned")]
    MissingUnversioned {
        /// The path checked.
        path: SandboxPath,
    },

    /// Nothing is scheduled for deletion at the path.
    #[error("'{path}' is not scheduled for deletion")]
    MissingDelete {
        /// The committed path checked.
        path: SandboxPath,
    },

    /// No live item occupies the path.
    #[error("no item at '{path}'")]
    MissingItem {
        /// The path checked.
        path: SandboxPath,
    },

    /// File bytes do not match.
    #[error("content mismatch at '{path}': expected {expected}, found {actual}")]
    Content {
        /// The file checked.
        path: SandboxPath,
        /// Digest of the expected bytes.
        expected: ContentDigest,
        /// Digest of the actual bytes.
        actual: ContentDigest,
    },

    /// Folder has the wrong number of children.
    #[error("'{path}' expected {expected} children, found {actual}")]
    ChildCount {
        /// The folder checked.
        path: SandboxPath,
        /// Expected direct-child count.
        expected: usize,
        /// Actual direct-child count.
        actual: usize,
    },

    /// File writability does not match the expected checkout state.
    #[error("'{path}' expected writable={expected}")]
    Writable {
        /// The file checked.
        path: SandboxPath,
        /// Whether the file was expected to be writable.
        expected: bool,
    },

    /// The working tree failed underneath the check.
    #[error("working tree failure: {0}")]
    Tree(#[from] TreeError),
}

// ---------------------------------------------------------------------------
// ChangesView
// ---------------------------------------------------------------------------

/// Read-only query surface over a sandbox's pending changes and tree.
pub struct ChangesView<'a, T: WorkTree> {
    sandbox: &'a Sandbox<T>,
}

impl<T: WorkTree> ChangesView<'_, T> {
    /// Number of pending records, unversioned entries included.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.sandbox.store().len()
    }

    /// Is a rename or move (edits included) pending from committed path
    /// `from` to working path `to`?
    #[must_use]
    pub fn renamed_or_moved(&self, from: &SandboxPath, to: &SandboxPath) -> bool {
        self.sandbox.find_renamed_or_moved(from, to).is_some()
    }

    /// Is an add pending at `path`?
    #[must_use]
    pub fn scheduled_for_addition(&self, path: &SandboxPath) -> bool {
        self.sandbox.find_add(path).is_some()
    }

    /// Is a content change pending at `path`?
    #[must_use]
    pub fn modified(&self, path: &SandboxPath) -> bool {
        self.sandbox.find_modification(path).is_some()
    }

    /// Is `path` tracked as unversioned?
    #[must_use]
    pub fn unversioned(&self, path: &SandboxPath) -> bool {
        self.sandbox.find_unversioned(path).is_some()
    }

    /// Is a delete pending for the committed path `path`?
    #[must_use]
    pub fn deleted(&self, path: &SandboxPath) -> bool {
        self.sandbox.find_delete(path).is_some()
    }

    /// Bytes of the file at `path`.
    pub fn file_content(&self, path: &SandboxPath) -> Result<Vec<u8>, VerifyError> {
        Ok(self.sandbox.tree().read_file(path)?)
    }

    /// Whether the file at `path` is writable (checked out).
    pub fn file_writable(&self, path: &SandboxPath) -> Result<bool, VerifyError> {
        Ok(!self.sandbox.tree().is_readonly(path)?)
    }

    /// Direct-child count of the folder at `path`.
    pub fn folder_child_count(&self, path: &SandboxPath) -> Result<usize, VerifyError> {
        Ok(self.sandbox.tree().child_count(path)?)
    }

    // -- assertion forms --

    /// Assert the exact number of pending records.
    pub fn assert_total_items(&self, expected: usize) -> Result<(), VerifyError> {
        let actual = self.total_items();
        if actual == expected {
            Ok(())
        } else {
            Err(VerifyError::TotalItems { expected, actual })
        }
    }

    /// Assert a pending rename or move from `from` to `to`.
    pub fn assert_renamed_or_moved(
        &self,
        from: &SandboxPath,
        to: &SandboxPath,
    ) -> Result<(), VerifyError> {
        if self.renamed_or_moved(from, to) {
            Ok(())
        } else {
            Err(VerifyError::MissingRenamedOrMoved {
                from: from.clone(),
                to: to.clone(),
            })
        }
    }

    /// Assert a pending add at `path`.
    pub fn assert_scheduled_for_addition(&self, path: &SandboxPath) -> Result<(), VerifyError> {
        if self.scheduled_for_addition(path) {
            Ok(())
        } else {
            Err(VerifyError::MissingAdd { path: path.clone() })
        }
    }

    /// Assert a pending content change at `path`, with the baseline bytes
    /// still `before` and the working bytes now `after`.
    pub fn assert_modified(
        &self,
        path: &SandboxPath,
        before: &[u8],
        after: &[u8],
    ) -> Result<(), VerifyError> {
        let id = self
            .sandbox
            .find_modification(path)
            .ok_or_else(|| VerifyError::MissingModification { path: path.clone() })?;
        let bytes = self.sandbox.tree().read_file(path)?;
        if bytes != after {
            return Err(VerifyError::Content {
                path: path.clone(),
                expected: ContentDigest::of(after),
                actual: ContentDigest::of(&bytes),
            });
        }
        let baseline = self
            .sandbox
            .table()
            .get(id)
            .and_then(|item| item.base_content.clone())
            .unwrap_or_default();
        if baseline != before {
            return Err(VerifyError::Content {
                path: path.clone(),
                expected: ContentDigest::of(before),
                actual: ContentDigest::of(&baseline),
            });
        }
        Ok(())
    }

    /// Assert `path` is tracked as unversioned.
    pub fn assert_unversioned(&self, path: &SandboxPath) -> Result<(), VerifyError> {
        if self.unversioned(path) {
            Ok(())
        } else {
            Err(VerifyError::MissingUnversioned { path: path.clone() })
        }
    }

    /// Assert a pending delete for the committed path `path`.
    pub fn assert_deleted(&self, path: &SandboxPath) -> Result<(), VerifyError> {
        if self.deleted(path) {
            Ok(())
        } else {
            Err(VerifyError::MissingDelete { path: path.clone() })
        }
    }

    /// Assert a live file at `path` with exactly `content` and the given
    /// writability.
    pub fn assert_file(
        &self,
        path: &SandboxPath,
        content: &[u8],
        writable: bool,
    ) -> Result<(), VerifyError> {
        if resolve::lookup(self.sandbox.table(), self.sandbox.store(), path).is_none() {
            return Err(VerifyError::MissingItem { path: path.clone() });
        }
        let bytes = self.sandbox.tree().read_file(path)?;
        if bytes != content {
            return Err(VerifyError::Content {
                path: path.clone(),
                expected: ContentDigest::of(content),
                actual: ContentDigest::of(&bytes),
            });
        }
        let actual_writable = !self.sandbox.tree().is_readonly(path)?;
        if actual_writable != writable {
            return Err(VerifyError::Writable {
                path: path.clone(),
                expected: writable,
            });
        }
        Ok(())
    }

    /// Assert a live folder at `path` with exactly `children` direct
    /// children.
    pub fn assert_folder(&self, path: &SandboxPath, children: usize) -> Result<(), VerifyError> {
        if !path.is_root()
            && resolve::lookup(self.sandbox.table(), self.sandbox.store(), path).is_none()
        {
            return Err(VerifyError::MissingItem { path: path.clone() });
        }
        let actual = self.sandbox.tree().child_count(path)?;
        if actual == children {
            Ok(())
        } else {
            Err(VerifyError::ChildCount {
                path: path.clone(),
                expected: children,
                actual,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// ConsistencyIssue
// ---------------------------------------------------------------------------

/// One discrepancy found by [`Sandbox::verify_consistency`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsistencyIssue {
    /// The item involved, when the issue concerns one.
    pub item: Option<ItemId>,
    /// What did not hold.
    pub detail: String,
}

fn issue(item: Option<ItemId>, detail: impl Into<String>) -> ConsistencyIssue {
    ConsistencyIssue {
        item,
        detail: detail.into(),
    }
}

// ---------------------------------------------------------------------------
// Sandbox surface
// ---------------------------------------------------------------------------

impl<T: WorkTree> Sandbox<T> {
    /// A read-only view over this sandbox.
    #[must_use]
    pub const fn changes(&self) -> ChangesView<'_, T> {
        ChangesView { sandbox: self }
    }

    /// Cross-check the record store, the item table, and the working tree,
    /// returning every discrepancy found. An empty result means the three
    /// agree.
    #[must_use]
    pub fn verify_consistency(&self) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();

        for (id, _) in self.store.iter() {
            if self.table.get(id).is_none() {
                issues.push(issue(Some(id), "pending change refers to an unknown item"));
            }
        }

        for item in self.table.iter() {
            let id = item.id;
            let record = self.store.get(id);

            if matches!(record, Some(PendingChange::Delete { .. })) {
                if resolve::base_path(&self.table, id).is_err() {
                    issues.push(issue(Some(id), "pending delete has no committed path"));
                }
                continue;
            }

            let path = match resolve::working_path(&self.table, &self.store, id) {
                Ok(p) => p,
                Err(e) => {
                    issues.push(issue(Some(id), format!("no working path: {e}")));
                    continue;
                }
            };
            if !self.tree.exists(&path) {
                issues.push(issue(Some(id), format!("missing from the tree at '{path}'")));
                continue;
            }
            match self.tree.is_dir(&path) {
                Ok(is_dir) if is_dir != item.kind.is_folder() => {
                    issues.push(issue(Some(id), format!("wrong kind at '{path}'")));
                    continue;
                }
                Err(e) => {
                    issues.push(issue(Some(id), format!("unreadable at '{path}': {e}")));
                    continue;
                }
                Ok(_) => {}
            }
            if item.kind.is_file() {
                self.verify_file(id, &path, record, &mut issues);
            }
        }

        // Everything in the tree must map back to a live item.
        let mut stack = vec![SandboxPath::root()];
        while let Some(dir) = stack.pop() {
            let Ok(names) = self.tree.child_names(&dir) else {
                continue;
            };
            for name in names {
                let child = dir.join(&name);
                if resolve::lookup(&self.table, &self.store, &child).is_none() {
                    issues.push(issue(None, format!("untracked entry at '{child}'")));
                    continue;
                }
                if self.tree.is_dir(&child).unwrap_or(false) {
                    stack.push(child);
                }
            }
        }

        issues
    }

    fn verify_file(
        &self,
        id: ItemId,
        path: &SandboxPath,
        record: Option<&PendingChange>,
        issues: &mut Vec<ConsistencyIssue>,
    ) {
        let expected_digest = record
            .and_then(PendingChange::working_digest)
            .or_else(|| self.table.get(id).and_then(crate::model::item::Item::base_digest));
        match self.tree.read_file(path) {
            Ok(bytes) => {
                if let Some(expected) = expected_digest {
                    if ContentDigest::of(&bytes) != expected {
                        issues.push(issue(Some(id), format!("content drift at '{path}'")));
                    }
                }
            }
            Err(e) => {
                issues.push(issue(Some(id), format!("unreadable at '{path}': {e}")));
            }
        }
        // Writable exactly while the record carries content.
        let expect_readonly = !record.is_some_and(PendingChange::is_content_bearing);
        match self.tree.is_readonly(path) {
            Ok(readonly) if readonly != expect_readonly => {
                issues.push(issue(
                    Some(id),
                    format!("wrong read-only flag at '{path}': expected {expect_readonly}"),
                ));
            }
            Err(e) => {
                issues.push(issue(Some(id), format!("unreadable at '{path}': {e}")));
            }
            Ok(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
