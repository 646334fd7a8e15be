//! The sandbox engine: local mutations, pending records, commit, rollback.
//!
//! # Flow
//!
//! Every mutation is local-first. The working tree changes immediately and a
//! pending record captures the net difference from the committed state, so
//! the tree always shows what a commit would produce. Commit is then mostly
//! bookkeeping: the base placement and baseline bytes take the working
//! values and the file flips to read-only. Rollback performs the inverse
//! tree mutation and drops the record.
//!
//! # Atomicity
//!
//! Each operation validates and plans against the record store before the
//! tree is touched, and records only after the tree mutation succeeds. An
//! operation that returns an error leaves the store, the item table, and
//! the working tree exactly as they were.
//!
//! # Read-only discipline
//!
//! A file is writable exactly while its record carries content (add, edit,
//! rename-and-edit, unversioned). Committing flips it read-only; editing a
//! checked-in copy flips it writable; rolling back restores the committed
//! flag.

use serde::Serialize;

use crate::config::SandboxConfig;
use crate::error::EngineError;
use crate::model::blob::ContentDigest;
use crate::model::change::{self, ChangeConflict, ChangeKind, LocalOp, PendingChange};
use crate::model::ident::{ItemId, ItemKind};
use crate::model::item::{Item, ItemTable, Placement};
use crate::model::path::{ItemName, SandboxPath};
use crate::resolve::{self, ResolveError};
use crate::store::{ChangeStore, RecordOutcome};
use crate::tree::{TreeError, WorkTree};

// ---------------------------------------------------------------------------
// ChangeSummary
// ---------------------------------------------------------------------------

/// One pending change, resolved to paths for display and export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    /// The item the change belongs to.
    pub item: ItemId,
    /// Displayed kind.
    pub kind: ChangeKind,
    /// Committed path being vacated (relocations and deletes).
    pub source: Option<SandboxPath>,
    /// Current working path (everything except deletes).
    pub destination: Option<SandboxPath>,
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// A working tree plus the bookkeeping that tracks its pending changes.
///
/// Exclusively owned and single-threaded; every operation is synchronous
/// and all failures surface as [`EngineError`] results.
#[derive(Debug)]
pub struct Sandbox<T: WorkTree> {
    pub(crate) tree: T,
    pub(crate) table: ItemTable,
    pub(crate) store: ChangeStore,
    config: SandboxConfig,
}

impl<T: WorkTree> Sandbox<T> {
    /// Wrap a working tree with default configuration.
    ///
    /// The tree is expected to be empty; committed state is built up by
    /// creating items and committing them.
    #[must_use]
    pub fn new(tree: T) -> Self {
        Self::with_config(tree, SandboxConfig::default())
    }

    /// Wrap a working tree with explicit configuration.
    #[must_use]
    pub fn with_config(tree: T, config: SandboxConfig) -> Self {
        Self {
            tree,
            table: ItemTable::new(),
            store: ChangeStore::new(),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Read access to the working tree.
    #[must_use]
    pub const fn tree(&self) -> &T {
        &self.tree
    }

    /// Read access to the item table.
    #[must_use]
    pub const fn table(&self) -> &ItemTable {
        &self.table
    }

    /// Read access to the pending-change records.
    #[must_use]
    pub const fn store(&self) -> &ChangeStore {
        &self.store
    }
}

// ---------------------------------------------------------------------------
// Local mutation events
// ---------------------------------------------------------------------------

impl<T: WorkTree> Sandbox<T> {
    /// Create a file with `bytes` at `path`.
    ///
    /// Records an add (or an unversioned entry when
    /// `schedule-created-files` is off) and writes the file, writable.
    ///
    /// # Errors
    /// [`EngineError::NotFound`] if the parent folder does not resolve;
    /// [`EngineError::Tree`] if the path is occupied or the parent is not a
    /// folder.
    pub fn create_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<ItemId, EngineError> {
        self.create_item(path, ItemKind::File, Some(bytes))
    }

    /// Create an empty folder at `path`.
    ///
    /// # Errors
    /// Same conditions as [`Sandbox::create_file`].
    pub fn create_folder(&mut self, path: &SandboxPath) -> Result<ItemId, EngineError> {
        self.create_item(path, ItemKind::Folder, None)
    }

    fn create_item(
        &mut self,
        path: &SandboxPath,
        kind: ItemKind,
        bytes: Option<&[u8]>,
    ) -> Result<ItemId, EngineError> {
        let (Some(parent_path), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(EngineError::Tree(TreeError::RootImmutable));
        };
        let parent = self.require_item(&parent_path)?;
        if parent != self.table.root() {
            let folder = self.item_clone(parent)?;
            if !folder.kind.is_folder() {
                return Err(EngineError::Tree(TreeError::NotAFolder { path: parent_path }));
            }
        }
        if resolve::working_child(&self.table, &self.store, parent, name).is_some() {
            return Err(EngineError::Tree(TreeError::AlreadyExists { path: path.clone() }));
        }

        let scheduled = self.config.schedule_created_files;
        let id = self.table.allocate(kind);
        let item = self.item_clone(id)?;
        let op = LocalOp::Create {
            destination: Placement::new(parent, name.clone()),
            content: bytes.map(ContentDigest::of),
            scheduled,
        };
        let created = match (kind, bytes) {
            (ItemKind::File, Some(b)) => self.tree.create_file(path, b),
            _ => self.tree.create_dir(path),
        };
        if let Err(e) = created {
            self.table.remove(id);
            return Err(EngineError::Tree(e));
        }
        self.record(path, &item, &op)?;
        tracing::debug!(path = %path, kind = %kind, scheduled, "item created");
        Ok(id)
    }

    /// Promote an unversioned item at `path` to a pending add.
    ///
    /// # Errors
    /// [`EngineError::ConflictingChange`] if the item is already versioned
    /// or already scheduled.
    pub fn schedule_for_addition(&mut self, path: &SandboxPath) -> Result<(), EngineError> {
        let id = self.require_item(path)?;
        if id == self.table.root() {
            return Err(EngineError::Tree(TreeError::RootImmutable));
        }
        let item = self.item_clone(id)?;
        let content = match item.kind {
            ItemKind::File => Some(ContentDigest::of(&self.tree.read_file(path)?)),
            ItemKind::Folder => None,
        };
        self.record(path, &item, &LocalOp::Schedule { content })?;
        tracing::debug!(path = %path, "scheduled for addition");
        Ok(())
    }

    /// Rename the item at `path` within its current folder.
    ///
    /// # Errors
    /// [`EngineError::InvalidPath`] for a malformed name;
    /// [`EngineError::PathConflict`] if the new name is taken;
    /// [`EngineError::ConflictingChange`] if a pending delete blocks it.
    pub fn rename(&mut self, path: &SandboxPath, new_name: &str) -> Result<(), EngineError> {
        let name = ItemName::new(new_name)?;
        let id = self.require_item(path)?;
        let Some(current) = resolve::working_placement(&self.table, &self.store, id) else {
            return Err(EngineError::Tree(TreeError::RootImmutable));
        };
        self.relocate(path, id, Placement::new(current.parent, name))
    }

    /// Move the item at `path` under the folder at `new_parent`, keeping
    /// its name.
    ///
    /// # Errors
    /// [`EngineError::Cycle`] when a folder would land beneath its own
    /// subtree, otherwise the same conditions as [`Sandbox::rename`].
    pub fn move_item(
        &mut self,
        path: &SandboxPath,
        new_parent: &SandboxPath,
    ) -> Result<(), EngineError> {
        let id = self.require_item(path)?;
        let parent = self.require_item(new_parent)?;
        if parent != self.table.root() {
            let folder = self.item_clone(parent)?;
            if !folder.kind.is_folder() {
                return Err(EngineError::Tree(TreeError::NotAFolder {
                    path: new_parent.clone(),
                }));
            }
        }
        let Some(current) = resolve::working_placement(&self.table, &self.store, id) else {
            return Err(EngineError::Tree(TreeError::RootImmutable));
        };
        self.relocate(path, id, Placement::new(parent, current.name))
    }

    fn relocate(
        &mut self,
        path: &SandboxPath,
        id: ItemId,
        destination: Placement,
    ) -> Result<(), EngineError> {
        let item = self.item_clone(id)?;

        if destination.parent == id
            || resolve::is_ancestor(&self.table, &self.store, id, destination.parent)
        {
            let dest = self.working_path_of(destination.parent)?.join(&destination.name);
            return Err(EngineError::Cycle {
                path: path.clone(),
                destination: dest,
            });
        }
        if let Some(occupant) =
            resolve::working_child(&self.table, &self.store, destination.parent, &destination.name)
        {
            if occupant != id {
                let dest = self.working_path_of(destination.parent)?.join(&destination.name);
                return Err(EngineError::PathConflict { path: dest });
            }
        }

        let op = LocalOp::Relocate {
            destination: destination.clone(),
        };
        self.plan(path, &item, &op)?;

        let to = self.working_path_of(destination.parent)?.join(&destination.name);
        if to != *path {
            self.tree.rename(path, &to)?;
        }
        self.record(path, &item, &op)?;
        tracing::debug!(from = %path, to = %to, "item relocated");
        Ok(())
    }

    /// Overwrite the file at `path` with `bytes`, checking it out if it is
    /// currently read-only.
    ///
    /// # Errors
    /// [`EngineError::ConflictingChange`] if a pending delete blocks it;
    /// [`EngineError::Tree`] if `path` is not a file.
    pub fn edit(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), EngineError> {
        let id = self.require_item(path)?;
        if id == self.table.root() {
            return Err(EngineError::Tree(TreeError::NotAFile { path: path.clone() }));
        }
        let item = self.item_clone(id)?;
        if !item.kind.is_file() {
            return Err(EngineError::Tree(TreeError::NotAFile { path: path.clone() }));
        }
        let op = LocalOp::Edit {
            working: ContentDigest::of(bytes),
        };
        self.plan(path, &item, &op)?;

        let was_readonly = self.tree.is_readonly(path)?;
        if was_readonly {
            self.tree.set_readonly(path, false)?;
        }
        if let Err(e) = self.tree.write_file(path, bytes) {
            if was_readonly {
                // Put the flag back so the failed edit leaves no trace.
                self.tree.set_readonly(path, true)?;
            }
            return Err(EngineError::Tree(e));
        }
        self.record(path, &item, &op)?;
        tracing::debug!(path = %path, "content edited");
        Ok(())
    }

    /// Remove the item at `path` from the working tree and schedule its
    /// deletion. Folder deletes cascade to every live descendant; pending
    /// adds and unversioned entries beneath it are dropped outright.
    ///
    /// # Errors
    /// [`EngineError::NotFound`] if nothing lives at `path`.
    pub fn delete(&mut self, path: &SandboxPath) -> Result<(), EngineError> {
        let id = self.require_item(path)?;
        if id == self.table.root() {
            return Err(EngineError::Tree(TreeError::RootImmutable));
        }
        let item = self.item_clone(id)?;

        // Plan the whole cascade before the tree is touched so one conflict
        // anywhere aborts with no effect.
        let mut targets: Vec<Item> = Vec::new();
        if item.kind.is_folder() {
            for descendant in self.working_descendants(id) {
                targets.push(self.item_clone(descendant)?);
            }
        }
        targets.push(item.clone());
        for target in &targets {
            let target_path = self.working_path_of(target.id)?;
            self.plan(&target_path, target, &LocalOp::Delete)?;
        }

        match item.kind {
            ItemKind::File => self.tree.remove_file(path)?,
            ItemKind::Folder => self.tree.remove_dir_all(path)?,
        }
        for target in &targets {
            self.record(path, target, &LocalOp::Delete)?;
        }
        tracing::debug!(path = %path, cascade = targets.len() - 1, "delete scheduled");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

impl<T: WorkTree> Sandbox<T> {
    /// Commit the pending change on `id`.
    ///
    /// The record is removed, the committed state absorbs the working
    /// values, and for files the working copy flips read-only. Committing a
    /// pending add whose destination folder is itself a pending add commits
    /// the parent first, so a nested create commits as a unit.
    ///
    /// # Errors
    /// [`EngineError::NothingPending`] with no record;
    /// [`EngineError::ConflictingChange`] for unversioned entries (they are
    /// not committable work) and uncommitted destination parents;
    /// [`EngineError::PathConflict`] if the destination placement is
    /// occupied. Failures leave the record pending.
    pub fn commit(&mut self, id: ItemId) -> Result<(), EngineError> {
        let Some(record) = self.store.get(id).cloned() else {
            return Err(EngineError::NothingPending { item: id });
        };
        match record {
            PendingChange::Unversioned { .. } => {
                let path = self.working_path_of(id)?;
                Err(EngineError::ConflictingChange {
                    path,
                    existing: Some(ChangeKind::Unversioned),
                    requested: "commit",
                })
            }
            PendingChange::Add { destination, .. } => self.commit_add(id, &destination),
            PendingChange::Edit { .. } => self.commit_edit(id),
            PendingChange::Relocate {
                destination, edit, ..
            } => self.commit_relocate(id, &destination, edit.is_some()),
            PendingChange::Delete { .. } => self.commit_delete(id),
        }
    }

    /// Commit the pending change at `path`.
    ///
    /// Deletes are addressed by the committed path they vacate; everything
    /// else by its working path.
    ///
    /// # Errors
    /// [`EngineError::NotFound`] if `path` resolves to nothing, otherwise as
    /// [`Sandbox::commit`].
    pub fn commit_path(&mut self, path: &SandboxPath) -> Result<(), EngineError> {
        let id = self
            .item_at(path)
            .ok_or_else(|| EngineError::NotFound { path: path.clone() })?;
        self.commit(id)
    }

    /// Commit every pending change.
    ///
    /// Adds land first (parents before children via the nested-add cascade),
    /// then edits and relocations, then deletes child-first. Unversioned
    /// entries are not work and stay behind.
    ///
    /// # Errors
    /// As [`Sandbox::commit`]; an error stops the pass with every
    /// already-committed change kept and the failing one still pending.
    pub fn commit_all(&mut self) -> Result<(), EngineError> {
        for id in self.store.ids() {
            if matches!(self.store.get(id), Some(PendingChange::Add { .. })) {
                self.commit(id)?;
            }
        }
        for id in self.store.ids() {
            if matches!(
                self.store.get(id),
                Some(PendingChange::Edit { .. } | PendingChange::Relocate { .. })
            ) {
                self.commit(id)?;
            }
        }
        for id in self.store.ids() {
            if matches!(self.store.get(id), Some(PendingChange::Delete { .. })) {
                self.commit(id)?;
            }
        }
        tracing::debug!(remaining = self.store.len(), "pending changes committed");
        Ok(())
    }

    fn commit_add(&mut self, id: ItemId, destination: &Placement) -> Result<(), EngineError> {
        self.ensure_parent_versioned(id, destination.parent)?;
        self.check_commit_destination(id, destination)?;

        let item = self.item_clone(id)?;
        let path = self.working_path_of(id)?;
        let baseline = if item.kind.is_file() {
            let bytes = self.tree.read_file(&path)?;
            self.tree.set_readonly(&path, true)?;
            Some(bytes)
        } else {
            None
        };
        let entry = self
            .table
            .get_mut(id)
            .ok_or(EngineError::Detached { item: id })?;
        entry.base = Some(destination.clone());
        entry.base_content = baseline;
        self.store.remove(id);
        tracing::debug!(item = %id, path = %path, "add committed");
        Ok(())
    }

    fn commit_edit(&mut self, id: ItemId) -> Result<(), EngineError> {
        let path = self.working_path_of(id)?;
        let bytes = self.tree.read_file(&path)?;
        self.tree.set_readonly(&path, true)?;
        let entry = self
            .table
            .get_mut(id)
            .ok_or(EngineError::Detached { item: id })?;
        entry.base_content = Some(bytes);
        self.store.remove(id);
        tracing::debug!(item = %id, path = %path, "edit committed");
        Ok(())
    }

    fn commit_relocate(
        &mut self,
        id: ItemId,
        destination: &Placement,
        edited: bool,
    ) -> Result<(), EngineError> {
        self.ensure_parent_versioned(id, destination.parent)?;
        self.check_commit_destination(id, destination)?;

        let path = self.working_path_of(id)?;
        let baseline = if edited {
            let bytes = self.tree.read_file(&path)?;
            self.tree.set_readonly(&path, true)?;
            Some(bytes)
        } else {
            None
        };
        let entry = self
            .table
            .get_mut(id)
            .ok_or(EngineError::Detached { item: id })?;
        entry.base = Some(destination.clone());
        if let Some(bytes) = baseline {
            entry.base_content = Some(bytes);
        }
        self.store.remove(id);
        tracing::debug!(item = %id, path = %path, "relocation committed");
        Ok(())
    }

    fn commit_delete(&mut self, id: ItemId) -> Result<(), EngineError> {
        // Children leave the table before their parent so the table never
        // holds an item whose base parent is gone.
        for child in self.table.base_children(id) {
            if matches!(self.store.get(child), Some(PendingChange::Delete { .. })) {
                self.commit_delete(child)?;
            }
        }
        self.store.remove(id);
        self.table.remove(id);
        tracing::debug!(item = %id, "delete committed");
        Ok(())
    }

    /// Commit a pending add on `parent` so a child's base placement anchors
    /// to a versioned folder.
    fn ensure_parent_versioned(&mut self, id: ItemId, parent: ItemId) -> Result<(), EngineError> {
        if parent == self.table.root() {
            return Ok(());
        }
        let parent_item = self.item_clone(parent)?;
        if parent_item.is_versioned() {
            return Ok(());
        }
        if matches!(self.store.get(parent), Some(PendingChange::Add { .. })) {
            return self.commit(parent);
        }
        let path = self.working_path_of(id)?;
        Err(EngineError::ConflictingChange {
            path,
            existing: self.store.get(parent).map(PendingChange::kind),
            requested: "commit beneath an uncommitted parent",
        })
    }

    /// The destination must be free in the base projection (unless its
    /// occupant has a pending change vacating it) and in the working
    /// projection.
    fn check_commit_destination(
        &self,
        id: ItemId,
        destination: &Placement,
    ) -> Result<(), EngineError> {
        if let Some(existing) = self.table.base_child(destination.parent, &destination.name) {
            if existing != id && !self.vacating(existing, destination) {
                let path = self.working_path_of(id)?;
                return Err(EngineError::PathConflict { path });
            }
        }
        let occupied = self.table.iter().any(|item| {
            item.id != id
                && resolve::working_placement(&self.table, &self.store, item.id)
                    .is_some_and(|p| p == *destination)
        });
        if occupied {
            let path = self.working_path_of(id)?;
            return Err(EngineError::PathConflict { path });
        }
        Ok(())
    }

    fn vacating(&self, id: ItemId, placement: &Placement) -> bool {
        match self.store.get(id) {
            Some(PendingChange::Delete { .. }) => true,
            Some(PendingChange::Relocate { destination, .. }) => destination != placement,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

impl<T: WorkTree> Sandbox<T> {
    /// Roll back the pending change on `id`, restoring the committed state
    /// in the working tree and dropping the record.
    ///
    /// # Errors
    /// [`EngineError::NothingPending`] with no record;
    /// [`EngineError::ConflictingChange`] for unversioned entries;
    /// [`EngineError::PathConflict`] if the committed placement has been
    /// reoccupied. Failures leave the record pending.
    pub fn rollback(&mut self, id: ItemId) -> Result<(), EngineError> {
        let Some(record) = self.store.get(id).cloned() else {
            return Err(EngineError::NothingPending { item: id });
        };
        match record {
            PendingChange::Unversioned { .. } => {
                let path = self.working_path_of(id)?;
                Err(EngineError::ConflictingChange {
                    path,
                    existing: Some(ChangeKind::Unversioned),
                    requested: "roll back",
                })
            }
            PendingChange::Add { .. } => self.rollback_add(id),
            PendingChange::Edit { .. } => self.rollback_edit(id),
            PendingChange::Relocate { source, edit, .. } => {
                self.rollback_relocate(id, &source, edit.is_some())
            }
            PendingChange::Delete { source } => self.rollback_delete(id, &source),
        }
    }

    /// Roll back the pending change at `path` (deletes addressed by the
    /// committed path they vacate).
    ///
    /// # Errors
    /// [`EngineError::NotFound`] if `path` resolves to nothing, otherwise as
    /// [`Sandbox::rollback`].
    pub fn rollback_path(&mut self, path: &SandboxPath) -> Result<(), EngineError> {
        let id = self
            .item_at(path)
            .ok_or_else(|| EngineError::NotFound { path: path.clone() })?;
        self.rollback(id)
    }

    fn rollback_add(&mut self, id: ItemId) -> Result<(), EngineError> {
        let item = self.item_clone(id)?;
        let path = self.working_path_of(id)?;

        // Undoing a folder add undoes the whole scheduled subtree; children
        // cannot stay scheduled under an unscheduled parent.
        let mut ids = Vec::new();
        if item.kind.is_folder() {
            ids.extend(self.working_descendants(id));
        }
        ids.push(id);

        if self.config.keep_local_on_undo_add {
            for target in ids {
                if let Some(PendingChange::Add { destination, .. }) =
                    self.store.get(target).cloned()
                {
                    self.store.put(target, PendingChange::Unversioned { destination });
                }
            }
        } else {
            // Versioned items moved beneath the add would be orphaned by
            // removing the subtree.
            for target in &ids {
                let target_item = self.item_clone(*target)?;
                if target_item.is_versioned() {
                    let target_path = self.working_path_of(*target)?;
                    return Err(EngineError::ConflictingChange {
                        path: target_path,
                        existing: self.store.get(*target).map(PendingChange::kind),
                        requested: "discard with its added parent",
                    });
                }
            }
            match item.kind {
                ItemKind::File => self.tree.remove_file(&path)?,
                ItemKind::Folder => self.tree.remove_dir_all(&path)?,
            }
            for target in ids {
                self.store.remove(target);
                self.table.remove(target);
            }
        }
        tracing::debug!(
            item = %id,
            path = %path,
            keep_local = self.config.keep_local_on_undo_add,
            "add rolled back"
        );
        Ok(())
    }

    fn rollback_edit(&mut self, id: ItemId) -> Result<(), EngineError> {
        let path = self.working_path_of(id)?;
        self.restore_base_content(id, &path)?;
        self.store.remove(id);
        tracing::debug!(item = %id, path = %path, "edit rolled back");
        Ok(())
    }

    fn rollback_relocate(
        &mut self,
        id: ItemId,
        source: &Placement,
        edited: bool,
    ) -> Result<(), EngineError> {
        let from = self.working_path_of(id)?;
        let to = self.working_path_of(source.parent)?.join(&source.name);

        let reoccupied = self.table.iter().any(|item| {
            item.id != id
                && resolve::working_placement(&self.table, &self.store, item.id)
                    .is_some_and(|p| p == *source)
        });
        if reoccupied {
            return Err(EngineError::PathConflict { path: to });
        }

        self.tree.rename(&from, &to)?;
        if edited {
            if let Err(e) = self.restore_base_content(id, &to) {
                // Move back so a failed restore leaves the rename pending.
                self.tree.rename(&to, &from)?;
                return Err(e);
            }
        }
        self.store.remove(id);
        tracing::debug!(item = %id, from = %from, to = %to, "relocation rolled back");
        Ok(())
    }

    fn rollback_delete(&mut self, id: ItemId, source: &Placement) -> Result<(), EngineError> {
        // Restoring a child whose ancestors are also scheduled for deletion
        // revives those ancestors first, topmost-first.
        self.revive_deleted_ancestors(source.parent)?;
        self.rollback_delete_single(id)
    }

    fn rollback_delete_single(&mut self, id: ItemId) -> Result<(), EngineError> {
        let item = self.item_clone(id)?;
        let Some(PendingChange::Delete { source }) = self.store.get(id).cloned() else {
            return Err(EngineError::NothingPending { item: id });
        };
        let target = self.working_path_of(source.parent)?.join(&source.name);

        let reoccupied = self.table.iter().any(|other| {
            other.id != id
                && resolve::working_placement(&self.table, &self.store, other.id)
                    .is_some_and(|p| p == source)
        });
        if reoccupied || self.tree.exists(&target) {
            return Err(EngineError::PathConflict { path: target });
        }

        match item.kind {
            ItemKind::File => {
                let bytes = item.base_content.clone().unwrap_or_default();
                self.tree.create_file(&target, &bytes)?;
                self.tree.set_readonly(&target, true)?;
            }
            ItemKind::Folder => {
                self.tree.create_dir(&target)?;
            }
        }
        self.store.remove(id);
        tracing::debug!(item = %id, path = %target, "delete rolled back");
        Ok(())
    }

    /// Roll back pending deletes along the base ancestor chain of `parent`,
    /// outermost first, so a restored item has somewhere to land.
    fn revive_deleted_ancestors(&mut self, parent: ItemId) -> Result<(), EngineError> {
        let mut chain = Vec::new();
        let mut current = parent;
        let mut steps = 0_usize;
        while current != self.table.root() {
            steps += 1;
            if steps > self.table.len() + 1 {
                return Err(EngineError::Detached { item: parent });
            }
            if matches!(self.store.get(current), Some(PendingChange::Delete { .. })) {
                chain.push(current);
            }
            let item = self
                .table
                .get(current)
                .ok_or(EngineError::Detached { item: current })?;
            match &item.base {
                Some(base) => current = base.parent,
                None => break,
            }
        }
        for ancestor in chain.into_iter().rev() {
            self.rollback_delete_single(ancestor)?;
        }
        Ok(())
    }

    /// Rewrite the file at `path` with its committed bytes and flip it
    /// read-only. No-op for folders.
    fn restore_base_content(&mut self, id: ItemId, path: &SandboxPath) -> Result<(), EngineError> {
        let item = self.item_clone(id)?;
        if let Some(bytes) = item.base_content {
            if self.tree.is_readonly(path)? {
                self.tree.set_readonly(path, false)?;
            }
            self.tree.write_file(path, &bytes)?;
            self.tree.set_readonly(path, true)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl<T: WorkTree> Sandbox<T> {
    /// All pending changes, resolved to paths and sorted by working path
    /// (committed path for deletes).
    ///
    /// # Errors
    /// [`EngineError::Detached`] only on internal corruption.
    pub fn pending_changes(&self) -> Result<Vec<ChangeSummary>, EngineError> {
        let mut out = Vec::with_capacity(self.store.len());
        for (id, record) in self.store.iter() {
            let source = match record.source() {
                Some(_) => Some(
                    resolve::base_path(&self.table, id)
                        .map_err(|_| EngineError::Detached { item: id })?,
                ),
                None => None,
            };
            let destination = match record {
                PendingChange::Delete { .. } => None,
                _ => Some(
                    resolve::working_path(&self.table, &self.store, id)
                        .map_err(|_| EngineError::Detached { item: id })?,
                ),
            };
            out.push(ChangeSummary {
                item: id,
                kind: record.kind(),
                source,
                destination,
            });
        }
        out.sort_by(|a, b| {
            let ka = a.destination.as_ref().or(a.source.as_ref());
            let kb = b.destination.as_ref().or(b.source.as_ref());
            ka.cmp(&kb).then_with(|| a.item.cmp(&b.item))
        });
        Ok(out)
    }

    /// The pending changes as pretty-printed JSON, for display consumers.
    ///
    /// # Errors
    /// As [`Sandbox::pending_changes`], plus [`EngineError::Serialize`].
    pub fn changes_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.pending_changes()?)?)
    }

    /// The item at a working path; deleted items are found by the committed
    /// path they vacate.
    #[must_use]
    pub fn item_at(&self, path: &SandboxPath) -> Option<ItemId> {
        if let Some(id) = resolve::lookup(&self.table, &self.store, path) {
            return Some(id);
        }
        self.store
            .iter()
            .filter(|(_, rec)| matches!(rec, PendingChange::Delete { .. }))
            .find(|(id, _)| resolve::base_path(&self.table, *id).is_ok_and(|p| p == *path))
            .map(|(id, _)| id)
    }

    /// Find a pending rename/move (edits included) from committed path
    /// `from` to working path `to`.
    #[must_use]
    pub fn find_renamed_or_moved(&self, from: &SandboxPath, to: &SandboxPath) -> Option<ItemId> {
        self.store.iter().find_map(|(id, record)| {
            (record.kind().is_renamed_or_moved()
                && resolve::base_path(&self.table, id).is_ok_and(|p| p == *from)
                && resolve::working_path(&self.table, &self.store, id).is_ok_and(|p| p == *to))
            .then_some(id)
        })
    }

    /// Find a pending add at working path `path`.
    #[must_use]
    pub fn find_add(&self, path: &SandboxPath) -> Option<ItemId> {
        self.find_by(path, |record| matches!(record, PendingChange::Add { .. }))
    }

    /// Find a pending content change (edit or rename-and-edit) at working
    /// path `path`.
    #[must_use]
    pub fn find_modification(&self, path: &SandboxPath) -> Option<ItemId> {
        self.find_by(path, |record| record.kind().is_modification())
    }

    /// Find an unversioned entry at working path `path`.
    #[must_use]
    pub fn find_unversioned(&self, path: &SandboxPath) -> Option<ItemId> {
        self.find_by(path, |record| {
            matches!(record, PendingChange::Unversioned { .. })
        })
    }

    /// Find a pending delete whose committed path is `path`.
    #[must_use]
    pub fn find_delete(&self, path: &SandboxPath) -> Option<ItemId> {
        self.store
            .iter()
            .filter(|(_, rec)| matches!(rec, PendingChange::Delete { .. }))
            .find(|(id, _)| resolve::base_path(&self.table, *id).is_ok_and(|p| p == *path))
            .map(|(id, _)| id)
    }

    fn find_by(
        &self,
        path: &SandboxPath,
        pred: impl Fn(&PendingChange) -> bool,
    ) -> Option<ItemId> {
        self.store.iter().find_map(|(id, record)| {
            (pred(record)
                && resolve::working_path(&self.table, &self.store, id).is_ok_and(|p| p == *path))
            .then_some(id)
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

impl<T: WorkTree> Sandbox<T> {
    fn require_item(&self, path: &SandboxPath) -> Result<ItemId, EngineError> {
        resolve::lookup(&self.table, &self.store, path)
            .ok_or_else(|| EngineError::NotFound { path: path.clone() })
    }

    fn item_clone(&self, id: ItemId) -> Result<Item, EngineError> {
        self.table
            .get(id)
            .cloned()
            .ok_or(EngineError::Detached { item: id })
    }

    fn working_path_of(&self, id: ItemId) -> Result<SandboxPath, EngineError> {
        match resolve::working_path(&self.table, &self.store, id) {
            Ok(path) => Ok(path),
            Err(ResolveError::Deleted { .. }) => {
                // The position exists only in the base projection.
                let path = resolve::base_path(&self.table, id)
                    .map_err(|_| EngineError::Detached { item: id })?;
                Err(EngineError::Tree(TreeError::NotFound { path }))
            }
            Err(_) => Err(EngineError::Detached { item: id }),
        }
    }

    /// Dry-run the record merge so the tree is only mutated when the record
    /// will take.
    fn plan(&self, path: &SandboxPath, item: &Item, op: &LocalOp) -> Result<(), EngineError> {
        change::merge(item, self.store.get(item.id), op)
            .map(|_| ())
            .map_err(|conflict| conflict_at(path, conflict))
    }

    fn record(
        &mut self,
        path: &SandboxPath,
        item: &Item,
        op: &LocalOp,
    ) -> Result<RecordOutcome, EngineError> {
        let outcome = self
            .store
            .apply(item, op)
            .map_err(|conflict| conflict_at(path, conflict))?;
        // A canceled record on a never-committed item leaves nothing behind.
        if outcome == RecordOutcome::Removed && !item.is_versioned() {
            self.table.remove(item.id);
        }
        Ok(outcome)
    }

    /// Every live item strictly beneath `id` in the working projection.
    /// Items with a pending delete are not live and are skipped.
    fn working_descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            for (_, child) in resolve::working_children(&self.table, &self.store, next) {
                out.push(child);
                stack.push(child);
            }
        }
        out
    }
}

fn conflict_at(path: &SandboxPath, conflict: ChangeConflict) -> EngineError {
    EngineError::ConflictingChange {
        path: path.clone(),
        existing: conflict.existing,
        requested: conflict.requested,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::resolve;
    use crate::tree::MemoryTree;

    fn path(s: &str) -> SandboxPath {
        SandboxPath::parse(s).unwrap()
    }

    /// Full tree snapshot: path, file bytes (folders carry none), and the
    /// read-only flag.
    fn snapshot(sb: &Sandbox<MemoryTree>) -> Vec<(String, Option<Vec<u8>>, bool)> {
        let mut out = Vec::new();
        let mut stack = vec![SandboxPath::root()];
        while let Some(dir) = stack.pop() {
            for name in sb.tree().child_names(&dir).unwrap() {
                let child = dir.join(&name);
                if sb.tree().is_dir(&child).unwrap() {
                    out.push((child.to_string(), None, false));
                    stack.push(child);
                } else {
                    let bytes = sb.tree().read_file(&child).unwrap();
                    let readonly = sb.tree().is_readonly(&child).unwrap();
                    out.push((child.to_string(), Some(bytes), readonly));
                }
            }
        }
        out.sort();
        out
    }

    /// Committed fixture with `n` root-level files f0.txt, f1.txt, …
    fn committed_files(n: usize) -> Sandbox<MemoryTree> {
        let mut sb = Sandbox::new(MemoryTree::new());
        for i in 0..n {
            sb.create_file(&path(&format!("f{i}.txt")), format!("F{i}").as_bytes())
                .unwrap();
        }
        sb.commit_all().unwrap();
        sb
    }

    // One local op against a single fixture file.
    #[derive(Clone, Debug)]
    enum FileOp {
        Edit(Vec<u8>),
        Rename(u8),
        Delete,
        Leave,
    }

    fn arb_file_op() -> impl Strategy<Value = FileOp> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..16).prop_map(FileOp::Edit),
            (0u8..10).prop_map(FileOp::Rename),
            Just(FileOp::Delete),
            Just(FileOp::Leave),
        ]
    }

    proptest! {
        #[test]
        fn prop_rollback_restores_the_baseline(ops in prop::collection::vec(arb_file_op(), 3)) {
            let mut sb = committed_files(ops.len());
            let before = snapshot(&sb);

            for (i, op) in ops.iter().enumerate() {
                let at = path(&format!("f{i}.txt"));
                match op {
                    FileOp::Edit(bytes) => sb.edit(&at, bytes).unwrap(),
                    FileOp::Rename(s) => sb.rename(&at, &format!("g{i}-{s}.txt")).unwrap(),
                    FileOp::Delete => sb.delete(&at).unwrap(),
                    FileOp::Leave => {}
                }
            }

            for id in sb.store.ids() {
                sb.rollback(id).unwrap();
            }
            prop_assert_eq!(snapshot(&sb), before);
            prop_assert!(sb.store.is_empty());
            prop_assert_eq!(sb.verify_consistency(), Vec::new());
        }

        #[test]
        fn prop_commit_order_is_irrelevant(
            order in Just((0..4_usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let build = || {
                let mut sb = committed_files(4);
                for i in 0..4 {
                    sb.rename(&path(&format!("f{i}.txt")), &format!("g{i}.txt")).unwrap();
                }
                sb
            };

            let mut shuffled = build();
            let ids = shuffled.store.ids();
            for &i in &order {
                shuffled.commit(ids[i]).unwrap();
            }

            let mut sequential = build();
            for id in sequential.store.ids() {
                sequential.commit(id).unwrap();
            }

            prop_assert!(shuffled.store.is_empty());
            prop_assert_eq!(snapshot(&shuffled), snapshot(&sequential));
            for item in shuffled.table.iter() {
                prop_assert_eq!(
                    resolve::base_path(&shuffled.table, item.id).ok(),
                    resolve::base_path(&sequential.table, item.id).ok()
                );
            }
        }
    }
}
