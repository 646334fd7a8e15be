//! On-demand path resolution.
//!
//! # Overview
//!
//! Nothing in the engine caches a full path. The working path of an item is
//! recomputed on every query by walking its parent chain: at each node the
//! pending record's destination placement wins if one exists, otherwise the
//! committed placement applies. A pending folder move therefore re-parents
//! its whole subtree in resolved space without touching a single descendant
//! record, and recording order can never make two records disagree.
//!
//! # Algorithm
//!
//! For item X, walk X → root. Each node contributes one name segment:
//!
//! - a placement-bearing record (add, unversioned, relocate) contributes its
//!   destination name and redirects the walk to the destination parent;
//! - an edit record contributes the committed name (edits never move);
//! - no record contributes the committed name;
//! - a delete record ends resolution — the item has no working position.
//!
//! [`base_path`] is the committed projection: it walks committed placements
//! only and ignores the record store entirely.
//!
//! All functions are pure in the table and store. Walks are capped at the
//! table size; exceeding the cap means the arena itself is corrupt and
//! surfaces as [`ResolveError::Detached`] rather than a hang.

use thiserror::Error;

use crate::model::change::PendingChange;
use crate::model::ident::ItemId;
use crate::model::item::{ItemTable, Placement};
use crate::model::path::{ItemName, SandboxPath};
use crate::store::ChangeStore;

// ---------------------------------------------------------------------------
// ResolveError
// ---------------------------------------------------------------------------

/// Failure to produce a path for an item.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The item's parent chain does not reach the root. This indicates a
    /// bookkeeping defect, not a caller mistake.
    #[error("item {item} is detached from the tree")]
    Detached {
        /// The item whose resolution failed.
        item: ItemId,
    },

    /// The item has a pending delete and no working position.
    #[error("item {item} is scheduled for deletion and has no working path")]
    Deleted {
        /// The deleted item.
        item: ItemId,
    },

    /// The item has no committed placement, so no base path exists.
    #[error("item {item} has never been committed and has no base path")]
    Unversioned {
        /// The uncommitted item.
        item: ItemId,
    },
}

// ---------------------------------------------------------------------------
// Working projection
// ---------------------------------------------------------------------------

/// The placement an item currently occupies in the working tree.
///
/// `None` for the root, for items with a pending delete, and for unknown
/// ids.
#[must_use]
pub fn working_placement(
    table: &ItemTable,
    store: &ChangeStore,
    id: ItemId,
) -> Option<Placement> {
    let item = table.get(id)?;
    match store.get(id) {
        Some(PendingChange::Delete { .. }) => None,
        Some(rec) => rec.destination().cloned().or_else(|| item.base.clone()),
        None => item.base.clone(),
    }
}

/// Resolve the working path of `id`.
///
/// # Errors
/// [`ResolveError::Deleted`] if the item has a pending delete;
/// [`ResolveError::Detached`] if the parent chain is broken.
pub fn working_path(
    table: &ItemTable,
    store: &ChangeStore,
    id: ItemId,
) -> Result<SandboxPath, ResolveError> {
    if id == table.root() {
        return Ok(SandboxPath::root());
    }
    if matches!(store.get(id), Some(PendingChange::Delete { .. })) {
        return Err(ResolveError::Deleted { item: id });
    }

    let mut segments: Vec<ItemName> = Vec::new();
    let mut current = id;
    let mut steps = 0_usize;
    while current != table.root() {
        steps += 1;
        if steps > table.len() + 1 {
            return Err(ResolveError::Detached { item: id });
        }
        let placement = working_placement(table, store, current)
            .ok_or(ResolveError::Detached { item: id })?;
        segments.push(placement.name);
        current = placement.parent;
    }
    segments.reverse();
    Ok(SandboxPath::from_segments(segments))
}

/// Find the live item occupying `parent`/`name` in the working projection.
#[must_use]
pub fn working_child(
    table: &ItemTable,
    store: &ChangeStore,
    parent: ItemId,
    name: &ItemName,
) -> Option<ItemId> {
    table.iter().map(|item| item.id).find(|&id| {
        working_placement(table, store, id)
            .is_some_and(|p| p.parent == parent && p.name == *name)
    })
}

/// All live items currently under `parent`, sorted by name.
#[must_use]
pub fn working_children(
    table: &ItemTable,
    store: &ChangeStore,
    parent: ItemId,
) -> Vec<(ItemName, ItemId)> {
    let mut children: Vec<(ItemName, ItemId)> = table
        .iter()
        .filter_map(|item| {
            working_placement(table, store, item.id)
                .filter(|p| p.parent == parent)
                .map(|p| (p.name, item.id))
        })
        .collect();
    children.sort();
    children
}

/// Resolve a working path to an item id, starting at the root.
#[must_use]
pub fn lookup(table: &ItemTable, store: &ChangeStore, path: &SandboxPath) -> Option<ItemId> {
    let mut current = table.root();
    for segment in path.segments() {
        current = working_child(table, store, current, segment)?;
    }
    Some(current)
}

/// Return `true` if `ancestor` appears strictly above `id` in the working
/// projection.
#[must_use]
pub fn is_ancestor(table: &ItemTable, store: &ChangeStore, ancestor: ItemId, id: ItemId) -> bool {
    let mut current = id;
    let mut steps = 0_usize;
    while current != table.root() {
        steps += 1;
        if steps > table.len() + 1 {
            return false;
        }
        let Some(placement) = working_placement(table, store, current) else {
            return false;
        };
        current = placement.parent;
        if current == ancestor {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Base projection
// ---------------------------------------------------------------------------

/// Resolve the committed path of `id`, ignoring all pending records.
///
/// # Errors
/// [`ResolveError::Unversioned`] if the item (or, impossibly, an ancestor)
/// was never committed; [`ResolveError::Detached`] on a broken chain.
pub fn base_path(table: &ItemTable, id: ItemId) -> Result<SandboxPath, ResolveError> {
    if id == table.root() {
        return Ok(SandboxPath::root());
    }
    let mut segments: Vec<ItemName> = Vec::new();
    let mut current = id;
    let mut steps = 0_usize;
    while current != table.root() {
        steps += 1;
        if steps > table.len() + 1 {
            return Err(ResolveError::Detached { item: id });
        }
        let item = table.get(current).ok_or(ResolveError::Detached { item: id })?;
        let placement = item
            .base
            .as_ref()
            .ok_or(ResolveError::Unversioned { item: current })?;
        segments.push(placement.name.clone());
        current = placement.parent;
    }
    segments.reverse();
    Ok(SandboxPath::from_segments(segments))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::change::LocalOp;
    use crate::model::ident::ItemKind;

    fn name(s: &str) -> ItemName {
        ItemName::new(s).unwrap()
    }

    fn path(s: &str) -> SandboxPath {
        SandboxPath::parse(s).unwrap()
    }

    /// Build `Folder/Subfolder/file.txt`, all committed.
    fn committed_chain() -> (ItemTable, ChangeStore, ItemId, ItemId, ItemId) {
        let mut table = ItemTable::new();
        let root = table.root();
        let folder = table.allocate(ItemKind::Folder);
        let sub = table.allocate(ItemKind::Folder);
        let file = table.allocate(ItemKind::File);
        table.get_mut(folder).unwrap().base = Some(Placement::new(root, name("Folder")));
        table.get_mut(sub).unwrap().base = Some(Placement::new(folder, name("Subfolder")));
        table.get_mut(file).unwrap().base = Some(Placement::new(sub, name("file.txt")));
        table.get_mut(file).unwrap().base_content = Some(b"ORIGINAL".to_vec());
        (table, ChangeStore::new(), folder, sub, file)
    }

    fn relocate(table: &ItemTable, store: &mut ChangeStore, id: ItemId, dest: Placement) {
        let item = table.get(id).unwrap().clone();
        store
            .apply(&item, &LocalOp::Relocate { destination: dest })
            .unwrap();
    }

    // -- working_path --

    #[test]
    fn unchanged_chain_resolves_to_base() {
        let (table, store, _, _, file) = committed_chain();
        assert_eq!(
            working_path(&table, &store, file).unwrap(),
            path("Folder/Subfolder/file.txt")
        );
    }

    #[test]
    fn leaf_rename_only_changes_last_segment() {
        let (table, mut store, _, sub, file) = committed_chain();
        relocate(&table, &mut store, file, Placement::new(sub, name("renamed.txt")));
        assert_eq!(
            working_path(&table, &store, file).unwrap(),
            path("Folder/Subfolder/renamed.txt")
        );
    }

    #[test]
    fn ancestor_rename_only_changes_prefix() {
        let (table, mut store, folder, _, file) = committed_chain();
        let root = table.root();
        relocate(&table, &mut store, folder, Placement::new(root, name("Renamed")));
        assert_eq!(
            working_path(&table, &store, file).unwrap(),
            path("Renamed/Subfolder/file.txt")
        );
    }

    #[test]
    fn own_and_ancestor_renames_compose() {
        let (table, mut store, folder, sub, file) = committed_chain();
        let root = table.root();
        relocate(&table, &mut store, folder, Placement::new(root, name("Renamed")));
        relocate(&table, &mut store, file, Placement::new(sub, name("renamed.txt")));
        assert_eq!(
            working_path(&table, &store, file).unwrap(),
            path("Renamed/Subfolder/renamed.txt")
        );
    }

    #[test]
    fn every_level_renamed_composes() {
        let (table, mut store, folder, sub, file) = committed_chain();
        let root = table.root();
        relocate(&table, &mut store, folder, Placement::new(root, name("A")));
        relocate(&table, &mut store, sub, Placement::new(folder, name("B")));
        relocate(&table, &mut store, file, Placement::new(sub, name("c.txt")));
        assert_eq!(working_path(&table, &store, file).unwrap(), path("A/B/c.txt"));
        // Base projection is untouched by all of it.
        assert_eq!(base_path(&table, file).unwrap(), path("Folder/Subfolder/file.txt"));
    }

    #[test]
    fn pending_add_follows_pending_ancestor_move() {
        // A pending add recorded under a folder that is itself moved after
        // the add was recorded: the add's resolved path follows the move.
        let (mut table, mut store, folder, sub, _) = committed_chain();
        let root = table.root();

        let added = table.allocate(ItemKind::File);
        let item = table.get(added).unwrap().clone();
        store
            .apply(
                &item,
                &LocalOp::Create {
                    destination: Placement::new(sub, name("added_file.txt")),
                    content: None,
                    scheduled: true,
                },
            )
            .unwrap();
        assert_eq!(
            working_path(&table, &store, added).unwrap(),
            path("Folder/Subfolder/added_file.txt")
        );

        // Now move Subfolder to the root; the add was not touched.
        relocate(&table, &mut store, sub, Placement::new(root, name("Subfolder")));
        assert_eq!(
            working_path(&table, &store, added).unwrap(),
            path("Subfolder/added_file.txt")
        );
        let _ = folder;
    }

    #[test]
    fn deleted_item_has_no_working_path() {
        let (table, mut store, _, _, file) = committed_chain();
        let item = table.get(file).unwrap().clone();
        store.apply(&item, &LocalOp::Delete).unwrap();
        assert_eq!(
            working_path(&table, &store, file),
            Err(ResolveError::Deleted { item: file })
        );
        assert_eq!(working_placement(&table, &store, file), None);
    }

    #[test]
    fn corrupt_parent_chain_is_detached_not_a_hang() {
        let mut table = ItemTable::new();
        let id = table.allocate(ItemKind::Folder);
        // Self-parented placement: the walk must bail out.
        table.get_mut(id).unwrap().base = Some(Placement::new(id, name("loop")));
        let store = ChangeStore::new();
        assert_eq!(
            working_path(&table, &store, id),
            Err(ResolveError::Detached { item: id })
        );
    }

    // -- lookup / children --

    #[test]
    fn lookup_follows_working_projection() {
        let (table, mut store, folder, _, file) = committed_chain();
        let root = table.root();
        relocate(&table, &mut store, folder, Placement::new(root, name("Renamed")));

        assert_eq!(
            lookup(&table, &store, &path("Renamed/Subfolder/file.txt")),
            Some(file)
        );
        // The stale base path no longer resolves.
        assert_eq!(lookup(&table, &store, &path("Folder/Subfolder/file.txt")), None);
        assert_eq!(lookup(&table, &store, &SandboxPath::root()), Some(root));
    }

    #[test]
    fn working_children_are_name_sorted() {
        let (mut table, mut store, folder, _, _) = committed_chain();
        let b = table.allocate(ItemKind::File);
        let item = table.get(b).unwrap().clone();
        store
            .apply(
                &item,
                &LocalOp::Create {
                    destination: Placement::new(folder, name("b.txt")),
                    content: None,
                    scheduled: true,
                },
            )
            .unwrap();
        let names: Vec<String> = working_children(&table, &store, folder)
            .into_iter()
            .map(|(n, _)| n.as_str().to_owned())
            .collect();
        assert_eq!(names, vec!["Subfolder", "b.txt"]);
    }

    // -- is_ancestor --

    #[test]
    fn ancestry_follows_pending_moves() {
        let (mut table, mut store, folder, sub, _) = committed_chain();
        let other = table.allocate(ItemKind::Folder);
        let item = table.get(other).unwrap().clone();
        store
            .apply(
                &item,
                &LocalOp::Create {
                    destination: Placement::new(table.root(), name("Other")),
                    content: None,
                    scheduled: true,
                },
            )
            .unwrap();

        assert!(is_ancestor(&table, &store, folder, sub));
        assert!(!is_ancestor(&table, &store, sub, folder));
        assert!(!is_ancestor(&table, &store, sub, sub));

        // Move sub under Other: ancestry flips with the pending move.
        relocate(&table, &mut store, sub, Placement::new(other, name("Subfolder")));
        assert!(!is_ancestor(&table, &store, folder, sub));
        assert!(is_ancestor(&table, &store, other, sub));
    }

    // -- base_path --

    #[test]
    fn base_path_requires_a_committed_item() {
        let (mut table, store, _, _, _) = committed_chain();
        let added = table.allocate(ItemKind::File);
        assert_eq!(
            base_path(&table, added),
            Err(ResolveError::Unversioned { item: added })
        );
    }
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------
