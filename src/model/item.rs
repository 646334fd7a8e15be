//! Item arena and id-anchored placements.
//!
//! The engine never stores a full path on an item. An item's position is a
//! [`Placement`] — parent *id* plus own name — and a path only exists as the
//! outcome of resolving the parent chain. Because the parent is referenced by
//! id, a recorded placement stays valid no matter how often the ancestor
//! folders are renamed or moved before anything is committed.
//!
//! [`ItemTable`] holds the committed ("base") side of the world: each item's
//! last committed placement and, for files, the committed content bytes used
//! to restore a rollback. Items that were never committed (pending adds,
//! unversioned files) have no base placement; their only position lives on
//! their pending-change record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::blob::ContentDigest;
use super::ident::{ItemId, ItemKind};
use super::path::ItemName;

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// A tree position: parent folder id plus the item's own name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    /// Id of the containing folder (the table root id for top-level items).
    pub parent: ItemId,
    /// The item's name within that folder.
    pub name: ItemName,
}

impl Placement {
    /// Build a placement.
    #[must_use]
    pub const fn new(parent: ItemId, name: ItemName) -> Self {
        Self { parent, name }
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One tracked file or folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    /// Stable identity.
    pub id: ItemId,
    /// File or folder.
    pub kind: ItemKind,
    /// Last committed placement; `None` until the item is first committed.
    pub base: Option<Placement>,
    /// Last committed content bytes (files only); restored on rollback.
    pub base_content: Option<Vec<u8>>,
}

impl Item {
    /// Return `true` once the item has a committed placement.
    #[must_use]
    pub const fn is_versioned(&self) -> bool {
        self.base.is_some()
    }

    /// Digest of the committed content, if any.
    #[must_use]
    pub fn base_digest(&self) -> Option<ContentDigest> {
        self.base_content.as_deref().map(ContentDigest::of)
    }
}

// ---------------------------------------------------------------------------
// ItemTable
// ---------------------------------------------------------------------------

/// Arena of tracked items keyed by [`ItemId`].
///
/// The root folder is not an item: it has no name, no parent, and can never
/// carry a change. It exists only as the id that top-level placements point
/// at. `BTreeMap` keeps every iteration deterministic.
#[derive(Clone, Debug, Default)]
pub struct ItemTable {
    root: ItemId,
    items: BTreeMap<ItemId, Item>,
}

impl ItemTable {
    /// Create an empty table with a fresh root id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: ItemId::random(),
            items: BTreeMap::new(),
        }
    }

    /// The root folder id.
    #[must_use]
    pub const fn root(&self) -> ItemId {
        self.root
    }

    /// Allocate a fresh item with no base placement and insert it.
    ///
    /// The returned id is guaranteed unused within this table.
    pub fn allocate(&mut self, kind: ItemKind) -> ItemId {
        let mut id = ItemId::random();
        while id == self.root || self.items.contains_key(&id) {
            id = ItemId::random();
        }
        self.items.insert(
            id,
            Item {
                id,
                kind,
                base: None,
                base_content: None,
            },
        );
        id
    }

    /// Look up an item.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Look up an item mutably.
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    /// Remove an item, returning it if present.
    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        self.items.remove(&id)
    }

    /// Return `true` if `id` is the root or a live item.
    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        id == self.root || self.items.contains_key(&id)
    }

    /// Number of items (the root is not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` if no items are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate items in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Find the item whose *base* placement is `parent`/`name`.
    #[must_use]
    pub fn base_child(&self, parent: ItemId, name: &ItemName) -> Option<ItemId> {
        self.items
            .values()
            .find(|item| {
                item.base
                    .as_ref()
                    .is_some_and(|p| p.parent == parent && p.name == *name)
            })
            .map(|item| item.id)
    }

    /// All items whose base placement sits under `parent`, in name order.
    #[must_use]
    pub fn base_children(&self, parent: ItemId) -> Vec<ItemId> {
        let mut named: BTreeMap<&ItemName, ItemId> = BTreeMap::new();
        for item in self.items.values() {
            if let Some(p) = &item.base {
                if p.parent == parent {
                    named.insert(&p.name, item.id);
                }
            }
        }
        named.into_values().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
