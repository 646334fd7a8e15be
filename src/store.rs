//! Pending-change record store.
//!
//! Holds at most one [`PendingChange`] per item and funnels every local
//! operation through the merge algebra in [`crate::model::change`], so the
//! stored set is always the *net* difference against the committed state.
//! The store never touches the working tree; tree side effects belong to the
//! sandbox.

use std::collections::BTreeMap;

use crate::model::change::{self, ChangeConflict, LocalOp, PendingChange};
use crate::model::ident::ItemId;
use crate::model::item::Item;

// ---------------------------------------------------------------------------
// RecordOutcome
// ---------------------------------------------------------------------------

/// What [`ChangeStore::apply`] did to the record set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new record was created.
    Created,
    /// An existing record absorbed the operation.
    Merged,
    /// The operation canceled the existing record.
    Removed,
    /// Nothing to record (the operation was a no-op against committed state).
    Unchanged,
}

// ---------------------------------------------------------------------------
// ChangeStore
// ---------------------------------------------------------------------------

/// All pending records, keyed by item id. Iteration is id-ordered and
/// deterministic; callers that want path order resolve paths first.
#[derive(Clone, Debug, Default)]
pub struct ChangeStore {
    records: BTreeMap<ItemId, PendingChange>,
}

impl ChangeStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Merge a local operation into `item`'s record.
    ///
    /// # Errors
    /// Propagates [`ChangeConflict`] from the merge algebra; the store is
    /// untouched when that happens.
    pub fn apply(&mut self, item: &Item, op: &LocalOp) -> Result<RecordOutcome, ChangeConflict> {
        let existing = self.records.get(&item.id);
        let had_record = existing.is_some();
        let merged = change::merge(item, existing, op)?;
        let outcome = match (had_record, merged) {
            (false, Some(rec)) => {
                tracing::debug!(item = %item.id, kind = %rec.kind(), "pending change recorded");
                self.records.insert(item.id, rec);
                RecordOutcome::Created
            }
            (true, Some(rec)) => {
                tracing::debug!(item = %item.id, kind = %rec.kind(), "pending change merged");
                self.records.insert(item.id, rec);
                RecordOutcome::Merged
            }
            (true, None) => {
                tracing::debug!(item = %item.id, "pending change canceled");
                self.records.remove(&item.id);
                RecordOutcome::Removed
            }
            (false, None) => RecordOutcome::Unchanged,
        };
        Ok(outcome)
    }

    /// Look up an item's record.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&PendingChange> {
        self.records.get(&id)
    }

    /// Replace an item's record directly, bypassing the merge algebra.
    ///
    /// Reserved for commit/rollback transitions that rewrite record state
    /// (for example demoting a rolled-back add to unversioned).
    pub(crate) fn put(&mut self, id: ItemId, record: PendingChange) {
        self.records.insert(id, record);
    }

    /// Remove and return an item's record.
    pub fn remove(&mut self, id: ItemId) -> Option<PendingChange> {
        self.records.remove(&id)
    }

    /// Return `true` if `id` has a record.
    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of records, unversioned entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in item-id order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &PendingChange)> {
        self.records.iter().map(|(id, rec)| (*id, rec))
    }

    /// Snapshot of record ids in id order.
    #[must_use]
    pub fn ids(&self) -> Vec<ItemId> {
        self.records.keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
