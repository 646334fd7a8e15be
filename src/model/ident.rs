//! Stable item identity.
//!
//! Every tracked file and folder gets an [`ItemId`] when it first appears and
//! keeps it for life. Renames, moves, and edits never touch the id, so two
//! pending changes on the same item can always be correlated without
//! comparing path strings, and a recorded destination stays meaningful even
//! after an ancestor folder is renamed out from under it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// A stable item identity that persists across renames and moves.
///
/// Assigned when an item is first observed and never changes afterwards.
/// Path equality says nothing about item equality; `ItemId` is the only
/// identity the engine trusts.
///
/// Internally stored as a `u128` and serialized as a 32-character lowercase
/// hex string for canonical JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(u128);

impl ItemId {
    /// Create an `ItemId` from a raw `u128`.
    #[must_use]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    /// Generate a random `ItemId`.
    ///
    /// Uses the thread-local PRNG (rand 0.9). Each call produces a fresh
    /// 128-bit identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u128>())
    }

    /// Return the inner `u128` value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Parse an `ItemId` from a 32-character lowercase hex string.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 32 lowercase hex digits.
    pub fn from_hex(s: &str) -> Result<Self, ItemIdError> {
        if s.len() != 32 {
            return Err(ItemIdError {
                value: s.to_owned(),
                reason: format!("expected 32 hex characters, got {}", s.len()),
            });
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return Err(ItemIdError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        let n = u128::from_str_radix(s, 16).map_err(|e| ItemIdError {
            value: s.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self(n))
    }

    /// Return a 32-character lowercase hex representation of this `ItemId`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl TryFrom<String> for ItemId {
    type Error = ItemIdError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.to_hex()
    }
}

/// Error returned when an `ItemId` string is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemIdError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ItemIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ItemId: {:?} — {}", self.value, self.reason)
    }
}

impl std::error::Error for ItemIdError {}

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Whether an item is a file or a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A regular file with content bytes.
    File,
    /// A directory; has children, no content.
    Folder,
}

impl ItemKind {
    /// Return `true` if this is [`ItemKind::File`].
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Return `true` if this is [`ItemKind::Folder`].
    #[must_use]
    pub const fn is_folder(self) -> bool {
        matches!(self, Self::Folder)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
