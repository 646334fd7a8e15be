//! pendulum — a pending-change engine for a versioned working tree.
//!
//! A [`Sandbox`] pairs a working tree with the committed state it was
//! checked out from and tracks every local mutation as a pending change:
//! adds, edits, renames, moves, deletes, and unversioned files. Changes
//! apply to the tree immediately; commit and rollback then promote them
//! into the committed baseline or restore it. Items are tracked by
//! identity, so a pending record survives any number of renames above it.
//!
//! Start with [`Sandbox::new`] over a [`MemoryTree`] (tests) or a
//! [`DiskTree`] (a real directory), mutate through the event methods, and
//! inspect the result through [`Sandbox::changes`].

pub mod config;
pub mod error;
pub mod model;
pub mod resolve;
pub mod sandbox;
pub mod store;
pub mod tree;
pub mod view;

pub use config::SandboxConfig;
pub use error::EngineError;
pub use model::blob::ContentDigest;
pub use model::change::{ChangeKind, PendingChange};
pub use model::ident::{ItemId, ItemKind};
pub use model::path::{ItemName, SandboxPath};
pub use sandbox::{ChangeSummary, Sandbox};
pub use store::ChangeStore;
pub use tree::{DiskTree, MemoryTree, TreeError, WorkTree};
pub use view::{ChangesView, ConsistencyIssue, VerifyError};
