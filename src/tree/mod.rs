//! Working-tree backing stores.
//!
//! The engine mutates a working tree through the [`WorkTree`] trait and
//! never touches the filesystem directly. [`MemoryTree`] backs tests and
//! simulation; [`DiskTree`] maps the same contract onto a real directory.
//!
//! Paths are [`SandboxPath`]s — already validated, already relative — so an
//! implementation can compose them onto its own root without re-checking for
//! separators or `..` segments.

use thiserror::Error;

use crate::model::path::{ItemName, SandboxPath};

mod disk;
mod memory;

pub use disk::DiskTree;
pub use memory::MemoryTree;

// ---------------------------------------------------------------------------
// TreeError
// ---------------------------------------------------------------------------

/// Errors from working-tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The path does not exist.
    #[error("no such entry: '{path}'")]
    NotFound {
        /// The missing path.
        path: SandboxPath,
    },

    /// The destination already exists.
    #[error("entry already exists: '{path}'")]
    AlreadyExists {
        /// The occupied path.
        path: SandboxPath,
    },

    /// A file operation was aimed at a folder.
    #[error("not a file: '{path}'")]
    NotAFile {
        /// The offending path.
        path: SandboxPath,
    },

    /// A folder operation was aimed at a file.
    #[error("not a folder: '{path}'")]
    NotAFolder {
        /// The offending path.
        path: SandboxPath,
    },

    /// A write was attempted on a read-only file.
    #[error("file is read-only: '{path}'")]
    ReadOnly {
        /// The read-only file.
        path: SandboxPath,
    },

    /// The sandbox root itself cannot be created, removed, or renamed.
    #[error("the sandbox root cannot be modified")]
    RootImmutable,

    /// A folder cannot be renamed to a path beneath itself.
    #[error("cannot move '{path}' beneath itself")]
    IntoSelf {
        /// The folder being moved.
        path: SandboxPath,
    },

    /// Underlying I/O failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// WorkTree
// ---------------------------------------------------------------------------

/// A mutable working tree rooted at the sandbox root.
///
/// # Invariants
///
/// - The root always exists, is a folder, and is immutable as an entry.
/// - `create_*` requires the parent to exist and be a folder, and the path
///   itself to be vacant. Created files are writable.
/// - `rename` moves files and whole folder subtrees; the destination must be
///   vacant and its parent must be a folder.
/// - `remove_file` removes read-only files as well — pending deletes apply
///   to checked-in (read-only) working copies.
/// - `write_file` refuses read-only files with [`TreeError::ReadOnly`]; the
///   caller flips the flag first. The read-only flag models the
///   checked-in/checked-out state of a working copy.
pub trait WorkTree {
    /// Create a writable file with `bytes` at `path`.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn create_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), TreeError>;

    /// Create an empty folder at `path`.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn create_dir(&mut self, path: &SandboxPath) -> Result<(), TreeError>;

    /// Remove the file at `path`.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn remove_file(&mut self, path: &SandboxPath) -> Result<(), TreeError>;

    /// Remove the folder at `path` and everything beneath it.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn remove_dir_all(&mut self, path: &SandboxPath) -> Result<(), TreeError>;

    /// Move `from` (and its subtree, for folders) to `to`.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn rename(&mut self, from: &SandboxPath, to: &SandboxPath) -> Result<(), TreeError>;

    /// Read a file's bytes.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn read_file(&self, path: &SandboxPath) -> Result<Vec<u8>, TreeError>;

    /// Overwrite a writable file's bytes.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn write_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), TreeError>;

    /// Set or clear the read-only flag on a file.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn set_readonly(&mut self, path: &SandboxPath, readonly: bool) -> Result<(), TreeError>;

    /// Return the read-only flag of a file.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn is_readonly(&self, path: &SandboxPath) -> Result<bool, TreeError>;

    /// Return `true` if anything exists at `path`.
    fn exists(&self, path: &SandboxPath) -> bool;

    /// Return `true` if `path` is a folder.
    ///
    /// # Errors
    /// [`TreeError::NotFound`] if nothing exists at `path`.
    fn is_dir(&self, path: &SandboxPath) -> Result<bool, TreeError>;

    /// Number of direct children of the folder at `path`.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn child_count(&self, path: &SandboxPath) -> Result<usize, TreeError>;

    /// Names of the direct children of the folder at `path`, sorted.
    ///
    /// # Errors
    /// See the trait-level invariants.
    fn child_names(&self, path: &SandboxPath) -> Result<Vec<ItemName>, TreeError>;
}
