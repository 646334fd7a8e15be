//! Disk-backed working tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::path::{ItemName, SandboxPath};

use super::{TreeError, WorkTree};

// ---------------------------------------------------------------------------
// DiskTree
// ---------------------------------------------------------------------------

/// A [`WorkTree`] rooted at a real directory.
///
/// Sandbox paths are joined segment-by-segment onto the root; because
/// [`SandboxPath`] cannot express separators, `..`, or absolute paths, every
/// operation stays confined to the root by construction. The read-only flag
/// maps to filesystem permissions.
#[derive(Clone, Debug)]
pub struct DiskTree {
    root: PathBuf,
}

impl DiskTree {
    /// Wrap an existing directory as the sandbox root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The filesystem root this tree operates under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fs_path(&self, path: &SandboxPath) -> PathBuf {
        let mut out = self.root.clone();
        for seg in path.segments() {
            out.push(seg.as_str());
        }
        out
    }

    fn metadata(&self, path: &SandboxPath) -> Result<fs::Metadata, TreeError> {
        match fs::metadata(self.fs_path(path)) {
            Ok(meta) => Ok(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(TreeError::NotFound { path: path.clone() })
            }
            Err(e) => Err(TreeError::Io(e)),
        }
    }

    fn require_vacant(&self, path: &SandboxPath) -> Result<(), TreeError> {
        if self.fs_path(path).symlink_metadata().is_ok() {
            return Err(TreeError::AlreadyExists { path: path.clone() });
        }
        Ok(())
    }

    fn require_parent_dir(&self, path: &SandboxPath) -> Result<(), TreeError> {
        let Some(parent) = path.parent() else {
            return Err(TreeError::RootImmutable);
        };
        if parent.is_root() {
            return Ok(());
        }
        let meta = self.metadata(&parent)?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(TreeError::NotAFolder { path: parent })
        }
    }

    fn set_readonly_at(fs_path: &Path, readonly: bool) -> Result<(), TreeError> {
        let meta = fs::metadata(fs_path)?;
        let mut perms = meta.permissions();
        perms.set_readonly(readonly);
        fs::set_permissions(fs_path, perms)?;
        Ok(())
    }

    /// Clear read-only flags under `dir` so recursive removal works on
    /// platforms where read-only files refuse deletion.
    fn clear_readonly_under(dir: &Path) -> Result<(), TreeError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                Self::clear_readonly_under(&entry.path())?;
            } else if meta.permissions().readonly() {
                Self::set_readonly_at(&entry.path(), false)?;
            }
        }
        Ok(())
    }
}

impl WorkTree for DiskTree {
    fn create_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        self.require_vacant(path)?;
        self.require_parent_dir(path)?;
        fs::write(self.fs_path(path), bytes)?;
        Ok(())
    }

    fn create_dir(&mut self, path: &SandboxPath) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        self.require_vacant(path)?;
        self.require_parent_dir(path)?;
        fs::create_dir(self.fs_path(path))?;
        Ok(())
    }

    fn remove_file(&mut self, path: &SandboxPath) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        let meta = self.metadata(path)?;
        if meta.is_dir() {
            return Err(TreeError::NotAFile { path: path.clone() });
        }
        let fs_path = self.fs_path(path);
        if meta.permissions().readonly() {
            Self::set_readonly_at(&fs_path, false)?;
        }
        fs::remove_file(fs_path)?;
        Ok(())
    }

    fn remove_dir_all(&mut self, path: &SandboxPath) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        let meta = self.metadata(path)?;
        if !meta.is_dir() {
            return Err(TreeError::NotAFolder { path: path.clone() });
        }
        let fs_path = self.fs_path(path);
        Self::clear_readonly_under(&fs_path)?;
        fs::remove_dir_all(fs_path)?;
        Ok(())
    }

    fn rename(&mut self, from: &SandboxPath, to: &SandboxPath) -> Result<(), TreeError> {
        if from.is_root() || to.is_root() {
            return Err(TreeError::RootImmutable);
        }
        self.metadata(from)?;
        if to.starts_with(from) {
            return Err(TreeError::IntoSelf { path: from.clone() });
        }
        self.require_vacant(to)?;
        self.require_parent_dir(to)?;
        fs::rename(self.fs_path(from), self.fs_path(to))?;
        Ok(())
    }

    fn read_file(&self, path: &SandboxPath) -> Result<Vec<u8>, TreeError> {
        let meta = self.metadata(path)?;
        if meta.is_dir() {
            return Err(TreeError::NotAFile { path: path.clone() });
        }
        Ok(fs::read(self.fs_path(path))?)
    }

    fn write_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), TreeError> {
        let meta = self.metadata(path)?;
        if meta.is_dir() {
            return Err(TreeError::NotAFile { path: path.clone() });
        }
        // Explicit gate: relying on the OS is not enough when running with
        // elevated privileges, which happily write through the flag.
        if meta.permissions().readonly() {
            return Err(TreeError::ReadOnly { path: path.clone() });
        }
        fs::write(self.fs_path(path), bytes)?;
        Ok(())
    }

    fn set_readonly(&mut self, path: &SandboxPath, readonly: bool) -> Result<(), TreeError> {
        let meta = self.metadata(path)?;
        if meta.is_dir() {
            return Err(TreeError::NotAFile { path: path.clone() });
        }
        Self::set_readonly_at(&self.fs_path(path), readonly)
    }

    fn is_readonly(&self, path: &SandboxPath) -> Result<bool, TreeError> {
        let meta = self.metadata(path)?;
        if meta.is_dir() {
            return Err(TreeError::NotAFile { path: path.clone() });
        }
        Ok(meta.permissions().readonly())
    }

    fn exists(&self, path: &SandboxPath) -> bool {
        self.fs_path(path).symlink_metadata().is_ok()
    }

    fn is_dir(&self, path: &SandboxPath) -> Result<bool, TreeError> {
        Ok(self.metadata(path)?.is_dir())
    }

    fn child_count(&self, path: &SandboxPath) -> Result<usize, TreeError> {
        Ok(self.child_names(path)?.len())
    }

    fn child_names(&self, path: &SandboxPath) -> Result<Vec<ItemName>, TreeError> {
        let meta = self.metadata(path)?;
        if !meta.is_dir() {
            return Err(TreeError::NotAFolder { path: path.clone() });
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(self.fs_path(path))? {
            let entry = entry?;
            let raw = entry.file_name();
            // Entries the sandbox alphabet cannot express are ignored; the
            // engine never creates them.
            if let Some(name) = raw.to_str().and_then(|s| ItemName::new(s).ok()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
