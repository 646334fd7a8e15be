//! In-memory working tree.

use std::collections::BTreeMap;

use crate::model::path::{ItemName, SandboxPath};

use super::{TreeError, WorkTree};

// ---------------------------------------------------------------------------
// MemoryTree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    File { bytes: Vec<u8>, readonly: bool },
    Dir,
}

/// A [`WorkTree`] held entirely in memory.
///
/// The default backing store for tests and simulation. The map is keyed by
/// full path; the root is implicit and never stored. Segment-wise path
/// ordering keeps each subtree contiguous, so subtree operations are simple
/// scans.
#[derive(Clone, Debug, Default)]
pub struct MemoryTree {
    nodes: BTreeMap<SandboxPath, Node>,
}

impl MemoryTree {
    /// Create an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Total number of entries (files and folders, root excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` if the tree holds nothing but the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn require_vacant(&self, path: &SandboxPath) -> Result<(), TreeError> {
        if self.nodes.contains_key(path) {
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
        match self.nodes.get(&parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File { .. }) => Err(TreeError::NotAFolder { path: parent }),
            None => Err(TreeError::NotFound { path: parent }),
        }
    }

    fn file(&self, path: &SandboxPath) -> Result<(&Vec<u8>, bool), TreeError> {
        match self.nodes.get(path) {
            Some(Node::File { bytes, readonly }) => Ok((bytes, *readonly)),
            Some(Node::Dir) => Err(TreeError::NotAFile { path: path.clone() }),
            None => Err(TreeError::NotFound { path: path.clone() }),
        }
    }
}

impl WorkTree for MemoryTree {
    fn create_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        self.require_vacant(path)?;
        self.require_parent_dir(path)?;
        self.nodes.insert(
            path.clone(),
            Node::File {
                bytes: bytes.to_vec(),
                readonly: false,
            },
        );
        Ok(())
    }

    fn create_dir(&mut self, path: &SandboxPath) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        self.require_vacant(path)?;
        self.require_parent_dir(path)?;
        self.nodes.insert(path.clone(), Node::Dir);
        Ok(())
    }

    fn remove_file(&mut self, path: &SandboxPath) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        self.file(path)?;
        self.nodes.remove(path);
        Ok(())
    }

    fn remove_dir_all(&mut self, path: &SandboxPath) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable);
        }
        match self.nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File { .. }) => return Err(TreeError::NotAFolder { path: path.clone() }),
            None => return Err(TreeError::NotFound { path: path.clone() }),
        }
        self.nodes.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn rename(&mut self, from: &SandboxPath, to: &SandboxPath) -> Result<(), TreeError> {
        if from.is_root() || to.is_root() {
            return Err(TreeError::RootImmutable);
        }
        if !self.nodes.contains_key(from) {
            return Err(TreeError::NotFound { path: from.clone() });
        }
        if to.starts_with(from) {
            return Err(TreeError::IntoSelf { path: from.clone() });
        }
        self.require_vacant(to)?;
        self.require_parent_dir(to)?;

        // Re-key the entry and, for folders, everything beneath it.
        let moved: Vec<(SandboxPath, Node)> = self
            .nodes
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();
        for (p, _) in &moved {
            self.nodes.remove(p);
        }
        for (p, node) in moved {
            let mut segments = to.segments().to_vec();
            segments.extend_from_slice(&p.segments()[from.depth()..]);
            self.nodes.insert(SandboxPath::from_segments(segments), node);
        }
        Ok(())
    }

    fn read_file(&self, path: &SandboxPath) -> Result<Vec<u8>, TreeError> {
        let (bytes, _) = self.file(path)?;
        Ok(bytes.clone())
    }

    fn write_file(&mut self, path: &SandboxPath, bytes: &[u8]) -> Result<(), TreeError> {
        let (_, readonly) = self.file(path)?;
        if readonly {
            return Err(TreeError::ReadOnly { path: path.clone() });
        }
        self.nodes.insert(
            path.clone(),
            Node::File {
                bytes: bytes.to_vec(),
                readonly: false,
            },
        );
        Ok(())
    }

    fn set_readonly(&mut self, path: &SandboxPath, readonly: bool) -> Result<(), TreeError> {
        match self.nodes.get_mut(path) {
            Some(Node::File { readonly: flag, .. }) => {
                *flag = readonly;
                Ok(())
            }
            Some(Node::Dir) => Err(TreeError::NotAFile { path: path.clone() }),
            None => Err(TreeError::NotFound { path: path.clone() }),
        }
    }

    fn is_readonly(&self, path: &SandboxPath) -> Result<bool, TreeError> {
        let (_, readonly) = self.file(path)?;
        Ok(readonly)
    }

    fn exists(&self, path: &SandboxPath) -> bool {
        path.is_root() || self.nodes.contains_key(path)
    }

    fn is_dir(&self, path: &SandboxPath) -> Result<bool, TreeError> {
        if path.is_root() {
            return Ok(true);
        }
        match self.nodes.get(path) {
            Some(Node::Dir) => Ok(true),
            Some(Node::File { .. }) => Ok(false),
            None => Err(TreeError::NotFound { path: path.clone() }),
        }
    }

    fn child_count(&self, path: &SandboxPath) -> Result<usize, TreeError> {
        Ok(self.child_names(path)?.len())
    }

    fn child_names(&self, path: &SandboxPath) -> Result<Vec<ItemName>, TreeError> {
        if !self.is_dir(path)? {
            return Err(TreeError::NotAFolder { path: path.clone() });
        }
        let names: Vec<ItemName> = self
            .nodes
            .keys()
            .filter(|p| p.depth() == path.depth() + 1 && p.starts_with(path))
            .filter_map(|p| p.file_name().cloned())
            .collect();
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> SandboxPath {
        SandboxPath::parse(s).unwrap()
    }

    fn small_tree() -> MemoryTree {
        let mut t = MemoryTree::new();
        t.create_dir(&p("Folder")).unwrap();
        t.create_dir(&p("Folder/Sub")).unwrap();
        t.create_file(&p("Folder/Sub/file.txt"), b"ORIGINAL").unwrap();
        t
    }

    #[test]
    fn create_and_read_round_trip() {
        let t = small_tree();
        assert_eq!(t.read_file(&p("Folder/Sub/file.txt")).unwrap(), b"ORIGINAL");
        assert!(t.exists(&p("Folder/Sub")));
        assert!(t.is_dir(&p("Folder")).unwrap());
        assert!(!t.is_dir(&p("Folder/Sub/file.txt")).unwrap());
    }

    #[test]
    fn create_requires_vacant_path_and_dir_parent() {
        let mut t = small_tree();
        assert!(matches!(
            t.create_dir(&p("Folder")),
            Err(TreeError::AlreadyExists { .. })
        ));
        assert!(matches!(
            t.create_file(&p("Missing/file.txt"), b""),
            Err(TreeError::NotFound { .. })
        ));
        assert!(matches!(
            t.create_file(&p("Folder/Sub/file.txt/under-file"), b""),
            Err(TreeError::NotAFolder { .. })
        ));
    }

    #[test]
    fn root_is_immutable() {
        let mut t = MemoryTree::new();
        let root = SandboxPath::root();
        assert!(matches!(t.create_dir(&root), Err(TreeError::RootImmutable)));
        assert!(matches!(t.remove_dir_all(&root), Err(TreeError::RootImmutable)));
        assert!(t.exists(&root));
        assert!(t.is_dir(&root).unwrap());
    }

    #[test]
    fn rename_moves_whole_subtree() {
        let mut t = small_tree();
        t.rename(&p("Folder"), &p("Renamed")).unwrap();
        assert!(!t.exists(&p("Folder")));
        assert!(t.exists(&p("Renamed/Sub/file.txt")));
        assert_eq!(t.read_file(&p("Renamed/Sub/file.txt")).unwrap(), b"ORIGINAL");
    }

    #[test]
    fn rename_rejects_occupied_destination() {
        let mut t = small_tree();
        t.create_dir(&p("Other")).unwrap();
        assert!(matches!(
            t.rename(&p("Folder"), &p("Other")),
            Err(TreeError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn rename_rejects_moving_folder_into_itself() {
        let mut t = small_tree();
        assert!(matches!(
            t.rename(&p("Folder"), &p("Folder/Sub/Folder")),
            Err(TreeError::IntoSelf { .. })
        ));
    }

    #[test]
    fn readonly_blocks_writes_until_cleared() {
        let mut t = small_tree();
        let f = p("Folder/Sub/file.txt");
        t.set_readonly(&f, true).unwrap();
        assert!(t.is_readonly(&f).unwrap());
        assert!(matches!(
            t.write_file(&f, b"MODIFIED"),
            Err(TreeError::ReadOnly { .. })
        ));
        t.set_readonly(&f, false).unwrap();
        t.write_file(&f, b"MODIFIED").unwrap();
        assert_eq!(t.read_file(&f).unwrap(), b"MODIFIED");
    }

    #[test]
    fn remove_file_ignores_readonly_flag() {
        let mut t = small_tree();
        let f = p("Folder/Sub/file.txt");
        t.set_readonly(&f, true).unwrap();
        t.remove_file(&f).unwrap();
        assert!(!t.exists(&f));
    }

    #[test]
    fn remove_dir_all_takes_descendants() {
        let mut t = small_tree();
        t.remove_dir_all(&p("Folder")).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn child_names_are_sorted_and_shallow() {
        let mut t = small_tree();
        t.create_file(&p("Folder/a.txt"), b"").unwrap();
        let names: Vec<String> = t
            .child_names(&p("Folder"))
            .unwrap()
            .into_iter()
            .map(|n| n.as_str().to_owned())
            .collect();
        assert_eq!(names, vec!["Sub", "a.txt"]);
        assert_eq!(t.child_count(&SandboxPath::root()).unwrap(), 1);
        // Similarly-prefixed siblings are not counted as children.
        t.create_dir(&p("FolderX")).unwrap();
        assert_eq!(t.child_count(&p("Folder")).unwrap(), 2);
    }

    #[test]
    fn kind_mismatches_are_typed() {
        let mut t = small_tree();
        assert!(matches!(
            t.remove_file(&p("Folder")),
            Err(TreeError::NotAFile { .. })
        ));
        assert!(matches!(
            t.remove_dir_all(&p("Folder/Sub/file.txt")),
            Err(TreeError::NotAFolder { .. })
        ));
        assert!(matches!(
            t.read_file(&p("Folder")),
            Err(TreeError::NotAFile { .. })
        ));
    }
}
