//! Validated path types.
//!
//! Paths here are *sandbox-relative* and purely lexical. [`ItemName`] is a
//! single validated segment; [`SandboxPath`] is a sequence of segments rooted
//! at the sandbox root (the empty path). Neither type ever touches the
//! filesystem, and neither can express `..`, absolute paths, or separators
//! inside a segment, which is what keeps a disk-backed tree confined to its
//! root by construction.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PathError
// ---------------------------------------------------------------------------

/// Error returned when a name or path string fails validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl PathError {
    fn new(value: &str, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_owned(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path: {:?} — {}", self.value, self.reason)
    }
}

impl std::error::Error for PathError {}

// ---------------------------------------------------------------------------
// ItemName
// ---------------------------------------------------------------------------

/// A single validated path segment.
///
/// Rejects anything that could change meaning when composed into a path:
/// empty strings, separators, `.` / `..`, NUL bytes, and surrounding
/// whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemName(String);

impl ItemName {
    /// Validate `s` as a path segment.
    ///
    /// # Errors
    /// Returns [`PathError`] if the segment is empty, contains a separator or
    /// NUL byte, is `.` or `..`, or has leading/trailing whitespace.
    pub fn new(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Err(PathError::new(s, "name must not be empty"));
        }
        if s == "." || s == ".." {
            return Err(PathError::new(s, "name must not be '.' or '..'"));
        }
        if s.contains('/') || s.contains('\\') {
            return Err(PathError::new(s, "name must not contain a path separator"));
        }
        if s.contains('\0') {
            return Err(PathError::new(s, "name must not contain NUL"));
        }
        if s != s.trim() {
            return Err(PathError::new(s, "name must not start or end with whitespace"));
        }
        Ok(Self(s.to_owned()))
    }

    /// Return the segment as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemName {
    type Error = PathError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<ItemName> for String {
    fn from(name: ItemName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// SandboxPath
// ---------------------------------------------------------------------------

/// A sandbox-relative path: zero or more validated segments.
///
/// The empty path is the sandbox root. Ordering is segment-wise, so the
/// subtree under a folder sorts contiguously after the folder itself — range
/// scans over a `BTreeMap<SandboxPath, _>` can enumerate a subtree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SandboxPath {
    segments: Vec<ItemName>,
}

impl SandboxPath {
    /// The sandbox root (empty path).
    #[must_use]
    pub const fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Parse a `/`-separated relative path. The empty string is the root.
    ///
    /// # Errors
    /// Returns [`PathError`] for absolute paths, trailing separators, empty
    /// segments, or any segment [`ItemName::new`] rejects.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        if s.starts_with('/') {
            return Err(PathError::new(s, "path must be relative"));
        }
        if s.ends_with('/') {
            return Err(PathError::new(s, "path must not end with a separator"));
        }
        let mut segments = Vec::new();
        for part in s.split('/') {
            if part.is_empty() {
                return Err(PathError::new(s, "path must not contain empty segments"));
            }
            let name = ItemName::new(part).map_err(|e| PathError::new(s, e.reason))?;
            segments.push(name);
        }
        Ok(Self { segments })
    }

    /// Build a path directly from segments.
    #[must_use]
    pub const fn from_segments(segments: Vec<ItemName>) -> Self {
        Self { segments }
    }

    /// Return `true` if this is the sandbox root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Return the path's segments.
    #[must_use]
    pub fn segments(&self) -> &[ItemName] {
        &self.segments
    }

    /// Number of segments (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Return a new path with `name` appended.
    #[must_use]
    pub fn join(&self, name: &ItemName) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.clone());
        Self { segments }
    }

    /// Return the parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Return the final segment, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&ItemName> {
        self.segments.last()
    }

    /// Return `true` if `prefix` is an ancestor of (or equal to) this path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl fmt::Display for SandboxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(seg.as_str())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for SandboxPath {
    type Error = PathError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SandboxPath> for String {
    fn from(path: SandboxPath) -> Self {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
