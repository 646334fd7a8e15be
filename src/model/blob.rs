//! Content identity for file bytes.
//!
//! A [`ContentDigest`] is the SHA-256 of a file's bytes. Change records carry
//! digests rather than bytes so the change list serializes small; the actual
//! baseline bytes needed for rollback live on the item table.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// SHA-256 digest of file content, serialized as 64 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Parse a digest from a 64-character lowercase hex string.
    ///
    /// # Errors
    /// Returns an error unless the string is exactly 64 lowercase hex digits.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        if s.len() != 64 {
            return Err(DigestError {
                value: s.to_owned(),
                reason: format!("expected 64 hex characters, got {}", s.len()),
            });
        }
        let mut out = [0_u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or_else(|| DigestError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            })?;
            let lo = hex_val(chunk[1]).ok_or_else(|| DigestError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            })?;
            out[i] = (hi << 4) | lo;
        }
        Ok(Self(out))
    }

    /// Return a 64-character lowercase hex representation.
    #[must_use]
    pub fn to_hex(self) -> String {
        let mut s = String::with_capacity(64);
        for b in self.0 {
            use fmt::Write;
            // Infallible for String.
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

const fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight chars identify a digest well enough in logs and test output.
        write!(f, "ContentDigest({}..)", &self.to_hex()[..8])
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = DigestError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.to_hex()
    }
}

/// Error returned when a digest string is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ContentDigest: {:?} — {}", self.value, self.reason)
    }
}

impl std::error::Error for DigestError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
