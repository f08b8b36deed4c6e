//! Content fingerprinting.
//!
//! A [`Fingerprint`] is the SHA-256 digest of a document body, rendered as
//! `sha256:<hex>`. It is only ever compared for equality: the sync engine
//! skips a document when the fingerprint stored in its mapping matches the
//! fingerprint of the current body.
//!
//! # Example
//!
//! ```rust
//! use notion_sync_core::fingerprint::fingerprint;
//!
//! let a = fingerprint(b"# A");
//! assert_eq!(a, fingerprint(b"# A"));
//! assert_ne!(a, fingerprint(b"# A!"));
//! assert!(a.as_str().starts_with("sha256:"));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Algorithm prefix written in front of every hex digest.
pub const ALGORITHM: &str = "sha256";

/// Opaque content digest used as an equality token.
///
/// Stored values read back from a mapping file are kept verbatim, so a
/// digest written by another tool compares unequal rather than failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already encoded digest (e.g. one read from the mapping file).
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of raw bytes.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(format!("{}:{:x}", ALGORITHM, hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(fingerprint(b"hello"), fingerprint(b"hello"));
    }

    #[test]
    fn test_single_byte_difference() {
        assert_ne!(fingerprint(b"hello"), fingerprint(b"hellp"));
    }

    #[test]
    fn test_encoding_shape() {
        let fp = fingerprint(b"");
        assert_eq!(
            fp.as_str(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_from_encoded_roundtrips_display() {
        let fp = Fingerprint::from_encoded("md5:abc");
        assert_eq!(fp.to_string(), "md5:abc");
        assert_ne!(fp, fingerprint(b"abc"));
    }
}
