//! Artifact naming.
//!
//! A backup artifact is named after the SHA-256 digest of the absolute path
//! it was created from. The digest is stable across runs, so restoring a path
//! only needs the path itself. The digest cannot be reversed; the original
//! path is kept in the sidecar manifest instead (see [`crate::manifest`]).

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Extension of every backup artifact in the store.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Extension of the sidecar manifest next to each artifact.
pub const MANIFEST_EXTENSION: &str = "json";

/// Length of a hex encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Filesystem-safe identifier of a backup artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Derives the identifier for an absolute source path.
    pub fn encode(path: &Path) -> Self {
        let hash = Sha256::digest(path.as_os_str().as_encoded_bytes());
        Self(format!("{:x}", hash))
    }

    /// Parses an identifier from a raw digest string.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == DIGEST_HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    /// Recovers the identifier from an artifact file name (`<id>.tar.gz`).
    pub fn from_artifact_name(name: &str) -> Option<Self> {
        name.strip_suffix(ARCHIVE_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .and_then(Self::parse)
    }

    /// Recovers the identifier from a manifest file name (`<id>.json`).
    pub fn from_manifest_name(name: &str) -> Option<Self> {
        name.strip_suffix(MANIFEST_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}.{}", self.0, ARCHIVE_EXTENSION)
    }

    pub fn manifest_file_name(&self) -> String {
        format!("{}.{}", self.0, MANIFEST_EXTENSION)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
