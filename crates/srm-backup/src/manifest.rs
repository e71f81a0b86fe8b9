//! Sidecar manifest format and metadata.
//!
//! Artifact names are one-way digests, so every artifact gets a small JSON
//! document next to it recording the path it came from, what kind of entry
//! it was, and the checksum of the compressed archive.

use crate::compression::CompressionStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Version of the manifest format.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Checksum algorithm recorded in manifests.
pub const CHECKSUM_ALGORITHM: &str = "sha256";

/// Compression recorded in manifests.
pub const COMPRESSION: &str = "gzip";

/// Kind of the archived source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// Manifest stored beside each backup artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Manifest format version
    pub version: String,

    /// Absolute path the artifact was created from
    pub original_path: String,

    /// Whether the source was a file or a directory
    pub kind: EntryKind,

    /// When the artifact was created
    pub created_at: DateTime<Utc>,

    /// What created this artifact (e.g., "srm v0.1.0")
    pub created_by: String,

    /// Compression algorithm used
    pub compression: String,

    /// Checksum of the compressed artifact
    pub checksum: ChecksumInfo,

    /// Archive statistics
    pub statistics: ArchiveStatistics,
}

/// Checksum information for integrity verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumInfo {
    /// Hash algorithm (sha256)
    pub algorithm: String,

    /// Hex-encoded checksum value
    pub value: String,
}

/// Statistics about the archived tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStatistics {
    /// Number of files and directories in the archive
    pub entries: usize,

    /// Size of the uncompressed tar stream in bytes
    pub total_size_bytes: u64,

    /// Size of the compressed artifact in bytes
    pub compressed_size_bytes: u64,
}

impl ArtifactManifest {
    /// Creates a manifest for a freshly packed source.
    pub fn new(source: &Path, kind: EntryKind, entries: usize, stats: &CompressionStats) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            original_path: source.to_string_lossy().into_owned(),
            kind,
            created_at: Utc::now(),
            created_by: format!("srm v{}", env!("CARGO_PKG_VERSION")),
            compression: COMPRESSION.to_string(),
            checksum: ChecksumInfo {
                algorithm: CHECKSUM_ALGORITHM.to_string(),
                value: stats.checksum.clone(),
            },
            statistics: ArchiveStatistics {
                entries,
                total_size_bytes: stats.original_size,
                compressed_size_bytes: stats.compressed_size,
            },
        }
    }

    /// Serializes the manifest to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes a manifest from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Checks that the manifest was written by a compatible version.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != MANIFEST_VERSION {
            return Err(format!(
                "incompatible manifest version: {} (expected {})",
                self.version, MANIFEST_VERSION
            ));
        }

        if self.checksum.algorithm != CHECKSUM_ALGORITHM {
            return Err(format!(
                "unsupported checksum algorithm: {}",
                self.checksum.algorithm
            ));
        }

        if self.compression != COMPRESSION {
            return Err(format!("unsupported compression: {}", self.compression));
        }

        Ok(())
    }
}
