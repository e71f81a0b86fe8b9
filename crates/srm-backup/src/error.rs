//! Error types for srm-backup

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using srm-backup's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the backup store and archive pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Source path does not exist (remove)
    #[error("{}: no such file or directory", .path.display())]
    SourceNotFound { path: PathBuf },

    /// No artifact recorded for the path (restore)
    #[error("{}: not found backup file", .path.display())]
    BackupNotFound { path: PathBuf },

    /// Only absolute paths can be encoded
    #[error("{}: path must be absolute", .path.display())]
    RelativePath { path: PathBuf },

    /// Path is unusable for this operation
    #[error("{}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Path overlaps the backup store itself
    #[error("{}: refusing to archive the backup store {}", .path.display(), .store.display())]
    InsideStore { path: PathBuf, store: PathBuf },

    /// Symlinks, sockets, FIFOs and devices cannot be archived
    #[error("{}: unsupported file type ({kind})", .path.display())]
    UnsupportedFileType { path: PathBuf, kind: &'static str },

    /// Artifact could not be decoded
    #[error("{}: corrupt backup artifact: {message}", .artifact.display())]
    CorruptArtifact { artifact: PathBuf, message: String },

    /// Artifact content does not match its manifest
    #[error("{}: checksum mismatch (expected {expected}, found {actual})", .artifact.display())]
    ChecksumMismatch {
        artifact: PathBuf,
        expected: String,
        actual: String,
    },

    /// No sidecar manifest recorded for an artifact
    #[error("{id}: no manifest recorded for backup artifact")]
    ManifestMissing { id: String },

    /// Invalid or unsupported manifest
    #[error("{}: invalid manifest: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    /// Home directory could not be determined
    #[error("could not determine home directory")]
    HomeNotFound,

    /// IO error on a specific path
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an IO error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt artifact error
    pub fn corrupt(artifact: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for the not-found class of failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. } | Self::BackupNotFound { .. } | Self::ManifestMissing { .. }
        )
    }

    /// True when the artifact itself is damaged
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::CorruptArtifact { .. } | Self::ChecksumMismatch { .. }
        )
    }
}

/// Attaches a path to `std::io` results.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
