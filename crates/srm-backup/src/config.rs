//! Backup store configuration.
//!
//! The store location is resolved once by the caller and handed to
//! [`crate::BackupStore::open`]; nothing in this crate reads the
//! environment on its own.

use crate::compression::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Directory name of the store inside the home directory.
pub const BACKUP_DIR_NAME: &str = ".srm";

/// Environment variable overriding the store location.
pub const BACKUP_DIR_ENV: &str = "SRM_BACKUP_DIR";

/// Configuration for a backup store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding artifacts and manifests
    pub backup_dir: PathBuf,

    /// Gzip level (1-9)
    pub compression_level: u32,
}

impl StoreConfig {
    /// Creates a configuration for an explicit store directory.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Store located at `<home>/.srm`.
    pub fn in_home(home: &Path) -> Self {
        Self::new(home.join(BACKUP_DIR_NAME))
    }

    /// Picks the explicit directory if given, else `<home>/.srm`.
    pub fn resolve(explicit: Option<PathBuf>, home: Option<PathBuf>) -> Result<Self> {
        match (explicit, home) {
            (Some(dir), _) => Ok(Self::new(dir)),
            (None, Some(home)) => Ok(Self::in_home(&home)),
            (None, None) => Err(Error::HomeNotFound),
        }
    }

    /// Sets the compression level.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.clamp(1, 9);
        self
    }
}

/// Get the user's home directory
///
/// Prefers the HOME environment variable so that an overridden HOME is
/// honoured, falling back to the platform lookup.
pub fn home_dir() -> Option<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
        _ => dirs::home_dir(),
    }
}
