//! srm backup store
//!
//! This crate provides the archive/restore core behind `srm`, a safe
//! replacement for `rm`. Instead of deleting a path it is packed into a
//! per-user backup store, from which it can later be restored by its
//! original path.
//!
//! # Features
//!
//! - **Stable artifact names**: `sha256(path)` hex digests, so a restore
//!   only needs the path that was removed
//! - **Streaming tar+gzip**: files and directory trees round-trip with
//!   their relative layout, contents and permission bits
//! - **Sidecar manifests**: JSON metadata with the original path and a
//!   SHA256 checksum of each artifact
//! - **Crash safety**: intermediates are scoped temp files, artifacts are
//!   renamed into place, and the store is guarded by an advisory lock
//!
//! # Examples
//!
//! ```no_run
//! use srm_backup::{BackupStore, StoreConfig};
//! use std::path::Path;
//!
//! fn main() -> srm_backup::Result<()> {
//!     let store = BackupStore::open(&StoreConfig::new("/home/user/.srm"))?;
//!
//!     store.remove(Path::new("/home/user/old-project"))?;
//!     for entry in store.list()? {
//!         println!("{}", entry.display_path());
//!     }
//!     store.restore(Path::new("/home/user/old-project"))?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod paths;
pub mod store;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, StagedArtifact};
pub use codec::{ArtifactId, ARCHIVE_EXTENSION, MANIFEST_EXTENSION};
pub use compression::{calculate_checksum, CompressionStats, DEFAULT_COMPRESSION_LEVEL};
pub use config::{home_dir, StoreConfig, BACKUP_DIR_ENV, BACKUP_DIR_NAME};
pub use error::{Error, Result};
pub use extract::{ArchiveExtractor, UnpackStats};
pub use manifest::{ArtifactManifest, EntryKind, MANIFEST_VERSION};
pub use paths::absolutize;
pub use store::{BackupEntry, BackupStore, RemoveOutcome, RestoreOutcome, LOCK_FILE_NAME};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
