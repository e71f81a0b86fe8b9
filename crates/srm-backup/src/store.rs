//! The backup store.
//!
//! A flat directory of `<id>.tar.gz` artifacts, each with an `<id>.json`
//! manifest beside it. An artifact's presence is what makes a path
//! restorable. Every mutating operation holds an exclusive advisory lock on
//! `.srm.lock`; listing holds a shared one. Artifacts are renamed into place
//! only once complete, so a listing never sees a half-written archive.

use crate::archive::{classify, ArchiveBuilder, INTERMEDIATE_PREFIX, PARTIAL_PREFIX};
use crate::codec::ArtifactId;
use crate::compression::calculate_checksum;
use crate::config::StoreConfig;
use crate::error::{Error, IoResultExt, Result};
use crate::extract::{ArchiveExtractor, UnpackStats};
use crate::manifest::{ArtifactManifest, EntryKind};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Advisory lock file inside the store.
pub const LOCK_FILE_NAME: &str = ".srm.lock";

/// Prefix of a manifest written ahead of its artifact. It becomes
/// `<id>.json` only once the artifact it describes is in place.
pub const PENDING_PREFIX: &str = ".srm-pending-";

/// Result of removing a path.
#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub id: ArtifactId,
    pub artifact_path: PathBuf,
    pub kind: EntryKind,
    pub entries: usize,
    pub compressed_size: u64,
    /// An older backup of the same path was overwritten
    pub replaced: bool,
}

/// Result of restoring a path.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub id: ArtifactId,
    pub restored_path: PathBuf,
    pub stats: UnpackStats,
    /// Checksum was verified against the manifest
    pub verified: bool,
}

/// One artifact in the store, as reported by [`BackupStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    pub id: ArtifactId,
    /// `None` when no manifest is recorded for the artifact
    pub original_path: Option<String>,
    pub kind: Option<EntryKind>,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

impl BackupEntry {
    /// Original path, or the digest when the path is unknown.
    pub fn display_path(&self) -> &str {
        self.original_path.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Held for the duration of a store operation; released on drop.
struct StoreLock {
    _file: File,
}

/// Per-user store of backup artifacts.
#[derive(Debug)]
pub struct BackupStore {
    root: PathBuf,
    builder: ArchiveBuilder,
    extractor: ArchiveExtractor,
}

impl BackupStore {
    /// Opens the store, creating its directory (mode 0700) if needed.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        create_store_dir(&config.backup_dir)?;
        let root = fs::canonicalize(&config.backup_dir).at(&config.backup_dir)?;
        debug!("Using backup store {}", root.display());

        Ok(Self {
            root,
            builder: ArchiveBuilder::new(config.compression_level),
            extractor: ArchiveExtractor::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(id.archive_file_name())
    }

    pub fn manifest_path(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(id.manifest_file_name())
    }

    fn pending_manifest_path(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(format!("{}{}", PENDING_PREFIX, id.manifest_file_name()))
    }

    /// True if a backup of `source` is present.
    pub fn has_backup(&self, source: &Path) -> bool {
        self.artifact_path(&ArtifactId::encode(source)).is_file()
    }

    /// Archives `source` into the store, then deletes it.
    ///
    /// The source is left untouched unless the artifact and its manifest
    /// are both in place. A previous backup of the same path is replaced.
    pub fn remove(&self, source: &Path) -> Result<RemoveOutcome> {
        ensure_absolute(source)?;
        let metadata = fs::symlink_metadata(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::SourceNotFound {
                path: source.to_path_buf(),
            },
            _ => Error::io(source, e),
        })?;
        classify(source, &metadata)?;
        self.ensure_outside_store(source)?;

        let _lock = self.lock_exclusive()?;
        self.sweep_locked()?;

        let id = ArtifactId::encode(source);
        let artifact_path = self.artifact_path(&id);
        let replaced = artifact_path.exists();
        if replaced {
            warn!("Replacing existing backup of {}", source.display());
        }

        info!("Archiving {} as {}", source.display(), id.archive_file_name());
        let staged = self.builder.pack(source, &self.root)?;
        let manifest = ArtifactManifest::new(source, staged.kind, staged.entries, &staged.stats);
        let pending = self.write_pending_manifest(&id, &manifest)?;

        let kind = staged.kind;
        let entries = staged.entries;
        let compressed_size = staged.stats.compressed_size;
        if let Err(e) = staged.persist(&artifact_path) {
            remove_if_exists(&pending);
            return Err(e);
        }
        let manifest_path = self.manifest_path(&id);
        fs::rename(&pending, &manifest_path).at(&manifest_path)?;

        match kind {
            EntryKind::Directory => fs::remove_dir_all(source).at(source)?,
            EntryKind::File => fs::remove_file(source).at(source)?,
        }
        info!("Removed {}", source.display());

        Ok(RemoveOutcome {
            id,
            artifact_path,
            kind,
            entries,
            compressed_size,
            replaced,
        })
    }

    /// Recreates `source` from its backup and deletes the backup.
    ///
    /// The tree is unpacked into the parent of `source`. Existing files at
    /// the destination are overwritten. On failure the artifact is kept.
    pub fn restore(&self, source: &Path) -> Result<RestoreOutcome> {
        ensure_absolute(source)?;
        let parent = match (source.parent(), source.file_name()) {
            (Some(parent), Some(_)) => parent,
            _ => return Err(Error::invalid_path(source, "path has no parent directory")),
        };

        let id = ArtifactId::encode(source);
        let artifact_path = self.artifact_path(&id);
        let not_found = || Error::BackupNotFound {
            path: source.to_path_buf(),
        };
        if !artifact_path.is_file() {
            return Err(not_found());
        }

        let _lock = self.lock_exclusive()?;
        if !artifact_path.is_file() {
            return Err(not_found());
        }
        self.sweep_locked()?;

        let verified = self.verify(&id, &artifact_path)?;
        fs::create_dir_all(parent).at(parent)?;

        info!("Restoring {} from {}", source.display(), artifact_path.display());
        let stats = self.extractor.unpack(&artifact_path, &self.root, parent)?;

        fs::remove_file(&artifact_path).at(&artifact_path)?;
        remove_if_exists(&self.manifest_path(&id));
        info!("Restored {} ({} entries)", source.display(), stats.entries);

        Ok(RestoreOutcome {
            id,
            restored_path: source.to_path_buf(),
            stats,
            verified,
        })
    }

    /// Lists every artifact, sorted by original path.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        let _lock = self.lock_shared()?;

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root).at(&self.root)? {
            let dir_entry = dir_entry.at(&self.root)?;
            let file_name = dir_entry.file_name();
            let Some(id) = file_name.to_str().and_then(ArtifactId::from_artifact_name) else {
                continue;
            };

            let size_bytes = dir_entry.metadata().at(&dir_entry.path())?.len();
            let manifest = match self.lookup(&id) {
                Ok(manifest) => Some(manifest),
                Err(Error::ManifestMissing { .. }) => None,
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };

            entries.push(BackupEntry {
                original_path: manifest.as_ref().map(|m| m.original_path.clone()),
                kind: manifest.as_ref().map(|m| m.kind),
                created_at: manifest.as_ref().map(|m| m.created_at),
                id,
                size_bytes,
            });
        }

        entries.sort_by(|a, b| {
            a.display_path()
                .cmp(b.display_path())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    /// Reads the manifest recorded for an artifact.
    pub fn lookup(&self, id: &ArtifactId) -> Result<ArtifactManifest> {
        let path = self.manifest_path(id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ManifestMissing {
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(Error::io(&path, e)),
        };
        ArtifactManifest::from_json(&json).map_err(|e| Error::invalid_manifest(&path, e.to_string()))
    }

    /// Deletes temp files left by interrupted runs and manifests whose
    /// artifact is gone. Returns the number of files removed.
    pub fn sweep_orphans(&self) -> Result<usize> {
        let _lock = self.lock_exclusive()?;
        self.sweep_locked()
    }

    fn sweep_locked(&self) -> Result<usize> {
        let mut names = Vec::new();
        for dir_entry in fs::read_dir(&self.root).at(&self.root)? {
            let dir_entry = dir_entry.at(&self.root)?;
            names.push(dir_entry.file_name().to_string_lossy().into_owned());
        }

        let mut removed = 0;
        for name in names {
            if let Some(id) = name
                .strip_prefix(PENDING_PREFIX)
                .and_then(ArtifactId::from_manifest_name)
            {
                if !self.settle_pending(&id)? {
                    removed += 1;
                }
                continue;
            }

            let orphan = if name.starts_with(INTERMEDIATE_PREFIX) || name.starts_with(PARTIAL_PREFIX)
            {
                true
            } else if let Some(id) = ArtifactId::from_manifest_name(&name) {
                !self.artifact_path(&id).exists()
            } else {
                false
            };
            if !orphan {
                continue;
            }

            let path = self.root.join(&name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed orphan {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove orphan {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Cleaned up {} orphaned files in {}", removed, self.root.display());
        }
        Ok(removed)
    }

    /// Resolves a pending manifest left by an interrupted remove.
    ///
    /// If the artifact on disk is the one the pending manifest describes,
    /// the manifest is promoted; otherwise the artifact still belongs to
    /// the current manifest and the pending one is dropped. Returns `true`
    /// when the manifest was promoted.
    fn settle_pending(&self, id: &ArtifactId) -> Result<bool> {
        let pending = self.pending_manifest_path(id);
        let artifact_path = self.artifact_path(id);

        let manifest = fs::read_to_string(&pending)
            .ok()
            .and_then(|json| ArtifactManifest::from_json(&json).ok());
        let matches = match manifest {
            Some(manifest) if artifact_path.is_file() => {
                calculate_checksum(&artifact_path)? == manifest.checksum.value
            }
            _ => false,
        };

        if matches {
            let manifest_path = self.manifest_path(id);
            fs::rename(&pending, &manifest_path).at(&manifest_path)?;
            info!("Recovered manifest for {}", artifact_path.display());
        } else {
            remove_if_exists(&pending);
            debug!("Dropped stale manifest {}", pending.display());
        }
        Ok(matches)
    }

    /// Checks the artifact against its manifest. A missing or unreadable
    /// manifest is not fatal; gzip and tar still detect damaged data.
    fn verify(&self, id: &ArtifactId, artifact_path: &Path) -> Result<bool> {
        let manifest = match self.lookup(id) {
            Ok(manifest) => manifest,
            Err(Error::ManifestMissing { .. }) => {
                warn!("No manifest for {}; skipping checksum verification", id);
                return Ok(false);
            }
            Err(e @ Error::InvalidManifest { .. }) => {
                warn!("{}; skipping checksum verification", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if let Err(message) = manifest.validate() {
            warn!("{}: {}; skipping checksum verification", id, message);
            return Ok(false);
        }

        let actual = calculate_checksum(artifact_path)?;
        if actual != manifest.checksum.value {
            return Err(Error::ChecksumMismatch {
                artifact: artifact_path.to_path_buf(),
                expected: manifest.checksum.value,
                actual,
            });
        }
        debug!("Checksum verified for {}", artifact_path.display());
        Ok(true)
    }

    /// Writes the manifest under its pending name and returns that path.
    fn write_pending_manifest(
        &self,
        id: &ArtifactId,
        manifest: &ArtifactManifest,
    ) -> Result<PathBuf> {
        let path = self.pending_manifest_path(id);
        let json = manifest.to_json()?;

        let mut temp = crate::archive::staging_file(&self.root, PARTIAL_PREFIX, ".json")?;
        temp.write_all(json.as_bytes()).at(temp.path())?;
        temp.as_file().sync_all().at(temp.path())?;
        temp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        Ok(path)
    }

    fn ensure_outside_store(&self, source: &Path) -> Result<()> {
        let resolved = fs::canonicalize(source).at(source)?;
        if resolved.starts_with(&self.root) || self.root.starts_with(&resolved) {
            return Err(Error::InsideStore {
                path: source.to_path_buf(),
                store: self.root.clone(),
            });
        }
        Ok(())
    }

    fn open_lock_file(&self) -> Result<(File, PathBuf)> {
        let path = self.root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .at(&path)?;
        Ok((file, path))
    }

    fn lock_exclusive(&self) -> Result<StoreLock> {
        let (file, path) = self.open_lock_file()?;
        file.lock_exclusive().at(&path)?;
        Ok(StoreLock { _file: file })
    }

    fn lock_shared(&self) -> Result<StoreLock> {
        let (file, path) = self.open_lock_file()?;
        FileExt::lock_shared(&file).at(&path)?;
        Ok(StoreLock { _file: file })
    }
}

fn ensure_absolute(path: &Path) -> Result<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(Error::RelativePath {
            path: path.to_path_buf(),
        })
    }
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn create_store_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).at(dir)?;
    info!("Created backup store {}", dir.display());
    Ok(())
}
