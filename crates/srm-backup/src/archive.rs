//! Archive creation for backups.
//!
//! A source tree is written to an uncompressed tar intermediate, which is
//! then streamed through gzip into a partial artifact. Both live in the
//! staging directory as hidden temp files and are deleted on drop, so no
//! error path can leave them behind. The caller decides when the partial
//! artifact is renamed to its final name.

use crate::compression::{compress_into, CompressionStats, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{Error, IoResultExt, Result};
use crate::manifest::EntryKind;
use std::fs::{self, File, FileType, Metadata};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder as TarBuilder, HeaderMode};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Prefix of uncompressed intermediates in the staging directory.
pub const INTERMEDIATE_PREFIX: &str = ".srm-intermediate-";

/// Prefix of artifacts that are still being written.
pub const PARTIAL_PREFIX: &str = ".srm-partial-";

/// A compressed artifact that has not been moved to its final name yet.
#[derive(Debug)]
pub struct StagedArtifact {
    file: NamedTempFile,

    /// Kind of the packed source
    pub kind: EntryKind,

    /// Number of tar entries written
    pub entries: usize,

    /// Sizes and checksum of the compressed artifact
    pub stats: CompressionStats,
}

impl StagedArtifact {
    /// Current (temporary) location of the artifact.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Atomically renames the artifact to `dest`, replacing any file there.
    pub fn persist(self, dest: &Path) -> Result<()> {
        self.file
            .persist(dest)
            .map_err(|e| Error::io(dest, e.error))?;
        Ok(())
    }
}

/// Archive builder for packing a file or directory tree.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    compression_level: u32,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl ArchiveBuilder {
    /// Creates a new archive builder; the level is clamped to 1-9.
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level: compression_level.clamp(1, 9),
        }
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Packs `source` into a staged artifact inside `staging_dir`.
    ///
    /// Entries are named relative to the source's parent, so the archive's
    /// single top-level entry is the source's own base name.
    pub fn pack(&self, source: &Path, staging_dir: &Path) -> Result<StagedArtifact> {
        let metadata = fs::symlink_metadata(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::SourceNotFound {
                path: source.to_path_buf(),
            },
            _ => Error::io(source, e),
        })?;
        let kind = classify(source, &metadata)?;

        let intermediate = staging_file(staging_dir, INTERMEDIATE_PREFIX, ".tar")?;
        let entries = self.write_tar(source, intermediate.as_file(), intermediate.path())?;
        debug!(
            "Wrote {} entries for {} to {}",
            entries,
            source.display(),
            intermediate.path().display()
        );

        let artifact = staging_file(staging_dir, PARTIAL_PREFIX, ".tar.gz")?;
        let stats = compress_into(
            intermediate.path(),
            artifact.as_file(),
            artifact.path(),
            self.compression_level,
        )?;
        artifact.as_file().sync_all().at(artifact.path())?;
        discard(intermediate);

        debug!(
            "Compressed {} -> {} bytes ({:.1}%)",
            stats.original_size,
            stats.compressed_size,
            stats.compression_ratio() * 100.0
        );

        Ok(StagedArtifact {
            file: artifact,
            kind,
            entries,
            stats,
        })
    }

    /// Writes the tar stream for `source` into `out`.
    fn write_tar(&self, source: &Path, out: &File, out_path: &Path) -> Result<usize> {
        let base = source
            .file_name()
            .ok_or_else(|| Error::invalid_path(source, "path has no final component"))?;

        let mut tar = TarBuilder::new(BufWriter::new(out));
        tar.mode(HeaderMode::Complete);
        tar.follow_symlinks(false);

        let mut count = 0;
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(walk_error)?;
            let path = entry.path();
            let rel = path
                .strip_prefix(source)
                .map_err(|_| Error::invalid_path(path, "outside of the source tree"))?;
            let name = if rel.as_os_str().is_empty() {
                PathBuf::from(base)
            } else {
                Path::new(base).join(rel)
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                tar.append_dir(&name, path).at(path)?;
            } else if file_type.is_file() {
                tar.append_path_with_name(path, &name).at(path)?;
            } else {
                return Err(Error::UnsupportedFileType {
                    path: path.to_path_buf(),
                    kind: special_kind(&file_type),
                });
            }

            debug!("Added {}", name.display());
            count += 1;
        }

        let mut writer = tar.into_inner().at(out_path)?;
        writer.flush().at(out_path)?;
        Ok(count)
    }
}

/// Determines whether a source path can be archived.
pub fn classify(path: &Path, metadata: &Metadata) -> Result<EntryKind> {
    let file_type = metadata.file_type();
    if file_type.is_dir() {
        Ok(EntryKind::Directory)
    } else if file_type.is_file() {
        Ok(EntryKind::File)
    } else {
        Err(Error::UnsupportedFileType {
            path: path.to_path_buf(),
            kind: special_kind(&file_type),
        })
    }
}

/// Creates a hidden temp file in the staging directory.
pub(crate) fn staging_file(dir: &Path, prefix: &str, suffix: &str) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .at(dir)
}

/// Deletes a temp file now; a failure only warrants a warning.
pub(crate) fn discard(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    Error::io(path, io::Error::from(err))
}

#[cfg(unix)]
fn special_kind(file_type: &FileType) -> &'static str {
    use std::os::unix::fs::FileTypeExt;

    if file_type.is_symlink() {
        "symbolic link"
    } else if file_type.is_socket() {
        "socket"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_char_device() {
        "character device"
    } else {
        "special file"
    }
}

#[cfg(not(unix))]
fn special_kind(file_type: &FileType) -> &'static str {
    if file_type.is_symlink() {
        "symbolic link"
    } else {
        "special file"
    }
}
