//! Archive extraction.
//!
//! The artifact is decompressed into a hidden tar intermediate next to it,
//! then replayed entry by entry under the output directory. Entries written
//! before a failure stay on disk; there is no rollback.

use crate::archive::{discard, staging_file, INTERMEDIATE_PREFIX};
use crate::compression::{copy_split, decompress_into, CopyError};
use crate::error::{Error, IoResultExt, Result};
use std::fs::{self, File, OpenOptions};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// Result of an unpack operation.
#[derive(Debug, Clone, Default)]
pub struct UnpackStats {
    /// Files and directories recreated
    pub entries: usize,

    /// Entries of unsupported types that were skipped
    pub skipped: usize,

    /// File content bytes written
    pub bytes_written: u64,
}

/// Unpacks backup artifacts into a directory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Recreates the tree stored in `artifact` under `output_dir`.
    ///
    /// The intermediate tar is created in `staging_dir` and removed before
    /// returning, whatever the outcome. The artifact itself is never touched.
    pub fn unpack(
        &self,
        artifact: &Path,
        staging_dir: &Path,
        output_dir: &Path,
    ) -> Result<UnpackStats> {
        let intermediate = staging_file(staging_dir, INTERMEDIATE_PREFIX, ".tar")?;
        let size = decompress_into(artifact, intermediate.as_file(), intermediate.path())?;
        debug!(
            "Decompressed {} into {} ({} bytes)",
            artifact.display(),
            intermediate.path().display(),
            size
        );

        let result = intermediate
            .reopen()
            .at(intermediate.path())
            .and_then(|reader| extract_tar(artifact, reader, output_dir));
        discard(intermediate);
        result
    }
}

fn extract_tar(artifact: &Path, reader: File, output_dir: &Path) -> Result<UnpackStats> {
    let corrupt = |e: std::io::Error| Error::corrupt(artifact, e.to_string());

    let mut archive = Archive::new(BufReader::new(reader));
    let mut stats = UnpackStats::default();
    let mut dir_modes = Vec::new();

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let raw_path = entry.path().map_err(corrupt)?.into_owned();
        let rel = sanitize_entry_path(artifact, &raw_path)?;
        let target = output_dir.join(&rel);
        let mode = entry.header().mode().ok().map(|m| m & 0o7777);
        let entry_type = entry.header().entry_type();

        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&target).at(&target)?;
                if let Some(mode) = mode {
                    dir_modes.push((target.clone(), mode));
                }
            }
            t if t.is_file() => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).at(parent)?;
                }
                let mut file = create_file(&target, mode)?;
                let written = copy_split(&mut entry, &mut file).map_err(|e| match e {
                    CopyError::Read(e) => corrupt(e),
                    CopyError::Write(e) => Error::io(&target, e),
                })?;
                if let Some(mode) = mode {
                    set_mode(&target, mode)?;
                }
                stats.bytes_written += written;
            }
            other => {
                warn!(
                    "Skipping unsupported entry {} ({:?}) in {}",
                    rel.display(),
                    other,
                    artifact.display()
                );
                stats.skipped += 1;
                continue;
            }
        }

        debug!("Restored {}", target.display());
        stats.entries += 1;
    }

    // Deepest first, so a read-only parent does not block its children.
    for (dir, mode) in dir_modes.into_iter().rev() {
        set_mode(&dir, mode)?;
    }

    Ok(stats)
}

/// Keeps entry paths inside the output directory.
fn sanitize_entry_path(artifact: &Path, path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::corrupt(
                    artifact,
                    format!("unsafe entry path {}", path.display()),
                ))
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(Error::corrupt(artifact, "empty entry path"));
    }
    Ok(clean)
}

fn create_file(path: &Path, mode: Option<u32>) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path).at(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).at(path)
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
