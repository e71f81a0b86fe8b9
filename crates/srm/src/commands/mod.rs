//! Command implementations

pub mod list;
pub mod remove;
pub mod restore;

use anyhow::{Context, Result};
use srm_backup::{absolutize, home_dir, BackupStore, StoreConfig};
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Mode};

/// Runs the mode selected on the command line
pub fn run(cli: &Cli) -> Result<()> {
    let config = StoreConfig::resolve(cli.backup_dir.clone(), home_dir())?
        .with_compression_level(cli.compression);
    let store = BackupStore::open(&config)
        .with_context(|| format!("Failed to open backup store {}", config.backup_dir.display()))?;

    match cli.mode() {
        Mode::Remove => remove::run(&store, &absolute_targets(&cli.paths)?, cli.quiet),
        Mode::Restore => restore::run(&store, &absolute_targets(&cli.paths)?, cli.quiet),
        Mode::List => list::run(&store),
    }
}

/// Resolves every target against the current directory
fn absolute_targets(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(paths.iter().map(|p| absolutize(p, &cwd)).collect())
}

/// Shortens a path for spinner messages
fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
