//! Restore command: recreate each target from the store

use anyhow::Result;
use srm_backup::BackupStore;
use std::path::PathBuf;
use tracing::info;

use super::short_name;
use crate::output;

/// Restores targets in order, stopping at the first failure
pub fn run(store: &BackupStore, targets: &[PathBuf], quiet: bool) -> Result<()> {
    for target in targets {
        let spinner = output::spinner(&format!("Restoring {}...", short_name(target)), quiet);
        let result = store.restore(target);
        spinner.finish_and_clear();

        let outcome = result?;
        info!(
            "Restored {} ({} entries, {} bytes{})",
            outcome.restored_path.display(),
            outcome.stats.entries,
            outcome.stats.bytes_written,
            if outcome.verified { ", checksum ok" } else { "" }
        );
    }
    Ok(())
}
