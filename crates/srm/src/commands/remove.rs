//! Remove command: archive each target into the store, then delete it

use anyhow::Result;
use srm_backup::BackupStore;
use std::path::PathBuf;
use tracing::info;

use super::short_name;
use crate::output;

/// Removes targets in order, stopping at the first failure
pub fn run(store: &BackupStore, targets: &[PathBuf], quiet: bool) -> Result<()> {
    for target in targets {
        let spinner = output::spinner(&format!("Archiving {}...", short_name(target)), quiet);
        let result = store.remove(target);
        spinner.finish_and_clear();

        let outcome = result?;
        info!(
            "{} -> {} ({} entries, {} bytes{})",
            target.display(),
            outcome.artifact_path.display(),
            outcome.entries,
            outcome.compressed_size,
            if outcome.replaced { ", replaced older backup" } else { "" }
        );
    }
    Ok(())
}
