//! List command

use anyhow::Result;
use srm_backup::BackupStore;
use tracing::debug;

use crate::output;

/// Prints one original path per line, sorted
pub fn run(store: &BackupStore) -> Result<()> {
    let entries = store.list()?;
    debug!("{} backups in {}", entries.len(), store.root().display());

    for entry in &entries {
        match &entry.original_path {
            Some(path) => output::line(path),
            None => output::line(&format!("{} (original path not recorded)", entry.id)),
        }
    }
    Ok(())
}
