//! Integration tests for the backup store
//!
//! Exercises remove / restore / list end-to-end against real temp
//! directories: round-trips, cleanup of intermediates, and the failure
//! paths that must leave sources and artifacts intact.

use srm_backup::{ArtifactId, BackupStore, EntryKind, Error, StoreConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ─── Helpers ───────────────────────────────────────────────────────────────

struct Fixture {
    _temp: TempDir,
    work: PathBuf,
    store: BackupStore,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let root = fs::canonicalize(temp.path()).unwrap();
    let work = root.join("work");
    fs::create_dir(&work).unwrap();
    let store = BackupStore::open(&StoreConfig::new(root.join("backups"))).unwrap();
    Fixture {
        _temp: temp,
        work,
        store,
    }
}

/// Names in the store other than the lock file.
fn store_files(store: &BackupStore) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(store.root())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != srm_backup::LOCK_FILE_NAME)
        .collect();
    names.sort();
    names
}

fn no_intermediates(store: &BackupStore) -> bool {
    store_files(store).iter().all(|name| !name.starts_with(".srm-"))
}

/// Relative path, content and mode of every entry under `root`, sorted.
fn snapshot(root: &Path) -> Vec<(PathBuf, Option<Vec<u8>>, u32)> {
    let mut items = Vec::new();
    for entry in walkdir_sorted(root) {
        let meta = fs::symlink_metadata(&entry).unwrap();
        let content = meta.is_file().then(|| fs::read(&entry).unwrap());
        items.push((
            entry.strip_prefix(root).unwrap().to_path_buf(),
            content,
            mode_of(&meta),
        ));
    }
    items
}

fn walkdir_sorted(root: &Path) -> Vec<PathBuf> {
    let mut out = vec![root.to_path_buf()];
    if root.is_dir() {
        let mut children: Vec<PathBuf> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        children.sort();
        for child in children {
            out.extend(walkdir_sorted(&child));
        }
    }
    out
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn chmod(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

// ─── Remove / restore / list ─────────────────────────────────────────────────────────────

#[test]
fn remove_then_restore_directory() {
    let f = fixture();
    let dir = f.work.join("D");
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("sub/a.txt"), "x").unwrap();

    let outcome = f.store.remove(&dir).unwrap();
    assert_eq!(outcome.kind, EntryKind::Directory);
    assert!(!outcome.replaced);
    assert!(!dir.exists());

    let artifacts: Vec<_> = store_files(&f.store)
        .into_iter()
        .filter(|n| n.ends_with(".tar.gz"))
        .collect();
    assert_eq!(artifacts, vec![ArtifactId::encode(&dir).archive_file_name()]);

    let restored = f.store.restore(&dir).unwrap();
    assert!(restored.verified);
    assert_eq!(fs::read_to_string(dir.join("sub/a.txt")).unwrap(), "x");
    assert!(store_files(&f.store).is_empty());
}

#[test]
fn list_of_empty_store_is_empty() {
    let f = fixture();
    assert!(f.store.list().unwrap().is_empty());
}

#[test]
fn restore_unknown_path_is_not_found() {
    let f = fixture();
    let target = f.work.join("never-removed");

    let err = f.store.restore(&target).unwrap_err();
    assert!(matches!(err, Error::BackupNotFound { .. }));
    assert!(err.to_string().contains("not found backup file"));
    assert!(!target.exists());
    assert!(store_files(&f.store).is_empty());
    assert_eq!(fs::read_dir(&f.work).unwrap().count(), 0);
}

#[test]
fn second_remove_of_same_path_is_not_found() {
    let f = fixture();
    let file = f.work.join("twice.txt");
    fs::write(&file, "once").unwrap();

    f.store.remove(&file).unwrap();
    let err = f.store.remove(&file).unwrap_err();
    assert!(matches!(err, Error::SourceNotFound { .. }));
    assert!(err.is_not_found());

    // the first backup is still restorable
    f.store.restore(&file).unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "once");
}

// ─── Properties ────────────────────────────────────────────────────────────

#[test]
fn round_trip_preserves_structure_contents_and_modes() {
    let f = fixture();
    let tree = f.work.join("tree");
    fs::create_dir_all(tree.join("bin")).unwrap();
    fs::create_dir_all(tree.join("empty/nested")).unwrap();
    fs::create_dir_all(tree.join("private")).unwrap();
    fs::write(tree.join("bin/run.sh"), "#!/bin/sh\necho hi\n").unwrap();
    fs::write(tree.join("private/secret"), vec![0u8, 159, 146, 150, 255]).unwrap();
    fs::write(tree.join("README"), "read me").unwrap();
    fs::write(tree.join("empty.dat"), b"").unwrap();
    fs::write(tree.join("large.bin"), vec![7u8; 256 * 1024 + 3]).unwrap();
    #[cfg(unix)]
    {
        chmod(&tree.join("bin/run.sh"), 0o755);
        chmod(&tree.join("private/secret"), 0o600);
        chmod(&tree.join("README"), 0o444);
        chmod(&tree.join("private"), 0o700);
        chmod(&tree.join("empty"), 0o750);
    }

    let before = snapshot(&tree);
    f.store.remove(&tree).unwrap();
    assert!(!tree.exists());

    f.store.restore(&tree).unwrap();
    assert_eq!(snapshot(&tree), before);
}

#[test]
fn round_trip_single_file() {
    let f = fixture();
    let file = f.work.join("notes.md");
    fs::write(&file, "# Notes\n").unwrap();
    #[cfg(unix)]
    chmod(&file, 0o640);
    let before = snapshot(&file);

    let outcome = f.store.remove(&file).unwrap();
    assert_eq!(outcome.kind, EntryKind::File);
    assert_eq!(outcome.entries, 1);

    f.store.restore(&file).unwrap();
    assert_eq!(snapshot(&file), before);
}

#[test]
fn restore_recreates_missing_parent() {
    let f = fixture();
    let parent = f.work.join("gone");
    let file = parent.join("inner.txt");
    fs::create_dir(&parent).unwrap();
    fs::write(&file, "kept").unwrap();

    f.store.remove(&file).unwrap();
    fs::remove_dir(&parent).unwrap();

    f.store.restore(&file).unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "kept");
}

#[test]
fn identical_path_identical_artifact_name() {
    let f = fixture();
    let file = f.work.join("same.txt");

    fs::write(&file, "v1").unwrap();
    let first = f.store.remove(&file).unwrap();
    fs::write(&file, "v2").unwrap();
    let second = f.store.remove(&file).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.artifact_path, second.artifact_path);
    assert!(second.replaced);
    assert_eq!(f.store.list().unwrap().len(), 1);

    // last remove wins
    f.store.restore(&file).unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "v2");
}

#[test]
fn list_is_sorted_and_shows_original_paths() {
    let f = fixture();
    for name in ["zeta", "alpha", "mid"] {
        let path = f.work.join(name);
        fs::write(&path, name).unwrap();
        f.store.remove(&path).unwrap();
    }
    let dir = f.work.join("beta-dir");
    fs::create_dir(&dir).unwrap();
    f.store.remove(&dir).unwrap();

    let entries = f.store.list().unwrap();
    let paths: Vec<&str> = entries.iter().map(|e| e.display_path()).collect();
    let expected: Vec<String> = ["alpha", "beta-dir", "mid", "zeta"]
        .iter()
        .map(|n| f.work.join(n).to_string_lossy().into_owned())
        .collect();
    assert_eq!(paths, expected);
    assert_eq!(entries[1].kind, Some(EntryKind::Directory));
    assert!(entries.iter().all(|e| e.created_at.is_some() && e.size_bytes > 0));
}

#[test]
fn no_intermediate_left_after_success() {
    let f = fixture();
    let dir = f.work.join("data");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a"), "a").unwrap();

    f.store.remove(&dir).unwrap();
    assert!(no_intermediates(&f.store));
    f.store.restore(&dir).unwrap();
    assert!(no_intermediates(&f.store));
}

#[cfg(unix)]
#[test]
fn failed_pack_keeps_source_and_leaves_nothing() {
    let f = fixture();
    let dir = f.work.join("with-link");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("real.txt"), "real").unwrap();
    std::os::unix::fs::symlink("real.txt", dir.join("alias")).unwrap();
    let before = fs::read_to_string(dir.join("real.txt")).unwrap();

    let err = f.store.remove(&dir).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFileType { .. }));
    assert!(dir.join("alias").exists());
    assert_eq!(fs::read_to_string(dir.join("real.txt")).unwrap(), before);
    assert!(store_files(&f.store).is_empty());
    assert!(!f.store.has_backup(&dir));
}

#[cfg(unix)]
#[test]
fn top_level_symlink_is_rejected() {
    let f = fixture();
    let target = f.work.join("target.txt");
    let link = f.work.join("link");
    fs::write(&target, "t").unwrap();
    std::os::unix::fs::symlink(&target, &link).unwrap();

    assert!(matches!(
        f.store.remove(&link),
        Err(Error::UnsupportedFileType { .. })
    ));
    assert!(fs::symlink_metadata(&link).is_ok());
}

#[test]
fn corrupt_artifact_is_preserved() {
    let f = fixture();
    let file = f.work.join("precious.txt");
    fs::write(&file, "precious").unwrap();
    let outcome = f.store.remove(&file).unwrap();

    // damage the artifact and drop its manifest so only gzip/tar can notice
    fs::write(&outcome.artifact_path, b"\x1f\x8b garbage").unwrap();
    fs::remove_file(f.store.manifest_path(&outcome.id)).unwrap();

    let err = f.store.restore(&file).unwrap_err();
    assert!(err.is_corrupt(), "unexpected error: {err}");
    assert!(outcome.artifact_path.exists());
    assert!(no_intermediates(&f.store));
    assert!(!file.exists());
}

#[test]
fn checksum_mismatch_is_preserved() {
    let f = fixture();
    let dir = f.work.join("proj");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("main.rs"), "fn main() {}").unwrap();
    let outcome = f.store.remove(&dir).unwrap();

    // swap in a valid artifact of different content
    let other = f.work.join("proj-other");
    fs::create_dir(&other).unwrap();
    let decoy = f.store.remove(&other).unwrap();
    fs::copy(&decoy.artifact_path, &outcome.artifact_path).unwrap();

    let err = f.store.restore(&dir).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(outcome.artifact_path.exists());
    assert!(f.store.manifest_path(&outcome.id).exists());
    assert!(!dir.exists());
}

#[test]
fn restore_without_manifest_still_works() {
    let f = fixture();
    let file = f.work.join("legacy.txt");
    fs::write(&file, "from an older store").unwrap();
    let outcome = f.store.remove(&file).unwrap();
    fs::remove_file(f.store.manifest_path(&outcome.id)).unwrap();

    let restored = f.store.restore(&file).unwrap();
    assert!(!restored.verified);
    assert_eq!(fs::read_to_string(&file).unwrap(), "from an older store");
}

#[test]
fn restore_overwrites_existing_file() {
    let f = fixture();
    let file = f.work.join("config.toml");
    fs::write(&file, "original").unwrap();
    f.store.remove(&file).unwrap();

    fs::write(&file, "recreated by someone else").unwrap();
    f.store.restore(&file).unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "original");
}

#[test]
fn orphans_swept_on_next_operation() {
    let f = fixture();
    let leftover = f.store.root().join(".srm-intermediate-crashed.tar");
    fs::write(&leftover, "partial tar").unwrap();

    let file = f.work.join("f");
    fs::write(&file, "f").unwrap();
    f.store.remove(&file).unwrap();

    assert!(!leftover.exists());
}

#[test]
fn failed_replace_keeps_previous_manifest() {
    let f = fixture();
    let file = f.work.join("report.txt");
    fs::write(&file, "v1").unwrap();
    let first = f.store.remove(&file).unwrap();
    let old_checksum = f.store.lookup(&first.id).unwrap().checksum.value;

    // a directory at the artifact name makes the final rename fail
    fs::remove_file(&first.artifact_path).unwrap();
    fs::create_dir(&first.artifact_path).unwrap();

    fs::write(&file, "v2").unwrap();
    let err = f.store.remove(&file).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "unexpected error: {err}");

    assert_eq!(fs::read_to_string(&file).unwrap(), "v2");
    let manifest = f.store.lookup(&first.id).unwrap();
    assert_eq!(manifest.checksum.value, old_checksum);
    assert!(no_intermediates(&f.store));
}

#[test]
fn unpack_write_failure_keeps_artifact() {
    let f = fixture();
    let dir = f.work.join("D");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.txt"), "a").unwrap();
    let outcome = f.store.remove(&dir).unwrap();

    // a regular file now occupies the directory's name
    fs::write(&dir, "squatter").unwrap();

    let err = f.store.restore(&dir).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "unexpected error: {err}");
    assert!(!err.is_corrupt());
    assert!(outcome.artifact_path.exists());
    assert!(f.store.manifest_path(&outcome.id).exists());
    assert!(no_intermediates(&f.store));
    assert_eq!(fs::read_to_string(&dir).unwrap(), "squatter");
}
