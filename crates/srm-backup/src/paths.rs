//! Lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Makes `path` absolute against `cwd` and folds `.` and `..` lexically.
///
/// Symlinks are not resolved: the result names the path the user typed,
/// which is what artifact identifiers are derived from.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut clean = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `/..` stays `/`
                if clean.file_name().is_some() {
                    clean.pop();
                }
            }
            other => clean.push(other.as_os_str()),
        }
    }
    clean
}
