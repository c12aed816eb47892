//! Shared helpers for unit tests.

use std::fs;
use std::path::Path;

/// Writes each `(relative_path, content)` pair under `root`, creating
/// parent directories as needed.
pub(crate) fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}
