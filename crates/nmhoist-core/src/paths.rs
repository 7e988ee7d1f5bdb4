//! Locating the project and the directories modules are installed in.

use crate::config::SETTINGS_FILE_NAME;
use crate::pattern::MODULES_DIRECTORY_NAME;
use std::path::{Path, PathBuf};

/// Files whose presence marks a project root, in lookup order.
const ROOT_MARKERS: &[&str] = &[SETTINGS_FILE_NAME, "package.json", ".git"];

/// Nearest directory at or above `cwd` holding `nmhoist.json`, `package.json`
/// or `.git`.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

/// Directory of a module called `name` installed under `dir`.
#[must_use]
pub fn module_dir(dir: &Path, name: &str) -> PathBuf {
    dir.join(MODULES_DIRECTORY_NAME).join(name)
}
