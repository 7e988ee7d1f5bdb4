//! Long-path diagnostics.
//!
//! Scans a directory tree and reports every path that would exceed a length limit
//! once the tree is installed under a different root. Used before and after a
//! layout rewrite to show its effect; it never changes anything on disk.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use walkdir::WalkDir;

/// Longest path (in characters) considered safe on the target filesystem.
pub const DEFAULT_PATH_LIMIT: usize = 240;

/// Result of a long-path scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LongPathScan {
    /// Characters added to every measured path (`assume_root` length minus base length).
    pub length_offset: isize,
    /// Length of the longest path found, offset included.
    pub longest_length: usize,
    /// Paths over the limit, longest first then case-insensitively by text.
    pub long_paths: Vec<String>,
    /// All paths sharing `longest_length`.
    pub longest_paths: Vec<String>,
}

impl LongPathScan {
    fn record(&mut self, path: String, limit: usize) {
        let len = offset_len(&path, self.length_offset);
        if len > limit {
            self.long_paths.push(path.clone());
        }
        match len.cmp(&self.longest_length) {
            Ordering::Greater => {
                self.longest_length = len;
                self.longest_paths.clear();
                self.longest_paths.push(path);
            }
            Ordering::Equal => self.longest_paths.push(path),
            Ordering::Less => {}
        }
    }
}

fn offset_len(path: &str, offset: isize) -> usize {
    let len = isize::try_from(path.chars().count()).unwrap_or(isize::MAX);
    usize::try_from(len.saturating_add(offset)).unwrap_or(0)
}

/// Scan `base` for paths longer than `limit`.
///
/// When `assume_root` is given, every path is measured as if `base` had been
/// replaced by `assume_root`, which simulates the final installation directory.
/// Directories are measured with a trailing separator.
///
/// # Errors
/// Returns an error if `base` or a directory below it cannot be read.
pub fn scan_long_paths(
    base: &Path,
    assume_root: Option<&Path>,
    limit: usize,
) -> io::Result<LongPathScan> {
    let base = absolute(base)?;
    let base_len = base.to_string_lossy().chars().count();

    let mut scan = LongPathScan::default();
    if let Some(root) = assume_root {
        let root_len = root.to_string_lossy().chars().count();
        scan.length_offset = isize::try_from(root_len).unwrap_or(isize::MAX)
            - isize::try_from(base_len).unwrap_or(isize::MAX);
    }

    let walker = WalkDir::new(&base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let mut text = entry.path().to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            text.push(MAIN_SEPARATOR);
        }
        scan.record(text, limit);
    }

    scan.long_paths.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
    });

    Ok(scan)
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
