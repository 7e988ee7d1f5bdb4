//! Module weights.
//!
//! A module's weight is how many characters its own files add to a path. The
//! tree stores four numbers per module; see [`ModuleNode::weight`] and friends.

use crate::error::Result;
use crate::paths::module_dir;
use crate::pattern::{IgnoreSet, MODULES_DIRECTORY_NAME};
use crate::tree::{ModuleTree, NodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[cfg(doc)]
use crate::tree::ModuleNode;

/// Measures the longest path inside a module directory.
pub trait PathMeasure {
    /// Length in characters of the longest path below `dir`, relative to `dir`
    /// and including the leading separator. Ignored entries (and everything
    /// under ignored directories) do not count. A missing directory measures 0.
    ///
    /// # Errors
    /// Returns an error if the directory exists but cannot be read.
    fn longest_relative_path(&self, dir: &Path, ignore: &IgnoreSet) -> Result<usize>;
}

/// Measures real directories on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskMeasure;

impl PathMeasure for DiskMeasure {
    fn longest_relative_path(&self, dir: &Path, ignore: &IgnoreSet) -> Result<usize> {
        Ok(nmhoist_util::fs::longest_relative_path(dir, |name| {
            ignore.is_ignored(name)
        })?)
    }
}

/// Fixed lengths keyed by directory, for listings whose modules are not on disk.
/// Directories without an entry measure 0.
#[derive(Debug, Clone, Default)]
pub struct StaticMeasure {
    lengths: HashMap<PathBuf, usize>,
}

impl StaticMeasure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticMeasure::insert`].
    #[must_use]
    pub fn with(mut self, dir: impl Into<PathBuf>, length: usize) -> Self {
        self.insert(dir, length);
        self
    }

    pub fn insert(&mut self, dir: impl Into<PathBuf>, length: usize) {
        self.lengths.insert(dir.into(), length);
    }
}

impl PathMeasure for StaticMeasure {
    fn longest_relative_path(&self, dir: &Path, _ignore: &IgnoreSet) -> Result<usize> {
        Ok(self.lengths.get(dir).copied().unwrap_or(0))
    }
}

impl ModuleTree {
    /// Compute weights for every module, tombstoned ones included.
    ///
    /// The root is measured at `root_path` and each child at
    /// `<parent dir>/node_modules/<name>`, regardless of any `real_path`
    /// recorded in the listing. Running it twice gives the same numbers.
    ///
    /// # Errors
    /// Propagates measurement errors.
    pub fn calculate_weights(
        &mut self,
        root_path: &Path,
        ignore: &IgnoreSet,
        measure: &dyn PathMeasure,
    ) -> Result<()> {
        // parents are always finished before their children are popped
        let mut pending: Vec<(NodeId, PathBuf)> = vec![(self.root(), root_path.to_path_buf())];
        while let Some((id, dir)) = pending.pop() {
            let parent_weight = self
                .parent(id)
                .map_or(0, |p| self.get(p).full_weight_as_parent);
            let longest = measure.longest_relative_path(&dir, ignore)?;

            let node = self.node_mut(id);
            let name_len = node.name.chars().count();
            node.weight = name_len + 1 + longest;
            node.weight_as_parent = name_len + MODULES_DIRECTORY_NAME.len() + 2;
            node.full_weight_as_parent = parent_weight + node.weight_as_parent;
            node.full_weight = parent_weight + node.weight;

            let node = self.get(id);
            for child in node.children.iter().rev() {
                pending.push((child, module_dir(&dir, &self.get(child).name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::VersionDependency;

    fn ignore() -> IgnoreSet {
        IgnoreSet::new(["*.md"]).unwrap()
    }

    #[test]
    fn test_weights_follow_parent_chain() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = tree.add_child(root, "a").unwrap();
        let b = tree.add_child(a, "bb").unwrap();
        tree.add_dependency(b, VersionDependency::new("x", "*"));

        let measure = StaticMeasure::new()
            .with("/p", 4)
            .with("/p/node_modules/a", 10)
            .with("/p/node_modules/a/node_modules/bb", 30);
        tree.calculate_weights(Path::new("/p"), &ignore(), &measure)
            .unwrap();

        let r = tree.get(root);
        assert_eq!((r.weight(), r.weight_as_parent()), (1 + 1 + 4, 1 + 12 + 2));
        assert_eq!((r.full_weight_as_parent(), r.full_weight()), (15, 6));

        let a = tree.get(a);
        assert_eq!(a.weight(), 12);
        assert_eq!(a.weight_as_parent(), 15);
        assert_eq!(a.full_weight_as_parent(), 30);
        assert_eq!(a.full_weight(), 15 + 12);

        let b = tree.get(b);
        assert_eq!(b.weight(), 2 + 1 + 30);
        assert_eq!(b.full_weight(), 30 + 33);
        assert_eq!(tree.max_full_weight(), 63);
    }

    #[test]
    fn test_weights_are_idempotent() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = tree.add_child(root, "a").unwrap();
        tree.add_child(a, "b").unwrap();
        let measure = StaticMeasure::new().with("/p/node_modules/a", 7);

        tree.calculate_weights(Path::new("/p"), &ignore(), &measure)
            .unwrap();
        let first: Vec<_> = tree
            .walk_depth_first(root)
            .map(|id| (tree.get(id).weight(), tree.get(id).full_weight()))
            .collect();
        tree.calculate_weights(Path::new("/p"), &ignore(), &measure)
            .unwrap();
        let second: Vec<_> = tree
            .walk_depth_first(root)
            .map(|id| (tree.get(id).weight(), tree.get(id).full_weight()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_disk_measure_honours_ignore_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib").join("index.js"), "").unwrap();
        std::fs::write(dir.path().join("a-very-long-readme-name.md"), "").unwrap();

        let longest = DiskMeasure
            .longest_relative_path(dir.path(), &ignore())
            .unwrap();
        assert_eq!(longest, "/lib/index.js".len());
    }
}
