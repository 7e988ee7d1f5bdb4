//! Physical actions derived from an optimized tree.
//!
//! - Every live module flagged `add` is a move from where its files are now to
//!   its new `real_path`. Moves are listed parents first, and a source inside a
//!   directory moved earlier is rebased to that directory's new location.
//! - Every top-most module flagged `remove` (and not `add`) is a deletion of its
//!   current `real_path`, unless a move already vacated that path.
//!
//! Moves must run before removals: a removed directory may hold a module that
//! is being moved out.

use crate::tree::ModuleTree;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub module: String,
    pub version: String,
    /// Current location of the module's files when this move runs.
    pub from: PathBuf,
    pub to: PathBuf,
    /// Directory to reinstall into if `from` turns out to be missing.
    pub install_dir: PathBuf,
    /// Nesting depth of the destination (root children are depth 1).
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedRemoval {
    pub module: String,
    pub version: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub moves: Vec<PlannedMove>,
    pub removals: Vec<PlannedRemoval>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.removals.is_empty()
    }
}

/// Derive the plan for `tree`.
#[must_use]
pub fn build_plan(tree: &ModuleTree) -> Plan {
    let mut plan = Plan::default();
    let root = tree.root();

    for id in tree.walk_breadth_first(root) {
        let node = tree.get(id);
        if !node.is_added() {
            continue;
        }
        let from = rebase(node.original_path(), &plan.moves);
        let to = node.real_path().to_path_buf();
        if from == to {
            continue;
        }
        let install_dir = node
            .parent()
            .map_or_else(PathBuf::new, |p| tree.get(p).real_path().to_path_buf());
        plan.moves.push(PlannedMove {
            module: node.name().to_string(),
            version: node.version().to_string(),
            from,
            to,
            install_dir,
            depth: tree.ancestors(id).count() - 1,
        });
    }

    // tombstoned children are included here; walks skip them
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        let node = tree.get(id);
        if node.is_removed() {
            let vacated = plan.moves.iter().any(|m| m.from == node.real_path());
            if !node.is_added() && !vacated {
                plan.removals.push(PlannedRemoval {
                    module: node.name().to_string(),
                    version: node.version().to_string(),
                    path: node.real_path().to_path_buf(),
                });
            }
            continue;
        }
        queue.extend(node.children().iter());
    }

    plan
}

/// Where `path` is after applying `moves` in order.
fn rebase(path: &Path, moves: &[PlannedMove]) -> PathBuf {
    let mut current = path.to_path_buf();
    for planned in moves {
        if let Ok(rest) = current.strip_prefix(&planned.from) {
            current = if rest.as_os_str().is_empty() {
                planned.to.clone()
            } else {
                planned.to.join(rest)
            };
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeId;

    fn nm(parts: &[&str]) -> PathBuf {
        let mut path = PathBuf::from("/p");
        for part in parts {
            path.push("node_modules");
            path.push(part);
        }
        path
    }

    fn chain(tree: &mut ModuleTree, names: &[&str]) -> Vec<NodeId> {
        let mut parent = tree.root();
        let mut ids = Vec::new();
        for name in names {
            parent = tree.add_child(parent, name).unwrap();
            tree.set_version(parent, "1.0.0");
            ids.push(parent);
        }
        ids
    }

    #[test]
    fn test_untouched_tree_has_empty_plan() {
        let mut tree = ModuleTree::new(".", "/p");
        chain(&mut tree, &["a", "b"]);
        assert!(build_plan(&tree).is_empty());
    }

    #[test]
    fn test_move_sources_are_rebased_through_earlier_moves() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let ids = chain(&mut tree, &["a", "p", "q", "x"]);
        let p = ids[1];

        // p goes to the root, then x goes from p' > q' to p'
        let p_copy = tree.new_child_from_copy(root, p).unwrap();
        tree.set_added(p_copy, true);
        tree.mark_removed(p);
        let q_copy = tree.get(p_copy).children().find("q").unwrap();
        let x_copy = tree.get(q_copy).children().find("x").unwrap();
        let x_final = tree.new_child_from_copy(p_copy, x_copy).unwrap();
        tree.set_added(x_final, true);
        tree.mark_removed(x_copy);

        let plan = build_plan(&tree);
        assert_eq!(plan.moves.len(), 2);
        assert_eq!(plan.moves[0].from, nm(&["a", "p"]));
        assert_eq!(plan.moves[0].to, nm(&["p"]));
        assert_eq!(plan.moves[0].install_dir, PathBuf::from("/p"));
        assert_eq!(plan.moves[0].depth, 1);
        assert_eq!(plan.moves[1].from, nm(&["p", "q", "x"]));
        assert_eq!(plan.moves[1].to, nm(&["p", "x"]));
        assert_eq!(plan.moves[1].install_dir, nm(&["p"]));
        assert_eq!(plan.moves[1].depth, 2);
        // both tombstoned originals were vacated by the moves
        assert!(plan.removals.is_empty());
    }

    #[test]
    fn test_removals_are_top_most_only() {
        let mut tree = ModuleTree::new(".", "/p");
        let ids = chain(&mut tree, &["a", "b", "c"]);
        tree.mark_removed(ids[1]);

        let plan = build_plan(&tree);
        assert!(plan.moves.is_empty());
        assert_eq!(plan.removals.len(), 1);
        assert_eq!(plan.removals[0].path, nm(&["a", "b"]));
        assert_eq!(plan.removals[0].module, "b");
    }

    #[test]
    fn test_removal_inside_moved_copy_uses_new_location() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let ids = chain(&mut tree, &["a", "b", "c"]);
        let b = ids[1];
        let c = ids[2];
        tree.mark_removed(c);

        let b_copy = tree.new_child_from_copy(root, b).unwrap();
        tree.set_added(b_copy, true);
        tree.mark_removed(b);

        let plan = build_plan(&tree);
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.removals.len(), 1);
        assert_eq!(plan.removals[0].path, nm(&["b", "c"]));
    }

    #[test]
    fn test_nodes_with_both_flags_produce_nothing() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let ids = chain(&mut tree, &["a", "b"]);
        let copy = tree.new_child_from_copy(root, ids[1]).unwrap();
        tree.set_added(copy, true);
        tree.mark_removed(copy);

        let plan = build_plan(&tree);
        assert!(plan.is_empty());
    }
}
