//! Hoist/dedupe optimizer.
//!
//! Repeatedly takes the heaviest leaf, looks at it and its ancestors from the
//! heaviest down, and tries to lift one of them a level (to its grandparent).
//! A module is dropped instead when the same version is already visible from
//! the grandparent. Every mutation restarts the search from the current state.
//! The loop ends when no candidate applies or the iteration cap is reached.
//!
//! Nothing here touches the disk. Results are left on the tree as `add` and
//! `remove` flags (see [`crate::plan`]) plus a list of [`Decision`]s.

use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::Result;
use crate::pattern::IgnoreSet;
use crate::tree::{ModuleTree, NodeId};
use crate::weight::PathMeasure;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Optimizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    /// Mutations allowed before the optimizer stops without converging.
    pub max_iterations: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// What the optimizer did to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Tombstoned: same version already visible higher up.
    Remove,
    /// An earlier relocation copy dropped as a duplicate.
    Discard,
    /// Copied one level up; the original is tombstoned.
    Move,
    /// A tombstoned child of a copy brought back so the copy keeps a dependency.
    Revive,
    /// A copy that was later tombstoned, dropped at cleanup.
    Purge,
    /// The iteration cap was reached.
    Stopped,
}

/// One optimizer step, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action: DecisionAction,
    /// Label of the module acted on, taken before the change.
    pub module: String,
    /// New parent for moves, the shadowing duplicate for removals, the copy for
    /// revivals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub reason: String,
}

/// Outcome of [`TreeOptimizer::optimize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    pub original_max_weight: usize,
    pub new_max_weight: usize,
    /// Mutations applied (removals and moves).
    pub iterations: usize,
    /// False when the iteration cap stopped the loop.
    pub converged: bool,
    pub decisions: Vec<Decision>,
}

impl OptimizeReport {
    /// Whether the optimizer changed the tree at all.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.iterations > 0
    }
}

/// A mutation found by [`next_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Remove { module: NodeId, duplicate: NodeId },
    Move { module: NodeId, target: NodeId },
}

/// Runs the hoist/dedupe loop over a [`ModuleTree`].
#[derive(Debug, Clone, Default)]
pub struct TreeOptimizer {
    options: OptimizeOptions,
}

impl TreeOptimizer {
    #[must_use]
    pub fn new(options: OptimizeOptions) -> Self {
        Self { options }
    }

    /// Compute weights, iterate to a fixed point, then purge copies that were
    /// created and later tombstoned.
    ///
    /// # Errors
    /// Propagates measurement errors from weight computation.
    pub fn optimize(
        &self,
        tree: &mut ModuleTree,
        root_path: &Path,
        ignore: &IgnoreSet,
        measure: &dyn PathMeasure,
    ) -> Result<OptimizeReport> {
        tree.calculate_weights(root_path, ignore, measure)?;
        let original_max_weight = tree.max_full_weight();

        let mut decisions = Vec::new();
        let mut iterations = 0;
        let converged = loop {
            let Some(step) = next_step(tree) else {
                break true;
            };
            if iterations >= self.options.max_iterations {
                warn!(
                    max_iterations = self.options.max_iterations,
                    "optimizer stopped before converging"
                );
                decisions.push(Decision {
                    action: DecisionAction::Stopped,
                    module: tree.label(tree.root()),
                    target: None,
                    reason: format!(
                        "reached the limit of {} iterations",
                        self.options.max_iterations
                    ),
                });
                break false;
            }

            match step {
                Step::Remove { module, duplicate } => {
                    decisions.push(remove_duplicate(tree, module, duplicate));
                }
                Step::Move { module, target } => move_module(tree, module, target, &mut decisions)?,
            }
            iterations += 1;
        };

        purge(tree, &mut decisions);

        let new_max_weight = tree.max_full_weight();
        debug!(
            original_max_weight,
            new_max_weight, iterations, converged, "optimizer finished"
        );

        Ok(OptimizeReport {
            original_max_weight,
            new_max_weight,
            iterations,
            converged,
            decisions,
        })
    }
}

/// Find the next mutation, or `None` once nothing applies.
fn next_step(tree: &ModuleTree) -> Option<Step> {
    let mut leaves: Vec<NodeId> = tree
        .walk_depth_first(tree.root())
        .filter(|&id| tree.children(id).next().is_none())
        .collect();
    leaves.sort_by(|a, b| tree.get(*b).full_weight().cmp(&tree.get(*a).full_weight()));

    for leaf in leaves {
        let mut candidates: Vec<NodeId> = tree.ancestors(leaf).collect();
        candidates.sort_by(|a, b| tree.get(*b).weight().cmp(&tree.get(*a).weight()));

        for module in candidates {
            let Some(target) = tree.parent(module).and_then(|p| tree.parent(p)) else {
                continue;
            };
            let node = tree.get(module);

            if let Some(conflict) = tree.resolve(target, node.name()) {
                if tree.get(conflict).equals_version(node) {
                    return Some(Step::Remove {
                        module,
                        duplicate: conflict,
                    });
                }
                if tree.parent(conflict) == Some(target) {
                    continue;
                }
            }

            // a tombstoned module of that name still occupies the slot
            if tree.get(target).children().contains(node.name()) {
                continue;
            }

            if tree.is_eligible_to_move(module, target) {
                return Some(Step::Move { module, target });
            }
        }
    }
    None
}

/// Drop a module: copies made by this run are detached outright, modules from
/// the original tree are tombstoned so the plan deletes them. Returns whether
/// the module was a copy.
fn remove_module(tree: &mut ModuleTree, module: NodeId) -> bool {
    if tree.get(module).is_added() {
        tree.detach(module);
        true
    } else {
        tree.mark_removed(module);
        false
    }
}

fn remove_duplicate(tree: &mut ModuleTree, module: NodeId, duplicate: NodeId) -> Decision {
    let label = tree.label(module);
    let discarded = remove_module(tree, module);
    debug!(module = %label, discarded, "dropping duplicate module");
    Decision {
        action: if discarded {
            DecisionAction::Discard
        } else {
            DecisionAction::Remove
        },
        module: label,
        target: Some(tree.label(duplicate)),
        reason: "same version already visible higher up".to_string(),
    }
}

fn move_module(
    tree: &mut ModuleTree,
    module: NodeId,
    target: NodeId,
    decisions: &mut Vec<Decision>,
) -> Result<()> {
    let old_dependencies: Vec<NodeId> = tree.find_dependencies(module).collect();
    let label = tree.label(module);
    let target_label = tree.label(target);

    let copy = tree.new_child_from_copy(target, module)?;
    tree.set_added(copy, true);
    debug!(module = %label, target = %target_label, "moving module up");
    decisions.push(Decision {
        action: DecisionAction::Move,
        module: label,
        target: Some(target_label),
        reason: "every resolved dependency stays visible".to_string(),
    });

    remove_module(tree, module);

    for old in old_dependencies {
        let old_node = tree.get(old);
        let still_visible = tree
            .scope(copy)
            .any(|candidate| tree.get(candidate).equals_version(old_node));
        if still_visible {
            continue;
        }
        let Some(child) = tree.get(copy).children().find(old_node.name()) else {
            continue;
        };
        if tree.get(child).is_removed() {
            tree.set_removed(child, false);
            let child_label = tree.label(child);
            debug!(module = %child_label, "reviving dependency of moved module");
            decisions.push(Decision {
                action: DecisionAction::Revive,
                module: child_label,
                target: Some(tree.label(copy)),
                reason: "needed by the moved module".to_string(),
            });
        }
    }
    Ok(())
}

/// Detach every module carrying both flags, tombstoned subtrees included.
fn purge(tree: &mut ModuleTree, decisions: &mut Vec<Decision>) {
    let mut stack = vec![tree.root()];
    while let Some(container) = stack.pop() {
        let children: Vec<NodeId> = tree.get(container).children().iter().collect();
        for child in children {
            let node = tree.get(child);
            if node.is_added() && node.is_removed() {
                let label = tree.label(child);
                debug!(module = %label, "purging tombstoned copy");
                decisions.push(Decision {
                    action: DecisionAction::Purge,
                    module: label,
                    target: None,
                    reason: "copy was tombstoned after it was created".to_string(),
                });
                tree.detach(child);
            } else {
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::VersionDependency;
    use crate::weight::StaticMeasure;

    fn module(tree: &mut ModuleTree, parent: NodeId, name: &str, version: &str, deps: &[&str]) -> NodeId {
        let id = tree.add_child(parent, name).unwrap();
        tree.set_version(id, version);
        for dep in deps {
            tree.add_dependency(id, VersionDependency::new(*dep, "*"));
        }
        id
    }

    fn run(tree: &mut ModuleTree, measure: &StaticMeasure, options: OptimizeOptions) -> OptimizeReport {
        let ignore = IgnoreSet::new(Vec::<String>::new()).unwrap();
        TreeOptimizer::new(options)
            .optimize(tree, Path::new("/p"), &ignore, measure)
            .unwrap()
    }

    fn actions(report: &OptimizeReport) -> Vec<DecisionAction> {
        report.decisions.iter().map(|d| d.action).collect()
    }

    #[test]
    fn test_duplicate_is_tombstoned() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = module(&mut tree, root, "a", "1", &["b"]);
        let x = module(&mut tree, a, "x", "1", &["b"]);
        let inner_b = module(&mut tree, x, "b", "1", &[]);
        module(&mut tree, a, "b", "1", &[]);

        let report = run(&mut tree, &StaticMeasure::new(), OptimizeOptions::default());
        assert!(report.converged);
        assert!(tree.get(inner_b).is_removed());
        assert_eq!(report.decisions[0].action, DecisionAction::Remove);
        assert!(report.decisions[0].module.contains("x > b@1"));
    }

    #[test]
    fn test_blocked_when_different_version_at_target() {
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = module(&mut tree, root, "a", "1", &[]);
        module(&mut tree, root, "x", "9", &[]);
        module(&mut tree, a, "b", "1", &[]);
        let x = module(&mut tree, a, "x", "1", &[]);
        let inner_b = module(&mut tree, x, "b", "2", &[]);

        let report = run(&mut tree, &StaticMeasure::new(), OptimizeOptions::default());
        assert!(report.converged);
        // a > b moves to the root; its tombstone then keeps x > b out of a
        assert_eq!(actions(&report), vec![DecisionAction::Move]);
        assert!(report.decisions[0].module.starts_with(". > a > b@1"));
        assert!(!tree.get(inner_b).is_removed());
        assert!(!tree.get(x).is_removed());
    }

    #[test]
    fn test_move_gated_by_dependency_under_mover() {
        // c depends on d, which sits next to c under b
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = module(&mut tree, root, "a", "1", &[]);
        let b = module(&mut tree, a, "b", "1", &["c"]);
        let c = module(&mut tree, b, "c", "1", &["d"]);
        module(&mut tree, b, "d", "1", &[]);
        assert!(!tree.is_eligible_to_move(c, a));

        let measure = StaticMeasure::new().with("/p/node_modules/a/node_modules/b/node_modules/c", 50);
        let report = run(&mut tree, &measure, OptimizeOptions::default());
        assert!(report.converged);

        let moved: Vec<&str> = report
            .decisions
            .iter()
            .filter(|d| d.action == DecisionAction::Move)
            .map(|d| d.module.as_str())
            .collect();
        assert_eq!(moved.len(), 3);
        // b carries c and d to the root first; c can only follow once d is visible there
        assert!(moved[0].starts_with(". > a > b@1"));
        assert!(moved[1].starts_with(". > b > d@1"));
        assert!(moved[2].starts_with(". > b > c@1"));

        let top: Vec<&str> = tree.children(root).map(|id| tree.get(id).name()).collect();
        assert_eq!(top, vec!["a", "b", "d", "c"]);
        assert!(!tree.walk_depth_first(root).any(|id| {
            let n = tree.get(id);
            n.is_added() && n.is_removed()
        }));
    }

    #[test]
    fn test_iteration_cap_stops_without_converging() {
        let build = || {
            let mut tree = ModuleTree::new(".", "/p");
            let root = tree.root();
            let a = module(&mut tree, root, "a", "1", &[]);
            let b = module(&mut tree, a, "b", "1", &[]);
            module(&mut tree, b, "c", "1", &[]);
            tree
        };

        let mut capped = build();
        let report = run(&mut capped, &StaticMeasure::new(), OptimizeOptions { max_iterations: 0 });
        assert!(!report.converged);
        assert_eq!(report.iterations, 0);
        assert_eq!(actions(&report), vec![DecisionAction::Stopped]);

        let mut free = build();
        let report = run(&mut free, &StaticMeasure::new(), OptimizeOptions::default());
        assert!(report.converged);
        assert!(report.changed());
    }

    #[test]
    fn test_blocked_by_tombstoned_slot() {
        // a still holds a tombstoned "b", so x > b cannot be copied into a
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = module(&mut tree, root, "a", "1", &[]);
        let old_b = module(&mut tree, a, "b", "9", &[]);
        let x = module(&mut tree, a, "x", "1", &[]);
        module(&mut tree, x, "b", "1", &[]);
        tree.mark_removed(old_b);

        assert_eq!(next_step(&tree), Some(Step::Move { module: x, target: root }));
    }

    #[test]
    fn test_copy_inside_moved_parent_is_purged() {
        // d is lifted into b, then b itself moves to the root. The copy of d
        // left under the tombstoned b ends up carrying both flags.
        let mut tree = ModuleTree::new(".", "/p");
        let root = tree.root();
        let a = module(&mut tree, root, "a", "1", &[]);
        let b = module(&mut tree, a, "b", "1", &[]);
        module(&mut tree, a, "d", "2", &[]);
        let c = module(&mut tree, b, "c", "1", &[]);
        module(&mut tree, c, "d", "1", &[]);
        let measure = StaticMeasure::new().with(
            "/p/node_modules/a/node_modules/b/node_modules/c/node_modules/d",
            60,
        );

        let report = run(&mut tree, &measure, OptimizeOptions::default());
        assert!(report.converged);
        let purged: Vec<&Decision> = report
            .decisions
            .iter()
            .filter(|d| d.action == DecisionAction::Purge)
            .collect();
        assert_eq!(purged.len(), 1);
        assert!(purged[0].module.contains(". > a > b > d@1"));
        assert_eq!(actions(&report).last(), Some(&DecisionAction::Purge));

        assert!(tree.get(b).is_removed());
        assert!(tree.get(b).children().find("d").is_none());

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in tree.get(id).children().iter() {
                let node = tree.get(child);
                assert!(!(node.is_added() && node.is_removed()), "{}", tree.label(child));
                stack.push(child);
            }
        }

        let stale = Path::new("/p/node_modules/a/node_modules/b/node_modules/d");
        let plan = crate::plan::build_plan(&tree);
        assert!(plan.moves.iter().all(|m| m.from != stale && m.to != stale));
        assert!(plan.removals.iter().all(|r| r.path != stale));
    }
}
