//! Read-only views of a module tree for display.

use crate::tree::{name_key, ModuleTree, NodeId};
use serde::Serialize;

/// Lifecycle scripts worth warning about before modules are moved around.
pub const LIFECYCLE_HOOKS: &[&str] = &[
    "preinstall",
    "install",
    "postinstall",
    "preuninstall",
    "uninstall",
    "postuninstall",
];

/// One live module in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleListing {
    /// `+` for modules created by relocation, a space otherwise.
    pub marker: char,
    pub depth: usize,
    pub label: String,
    pub dependencies: Vec<DependencyListing>,
    /// Labels of the modules that resolve this one.
    pub dependants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyListing {
    pub name: String,
    pub range: String,
    /// Label of the module the dependency resolves to.
    pub resolved: Option<String>,
    pub status: RangeStatus,
}

/// Whether a resolved dependency satisfies its declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    Satisfied,
    Unsatisfied,
    /// The range or the version is not plain semver.
    Unchecked,
    /// Nothing of that name is visible.
    Missing,
}

/// Modules carrying lifecycle scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptHooks {
    pub module: String,
    pub hooks: Vec<(String, String)>,
}

/// Describe every live module, depth-first, children in name order.
#[must_use]
pub fn describe_tree(tree: &ModuleTree) -> Vec<ModuleListing> {
    let mut out = Vec::new();
    describe(tree, tree.root(), 0, &mut out);
    out
}

fn describe(tree: &ModuleTree, id: NodeId, depth: usize, out: &mut Vec<ModuleListing>) {
    let node = tree.get(id);

    let dependencies = node
        .dependencies()
        .iter()
        .map(|dependency| {
            let resolved = tree.resolve(id, dependency.name());
            let status = match resolved {
                None => RangeStatus::Missing,
                Some(found) => range_status(dependency.version_required(), tree.get(found).version()),
            };
            DependencyListing {
                name: dependency.name().to_string(),
                range: dependency.version_required().to_string(),
                resolved: resolved.map(|found| tree.label(found)),
                status,
            }
        })
        .collect();

    out.push(ModuleListing {
        marker: if node.is_added() { '+' } else { ' ' },
        depth,
        label: tree.label(id),
        dependencies,
        dependants: tree.find_dependants(id).map(|d| tree.label(d)).collect(),
    });

    let mut children: Vec<NodeId> = tree.children(id).collect();
    children.sort_by_cached_key(|&child| name_key(tree.get(child).name()));
    for child in children {
        describe(tree, child, depth + 1, out);
    }
}

fn range_status(range: &str, version: &str) -> RangeStatus {
    let Ok(requirement) = semver::VersionReq::parse(range) else {
        return RangeStatus::Unchecked;
    };
    let Ok(version) = semver::Version::parse(version) else {
        return RangeStatus::Unchecked;
    };
    if requirement.matches(&version) {
        RangeStatus::Satisfied
    } else {
        RangeStatus::Unsatisfied
    }
}

/// Live modules that define lifecycle scripts, breadth-first.
#[must_use]
pub fn find_script_hooks(tree: &ModuleTree) -> Vec<ScriptHooks> {
    tree.walk_breadth_first(tree.root())
        .filter_map(|id| {
            let hooks: Vec<(String, String)> = tree
                .get(id)
                .scripts()
                .iter()
                .filter(|(hook, _)| LIFECYCLE_HOOKS.contains(&hook.as_str()))
                .map(|(hook, command)| (hook.clone(), command.clone()))
                .collect();
            (!hooks.is_empty()).then(|| ScriptHooks {
                module: tree.label(id),
                hooks,
            })
        })
        .collect()
}
