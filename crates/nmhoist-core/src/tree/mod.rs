//! In-memory module tree.
//!
//! Nodes live in an arena owned by [`ModuleTree`] and are addressed by
//! [`NodeId`]. A node's parent is stored as an id, so walking upward never
//! holds a borrow on the parent.
//!
//! Two kinds of "gone" exist:
//!
//! - **Tombstoned** nodes (`remove` flag) stay in their parent's collection so
//!   they can be revived, but every walk and every scope lookup skips them.
//! - **Detached** nodes were taken out of their parent's collection. Their arena
//!   slot is kept but nothing reachable from the root refers to it.

pub mod children;

pub use children::NamedChildren;

use crate::error::{Error, Result};
use crate::paths::module_dir;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

/// Arena index of a module node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Collection key for a module name.
pub(crate) fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Module names compare case-insensitively.
#[must_use]
pub fn equals_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// A declared dependency: package name plus the version range it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDependency {
    name: String,
    version_required: String,
}

impl VersionDependency {
    #[must_use]
    pub fn new(name: impl Into<String>, version_required: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_required: version_required.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version_required(&self) -> &str {
        &self.version_required
    }
}

impl fmt::Display for VersionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version_required)
    }
}

/// One installed module.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) real_path: PathBuf,
    pub(crate) original_path: PathBuf,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: NamedChildren,
    pub(crate) dependencies: Vec<VersionDependency>,
    pub(crate) scripts: BTreeMap<String, String>,
    pub(crate) weight: usize,
    pub(crate) weight_as_parent: usize,
    pub(crate) full_weight_as_parent: usize,
    pub(crate) full_weight: usize,
    pub(crate) add: bool,
    pub(crate) remove: bool,
}

impl ModuleNode {
    fn new(name: String, parent: Option<NodeId>, path: PathBuf) -> Self {
        Self {
            name,
            version: String::new(),
            real_path: path.clone(),
            original_path: path,
            parent,
            children: NamedChildren::new(),
            dependencies: Vec::new(),
            scripts: BTreeMap::new(),
            weight: 0,
            weight_as_parent: 0,
            full_weight_as_parent: 0,
            full_weight: 0,
            add: false,
            remove: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved version; empty when the listing did not carry one.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Where the module is (or would be, after relocation) on disk.
    #[must_use]
    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// Where the module was when the tree was loaded.
    #[must_use]
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// All children, tombstoned ones included.
    #[must_use]
    pub fn children(&self) -> &NamedChildren {
        &self.children
    }

    #[must_use]
    pub fn dependencies(&self) -> &[VersionDependency] {
        &self.dependencies
    }

    #[must_use]
    pub fn scripts(&self) -> &BTreeMap<String, String> {
        &self.scripts
    }

    /// Name length + 1 + longest relative path inside the module directory.
    #[must_use]
    pub fn weight(&self) -> usize {
        self.weight
    }

    /// Length this module adds to the path of anything nested below it.
    #[must_use]
    pub fn weight_as_parent(&self) -> usize {
        self.weight_as_parent
    }

    #[must_use]
    pub fn full_weight_as_parent(&self) -> usize {
        self.full_weight_as_parent
    }

    /// Worst-case path length of anything inside this module.
    #[must_use]
    pub fn full_weight(&self) -> usize {
        self.full_weight
    }

    /// Created by relocation; must be materialized on disk.
    #[must_use]
    pub fn is_added(&self) -> bool {
        self.add
    }

    /// Tombstoned; must be deleted from disk.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.remove
    }

    /// Same name and same version (both case-insensitive).
    #[must_use]
    pub fn equals_version(&self, other: &ModuleNode) -> bool {
        equals_name(&self.name, &other.name) && self.version.eq_ignore_ascii_case(&other.version)
    }
}

/// Arena-backed module tree.
///
/// Slots are never reclaimed: detached nodes and the deep copies made by each
/// relocation stay in the arena, so it grows with every optimizer iteration up
/// to the iteration cap.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    nodes: Vec<ModuleNode>,
    root: NodeId,
}

impl ModuleTree {
    /// Create a tree holding only its root module.
    #[must_use]
    pub fn new(root_name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            nodes: vec![ModuleNode::new(root_name.into(), None, root_path.into())],
            root: NodeId(0),
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// # Panics
    /// Panics if `id` was not issued by this tree.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &ModuleNode {
        &self.nodes[id.slot()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ModuleNode {
        &mut self.nodes[id.slot()]
    }

    fn alloc(&mut self, node: ModuleNode) -> Result<NodeId> {
        let id = u32::try_from(self.nodes.len())
            .map_err(|_| Error::other("module tree has too many nodes"))?;
        self.nodes.push(node);
        Ok(NodeId(id))
    }

    /// Add an empty child module under `parent`, located at
    /// `<parent real_path>/node_modules/<name>`.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateChild`] if `parent` already has a child with
    /// that name.
    pub fn add_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let parent_node = self.get(parent);
        if parent_node.children.contains(name) {
            return Err(Error::DuplicateChild {
                name: name.to_string(),
            });
        }
        let path = module_dir(&parent_node.real_path, name);
        let id = self.alloc(ModuleNode::new(name.to_string(), Some(parent), path))?;
        self.node_mut(parent).children.add(name, id)?;
        Ok(id)
    }

    pub fn set_version(&mut self, id: NodeId, version: impl Into<String>) {
        self.node_mut(id).version = version.into();
    }

    /// Set the load-time location of a module (both current and original path).
    pub fn set_location(&mut self, id: NodeId, path: impl Into<PathBuf>) {
        let node = self.node_mut(id);
        node.real_path = path.into();
        node.original_path = node.real_path.clone();
    }

    pub fn add_dependency(&mut self, id: NodeId, dependency: VersionDependency) {
        self.node_mut(id).dependencies.push(dependency);
    }

    pub fn set_script(&mut self, id: NodeId, hook: impl Into<String>, command: impl Into<String>) {
        self.node_mut(id).scripts.insert(hook.into(), command.into());
    }

    pub(crate) fn set_removed(&mut self, id: NodeId, removed: bool) {
        self.node_mut(id).remove = removed;
    }

    pub(crate) fn set_added(&mut self, id: NodeId, added: bool) {
        self.node_mut(id).add = added;
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    /// Non-tombstoned children of `id`, in collection order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get(id)
            .children
            .iter()
            .filter(move |&child| !self.get(child).remove)
    }

    /// `id` followed by its parent, grandparent and so on up to the root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: Some(id),
        }
    }

    /// Depth-first walk over non-tombstoned nodes, starting at `id`.
    ///
    /// Uses an explicit stack: children are pushed in collection order, so the
    /// last child of a node is visited first.
    #[must_use]
    pub fn walk_depth_first(&self, id: NodeId) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![id],
        }
    }

    /// Breadth-first walk over non-tombstoned nodes, starting at `id`.
    #[must_use]
    pub fn walk_breadth_first(&self, id: NodeId) -> BreadthFirst<'_> {
        BreadthFirst {
            tree: self,
            queue: VecDeque::from([id]),
        }
    }

    /// Every module visible from `id`, nearest first.
    ///
    /// Starts with the direct children of `id`, then those of its parent, and so
    /// on to the root. A name seen once shadows every later module of that name.
    #[must_use]
    pub fn scope(&self, id: NodeId) -> Scope<'_> {
        Scope {
            tree: self,
            current: Some(id),
            position: 0,
            seen: HashSet::new(),
        }
    }

    /// First module named `name` visible from `id`.
    #[must_use]
    pub fn resolve(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.scope(id)
            .find(|&candidate| equals_name(&self.get(candidate).name, name))
    }

    /// Modules that would see `id` when resolving its name: a depth-first walk
    /// from `id`, cut off at the first later module with the same name.
    pub fn family(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let name = self.get(id).name.as_str();
        self.walk_depth_first(id)
            .enumerate()
            .take_while(move |&(index, node)| index == 0 || !equals_name(&self.get(node).name, name))
            .map(|(_, node)| node)
    }

    /// Modules in scope that `id` declares a dependency on.
    pub fn find_dependencies(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let dependencies = &self.get(id).dependencies;
        self.scope(id).filter(move |&candidate| {
            let name = &self.get(candidate).name;
            dependencies.iter().any(|d| equals_name(name, &d.name))
        })
    }

    /// Modules in the family of `id` that declare a dependency on it.
    pub fn find_dependants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let name = self.get(id).name.as_str();
        self.family(id).filter(move |&member| {
            self.get(member)
                .dependencies
                .iter()
                .any(|d| equals_name(&d.name, name))
        })
    }

    /// Whether `id` could live under `target` without losing any dependency.
    ///
    /// Each dependency `id` currently resolves must either be visible from
    /// `target` with the same version, or be a direct child of `id` (which
    /// travels along with it, tombstoned or not). Dependencies that do not
    /// resolve today impose nothing.
    #[must_use]
    pub fn is_eligible_to_move(&self, id: NodeId, target: NodeId) -> bool {
        let node = self.get(id);
        node.dependencies.iter().all(|dependency| {
            let Some(existing) = self.resolve(id, &dependency.name) else {
                return true;
            };
            let existing = self.get(existing);
            self.scope(target)
                .any(|candidate| self.get(candidate).equals_version(existing))
                || node.children.contains(&dependency.name)
        })
    }

    /// Deep-copy `source` (and everything below it) as a new child of `parent`.
    ///
    /// The copy keeps the source's original path, version, dependencies,
    /// scripts, flags and own weights; its location and cumulative weights are
    /// recomputed against the new parent.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateChild`] if `parent` already holds a module of
    /// that name.
    pub fn new_child_from_copy(&mut self, parent: NodeId, source: NodeId) -> Result<NodeId> {
        let parent_node = self.get(parent);
        let src = self.get(source);
        if parent_node.children.contains(&src.name) {
            return Err(Error::DuplicateChild {
                name: src.name.clone(),
            });
        }

        let parent_weight = parent_node.full_weight_as_parent;
        let copy = ModuleNode {
            name: src.name.clone(),
            version: src.version.clone(),
            real_path: module_dir(&parent_node.real_path, &src.name),
            original_path: src.original_path.clone(),
            parent: Some(parent),
            children: NamedChildren::new(),
            dependencies: src.dependencies.clone(),
            scripts: src.scripts.clone(),
            weight: src.weight,
            weight_as_parent: src.weight_as_parent,
            full_weight_as_parent: parent_weight + src.weight_as_parent,
            full_weight: parent_weight + src.weight,
            add: src.add,
            remove: src.remove,
        };
        let name = copy.name.clone();
        let id = self.alloc(copy)?;
        self.node_mut(parent).children.add(&name, id)?;

        let children: Vec<NodeId> = self.get(source).children.iter().collect();
        for child in children {
            self.new_child_from_copy(id, child)?;
        }
        Ok(id)
    }

    /// Tombstone `id` and its whole subtree.
    pub fn mark_removed(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.get(id).children.iter().collect();
        for child in children {
            self.mark_removed(child);
        }
        self.node_mut(id).remove = true;
    }

    /// Take `id` out of its parent's collection.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.get(id).parent {
            self.node_mut(parent).children.remove_id(id);
        }
        self.node_mut(id).parent = None;
    }

    /// Nearest of `id` and its ancestors that is not tombstoned.
    #[must_use]
    pub fn first_non_deleted_parent(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|&a| !self.get(a).remove)
    }

    /// Sort every child collection by name.
    pub fn sort_children(&mut self) {
        for node in &mut self.nodes {
            node.children.sort_by_name();
        }
    }

    /// Largest `full_weight` among reachable, non-tombstoned modules.
    #[must_use]
    pub fn max_full_weight(&self) -> usize {
        self.walk_depth_first(self.root)
            .map(|id| self.get(id).full_weight)
            .max()
            .unwrap_or(0)
    }

    /// Human label: `a > b > c@1.0.0 (wap/w/fw)`.
    #[must_use]
    pub fn label(&self, id: NodeId) -> String {
        let node = self.get(id);
        let mut chain: Vec<&str> = self
            .ancestors(id)
            .skip(1)
            .map(|a| self.get(a).name.as_str())
            .collect();
        chain.reverse();

        let mut prefix = String::new();
        for name in chain {
            prefix.push_str(name);
            prefix.push_str(" > ");
        }
        format!(
            "{prefix}{}@{} ({}/{}/{})",
            node.name, node.version, node.weight_as_parent, node.weight, node.full_weight
        )
    }

    /// `name@version` of a module.
    #[must_use]
    pub fn spec(&self, id: NodeId) -> String {
        let node = self.get(id);
        format!("{}@{}", node.name, node.version)
    }
}

/// Iterator returned by [`ModuleTree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a ModuleTree,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.current?;
        self.current = self.tree.get(current).parent;
        Some(current)
    }
}

/// Iterator returned by [`ModuleTree::walk_depth_first`].
pub struct DepthFirst<'a> {
    tree: &'a ModuleTree,
    stack: Vec<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack.extend(self.tree.children(current));
        Some(current)
    }
}

/// Iterator returned by [`ModuleTree::walk_breadth_first`].
pub struct BreadthFirst<'a> {
    tree: &'a ModuleTree,
    queue: VecDeque<NodeId>,
}

impl Iterator for BreadthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.queue.pop_front()?;
        self.queue.extend(self.tree.children(current));
        Some(current)
    }
}

/// Iterator returned by [`ModuleTree::scope`].
pub struct Scope<'a> {
    tree: &'a ModuleTree,
    current: Option<NodeId>,
    position: usize,
    seen: HashSet<String>,
}

impl Iterator for Scope<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let level = self.tree.get(self.current?);
            while let Some(child) = level.children.get(self.position) {
                self.position += 1;
                let node = self.tree.get(child);
                if node.remove {
                    continue;
                }
                if self.seen.insert(name_key(&node.name)) {
                    return Some(child);
                }
            }
            self.current = level.parent;
            self.position = 0;
        }
    }
}
