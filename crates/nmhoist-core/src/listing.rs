//! Loading a module tree from a package-manager listing.
//!
//! The listing is the JSON printed by `npm ls --json --long`: a nested object
//! per module with `version`, `realPath`, `scripts`, `_dependencies` (declared
//! name → range) and `dependencies` (installed children). An installed child
//! carries a `name` field; an entry without one is a reference to a module
//! installed higher up, and must resolve.

use crate::error::{Error, Result};
use crate::tree::{ModuleTree, NodeId, VersionDependency};
use serde_json::{Map, Value};
use std::path::Path;

/// Parse listing text.
///
/// # Errors
/// Returns [`Error::ListingParse`] if the text is not JSON.
pub fn parse_listing(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(Error::ListingParse)
}

/// Build a tree from a parsed listing.
///
/// The root module is called `root_name` and located at `root_path` unless the
/// listing names its own `realPath`. Children without a `realPath` are placed
/// at `<parent>/node_modules/<name>`.
///
/// # Errors
/// Returns [`Error::InvalidListing`] for malformed entries and
/// [`Error::UnresolvedReference`] for a reference that names no installed
/// module.
pub fn load_listing(listing: &Value, root_name: &str, root_path: &Path) -> Result<ModuleTree> {
    let mut tree = ModuleTree::new(root_name, root_path);
    let root = tree.root();
    load_module(&mut tree, root, listing)?;
    Ok(tree)
}

fn load_module(tree: &mut ModuleTree, id: NodeId, data: &Value) -> Result<()> {
    let object = data
        .as_object()
        .ok_or_else(|| invalid(tree, id, "entry is not an object"))?;

    if let Some(version) = string_field(tree, id, object, "version")? {
        tree.set_version(id, version);
    }
    if let Some(path) = string_field(tree, id, object, "realPath")? {
        tree.set_location(id, path);
    }

    if let Some(scripts) = object_field(tree, id, object, "scripts")? {
        for (hook, command) in scripts {
            let command = command
                .as_str()
                .ok_or_else(|| invalid(tree, id, &format!("script '{hook}' is not a string")))?;
            tree.set_script(id, hook, command);
        }
    }

    if let Some(declared) = object_field(tree, id, object, "_dependencies")? {
        for (name, range) in declared {
            let range = range.as_str().ok_or_else(|| {
                invalid(tree, id, &format!("declared range for '{name}' is not a string"))
            })?;
            tree.add_dependency(id, VersionDependency::new(name, range));
        }
    }

    let Some(installed) = object_field(tree, id, object, "dependencies")? else {
        return Ok(());
    };

    // siblings first, so references between them resolve regardless of order
    for (name, child) in installed {
        if child.get("name").is_some() {
            tree.add_child(id, name)?;
        }
    }

    for (name, child) in installed {
        if child.get("name").is_some() {
            if let Some(child_id) = tree.get(id).children().find(name) {
                load_module(tree, child_id, child)?;
            }
        } else if !is_resolvable(tree, id, name) {
            return Err(Error::UnresolvedReference {
                name: name.clone(),
                module: tree.label(id),
            });
        }
    }

    Ok(())
}

/// A reference from `id` resolves against its parent's children, then the
/// grandparent's, up to the root. Tombstones do not exist at load time.
fn is_resolvable(tree: &ModuleTree, id: NodeId, name: &str) -> bool {
    tree.ancestors(id)
        .skip(1)
        .any(|scope| tree.get(scope).children().contains(name))
}

fn string_field<'a>(
    tree: &ModuleTree,
    id: NodeId,
    object: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(invalid(tree, id, &format!("'{key}' is not a string"))),
    }
}

fn object_field<'a>(
    tree: &ModuleTree,
    id: NodeId,
    object: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(invalid(tree, id, &format!("'{key}' is not an object"))),
    }
}

fn invalid(tree: &ModuleTree, id: NodeId, reason: &str) -> Error {
    Error::InvalidListing(format!("{}: {reason}", tree.spec(id)))
}
