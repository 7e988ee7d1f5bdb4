//! Ordered, name-keyed sibling collection.

use super::{name_key, NodeId};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Children of a module, in insertion order, unique by case-insensitive name.
///
/// Entries are arena ids; the key is the lowercased module name so lookups do
/// not need the arena.
#[derive(Debug, Clone, Default)]
pub struct NamedChildren {
    entries: Vec<(String, NodeId)>,
    index: HashMap<String, NodeId>,
}

impl NamedChildren {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `id` under `name`.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateChild`] if a child with that name already exists.
    pub fn add(&mut self, name: &str, id: NodeId) -> Result<()> {
        let key = name_key(name);
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateChild {
                name: name.to_string(),
            });
        }
        self.index.insert(key.clone(), id);
        self.entries.push((key, id));
        Ok(())
    }

    /// Append `id` under `name`, first removing any child with the same name.
    /// Returns the replaced child.
    pub fn add_or_replace(&mut self, name: &str, id: NodeId) -> Option<NodeId> {
        let replaced = self.remove(name);
        let key = name_key(name);
        self.index.insert(key.clone(), id);
        self.entries.push((key, id));
        replaced
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.index.get(&name_key(name)).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name_key(name))
    }

    /// Remove the child called `name`.
    pub fn remove(&mut self, name: &str) -> Option<NodeId> {
        let key = name_key(name);
        let id = self.index.remove(&key)?;
        self.entries.retain(|(k, _)| *k != key);
        Some(id)
    }

    /// Remove the child with arena id `id`.
    pub fn remove_id(&mut self, id: NodeId) -> bool {
        let Some(pos) = self.entries.iter().position(|(_, e)| *e == id) else {
            return false;
        };
        let (key, _) = self.entries.remove(pos);
        self.index.remove(&key);
        true
    }

    /// Remove every child matching `pred`, returning how many were removed.
    pub fn remove_all(&mut self, mut pred: impl FnMut(NodeId) -> bool) -> usize {
        let before = self.entries.len();
        let index = &mut self.index;
        self.entries.retain(|(key, id)| {
            if pred(*id) {
                index.remove(key);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    /// Stable sort by case-insensitive name.
    pub fn sort_by_name(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
    }

    /// Child at position `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.entries.get(index).map(|(_, id)| *id)
    }

    /// Child ids in order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(c: &NamedChildren) -> Vec<u32> {
        c.iter().map(|id| id.0).collect()
    }

    #[test]
    fn test_add_rejects_case_insensitive_duplicate() {
        let mut c = NamedChildren::new();
        c.add("Lodash", NodeId(1)).unwrap();
        let err = c.add("lodash", NodeId(2)).unwrap_err();
        assert!(matches!(err, Error::DuplicateChild { .. }));
        assert_eq!(c.len(), 1);
        assert_eq!(c.find("LODASH"), Some(NodeId(1)));
    }

    #[test]
    fn test_add_or_replace_moves_to_end() {
        let mut c = NamedChildren::new();
        c.add("a", NodeId(1)).unwrap();
        c.add("b", NodeId(2)).unwrap();
        let replaced = c.add_or_replace("A", NodeId(3));
        assert_eq!(replaced, Some(NodeId(1)));
        assert_eq!(ids(&c), vec![2, 3]);
        assert_eq!(c.find("a"), Some(NodeId(3)));
    }

    #[test]
    fn test_remove_all_includes_first_entry() {
        let mut c = NamedChildren::new();
        c.add("a", NodeId(1)).unwrap();
        c.add("b", NodeId(2)).unwrap();
        c.add("c", NodeId(3)).unwrap();
        let removed = c.remove_all(|id| id.0 != 2);
        assert_eq!(removed, 2);
        assert_eq!(ids(&c), vec![2]);
        assert!(!c.contains("a"));
        assert!(!c.contains("c"));
    }

    #[test]
    fn test_sort_by_name_is_case_insensitive() {
        let mut c = NamedChildren::new();
        c.add("zeta", NodeId(1)).unwrap();
        c.add("Alpha", NodeId(2)).unwrap();
        c.add("beta", NodeId(3)).unwrap();
        c.sort_by_name();
        assert_eq!(ids(&c), vec![2, 3, 1]);
        assert_eq!(c.get(0), Some(NodeId(2)));
    }

    #[test]
    fn test_remove_id_and_remove_by_name() {
        let mut c = NamedChildren::new();
        c.add("a", NodeId(1)).unwrap();
        c.add("b", NodeId(2)).unwrap();
        assert!(c.remove_id(NodeId(1)));
        assert!(!c.remove_id(NodeId(1)));
        assert_eq!(c.remove("B"), Some(NodeId(2)));
        assert!(c.is_empty());
    }
}
