//! Namespace index
//!
//! Trie keyed by the text of namespace segments. Each node carries an
//! optional payload; deleting a path clears only its terminal payload.

use std::collections::HashMap;

use crate::namespace::Scope;

#[derive(Debug)]
struct TrieNode<V> {
    value: Option<V>,
    children: HashMap<String, TrieNode<V>>,
}

impl<V> Default for TrieNode<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: HashMap::new(),
        }
    }
}

/// Namespace path to value index
#[derive(Debug)]
pub struct SymbolTree<V> {
    root: TrieNode<V>,
}

impl<V> Default for SymbolTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SymbolTree<V> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
        }
    }

    /// Insert or overwrite the payload at `path[..max_depth]`
    pub fn set(&mut self, path: &[Scope], value: V, max_depth: usize) {
        let mut node = &mut self.root;
        for scope in &path[..max_depth.min(path.len())] {
            node = node.children.entry(scope.text.clone()).or_default();
        }
        node.value = Some(value);
    }

    /// Payload at exactly `path[..max_depth]`
    pub fn get(&self, path: &[Scope], max_depth: usize) -> Option<&V> {
        let mut node = &self.root;
        for scope in &path[..max_depth.min(path.len())] {
            node = node.children.get(&scope.text)?;
        }
        node.value.as_ref()
    }

    pub fn get_mut(&mut self, path: &[Scope], max_depth: usize) -> Option<&mut V> {
        let mut node = &mut self.root;
        for scope in &path[..max_depth.min(path.len())] {
            node = node.children.get_mut(&scope.text)?;
        }
        node.value.as_mut()
    }

    /// Payload at `path[..max_depth]`, created with `factory` if missing
    pub fn get_or_insert_with(
        &mut self,
        path: &[Scope],
        max_depth: usize,
        factory: impl FnOnce() -> V,
    ) -> &mut V {
        let mut node = &mut self.root;
        for scope in &path[..max_depth.min(path.len())] {
            node = node.children.entry(scope.text.clone()).or_default();
        }
        node.value.get_or_insert_with(factory)
    }

    /// Clear the payload at the full `path`, keeping intermediate nodes
    pub fn delete(&mut self, path: &[Scope]) -> Option<V> {
        let mut node = &mut self.root;
        for scope in path {
            node = node.children.get_mut(&scope.text)?;
        }
        node.value.take()
    }
}
