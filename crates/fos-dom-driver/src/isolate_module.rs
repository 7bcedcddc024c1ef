//! Isolation Registry
//!
//! Tracks which element currently roots which isolation namespace. Entries
//! are added from the `create`/`update` patch hooks. Removals are collected
//! during the patch and flushed from the `post` hook in reverse order, so an
//! element re-inserted under the same namespace is not clobbered by a stale
//! removal.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fos_dom::{NodeId, SharedDocument};

use crate::namespace::{Namespace, Scope};
use crate::patch::Module;
use crate::symbol_tree::SymbolTree;
use crate::vnode::VNode;
use crate::{DriverError, Result};

/// Called for every element removed from the registry
pub type RemovalObserver = Rc<dyn Fn(NodeId)>;

#[derive(Default)]
struct RegistryState {
    /// Isolation path of every registered element
    namespace_by_element: HashMap<NodeId, Namespace>,
    namespace_tree: SymbolTree<NodeId>,
    /// Elements queued for removal during the current patch
    pending: Vec<NodeId>,
    observer: Option<RemovalObserver>,
}

/// Element ↔ namespace registry fed by patch hooks
pub struct IsolateModule {
    doc: SharedDocument,
    state: RefCell<RegistryState>,
}

impl IsolateModule {
    pub fn new(doc: SharedDocument) -> Self {
        Self {
            doc,
            state: RefCell::new(RegistryState::default()),
        }
    }

    /// Register `element` as the root of `namespace`
    pub fn insert_element(&self, namespace: &Namespace, element: NodeId) {
        let path = namespace.isolation_path();
        let mut state = self.state.borrow_mut();
        state
            .namespace_tree
            .set(path.scopes(), element, path.len());
        state.namespace_by_element.insert(element, path);
        tracing::trace!(?element, namespace = %namespace, "isolation root registered");
    }

    /// Forget `element`. The index entry is only dropped while it still
    /// points at `element`.
    pub fn remove_element(&self, element: NodeId) {
        let mut state = self.state.borrow_mut();
        let Some(path) = state.namespace_by_element.remove(&element) else {
            return;
        };
        if state.namespace_tree.get(path.scopes(), path.len()) == Some(&element) {
            state.namespace_tree.delete(path.scopes());
        }
        tracing::trace!(?element, namespace = %path, "isolation root removed");
    }

    /// Install the callback told about removed elements
    pub fn set_removal_observer(&self, observer: RemovalObserver) {
        self.state.borrow_mut().observer = Some(observer);
    }

    /// Nearest registered element at or above `element`.
    ///
    /// `Ok(None)` if the walk leaves a detached subtree; reaching `<html>`
    /// without finding one means the render root was never registered.
    pub fn root_element(&self, element: NodeId) -> Result<Option<NodeId>> {
        let state = self.state.borrow();
        if state.namespace_by_element.contains_key(&element) {
            return Ok(Some(element));
        }

        let doc = self.doc.borrow();
        let mut current = element;
        loop {
            let Some(parent) = doc.tree.parent(current) else {
                return Ok(None);
            };
            current = parent;
            if state.namespace_by_element.contains_key(&current) {
                return Ok(Some(current));
            }
            if doc.tree.tag(current) == Some("html") {
                return Err(DriverError::NoRootElement(element));
            }
        }
    }

    /// Isolation path of the scope `element` lives in
    pub fn namespace_of(&self, element: NodeId) -> Result<Option<Namespace>> {
        let Some(root) = self.root_element(element)? else {
            return Ok(None);
        };
        Ok(self.state.borrow().namespace_by_element.get(&root).cloned())
    }

    /// Element currently registered at exactly `path`
    pub fn element_at(&self, path: &[Scope]) -> Option<NodeId> {
        self.state
            .borrow()
            .namespace_tree
            .get(path, path.len())
            .copied()
    }

    /// Number of registered elements
    pub fn len(&self) -> usize {
        self.state.borrow().namespace_by_element.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `element` for removal at the end of the patch
    fn defer_removal(&self, vnode: &VNode) {
        if let Some(elm) = vnode.elm {
            self.state.borrow_mut().pending.push(elm);
        }
    }

    /// Process queued removals, most recent first
    pub fn flush(&self) {
        let (pending, observer) = {
            let mut state = self.state.borrow_mut();
            (std::mem::take(&mut state.pending), state.observer.clone())
        };
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "flushing removed elements");
        }
        for element in pending.into_iter().rev() {
            self.remove_element(element);
            if let Some(observer) = &observer {
                observer(element);
            }
        }
    }
}

impl Module for IsolateModule {
    fn name(&self) -> &str {
        "isolate"
    }

    fn create(&self, vnode: &VNode) -> anyhow::Result<()> {
        if let (Some(namespace), Some(elm)) = (&vnode.data.isolate, vnode.elm) {
            self.insert_element(namespace, elm);
        }
        Ok(())
    }

    fn update(&self, old: &VNode, vnode: &VNode) -> anyhow::Result<()> {
        if old.data.isolate != vnode.data.isolate && old.data.isolate.is_some() {
            if let Some(old_elm) = old.elm {
                self.remove_element(old_elm);
            }
        }
        self.create(vnode)
    }

    fn destroy(&self, vnode: &VNode) -> anyhow::Result<()> {
        self.defer_removal(vnode);
        Ok(())
    }

    fn remove(&self, vnode: &VNode) -> anyhow::Result<()> {
        self.defer_removal(vnode);
        Ok(())
    }

    fn post(&self) -> anyhow::Result<()> {
        self.flush();
        Ok(())
    }
}
