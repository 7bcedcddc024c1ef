//! Scope Checker
//!
//! Decides whether an element belongs *directly* to a scope, as opposed to
//! being reachable only through a nested isolation boundary.

use std::rc::Rc;

use fos_dom::NodeId;

use crate::Result;
use crate::isolate_module::IsolateModule;
use crate::namespace::{Namespace, ScopeKind};

#[derive(Clone)]
pub struct ScopeChecker {
    namespace: Namespace,
    /// `namespace` without selector segments
    isolation: Namespace,
    isolate: Rc<IsolateModule>,
}

impl ScopeChecker {
    pub fn new(namespace: Namespace, isolate: Rc<IsolateModule>) -> Self {
        let isolation = namespace.isolation_path();
        Self {
            namespace,
            isolation,
            isolate,
        }
    }

    /// Full namespace the checker was built for
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn isolation_path(&self) -> &Namespace {
        &self.isolation
    }

    /// True if `element` lives in this scope and not behind a `Total`
    /// boundary nested below it
    pub fn is_directly_in_scope(&self, element: NodeId) -> Result<bool> {
        let Some(element_ns) = self.isolate.namespace_of(element)? else {
            return Ok(false);
        };

        let target = self.isolation.scopes();
        let scopes = element_ns.scopes();
        if target.len() > scopes.len() || target != &scopes[..target.len()] {
            return Ok(false);
        }

        Ok(!scopes[target.len()..]
            .iter()
            .any(|s| s.kind == ScopeKind::Total))
    }
}
