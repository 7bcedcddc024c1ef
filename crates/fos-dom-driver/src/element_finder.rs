//! Element Finder
//!
//! Resolves a namespace to the elements it currently selects: the element
//! rooting its isolation path, queried with the trailing selector segments
//! and filtered to elements directly in scope.

use std::rc::Rc;

use fos_css::SelectorList;
use fos_dom::{NodeId, SharedDocument};

use crate::isolate_module::IsolateModule;
use crate::namespace::Namespace;
use crate::scope_checker::ScopeChecker;
use crate::{DriverError, Result};

#[derive(Clone)]
pub struct ElementFinder {
    doc: SharedDocument,
    namespace: Namespace,
    selector: Option<SelectorList>,
    checker: ScopeChecker,
    isolate: Rc<IsolateModule>,
}

impl ElementFinder {
    /// Fails if the trailing selector text does not parse
    pub fn new(doc: SharedDocument, namespace: Namespace, isolate: Rc<IsolateModule>) -> Result<Self> {
        let text = namespace.selectors();
        let selector = match text.as_str() {
            "" => None,
            text => Some(SelectorList::parse(text).map_err(|e| DriverError::selector(text, e))?),
        };
        let checker = ScopeChecker::new(namespace.clone(), isolate.clone());
        Ok(Self {
            doc,
            namespace,
            selector,
            checker,
            isolate,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Elements currently selected by the namespace, in document order with
    /// the scope root last
    pub fn find(&self) -> Result<Vec<NodeId>> {
        let isolation = self.namespace.isolation_path();
        let Some(top) = self.isolate.element_at(isolation.scopes()) else {
            return Ok(Vec::new());
        };
        let Some(selector) = &self.selector else {
            return Ok(vec![top]);
        };

        let (candidates, top_matches) = {
            let doc = self.doc.borrow();
            (
                fos_css::query_selector_all(&doc.tree, top, selector),
                fos_css::matches(&doc.tree, top, selector),
            )
        };

        let mut found = Vec::with_capacity(candidates.len() + 1);
        for element in candidates {
            if self.checker.is_directly_in_scope(element)? {
                found.push(element);
            }
        }
        if top_matches {
            found.push(top);
        }
        tracing::trace!(namespace = %self.namespace, found = found.len(), "elements found");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Scope;
    use fos_dom::Document;

    fn element(doc: &SharedDocument, parent: NodeId, tag: &str, class: &str) -> NodeId {
        let mut d = doc.borrow_mut();
        let node = d.append_element(parent, tag);
        d.tree.element_mut(node).unwrap().set_attr("class", class);
        node
    }

    /// ```text
    /// div.top            []
    ///   h2.bar
    ///   div.bar          [total foo]
    ///     h4.bar
    /// ```
    fn setup() -> (SharedDocument, Rc<IsolateModule>, [NodeId; 4]) {
        let doc = Document::shared("about:blank");
        let body = doc.borrow().body();
        let top = element(&doc, body, "div", "top");
        let h2 = element(&doc, top, "h2", "bar");
        let scoped = element(&doc, top, "div", "bar");
        let h4 = element(&doc, scoped, "h4", "bar");

        let module = Rc::new(IsolateModule::new(doc.clone()));
        module.insert_element(&Namespace::root(), top);
        module.insert_element(&Namespace::new(vec![Scope::total("foo")]), scoped);
        (doc, module, [top, h2, scoped, h4])
    }

    #[test]
    fn test_parent_cannot_see_into_total_scope() {
        let (doc, module, [_, h2, _, _]) = setup();
        let ns = Namespace::new(vec![Scope::selector(".bar")]);
        let finder = ElementFinder::new(doc, ns, module).unwrap();

        assert_eq!(finder.find().unwrap(), vec![h2]);
    }

    #[test]
    fn test_isolated_scope_includes_matching_root() {
        let (doc, module, [_, _, scoped, h4]) = setup();
        let ns = Namespace::new(vec![Scope::total("foo"), Scope::selector(".bar")]);
        let finder = ElementFinder::new(doc, ns, module).unwrap();

        assert_eq!(finder.find().unwrap(), vec![h4, scoped]);
    }

    #[test]
    fn test_no_selector_yields_scope_root() {
        let (doc, module, [_, _, scoped, _]) = setup();
        let finder =
            ElementFinder::new(doc.clone(), Namespace::new(vec![Scope::total("foo")]), module.clone())
                .unwrap();
        assert_eq!(finder.find().unwrap(), vec![scoped]);

        let missing = ElementFinder::new(doc, Namespace::new(vec![Scope::total("nope")]), module)
            .unwrap();
        assert!(missing.find().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let (doc, module, _) = setup();
        let ns = Namespace::new(vec![Scope::selector("div >> p")]);
        assert!(matches!(
            ElementFinder::new(doc, ns, module),
            Err(DriverError::InvalidSelector { .. })
        ));
    }
}
