//! DOM Driver
//!
//! Renders a stream of vnode trees into a container element and hands back
//! the [`DomSource`] querying it. Each run owns one isolation registry and
//! one event delegator.

use std::cell::RefCell;
use std::rc::Rc;

use fos_css::SelectorList;
use fos_dom::{NodeId, SharedDocument};

use crate::config::{DriverOptions, ErrorReporter};
use crate::event_delegator::EventDelegator;
use crate::isolate_module::IsolateModule;
use crate::namespace::Namespace;
use crate::patch::{Module, Patcher, to_vnode};
use crate::source::{DomSource, SourceContext, SourceKind};
use crate::stream::{Listener, Stream};
use crate::vnode::{ParsedSelector, VNode};
use crate::{DriverError, Result};

/// Where the driver renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Element(NodeId),
    /// First element matching the selector
    Selector(String),
}

impl From<NodeId> for Container {
    fn from(node: NodeId) -> Self {
        Self::Element(node)
    }
}

impl From<&str> for Container {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

/// Driver bound to a container element
pub struct DomDriver {
    doc: SharedDocument,
    container: NodeId,
    options: DriverOptions,
}

/// Resolve `container` and build a driver rendering into it
pub fn make_dom_driver(
    doc: SharedDocument,
    container: impl Into<Container>,
    options: DriverOptions,
) -> Result<DomDriver> {
    let container = {
        let d = doc.borrow();
        match container.into() {
            Container::Element(node) => {
                if !d.tree.is_element(node) {
                    return Err(DriverError::InvalidContainer(node));
                }
                node
            }
            Container::Selector(selector) => {
                let list = SelectorList::parse(&selector)
                    .map_err(|e| DriverError::selector(&selector, e))?;
                fos_css::query_selector(&d.tree, d.tree.root(), &list)
                    .ok_or(DriverError::UnknownContainer(selector))?
            }
        }
    };

    Ok(DomDriver {
        doc,
        container,
        options,
    })
}

impl DomDriver {
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Start rendering `vnodes` and return the source for the rendered tree.
    ///
    /// `None` renders an empty container.
    pub fn run(&self, vnodes: &Stream<Option<VNode>>) -> Result<DomSource> {
        let report = self.options.report_error.clone();
        let isolate = Rc::new(IsolateModule::new(self.doc.clone()));

        let mut modules: Vec<Rc<dyn Module>> = vec![isolate.clone()];
        modules.extend(self.options.modules.iter().cloned());
        let patcher = Patcher::new(self.doc.clone(), modules, report.clone());

        let root = Stream::memory_subject();
        let delegator =
            EventDelegator::new(self.doc.clone(), isolate.clone(), &root, report.clone());

        let first = to_vnode(&self.doc.borrow().tree, self.container);
        let wrapper = VnodeWrapper::new(&first);
        let current = patcher.patch(&first, add_root_scope(first.clone()))?;

        tracing::debug!(name = %self.options.name, container = ?self.container, "DOM driver started");
        root.emit(self.container);

        let render = Rc::new(RenderLoop {
            patcher,
            wrapper,
            current: RefCell::new(current),
            root: root.clone(),
            report: report.clone(),
        });

        let next = render.clone();
        let on_error = report.clone();
        let subscription = vnodes.subscribe_with(
            Listener::new(move |vnode: &Option<VNode>| next.render(vnode.clone()))
                .on_error(move |err| on_error(err.as_ref())),
        );

        let ctx = Rc::new(SourceContext {
            doc: self.doc.clone(),
            root,
            isolate,
            delegator,
            report,
            name: self.options.name.clone(),
            render,
            subscription: RefCell::new(Some(subscription)),
        });
        Ok(DomSource::new(SourceKind::Scoped(Namespace::root()), ctx))
    }
}

fn add_root_scope(mut vnode: VNode) -> VNode {
    vnode.data.isolate.get_or_insert_with(Namespace::root);
    vnode
}

/// Patches each emitted tree over the previous one and publishes the root
pub(crate) struct RenderLoop {
    patcher: Patcher,
    wrapper: VnodeWrapper,
    current: RefCell<VNode>,
    root: Stream<NodeId>,
    report: ErrorReporter,
}

impl RenderLoop {
    pub(crate) fn render(&self, vnode: Option<VNode>) {
        let next = self.wrapper.wrap(vnode);
        let old = self.current.borrow().clone();

        match self.patcher.patch(&old, next) {
            Ok(patched) => {
                let elm = patched.elm;
                *self.current.borrow_mut() = patched;
                if let Some(elm) = elm {
                    tracing::trace!(root = ?elm, "patched");
                    self.root.emit(elm);
                }
            }
            Err(err) => (self.report)(&err),
        }
    }
}

/// Wraps application trees in a vnode describing the container, unless the
/// tree already describes it
struct VnodeWrapper {
    selector: ParsedSelector,
    attrs: std::collections::BTreeMap<String, String>,
}

impl VnodeWrapper {
    fn new(root: &VNode) -> Self {
        Self {
            selector: root
                .selector()
                .unwrap_or_else(|| ParsedSelector::parse("div")),
            attrs: root.data.attrs.clone(),
        }
    }

    fn wrap(&self, vnode: Option<VNode>) -> VNode {
        match vnode {
            Some(vnode) if self.describes_root(&vnode) => add_root_scope(vnode),
            Some(vnode) => self.root_with(vec![vnode]),
            None => self.root_with(Vec::new()),
        }
    }

    fn describes_root(&self, vnode: &VNode) -> bool {
        let (Some(id), Some(selector)) = (vnode.id(), vnode.selector()) else {
            return false;
        };
        id.eq_ignore_ascii_case(self.selector.id.as_deref().unwrap_or_default())
            && selector.tag.eq_ignore_ascii_case(&self.selector.tag)
            && vnode
                .class_name()
                .eq_ignore_ascii_case(&self.selector.classes.join(" "))
    }

    fn root_with(&self, children: Vec<VNode>) -> VNode {
        let mut root = VNode::element(&self.selector.to_sel()).with_children(children);
        root.data.attrs = self.attrs.clone();
        add_root_scope(root)
    }
}
