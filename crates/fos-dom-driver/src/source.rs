//! DOM Sources
//!
//! The query object handed back by the driver. A source is scoped by a
//! namespace, or restricted to the document or body node. Scoped sources
//! resolve elements through the element finder and events through the
//! event delegator.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fos_css::SelectorList;
use fos_dom::{ListenerOptions, NodeId, SharedDocument};

use crate::config::ErrorReporter;
use crate::dom_event::DomEvent;
use crate::driver::RenderLoop;
use crate::element_finder::ElementFinder;
use crate::event_delegator::{EventDelegator, EventOptions};
use crate::from_event::from_event;
use crate::isolate::{isolate_namespace, isolate_sink};
use crate::isolate_module::IsolateModule;
use crate::namespace::{Namespace, Scope};
use crate::stream::{Stream, Subscription};
use crate::vnode::VNode;
use crate::{DriverError, Result};

/// Query surface shared by the real and the mocked DOM source
pub trait Source: Sized {
    /// Narrow the source by a CSS selector
    fn select(&self, selector: &str) -> Result<Self>;

    /// Events of `event_type` within the source
    fn events(&self, event_type: &str, options: EventOptions) -> Result<Stream<DomEvent>>;

    /// Elements matched by the source, refreshed after every render
    fn elements(&self) -> Stream<Vec<NodeId>>;

    /// First matched element; renders matching nothing are skipped
    fn element(&self) -> Stream<NodeId> {
        self.elements()
            .filter(|elements: &Vec<NodeId>| !elements.is_empty())
            .map(|elements| elements[0])
            .remember()
    }

    /// Source for the component isolated under `scope`
    fn isolate_source(&self, scope: &str) -> Self;

    /// Tag the trees of `sink` as rendered by the component isolated under
    /// `scope`
    fn isolate_sink(&self, sink: &Stream<Option<VNode>>, scope: &str) -> Stream<Option<VNode>>;
}

/// What a [`DomSource`] is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Scoped(Namespace),
    /// The document node; cannot be narrowed
    Document,
    /// The `<body>` element; cannot be narrowed
    Body,
}

/// State shared by every source of one driver run
pub(crate) struct SourceContext {
    pub(crate) doc: SharedDocument,
    /// Current render root
    pub(crate) root: Stream<NodeId>,
    pub(crate) isolate: Rc<IsolateModule>,
    pub(crate) delegator: EventDelegator,
    pub(crate) report: ErrorReporter,
    pub(crate) name: String,
    pub(crate) render: Rc<RenderLoop>,
    /// Subscription to the rendered vnode stream
    pub(crate) subscription: RefCell<Option<Subscription>>,
}

impl SourceContext {
    fn dispose(&self) {
        tracing::debug!(name = %self.name, "disposing DOM source");
        self.render.render(None);
        let subscription = self.subscription.borrow_mut().take();
        drop(subscription);
        self.root.complete();
    }
}

/// DOM source produced by `DomDriver::run`
#[derive(Clone)]
pub struct DomSource {
    kind: SourceKind,
    ctx: Rc<SourceContext>,
}

impl DomSource {
    pub(crate) fn new(kind: SourceKind, ctx: Rc<SourceContext>) -> Self {
        Self { kind, ctx }
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Namespace of a scoped source
    pub fn namespace(&self) -> Option<&Namespace> {
        match &self.kind {
            SourceKind::Scoped(namespace) => Some(namespace),
            SourceKind::Document | SourceKind::Body => None,
        }
    }

    /// Name given in `DriverOptions`
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// Render an empty tree and stop following the vnode stream
    pub fn dispose(&self) {
        self.ctx.dispose();
    }

    fn with_kind(&self, kind: SourceKind) -> Self {
        Self::new(kind, self.ctx.clone())
    }

    /// The node behind a restricted source
    fn restricted_node(&self) -> Option<NodeId> {
        let doc = self.ctx.doc.borrow();
        match self.kind {
            SourceKind::Document => Some(doc.tree.root()),
            SourceKind::Body => Some(doc.body()),
            SourceKind::Scoped(_) => None,
        }
    }
}

fn check_event_type(event_type: &str) -> Result<()> {
    if event_type.is_empty() || event_type.chars().any(char::is_whitespace) {
        return Err(DriverError::InvalidEventType(event_type.to_string()));
    }
    Ok(())
}

impl Source for DomSource {
    fn select(&self, selector: &str) -> Result<Self> {
        let namespace = match &self.kind {
            SourceKind::Scoped(namespace) => namespace,
            SourceKind::Document => return Err(DriverError::RestrictedSelect("document")),
            SourceKind::Body => return Err(DriverError::RestrictedSelect("body")),
        };

        let selector = selector.trim();
        let kind = match selector {
            "" => return Err(DriverError::EmptySelector),
            "document" => SourceKind::Document,
            "body" => SourceKind::Body,
            ":root" => SourceKind::Scoped(Namespace::root()),
            selector => {
                SelectorList::parse(selector).map_err(|e| DriverError::selector(selector, e))?;
                SourceKind::Scoped(namespace.with(Scope::selector(selector)))
            }
        };
        Ok(self.with_kind(kind))
    }

    fn events(&self, event_type: &str, options: EventOptions) -> Result<Stream<DomEvent>> {
        check_event_type(event_type)?;

        if let SourceKind::Scoped(namespace) = &self.kind {
            return self
                .ctx
                .delegator
                .add_event_listener(event_type, namespace, &options);
        }

        options.prevent_default.validate()?;
        let Some(node) = self.restricted_node() else {
            return Ok(Stream::empty());
        };
        let listener = ListenerOptions {
            capture: options.use_capture,
            passive: options.passive,
        };
        Ok(from_event(
            &self.ctx.doc,
            node,
            event_type,
            listener,
            options.prevent_default,
        ))
    }

    fn elements(&self) -> Stream<Vec<NodeId>> {
        let namespace = match &self.kind {
            SourceKind::Scoped(namespace) => namespace,
            SourceKind::Document | SourceKind::Body => {
                return Stream::of(self.restricted_node().into_iter().map(|n| vec![n]).collect());
            }
        };

        let finder = match ElementFinder::new(
            self.ctx.doc.clone(),
            namespace.clone(),
            self.ctx.isolate.clone(),
        ) {
            Ok(finder) => finder,
            Err(err) => {
                (self.ctx.report)(&err);
                return Stream::empty();
            }
        };

        let report = self.ctx.report.clone();
        self.ctx
            .root
            .map(move |_| {
                finder.find().unwrap_or_else(|err| {
                    report(&err);
                    Vec::new()
                })
            })
            .remember()
    }

    fn isolate_source(&self, scope: &str) -> Self {
        match &self.kind {
            SourceKind::Scoped(namespace) => {
                self.with_kind(SourceKind::Scoped(isolate_namespace(namespace, scope)))
            }
            SourceKind::Document | SourceKind::Body => self.clone(),
        }
    }

    fn isolate_sink(&self, sink: &Stream<Option<VNode>>, scope: &str) -> Stream<Option<VNode>> {
        match &self.kind {
            SourceKind::Scoped(namespace) => isolate_sink(namespace, sink, scope),
            SourceKind::Document | SourceKind::Body => sink.clone(),
        }
    }
}

impl fmt::Debug for DomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomSource")
            .field("name", &self.ctx.name)
            .field("kind", &self.kind)
            .finish()
    }
}
