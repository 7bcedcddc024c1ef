//! Event Delegator
//!
//! Connects one native listener per `(event type, passive)` at the render
//! root (the "origin") with any number of destinations, the outputs of
//! `DomSource::events`. Capture and bubble propagation is simulated along
//! the real DOM path, honoring isolation boundaries:
//!
//! - a `Total` boundary stops the walk at its scope root
//! - a `Sibling` boundary lets the walk continue into the scope that
//!   declared it
//!
//! Event types that don't bubble are listened to on every element the
//! destination's namespace currently selects instead.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use fos_css::SelectorList;
use fos_dom::{ListenerOptions, NodeId, SharedDocument};

use crate::config::ErrorReporter;
use crate::dom_event::DomEvent;
use crate::element_finder::ElementFinder;
use crate::from_event::{PreventDefault, from_event};
use crate::isolate_module::IsolateModule;
use crate::namespace::{Namespace, ScopeKind};
use crate::priority_queue::PriorityQueue;
use crate::scope_checker::ScopeChecker;
use crate::stream::{Listener, Producer, Sink, Stream, Subscription};
use crate::symbol_tree::SymbolTree;
use crate::{DriverError, Result};

/// Event types whose `bubbles` defaults to false
pub const NON_BUBBLING_EVENTS: [&str; 27] = [
    "blur",
    "canplay",
    "canplaythrough",
    "durationchange",
    "emptied",
    "ended",
    "focus",
    "load",
    "loadeddata",
    "loadedmetadata",
    "mouseenter",
    "mouseleave",
    "pause",
    "play",
    "playing",
    "ratechange",
    "reset",
    "scroll",
    "seeked",
    "seeking",
    "stalled",
    "submit",
    "suspend",
    "timeupdate",
    "unload",
    "volumechange",
    "waiting",
];

pub fn bubbles_by_default(event_type: &str) -> bool {
    !NON_BUBBLING_EVENTS.contains(&event_type)
}

/// Options for `DomSource::events`
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    pub use_capture: bool,
    pub passive: bool,
    pub prevent_default: PreventDefault,
    /// Overrides [`bubbles_by_default`]
    pub bubbles: Option<bool>,
}

impl EventOptions {
    pub fn capture() -> Self {
        Self {
            use_capture: true,
            ..Self::default()
        }
    }

    pub fn with_capture(mut self, use_capture: bool) -> Self {
        self.use_capture = use_capture;
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn with_prevent_default(mut self, prevent_default: PreventDefault) -> Self {
        self.prevent_default = prevent_default;
        self
    }

    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = Some(bubbles);
        self
    }
}

/// What a destination listens for
#[derive(Clone)]
struct Route {
    event_type: String,
    checker: ScopeChecker,
    selector: Option<SelectorList>,
    use_capture: bool,
    passive: bool,
    prevent_default: PreventDefault,
}

impl Route {
    fn isolation_path(&self) -> &Namespace {
        self.checker.isolation_path()
    }
}

/// One live `events()` subscription
struct Destination {
    id: u64,
    route: Route,
    sink: Sink<DomEvent>,
}

type ListenerMap = HashMap<String, PriorityQueue<Rc<Destination>>>;

#[derive(Default)]
struct RootListener {
    /// Destinations using this listener
    count: usize,
    subscription: Option<Subscription>,
}

/// Destinations for a non-bubbling type sharing one `(type, namespace)`
struct NonBubbling {
    namespace: Namespace,
    finder: ElementFinder,
    destination: Rc<Destination>,
    output: Stream<DomEvent>,
    refs: usize,
}

/// Native listener on one element for a non-bubbling type
struct ElementBinding {
    /// Dropping it detaches the native listener
    _subscription: Subscription,
    /// Ids of the registrations fed by this listener
    registrations: Vec<u64>,
}

#[derive(Default)]
struct DelegatorState {
    origin: Option<NodeId>,
    root_listeners: HashMap<(String, bool), RootListener>,
    virtual_listeners: SymbolTree<ListenerMap>,
    /// Ids of destinations allowed to receive events
    registered: HashSet<u64>,
    non_bubbling: HashMap<u64, NonBubbling>,
    element_bindings: HashMap<(String, NodeId), ElementBinding>,
    /// Follows the render root for as long as the delegator lives
    _root_subscription: Option<Subscription>,
    next_id: u64,
}

impl DelegatorState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Shared {
    doc: SharedDocument,
    isolate: Rc<IsolateModule>,
    report: ErrorReporter,
    state: RefCell<DelegatorState>,
}

/// Routes native events to `DomSource::events` streams
#[derive(Clone)]
pub struct EventDelegator {
    shared: Rc<Shared>,
}

/// Prefix lengths of `path` a destination is queued under: the full path,
/// then shorter prefixes until a stripped segment is `Total`
fn ladder(path: &Namespace) -> Vec<usize> {
    let scopes = path.scopes();
    let mut max = scopes.len();
    let mut lengths = vec![max];
    while max > 0 && scopes[max - 1].kind != ScopeKind::Total {
        max -= 1;
        lengths.push(max);
    }
    lengths
}

impl EventDelegator {
    /// Create a delegator following the elements emitted by `root`
    pub fn new(
        doc: SharedDocument,
        isolate: Rc<IsolateModule>,
        root: &Stream<NodeId>,
        report: ErrorReporter,
    ) -> Self {
        let shared = Rc::new(Shared {
            doc,
            isolate: isolate.clone(),
            report,
            state: RefCell::new(DelegatorState::default()),
        });

        let weak = Rc::downgrade(&shared);
        isolate.set_removal_observer(Rc::new(move |element| {
            if let Some(shared) = weak.upgrade() {
                shared.remove_element(element);
            }
        }));

        let weak = Rc::downgrade(&shared);
        let subscription = root.subscribe(move |&element: &NodeId| {
            if let Some(shared) = weak.upgrade() {
                shared.on_root(element);
            }
        });
        shared.state.borrow_mut()._root_subscription = Some(subscription);

        Self { shared }
    }

    /// Stream of `event_type` events for `namespace`.
    ///
    /// Nothing is attached until the stream is subscribed to.
    pub fn add_event_listener(
        &self,
        event_type: &str,
        namespace: &Namespace,
        options: &EventOptions,
    ) -> Result<Stream<DomEvent>> {
        options.prevent_default.validate()?;

        let text = namespace.selectors();
        let selector = match text.as_str() {
            "" => None,
            text => Some(SelectorList::parse(text).map_err(|e| DriverError::selector(text, e))?),
        };
        let route = Route {
            event_type: event_type.to_string(),
            checker: ScopeChecker::new(namespace.clone(), self.shared.isolate.clone()),
            selector,
            use_capture: options.use_capture,
            passive: options.passive,
            prevent_default: options.prevent_default.clone(),
        };

        let bubbles = options.bubbles.unwrap_or_else(|| bubbles_by_default(event_type));
        if bubbles {
            return Ok(Stream::create(BubblingProducer {
                shared: self.shared.clone(),
                route,
                destination: None,
            }));
        }

        let finder = ElementFinder::new(
            self.shared.doc.clone(),
            namespace.clone(),
            self.shared.isolate.clone(),
        )?;
        Ok(Stream::create(NonBubblingProducer {
            shared: self.shared.clone(),
            route,
            namespace: namespace.clone(),
            finder,
            registration: None,
            subscription: None,
        }))
    }

    /// Element the root listeners are attached to
    pub fn origin(&self) -> Option<NodeId> {
        self.shared.state.borrow().origin
    }

    /// Drop native listeners bound to `element` for non-bubbling types
    pub fn remove_element(&self, element: NodeId) {
        self.shared.remove_element(element);
    }

    /// Number of elements with a native listener for non-bubbling `event_type`
    pub fn bound_elements(&self, event_type: &str) -> usize {
        self.shared
            .state
            .borrow()
            .element_bindings
            .keys()
            .filter(|(t, _)| t == event_type)
            .count()
    }
}

impl Shared {
    fn report(&self, err: &DriverError) {
        (self.report)(err);
    }

    fn on_root(self: &Rc<Self>, element: NodeId) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.origin != Some(element);
            state.origin = Some(element);
            changed
        };
        if changed {
            tracing::debug!(?element, "delegation origin changed");
            self.reset_root_listeners();
        }

        self.prune_element_bindings();
        let registrations: Vec<u64> = self.state.borrow().non_bubbling.keys().copied().collect();
        for id in registrations {
            self.bind_non_bubbling(id);
        }
    }

    fn reset_root_listeners(self: &Rc<Self>) {
        let (keys, stale): (Vec<(String, bool)>, Vec<Subscription>) = {
            let mut state = self.state.borrow_mut();
            let mut keys = Vec::new();
            let mut stale = Vec::new();
            for (key, listener) in state.root_listeners.iter_mut() {
                if let Some(sub) = listener.subscription.take() {
                    stale.push(sub);
                }
                if listener.count > 0 {
                    keys.push(key.clone());
                }
            }
            (keys, stale)
        };
        drop(stale);

        for (event_type, passive) in keys {
            self.attach_root_listener(&event_type, passive);
        }
    }

    fn attach_root_listener(self: &Rc<Self>, event_type: &str, passive: bool) {
        let Some(origin) = self.state.borrow().origin else {
            return;
        };

        let options = ListenerOptions {
            capture: false,
            passive,
        };
        let weak = Rc::downgrade(self);
        let key = event_type.to_string();
        let subscription = from_event(&self.doc, origin, event_type, options, PreventDefault::Never)
            .subscribe(move |event: &DomEvent| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_event(&key, event, passive);
                }
            });

        if let Some(listener) = self
            .state
            .borrow_mut()
            .root_listeners
            .get_mut(&(event_type.to_string(), passive))
        {
            listener.subscription = Some(subscription);
        }
    }

    fn acquire_root_listener(self: &Rc<Self>, event_type: &str, passive: bool) {
        let first = {
            let mut state = self.state.borrow_mut();
            let listener = state
                .root_listeners
                .entry((event_type.to_string(), passive))
                .or_default();
            listener.count += 1;
            listener.count == 1
        };
        if first {
            self.attach_root_listener(event_type, passive);
        }
    }

    fn release_root_listener(&self, event_type: &str, passive: bool) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let key = (event_type.to_string(), passive);
            let now_unused = state.root_listeners.get_mut(&key).is_some_and(|l| {
                l.count = l.count.saturating_sub(1);
                l.count == 0
            });
            if now_unused {
                state.root_listeners.remove(&key)
            } else {
                None
            }
        };
        // Dropping the subscription detaches the native listener
        drop(removed);
    }

    fn insert_destination(&self, destination: &Rc<Destination>) {
        let path = destination.route.isolation_path();
        let priority = path.len();
        let mut state = self.state.borrow_mut();
        for len in ladder(path) {
            state
                .virtual_listeners
                .get_or_insert_with(path.scopes(), len, HashMap::new)
                .entry(destination.route.event_type.clone())
                .or_default()
                .add(destination.clone(), priority);
        }
        state.registered.insert(destination.id);
    }

    fn remove_destination(&self, destination: &Destination) {
        let path = destination.route.isolation_path();
        let mut state = self.state.borrow_mut();
        state.registered.remove(&destination.id);
        for len in ladder(path) {
            if let Some(queue) = state
                .virtual_listeners
                .get_mut(path.scopes(), len)
                .and_then(|map| map.get_mut(&destination.route.event_type))
            {
                queue.remove_where(|d| d.id == destination.id);
            }
        }
    }

    fn on_event(&self, event_type: &str, event: &DomEvent, passive: bool) {
        let target = event.target();
        let (namespace, root) = match (
            self.isolate.namespace_of(target),
            self.isolate.root_element(target),
        ) {
            (Ok(Some(namespace)), Ok(Some(root))) => (namespace, root),
            (Err(err), _) | (_, Err(err)) => {
                self.report(&err);
                return;
            }
            _ => {
                tracing::trace!(?target, event_type, "event from untracked element dropped");
                return;
            }
        };

        let queue = {
            let state = self.state.borrow();
            state
                .virtual_listeners
                .get(namespace.scopes(), namespace.dispatch_len())
                .and_then(|map| map.get(event_type))
                .map(PriorityQueue::snapshot)
                .unwrap_or_default()
        };
        if queue.is_empty() {
            return;
        }

        let path = self.propagation_path(target, root, &namespace);
        tracing::trace!(event_type, ?target, depth = path.len(), destinations = queue.len(), "delegated dispatch");

        for &element in path.iter().rev() {
            self.deliver(element, event, &queue, true, Some(passive));
            if event.propagation_has_been_stopped() {
                break;
            }
        }

        event.reset_propagation_flag();
        for &element in &path {
            self.deliver(element, event, &queue, false, Some(passive));
            if event.propagation_has_been_stopped() {
                break;
            }
        }
    }

    /// Elements from `target` up to the outermost scope root reachable
    /// through `Sibling` boundaries, frozen before any listener runs
    fn propagation_path(&self, target: NodeId, root: NodeId, namespace: &Namespace) -> Vec<NodeId> {
        let doc = self.doc.borrow();
        let scopes = namespace.scopes();
        let mut path = Vec::new();
        let mut element = target;
        let mut root = root;
        let mut index = scopes.len();

        loop {
            path.push(element);
            if element == root {
                if index == 0 || scopes[index - 1].kind != ScopeKind::Sibling {
                    break;
                }
                match self.isolate.element_at(namespace.prefix(index - 1)) {
                    Some(outer) => root = outer,
                    None => break,
                }
                index -= 1;
            }
            match doc.tree.parent(element) {
                Some(parent) => element = parent,
                None => break,
            }
        }
        path
    }

    /// Hand `event` to every destination firing at `element`
    fn deliver(
        &self,
        element: NodeId,
        event: &DomEvent,
        destinations: &[Rc<Destination>],
        use_capture: bool,
        passive: Option<bool>,
    ) {
        event.set_owner_target(element);

        for destination in destinations {
            let route = &destination.route;
            if route.use_capture != use_capture || passive.is_some_and(|p| p != route.passive) {
                continue;
            }
            if event.propagation_has_been_stopped() {
                break;
            }
            if !self.state.borrow().registered.contains(&destination.id) {
                continue;
            }

            match route.checker.is_directly_in_scope(element) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    self.report(&err);
                    continue;
                }
            }

            let fires = match &route.selector {
                Some(selector) => fos_css::matches(&self.doc.borrow().tree, element, selector),
                None => self.isolate.element_at(route.isolation_path().scopes()) == Some(element),
            };
            if fires {
                route.prevent_default.apply(&self.doc, event);
                destination.sink.next(event.clone());
            }
        }
    }

    /// Join or create the registration for `(route.event_type, namespace)`
    fn join_non_bubbling(
        self: &Rc<Self>,
        route: &Route,
        namespace: &Namespace,
        finder: &ElementFinder,
    ) -> (u64, Stream<DomEvent>) {
        let (id, output, created) = {
            let mut state = self.state.borrow_mut();
            let existing = state.non_bubbling.iter_mut().find(|(_, r)| {
                r.destination.route.event_type == route.event_type && &r.namespace == namespace
            });
            match existing {
                Some((&id, registration)) => {
                    registration.refs += 1;
                    (id, registration.output.clone(), false)
                }
                None => {
                    let id = state.next_id();
                    let output = Stream::subject();
                    let destination = Rc::new(Destination {
                        id,
                        route: route.clone(),
                        sink: output.sink(),
                    });
                    state.non_bubbling.insert(
                        id,
                        NonBubbling {
                            namespace: namespace.clone(),
                            finder: finder.clone(),
                            destination,
                            output: output.clone(),
                            refs: 1,
                        },
                    );
                    state.registered.insert(id);
                    (id, output, true)
                }
            }
        };

        if created {
            tracing::debug!(event_type = %route.event_type, namespace = %namespace, "non-bubbling registration created");
            self.bind_non_bubbling(id);
        }
        (id, output)
    }

    fn leave_non_bubbling(&self, id: u64) {
        let released = {
            let mut state = self.state.borrow_mut();
            let Some(registration) = state.non_bubbling.get_mut(&id) else {
                return;
            };
            registration.refs = registration.refs.saturating_sub(1);
            if registration.refs > 0 {
                return;
            }
            state.non_bubbling.remove(&id);
            state.registered.remove(&id);

            let mut released = Vec::new();
            let keys: Vec<(String, NodeId)> = state.element_bindings.keys().cloned().collect();
            for key in keys {
                let unused = state.element_bindings.get_mut(&key).is_some_and(|binding| {
                    binding.registrations.retain(|&r| r != id);
                    binding.registrations.is_empty()
                });
                if unused {
                    released.extend(state.element_bindings.remove(&key));
                }
            }
            released
        };
        tracing::debug!(id, detached = released.len(), "non-bubbling registration dropped");
        drop(released);
    }

    /// Attach per-element listeners for a registration to the elements its
    /// namespace currently selects
    fn bind_non_bubbling(self: &Rc<Self>, id: u64) {
        let (finder, event_type, passive) = {
            let state = self.state.borrow();
            if state.origin.is_none() {
                return;
            }
            let Some(registration) = state.non_bubbling.get(&id) else {
                return;
            };
            let route = &registration.destination.route;
            (registration.finder.clone(), route.event_type.clone(), route.passive)
        };

        let elements = match finder.find() {
            Ok(elements) => elements,
            Err(err) => {
                self.report(&err);
                return;
            }
        };

        for element in elements {
            let key = (event_type.clone(), element);
            let bound = {
                let mut state = self.state.borrow_mut();
                match state.element_bindings.get_mut(&key) {
                    Some(binding) => {
                        if !binding.registrations.contains(&id) {
                            binding.registrations.push(id);
                        }
                        true
                    }
                    None => false,
                }
            };
            if bound {
                continue;
            }

            let weak = Rc::downgrade(self);
            let listened_type = event_type.clone();
            let options = ListenerOptions {
                capture: false,
                passive,
            };
            let subscription =
                from_event(&self.doc, element, &event_type, options, PreventDefault::Never).subscribe(
                    move |event: &DomEvent| {
                        if let Some(shared) = weak.upgrade() {
                            shared.on_non_bubbling_event(&listened_type, element, event);
                        }
                    },
                );
            self.state.borrow_mut().element_bindings.insert(
                key,
                ElementBinding {
                    _subscription: subscription,
                    registrations: vec![id],
                },
            );
        }
    }

    /// Detach per-element listeners of elements the last patch took out of
    /// the document
    fn prune_element_bindings(&self) {
        let released: Vec<ElementBinding> = {
            let doc = self.doc.borrow();
            let mut state = self.state.borrow_mut();
            let stale: Vec<(String, NodeId)> = state
                .element_bindings
                .keys()
                .filter(|(_, element)| !doc.tree.is_connected(*element))
                .cloned()
                .collect();
            stale
                .iter()
                .filter_map(|key| state.element_bindings.remove(key))
                .collect()
        };
        if !released.is_empty() {
            tracing::debug!(count = released.len(), "listeners of detached elements dropped");
        }
        drop(released);
    }

    fn on_non_bubbling_event(&self, event_type: &str, element: NodeId, event: &DomEvent) {
        if event.target() == element {
            let destinations: Vec<Rc<Destination>> = {
                let state = self.state.borrow();
                state
                    .element_bindings
                    .get(&(event_type.to_string(), element))
                    .map(|binding| {
                        binding
                            .registrations
                            .iter()
                            .filter_map(|id| state.non_bubbling.get(id))
                            .map(|r| r.destination.clone())
                            .collect()
                    })
                    .unwrap_or_default()
            };
            tracing::trace!(event_type, ?element, destinations = destinations.len(), "non-bubbling dispatch");

            self.deliver(element, event, &destinations, true, None);
            event.reset_propagation_flag();
            self.deliver(element, event, &destinations, false, None);
        }

        // Some of these types bubble natively anyway
        event.stop_native_propagation();
    }

    fn remove_element(&self, element: NodeId) {
        let released: Vec<ElementBinding> = {
            let mut state = self.state.borrow_mut();
            let keys: Vec<(String, NodeId)> = state
                .element_bindings
                .keys()
                .filter(|(_, e)| *e == element)
                .cloned()
                .collect();
            keys.iter()
                .filter_map(|key| state.element_bindings.remove(key))
                .collect()
        };
        if !released.is_empty() {
            tracing::debug!(?element, count = released.len(), "element listeners detached");
        }
        drop(released);
    }
}

struct BubblingProducer {
    shared: Rc<Shared>,
    route: Route,
    destination: Option<Rc<Destination>>,
}

impl Producer<DomEvent> for BubblingProducer {
    fn start(&mut self, sink: Sink<DomEvent>) {
        let id = self.shared.state.borrow_mut().next_id();
        let destination = Rc::new(Destination {
            id,
            route: self.route.clone(),
            sink,
        });
        self.shared.insert_destination(&destination);
        self.shared
            .acquire_root_listener(&self.route.event_type, self.route.passive);
        self.destination = Some(destination);
    }

    fn stop(&mut self) {
        if let Some(destination) = self.destination.take() {
            self.shared.remove_destination(&destination);
            self.shared
                .release_root_listener(&self.route.event_type, self.route.passive);
        }
    }
}

struct NonBubblingProducer {
    shared: Rc<Shared>,
    route: Route,
    namespace: Namespace,
    finder: ElementFinder,
    registration: Option<u64>,
    subscription: Option<Subscription>,
}

impl Producer<DomEvent> for NonBubblingProducer {
    fn start(&mut self, sink: Sink<DomEvent>) {
        let (id, output) = self
            .shared
            .join_non_bubbling(&self.route, &self.namespace, &self.finder);
        let on_error = sink.clone();
        let listener = Listener::new(move |event: &DomEvent| sink.next(event.clone()))
            .on_error(move |err| on_error.error(err.clone()));
        self.subscription = Some(output.subscribe_with(listener));
        self.registration = Some(id);
    }

    fn stop(&mut self) {
        drop(self.subscription.take());
        if let Some(id) = self.registration.take() {
            self.shared.leave_non_bubbling(id);
        }
    }
}
