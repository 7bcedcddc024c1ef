//! DOM Events
//!
//! Native listener registry and capture/target/bubble dispatch.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::{NodeId, SharedDocument};

/// Listener callback
pub type EventHandler = Rc<dyn Fn(&mut Event)>;

/// Dispatch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// DOM event
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    pub current_target: Option<NodeId>,
    pub phase: EventPhase,
    pub bubbles: bool,
    pub cancelable: bool,
    /// Extra event fields (`key`, `button`, ...)
    pub detail: BTreeMap<String, String>,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
    in_passive_listener: bool,
}

impl Event {
    /// Create an event that neither bubbles nor is cancelable
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: NodeId::ROOT,
            current_target: None,
            phase: EventPhase::None,
            bubbles: false,
            cancelable: false,
            detail: BTreeMap::new(),
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            in_passive_listener: false,
        }
    }

    /// Create an event with the flags a user agent gives it
    pub fn user_agent(event_type: &str) -> Self {
        let (bubbles, cancelable) = native_flags(event_type);
        Self::new(event_type).bubbles(bubbles).cancelable(cancelable)
    }

    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.detail.insert(key.to_string(), value.to_string());
        self
    }

    /// Prevent default action (ignored in passive listeners)
    pub fn prevent_default(&mut self) {
        if self.cancelable && !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    /// Stop propagation after the current node
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stop propagation, skipping remaining listeners on the current node
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    /// Check if default was prevented
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// True while a passive listener runs
    pub fn in_passive_listener(&self) -> bool {
        self.in_passive_listener
    }

    /// Copy the outcome flags of a listener's working copy back
    pub fn absorb(&mut self, other: &Event) {
        self.default_prevented |= other.default_prevented;
        self.propagation_stopped |= other.propagation_stopped;
        self.immediate_propagation_stopped |= other.immediate_propagation_stopped;
    }
}

/// `(bubbles, cancelable)` for events fired by the user agent
fn native_flags(event_type: &str) -> (bool, bool) {
    match event_type {
        "click" | "dblclick" | "mousedown" | "mouseup" | "contextmenu" | "keydown"
        | "keypress" | "submit" | "touchstart" | "touchend" | "wheel" => (true, true),
        "mousemove" | "mouseover" | "mouseout" | "keyup" | "input" | "change" | "reset"
        | "focusin" | "focusout" => (true, false),
        "mouseenter" | "mouseleave" | "focus" | "blur" | "load" | "unload" | "scroll"
        | "resize" => (false, false),
        _ => (true, false),
    }
}

/// Listener identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Listener options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
}

struct RegisteredListener {
    id: ListenerId,
    options: ListenerOptions,
    handler: EventHandler,
}

/// Native listeners, grouped by (node, event type)
#[derive(Default)]
pub struct EventListeners {
    handlers: HashMap<(NodeId, String), Vec<RegisteredListener>>,
    index: HashMap<ListenerId, (NodeId, String)>,
    next_id: u64,
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("listeners", &self.index.len())
            .finish()
    }
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add event listener
    pub fn add(
        &mut self,
        node: NodeId,
        event_type: &str,
        options: ListenerOptions,
        handler: EventHandler,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.handlers
            .entry((node, event_type.to_string()))
            .or_default()
            .push(RegisteredListener {
                id,
                options,
                handler,
            });
        self.index.insert(id, (node, event_type.to_string()));
        tracing::trace!(?node, event_type, ?id, "native listener added");
        id
    }

    /// Remove event listener
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let Some(key) = self.index.remove(&id) else {
            return false;
        };
        if let Some(listeners) = self.handlers.get_mut(&key) {
            listeners.retain(|l| l.id != id);
            if listeners.is_empty() {
                self.handlers.remove(&key);
            }
        }
        tracing::trace!(node = ?key.0, event_type = %key.1, ?id, "native listener removed");
        true
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of listeners for (node, event type)
    pub fn count(&self, node: NodeId, event_type: &str) -> usize {
        self.handlers
            .get(&(node, event_type.to_string()))
            .map_or(0, Vec::len)
    }

    /// Total number of listeners
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn matching(
        &self,
        node: NodeId,
        event_type: &str,
        capture: bool,
    ) -> Vec<(ListenerId, bool, EventHandler)> {
        self.handlers
            .get(&(node, event_type.to_string()))
            .map(|v| {
                v.iter()
                    .filter(|l| l.options.capture == capture)
                    .map(|l| (l.id, l.options.passive, l.handler.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Dispatch `event` at `target`, returning it with its final flags.
///
/// The propagation path is computed once, before any listener runs, so
/// listeners may freely mutate the tree. No borrow of `doc` is held while a
/// listener runs.
pub fn dispatch_event(doc: &SharedDocument, target: NodeId, mut event: Event) -> Event {
    event.target = target;
    event.propagation_stopped = false;
    event.immediate_propagation_stopped = false;

    let path: Vec<NodeId> = {
        let doc = doc.borrow();
        std::iter::once(target)
            .chain(doc.tree.ancestors(target))
            .collect()
    };
    tracing::trace!(event_type = %event.event_type, ?target, depth = path.len(), "dispatch");

    event.phase = EventPhase::Capturing;
    for &node in path.iter().skip(1).rev() {
        invoke(doc, node, &mut event, true);
        if event.propagation_stopped {
            return finish(event);
        }
    }

    event.phase = EventPhase::AtTarget;
    invoke(doc, target, &mut event, true);
    if !event.immediate_propagation_stopped {
        invoke(doc, target, &mut event, false);
    }
    if event.propagation_stopped {
        return finish(event);
    }

    if event.bubbles {
        event.phase = EventPhase::Bubbling;
        for &node in path.iter().skip(1) {
            invoke(doc, node, &mut event, false);
            if event.propagation_stopped {
                break;
            }
        }
    }

    finish(event)
}

fn invoke(doc: &SharedDocument, node: NodeId, event: &mut Event, capture: bool) {
    let listeners = doc
        .borrow()
        .listeners
        .matching(node, &event.event_type, capture);

    for (id, passive, handler) in listeners {
        // Listeners removed by an earlier listener of this node don't run
        if !doc.borrow().listeners.contains(id) {
            continue;
        }
        event.current_target = Some(node);
        event.in_passive_listener = passive;
        handler(event);
        event.in_passive_listener = false;
        if event.immediate_propagation_stopped {
            break;
        }
    }
}

fn finish(mut event: Event) -> Event {
    event.phase = EventPhase::None;
    event.current_target = None;
    event
}

/// Fire a user-agent `click` at `target`
pub fn click(doc: &SharedDocument, target: NodeId) -> Event {
    dispatch_event(doc, target, Event::user_agent("click"))
}

/// Fire a user-agent `focus` at `target`
pub fn focus(doc: &SharedDocument, target: NodeId) -> Event {
    dispatch_event(doc, target, Event::user_agent("focus"))
}

/// Fire a user-agent `blur` at `target`
pub fn blur(doc: &SharedDocument, target: NodeId) -> Event {
    dispatch_event(doc, target, Event::user_agent("blur"))
}

/// Fire a user-agent `reset` at a form
pub fn reset(doc: &SharedDocument, form: NodeId) -> Event {
    dispatch_event(doc, form, Event::user_agent("reset"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;
    use std::cell::RefCell;

    fn setup() -> (SharedDocument, NodeId, NodeId) {
        let doc = Document::shared("about:blank");
        let (outer, inner) = {
            let mut d = doc.borrow_mut();
            let body = d.body();
            let outer = d.append_element(body, "div");
            let inner = d.append_element(outer, "button");
            (outer, inner)
        };
        (doc, outer, inner)
    }

    fn record(
        doc: &SharedDocument,
        node: NodeId,
        event_type: &str,
        options: ListenerOptions,
        log: &Rc<RefCell<Vec<String>>>,
        label: &str,
    ) -> ListenerId {
        let log = log.clone();
        let label = label.to_string();
        doc.borrow_mut().listeners.add(
            node,
            event_type,
            options,
            Rc::new(move |_: &mut Event| log.borrow_mut().push(label.clone())),
        )
    }

    #[test]
    fn test_capture_target_bubble_order() {
        let (doc, outer, inner) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let capture = ListenerOptions {
            capture: true,
            passive: false,
        };
        record(&doc, outer, "click", ListenerOptions::default(), &log, "outer-bubble");
        record(&doc, outer, "click", capture, &log, "outer-capture");
        record(&doc, inner, "click", ListenerOptions::default(), &log, "inner");

        click(&doc, inner);

        assert_eq!(
            *log.borrow(),
            vec!["outer-capture", "inner", "outer-bubble"]
        );
    }

    #[test]
    fn test_non_bubbling_event_stays_at_target() {
        let (doc, outer, inner) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&doc, outer, "focus", ListenerOptions::default(), &log, "outer");
        record(&doc, inner, "focus", ListenerOptions::default(), &log, "inner");

        focus(&doc, inner);

        assert_eq!(*log.borrow(), vec!["inner"]);
    }

    #[test]
    fn test_stop_propagation() {
        let (doc, outer, inner) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        doc.borrow_mut().listeners.add(
            inner,
            "click",
            ListenerOptions::default(),
            Rc::new(|e: &mut Event| e.stop_propagation()),
        );
        record(&doc, outer, "click", ListenerOptions::default(), &log, "outer");

        let event = click(&doc, inner);

        assert!(log.borrow().is_empty());
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn test_passive_listener_cannot_prevent_default() {
        let (doc, _, inner) = setup();
        let passive = ListenerOptions {
            capture: false,
            passive: true,
        };
        doc.borrow_mut().listeners.add(
            inner,
            "click",
            passive,
            Rc::new(|e: &mut Event| e.prevent_default()),
        );

        assert!(!click(&doc, inner).is_default_prevented());
    }

    #[test]
    fn test_listener_may_mutate_tree() {
        let (doc, outer, inner) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = doc.clone();
        doc.borrow_mut().listeners.add(
            inner,
            "click",
            ListenerOptions::default(),
            Rc::new(move |e: &mut Event| {
                let target = e.target;
                handle.borrow_mut().tree.detach(target);
            }),
        );
        record(&doc, outer, "click", ListenerOptions::default(), &log, "outer");

        click(&doc, inner);

        // The path was frozen before the target was removed
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(doc.borrow().tree.parent(inner), None);
    }

    #[test]
    fn test_remove_listener() {
        let (doc, _, inner) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = record(&doc, inner, "click", ListenerOptions::default(), &log, "x");

        assert_eq!(doc.borrow().listeners.count(inner, "click"), 1);
        assert!(doc.borrow_mut().listeners.remove(id));
        assert!(!doc.borrow_mut().listeners.remove(id));
        click(&doc, inner);
        assert!(log.borrow().is_empty());
    }
}
