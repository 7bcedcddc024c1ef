//! Delegated events
//!
//! [`DomEvent`] wraps a copy of the native event together with the state the
//! delegator tracks while it simulates propagation. Clones share that state,
//! so a listener calling `stop_propagation` is seen by the dispatch loop.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use fos_dom::{Event, NodeId};

struct EventState {
    native: RefCell<Event>,
    owner_target: Cell<Option<NodeId>>,
    propagation_has_been_stopped: Cell<bool>,
}

/// Event delivered by a DOM source
#[derive(Clone)]
pub struct DomEvent {
    state: Rc<EventState>,
}

impl DomEvent {
    pub fn new(native: Event) -> Self {
        Self {
            state: Rc::new(EventState {
                native: RefCell::new(native),
                owner_target: Cell::new(None),
                propagation_has_been_stopped: Cell::new(false),
            }),
        }
    }

    pub fn event_type(&self) -> String {
        self.state.native.borrow().event_type.clone()
    }

    /// Element the event was dispatched at
    pub fn target(&self) -> NodeId {
        self.state.native.borrow().target
    }

    /// Element the event is being delivered for, as seen by the simulated
    /// propagation
    pub fn owner_target(&self) -> Option<NodeId> {
        self.state.owner_target.get()
    }

    /// Same as [`DomEvent::owner_target`]
    pub fn current_target(&self) -> Option<NodeId> {
        self.owner_target()
    }

    /// Snapshot of the wrapped native event
    pub fn native(&self) -> Event {
        self.state.native.borrow().clone()
    }

    pub fn detail(&self, key: &str) -> Option<String> {
        self.state.native.borrow().detail.get(key).cloned()
    }

    pub fn bubbles(&self) -> bool {
        self.state.native.borrow().bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.state.native.borrow().cancelable
    }

    pub fn prevent_default(&self) {
        self.state.native.borrow_mut().prevent_default();
    }

    pub fn is_default_prevented(&self) -> bool {
        self.state.native.borrow().is_default_prevented()
    }

    /// Stop the simulated propagation for the current pass, and the native
    /// propagation with it
    pub fn stop_propagation(&self) {
        self.state.native.borrow_mut().stop_propagation();
        self.state.propagation_has_been_stopped.set(true);
    }

    pub fn propagation_has_been_stopped(&self) -> bool {
        self.state.propagation_has_been_stopped.get()
    }

    pub(crate) fn set_owner_target(&self, element: NodeId) {
        self.state.owner_target.set(Some(element));
        self.state.native.borrow_mut().current_target = Some(element);
    }

    pub(crate) fn reset_propagation_flag(&self) {
        self.state.propagation_has_been_stopped.set(false);
    }

    /// Stop native propagation without touching the simulated flag
    pub(crate) fn stop_native_propagation(&self) {
        self.state.native.borrow_mut().stop_propagation();
    }

    /// Copy the outcome flags onto the event being natively dispatched
    pub(crate) fn apply_to(&self, native: &mut Event) {
        native.absorb(&self.state.native.borrow());
    }
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let native = self.state.native.borrow();
        f.debug_struct("DomEvent")
            .field("type", &native.event_type)
            .field("target", &native.target)
            .field("owner_target", &self.state.owner_target.get())
            .field("stopped", &self.state.propagation_has_been_stopped.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let event = DomEvent::new(Event::user_agent("click"));
        let seen_by_listener = event.clone();

        seen_by_listener.stop_propagation();
        seen_by_listener.prevent_default();

        assert!(event.propagation_has_been_stopped());
        assert!(event.is_default_prevented());

        event.reset_propagation_flag();
        assert!(!seen_by_listener.propagation_has_been_stopped());
    }

    #[test]
    fn test_apply_to_native() {
        let event = DomEvent::new(Event::user_agent("submit"));
        event.prevent_default();
        event.stop_native_propagation();
        assert!(!event.propagation_has_been_stopped());

        let mut native = Event::user_agent("submit");
        event.apply_to(&mut native);
        assert!(native.is_default_prevented());
        assert!(native.is_propagation_stopped());
    }
}
