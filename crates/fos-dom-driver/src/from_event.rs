//! Native event streams
//!
//! [`from_event`] turns a native listener on one node into a stream: the
//! listener is added when the stream starts and removed when it stops.

use std::fmt;
use std::rc::Rc;

use fos_dom::{Event, ListenerId, ListenerOptions, NodeId, SharedDocument};
use serde_json::{Map, Value, json};

use crate::dom_event::DomEvent;
use crate::stream::{Producer, Sink, Stream};
use crate::{DriverError, Result};

/// When to call `prevent_default` on a delivered event
#[derive(Clone, Default)]
pub enum PreventDefault {
    #[default]
    Never,
    Always,
    /// Prevent when the predicate holds
    When(Rc<dyn Fn(&DomEvent) -> bool>),
    /// Prevent when the event's JSON view contains this object
    Matching(Value),
}

impl PreventDefault {
    pub fn when(predicate: impl Fn(&DomEvent) -> bool + 'static) -> Self {
        Self::When(Rc::new(predicate))
    }

    /// Structural matcher; `value` must be a JSON object
    pub fn matching(value: Value) -> Result<Self> {
        let matcher = Self::Matching(value);
        matcher.validate()?;
        Ok(matcher)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Matching(value) if !value.is_object() => {
                Err(DriverError::InvalidPreventDefault(value.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Prevent the default action of `event` if this policy says so
    pub fn apply(&self, doc: &SharedDocument, event: &DomEvent) {
        let prevent = match self {
            Self::Never => false,
            Self::Always => true,
            Self::When(predicate) => predicate(event),
            Self::Matching(matcher) => match_value(matcher, &event_json(doc, event)),
        };
        if prevent {
            event.prevent_default();
        }
    }
}

impl fmt::Debug for PreventDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("Never"),
            Self::Always => f.write_str("Always"),
            Self::When(_) => f.write_str("When(..)"),
            Self::Matching(value) => write!(f, "Matching({value})"),
        }
    }
}

/// JSON view of an event used by [`PreventDefault::Matching`]. Detail
/// entries sit next to the standard fields.
fn event_json(doc: &SharedDocument, event: &DomEvent) -> Value {
    let native = event.native();
    let target = {
        let doc = doc.borrow();
        match doc.tree.element(native.target) {
            Some(data) => json!({
                "tagName": data.tag_name(),
                "id": data.id.clone().unwrap_or_default(),
                "className": data.class_name(),
                "classList": data.classes,
            }),
            None => Value::Null,
        }
    };

    let mut view = Map::new();
    view.insert("type".into(), Value::from(native.event_type.clone()));
    view.insert("bubbles".into(), Value::from(native.bubbles));
    view.insert("cancelable".into(), Value::from(native.cancelable));
    view.insert("target".into(), target);
    for (key, value) in &native.detail {
        view.insert(key.clone(), Value::from(value.clone()));
    }
    Value::Object(view)
}

/// Every key of `matcher` must match in `value`. Objects recurse, arrays
/// check membership, anything else compares equal.
fn match_value(matcher: &Value, value: &Value) -> bool {
    match (matcher, value) {
        (Value::Object(expected), Value::Object(actual)) => expected
            .iter()
            .all(|(key, m)| actual.get(key).is_some_and(|v| match_value(m, v))),
        (Value::Array(expected), Value::Array(actual)) => expected
            .iter()
            .all(|m| actual.iter().any(|v| match_value(m, v))),
        _ => matcher == value,
    }
}

struct EventProducer {
    doc: SharedDocument,
    node: NodeId,
    event_type: String,
    options: ListenerOptions,
    prevent_default: PreventDefault,
    listener: Option<ListenerId>,
}

impl Producer<DomEvent> for EventProducer {
    fn start(&mut self, sink: Sink<DomEvent>) {
        let doc = self.doc.clone();
        let prevent_default = self.prevent_default.clone();
        let handler = Rc::new(move |native: &mut Event| {
            let event = DomEvent::new(native.clone());
            prevent_default.apply(&doc, &event);
            sink.next(event.clone());
            event.apply_to(native);
        });

        let id = self
            .doc
            .borrow_mut()
            .listeners
            .add(self.node, &self.event_type, self.options, handler);
        tracing::debug!(node = ?self.node, event_type = %self.event_type, passive = self.options.passive, "native listener attached");
        self.listener = Some(id);
    }

    fn stop(&mut self) {
        if let Some(id) = self.listener.take() {
            self.doc.borrow_mut().listeners.remove(id);
            tracing::debug!(node = ?self.node, event_type = %self.event_type, "native listener detached");
        }
    }
}

/// Stream of `event_type` events reaching `node`
pub fn from_event(
    doc: &SharedDocument,
    node: NodeId,
    event_type: &str,
    options: ListenerOptions,
    prevent_default: PreventDefault,
) -> Stream<DomEvent> {
    Stream::create(EventProducer {
        doc: doc.clone(),
        node,
        event_type: event_type.to_string(),
        options,
        prevent_default,
        listener: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::{Document, events};
    use std::cell::RefCell;

    fn setup() -> (SharedDocument, NodeId) {
        let doc = Document::shared("about:blank");
        let button = {
            let mut d = doc.borrow_mut();
            let body = d.body();
            let button = d.append_element(body, "button");
            d.tree.element_mut(button).unwrap().set_attr("class", "btn primary");
            button
        };
        (doc, button)
    }

    #[test]
    fn test_listener_follows_subscription() {
        let (doc, button) = setup();
        let clicks = from_event(&doc, button, "click", ListenerOptions::default(), PreventDefault::Never);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let sub = clicks.subscribe(move |e: &DomEvent| log.borrow_mut().push(e.target()));
        assert_eq!(doc.borrow().listeners.count(button, "click"), 1);

        events::click(&doc, button);
        drop(sub);
        events::click(&doc, button);

        assert_eq!(*seen.borrow(), vec![button]);
        assert_eq!(doc.borrow().listeners.count(button, "click"), 0);
    }

    #[test]
    fn test_prevent_default_policies() {
        let (doc, button) = setup();
        let always = from_event(&doc, button, "click", ListenerOptions::default(), PreventDefault::Always);
        let sub = always.subscribe(|_| {});
        assert!(events::click(&doc, button).is_default_prevented());
        drop(sub);

        let never_on_button =
            PreventDefault::when(|e: &DomEvent| e.event_type() != "click");
        let sub = from_event(&doc, button, "click", ListenerOptions::default(), never_on_button)
            .subscribe(|_| {});
        assert!(!events::click(&doc, button).is_default_prevented());
        drop(sub);
    }

    #[test]
    fn test_matching_prevent_default() {
        let (doc, button) = setup();
        let matcher = PreventDefault::matching(json!({
            "type": "click",
            "target": { "tagName": "BUTTON", "classList": ["primary"] }
        }))
        .unwrap();
        let _sub = from_event(&doc, button, "click", ListenerOptions::default(), matcher)
            .subscribe(|_| {});
        assert!(events::click(&doc, button).is_default_prevented());

        let miss = PreventDefault::matching(json!({ "target": { "classList": ["secondary"] } }))
            .unwrap();
        let mut native = Event::user_agent("click");
        native.target = button;
        let event = DomEvent::new(native);
        miss.apply(&doc, &event);
        assert!(!event.is_default_prevented());
    }

    #[test]
    fn test_matching_requires_object() {
        assert!(matches!(
            PreventDefault::matching(json!(true)),
            Err(DriverError::InvalidPreventDefault(_))
        ));
        assert!(matches!(
            PreventDefault::matching(json!(["click"])),
            Err(DriverError::InvalidPreventDefault(_))
        ));
    }

    #[test]
    fn test_match_value_detail_fields() {
        let view = json!({ "type": "keydown", "key": "Enter", "target": null });
        assert!(match_value(&json!({ "key": "Enter" }), &view));
        assert!(!match_value(&json!({ "key": "Escape" }), &view));
        assert!(!match_value(&json!({ "missing": 1 }), &view));
    }
}
