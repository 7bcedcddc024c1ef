//! Mocked DOM source
//!
//! A [`Source`] backed by preconfigured streams instead of a document, for
//! testing components without rendering them.

use std::collections::HashMap;

use fos_dom::NodeId;

use crate::dom_event::DomEvent;
use crate::event_delegator::EventOptions;
use crate::source::Source;
use crate::stream::Stream;
use crate::vnode::VNode;
use crate::Result;

const SCOPE_PREFIX: &str = "___";

/// Streams returned by a [`MockedDomSource`]
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub elements: Option<Stream<Vec<NodeId>>>,
    /// Event streams by event type
    pub events: HashMap<String, Stream<DomEvent>>,
    /// Child configs by selector, exactly as passed to `select`
    pub selectors: HashMap<String, MockConfig>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elements(mut self, elements: Stream<Vec<NodeId>>) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn with_events(mut self, event_type: &str, events: Stream<DomEvent>) -> Self {
        self.events.insert(event_type.to_string(), events);
        self
    }

    pub fn with_selector(mut self, selector: &str, config: MockConfig) -> Self {
        self.selectors.insert(selector.to_string(), config);
        self
    }
}

/// DOM source answering from a [`MockConfig`]; unconfigured queries give
/// empty streams
#[derive(Debug, Clone, Default)]
pub struct MockedDomSource {
    config: MockConfig,
}

impl MockedDomSource {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }
}

fn scope_class(scope: &str) -> String {
    format!("{SCOPE_PREFIX}{scope}")
}

impl Source for MockedDomSource {
    fn select(&self, selector: &str) -> Result<Self> {
        let config = self.config.selectors.get(selector).cloned().unwrap_or_default();
        Ok(Self::new(config))
    }

    fn events(&self, event_type: &str, _options: EventOptions) -> Result<Stream<DomEvent>> {
        Ok(self
            .config
            .events
            .get(event_type)
            .cloned()
            .unwrap_or_else(Stream::empty))
    }

    fn elements(&self) -> Stream<Vec<NodeId>> {
        self.config.elements.clone().unwrap_or_else(Stream::empty)
    }

    fn isolate_source(&self, scope: &str) -> Self {
        let config = self
            .config
            .selectors
            .get(&format!(".{}", scope_class(scope)))
            .cloned()
            .unwrap_or_default();
        Self::new(config)
    }

    fn isolate_sink(&self, sink: &Stream<Option<VNode>>, scope: &str) -> Stream<Option<VNode>> {
        let class = scope_class(scope);
        sink.map(move |vnode: &Option<VNode>| {
            let mut vnode = vnode.clone()?;
            if let Some(sel) = vnode.sel.as_mut() {
                if !sel.contains(&class) {
                    sel.push('.');
                    sel.push_str(&class);
                }
            }
            Some(vnode)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collect<T: Clone + 'static>(stream: &Stream<T>) -> (Rc<RefCell<Vec<T>>>, crate::Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let sub = stream.subscribe(move |v: &T| log.borrow_mut().push(v.clone()));
        (seen, sub)
    }

    #[test]
    fn test_select_walks_config_tree() {
        let node = NodeId::ROOT;
        let config = MockConfig::new().with_selector(
            ".list",
            MockConfig::new().with_selector(
                "li",
                MockConfig::new().with_elements(Stream::of(vec![vec![node]])),
            ),
        );
        let source = MockedDomSource::new(config);

        let items = source.select(".list").unwrap().select("li").unwrap();
        let (seen, _sub) = collect(&items.element());
        assert_eq!(*seen.borrow(), vec![node]);

        let (seen, _sub) = collect(&source.select(".missing").unwrap().elements());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_events_by_type() {
        let clicks: Stream<DomEvent> = Stream::subject();
        let source = MockedDomSource::new(MockConfig::new().with_events("click", clicks.clone()));

        let stream = source.events("click", EventOptions::default()).unwrap();
        assert_eq!(stream.listener_count(), 0);
        let (seen, _sub) = collect(&stream);
        clicks.emit(DomEvent::new(fos_dom::Event::user_agent("click")));
        assert_eq!(seen.borrow().len(), 1);

        let keys = source.events("keydown", EventOptions::default()).unwrap();
        let (seen, _sub) = collect(&keys);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_isolation_uses_scope_class() {
        let inner = MockConfig::new().with_elements(Stream::of(vec![vec![NodeId::ROOT]]));
        let source = MockedDomSource::new(MockConfig::new().with_selector(".___child", inner));

        let (seen, _sub) = collect(&source.isolate_source("child").elements());
        assert_eq!(*seen.borrow(), vec![vec![NodeId::ROOT]]);

        let input: Stream<Option<VNode>> = Stream::subject();
        let tagged = source.isolate_sink(&source.isolate_sink(&input, "child"), "child");
        let (seen, _sub) = collect(&tagged);
        input.emit(Some(VNode::element("div.box")));
        input.emit(Some(VNode::text("plain")));
        input.emit(None);

        let seen = seen.borrow();
        assert_eq!(seen[0].as_ref().unwrap().sel.as_deref(), Some("div.box.___child"));
        assert!(seen[1].as_ref().unwrap().sel.is_none());
        assert!(seen[2].is_none());
    }
}
