//! Isolation and element query tests for fos-dom-driver

use std::cell::RefCell;
use std::rc::Rc;

use fos_dom::{Document, NodeId, SharedDocument};
use fos_dom_driver::{
    h, isolate_namespace, make_dom_driver, DomSource, DriverError, DriverOptions, Module,
    Namespace, Scope, Source, SourceKind, Stream, Subscription, VNode,
};

fn setup(options: DriverOptions) -> (SharedDocument, Stream<Option<VNode>>, DomSource) {
    let doc = Document::shared("about:blank");
    {
        let mut d = doc.borrow_mut();
        let body = d.body();
        let app = d.append_element(body, "main");
        d.tree.element_mut(app).unwrap().set_attr("class", "app");
    }
    let driver = make_dom_driver(doc.clone(), ".app", options).unwrap();
    let vnodes = Stream::memory_subject();
    let dom = driver.run(&vnodes).unwrap();
    (doc, vnodes, dom)
}

/// Keep the latest value of `stream`
fn latest<T: Clone + 'static>(stream: &Stream<T>) -> (Rc<RefCell<Option<T>>>, Subscription) {
    let slot = Rc::new(RefCell::new(None));
    let out = slot.clone();
    let sub = stream.subscribe(move |v: &T| *out.borrow_mut() = Some(v.clone()));
    (slot, sub)
}

fn by_id(doc: &SharedDocument, id: &str) -> NodeId {
    doc.borrow().get_element_by_id(id).unwrap()
}

#[test]
fn test_isolated_query_sees_only_its_subtree() {
    let (doc, vnodes, dom) = setup(DriverOptions::default());
    let foo = Namespace::new(vec![Scope::total("foo")]);
    vnodes.emit(Some(h(
        "div.top",
        vec![
            h("h2#wrong.bar", vec![VNode::text("Wrong")]),
            h("div", vec![h("h4#correct.bar", vec![VNode::text("Correct")])]).with_isolate(foo),
        ],
    )));

    let bars = dom.isolate_source("foo").select(".bar").unwrap();
    let (found, _sub) = latest(&bars.elements());
    assert_eq!(found.borrow().clone(), Some(vec![by_id(&doc, "correct")]));

    let (outer, _sub) = latest(&dom.select(".bar").unwrap().elements());
    assert_eq!(outer.borrow().clone(), Some(vec![by_id(&doc, "wrong")]));
}

#[test]
fn test_isolate_sink_round_trip() {
    let (doc, vnodes, dom) = setup(DriverOptions::default());

    let child_sink: Stream<Option<VNode>> = Stream::memory_subject();
    let tagged = dom.isolate_sink(&child_sink, "counter");
    let parent = vnodes.clone();
    let _render = tagged.subscribe(move |child: &Option<VNode>| {
        let mut children = vec![h("span#label.value", vec![])];
        children.extend(child.clone());
        parent.emit(Some(h("div.shell", children)));
    });

    child_sink.emit(Some(h(
        "section",
        vec![h("span#count.value", vec![VNode::text("0")])],
    )));

    let counter = dom.isolate_source("counter");
    let (root, _sub) = latest(&counter.elements());
    let section = root.borrow().clone().unwrap();
    assert_eq!(section.len(), 1);
    assert_eq!(doc.borrow().tree.tag(section[0]), Some("section"));

    let (values, _sub) = latest(&counter.select(".value").unwrap().elements());
    assert_eq!(values.borrow().clone(), Some(vec![by_id(&doc, "count")]));
}

#[test]
fn test_elements_refresh_after_each_render() {
    let (doc, vnodes, dom) = setup(DriverOptions::default());
    let items = dom.select("li").unwrap();
    let (found, _sub) = latest(&items.elements());
    assert_eq!(found.borrow().clone(), Some(vec![]));

    vnodes.emit(Some(h("ul", vec![h("li#one", vec![]), h("li#two", vec![])])));
    assert_eq!(
        found.borrow().clone(),
        Some(vec![by_id(&doc, "one"), by_id(&doc, "two")])
    );

    vnodes.emit(Some(h("ul", vec![h("li#one", vec![])])));
    assert_eq!(found.borrow().clone(), Some(vec![by_id(&doc, "one")]));
}

#[test]
fn test_element_skips_empty_results() {
    let (doc, vnodes, dom) = setup(DriverOptions::default());
    let seen: Rc<RefCell<Vec<NodeId>>> = Rc::default();
    let log = seen.clone();
    let _sub = dom
        .select("#target")
        .unwrap()
        .element()
        .subscribe(move |e: &NodeId| log.borrow_mut().push(*e));
    assert!(seen.borrow().is_empty());

    vnodes.emit(Some(h("div", vec![h("p#target", vec![])])));
    assert_eq!(*seen.borrow(), vec![by_id(&doc, "target")]);
}

#[test]
fn test_root_source_returns_container() {
    let (doc, _vnodes, dom) = setup(DriverOptions::default());
    let (found, _sub) = latest(&dom.select("p").unwrap().select(":root").unwrap().elements());
    let app = doc.borrow().tree.element_children(doc.borrow().body()).next().unwrap();
    assert_eq!(found.borrow().clone(), Some(vec![app]));
}

#[test]
fn test_nth_child_with_extreme_offset() {
    let (doc, vnodes, dom) = setup(DriverOptions::default());
    let items = dom.select("li:nth-child(n-2147483648)").unwrap();
    let (found, _sub) = latest(&items.elements());

    vnodes.emit(Some(h("ul", vec![h("li#one", vec![]), h("li#two", vec![])])));
    assert_eq!(
        found.borrow().clone(),
        Some(vec![by_id(&doc, "one"), by_id(&doc, "two")])
    );
}

#[test]
fn test_select_validation() {
    let (_doc, _vnodes, dom) = setup(DriverOptions::default());
    assert!(matches!(dom.select("   "), Err(DriverError::EmptySelector)));
    assert!(matches!(dom.select("div >"), Err(DriverError::InvalidSelector { .. })));

    let nested = dom.select(" .a ").unwrap().select("p").unwrap();
    assert_eq!(
        nested.namespace(),
        Some(&Namespace::new(vec![Scope::selector(".a"), Scope::selector("p")]))
    );
    assert_eq!(dom.select("document").unwrap().kind(), &SourceKind::Document);
    assert!(matches!(
        dom.select("document").unwrap().select("p"),
        Err(DriverError::RestrictedSelect("document"))
    ));
}

#[test]
fn test_isolate_source_namespaces() {
    let (_doc, _vnodes, dom) = setup(DriverOptions::default());
    let inner = dom.select(".list").unwrap().isolate_source(".item").isolate_source("row");
    assert_eq!(
        inner.namespace(),
        Some(&Namespace::new(vec![
            Scope::selector(".list"),
            Scope::sibling(".item"),
            Scope::total("row"),
        ]))
    );
    assert_eq!(
        dom.isolate_source(":root").namespace(),
        Some(&Namespace::root())
    );
    assert_eq!(
        isolate_namespace(&Namespace::root(), "#main"),
        Namespace::new(vec![Scope::sibling("#main")])
    );
}

#[test]
fn test_reused_element_keeps_new_namespace() {
    let (doc, vnodes, dom) = setup(DriverOptions::default());
    let a = Namespace::new(vec![Scope::total("a")]);
    let b = Namespace::new(vec![Scope::total("b")]);

    vnodes.emit(Some(h("div", vec![h("p#x", vec![]).with_key("k").with_isolate(a.clone())])));
    vnodes.emit(Some(h("div", vec![h("p#x", vec![]).with_key("k").with_isolate(b)])));

    let (in_a, _sa) = latest(&dom.isolate_source("a").elements());
    let (in_b, _sb) = latest(&dom.isolate_source("b").elements());
    assert_eq!(in_a.borrow().clone(), Some(vec![]));
    assert_eq!(in_b.borrow().clone(), Some(vec![by_id(&doc, "x")]));
}

struct Failing;

impl Module for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn create(&self, _vnode: &VNode) -> anyhow::Result<()> {
        anyhow::bail!("refusing to create")
    }
}

#[test]
fn test_module_errors_are_reported_and_rendering_continues() {
    let errors: Rc<RefCell<Vec<String>>> = Rc::default();
    let log = errors.clone();
    let options = DriverOptions::default()
        .with_name("app")
        .with_module(Rc::new(Failing))
        .with_error_reporter(move |err| log.borrow_mut().push(err.to_string()));
    let (doc, vnodes, dom) = setup(options);
    assert_eq!(dom.name(), "app");

    vnodes.emit(Some(h("div", vec![h("p#still-here", vec![])])));
    assert!(doc.borrow().get_element_by_id("still-here").is_some());
    assert!(!errors.borrow().is_empty());
    assert!(errors.borrow()[0].contains("failing"));
}

#[test]
fn test_vnode_stream_error_is_reported() {
    let errors: Rc<RefCell<Vec<String>>> = Rc::default();
    let log = errors.clone();
    let options =
        DriverOptions::default().with_error_reporter(move |err| log.borrow_mut().push(err.to_string()));
    let (_doc, vnodes, _dom) = setup(options);

    vnodes.emit_error(DriverError::EmptySelector);
    assert_eq!(errors.borrow().len(), 1);
}
