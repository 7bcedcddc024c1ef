//! Example: two isolated counters sharing one delegated click listener

use std::cell::Cell;
use std::rc::Rc;

use fos_dom::{events, Document};
use fos_dom_driver::{
    h, make_dom_driver, DriverOptions, EventOptions, Namespace, Scope, Source, Stream, VNode,
};
use tracing_subscriber::EnvFilter;

fn counter(id: &str, count: u32) -> VNode {
    h(
        "div.counter",
        vec![
            h(&format!("button#{id}.inc"), vec![VNode::text("+")]),
            h("span.value", vec![VNode::text(&count.to_string())]),
        ],
    )
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let doc = Document::shared("about:blank");
    {
        let mut d = doc.borrow_mut();
        let body = d.body();
        let app = d.append_element(body, "div");
        if let Some(data) = d.tree.element_mut(app) {
            data.set_attr("id", "app");
        }
    }

    let driver = make_dom_driver(doc.clone(), "#app", DriverOptions::default().with_name("demo"))?;
    let vnodes = Stream::memory_subject();
    let dom = driver.run(&vnodes)?;

    let left = Rc::new(Cell::new(0u32));
    let right = Rc::new(Cell::new(0u32));
    let render = {
        let (left, right, vnodes) = (left.clone(), right.clone(), vnodes.clone());
        move || {
            vnodes.emit(Some(h(
                "main",
                vec![
                    counter("left", left.get()).with_isolate(Namespace::new(vec![Scope::total("left")])),
                    counter("right", right.get()).with_isolate(Namespace::new(vec![Scope::total("right")])),
                ],
            )))
        }
    };
    render();

    let subscriptions: Vec<_> = [("left", left), ("right", right)]
        .into_iter()
        .map(|(scope, count)| -> anyhow::Result<_> {
            let clicks = dom
                .isolate_source(scope)
                .select(".inc")?
                .events("click", EventOptions::default())?;
            let render = render.clone();
            Ok(clicks.subscribe(move |_| {
                count.set(count.get() + 1);
                render();
            }))
        })
        .collect::<anyhow::Result<_>>()?;

    for id in ["left", "left", "right"] {
        let button = doc.borrow().get_element_by_id(id);
        if let Some(button) = button {
            events::click(&doc, button);
        }
    }

    {
        let d = doc.borrow();
        let app = d.get_element_by_id("app");
        println!("fOS DOM driver v{}", fos_dom_driver::VERSION);
        if let Some(app) = app {
            println!("Rendered text: {}", d.tree.text_content(app));
        }
        println!(
            "Native click listeners on #app: {}",
            app.map_or(0, |a| d.listeners.count(a, "click"))
        );
    }

    drop(subscriptions);
    dom.dispose();
    Ok(())
}
