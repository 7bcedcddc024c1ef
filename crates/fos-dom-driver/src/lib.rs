//! fOS DOM Driver
//!
//! Renders a stream of virtual DOM trees into an fOS document and exposes a
//! scoped, queryable source of DOM events back to the application.
//!
//! Events are delegated: one native listener per event type sits on the
//! render root, and bubbling/capturing is simulated per selector while
//! honoring nested isolation scopes.
//!
//! # Example
//! ```rust,ignore
//! use fos_dom_driver::{make_dom_driver, h, DriverOptions, EventOptions, Source, Stream};
//!
//! let driver = make_dom_driver(doc.clone(), "#app", DriverOptions::default())?;
//! let vnodes = Stream::memory_subject();
//! let dom = driver.run(&vnodes)?;
//! vnodes.emit(Some(h("button.inc", vec![])));
//! let clicks = dom.select(".inc")?.events("click", EventOptions::default())?;
//! ```

mod config;
mod error;
pub mod stream;
pub mod namespace;
pub mod symbol_tree;
pub mod priority_queue;
pub mod vnode;
pub mod patch;
mod isolate_module;
mod scope_checker;
mod element_finder;
mod dom_event;
mod from_event;
mod event_delegator;
mod isolate;
mod source;
mod mock;
mod driver;

pub use config::{DriverOptions, ErrorReporter};
pub use error::{DriverError, Result};
pub use stream::{Listener, Producer, Sink, Stream, StreamError, Subscription};
pub use namespace::{Namespace, Scope, ScopeKind};
pub use symbol_tree::SymbolTree;
pub use priority_queue::PriorityQueue;
pub use vnode::{h, VNode, VNodeData};
pub use patch::{same_vnode, to_vnode, Module, Patcher};
pub use isolate_module::{IsolateModule, RemovalObserver};
pub use scope_checker::ScopeChecker;
pub use element_finder::ElementFinder;
pub use dom_event::DomEvent;
pub use from_event::{from_event, PreventDefault};
pub use event_delegator::{bubbles_by_default, EventDelegator, EventOptions, NON_BUBBLING_EVENTS};
pub use isolate::{isolate_namespace, isolate_sink, ROOT_SCOPE};
pub use source::{DomSource, Source, SourceKind};
pub use mock::{MockConfig, MockedDomSource};
pub use driver::{make_dom_driver, Container, DomDriver};

/// Driver version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
