//! fOS DOM - Document Object Model
//!
//! Arena-backed DOM tree with native event dispatch.

mod node;
mod tree;
mod document;
pub mod events;

use std::cell::RefCell;
use std::rc::Rc;

pub use node::{Attribute, ElementData, Node, NodeData};
pub use tree::DomTree;
pub use document::Document;
pub use events::{
    dispatch_event, Event, EventHandler, EventListeners, EventPhase, ListenerId, ListenerOptions,
};

/// Document shared between the renderer and event listeners
pub type SharedDocument = Rc<RefCell<Document>>;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID (the document node)
    pub const ROOT: NodeId = NodeId(0);

    /// Arena index of this node
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// DOM errors
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("node {child:?} cannot be inserted into {parent:?}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("node {reference:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, reference: NodeId },
}
