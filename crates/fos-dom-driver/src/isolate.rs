//! Isolation helpers
//!
//! `isolate_source` narrows a namespace by one boundary segment;
//! `isolate_sink` tags rendered trees with that same namespace so the
//! isolation registry can find their root elements.

use crate::namespace::{Namespace, Scope};
use crate::stream::Stream;
use crate::vnode::VNode;

/// Scope that leaves sources and sinks untouched
pub const ROOT_SCOPE: &str = ":root";

/// Namespace of the source isolated under `scope`
pub fn isolate_namespace(namespace: &Namespace, scope: &str) -> Namespace {
    if scope == ROOT_SCOPE {
        return namespace.clone();
    }
    namespace.with(Scope::for_isolation(scope))
}

/// Tag every tree of `sink` with the namespace isolated under `scope`.
///
/// Trees that already carry an `isolate` field keep it; trees without a key
/// get one derived from their namespace.
pub fn isolate_sink(
    namespace: &Namespace,
    sink: &Stream<Option<VNode>>,
    scope: &str,
) -> Stream<Option<VNode>> {
    if scope == ROOT_SCOPE {
        return sink.clone();
    }
    let isolate = isolate_namespace(namespace, scope);
    sink.map(move |vnode: &Option<VNode>| vnode.clone().map(|vnode| tag_vnode(vnode, &isolate)))
}

fn tag_vnode(mut vnode: VNode, isolate: &Namespace) -> VNode {
    let namespace = vnode.data.isolate.get_or_insert_with(|| isolate.clone());
    if vnode.key.is_none() {
        vnode.key = Some(namespace.key());
    }
    vnode
}
