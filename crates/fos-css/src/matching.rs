//! Selector Matching
//!
//! Right-to-left matching of selector lists against a `DomTree`, with
//! backtracking over descendant and sibling combinators.

use fos_dom::{DomTree, ElementData, NodeData, NodeId};

use crate::selectors::{
    Combinator, ComplexSelector, Compound, PseudoClass, SelectorComponent, SelectorList,
};

/// Check if an element matches any selector of the list
pub fn matches(tree: &DomTree, element: NodeId, selectors: &SelectorList) -> bool {
    tree.is_element(element)
        && selectors
            .selectors
            .iter()
            .any(|complex| matches_complex(tree, element, complex))
}

/// Check if an element matches a single complex selector
pub fn matches_complex(tree: &DomTree, element: NodeId, selector: &ComplexSelector) -> bool {
    match selector.compounds.len() {
        0 => false,
        n => matches_from(tree, element, selector, n - 1),
    }
}

/// All descendant elements of `scope` matching `selectors`, in document
/// order. `scope` itself is never part of the result.
///
/// Like `Element.querySelectorAll`, combinators may reach ancestors outside
/// of `scope`.
pub fn query_selector_all(tree: &DomTree, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
    let found: Vec<NodeId> = tree
        .descendants(scope)
        .into_iter()
        .filter(|&node| matches(tree, node, selectors))
        .collect();
    tracing::trace!(?scope, selector = %selectors, found = found.len(), "query_selector_all");
    found
}

/// First descendant element of `scope` matching `selectors`
pub fn query_selector(tree: &DomTree, scope: NodeId, selectors: &SelectorList) -> Option<NodeId> {
    tree.descendants(scope)
        .into_iter()
        .find(|&node| matches(tree, node, selectors))
}

fn matches_from(tree: &DomTree, element: NodeId, selector: &ComplexSelector, index: usize) -> bool {
    if !matches_compound(tree, element, &selector.compounds[index]) {
        return false;
    }
    if index == 0 {
        return true;
    }

    let next = index - 1;
    match selector.combinators[next] {
        Combinator::Descendant => tree
            .ancestors(element)
            .filter(|&a| tree.is_element(a))
            .any(|a| matches_from(tree, a, selector, next)),
        Combinator::Child => tree
            .parent_element(element)
            .is_some_and(|p| matches_from(tree, p, selector, next)),
        Combinator::NextSibling => previous_element_siblings(tree, element)
            .first()
            .is_some_and(|&s| matches_from(tree, s, selector, next)),
        Combinator::SubsequentSibling => previous_element_siblings(tree, element)
            .into_iter()
            .any(|s| matches_from(tree, s, selector, next)),
    }
}

/// Preceding element siblings, nearest first
fn previous_element_siblings(tree: &DomTree, element: NodeId) -> Vec<NodeId> {
    let Some(parent) = tree.parent(element) else {
        return Vec::new();
    };
    tree.element_children(parent)
        .take_while(|&s| s != element)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

fn matches_compound(tree: &DomTree, element: NodeId, compound: &Compound) -> bool {
    let Some(data) = tree.element(element) else {
        return false;
    };
    compound
        .components
        .iter()
        .all(|component| matches_component(tree, element, data, component))
}

fn matches_component(
    tree: &DomTree,
    element: NodeId,
    data: &ElementData,
    component: &SelectorComponent,
) -> bool {
    match component {
        SelectorComponent::Universal => true,
        SelectorComponent::Type(tag) => data.tag.eq_ignore_ascii_case(tag),
        SelectorComponent::Id(id) => data.id.as_deref() == Some(id.as_str()),
        SelectorComponent::Class(class) => data.has_class(class),
        SelectorComponent::Attribute(attr) => attr.matches(data.get_attr(&attr.name).as_deref()),
        SelectorComponent::PseudoClass(pseudo) => match_pseudo_class(tree, element, data, pseudo),
    }
}

/// Position of an element among its siblings
struct SiblingPosition {
    /// 1-based index among element siblings
    index: usize,
    count: usize,
    /// 1-based index among siblings of the same type
    type_index: usize,
    type_count: usize,
}

fn sibling_position(tree: &DomTree, element: NodeId, data: &ElementData) -> SiblingPosition {
    let Some(parent) = tree.parent(element) else {
        return SiblingPosition {
            index: 1,
            count: 1,
            type_index: 1,
            type_count: 1,
        };
    };

    let mut position = SiblingPosition {
        index: 0,
        count: 0,
        type_index: 0,
        type_count: 0,
    };
    for sibling in tree.element_children(parent) {
        let same_type = tree.tag(sibling) == Some(data.tag.as_str());
        position.count += 1;
        if same_type {
            position.type_count += 1;
        }
        if sibling == element {
            position.index = position.count;
            position.type_index = position.type_count;
        }
    }
    position
}

fn match_pseudo_class(
    tree: &DomTree,
    element: NodeId,
    data: &ElementData,
    pseudo: &PseudoClass,
) -> bool {
    let from_end = |index: usize, count: usize| (count - index + 1) as i32;

    match pseudo {
        PseudoClass::Root => tree.parent(element) == Some(tree.root()),
        PseudoClass::Empty => tree.children(element).iter().all(|&c| {
            match tree.get(c).map(|n| &n.data) {
                Some(NodeData::Comment(_)) => true,
                Some(NodeData::Text(t)) => t.is_empty(),
                _ => false,
            }
        }),
        PseudoClass::FirstChild => sibling_position(tree, element, data).index == 1,
        PseudoClass::LastChild => {
            let p = sibling_position(tree, element, data);
            p.index == p.count
        }
        PseudoClass::OnlyChild => sibling_position(tree, element, data).count == 1,
        PseudoClass::FirstOfType => sibling_position(tree, element, data).type_index == 1,
        PseudoClass::LastOfType => {
            let p = sibling_position(tree, element, data);
            p.type_index == p.type_count
        }
        PseudoClass::OnlyOfType => sibling_position(tree, element, data).type_count == 1,
        PseudoClass::NthChild(expr) => {
            expr.matches(sibling_position(tree, element, data).index as i32)
        }
        PseudoClass::NthLastChild(expr) => {
            let p = sibling_position(tree, element, data);
            expr.matches(from_end(p.index, p.count))
        }
        PseudoClass::NthOfType(expr) => {
            expr.matches(sibling_position(tree, element, data).type_index as i32)
        }
        PseudoClass::NthLastOfType(expr) => {
            let p = sibling_position(tree, element, data);
            expr.matches(from_end(p.type_index, p.type_count))
        }
        PseudoClass::Not(list) => !matches(tree, element, list),
    }
}
