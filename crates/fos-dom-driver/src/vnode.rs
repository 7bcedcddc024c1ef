//! Virtual DOM nodes
//!
//! Element vnodes are described by a selector (`tag#id.class`), optional
//! key, data bag and children. Text vnodes carry only `text`.

use std::collections::BTreeMap;

use fos_dom::NodeId;

use crate::namespace::Namespace;

/// Data attached to an element vnode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VNodeData {
    /// Namespace of the isolated scope rooted at this element
    pub isolate: Option<Namespace>,
    pub attrs: BTreeMap<String, String>,
    /// Element properties, reflected as attributes
    pub props: BTreeMap<String, String>,
    /// Class toggles applied on top of the selector classes
    pub class: BTreeMap<String, bool>,
}

/// Virtual DOM node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VNode {
    /// `None` for text nodes
    pub sel: Option<String>,
    pub key: Option<String>,
    pub data: VNodeData,
    pub children: Vec<VNode>,
    /// Content of a text node
    pub text: Option<String>,
    /// DOM node created for this vnode by the last patch
    pub elm: Option<NodeId>,
}

/// Build an element vnode
pub fn h(sel: &str, children: Vec<VNode>) -> VNode {
    VNode::element(sel).with_children(children)
}

impl VNode {
    pub fn element(sel: &str) -> Self {
        Self {
            sel: Some(sel.to_string()),
            ..Self::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn is_text(&self) -> bool {
        self.sel.is_none()
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<VNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Append a text child
    pub fn with_text(self, text: &str) -> Self {
        self.with_child(VNode::text(text))
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.data.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_prop(mut self, name: &str, value: &str) -> Self {
        self.data.props.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_class(mut self, class: &str, enabled: bool) -> Self {
        self.data.class.insert(class.to_string(), enabled);
        self
    }

    pub fn with_isolate(mut self, namespace: Namespace) -> Self {
        self.data.isolate = Some(namespace);
        self
    }

    /// Parsed selector of an element vnode
    pub fn selector(&self) -> Option<ParsedSelector> {
        self.sel.as_deref().map(ParsedSelector::parse)
    }

    /// Id from the `id` prop, falling back to the selector
    pub fn id(&self) -> Option<String> {
        self.data
            .props
            .get("id")
            .cloned()
            .or_else(|| self.selector().and_then(|s| s.id))
    }

    /// Selector classes plus enabled class toggles, space-joined
    pub fn class_name(&self) -> String {
        let mut classes = self.selector().map(|s| s.classes).unwrap_or_default();
        for (class, enabled) in &self.data.class {
            if *enabled && !classes.contains(class) {
                classes.push(class.clone());
            }
        }
        classes.join(" ")
    }

    /// Attributes the element for this vnode should carry
    pub(crate) fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.data.attrs.clone();
        for (name, value) in &self.data.props {
            let name = if name == "className" { "class" } else { name.as_str() };
            attrs.insert(name.to_string(), value.clone());
        }
        if let Some(id) = self.id() {
            attrs.insert("id".to_string(), id);
        }
        let class_name = self.class_name();
        if !class_name.is_empty() {
            attrs.insert("class".to_string(), class_name);
        }
        attrs
    }
}

/// `tag#id.class1.class2` split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    /// Lowercase tag, `div` when omitted
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl ParsedSelector {
    pub fn parse(sel: &str) -> Self {
        let tag_end = sel.find(['#', '.']).unwrap_or(sel.len());
        let tag = match &sel[..tag_end] {
            "" => "div".to_string(),
            tag => tag.to_ascii_lowercase(),
        };

        let mut id = None;
        let mut classes = Vec::new();
        let mut rest = &sel[tag_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if !name.is_empty() {
                match marker {
                    '#' => id = Some(name.to_string()),
                    _ => classes.push(name.to_string()),
                }
            }
            rest = &body[end..];
        }

        Self { tag, id, classes }
    }

    /// Back to `tag#id.class` form
    pub fn to_sel(&self) -> String {
        let mut sel = self.tag.clone();
        if let Some(id) = &self.id {
            sel.push('#');
            sel.push_str(id);
        }
        for class in &self.classes {
            sel.push('.');
            sel.push_str(class);
        }
        sel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        let parsed = ParsedSelector::parse("DIV#app.main.wide");
        assert_eq!(parsed.tag, "div");
        assert_eq!(parsed.id.as_deref(), Some("app"));
        assert_eq!(parsed.classes, vec!["main", "wide"]);
        assert_eq!(parsed.to_sel(), "div#app.main.wide");

        assert_eq!(ParsedSelector::parse(".bar").tag, "div");
        assert_eq!(ParsedSelector::parse("h4.bar").classes, vec!["bar"]);
    }

    #[test]
    fn test_attributes_merge_selector_and_data() {
        let vnode = VNode::element("button.btn")
            .with_attr("type", "submit")
            .with_prop("id", "send")
            .with_class("active", true)
            .with_class("hidden", false);

        let attrs = vnode.attributes();
        assert_eq!(attrs.get("class").map(String::as_str), Some("btn active"));
        assert_eq!(attrs.get("id").map(String::as_str), Some("send"));
        assert_eq!(attrs.get("type").map(String::as_str), Some("submit"));
    }

    #[test]
    fn test_builders() {
        let tree = h("div.top", vec![VNode::element("h2.bar").with_text("Wrong")]);
        assert_eq!(tree.children.len(), 1);
        assert!(tree.children[0].children[0].is_text());
        assert_eq!(tree.children[0].children[0].text.as_deref(), Some("Wrong"));
    }
}
