//! DOM Node
//!
//! Nodes keep parent/child links as `NodeId`s into the tree arena.
//! Element id and class list are cached next to the attribute list because
//! selector matching reads them on every event dispatch.

use crate::NodeId;

/// DOM Node - Core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (None if root or detached)
    pub parent: Option<NodeId>,
    /// Children in document order
    pub children: Vec<NodeId>,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    /// Create a new element node
    pub fn element(tag: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData::new(tag)),
        }
    }

    /// Create a new text node
    pub fn text(content: String) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Text(content),
        }
    }

    /// Create a document node
    pub fn document() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Document,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

/// Element-specific data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes other than `id` and `class`
    pub attrs: Vec<Attribute>,
    /// Cached id attribute
    pub id: Option<String>,
    /// Cached class list
    pub classes: Vec<String>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            id: None,
            classes: Vec::new(),
        }
    }

    /// Uppercase tag name, as `Element.tagName` reports it for HTML
    pub fn tag_name(&self) -> String {
        self.tag.to_ascii_uppercase()
    }

    /// Space-joined class list
    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !class.is_empty() && !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    /// Replace the class list from a `class` attribute value
    pub fn set_class_name(&mut self, value: &str) {
        self.classes.clear();
        for class in value.split_whitespace() {
            self.add_class(class);
        }
    }

    /// Get an attribute value (`id` and `class` included)
    pub fn get_attr(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if !self.classes.is_empty() => Some(self.class_name()),
            "class" => None,
            _ => self
                .attrs
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.clone()),
        }
    }

    /// Check attribute presence
    pub fn has_attr(&self, name: &str) -> bool {
        match name {
            "id" => self.id.is_some(),
            "class" => !self.classes.is_empty(),
            _ => self.attrs.iter().any(|a| a.name == name),
        }
    }

    /// Set an attribute
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match name {
            "id" => self.id = Some(value.to_string()),
            "class" => self.set_class_name(value),
            _ => {
                // Check if attribute already exists
                for attr in self.attrs.iter_mut() {
                    if attr.name == name {
                        attr.value = value.to_string();
                        return;
                    }
                }
                self.attrs.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    /// Remove an attribute
    pub fn remove_attr(&mut self, name: &str) {
        match name {
            "id" => self.id = None,
            "class" => self.classes.clear(),
            _ => self.attrs.retain(|a| a.name != name),
        }
    }
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_round_trip() {
        let mut elem = ElementData::new("DIV");
        elem.set_attr("class", "  foo bar foo ");

        assert_eq!(elem.tag, "div");
        assert_eq!(elem.tag_name(), "DIV");
        assert_eq!(elem.classes, vec!["foo", "bar"]);
        assert_eq!(elem.get_attr("class").as_deref(), Some("foo bar"));
    }

    #[test]
    fn test_id_and_plain_attributes() {
        let mut elem = ElementData::new("input");
        elem.set_attr("id", "name");
        elem.set_attr("type", "text");
        elem.set_attr("type", "email");

        assert_eq!(elem.get_attr("id").as_deref(), Some("name"));
        assert_eq!(elem.get_attr("type").as_deref(), Some("email"));
        assert_eq!(elem.attrs.len(), 1);

        elem.remove_attr("type");
        assert!(!elem.has_attr("type"));
    }
}
