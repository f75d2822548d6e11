//! Arena-backed element tree standing in for the host application's DOM.

use super::selector::SelectorList;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Handle to an element inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Declarative description of an element subtree to insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Element tree with an `html` root and a `body` child.
///
/// Removed subtrees stay in the arena, detached, so handles held by callers
/// remain valid.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
        };
        doc.root = doc.alloc("html", Vec::new(), String::new());
        doc.body = doc.append(doc.root, ElementSpec::new("body"));
        doc
    }

    fn alloc(&mut self, tag: &str, attributes: Vec<(String, String)>, text: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: tag.to_string(),
            attributes,
            text,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// True if `id` is in range for this document.
    ///
    /// Reads on unknown ids return empty values and writes are ignored.
    pub fn has_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn tag(&self, id: NodeId) -> &str {
        self.node(id).map_or("", |n| n.tag.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)?
            .attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn class_list(&self, id: NodeId) -> Vec<&str> {
        self.attribute(id, "class")
            .map(|c| c.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn text(&self, id: NodeId) -> &str {
        self.node(id).map_or("", |n| n.text.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// True if `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True if the node is attached to the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// Descendants of `root` in document (pre-)order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Creates a detached subtree from `spec`.
    pub fn create(&mut self, spec: ElementSpec) -> NodeId {
        let ElementSpec {
            tag,
            attributes,
            text,
            children,
        } = spec;
        let id = self.alloc(&tag, attributes, text);
        for child in children {
            let child_id = self.create(child);
            self.link(id, child_id);
        }
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if !self.has_node(parent) {
            return;
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    /// Builds `spec` and appends it as the last child of `parent`. With an
    /// unknown `parent` the subtree stays detached.
    pub fn append(&mut self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let id = self.create(spec);
        self.link(parent, id);
        id
    }

    /// Detaches `id` from its parent. Returns the former parent.
    pub fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.node_mut(id)?.parent.take()?;
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        Some(parent)
    }

    /// Sets an attribute and returns its previous value.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let attributes = &mut self.node_mut(id)?.attributes;
        match attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, value.to_string())),
            None => {
                attributes.push((name, value.to_string()));
                None
            }
        }
    }

    /// Removes an attribute and returns its previous value.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attributes = &mut self.node_mut(id)?.attributes;
        let index = attributes
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(attributes.remove(index).1)
    }

    /// Replaces the text content and returns the previous text.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> String {
        self.node_mut(id)
            .map(|n| std::mem::replace(&mut n.text, text.to_string()))
            .unwrap_or_default()
    }

    /// First descendant of `root` matching the parsed list.
    pub fn select_first(&self, root: NodeId, selectors: &SelectorList) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| selectors.matches(self, *id))
    }

    /// All descendants of `root` matching the parsed list, in document order.
    pub fn select_all(&self, root: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| selectors.matches(self, *id))
            .collect()
    }

    /// `querySelector`: parses `selector` and returns the first match.
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_first(root, &list))
    }

    /// `querySelectorAll`.
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_all(root, &list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_body() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.root()), "html");
        assert_eq!(doc.tag(doc.body()), "body");
        assert_eq!(doc.parent(doc.body()), Some(doc.root()));
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_append_nested_spec_and_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let list = doc.append(
            body,
            ElementSpec::new("ul")
                .child(ElementSpec::new("li").text("a").child(ElementSpec::new("span")))
                .child(ElementSpec::new("li").text("b")),
        );
        let trailing = doc.append(body, ElementSpec::new("footer"));

        let order: Vec<&str> = doc
            .descendants(body)
            .into_iter()
            .map(|id| doc.tag(id))
            .collect();
        assert_eq!(order, vec!["ul", "li", "span", "li", "footer"]);
        assert_eq!(doc.children(list).len(), 2);
        assert_eq!(doc.children(body).last(), Some(&trailing));
    }

    #[test]
    fn test_query_selector_excludes_root() {
        let mut doc = Document::new();
        let body = doc.body();
        let outer = doc.append(body, ElementSpec::new("div").class("box"));
        let inner = doc.append(outer, ElementSpec::new("div").class("box"));

        assert_eq!(doc.query_selector(body, ".box").unwrap(), Some(outer));
        assert_eq!(doc.query_selector(outer, ".box").unwrap(), Some(inner));
        assert_eq!(doc.query_selector(inner, ".box").unwrap(), None);
        assert_eq!(doc.query_selector_all(body, "div").unwrap(), vec![outer, inner]);
        assert!(doc.query_selector(body, "div[").is_err());
    }

    #[test]
    fn test_detach_keeps_handle_valid() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = doc.append(body, ElementSpec::new("aside").id("x"));

        assert_eq!(doc.detach(node), Some(body));
        assert!(!doc.is_connected(node));
        assert_eq!(doc.attribute(node, "id"), Some("x"));
        assert_eq!(doc.detach(node), None);
        assert_eq!(doc.query_selector(body, "#x").unwrap(), None);
    }

    #[test]
    fn test_attribute_updates_return_old_values() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = doc.append(body, ElementSpec::new("input").attr("Type", "password"));

        assert_eq!(doc.attribute(node, "type"), Some("password"));
        assert_eq!(
            doc.set_attribute(node, "type", "text").as_deref(),
            Some("password")
        );
        assert_eq!(doc.set_attribute(node, "name", "secret"), None);
        assert_eq!(doc.remove_attribute(node, "NAME").as_deref(), Some("secret"));
        assert_eq!(doc.remove_attribute(node, "name"), None);
        assert_eq!(doc.set_text(node, "hello"), "");
        assert_eq!(doc.text(node), "hello");
    }

    #[test]
    fn test_class_list() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = doc.append(body, ElementSpec::new("div").class("  a  b\tc "));
        assert_eq!(doc.class_list(node), vec!["a", "b", "c"]);
        assert!(doc.class_list(body).is_empty());
    }

    #[test]
    fn test_unknown_node_reads_empty_and_writes_are_ignored() {
        let mut other = Document::new();
        let mut foreign = other.body();
        for _ in 0..10 {
            foreign = other.append(foreign, ElementSpec::new("div"));
        }

        let mut doc = Document::new();
        assert!(!doc.has_node(foreign));
        assert_eq!(doc.tag(foreign), "");
        assert_eq!(doc.text(foreign), "");
        assert_eq!(doc.attribute(foreign, "id"), None);
        assert_eq!(doc.parent(foreign), None);
        assert!(doc.children(foreign).is_empty());
        assert_eq!(doc.query_selector(foreign, "div").unwrap(), None);

        assert_eq!(doc.set_attribute(foreign, "id", "x"), None);
        assert_eq!(doc.set_text(foreign, "x"), "");
        assert_eq!(doc.detach(foreign), None);

        let orphan = doc.append(foreign, ElementSpec::new("span"));
        assert_eq!(doc.parent(orphan), None);
        assert!(!doc.is_connected(orphan));
    }
}
