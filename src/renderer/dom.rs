//! DOM (Document Object Model) implementation
//!
//! Nodes live in an arena owned by the [`Document`] and are addressed by
//! [`NodeId`]. Nodes are appended in document order, so ordering ids
//! orders nodes the way they appear in the markup.

use super::selector::Selector;
use crate::utils::Result;
use markup5ever::{ns, LocalName, QualName};

/// Handle to a node inside its document's arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Node types in the DOM
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    /// Document root
    Document,
    /// `<!DOCTYPE name>`
    Doctype(String),
    /// Element node (e.g., <div>)
    Element(ElementData),
    /// Text node
    Text(String),
    /// Comment node
    Comment(String),
    /// `<?target data?>`
    ProcessingInstruction { target: String, data: String },
}

/// Data for element nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    name: QualName,
    attributes: Vec<(QualName, String)>,
}

impl ElementData {
    /// Create an HTML element
    pub fn new(tag_name: &str) -> Self {
        Self::with_name(QualName::new(None, ns!(html), LocalName::from(tag_name)))
    }

    /// Create an element under a parser-resolved name
    pub fn with_name(name: QualName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &QualName {
        &self.name
    }

    /// Tag name as written, prefix included (e.g. "div", "dc:creator")
    pub fn tag_name(&self) -> String {
        qualified(&self.name)
    }

    /// Get an attribute value
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| name_matches(key, name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Set an attribute value, keeping its position if already present
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(key, _)| name_matches(key, name))
        {
            Some(slot) => slot.1 = value,
            None => self
                .attributes
                .push((QualName::new(None, ns!(), LocalName::from(name)), value)),
        }
    }

    /// Add an attribute under its parser-resolved name
    pub fn push_attribute(&mut self, name: QualName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Attributes in source order
    pub fn attributes(&self) -> impl Iterator<Item = (&QualName, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name, value.as_str()))
    }

    /// Get the ID attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    /// Get class names
    pub fn classes(&self) -> Vec<&str> {
        self.get_attribute("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn is(&self, tag_name: &str) -> bool {
        name_matches(&self.name, tag_name)
    }

    /// HTML-namespace element, matched case-insensitively by CSS
    pub fn is_html(&self) -> bool {
        self.name.ns == ns!(html)
    }
}

fn qualified(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

/// Compare a name against `prefix:local` or `local` text, ignoring ASCII case
fn name_matches(name: &QualName, text: &str) -> bool {
    match &name.prefix {
        Some(prefix) => text.split_once(':').is_some_and(|(p, local)| {
            p.eq_ignore_ascii_case(prefix) && local.eq_ignore_ascii_case(&name.local)
        }),
        None => (*name.local).eq_ignore_ascii_case(text),
    }
}

/// A node in the DOM tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Node type and data
    pub node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// Check if this is an element node
    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element(_))
    }

    /// Get element data if this is an element
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The DOM document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                node_type: NodeType::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, including the document node
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Append a new last child to `parent`
    pub fn append(&mut self, parent: NodeId, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            node_type,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id.0).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|node| &mut node.node_type) {
            Some(NodeType::Element(data)) => Some(data),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.get_attribute(name)
    }

    /// Set an attribute on an element; non-elements are left alone
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.set_attribute(name, value);
        }
    }

    /// All nodes below `id` in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Elements below `id` with the given tag name, in document order
    pub fn elements_by_tag(&self, id: NodeId, tag_name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.element(node).is_some_and(|e| e.is(tag_name)))
            .collect()
    }

    /// Concatenated text of all text nodes below `id`
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        if let NodeType::Text(content) = &self.node(id).node_type {
            text.push_str(content);
        }
        for node in self.descendants(id) {
            if let NodeType::Text(content) = &self.node(node).node_type {
                text.push_str(content);
            }
        }
        text
    }

    /// Run an XPath or CSS query from the document node
    pub fn select(&self, query: &str) -> Result<Vec<NodeId>> {
        self.select_from(self.root(), query)
    }

    /// Run an XPath or CSS query relative to `context`
    pub fn select_from(&self, context: NodeId, query: &str) -> Result<Vec<NodeId>> {
        Ok(Selector::parse(query)?.select(self, context))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever::{Namespace, Prefix};

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.append(root, NodeType::Element(ElementData::new("html")));
        let p = doc.append(html, NodeType::Element(ElementData::new("p")));
        doc.append(p, NodeType::Text("Hello ".to_string()));
        let b = doc.append(p, NodeType::Element(ElementData::new("b")));
        doc.append(b, NodeType::Text("world".to_string()));
        (doc, html, p)
    }

    #[test]
    fn test_descendants_in_document_order() {
        let (doc, html, p) = sample();
        let all = doc.descendants(doc.root());
        assert_eq!(all[0], html);
        assert_eq!(all[1], p);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_text_content() {
        let (doc, _, p) = sample();
        assert_eq!(doc.text_content(p), "Hello world");
    }

    #[test]
    fn test_set_attribute_keeps_position() {
        let mut element = ElementData::new("a");
        element.set_attribute("href", "/x");
        element.set_attribute("class", "link");
        element.set_attribute("HREF", "/y");
        let (name, value) = element.attributes().next().unwrap();
        assert_eq!(&*name.local, "href");
        assert_eq!(value, "/y");
        assert_eq!(element.attributes().count(), 2);
        assert_eq!(element.classes(), vec!["link"]);
    }

    #[test]
    fn test_prefixed_names() {
        let name = QualName::new(
            Some(Prefix::from("dc")),
            Namespace::from("http://purl.org/dc/"),
            LocalName::from("creator"),
        );
        let element = ElementData::with_name(name);
        assert_eq!(element.tag_name(), "dc:creator");
        assert!(element.is("dc:creator"));
        assert!(!element.is("creator"));
        assert!(!element.is_html());
        assert!(ElementData::new("p").is_html());
    }

    #[test]
    fn test_set_attribute_ignores_text_nodes() {
        let (mut doc, _, p) = sample();
        let text = doc.children(p)[0];
        doc.set_attribute(text, "id", "x");
        assert_eq!(doc.get_attribute(text, "id"), None);
    }

    #[test]
    fn test_elements_by_tag() {
        let (doc, _, _) = sample();
        assert_eq!(doc.elements_by_tag(doc.root(), "B").len(), 1);
        assert!(doc.elements_by_tag(doc.root(), "form").is_empty());
    }
}
