//! HTML5 and XML parsing using html5ever/xml5ever
//!
//! Both parsers build an `RcDom` and copy it into our arena [`Document`],
//! keeping each element's namespace-resolved name.
//! Neither fails on malformed markup; recoverable errors are returned
//! alongside the best-effort tree.

use super::dom::{Document, ElementData, NodeId, NodeType};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use xml5ever::driver::XmlParseOpts;

/// Which tree parser a document goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Xml,
}

/// Tree plus the errors the parser recovered from
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub document: Document,
    pub errors: Vec<String>,
}

/// HTML5 parser using html5ever
pub struct HtmlParser {
    opts: ParseOpts,
}

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self {
            opts: ParseOpts {
                tree_builder: TreeBuilderOpts {
                    drop_doctype: false,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// Parse HTML content into a DOM document
    pub fn parse(&self, content: &str) -> ParseOutput {
        if content.trim().is_empty() {
            return ParseOutput {
                document: Document::new(),
                errors: Vec::new(),
            };
        }

        let dom = html5ever::parse_document(RcDom::default(), self.opts.clone()).one(content);
        into_output(dom)
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// XML parser using xml5ever
#[derive(Debug, Default)]
pub struct XmlParser;

impl XmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse XML content into a DOM document
    pub fn parse(&self, content: &str) -> ParseOutput {
        let dom =
            xml5ever::driver::parse_document(RcDom::default(), XmlParseOpts::default()).one(content);
        into_output(dom)
    }
}

/// Parse with the parser matching `kind`
pub fn parse_document(content: &str, kind: DocumentKind) -> ParseOutput {
    match kind {
        DocumentKind::Html => HtmlParser::new().parse(content),
        DocumentKind::Xml => XmlParser::new().parse(content),
    }
}

fn into_output(dom: RcDom) -> ParseOutput {
    let errors = dom.errors.take().into_iter().map(|e| e.to_string()).collect();
    let mut document = Document::new();
    let root = document.root();
    convert_children(&mut document, root, &dom.document);
    ParseOutput { document, errors }
}

fn convert_children(document: &mut Document, parent: NodeId, handle: &Handle) {
    for child in handle.children.borrow().iter() {
        let node_type = match &child.data {
            NodeData::Document => continue,
            NodeData::Doctype { name, .. } => NodeType::Doctype(name.to_string()),
            NodeData::Text { contents } => NodeType::Text(contents.borrow().to_string()),
            NodeData::Comment { contents } => NodeType::Comment(contents.to_string()),
            NodeData::ProcessingInstruction { target, contents } => {
                NodeType::ProcessingInstruction {
                    target: target.to_string(),
                    data: contents.to_string(),
                }
            }
            NodeData::Element { name, attrs, .. } => {
                let mut element = ElementData::with_name(name.clone());
                for attr in attrs.borrow().iter() {
                    element.push_attribute(attr.name.clone(), attr.value.to_string());
                }
                NodeType::Element(element)
            }
        };

        let id = document.append(parent, node_type);
        convert_children(document, id, child);

        // <template> keeps its children in a separate fragment
        if let NodeData::Element {
            template_contents, ..
        } = &child.data
        {
            if let Some(contents) = template_contents.borrow().as_ref() {
                convert_children(document, id, contents);
            }
        }
    }
}
