//! Document serialization back to markup
//!
//! The arena is walked through markup5ever's `Serialize` trait so that
//! html5ever and xml5ever apply their own escaping, void-element and
//! namespace rules.

use super::dom::{Document, NodeId, NodeType};
use super::html::DocumentKind;
use crate::utils::Result;
use markup5ever::serialize::{Serialize, Serializer, TraversalScope};
use markup5ever::QualName;
use std::collections::VecDeque;
use std::io;

/// A node of a [`Document`] as seen by the html5ever/xml5ever serializers
pub struct SerializableNode<'a> {
    document: &'a Document,
    id: NodeId,
}

impl<'a> SerializableNode<'a> {
    pub fn new(document: &'a Document, id: NodeId) -> Self {
        Self { document, id }
    }
}

enum SerializeOp {
    Open(NodeId),
    Close(QualName),
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let document = self.document;
        let mut ops = VecDeque::new();
        match traversal_scope {
            TraversalScope::IncludeNode => ops.push_back(SerializeOp::Open(self.id)),
            TraversalScope::ChildrenOnly(_) => ops.extend(
                document
                    .children(self.id)
                    .iter()
                    .map(|&child| SerializeOp::Open(child)),
            ),
        }

        while let Some(op) = ops.pop_front() {
            match op {
                SerializeOp::Open(id) => {
                    match &document.node(id).node_type {
                        NodeType::Element(element) => {
                            serializer.start_elem(element.name().clone(), element.attributes())?;
                            ops.push_front(SerializeOp::Close(element.name().clone()));
                        }
                        NodeType::Document => {}
                        NodeType::Doctype(name) => serializer.write_doctype(name)?,
                        NodeType::Text(text) => serializer.write_text(text)?,
                        NodeType::Comment(text) => serializer.write_comment(text)?,
                        NodeType::ProcessingInstruction { target, data } => {
                            serializer.write_processing_instruction(target, data)?
                        }
                    }
                    for &child in document.children(id).iter().rev() {
                        ops.push_front(SerializeOp::Open(child));
                    }
                }
                SerializeOp::Close(name) => serializer.end_elem(name)?,
            }
        }
        Ok(())
    }
}

impl Document {
    /// Serialize the whole document as HTML
    pub fn to_html(&self) -> Result<String> {
        self.serialize(DocumentKind::Html)
    }

    /// Serialize the whole document as XML
    pub fn to_xml(&self) -> Result<String> {
        self.serialize(DocumentKind::Xml)
    }

    pub fn serialize(&self, kind: DocumentKind) -> Result<String> {
        self.markup(self.root(), kind, TraversalScope::ChildrenOnly(None))
    }

    /// Markup of a node including its own tags
    pub fn outer_html(&self, id: NodeId) -> Result<String> {
        self.markup(id, DocumentKind::Html, TraversalScope::IncludeNode)
    }

    fn markup(&self, id: NodeId, kind: DocumentKind, scope: TraversalScope) -> Result<String> {
        let node = SerializableNode::new(self, id);
        let mut out = Vec::new();
        match kind {
            DocumentKind::Html => {
                let opts = html5ever::serialize::SerializeOpts {
                    traversal_scope: scope,
                    ..Default::default()
                };
                html5ever::serialize::serialize(&mut out, &node, opts)?;
            }
            DocumentKind::Xml => {
                let opts = xml5ever::serialize::SerializeOpts {
                    traversal_scope: scope,
                };
                xml5ever::serialize::serialize(&mut out, &node, opts)?;
            }
        }
        String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }
}
