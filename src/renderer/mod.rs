//! Document trees for trawl
//!
//! Parses HTML/XML into an owned arena tree, answers XPath/CSS queries
//! against it and serializes it back to markup.

pub mod css;
mod dom;
pub mod html;
pub mod selector;
mod serialize;

pub use css::CssSelector;
pub use dom::{Document, ElementData, Node, NodeId, NodeType};
pub use html::{parse_document, DocumentKind, HtmlParser, ParseOutput, XmlParser};
pub use selector::Selector;
pub use serialize::SerializableNode;
