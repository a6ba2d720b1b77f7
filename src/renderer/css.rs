//! CSS queries over the arena using the `selectors` crate
//!
//! [`CssSelector`] compiles a selector list with cssparser and matches it
//! against [`ElementRef`], a borrowed view of one element node.

use super::dom::{Document, ElementData, NodeId, NodeType};
use crate::utils::{error::RenderError, Result};
use cssparser::{ParserInput, ToCss};
use markup5ever::{LocalName, Namespace};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
    self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
    NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{self, ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};
use std::fmt;

/// A compiled CSS selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssSelector {
    selectors: SelectorList<QueryImpl>,
}

impl CssSelector {
    pub fn parse(query: &str) -> Result<Self> {
        let mut input = ParserInput::new(query);
        let mut parser = cssparser::Parser::new(&mut input);
        SelectorList::parse(&QueryParser, &mut parser, ParseRelative::No)
            .map(|selectors| Self { selectors })
            .map_err(|err| {
                log::debug!("css query {query:?} rejected: {:?}", err.kind);
                RenderError::Selector(query.to_string()).into()
            })
    }

    /// Matching elements below `context`, in document order
    ///
    /// Ancestors outside `context` still take part in matching, and
    /// `:scope` refers to `context` when it is an element.
    pub fn select(&self, document: &Document, context: NodeId) -> Vec<NodeId> {
        let mut caches = SelectorCaches::default();
        let mut matching = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        matching.scope_element = ElementRef::new(document, context).map(|scope| scope.opaque());

        document
            .descendants(context)
            .into_iter()
            .filter_map(|id| ElementRef::new(document, id))
            .filter(|element| {
                matching::matches_selector_list(&self.selectors, element, &mut matching)
            })
            .map(|element| element.id)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryImpl;

impl parser::SelectorImpl for QueryImpl {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssLocalName;
    type LocalName = CssLocalName;
    type NamespacePrefix = CssLocalName;
    type NamespaceUrl = Namespace;
    type BorrowedNamespaceUrl = Namespace;
    type BorrowedLocalName = CssLocalName;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

struct QueryParser;

impl<'i> parser::Parser<'i> for QueryParser {
    type Impl = QueryImpl;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }

    fn parse_has(&self) -> bool {
        true
    }
}

/// Attribute value inside a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssString(String);

impl From<&str> for CssString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_string(&self.0, dest)
    }
}

/// Tag, attribute, id and class names inside a selector
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CssLocalName(LocalName);

impl From<&str> for CssLocalName {
    fn from(value: &str) -> Self {
        Self(LocalName::from(value))
    }
}

impl ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

impl PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

/// State pseudo-classes such as `:hover` never apply to a fetched page,
/// so none are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonTSPseudoClass {}

impl parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = QueryImpl;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoElement {}

impl parser::PseudoElement for PseudoElement {
    type Impl = QueryImpl;
}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

/// An element node seen through the `selectors` matching interface
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    document: &'a Document,
    id: NodeId,
    element: &'a ElementData,
}

impl<'a> ElementRef<'a> {
    /// `None` unless `id` is an element
    pub fn new(document: &'a Document, id: NodeId) -> Option<Self> {
        document
            .element(id)
            .map(|element| Self { document, id, element })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn siblings(&self) -> (&'a [NodeId], usize) {
        let Some(parent) = self.document.node(self.id).parent() else {
            return (&[], 0);
        };
        let siblings = self.document.children(parent);
        let position = siblings.iter().position(|&s| s == self.id).unwrap_or(0);
        (siblings, position)
    }

    fn first_element<I: Iterator<Item = NodeId>>(&self, ids: I) -> Option<Self> {
        let document = self.document;
        ids.filter_map(|id| Self::new(document, id)).next()
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> at {}", self.element.tag_name(), self.id.index())
    }
}

impl Element for ElementRef<'_> {
    type Impl = QueryImpl;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.document.node(self.id))
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.document.node(self.id).parent()?;
        Self::new(self.document, parent)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        self.first_element(siblings[..position].iter().rev().copied())
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        self.first_element(siblings.iter().skip(position + 1).copied())
    }

    fn first_element_child(&self) -> Option<Self> {
        self.first_element(self.document.children(self.id).iter().copied())
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.element.is_html()
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.element.name().local == local_name.0
    }

    fn has_namespace(&self, ns: &Namespace) -> bool {
        &self.element.name().ns == ns
    }

    fn is_same_type(&self, other: &Self) -> bool {
        let (a, b) = (self.element.name(), other.element.name());
        a.local == b.local && a.ns == b.ns
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        self.element.attributes().any(|(key, value)| {
            !matches!(*ns, NamespaceConstraint::Specific(url) if *url != key.ns)
                && local_name.0 == key.local
                && operation.eval_str(value)
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, QueryImpl>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<'_, QueryImpl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.element.is_html()
            && (self.element.is("a") || self.element.is("area"))
            && self.element.has_attribute("href")
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.element
            .id()
            .is_some_and(|value| case_sensitivity.eq(value.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.element
            .classes()
            .iter()
            .any(|class| case_sensitivity.eq(class.as_bytes(), name.0.as_bytes()))
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .document
            .children(self.id)
            .iter()
            .any(|&child| match &self.document.node(child).node_type {
                NodeType::Element(_) => true,
                NodeType::Text(text) => !text.is_empty(),
                _ => false,
            })
    }

    fn is_root(&self) -> bool {
        self.document
            .node(self.id)
            .parent()
            .is_some_and(|parent| matches!(self.document.node(parent).node_type, NodeType::Document))
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::html::{HtmlParser, XmlParser};
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
        <h1>Head</h1><p>first</p><p>second</p>
        <ul><li>a</li><li>b</li><li><a href="/c">c</a></li></ul>
        <form><input type="TEXT" name="q"><input type="hidden" name="t"><input name="n"></form>
        <div id="empty"></div><a href="https://ext/">ext</a>
        </body></html>"#;

    fn select(doc: &Document, query: &str) -> Vec<String> {
        CssSelector::parse(query)
            .unwrap()
            .select(doc, doc.root())
            .into_iter()
            .map(|id| doc.text_content(id).trim().to_string())
            .collect()
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let doc = HtmlParser::new().parse(PAGE).document;
        assert_eq!(select(&doc, "li:first-child"), vec!["a"]);
        assert_eq!(select(&doc, "li:last-child"), vec!["c"]);
        assert_eq!(select(&doc, "li:nth-child(2)"), vec!["b"]);
        assert_eq!(select(&doc, "li:not(:first-child)"), vec!["b", "c"]);
        assert_eq!(select(&doc, "li:has(a)"), vec!["c"]);
        assert_eq!(select(&doc, "div:empty").len(), 1);
        assert_eq!(select(&doc, ":root").len(), 1);
    }

    #[test]
    fn test_sibling_combinators() {
        let doc = HtmlParser::new().parse(PAGE).document;
        assert_eq!(select(&doc, "h1 + p"), vec!["first"]);
        assert_eq!(select(&doc, "h1 ~ p"), vec!["first", "second"]);
    }

    #[test]
    fn test_attribute_operators() {
        let doc = HtmlParser::new().parse(PAGE).document;
        assert_eq!(select(&doc, r#"a[href^="/"]"#), vec!["c"]);
        assert_eq!(select(&doc, r#"a[href*="ext"]"#), vec!["ext"]);
        assert_eq!(select(&doc, r#"a[href$="/c"]"#), vec!["c"]);

        let inputs = CssSelector::parse(r#"input[type="text" i]"#)
            .unwrap()
            .select(&doc, doc.root());
        assert_eq!(inputs.len(), 1);
        assert_eq!(doc.get_attribute(inputs[0], "name"), Some("q"));
        assert_eq!(
            CssSelector::parse(r#"input[type="text" s]"#)
                .unwrap()
                .select(&doc, doc.root()),
            Vec::<NodeId>::new()
        );
    }

    #[test]
    fn test_scope_is_the_context() {
        let doc = HtmlParser::new().parse(PAGE).document;
        let ul = CssSelector::parse("ul").unwrap().select(&doc, doc.root())[0];
        let direct = CssSelector::parse(":scope > li").unwrap().select(&doc, ul);
        assert_eq!(direct.len(), 3);
        assert!(CssSelector::parse(":scope > a").unwrap().select(&doc, ul).is_empty());
        assert_eq!(CssSelector::parse("body li a").unwrap().select(&doc, ul).len(), 1);
    }

    #[test]
    fn test_xml_names_keep_case() {
        let doc = XmlParser::new()
            .parse("<feed><Entry><title>t</title></Entry><entry/></feed>")
            .document;
        assert_eq!(CssSelector::parse("Entry").unwrap().select(&doc, doc.root()).len(), 1);
        assert_eq!(CssSelector::parse("Entry > title").unwrap().select(&doc, doc.root()).len(), 1);
    }

    #[test]
    fn test_rejected_queries() {
        for query in ["div[", "> p", "p >", "p ! q", "a:hover", "p::before", "[=x]"] {
            assert!(CssSelector::parse(query).is_err(), "{query} should not parse");
        }
    }
}
