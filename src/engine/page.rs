//! Page representation

use super::config::SessionConfig;
use super::form::Form;
use crate::network::{Diagnostic, ParsedResponse, Uri};
use crate::renderer::{parse_document, Document, DocumentKind, NodeId};
use crate::utils::Result;
use std::fmt;

/// A fetched and parsed page
#[derive(Debug, Clone)]
pub struct Page {
    /// Effective URL after any redirects
    url: String,
    base_href: String,
    title: String,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    /// Response body as received
    body: String,
    /// Body, re-serialized when URLs were converted
    html: String,
    document: Document,
    forms: Vec<Form>,
    is_xml: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Page {
    /// Build a page from a raw response
    ///
    /// Never fails: malformed responses and documents produce a best-effort
    /// page with [`Page::diagnostics`] describing what was recovered.
    pub fn parse(url: &str, raw: &str, config: &SessionConfig) -> Self {
        let response = if config.replace_nbsp {
            ParsedResponse::parse(&raw.replace("&nbsp;", " "))
        } else {
            ParsedResponse::parse(raw)
        };
        Self::from_response(url, response, config)
    }

    /// Build a page from an already split response
    pub fn from_response(url: &str, response: ParsedResponse, config: &SessionConfig) -> Self {
        let is_xml = config.parser_mode.is_xml(response.content_type());
        let (status, headers, body, mut diagnostics) = response.into_parts();
        for diagnostic in &diagnostics {
            log::warn!("{url}: {diagnostic:?}");
        }

        let kind = if is_xml {
            DocumentKind::Xml
        } else {
            DocumentKind::Html
        };
        let output = parse_document(&body, kind);
        let mut document = output.document;
        if !output.errors.is_empty() {
            log::warn!("{url}: document recovered from {} errors", output.errors.len());
            diagnostics.push(Diagnostic::DocumentRecovered {
                errors: output.errors.len(),
            });
        }

        let root = document.root();
        let title = document
            .elements_by_tag(root, "title")
            .first()
            .map(|&node| document.text_content(node).trim().to_string())
            .unwrap_or_default();
        let base_href = document
            .elements_by_tag(root, "base")
            .into_iter()
            .find_map(|node| document.get_attribute(node, "href"))
            .unwrap_or_default()
            .to_string();

        let forms = document
            .elements_by_tag(root, "form")
            .into_iter()
            .map(|node| Form::from_node(&document, node, url, &base_href))
            .collect();

        let html = if config.convert_urls {
            convert_urls(&mut document, url);
            document.serialize(kind).unwrap_or_else(|err| {
                log::warn!("{url}: keeping the received body, serialization failed: {err}");
                body.clone()
            })
        } else {
            body.clone()
        };

        Self {
            url: url.to_string(),
            base_href,
            title,
            status,
            headers,
            body,
            html,
            document,
            forms,
            is_xml,
            diagnostics,
        }
    }

    /// Get the page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `href` of the first `<base>` element, empty if none
    pub fn base_href(&self) -> &str {
        &self.base_href
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Get the DOM document
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn is_xml(&self) -> bool {
        self.is_xml
    }

    /// Forms in document order
    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    pub fn form(&self, index: usize) -> Option<&Form> {
        self.forms.get(index)
    }

    pub fn form_mut(&mut self, index: usize) -> Option<&mut Form> {
        self.forms.get_mut(index)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when neither the response nor the document needed recovery
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// All nodes matching an XPath or CSS query
    pub fn search(&self, query: &str) -> Result<Vec<NodeId>> {
        self.document.select(query)
    }

    /// First node matching an XPath or CSS query
    pub fn at(&self, query: &str) -> Result<Option<NodeId>> {
        Ok(self.search(query)?.into_iter().next())
    }

    pub fn search_in(&self, context: NodeId, query: &str) -> Result<Vec<NodeId>> {
        self.document.select_from(context, query)
    }

    pub fn at_in(&self, context: NodeId, query: &str) -> Result<Option<NodeId>> {
        Ok(self.search_in(context, query)?.into_iter().next())
    }

    /// Case-insensitive search of the page markup
    pub fn contains_html(&self, needle: &str) -> bool {
        self.html.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Text content of the whole document
    pub fn text(&self) -> String {
        self.document.text_content(self.document.root())
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Make `img[src]` and `a[href]` absolute against the page URL
fn convert_urls(document: &mut Document, url: &str) {
    let base = Uri::parse(url);
    for (tag, attribute) in [("img", "src"), ("a", "href")] {
        for node in document.elements_by_tag(document.root(), tag) {
            if let Some(value) = document.get_attribute(node, attribute) {
                let absolute = base.join(value);
                document.set_attribute(node, attribute, absolute);
            }
        }
    }
}
