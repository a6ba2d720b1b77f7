//! HTML forms extracted from a page
//!
//! A [`Form`] snapshots the default values of its controls when the page
//! is built. Submitting goes back through the [`Session`] that loaded the
//! page, which the caller passes in.

use super::{Page, Session};
use crate::network::{RequestBody, Uri};
use crate::renderer::{Document, NodeId};
use crate::utils::{error::FormError, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::LazyLock;

/// Everything except unreserved characters is escaped, spaces become `%20`
const FIELD_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const MULTIPART: &str = "multipart/form-data";

static QUOTED_ARGUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]*)['"]"#).expect("hardcoded regex pattern is valid"));

/// A form and its current field values
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    node: NodeId,
    action: String,
    method: String,
    enctype: String,
    fields: Vec<(String, String)>,
    html: String,
}

impl Form {
    /// Build a form from its `<form>` element
    ///
    /// The action resolves against `base_href` when the page declares one and
    /// the action is not root-relative, otherwise against `page_url`. A
    /// relative `base_href` is itself resolved against `page_url` first.
    pub fn from_node(document: &Document, node: NodeId, page_url: &str, base_href: &str) -> Self {
        let raw_action = document.get_attribute(node, "action").unwrap_or_default();
        let page = Uri::parse(page_url);
        let action = if !base_href.is_empty() && !raw_action.starts_with('/') {
            Uri::parse(&page.join(base_href)).join(raw_action)
        } else {
            page.join(raw_action)
        };

        let method = document
            .get_attribute(node, "method")
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "get".to_string());
        let enctype = document
            .get_attribute(node, "enctype")
            .map(|e| e.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let mut form = Self {
            node,
            action,
            method,
            enctype,
            fields: Vec::new(),
            html: document.outer_html(node).unwrap_or_else(|err| {
                log::warn!("form markup unavailable: {err}");
                String::new()
            }),
        };
        form.collect_fields(document);
        form
    }

    fn collect_fields(&mut self, document: &Document) {
        for id in document.descendants(self.node) {
            let Some(element) = document.element(id) else {
                continue;
            };
            let Some(name) = element.get_attribute("name").filter(|n| !n.is_empty()) else {
                continue;
            };

            let value = if element.is("input") {
                let kind = element.get_attribute("type").unwrap_or("text");
                if kind.eq_ignore_ascii_case("submit") || kind.eq_ignore_ascii_case("button") {
                    continue;
                }
                if kind.eq_ignore_ascii_case("checkbox") {
                    if !element.has_attribute("checked") {
                        continue;
                    }
                    element
                        .get_attribute("value")
                        .filter(|v| !v.is_empty())
                        .unwrap_or("on")
                        .to_string()
                } else {
                    element.get_attribute("value").unwrap_or_default().to_string()
                }
            } else if element.is("select") {
                // Multi-selects are not captured
                if element.has_attribute("multiple") {
                    continue;
                }
                selected_option(document, id)
            } else if element.is("textarea") {
                document.text_content(id)
            } else {
                continue;
            };

            self.set(name, value);
        }
    }

    /// The `<form>` element in the page's document
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Absolute submission URL
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Lower-cased method, `get` when the markup declares none
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn enctype(&self) -> &str {
        &self.enctype
    }

    pub fn is_multipart(&self) -> bool {
        self.enctype == MULTIPART
    }

    /// Markup of the form as it was when the page loaded
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Case-insensitive search of the form markup
    pub fn contains_html(&self, needle: &str) -> bool {
        self.html.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Fields in submission order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set a field, keeping its position if it already exists
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Fields as `name=value` pairs joined by `&`, percent-encoded
    pub fn encoded_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, FIELD_ENCODE_SET),
                    utf8_percent_encode(value, FIELD_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Submit the form through `session`
    ///
    /// URL-encoded posts send `Content-Type` ahead of `headers`.
    pub fn submit(&self, session: &mut Session, headers: &[(String, String)]) -> Result<Page> {
        match self.method.as_str() {
            "get" => session.get(&format!("{}?{}", self.action, self.encoded_fields()), &[]),
            "post" if self.is_multipart() => session.post(
                &self.action,
                RequestBody::Multipart(self.fields.clone()),
                headers,
            ),
            "post" => {
                let mut all_headers = vec![(
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                )];
                all_headers.extend_from_slice(headers);
                session.post(
                    &self.action,
                    RequestBody::Text(self.encoded_fields()),
                    &all_headers,
                )
            }
            other => {
                log::warn!("not submitting {}: unknown method `{other}`", self.action);
                Err(FormError::UnknownMethod(other.to_string()).into())
            }
        }
    }

    /// Fire a server-side postback event
    ///
    /// `attribute` is the handler text, e.g. `__doPostBack('grid','Page$2')`.
    pub fn do_post_back(&mut self, session: &mut Session, attribute: &str) -> Result<Page> {
        let mut arguments = QUOTED_ARGUMENT
            .captures_iter(attribute)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));
        let (Some(target), Some(argument)) = (arguments.next(), arguments.next()) else {
            return Err(FormError::PostBackArguments(attribute.to_string()).into());
        };
        self.set("__EVENTTARGET", target);
        self.set("__EVENTARGUMENT", argument);
        self.submit(session, &[])
    }
}

/// Value of the first selected option, else the first option carrying a value
fn selected_option(document: &Document, select: NodeId) -> String {
    let options: Vec<NodeId> = document.elements_by_tag(select, "option");
    let chosen = options
        .iter()
        .find(|&&option| document.element(option).is_some_and(|o| o.has_attribute("selected")))
        .or_else(|| {
            options
                .iter()
                .find(|&&option| document.element(option).is_some_and(|o| o.has_attribute("value")))
        });
    chosen
        .and_then(|&option| document.get_attribute(option, "value"))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SessionConfig;
    use crate::network::{Method, MockTransport, RawResponse};
    use crate::renderer::HtmlParser;
    use pretty_assertions::assert_eq;

    fn form_from(markup: &str, page_url: &str, base_href: &str) -> Form {
        let document = HtmlParser::new().parse(markup).document;
        let node = document.elements_by_tag(document.root(), "form")[0];
        Form::from_node(&document, node, page_url, base_href)
    }

    fn ok_response(url: &str) -> RawResponse {
        RawResponse {
            url: url.to_string(),
            text: "HTTP/1.1 200 OK\r\n\r\n<p>done</p>".to_string(),
        }
    }

    fn pairs(fields: &[(&str, &str)]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_field_extraction() {
        let form = form_from(
            r#"<form><input name="a" value="1"><input type="checkbox" name="b" checked>
            <input type="checkbox" name="c"><select name="d"><option value="x" selected>
            <option value="y"></select></form>"#,
            "http://x/",
            "",
        );
        assert_eq!(form.fields(), pairs(&[("a", "1"), ("b", "on"), ("d", "x")]).as_slice());
    }

    #[test]
    fn test_excluded_controls() {
        let form = form_from(
            r#"<form><input type="submit" name="go" value="Go"><input type="button" name="b">
            <input value="nameless"><select name="m" multiple><option value="1" selected></select>
            <textarea name="t">hello</textarea><input name="h" type="hidden"></form>"#,
            "http://x/",
            "",
        );
        assert_eq!(form.fields(), pairs(&[("t", "hello"), ("h", "")]).as_slice());
    }

    #[test]
    fn test_select_falls_back_to_first_valued_option() {
        let form = form_from(
            r#"<form><select name="s"><option>label</option><option value="v1"><option value="v2"></select>
            <select name="e"><option>none</option></select></form>"#,
            "http://x/",
            "",
        );
        assert_eq!(form.field("s"), Some("v1"));
        assert_eq!(form.field("e"), Some(""));
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let form = form_from(
            r#"<form><input name="a" value="1"><input name="b" value="2"><input name="a" value="3"></form>"#,
            "http://x/",
            "",
        );
        assert_eq!(form.fields(), pairs(&[("a", "3"), ("b", "2")]).as_slice());
    }

    #[test]
    fn test_action_resolution() {
        let plain = form_from(r#"<form action="s">"#, "http://x/dir/page", "");
        assert_eq!(plain.action(), "http://x/dir/s");
        assert_eq!(plain.method(), "get");

        let based = form_from(r#"<form action="s" method="POST">"#, "http://x/dir/page", "http://cdn/base/");
        assert_eq!(based.action(), "http://cdn/base/s");
        assert_eq!(based.method(), "post");

        let rooted = form_from(r#"<form action="/s">"#, "http://x/dir/page", "http://cdn/base/");
        assert_eq!(rooted.action(), "http://x/s");
    }

    #[test]
    fn test_relative_base_href_resolves_against_page() {
        let rooted_base = form_from(r#"<form action="s">"#, "http://x/dir/page", "/app/");
        assert_eq!(rooted_base.action(), "http://x/app/s");

        let relative_base = form_from(r#"<form action="s?q=1">"#, "http://x/dir/page", "sub/");
        assert_eq!(relative_base.action(), "http://x/dir/sub/s?q=1");

        let empty_action = form_from("<form>", "http://x/dir/page", "/app/");
        assert_eq!(empty_action.action(), "http://x/app/");
    }

    #[test]
    fn test_set_remove_and_encode() {
        let mut form = form_from(r#"<form action="http://x/s">"#, "http://x/", "");
        form.set("a", "1");
        form.set("b", "two words");
        assert_eq!(form.encoded_fields(), "a=1&b=two%20words");
        form.set("a", "x&y=z");
        assert_eq!(form.encoded_fields(), "a=x%26y%3Dz&b=two%20words");
        assert_eq!(form.remove("a"), Some("x&y=z".to_string()));
        assert_eq!(form.remove("a"), None);
        assert_eq!(form.encoded_fields(), "b=two%20words");
    }

    #[test]
    fn test_html_snapshot() {
        let form = form_from(r#"<form id="login"><input name="u"></form>"#, "http://x/", "");
        assert!(form.html().starts_with("<form id=\"login\">"));
        assert!(form.contains_html("NAME=\"U\""));
    }

    #[test]
    fn test_get_submission_url() {
        let mut form = form_from(r#"<form action="http://x/s">"#, "http://x/", "");
        form.set("a", "1");
        form.set("b", "two words");

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request| {
                request.method() == Method::Get
                    && request.url() == "http://x/s?a=1&b=two%20words"
            })
            .times(1)
            .returning(|request| Ok(ok_response(request.url())));
        let mut session = Session::with_transport(SessionConfig::default(), Box::new(transport));

        let page = form.submit(&mut session, &[]).unwrap();
        assert_eq!(page.url(), "http://x/s?a=1&b=two%20words");
    }

    #[test]
    fn test_urlencoded_post_puts_content_type_first() {
        let form = form_from(
            r#"<form action="/login" method="post"><input name="user" value="me"></form>"#,
            "http://x/",
            "",
        );

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request| {
                request.method() == Method::Post
                    && request.payload() == &RequestBody::Text("user=me".to_string())
                    && request.headers()[0].1 == "application/x-www-form-urlencoded"
                    && request.headers()[1].0 == "X-Extra"
            })
            .times(1)
            .returning(|request| Ok(ok_response(request.url())));
        let mut session = Session::with_transport(SessionConfig::default(), Box::new(transport));

        let extra = vec![("X-Extra".to_string(), "1".to_string())];
        form.submit(&mut session, &extra).unwrap();
    }

    #[test]
    fn test_multipart_post_sends_raw_fields() {
        let form = form_from(
            r#"<form action="/up" method="post" enctype="multipart/form-data"><input name="f" value="v"></form>"#,
            "http://x/",
            "",
        );
        assert!(form.is_multipart());

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request| {
                request.payload()
                    == &RequestBody::Multipart(vec![("f".to_string(), "v".to_string())])
            })
            .times(1)
            .returning(|request| Ok(ok_response(request.url())));
        let mut session = Session::with_transport(SessionConfig::default(), Box::new(transport));

        form.submit(&mut session, &[]).unwrap();
    }

    #[test]
    fn test_unknown_method_does_not_submit() {
        let form = form_from(r#"<form method="put">"#, "http://x/", "");
        let mut transport = MockTransport::new();
        transport.expect_execute().times(0);
        let mut session = Session::with_transport(SessionConfig::default(), Box::new(transport));

        let err = form.submit(&mut session, &[]).unwrap_err();
        assert!(err.to_string().contains("unknown form method `put`"));
    }

    #[test]
    fn test_do_post_back() {
        let mut form = form_from(
            r#"<form action="/grid" method="post"><input type="hidden" name="__EVENTTARGET">
            <input type="hidden" name="__EVENTARGUMENT"></form>"#,
            "http://x/",
            "",
        );

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request| {
                request.payload()
                    == &RequestBody::Text(
                        "__EVENTTARGET=grid&__EVENTARGUMENT=Page%242".to_string(),
                    )
            })
            .times(1)
            .returning(|request| Ok(ok_response(request.url())));
        let mut session = Session::with_transport(SessionConfig::default(), Box::new(transport));

        form.do_post_back(&mut session, "javascript:__doPostBack('grid','Page$2')")
            .unwrap();
        assert_eq!(form.field("__EVENTTARGET"), Some("grid"));
    }

    #[test]
    fn test_do_post_back_needs_two_arguments() {
        let mut form = form_from(r#"<form method="post">"#, "http://x/", "");
        let mut session =
            Session::with_transport(SessionConfig::default(), Box::new(MockTransport::new()));
        assert!(form.do_post_back(&mut session, "__doPostBack('only')").is_err());
    }
}
