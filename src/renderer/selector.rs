//! Node queries: a small XPath subset and CSS selectors
//!
//! Queries starting with `/` or `./` are XPath, anything else is CSS.
//! Both return nodes in document order without duplicates.
//!
//! XPath: `/`, `//`, a leading `.`, name tests and `*`, predicates
//! `[@attr]`, `[@attr='value']` and `[n]`, unions with `|`.
//!
//! CSS goes through [`CssSelector`], so the full selectors level 4
//! grammar minus state pseudo-classes and pseudo-elements is accepted.

use super::css::CssSelector;
use super::dom::{Document, NodeId};
use crate::utils::{error::RenderError, Result};

/// A compiled query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    XPath(Vec<Path>),
    Css(CssSelector),
}

/// One branch of an XPath union
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Starts at the document node instead of the context node
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` matches any element
    name: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttribute(String),
    AttributeEquals(String, String),
    /// 1-based position among the candidates of one parent
    Position(usize),
}

impl Selector {
    /// Compile an XPath or CSS query
    pub fn parse(query: &str) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(invalid(query));
        }
        if !is_xpath(query) {
            return CssSelector::parse(query).map(Selector::Css);
        }
        let paths = split_top_level(query, '|')
            .into_iter()
            .map(|part| parse_xpath(part.trim()).ok_or_else(|| invalid(query)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Selector::XPath(paths))
    }

    /// Evaluate against `document`, relative paths starting at `context`
    pub fn select(&self, document: &Document, context: NodeId) -> Vec<NodeId> {
        let paths = match self {
            Selector::Css(css) => return css.select(document, context),
            Selector::XPath(paths) => paths,
        };
        let mut out = Vec::new();
        for path in paths {
            let start = if path.absolute { document.root() } else { context };
            let mut current = vec![start];
            for step in &path.steps {
                current = step.apply(document, &current);
            }
            out.extend(current);
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Whether a query is XPath rather than CSS
pub fn is_xpath(query: &str) -> bool {
    let query = query.trim_start();
    query.starts_with('/') || query.starts_with("./")
}

impl Step {
    fn apply(&self, document: &Document, contexts: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &context in contexts {
            let parents = match self.axis {
                Axis::Child => vec![context],
                Axis::Descendant => {
                    let mut parents = vec![context];
                    parents.extend(document.descendants(context));
                    parents
                }
            };
            for parent in parents {
                let mut candidates: Vec<NodeId> = document
                    .children(parent)
                    .iter()
                    .copied()
                    .filter(|&node| self.matches_name(document, node))
                    .collect();
                for predicate in &self.predicates {
                    candidates = predicate.filter(document, candidates);
                }
                out.extend(candidates);
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn matches_name(&self, document: &Document, node: NodeId) -> bool {
        match (document.element(node), &self.name) {
            (Some(_), None) => true,
            (Some(element), Some(name)) => element.is(name),
            (None, _) => false,
        }
    }
}

impl Predicate {
    fn filter(&self, document: &Document, candidates: Vec<NodeId>) -> Vec<NodeId> {
        match self {
            Predicate::Position(n) => candidates.get(n - 1).copied().into_iter().collect(),
            _ => candidates
                .into_iter()
                .filter(|&node| self.matches(document, node))
                .collect(),
        }
    }

    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };
        match self {
            Predicate::HasAttribute(name) => element.has_attribute(name),
            Predicate::AttributeEquals(name, value) => {
                element.get_attribute(name) == Some(value.as_str())
            }
            Predicate::Position(_) => true,
        }
    }
}

fn invalid(query: &str) -> crate::utils::TrawlError {
    RenderError::Selector(query.to_string()).into()
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':')
}

/// Split on `separator` outside of brackets and quotes
fn split_top_level(query: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, c) in query.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, _) if c == separator && depth == 0 => {
                parts.push(&query[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&query[start..]);
    parts
}

/// Take a name (or `*`) from the front of `s`
fn take_name(s: &str) -> (Option<&str>, &str) {
    if let Some(rest) = s.strip_prefix('*') {
        return (Some("*"), rest);
    }
    let end = s.find(|c: char| !is_name_char(c)).unwrap_or(s.len());
    if end == 0 {
        (None, s)
    } else {
        (Some(&s[..end]), &s[end..])
    }
}

/// Take a bracketed predicate body from the front of `s` (which starts with `[`)
fn take_bracket(s: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    for (idx, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some((&s[1..idx], &s[idx + 1..])),
            _ => {}
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    value
}

/// `name` or `name=value` inside an attribute predicate
fn attribute_predicate(body: &str) -> Option<Predicate> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => (name.trim(), Some(unquote(value))),
        None => (body.trim(), None),
    };
    if name.is_empty() || !name.chars().all(is_name_char) {
        return None;
    }
    Some(match value {
        Some(value) => Predicate::AttributeEquals(name.to_string(), value.to_string()),
        None => Predicate::HasAttribute(name.to_string()),
    })
}

fn parse_xpath(query: &str) -> Option<Path> {
    let (absolute, mut rest) = match query.strip_prefix('.') {
        Some(rest) => (false, rest),
        None => (true, query),
    };

    let mut steps = Vec::new();
    while !rest.is_empty() {
        let axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else {
            return None;
        };

        let (name, r) = take_name(rest);
        rest = r;
        let name = name?;

        let mut predicates = Vec::new();
        while rest.starts_with('[') {
            let (body, r) = take_bracket(rest)?;
            rest = r;
            let body = body.trim();
            let predicate = match body.strip_prefix('@') {
                Some(attribute) => attribute_predicate(attribute)?,
                None => match body.parse::<usize>() {
                    Ok(n) if n > 0 => Predicate::Position(n),
                    _ => return None,
                },
            };
            predicates.push(predicate);
        }

        steps.push(Step {
            axis,
            name: (name != "*").then(|| name.to_string()),
            predicates,
        });
    }

    Some(Path { absolute, steps })
}
