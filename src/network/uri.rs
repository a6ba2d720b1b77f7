//! URI reference parsing and resolution
//!
//! Resolution follows the legacy "merge" rules used by form actions and
//! redirect targets in the wild rather than strict RFC 3986:
//! - a reference with an empty path inherits the base path, and the base
//!   query when it carries none of its own
//! - relative paths are appended to the base directory
//! - dot segments and repeated slashes are collapsed until nothing changes

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static URI_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?$")
        .expect("hardcoded regex pattern is valid")
});
static REPEATED_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//+").expect("hardcoded regex pattern is valid"));
static LEADING_DOT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/\.\.?/").expect("hardcoded regex pattern is valid"));
static DOT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\.(/|$)").expect("hardcoded regex pattern is valid"));
static PARENT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[^/]*?/\.\.(/|$)").expect("hardcoded regex pattern is valid"));

/// A parsed URI reference
///
/// Components that are absent in the source string are empty. The path is
/// kept as written so that resolution can tell "no path" from "/"; the
/// [`Uri::path`] accessor reports `/` for an empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    authority: String,
    path: String,
    query: String,
    fragment: String,
}

impl Uri {
    /// Split a URI reference into its components
    pub fn parse(input: &str) -> Self {
        let Some(caps) = URI_REFERENCE.captures(input) else {
            return Self {
                path: input.to_string(),
                ..Self::default()
            };
        };
        let group = |idx: usize| caps.get(idx).map_or("", |m| m.as_str()).to_string();

        Self {
            scheme: group(2),
            authority: group(4),
            path: group(5),
            query: group(7),
            fragment: group(9),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The path, `/` when the reference had none
    pub fn path(&self) -> &str {
        if self.path.is_empty() { "/" } else { &self.path }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Whether the reference names its own scheme
    pub fn is_absolute(&self) -> bool {
        !self.scheme.is_empty()
    }

    /// Resolve `reference` against this URI and serialize the result
    pub fn join(&self, reference: &str) -> String {
        let mut target = Uri::parse(reference);

        if target.scheme.is_empty() && target.authority.is_empty() {
            if target.path.is_empty() {
                target.path = self.path().to_string();
                if target.query.is_empty() {
                    target.query = self.query.clone();
                }
            } else if !target.path.starts_with('/') {
                target.path = format!("{}{}", self.directory(), target.path);
            }
        }

        if target.scheme.is_empty() {
            target.scheme = self.scheme.clone();
            if target.authority.is_empty() {
                target.authority = self.authority.clone();
            }
        }

        target.to_string()
    }

    /// Base path with its last segment removed, used for relative merges
    fn directory(&self) -> String {
        let path = self.path();
        let stripped = match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        };
        if stripped.is_empty() && self.authority.is_empty() {
            "/".to_string()
        } else {
            stripped.to_string()
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if !self.authority.is_empty() {
            write!(f, "//{}", self.authority)?;
        }
        f.write_str(&normalize_path(self.path()))?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// Collapse repeated slashes and `.`/`..` segments until the path is stable
///
/// Every rewrite shortens the string, so the loop always terminates.
pub fn normalize_path(path: &str) -> String {
    let mut current = path.to_string();
    loop {
        let mut changed = false;
        for (pattern, limit) in [
            (&*REPEATED_SLASHES, 0),
            (&*LEADING_DOT_SEGMENT, 0),
            (&*DOT_SEGMENT, 0),
            (&*PARENT_SEGMENT, 1),
        ] {
            let rewritten = pattern.replacen(&current, limit, "/");
            if rewritten != current {
                current = rewritten.into_owned();
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Append an already-encoded query string to `url`
///
/// Extends an existing query with `&`, adds a root path when the URL has
/// none (`http://host` becomes `http://host/?q`), else appends `?`.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let uri = Uri::parse(url);
    if !uri.query.is_empty() {
        format!("{url}&{query}")
    } else if uri.path.is_empty() && !uri.authority.is_empty() {
        format!("{url}/?{query}")
    } else {
        format!("{url}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "http://a.com/b/c/d;p?q";

    fn join(reference: &str) -> String {
        Uri::parse(BASE).join(reference)
    }

    #[test]
    fn test_parse_components() {
        let uri = Uri::parse("https://user@host:8080/a/b?x=1#top");
        assert_eq!(uri.scheme(), "https");
        assert_eq!(uri.authority(), "user@host:8080");
        assert_eq!(uri.path(), "/a/b");
        assert_eq!(uri.query(), "x=1");
        assert_eq!(uri.fragment(), "top");
        assert!(uri.is_absolute());
    }

    #[test]
    fn test_parse_defaults_path() {
        let uri = Uri::parse("http://a.com");
        assert_eq!(uri.path(), "/");
        assert_eq!(uri.to_string(), "http://a.com/");
    }

    #[test]
    fn test_join_relative_segment() {
        assert_eq!(join("g"), "http://a.com/b/c/g");
        assert_eq!(join("./g/"), "http://a.com/b/c/g/");
        assert_eq!(join("g?y"), "http://a.com/b/c/g?y");
    }

    #[test]
    fn test_join_parent_segments() {
        assert_eq!(join("../g"), "http://a.com/b/g");
        assert_eq!(join("../../g"), "http://a.com/g");
        assert_eq!(join("../../../g"), "http://a.com/g");
    }

    #[test]
    fn test_join_root_relative() {
        assert_eq!(join("/g"), "http://a.com/g");
        assert_eq!(join("/./x/../g"), "http://a.com/g");
    }

    #[test]
    fn test_join_query_only_keeps_path() {
        assert_eq!(join("?y"), "http://a.com/b/c/d;p?y");
    }

    #[test]
    fn test_join_fragment_only_keeps_path_and_query() {
        assert_eq!(join("#s"), "http://a.com/b/c/d;p?q#s");
    }

    #[test]
    fn test_join_empty_reference_is_base() {
        assert_eq!(join(""), BASE);
    }

    #[test]
    fn test_join_network_path_inherits_scheme() {
        assert_eq!(join("//other.org/x"), "http://other.org/x");
    }

    #[test]
    fn test_join_absolute_reference_unchanged() {
        assert_eq!(join("https://z.net/p/../q"), "https://z.net/q");
    }

    #[test]
    fn test_join_against_host_only_base() {
        let base = Uri::parse("http://a.com");
        assert_eq!(base.join("g"), "http://a.com/g");
    }

    #[test]
    fn test_join_does_not_mutate_base() {
        let base = Uri::parse(BASE);
        let _ = base.join("../x?z#f");
        assert_eq!(base.to_string(), BASE);
    }

    #[test]
    fn test_normalize_path_rules() {
        assert_eq!(normalize_path("/a//b///c"), "/a/b/c");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("/a/./b/."), "/a/b/");
        assert_eq!(normalize_path("/a/b/../../c"), "/c");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("http://x", "a=1"), "http://x/?a=1");
        assert_eq!(append_query("http://x/s", "a=1"), "http://x/s?a=1");
        assert_eq!(append_query("http://x/s?b=2", "a=1"), "http://x/s?b=2&a=1");
        assert_eq!(append_query("http://x/s", ""), "http://x/s");
    }
}
