//! Raw HTTP response parsing
//!
//! Splits a response stream into status, headers and body. Parsing never
//! fails: malformed input yields partial results plus [`Diagnostic`]s.

use regex::Regex;
use std::sync::LazyLock;

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^HTTP/\d\.\d (\d{3})(?:\s|$)").expect("hardcoded regex pattern is valid")
});
static PROXY_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)connection established").expect("hardcoded regex pattern is valid")
});

/// Something the parser recovered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// First line was not an HTTP status line; it is dropped and status stays unset
    MissingStatusLine { line: String },
    /// Header block ended on a non-header line, kept as the start of the body
    HeaderBlockInterrupted { line: String },
    /// Stream ended before the blank line closing the header block
    UnterminatedHeaders,
    /// The document parser reported recoverable errors
    DocumentRecovered { errors: usize },
}

/// A response split into status, headers and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: String,
    diagnostics: Vec<Diagnostic>,
}

impl ParsedResponse {
    /// Parse a raw response
    pub fn parse(raw: &str) -> Self {
        let mut response = Self::default();
        if raw.is_empty() {
            return response;
        }
        let mut lines = Lines::new(raw);

        // A forward proxy may answer the CONNECT before the origin does
        if let Some(line) = lines.peek() {
            if PROXY_BANNER.is_match(line) {
                lines.next();
                lines.next();
            }
        }

        let status = lines.peek().and_then(|line| {
            STATUS_LINE
                .captures(line)
                .and_then(|caps| caps[1].parse::<u16>().ok())
        });
        match status {
            Some(code) => {
                response.status = Some(code);
                lines.next();
            }
            None => {
                // The line is still consumed; headers may follow it
                if let Some(line) = lines.peek() {
                    response.diagnostics.push(Diagnostic::MissingStatusLine {
                        line: line.to_string(),
                    });
                    lines.next();
                }
            }
        }

        loop {
            let Some(line) = lines.peek() else {
                response.diagnostics.push(Diagnostic::UnterminatedHeaders);
                break;
            };
            match split_header(line) {
                Some((name, value)) => {
                    response.set_header(name, value);
                    lines.next();
                }
                None if line.trim().is_empty() => {
                    lines.next();
                    break;
                }
                None => {
                    response.diagnostics.push(Diagnostic::HeaderBlockInterrupted {
                        line: line.to_string(),
                    });
                    break;
                }
            }
        }

        response.body = lines.rest().to_string();
        response
    }

    /// Get the status code, if the stream carried a status line
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Get response headers in arrival order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Get a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Get the content type from headers
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Recoveries made while parsing
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Split into parts, consuming the response
    pub fn into_parts(self) -> (Option<u16>, Vec<(String, String)>, String, Vec<Diagnostic>) {
        (self.status, self.headers, self.body, self.diagnostics)
    }

    /// Later duplicates overwrite earlier values, keeping the first position
    fn set_header(&mut self, name: &str, value: &str) {
        let value = value.trim().to_string();
        match self.headers.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value))
}

/// Line cursor over the raw text that can hand back the unread remainder
struct Lines<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(raw: &'a str) -> Self {
        Self { raw, pos: 0 }
    }

    /// Current line without its terminator
    fn peek(&self) -> Option<&'a str> {
        if self.pos >= self.raw.len() {
            return None;
        }
        let rest = &self.raw[self.pos..];
        let line = rest.split('\n').next().unwrap_or(rest);
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    fn next(&mut self) {
        let rest = &self.raw[self.pos..];
        self.pos += match rest.find('\n') {
            Some(idx) => idx + 1,
            None => rest.len(),
        };
    }

    fn rest(&self) -> &'a str {
        &self.raw[self.pos.min(self.raw.len())..]
    }
}
