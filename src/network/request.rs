//! HTTP request types

use crate::utils::{error::NetworkError, Result};
use url::Url;

/// HTTP methods a page navigation can use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Pre-encoded body sent as-is
    Text(String),
    /// Field mapping the transport encodes as `multipart/form-data`
    Multipart(Vec<(String, String)>),
}

impl RequestBody {
    /// Stable text form of the payload, used in cache keys
    pub fn identity(&self) -> String {
        match self {
            RequestBody::Empty => String::new(),
            RequestBody::Text(text) => text.clone(),
            RequestBody::Multipart(fields) => fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

/// HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: RequestBody,
    referer: Option<String>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let parsed = Url::parse(&url).map_err(|_| NetworkError::InvalidUrl(url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl(url).into());
        }
        Ok(Self {
            method,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
            referer: None,
        })
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Result<Self> {
        Self::new(Method::Post, url)
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set the page this request navigates away from
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Same request aimed at another URL
    pub fn redirect(&self, url: impl Into<String>) -> Result<Self> {
        let target = Self::new(self.method, url)?;
        Ok(Self {
            url: target.url,
            ..self.clone()
        })
    }

    /// Get the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get headers in the order they were added
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn payload(&self) -> &RequestBody {
        &self.body
    }

    pub fn referer_url(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// What identifies this request in the response cache
    pub fn cache_identity(&self) -> String {
        match self.method {
            Method::Get => self.url.clone(),
            Method::Post => format!("{}{}", self.url, self.body.identity()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(Request::get("ftp://example.com/file").is_err());
        assert!(Request::get("not a url").is_err());
        assert!(Request::get("https://example.com/").is_ok());
    }

    #[test]
    fn test_cache_identity_includes_post_body() {
        let get = Request::get("http://x/s").unwrap();
        assert_eq!(get.cache_identity(), "http://x/s");

        let post = Request::post("http://x/s")
            .unwrap()
            .body(RequestBody::Text("a=1".to_string()));
        assert_eq!(post.cache_identity(), "http://x/sa=1");
    }

    #[test]
    fn test_redirect_keeps_method_and_body() {
        let post = Request::post("http://x/form")
            .unwrap()
            .header("X-Token", "t")
            .body(RequestBody::Text("a=1".to_string()))
            .referer("http://x/");
        let moved = post.redirect("http://x/next").unwrap();
        assert_eq!(moved.url(), "http://x/next");
        assert_eq!(moved.method(), Method::Post);
        assert_eq!(moved.payload(), post.payload());
        assert_eq!(moved.headers(), post.headers());
        assert_eq!(moved.referer_url(), Some("http://x/"));
        assert!(post.redirect("javascript:void(0)").is_err());
    }

    #[test]
    fn test_multipart_identity_is_ordered() {
        let body = RequestBody::Multipart(vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        assert_eq!(body.identity(), "b=2&a=1");
    }
}
