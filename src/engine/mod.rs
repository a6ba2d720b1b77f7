//! Browsing session orchestrating navigation
//!
//! A [`Session`] drives one browsing sequence:
//! 1. Build a request, carrying the previous page as `Referer`
//! 2. Answer it from the file cache or the transport
//! 3. Parse the raw response into a [`Page`]
//! 4. Follow `<meta http-equiv="refresh">` redirects up to a hop limit

mod config;
mod form;
mod page;

pub use config::{CacheConfig, ParserMode, ProxyConfig, SessionConfig, TransportConfig};
pub use form::Form;
pub use page::Page;

use crate::network::uri::append_query;
use crate::network::{
    CacheStats, FileCache, HttpTransport, Request, RequestBody, Transport, Uri,
};
use crate::utils::{error::NetworkError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use url::form_urlencoded;

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*http-equiv=["']?refresh["']?[^>]*"#)
        .expect("hardcoded regex pattern is valid")
});
static REFRESH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url=([^ "'>]+)"#).expect("hardcoded regex pattern is valid")
});

/// Status line put in front of offline documents
const OFFLINE_STATUS: &str = "HTTP/1.1 200 OK\r\n\r\n";

/// A browsing session: transport, cache and navigation history
pub struct Session {
    config: SessionConfig,
    transport: Box<dyn Transport>,
    cache: FileCache,
    last_url: Option<String>,
    last_error: Option<String>,
    visited: HashSet<String>,
}

impl Session {
    /// Create a session on the HTTP transport
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.transport)?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Create a session on a caller-supplied transport
    pub fn with_transport(config: SessionConfig, transport: Box<dyn Transport>) -> Self {
        let cache = FileCache::new(&config.cache.directory, config.cache.expire_after());
        Self {
            config,
            transport,
            cache,
            last_url: None,
            last_error: None,
            visited: HashSet::new(),
        }
    }

    /// Create a session with default settings and the named parser (`html`, `xml`, `auto`)
    pub fn from_parser_mode(mode: &str) -> Result<Self> {
        Self::new(SessionConfig::with_parser_mode(mode)?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// GET `url`, with `params` url-encoded onto its query
    pub fn get(&mut self, url: &str, params: &[(&str, &str)]) -> Result<Page> {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let request = Request::get(append_query(url, &query))?;
        self.navigate(request)
    }

    /// POST `body` to `url` with extra request headers
    pub fn post(&mut self, url: &str, body: RequestBody, headers: &[(String, String)]) -> Result<Page> {
        let request = headers
            .iter()
            .fold(Request::post(url)?, |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            })
            .body(body);
        self.navigate(request)
    }

    /// Build a page from markup without touching the network
    pub fn load(&mut self, url: &str, html: &str) -> Page {
        let page = Page::parse(url, &format!("{OFFLINE_STATUS}{html}"), &self.config);
        self.last_url = Some(page.url().to_string());
        page
    }

    /// Build a page from a raw response saved on disk
    ///
    /// The file holds what the transport would have returned: status line,
    /// headers, a blank line, then the body.
    pub fn mock(&mut self, url: &str, path: impl AsRef<Path>) -> Result<Page> {
        let raw = fs::read_to_string(path)?;
        let page = Page::parse(url, &raw, &self.config);
        self.last_url = Some(page.url().to_string());
        Ok(page)
    }

    fn navigate(&mut self, request: Request) -> Result<Page> {
        let mut request = match &self.last_url {
            Some(referer) => request.referer(referer.as_str()),
            None => request,
        };
        let mut hops = 0;

        loop {
            let (url, raw) = self.fetch(&request)?;
            let page = Page::parse(&url, &raw, &self.config);

            let target = if self.config.follow_meta_refresh {
                meta_refresh_target(page.body())
            } else {
                None
            };
            let Some(target) = target else {
                self.last_url = Some(page.url().to_string());
                return Ok(page);
            };

            if hops == self.config.max_meta_refreshes {
                let err = NetworkError::TooManyRefreshes {
                    url,
                    limit: self.config.max_meta_refreshes,
                };
                self.last_error = Some(err.to_string());
                return Err(err.into());
            }
            hops += 1;

            let next = Uri::parse(&url).join(&target);
            log::info!("meta refresh {url} -> {next}");
            request = request.redirect(next)?;
        }
    }

    /// Raw response for `request` and the URL it came from
    fn fetch(&mut self, request: &Request) -> Result<(String, String)> {
        let key = FileCache::key(&request.cache_identity());
        if self.config.cache.enabled {
            if let Some(raw) = self.cached(&key) {
                log::debug!("cache hit for {}", request.url());
                return Ok((request.url().to_string(), raw));
            }
            log::debug!("cache miss for {}", request.url());
        }

        let response = match self.transport.execute(request) {
            Ok(response) => response,
            Err(err) => {
                log::warn!("{} {} failed: {err}", request.method().as_str(), request.url());
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        if self.config.cache.enabled {
            match self.cache.write(&key, &response.text) {
                Ok(()) => log::debug!("cached {}", request.url()),
                Err(err) => log::warn!("could not cache {}: {err}", request.url()),
            }
        }
        Ok((response.url, response.text))
    }

    fn cached(&self, key: &str) -> Option<String> {
        self.cache.get(key).unwrap_or_else(|err| {
            log::warn!("cache read failed for {key}: {err}");
            None
        })
    }

    /// Whether `url` was seen before; records it if not
    pub fn visited(&mut self, url: &str) -> bool {
        !self.visited.insert(url.to_string())
    }

    /// URL of the last completed navigation
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    /// Text of the last navigation failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_cache(&mut self, cache: CacheConfig) {
        self.cache = FileCache::new(&cache.directory, cache.expire_after());
        self.config.cache = cache;
    }

    /// Whether a GET of `url` has a cache entry
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache.exists(&FileCache::key(url))
    }

    /// Whether the cache entry for `url` is stale, deleting it if so
    pub fn cache_expired(&self, url: &str) -> Result<bool> {
        self.cache.is_expired(&FileCache::key(url))
    }

    pub fn delete_cache(&self, url: &str) -> Result<()> {
        self.cache.delete(&FileCache::key(url))
    }

    /// Remove every cache entry, returning how many were deleted
    pub fn clear_cache(&self) -> Result<usize> {
        self.cache.clear()
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    pub fn set_parser_mode(&mut self, mode: ParserMode) {
        self.config.parser_mode = mode;
    }

    pub fn set_follow_meta_refresh(&mut self, follow: bool) {
        self.config.follow_meta_refresh = follow;
    }

    pub fn set_convert_urls(&mut self, convert: bool) {
        self.config.convert_urls = convert;
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> Result<()> {
        self.config.transport.user_agent = user_agent.into();
        self.reconfigure()
    }

    /// Request and connect timeout in milliseconds
    pub fn set_timeout(&mut self, millis: u64) -> Result<()> {
        self.config.transport.timeout = Some(Duration::from_millis(millis));
        self.reconfigure()
    }

    pub fn set_proxy(&mut self, proxy: Option<ProxyConfig>) -> Result<()> {
        self.config.transport.proxy = proxy;
        self.reconfigure()
    }

    /// Replace the headers sent with every request
    pub fn set_headers(&mut self, headers: Vec<(String, String)>) -> Result<()> {
        self.config.transport.headers = headers;
        self.reconfigure()
    }

    fn reconfigure(&mut self) -> Result<()> {
        self.transport.configure(&self.config.transport)
    }
}

/// Target of the first `<meta http-equiv="refresh">` tag, `&amp;` decoded
fn meta_refresh_target(body: &str) -> Option<String> {
    let tag = META_REFRESH.find(body)?;
    let caps = REFRESH_URL.captures(tag.as_str())?;
    Some(caps[1].replace("&amp;", "&"))
}
