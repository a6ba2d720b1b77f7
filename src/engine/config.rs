//! Session configuration

use crate::utils::{Result, TrawlError};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use crate::network::{ProxyConfig, TransportConfig};

/// Which tree parser pages go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserMode {
    Html,
    Xml,
    /// XML when the response declares an XML content type, HTML otherwise
    #[default]
    Auto,
}

impl ParserMode {
    /// Whether a response with this content type is parsed as XML
    ///
    /// `Auto` looks for `xml` anywhere in the content type, ignoring case.
    pub fn is_xml(self, content_type: Option<&str>) -> bool {
        match self {
            ParserMode::Html => false,
            ParserMode::Xml => true,
            ParserMode::Auto => content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("xml")),
        }
    }
}

impl FromStr for ParserMode {
    type Err = TrawlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(ParserMode::Auto),
            "html" => Ok(ParserMode::Html),
            "xml" => Ok(ParserMode::Xml),
            other => Err(TrawlError::Config(format!(
                "unknown parser `{other}`, expected html, xml or auto"
            ))),
        }
    }
}

/// On-disk response cache settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in seconds, 0 keeps entries forever
    pub expire_after_secs: u64,
    pub directory: PathBuf,
}

impl CacheConfig {
    pub fn expire_after(&self) -> Option<Duration> {
        (self.expire_after_secs > 0).then(|| Duration::from_secs(self.expire_after_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            expire_after_secs: 0,
            directory: PathBuf::from("cache"),
        }
    }
}

/// Everything a [`Session`](super::Session) is configured with
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub parser_mode: ParserMode,
    /// Follow `<meta http-equiv="refresh">` redirects
    pub follow_meta_refresh: bool,
    /// Rewrite `img[src]` and `a[href]` to absolute URLs
    pub convert_urls: bool,
    /// Meta-refresh hops allowed per navigation
    pub max_meta_refreshes: usize,
    /// Replace the `&nbsp;` entity with a space before parsing
    pub replace_nbsp: bool,
    pub cache: CacheConfig,
    pub transport: TransportConfig,
}

impl SessionConfig {
    /// Default configuration with the parser picked from a string
    pub fn with_parser_mode(mode: &str) -> Result<Self> {
        Ok(Self {
            parser_mode: mode.parse()?,
            ..Self::default()
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            parser_mode: ParserMode::Auto,
            follow_meta_refresh: true,
            convert_urls: false,
            max_meta_refreshes: 10,
            replace_nbsp: true,
            cache: CacheConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}
