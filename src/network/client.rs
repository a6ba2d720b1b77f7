//! HTTP transport
//!
//! The [`Transport`] trait is the seam between navigation logic and the
//! wire. [`HttpTransport`] implements it on a blocking reqwest client that
//! owns the cookie jar and follows wire-level redirects.

use super::request::{Method, Request, RequestBody};
use crate::utils::{
    error::{NetworkError, TrawlError},
    Result,
};
use reqwest::blocking::{multipart, Client};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::redirect::Policy;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Response text as received, with the URL it finally came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Effective URL after wire-level redirects
    pub url: String,
    /// Status line, headers, blank line and body
    pub text: String,
}

/// Forward proxy settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl FromStr for ProxyConfig {
    type Err = TrawlError;

    /// Parse `host:port` or `user:password@host:port`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TrawlError::Config(format!("invalid proxy `{s}`, expected host:port"));
        let (credentials, address) = match s.rsplit_once('@') {
            Some((credentials, address)) => (Some(credentials), address),
            None => (None, s),
        };
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }
        let proxy = Self::new(host, port);
        Ok(match credentials.map(|c| c.split_once(':').unwrap_or((c, ""))) {
            Some((user, password)) => proxy.with_credentials(user, password),
            None => proxy,
        })
    }
}

/// Settings forwarded untouched to the transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// User-Agent header
    pub user_agent: String,
    /// Request and connect timeout
    pub timeout: Option<Duration>,
    /// Forward proxy
    pub proxy: Option<ProxyConfig>,
    /// Headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Wire-level redirect cap
    pub max_redirects: usize,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("trawl/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
            proxy: None,
            headers: vec![
                (
                    "Accept-Charset".to_string(),
                    "ISO-8859-1,utf-8;q=0.7,*;q=0.7".to_string(),
                ),
                ("Accept-Language".to_string(), "en-us,en;q=0.5".to_string()),
            ],
            max_redirects: 10,
            accept_invalid_certs: false,
        }
    }
}

/// Executes requests on the wire
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Perform the request and return the raw response text
    fn execute(&mut self, request: &Request) -> Result<RawResponse>;

    /// Apply new transport settings
    fn configure(&mut self, config: &TransportConfig) -> Result<()>;
}

/// Blocking HTTP transport with a persistent cookie jar
pub struct HttpTransport {
    client: Client,
    cookies: Arc<Jar>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = build_client(config, Arc::clone(&cookies))?;
        Ok(Self { client, cookies })
    }
}

impl Transport for HttpTransport {
    fn execute(&mut self, request: &Request) -> Result<RawResponse> {
        let mut builder = match request.method() {
            Method::Get => self.client.get(request.url()),
            Method::Post => self.client.post(request.url()),
        };
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(referer) = request.referer_url() {
            builder = builder.header(REFERER, referer);
        }
        builder = match request.payload() {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Multipart(fields) => {
                let form = fields.iter().fold(multipart::Form::new(), |form, (name, value)| {
                    form.text(name.clone(), value.clone())
                });
                builder.multipart(form)
            }
        };

        log::debug!("{} {}", request.method().as_str(), request.url());
        let response = builder.send().map_err(transport_error)?;
        let url = response.url().to_string();
        let status = response.status();
        log::debug!("{} {} <- {}", status.as_u16(), url, request.url());

        let mut text = format!(
            "{:?} {} {}\r\n",
            response.version(),
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        );
        for (name, value) in response.headers() {
            text.push_str(name.as_str());
            text.push_str(": ");
            text.push_str(&String::from_utf8_lossy(value.as_bytes()));
            text.push_str("\r\n");
        }
        text.push_str("\r\n");
        text.push_str(&response.text().map_err(transport_error)?);

        Ok(RawResponse { url, text })
    }

    /// Rebuild the client; the cookie jar carries over
    fn configure(&mut self, config: &TransportConfig) -> Result<()> {
        self.client = build_client(config, Arc::clone(&self.cookies))?;
        Ok(())
    }
}

fn build_client(config: &TransportConfig, cookies: Arc<Jar>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TrawlError::Config(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TrawlError::Config(format!("invalid value for `{name}`: {e}")))?;
        headers.insert(name, value);
    }

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .cookie_provider(cookies)
        .redirect(Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout).connect_timeout(timeout);
    }
    if let Some(proxy) = &config.proxy {
        let mut wire_proxy = reqwest::Proxy::all(proxy.url())
            .map_err(|e| TrawlError::Config(format!("invalid proxy: {e}")))?;
        if let Some(user) = &proxy.user {
            wire_proxy = wire_proxy.basic_auth(user, proxy.password.as_deref().unwrap_or_default());
        }
        builder = builder.proxy(wire_proxy);
    }

    builder
        .build()
        .map_err(|e| TrawlError::Config(format!("failed to build HTTP client: {e}")))
}

fn transport_error(err: reqwest::Error) -> TrawlError {
    if err.is_timeout() {
        NetworkError::Timeout.into()
    } else {
        NetworkError::Transport(err.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_from_host_port() {
        let proxy: ProxyConfig = "proxy.local:3128".parse().unwrap();
        assert_eq!(proxy, ProxyConfig::new("proxy.local", 3128));
        assert_eq!(proxy.url(), "http://proxy.local:3128");
    }

    #[test]
    fn test_proxy_with_credentials() {
        let proxy: ProxyConfig = "bob:s3cret@10.0.0.1:8080".parse().unwrap();
        assert_eq!(proxy.user.as_deref(), Some("bob"));
        assert_eq!(proxy.password.as_deref(), Some("s3cret"));
        assert_eq!(proxy.host, "10.0.0.1");
    }

    #[test]
    fn test_proxy_rejects_missing_port() {
        assert!("proxy.local".parse::<ProxyConfig>().is_err());
        assert!(":80".parse::<ProxyConfig>().is_err());
    }

    #[test]
    fn test_transport_builds_with_defaults() {
        let transport = HttpTransport::new(&TransportConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_invalid_default_header_is_config_error() {
        let config = TransportConfig {
            headers: vec![("Bad Header".to_string(), "x".to_string())],
            ..TransportConfig::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(TrawlError::Config(_))
        ));
    }
}
