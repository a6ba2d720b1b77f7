//! Error types for trawl

use thiserror::Error;

/// Main error type for trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    /// Form submission errors
    #[error("Form error: {0}")]
    Form(#[from] FormError),
    /// Document query/rendering errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
    /// I/O errors (cache files, mock files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Network-specific errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The transport could not complete the request
    #[error("transport failure: {0}")]
    Transport(String),
    /// Connection timed out
    #[error("request timed out")]
    Timeout,
    /// Invalid URL
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),
    /// Meta-refresh chain longer than the configured limit
    #[error("meta-refresh limit of {limit} exceeded at {url}")]
    TooManyRefreshes { url: String, limit: usize },
}

/// Form submission errors
#[derive(Debug, Error)]
pub enum FormError {
    /// Form method is neither `get` nor `post`
    #[error("unknown form method `{0}`")]
    UnknownMethod(String),
    /// A postback attribute without an event target and argument
    #[error("expected two quoted postback arguments in `{0}`")]
    PostBackArguments(String),
}

/// Rendering-specific errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// XPath or CSS query could not be parsed
    #[error("invalid selector `{0}`")]
    Selector(String),
}

/// Convenience Result type for trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;
