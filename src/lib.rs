//! # Trawl - Programmatic Web Browsing
//!
//! Issues HTTP requests, parses raw responses into pages, extracts forms
//! for resubmission and resolves relative links against a base URI.
//!
//! ## Architecture
//!
//! The crate is organized into the following core modules:
//!
//! - **engine**: Session, pages and forms orchestrating navigation
//! - **network**: URI resolution, response parsing, HTTP transport and cache
//! - **renderer**: HTML/XML document trees, queries and serialization
//! - **utils**: Shared utilities and error types
//!
//! ```no_run
//! use trawl::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default())?;
//! let page = session.get("https://example.com/search", &[("q", "rust")])?;
//! println!("{}", page.title());
//! # Ok::<(), trawl::TrawlError>(())
//! ```

pub mod engine;
pub mod network;
pub mod renderer;
pub mod utils;

// Re-export main types for convenience
pub use engine::{Form, Page, Session, SessionConfig};
pub use utils::error::{Result, TrawlError};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Trawl";
