//! Network layer for trawl
//!
//! URI resolution, raw response parsing, the response cache and the
//! transport that talks to the wire.

mod cache;
mod client;
mod request;
mod response;
pub mod uri;

pub use cache::{CacheStats, FileCache};
pub use client::{HttpTransport, ProxyConfig, RawResponse, Transport, TransportConfig};
pub use request::{Method, Request, RequestBody};
pub use response::{Diagnostic, ParsedResponse};
pub use uri::Uri;

#[cfg(test)]
pub use client::MockTransport;
