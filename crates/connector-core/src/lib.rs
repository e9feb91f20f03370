//! Shared plumbing for the Dify and RAGFlow connectors.
//!
//! Both platforms are plain bearer-token REST services. This crate holds the
//! pieces they have in common: credentials, the blocking HTTP wrapper, the
//! error taxonomy, and the `data:` line reader used for streamed responses.

/// Client credentials and endpoint configuration.
pub mod config;
/// Error type shared by every connector operation.
pub mod errors;
/// Authenticated blocking HTTP wrapper.
pub mod http;
/// Log subscriber setup for the command-line binary.
pub mod observability;
/// Line reader for `data:`-prefixed event streams.
pub mod sse;

pub use config::ClientConfig;
pub use errors::ConnectorError;
pub use http::ApiClient;
pub use observability::{init_observability, verbosity_level};
pub use sse::DataLines;

/// Result alias used throughout the connector crates.
pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;
