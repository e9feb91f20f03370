//! Blocking client for RAGFlow datasets and documents.
//!
//! Listing calls return the service's JSON untouched; the schema belongs to
//! RAGFlow and is not modelled here beyond the `{code, message, data}`
//! envelope needed to look a document up by name.

pub mod client;
pub mod query;

pub use client::RagflowClient;
pub use query::{ListDatasetsQuery, ListDocumentsQuery};
