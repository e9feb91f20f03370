//! Helpers built on top of the Dify and RAGFlow clients.

pub mod cite;

pub use cite::{CitedDocuments, DocumentLookup, resolve_document_links};
