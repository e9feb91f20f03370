//! Blocking client for a Dify app: document upload, chat messages and
//! workflow runs, in blocking or streaming response mode.
//!
//! # Usage
//!
//! ```no_run
//! use connector_core::ClientConfig;
//! use connector_dify::{ChatRequest, DifyClient, WorkflowRequest};
//!
//! # fn main() -> Result<(), connector_core::ConnectorError> {
//! let dify = DifyClient::new(ClientConfig::new("app-xxxx", "http://dify.local/v1"))?;
//!
//! let answer = dify.chat_with(&ChatRequest::new("hello"), |event| {
//!     if let Some(text) = event.progress_text() {
//!         print!("{text}");
//!     }
//! })?;
//! println!("\nconversation: {:?}", answer.conversation_id);
//!
//! let file_id = dify.upload_file("report.xlsx", "alice")?;
//! let run = dify.run_workflow(&WorkflowRequest::for_uploaded_document(file_id))?;
//! println!("{run:?}");
//! # Ok(())
//! # }
//! ```

/// Stream accumulators and their results.
pub mod accumulate;
/// `DifyClient` and its operations.
pub mod client;
/// Decoded stream events.
pub mod event;
/// Chat and workflow request bodies.
pub mod request;
/// Upload allow-list and multipart body.
pub mod upload;

pub use accumulate::{Accumulator, ChatAccumulator, ChatAnswer, Step, WorkflowAccumulator, WorkflowRun};
pub use client::{DifyClient, RUN_TIMEOUT, WorkflowOutput};
pub use event::{FileDescriptor, StreamEvent};
pub use request::{ChatRequest, ResponseMode, WorkflowRequest, uploaded_document};
pub use upload::ALLOWED_EXTENSIONS;
