use std::fs::File;
use std::path::Path;

use connector_core::{ApiClient, ClientConfig, ConnectorError};
use reqwest::blocking::Response;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::query::{ListDatasetsQuery, ListDocumentsQuery};

const DATASETS_PATH: &str = "api/v1/datasets";

/// Client for the RAGFlow HTTP API.
#[derive(Clone, Debug)]
pub struct RagflowClient {
    api: ApiClient,
}

impl RagflowClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ConnectorError> {
        Ok(Self::from_api(ApiClient::new(config)?))
    }

    /// Creates a client using `RAGFLOW_API_KEY` and `RAGFLOW_BASE_URL`.
    pub fn from_env() -> Result<Self, ConnectorError> {
        Self::new(ClientConfig::from_env("RAGFLOW")?)
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self { api }
    }

    /// Lists datasets. The response body is returned as received.
    pub fn list_datasets(&self, query: &ListDatasetsQuery) -> Result<Value, ConnectorError> {
        self.api
            .get_json(DATASETS_PATH, query)
            .inspect_err(|e| log_failure("list_datasets", e))
    }

    /// Lists one page of documents in a dataset. The response body is returned
    /// as received; callers page through results themselves.
    pub fn list_documents(
        &self,
        dataset_id: &str,
        query: &ListDocumentsQuery,
    ) -> Result<Value, ConnectorError> {
        require_id("dataset_id", dataset_id)?;
        debug!(
            event = "ragflow.list_documents",
            domain = "ragflow",
            dataset_id = dataset_id,
            page = query.page,
            name = %query.name
        );
        self.api
            .get_json(&documents_path(dataset_id), query)
            .inspect_err(|e| log_failure("list_documents", e))
    }

    /// Id of the first document named exactly `name`, if any.
    pub fn find_document_id(
        &self,
        dataset_id: &str,
        name: &str,
    ) -> Result<Option<String>, ConnectorError> {
        let body = self.list_documents(dataset_id, &ListDocumentsQuery::default().name(name))?;
        check_envelope(&body).inspect_err(|e| log_failure("find_document_id", e))?;
        Ok(body
            .pointer("/data/docs/0/id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned))
    }

    /// Fetches a document. The raw response is returned so the caller decides
    /// how to read the body.
    pub fn download_document(
        &self,
        dataset_id: &str,
        document_id: &str,
    ) -> Result<Response, ConnectorError> {
        require_id("dataset_id", dataset_id)?;
        require_id("document_id", document_id)?;
        self.api
            .get(&document_path(dataset_id, document_id), &[] as &[(&str, &str)])
            .inspect_err(|e| log_failure("download_document", e))
    }

    /// Streams a document into `dest` and returns the number of bytes written.
    /// A partially written file is removed on failure.
    pub fn download_document_to(
        &self,
        dataset_id: &str,
        document_id: &str,
        dest: impl AsRef<Path>,
    ) -> Result<u64, ConnectorError> {
        let dest = dest.as_ref();
        let mut response = self.download_document(dataset_id, document_id)?;
        let dest_display = dest.display().to_string();
        let mut file = File::create(dest).map_err(|e| ConnectorError::io(&dest_display, &e))?;
        match response.copy_to(&mut file) {
            Ok(written) => {
                info!(
                    event = "ragflow.document_downloaded",
                    domain = "ragflow",
                    document_id = document_id,
                    path = %dest_display,
                    bytes = written
                );
                Ok(written)
            }
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(dest);
                let err = ConnectorError::from(e);
                log_failure("download_document_to", &err);
                Err(err)
            }
        }
    }

    /// Retrieval URL of a document.
    pub fn document_url(&self, dataset_id: &str, document_id: &str) -> String {
        self.api.endpoint(&document_path(dataset_id, document_id))
    }
}

fn documents_path(dataset_id: &str) -> String {
    format!("{DATASETS_PATH}/{dataset_id}/documents")
}

fn document_path(dataset_id: &str, document_id: &str) -> String {
    format!("{}/{document_id}", documents_path(dataset_id))
}

fn require_id(field: &str, value: &str) -> Result<(), ConnectorError> {
    if value.trim().is_empty() {
        return Err(ConnectorError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// RAGFlow wraps results as `{code, message, data}`; a non-zero code is a
/// rejection even when the HTTP status is 200.
pub(crate) fn check_envelope(body: &Value) -> Result<(), ConnectorError> {
    match body.get("code").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(ConnectorError::api(200, format!("code {code}: {message}")))
        }
    }
}

fn log_failure(operation: &str, err: &ConnectorError) {
    error!(
        event = "ragflow.request_failed",
        domain = "ragflow",
        operation = operation,
        code = err.kind(),
        status = ?err.status(),
        error = %err
    );
}
