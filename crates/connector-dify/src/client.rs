use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use connector_core::http::api_error;
use connector_core::{ApiClient, ClientConfig, ConnectorError, DataLines};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{error, info};

use crate::accumulate::{ChatAccumulator, ChatAnswer, WorkflowAccumulator, WorkflowRun, consume};
use crate::event::StreamEvent;
use crate::request::{ChatRequest, WorkflowRequest};
use crate::upload::{build_form, upload_extension};

/// Deadline for a blocking-mode chat or workflow run, response body included.
/// Streamed runs are bounded per read by `ClientConfig::stream_timeout`.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(60);

const UPLOAD_PATH: &str = "files/upload";
const CHAT_PATH: &str = "chat-messages";
const WORKFLOW_PATH: &str = "workflows/run";

/// Result of a workflow run, shaped by the requested response mode.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowOutput {
    /// Blocking mode: the response body, untouched.
    Blocking { raw: Value },
    /// Streaming mode: the folded stream.
    Streamed(WorkflowRun),
}

/// Client for one Dify app (chat, workflow and file upload endpoints).
#[derive(Clone, Debug)]
pub struct DifyClient {
    api: ApiClient,
}

impl DifyClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ConnectorError> {
        Ok(Self::from_api(ApiClient::new(config)?))
    }

    /// Creates a client using `DIFY_API_KEY` and `DIFY_BASE_URL`.
    pub fn from_env() -> Result<Self, ConnectorError> {
        Self::new(ClientConfig::from_env("DIFY")?)
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self { api }
    }

    /// Uploads a local document and returns the id the platform assigned.
    ///
    /// The extension is checked against the allow-list before the file is
    /// opened, so a rejected file never causes a network call.
    pub fn upload_file(&self, path: impl AsRef<Path>, user: &str) -> Result<String, ConnectorError> {
        let path = path.as_ref();
        info!(event = "dify.upload_started", domain = "dify", path = %path.display());
        self.upload_inner(path, user)
            .inspect(|file_id| {
                info!(event = "dify.upload_succeeded", domain = "dify", file_id = %file_id);
            })
            .inspect_err(|e| log_failure("upload_file", e))
    }

    fn upload_inner(&self, path: &Path, user: &str) -> Result<String, ConnectorError> {
        let extension = upload_extension(path)?;
        let form = build_form(path, &extension, user)?;
        let response = self.api.post_multipart(UPLOAD_PATH, form)?;
        if response.status() != StatusCode::CREATED {
            return Err(api_error(response));
        }
        let body: Value = response
            .json()
            .map_err(|e| ConnectorError::Decode(format!("upload response is not JSON: {e}")))?;
        body.get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| ConnectorError::Decode(format!("upload response has no id: {body}")))
    }

    /// Sends a chat message and returns the final answer.
    pub fn chat(&self, request: &ChatRequest) -> Result<ChatAnswer, ConnectorError> {
        self.chat_with(request, |_| {})
    }

    /// Like [`chat`](Self::chat), calling `observer` with every streamed event.
    pub fn chat_with<F>(&self, request: &ChatRequest, observer: F) -> Result<ChatAnswer, ConnectorError>
    where
        F: FnMut(&StreamEvent),
    {
        info!(
            event = "dify.chat_started",
            domain = "dify",
            streaming = request.response_mode.is_streaming(),
            conversation_id = request.conversation_id.as_deref().unwrap_or("")
        );
        self.chat_inner(request, observer)
            .inspect_err(|e| log_failure("chat", e))
    }

    fn chat_inner<F>(&self, request: &ChatRequest, observer: F) -> Result<ChatAnswer, ConnectorError>
    where
        F: FnMut(&StreamEvent),
    {
        if request.query.trim().is_empty() {
            return Err(ConnectorError::Validation("chat query must not be empty".into()));
        }
        if !request.response_mode.is_streaming() {
            let body: Value = self
                .api
                .post_json(CHAT_PATH, request, RUN_TIMEOUT)?
                .json()
                .map_err(|e| ConnectorError::Decode(format!("chat response is not JSON: {e}")))?;
            return Ok(ChatAnswer::from_blocking(&body));
        }
        let response = self.api.post_json_stream(CHAT_PATH, request)?;
        let lines = DataLines::new(BufReader::new(response));
        consume(lines, ChatAccumulator::new(), observer)
    }

    /// Runs the app's workflow.
    pub fn run_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowOutput, ConnectorError> {
        self.run_workflow_with(request, |_| {})
    }

    /// Like [`run_workflow`](Self::run_workflow), calling `observer` with every
    /// streamed event.
    pub fn run_workflow_with<F>(
        &self,
        request: &WorkflowRequest,
        observer: F,
    ) -> Result<WorkflowOutput, ConnectorError>
    where
        F: FnMut(&StreamEvent),
    {
        info!(
            event = "dify.workflow_requested",
            domain = "dify",
            streaming = request.response_mode.is_streaming(),
            inputs = request.inputs.len() as u64
        );
        self.run_workflow_inner(request, observer)
            .inspect_err(|e| log_failure("run_workflow", e))
    }

    fn run_workflow_inner<F>(
        &self,
        request: &WorkflowRequest,
        observer: F,
    ) -> Result<WorkflowOutput, ConnectorError>
    where
        F: FnMut(&StreamEvent),
    {
        if !request.response_mode.is_streaming() {
            let response = self.api.post_json(WORKFLOW_PATH, request, RUN_TIMEOUT)?;
            let raw: Value = response.json().map_err(|e| {
                ConnectorError::Decode(format!("workflow response is not JSON: {e}"))
            })?;
            info!(event = "dify.workflow_finished", domain = "dify", streaming = false);
            return Ok(WorkflowOutput::Blocking { raw });
        }
        let response = self.api.post_json_stream(WORKFLOW_PATH, request)?;
        let lines = DataLines::new(BufReader::new(response));
        consume(lines, WorkflowAccumulator::new(), observer).map(WorkflowOutput::Streamed)
    }
}

fn log_failure(operation: &str, err: &ConnectorError) {
    error!(
        event = "dify.request_failed",
        domain = "dify",
        operation = operation,
        code = err.kind(),
        status = ?err.status(),
        error = %err
    );
}
