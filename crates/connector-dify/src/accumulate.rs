//! Folding of decoded stream events into a final chat answer or workflow run.
//!
//! An accumulator starts out collecting and moves to a terminal state on the
//! first terminal event; [`consume`] stops reading the stream at that point.

use std::io::BufRead;

use connector_core::{ConnectorError, DataLines};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::event::{FileDescriptor, StreamEvent};

/// Outcome of applying one event.
#[derive(Debug)]
pub enum Step<T> {
    /// Keep reading.
    Continue,
    /// A terminal event was seen; this is the final result.
    Done(Result<T, ConnectorError>),
}

/// State folded over a stream of events.
pub trait Accumulator {
    type Output;

    /// Applies one event in stream order.
    fn apply(&mut self, event: StreamEvent) -> Step<Self::Output>;

    /// Called when the stream is exhausted without a terminal event.
    fn finish(self) -> Result<Self::Output, ConnectorError>;
}

/// Drives `accumulator` over the `data:` lines of `lines`.
///
/// `observer` sees every decoded event before it is applied; it is the hook for
/// printing progress. Lines that fail to decode are logged and skipped.
pub fn consume<R, A, F>(
    lines: DataLines<R>,
    mut accumulator: A,
    mut observer: F,
) -> Result<A::Output, ConnectorError>
where
    R: BufRead,
    A: Accumulator,
    F: FnMut(&StreamEvent),
{
    for line in lines {
        let payload = line?;
        let decoded = match StreamEvent::from_json(&payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    event = "dify.stream_line_skipped",
                    domain = "dify",
                    error = %e,
                    payload = %payload,
                    "failed to decode stream line"
                );
                continue;
            }
        };
        observer(&decoded);
        if let Step::Done(result) = accumulator.apply(decoded) {
            return result;
        }
    }
    accumulator.finish()
}

/// Final result of a chat-message run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub text: String,
    pub message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub files: Vec<FileDescriptor>,
    pub metadata: Option<Value>,
    pub usage: Option<Value>,
    pub retriever_resources: Option<Value>,
    /// `false` when the stream ended before `message_end`; the answer is then
    /// whatever had been accumulated.
    pub completed: bool,
}

impl ChatAnswer {
    /// Maps a blocking-mode chat response body.
    pub fn from_blocking(body: &Value) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(ToOwned::to_owned);
        let metadata = body.get("metadata").cloned().filter(|m| !m.is_null());
        Self {
            text: text("answer").unwrap_or_default(),
            message_id: text("message_id").or_else(|| text("id")),
            conversation_id: text("conversation_id"),
            files: Vec::new(),
            usage: metadata_field(metadata.as_ref(), "usage"),
            retriever_resources: metadata_field(metadata.as_ref(), "retriever_resources"),
            metadata,
            completed: true,
        }
    }
}

fn metadata_field(metadata: Option<&Value>, key: &str) -> Option<Value> {
    metadata
        .and_then(|m| m.get(key))
        .filter(|v| !v.is_null())
        .cloned()
}

/// Accumulator for `/chat-messages` streams.
#[derive(Debug, Default)]
pub struct ChatAccumulator {
    answer: ChatAnswer,
}

impl ChatAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_ids(&mut self, message_id: Option<String>, conversation_id: Option<String>) {
        if message_id.is_some() {
            self.answer.message_id = message_id;
        }
        if conversation_id.is_some() {
            self.answer.conversation_id = conversation_id;
        }
    }
}

impl Accumulator for ChatAccumulator {
    type Output = ChatAnswer;

    fn apply(&mut self, event: StreamEvent) -> Step<ChatAnswer> {
        match event {
            StreamEvent::Message(chunk) | StreamEvent::AgentMessage(chunk) => {
                self.answer.text.push_str(&chunk.answer);
                self.record_ids(chunk.message_id, chunk.conversation_id);
            }
            StreamEvent::MessageFile(file) => self.answer.files.push(file),
            StreamEvent::MessageReplace(chunk) => {
                debug!(
                    event = "dify.chat_answer_replaced",
                    domain = "dify",
                    replaced_len = self.answer.text.len() as u64
                );
                self.answer.text = chunk.answer;
            }
            StreamEvent::MessageEnd(end) => {
                self.record_ids(end.message_id, end.conversation_id);
                let mut answer = std::mem::take(&mut self.answer);
                answer.usage = end
                    .usage
                    .or_else(|| metadata_field(end.metadata.as_ref(), "usage"));
                answer.retriever_resources = end
                    .retriever_resources
                    .or_else(|| metadata_field(end.metadata.as_ref(), "retriever_resources"));
                answer.metadata = end.metadata;
                answer.completed = true;
                info!(
                    event = "dify.chat_completed",
                    domain = "dify",
                    message_id = answer.message_id.as_deref().unwrap_or("unknown"),
                    answer_len = answer.text.len() as u64,
                    files = answer.files.len() as u64
                );
                return Step::Done(Ok(answer));
            }
            StreamEvent::Error(failure) => {
                let message = failure.message.unwrap_or_default();
                return Step::Done(Err(ConnectorError::StreamError { message }));
            }
            StreamEvent::AgentThought(thought) => {
                debug!(
                    event = "dify.agent_thought",
                    domain = "dify",
                    tool = thought.tool.as_deref().unwrap_or("")
                );
            }
            StreamEvent::Unknown { event, .. } => {
                debug!(event = "dify.stream_event_ignored", domain = "dify", tag = %event);
            }
            _ => {}
        }
        Step::Continue
    }

    fn finish(self) -> Result<ChatAnswer, ConnectorError> {
        warn!(
            event = "dify.chat_stream_exhausted",
            domain = "dify",
            answer_len = self.answer.text.len() as u64,
            "chat stream ended without message_end; returning partial answer"
        );
        Ok(self.answer)
    }
}

/// Final result of a streamed workflow run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WorkflowRun {
    pub workflow_run_id: Option<String>,
    pub task_id: Option<String>,
    /// Run status reported by the platform (`succeeded`, `failed`, `stopped`).
    pub status: Option<String>,
    pub outputs: Value,
    pub error: Option<String>,
    /// Concatenated `text_chunk` fragments seen before the run finished.
    pub streamed_text: String,
    /// The `workflow_finished` envelope as received.
    pub raw: Value,
}

impl WorkflowRun {
    /// The conventional `text` output of the workflow, if present.
    pub fn text(&self) -> Option<&str> {
        self.outputs.get("text").and_then(Value::as_str)
    }
}

/// Accumulator for `/workflows/run` streams.
#[derive(Debug, Default)]
pub struct WorkflowAccumulator {
    workflow_run_id: Option<String>,
    task_id: Option<String>,
    streamed_text: String,
}

impl WorkflowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for WorkflowAccumulator {
    type Output = WorkflowRun;

    fn apply(&mut self, event: StreamEvent) -> Step<WorkflowRun> {
        match event {
            StreamEvent::WorkflowStarted(started) => {
                info!(
                    event = "dify.workflow_started",
                    domain = "dify",
                    workflow_run_id = started.workflow_run_id.as_deref().unwrap_or("unknown")
                );
                self.workflow_run_id = started.workflow_run_id;
                self.task_id = started.task_id;
            }
            StreamEvent::WorkflowStepExecuting(node)
            | StreamEvent::NodeStarted(node)
            | StreamEvent::NodeFinished(node) => {
                debug!(
                    event = "dify.workflow_node",
                    domain = "dify",
                    node_id = node.node_id.as_deref().unwrap_or("unknown"),
                    title = node.title.as_deref().unwrap_or(""),
                    status = node.status.as_deref().unwrap_or("")
                );
            }
            StreamEvent::TextChunk { text } => self.streamed_text.push_str(&text),
            StreamEvent::WorkflowFinished(finished) => {
                let run = WorkflowRun {
                    workflow_run_id: finished
                        .workflow_run_id
                        .or(finished.data.id)
                        .or(self.workflow_run_id.take()),
                    task_id: finished.task_id.or(self.task_id.take()),
                    status: finished.data.status,
                    outputs: finished.data.outputs.unwrap_or(Value::Null),
                    error: finished.data.error,
                    streamed_text: std::mem::take(&mut self.streamed_text),
                    raw: finished.raw,
                };
                info!(
                    event = "dify.workflow_finished",
                    domain = "dify",
                    workflow_run_id = run.workflow_run_id.as_deref().unwrap_or("unknown"),
                    status = run.status.as_deref().unwrap_or("unknown")
                );
                return Step::Done(Ok(run));
            }
            StreamEvent::Error(failure) => {
                let message = failure.message.unwrap_or_default();
                return Step::Done(Err(ConnectorError::StreamError { message }));
            }
            _ => {}
        }
        Step::Continue
    }

    fn finish(self) -> Result<WorkflowRun, ConnectorError> {
        Err(ConnectorError::Incomplete(format!(
            "workflow stream ended without workflow_finished (run={})",
            self.workflow_run_id.as_deref().unwrap_or("unknown")
        )))
    }
}
