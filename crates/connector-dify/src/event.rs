use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata for a file attached to a message mid-stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub belongs_to: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Answer fragment carried by `message`, `agent_message` and `message_replace`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageChunk {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub answer: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MessageEnd {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default)]
    pub retriever_resources: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StreamFailure {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AgentThought {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WorkflowStarted {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub workflow_run_id: Option<String>,
}

/// Progress of one workflow node (`workflow_step_executing`, `node_started`, `node_finished`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NodeProgress {
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct WorkflowFinishedData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowFinished {
    pub task_id: Option<String>,
    pub workflow_run_id: Option<String>,
    pub data: WorkflowFinishedData,
    /// The whole terminal envelope as received.
    pub raw: Value,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    workflow_run_id: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Default, Deserialize)]
struct TextData {
    #[serde(default)]
    text: String,
}

/// One decoded `data:` line of a chat or workflow stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Message(MessageChunk),
    AgentMessage(MessageChunk),
    AgentThought(AgentThought),
    MessageFile(FileDescriptor),
    MessageReplace(MessageChunk),
    MessageEnd(MessageEnd),
    TtsMessage,
    TtsMessageEnd,
    Ping,
    Error(StreamFailure),
    WorkflowStarted(WorkflowStarted),
    WorkflowStepExecuting(NodeProgress),
    NodeStarted(NodeProgress),
    NodeFinished(NodeProgress),
    TextChunk { text: String },
    WorkflowFinished(WorkflowFinished),
    /// Any tag this client does not model, kept as received.
    Unknown { event: String, raw: Value },
}

impl StreamEvent {
    /// Decodes one stream payload.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(payload)?)
    }

    /// Decodes an already parsed envelope, dispatching on its `event` tag.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let tag = value
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let event = match tag.as_str() {
            "message" => Self::Message(MessageChunk::deserialize(&value)?),
            "agent_message" => Self::AgentMessage(MessageChunk::deserialize(&value)?),
            "agent_thought" => Self::AgentThought(AgentThought::deserialize(&value)?),
            "message_file" => Self::MessageFile(FileDescriptor::deserialize(&value)?),
            "message_replace" => Self::MessageReplace(MessageChunk::deserialize(&value)?),
            "message_end" => Self::MessageEnd(MessageEnd::deserialize(&value)?),
            "tts_message" => Self::TtsMessage,
            "tts_message_end" => Self::TtsMessageEnd,
            "ping" => Self::Ping,
            "error" => Self::Error(StreamFailure::deserialize(&value)?),
            "workflow_started" => {
                let envelope = Envelope::<Value>::deserialize(&value)?;
                Self::WorkflowStarted(WorkflowStarted {
                    task_id: envelope.task_id,
                    workflow_run_id: envelope.workflow_run_id,
                })
            }
            "workflow_step_executing" => Self::WorkflowStepExecuting(node_progress(&value)?),
            "node_started" => Self::NodeStarted(node_progress(&value)?),
            "node_finished" => Self::NodeFinished(node_progress(&value)?),
            "text_chunk" => {
                let envelope = Envelope::<TextData>::deserialize(&value)?;
                Self::TextChunk {
                    text: envelope.data.unwrap_or_default().text,
                }
            }
            "workflow_finished" => {
                let envelope = Envelope::<WorkflowFinishedData>::deserialize(&value)?;
                Self::WorkflowFinished(WorkflowFinished {
                    task_id: envelope.task_id,
                    workflow_run_id: envelope.workflow_run_id,
                    data: envelope.data.unwrap_or_default(),
                    raw: value,
                })
            }
            _ => Self::Unknown {
                event: tag,
                raw: value,
            },
        };
        Ok(event)
    }

    /// Wire tag of this event.
    pub fn name(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::AgentMessage(_) => "agent_message",
            Self::AgentThought(_) => "agent_thought",
            Self::MessageFile(_) => "message_file",
            Self::MessageReplace(_) => "message_replace",
            Self::MessageEnd(_) => "message_end",
            Self::TtsMessage => "tts_message",
            Self::TtsMessageEnd => "tts_message_end",
            Self::Ping => "ping",
            Self::Error(_) => "error",
            Self::WorkflowStarted(_) => "workflow_started",
            Self::WorkflowStepExecuting(_) => "workflow_step_executing",
            Self::NodeStarted(_) => "node_started",
            Self::NodeFinished(_) => "node_finished",
            Self::TextChunk { .. } => "text_chunk",
            Self::WorkflowFinished(_) => "workflow_finished",
            Self::Unknown { event, .. } => event,
        }
    }

    /// Whether this event ends accumulation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::MessageEnd(_) | Self::WorkflowFinished(_) | Self::Error(_)
        )
    }

    /// Text a consumer may print as progress, if the event carries any.
    pub fn progress_text(&self) -> Option<&str> {
        match self {
            Self::Message(chunk) | Self::AgentMessage(chunk) => Some(&chunk.answer),
            Self::TextChunk { text } => Some(text),
            _ => None,
        }
    }
}

fn node_progress(value: &Value) -> Result<NodeProgress, serde_json::Error> {
    Ok(Envelope::<NodeProgress>::deserialize(value)?
        .data
        .unwrap_or_default())
}
