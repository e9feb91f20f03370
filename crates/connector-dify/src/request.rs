use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User identifier sent when the caller does not set one.
pub const DEFAULT_USER: &str = "user";

/// How the platform should deliver the response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One JSON document once the run is complete.
    Blocking,
    /// `data:` lines delivered as the run progresses.
    #[default]
    Streaming,
}

impl ResponseMode {
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

/// Reference to a file previously returned by `upload_file`, in the shape
/// workflow and chat inputs expect.
pub fn uploaded_document(file_id: impl Into<String>) -> Value {
    serde_json::json!({
        "type": "document",
        "transfer_method": "local_file",
        "upload_file_id": file_id.into(),
    })
}

/// Body of `POST /chat-messages`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub inputs: Map<String, Value>,
    pub query: String,
    pub response_mode: ResponseMode,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Value>,
}

impl ChatRequest {
    /// Creates a streaming request for `query` with empty inputs.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            inputs: Map::new(),
            query: query.into(),
            response_mode: ResponseMode::default(),
            user: DEFAULT_USER.to_string(),
            conversation_id: None,
            files: Vec::new(),
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    /// Sets one named app input variable.
    pub fn input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Continues an existing conversation.
    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Attaches a file reference (for example [`uploaded_document`]).
    pub fn file(mut self, file: Value) -> Self {
        self.files.push(file);
        self
    }
}

/// Body of `POST /workflows/run`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkflowRequest {
    pub inputs: Map<String, Value>,
    pub response_mode: ResponseMode,
    pub user: String,
}

impl WorkflowRequest {
    /// Creates a streaming request with no inputs.
    pub fn new() -> Self {
        Self {
            inputs: Map::new(),
            response_mode: ResponseMode::default(),
            user: DEFAULT_USER.to_string(),
        }
    }

    /// Request whose only input is `files`, pointing at one uploaded document.
    pub fn for_uploaded_document(file_id: impl Into<String>) -> Self {
        Self::new().files(uploaded_document(file_id))
    }

    /// Sets one named workflow input.
    pub fn input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Sets the `files` input. Accepts a single reference or a list.
    pub fn files(self, files: Value) -> Self {
        self.input("files", files)
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }
}

impl Default for WorkflowRequest {
    fn default() -> Self {
        Self::new()
    }
}
