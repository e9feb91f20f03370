/// Errors returned by connector operations.
///
/// Each variant corresponds to one failure class. Transport problems are kept
/// apart from API-level rejections so callers can tell "the service said no"
/// from "the service was never reached".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// Invalid or missing client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Caller input rejected before any network call was made.
    #[error("validation error: {0}")]
    Validation(String),
    /// A local file could not be opened or read.
    #[error("io error ({path}): {message}")]
    Io { path: String, message: String },
    /// Network failure, timeout, or a read failure mid-stream.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("api error (status {status}): {body}")]
    Api { status: u16, body: String },
    /// The service reported an explicit `error` event inside a stream.
    #[error("stream error: {message}")]
    StreamError { message: String },
    /// A response body or caller-supplied document did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A stream ended before any terminal event was seen.
    #[error("incomplete stream: {0}")]
    Incomplete(String),
}

impl ConnectorError {
    /// Creates an API-level error from a status code and raw body text.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Creates a local file error.
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Short stable code used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::Io { .. } => "io",
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::StreamError { .. } => "stream",
            Self::Decode(_) => "decode",
            Self::Incomplete(_) => "incomplete",
        }
    }

    /// Returns the HTTP status for API-level errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transport(format!("request timed out: {err}"));
        }
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_status_are_reported_per_variant() {
        let err = ConnectorError::api(404, "missing");
        assert_eq!(err.kind(), "api");
        assert_eq!(err.status(), Some(404));
        assert_eq!(ConnectorError::Transport("down".into()).status(), None);
        assert_eq!(
            ConnectorError::Incomplete("no terminal event".into()).kind(),
            "incomplete"
        );
    }

    #[test]
    fn io_error_keeps_path_and_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ConnectorError::io("/tmp/a.csv", &io);
        assert_eq!(err.to_string(), "io error (/tmp/a.csv): no such file");
    }
}
