use std::path::Path;
use std::time::Duration;

use crate::errors::ConnectorError;

/// Connect deadline, and idle deadline for requests without their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest silence tolerated between reads of a streamed response.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials and endpoint settings for one remote platform.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL that endpoint paths are joined onto.
    pub base_url: String,
    /// Bounds connecting, and each wait for data on plain requests.
    pub timeout: Duration,
    /// Bounds each wait for data on streamed responses. The stream itself
    /// may run for as long as events keep arriving.
    pub stream_timeout: Duration,
}

#[derive(serde::Deserialize)]
struct ConfigFile {
    api_key: String,
    base_url: String,
}

impl ClientConfig {
    /// Creates a config from literal credentials.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    /// Loads `api_key` and `base_url` from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConnectorError::io(path.display().to_string(), &e))?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|e| {
            ConnectorError::Config(format!("invalid config file {}: {e}", path.display()))
        })?;
        let config = Self::new(file.api_key, file.base_url);
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from `<PREFIX>_API_KEY` and `<PREFIX>_BASE_URL`.
    pub fn from_env(prefix: &str) -> Result<Self, ConnectorError> {
        let key_var = format!("{prefix}_API_KEY");
        let url_var = format!("{prefix}_BASE_URL");
        let api_key = std::env::var(&key_var).unwrap_or_default();
        let base_url = std::env::var(&url_var).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ConnectorError::Config(format!("missing {key_var}")));
        }
        if base_url.trim().is_empty() {
            return Err(ConnectorError::Config(format!("missing {url_var}")));
        }
        Ok(Self::new(api_key, base_url))
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect and idle timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the idle timeout for streamed responses.
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConnectorError> {
        if self.api_key.trim().is_empty() {
            return Err(ConnectorError::Config("api_key must not be empty".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConnectorError::Config("base_url must not be empty".into()));
        }
        Ok(())
    }

    /// Joins an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = ClientConfig::new("k", "http://chat.example/v1/");
        assert_eq!(
            config.endpoint("/files/upload"),
            "http://chat.example/v1/files/upload"
        );
        assert_eq!(
            config.endpoint("chat-messages"),
            "http://chat.example/v1/chat-messages"
        );
    }

    #[test]
    fn loads_json_file_and_ignores_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"api_key":"app-123","base_url":"http://localhost/v1","note":"x"}}"#
        )
        .expect("write");
        let config = ClientConfig::from_json_file(file.path()).expect("config");
        assert_eq!(config.api_key, "app-123");
        assert_eq!(config.base_url, "http://localhost/v1");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.stream_timeout, DEFAULT_STREAM_TIMEOUT);
    }

    #[test]
    fn json_file_with_empty_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"api_key":"  ","base_url":"http://localhost"}}"#).expect("write");
        let err = ClientConfig::from_json_file(file.path()).expect_err("empty key");
        assert!(matches!(err, ConnectorError::Config(msg) if msg.contains("api_key")));
    }

    #[test]
    fn missing_json_file_is_io_error() {
        let err = ClientConfig::from_json_file("/definitely/not/here.json").expect_err("missing");
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn from_env_reports_missing_variable() {
        let err = ClientConfig::from_env("CONNECTOR_TEST_UNSET_PREFIX").expect_err("unset");
        assert!(
            matches!(err, ConnectorError::Config(msg) if msg.contains("CONNECTOR_TEST_UNSET_PREFIX_API_KEY"))
        );
    }
}
