use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, Response, multipart::Form};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ConnectorError;

/// Authenticated blocking HTTP client shared by both platform connectors.
///
/// Deadlines come in two shapes. Plain requests and streamed responses are
/// bounded per wait: connecting, waiting for headers, and each read of the
/// body must finish within the configured timeout, but a body that keeps
/// producing data is read to the end. [`post_json`](Self::post_json) instead
/// takes a deadline for the whole exchange, for bodies that are read in one go.
///
/// The streaming and upload transports are built on first use.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    streaming: OnceCell<Client>,
    uploads: OnceCell<Client>,
    config: ClientConfig,
}

impl ApiClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ConnectorError> {
        config.validate()?;
        let client = build_client(&config, Some(config.timeout))?;
        Ok(Self {
            client,
            streaming: OnceCell::new(),
            uploads: OnceCell::new(),
            config,
        })
    }

    /// Returns the configuration the client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    /// Issues a GET and returns the raw response when the status is 2xx.
    /// Reading the body is bounded per read, so large downloads are fine.
    pub fn get<Q>(&self, path: &str, query: &Q) -> Result<Response, ConnectorError>
    where
        Q: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        debug!(event = "http.request", domain = "http", method = "GET", url = %url);
        let response = self.client.get(&url).query(query).send()?;
        ensure_success(response)
    }

    /// Issues a GET and decodes the body as JSON.
    pub fn get_json<Q>(&self, path: &str, query: &Q) -> Result<serde_json::Value, ConnectorError>
    where
        Q: serde::Serialize + ?Sized,
    {
        let response = self.get(path, query)?;
        response
            .json()
            .map_err(|e| ConnectorError::Decode(format!("GET {path} returned invalid JSON: {e}")))
    }

    /// Issues a JSON POST whose whole exchange, body included, must finish
    /// within `timeout`. Returns the response when the status is 2xx.
    pub fn post_json<B>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<Response, ConnectorError>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        debug!(
            event = "http.request",
            domain = "http",
            method = "POST",
            url = %url,
            timeout_ms = timeout.as_millis() as u64
        );
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()?;
        ensure_success(response)
    }

    /// Issues a JSON POST whose response is read incrementally. Only the gaps
    /// between reads are bounded, by `stream_timeout`; the stream may run as
    /// long as data keeps arriving. Returns the response when the status is 2xx.
    pub fn post_json_stream<B>(&self, path: &str, body: &B) -> Result<Response, ConnectorError>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        debug!(
            event = "http.request",
            domain = "http",
            method = "POST",
            url = %url,
            streaming = true,
            idle_timeout_ms = self.config.stream_timeout.as_millis() as u64
        );
        let client = self
            .streaming
            .get_or_try_init(|| build_client(&self.config, Some(self.config.stream_timeout)))?;
        let response = client.post(&url).json(body).send()?;
        ensure_success(response)
    }

    /// Issues a multipart POST. Connecting is bounded by the configured
    /// timeout; sending the form is not, so large files are not cut off.
    /// The status is not checked here because upload endpoints define their
    /// own success code.
    pub fn post_multipart(&self, path: &str, form: Form) -> Result<Response, ConnectorError> {
        let url = self.endpoint(path);
        debug!(
            event = "http.request",
            domain = "http",
            method = "POST",
            url = %url,
            multipart = true
        );
        let client = self
            .uploads
            .get_or_try_init(|| build_client(&self.config, None))?;
        Ok(client.post(&url).multipart(form).send()?)
    }
}

/// `idle` bounds the wait for headers and each body read; `None` leaves
/// everything after connecting unbounded.
fn build_client(config: &ClientConfig, idle: Option<Duration>) -> Result<Client, ConnectorError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
        .map_err(|e| ConnectorError::Config(format!("api_key is not a valid header: {e}")))?;
    auth.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    Client::builder()
        .connect_timeout(config.timeout)
        .timeout(idle)
        .tcp_keepalive(config.timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ConnectorError::Config(format!("failed to build http client: {e}")))
}

/// Converts a non-2xx response into [`ConnectorError::Api`] with its body text.
pub fn ensure_success(response: Response) -> Result<Response, ConnectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(api_error(response))
}

/// Builds an API error from any response, consuming its body.
pub fn api_error(response: Response) -> ConnectorError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    ConnectorError::api(status, body)
}
