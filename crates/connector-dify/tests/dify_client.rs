use std::io::Write as _;

use connector_core::{ClientConfig, ConnectorError};
use connector_dify::{
    ChatRequest, DifyClient, ResponseMode, StreamEvent, WorkflowOutput, WorkflowRequest,
};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(lines: &[&str]) -> Vec<u8> {
    lines
        .iter()
        .map(|line| format!("data: {line}\n\n"))
        .collect::<String>()
        .into_bytes()
}

fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

/// Runs `f` with a client pointed at `server` on a blocking thread.
async fn with_client<T, F>(server: &MockServer, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(DifyClient) -> T + Send + 'static,
{
    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let client = DifyClient::new(ClientConfig::new("app-key", uri)).expect("client");
        f(client)
    })
    .await
    .expect("join")
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_returns_assigned_id_on_201() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/upload"))
        .and(header("authorization", "Bearer app-key"))
        .and(body_string_contains("name=\"file\"; filename=\""))
        .and(body_string_contains("a,b\n1,2\n"))
        .and(body_string_contains("name=\"user\"\r\n\r\nalice"))
        .and(body_string_contains("name=\"type\"\r\n\r\ncsv"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "file-123"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let file = temp_file(".CSV", "a,b\n1,2\n");
    let file_path = file.path().to_path_buf();
    let id = with_client(&server, move |client| client.upload_file(&file_path, "alice")).await;
    assert_eq!(id, Ok("file-123".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_rejects_unsupported_extension_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/upload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let file = temp_file(".pdf", "%PDF");
    let file_path = file.path().to_path_buf();
    let err = with_client(&server, move |client| client.upload_file(&file_path, "alice"))
        .await
        .expect_err("pdf is not allowed");
    assert_eq!(err.kind(), "validation");
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_of_missing_file_is_io_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = with_client(&server, |client| {
        client.upload_file("/no/such/place/data.xlsx", "alice")
    })
    .await
    .expect_err("missing file");
    assert_eq!(err.kind(), "io");
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_with_non_201_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"ignored\"}"))
        .mount(&server)
        .await;

    let file = temp_file(".txt", "hello");
    let file_path = file.path().to_path_buf();
    let err = with_client(&server, move |client| client.upload_file(&file_path, "alice"))
        .await
        .expect_err("200 is not the upload success code");
    assert_eq!(err.status(), Some(200));
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_chat_accumulates_answer_and_reports_progress() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"event":"message","message_id":"m1","conversation_id":"c1","answer":"Hello, "}"#,
        r#"{"event":"ping"}"#,
        r#"{"event":"message","message_id":"m1","conversation_id":"c1","answer":"world"}"#,
        r#"{"event":"message_end","message_id":"m1","conversation_id":"c1","metadata":{"retriever_resources":[{"document_name":"faq.docx"}]}}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/chat-messages"))
        .and(body_partial_json(
            serde_json::json!({"query": "hi", "response_mode": "streaming"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let (answer, progress) = with_client(&server, |client| {
        let mut progress = String::new();
        let answer = client.chat_with(&ChatRequest::new("hi"), |event| {
            if let Some(text) = event.progress_text() {
                progress.push_str(text);
            }
        });
        (answer, progress)
    })
    .await;

    let answer = answer.expect("chat succeeded");
    assert_eq!(answer.text, "Hello, world");
    assert_eq!(progress, "Hello, world");
    assert!(answer.completed);
    assert_eq!(
        answer.retriever_resources,
        Some(serde_json::json!([{"document_name":"faq.docx"}]))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_error_event_is_returned_as_stream_error() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"event":"message","answer":"par"}"#,
        r#"{"event":"error","status":400,"code":"completion_request_error","message":"quota exceeded"}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let err = with_client(&server, |client| client.chat(&ChatRequest::new("hi")))
        .await
        .expect_err("error event");
    assert_eq!(
        err,
        ConnectorError::StreamError {
            message: "quota exceeded".into()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_rejected_by_api_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat-messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = with_client(&server, |client| client.chat(&ChatRequest::new("hi")))
        .await
        .expect_err("401");
    assert_eq!(err, ConnectorError::api(401, "unauthorized"));
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_chat_maps_single_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat-messages"))
        .and(body_partial_json(serde_json::json!({"response_mode": "blocking"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "event": "message",
            "message_id": "m7",
            "conversation_id": "c7",
            "answer": "blocking answer",
            "metadata": {"usage": {"total_tokens": 12}}
        })))
        .mount(&server)
        .await;

    let answer = with_client(&server, |client| {
        client.chat(&ChatRequest::new("hi").response_mode(ResponseMode::Blocking))
    })
    .await
    .expect("blocking chat");
    assert_eq!(answer.text, "blocking answer");
    assert_eq!(answer.message_id.as_deref(), Some("m7"));
    assert_eq!(answer.usage, Some(serde_json::json!({"total_tokens": 12})));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_chat_query_is_rejected_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = with_client(&server, |client| client.chat(&ChatRequest::new("   ")))
        .await
        .expect_err("empty query");
    assert_eq!(err.kind(), "validation");
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_workflow_returns_finished_run() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"event":"workflow_started","task_id":"t1","workflow_run_id":"r1","data":{"id":"r1"}}"#,
        r#"{"event":"workflow_step_executing","data":{"node_id":"llm"}}"#,
        r#"{"event":"text_chunk","data":{"text":"summary"}}"#,
        r#"{"event":"workflow_finished","task_id":"t1","workflow_run_id":"r1","data":{"id":"r1","status":"succeeded","outputs":{"text":"summary"}}}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/workflows/run"))
        .and(body_partial_json(serde_json::json!({
            "inputs": {"files": {"upload_file_id": "file-1"}},
            "response_mode": "streaming"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let (output, seen) = with_client(&server, |client| {
        let mut seen = Vec::new();
        let output = client.run_workflow_with(
            &WorkflowRequest::for_uploaded_document("file-1"),
            |event: &StreamEvent| seen.push(event.name().to_string()),
        );
        (output, seen)
    })
    .await;

    let WorkflowOutput::Streamed(run) = output.expect("workflow succeeded") else {
        panic!("expected streamed output");
    };
    assert_eq!(run.workflow_run_id.as_deref(), Some("r1"));
    assert_eq!(run.text(), Some("summary"));
    assert_eq!(
        seen,
        vec![
            "workflow_started",
            "workflow_step_executing",
            "text_chunk",
            "workflow_finished"
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn workflow_stream_without_finish_fails() {
    let server = MockServer::start().await;
    let body = sse_body(&[r#"{"event":"workflow_started","workflow_run_id":"r2"}"#]);
    Mock::given(method("POST"))
        .and(path("/workflows/run"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let err = with_client(&server, |client| {
        client.run_workflow(&WorkflowRequest::new().input("topic", "rust"))
    })
    .await
    .expect_err("no workflow_finished");
    assert_eq!(err.kind(), "incomplete");
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_workflow_returns_raw_body() {
    let server = MockServer::start().await;
    let raw = serde_json::json!({
        "workflow_run_id": "r3",
        "data": {"status": "succeeded", "outputs": {"text": "ok"}}
    });
    Mock::given(method("POST"))
        .and(path("/workflows/run"))
        .and(body_partial_json(serde_json::json!({"response_mode": "blocking"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(raw.clone()))
        .mount(&server)
        .await;

    let output = with_client(&server, |client| {
        client.run_workflow(&WorkflowRequest::new().response_mode(ResponseMode::Blocking))
    })
    .await
    .expect("blocking workflow");
    assert_eq!(output, WorkflowOutput::Blocking { raw });
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_workflow_with_invalid_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/workflows/run"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = with_client(&server, |client| {
        client.run_workflow(&WorkflowRequest::new().response_mode(ResponseMode::Blocking))
    })
    .await
    .expect_err("html body");
    assert_eq!(err.kind(), "decode");
}
