use super::*;
use crate::forwarder::BatchSink;
use crate::types::{Document, TaskId, TaskRecord};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use std::sync::Mutex;
use std::time::Duration;
use tower::ServiceExt;


const BOUNDARY: &str = "----BulkLoadTestBoundary7MA4YWxkTrZu0gW";

/// Sink that records batch sizes and answers with a fixed result
struct RecordingSink {
    accept: bool,
    batches: Mutex<Vec<usize>>,
}

impl RecordingSink {
    fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept,
            batches: Mutex::new(Vec::new()),
        })
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn send(&self, _client_id: &str, _business_name: &str, documents: &[Document]) -> bool {
        self.batches.lock().unwrap().push(documents.len());
        self.accept
    }
}

/// Router plus the orchestrator behind it
fn test_app_with(config: Config, sink: Arc<RecordingSink>) -> (Router, Arc<TaskOrchestrator>) {
    let config = Arc::new(config);
    let orchestrator = Arc::new(TaskOrchestrator::new(config.clone(), sink));
    let router = create_router(orchestrator.clone(), config);
    (router, orchestrator)
}

fn test_app() -> (Router, Arc<TaskOrchestrator>) {
    test_app_with(Config::default(), RecordingSink::new(true))
}

/// A file part: optional filename plus content
struct FilePart<'a> {
    filename: Option<&'a str>,
    content: &'a [u8],
}

/// Build a multipart/form-data body by hand
fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{name}\"\r\n\
                 \r\n\
                 {value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some(file) = file {
        let disposition = match file.filename {
            Some(filename) => format!("form-data; name=\"file\"; filename=\"{filename}\""),
            None => "form-data; name=\"file\"".to_string(),
        };
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: {disposition}\r\n\
                 Content-Type: application/octet-stream\r\n\
                 \r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.content);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/bulk-load-data/file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("response should be valid JSON")
}

/// Poll the registry until the task reaches a terminal state
async fn wait_for_terminal(orchestrator: &TaskOrchestrator, id: TaskId) -> TaskRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(record) = orchestrator.get_status(id).await
                && record.status.is_terminal()
            {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

#[tokio::test]
async fn test_cors_enabled() {
    let mut config = Config::default();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let (app, _) = test_app_with(config, RecordingSink::new(true));

    let request = Request::builder()
        .uri("/bulk-load-data/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = Config::default();
    config.server.api.cors_enabled = false;
    let (app, _) = test_app_with(config, RecordingSink::new(true));

    let request = Request::builder()
        .uri("/bulk-load-data/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let mut config = Config::default();
    config.server.api.cors_origins = vec!["http://allowed.example".to_string()];
    let (app, _) = test_app_with(config, RecordingSink::new(true));

    let request = Request::builder()
        .uri("/")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://allowed.example"
    );
}

#[test]
fn test_body_limit_covers_max_file_size() {
    let mut config = Config::default();
    config.processing.max_file_size_mb = 2;
    let limit = body_limit(&config) as u64;
    assert!(limit > config.processing.max_file_size_bytes());
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Arc::new(Config::default());
    let orchestrator = Arc::new(TaskOrchestrator::new(
        config.clone(),
        RecordingSink::new(true),
    ));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, orchestrator, config, async {
        stop_rx.await.ok();
    }));

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let info: serde_json::Value = response.json().await.unwrap();
    assert_eq!(info["status"], "running");

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
