//! Task orchestration: drives a file from upload to its terminal status.
//!
//! # Lifecycle
//!
//! ```text
//! queued -> processing -> completed
//!                      -> completed_with_errors   (some batches rejected)
//!                      -> failed                  (file or internal error)
//! ```
//!
//! [`TaskOrchestrator::create_task`] registers a queued record and returns at once.
//! [`TaskOrchestrator::run_task`] pulls batches from a [`BatchProducer`] one at a
//! time, sends each through the [`BatchSink`], and updates the registry after every
//! batch. [`TaskOrchestrator::submit`] validates an upload, creates the task and
//! spawns its run.

use crate::collection::collection_name;
use crate::config::Config;
use crate::error::{Error, IngestError, Result, ValidationError};
use crate::forwarder::BatchSink;
use crate::ingest::{BatchProducer, FileFormat};
use crate::registry::TaskRegistry;
use crate::types::{Event, TaskId, TaskRecord, TaskStatus};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Row count at which the progress estimate saturates
const NOMINAL_ROW_CEILING: u64 = 100_000;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// An accepted upload, as handed over by the HTTP layer
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Client identifier
    pub client_id: String,
    /// Business name
    pub business_name: String,
    /// Original filename; `None` when the multipart part carried none
    pub filename: Option<String>,
    /// Complete file content
    pub content: Vec<u8>,
}

/// Progress estimate for `total_rows` rows read so far
///
/// Measured against a fixed 100 000-row ceiling and capped at 99, so it never
/// reaches 100 before the run finishes.
pub fn estimate_progress(total_rows: u64) -> u8 {
    let pct = total_rows.saturating_mul(100) / NOMINAL_ROW_CEILING;
    pct.min(99) as u8
}

fn round_seconds(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("internal error: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("internal error: {s}")
    } else {
        "internal error".to_string()
    }
}

/// Counters accumulated over a run
#[derive(Debug, Default)]
struct RunSummary {
    total_rows: u64,
    total_batches: u64,
    failed_batches: u64,
}

/// Coordinates batch production, forwarding and status tracking
///
/// Cloning is cheap; clones share the registry, sink and event channel.
#[derive(Clone)]
pub struct TaskOrchestrator {
    registry: TaskRegistry,
    sink: Arc<dyn BatchSink>,
    config: Arc<Config>,
    event_tx: broadcast::Sender<Event>,
}

impl TaskOrchestrator {
    /// Create an orchestrator with a fresh registry
    pub fn new(config: Arc<Config>, sink: Arc<dyn BatchSink>) -> Self {
        Self::with_registry(config, sink, TaskRegistry::new())
    }

    /// Create an orchestrator around an existing registry
    pub fn with_registry(
        config: Arc<Config>,
        sink: Arc<dyn BatchSink>,
        registry: TaskRegistry,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            sink,
            config,
            event_tx,
        }
    }

    /// The task registry
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to task events
    ///
    /// Receivers that fall behind by more than the channel capacity miss events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Check an upload before any task is created
    ///
    /// The filename must be non-empty and end in a supported suffix, and the
    /// content must fit the configured size limit.
    pub fn validate_upload(
        &self,
        filename: &str,
        size_bytes: u64,
    ) -> std::result::Result<(), ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError::MissingFilename);
        }

        if FileFormat::from_filename(filename).is_none() {
            return Err(ValidationError::UnsupportedExtension {
                filename: filename.to_string(),
            });
        }

        if size_bytes > self.config.processing.max_file_size_bytes() {
            return Err(ValidationError::FileTooLarge {
                size_bytes,
                max_mb: self.config.processing.max_file_size_mb,
            });
        }

        Ok(())
    }

    /// Register a queued task and return its id
    pub async fn create_task(
        &self,
        client_id: &str,
        business_name: &str,
        filename: &str,
    ) -> TaskId {
        let record = TaskRecord::queued(TaskId::new(), client_id, business_name, filename);
        let id = self.registry.create(record).await;

        tracing::info!(task_id = %id, client_id, filename, "task queued");
        self.emit(Event::TaskQueued {
            task_id: id,
            filename: filename.to_string(),
        });
        id
    }

    /// Validate an upload, create its task and start the run in the background
    ///
    /// Returns as soon as the task is queued. Validation failures create no task.
    pub async fn submit(&self, upload: UploadRequest) -> Result<TaskId> {
        let filename = upload.filename.unwrap_or_default();
        self.validate_upload(&filename, upload.content.len() as u64)?;

        let id = self
            .create_task(&upload.client_id, &upload.business_name, &filename)
            .await;

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator
                .run_task(
                    id,
                    upload.content,
                    filename,
                    upload.client_id,
                    upload.business_name,
                )
                .await;
        });

        Ok(id)
    }

    /// Current status record of a task
    pub async fn get_status(&self, id: TaskId) -> Option<TaskRecord> {
        self.registry.get(id).await
    }

    /// Like [`get_status`](Self::get_status), but an unknown id is an error
    pub async fn require_status(&self, id: TaskId) -> Result<TaskRecord> {
        self.get_status(id)
            .await
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Run a task to completion
    ///
    /// Never returns an error: every outcome, including a panic inside the run, is
    /// recorded in the registry as a terminal status.
    pub async fn run_task(
        &self,
        id: TaskId,
        content: Vec<u8>,
        filename: String,
        client_id: String,
        business_name: String,
    ) {
        let started = Instant::now();
        tracing::info!(task_id = %id, filename = %filename, "processing started");

        let outcome = AssertUnwindSafe(self.process(
            id,
            content,
            &filename,
            &client_id,
            &business_name,
        ))
        .catch_unwind()
        .await;

        let elapsed = round_seconds(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(summary)) => {
                self.complete(id, summary, &client_id, &business_name, elapsed)
                    .await
            }
            Ok(Err(e)) => self.fail(id, e.to_string(), elapsed).await,
            Err(payload) => self.fail(id, panic_message(payload.as_ref()), elapsed).await,
        }
    }

    async fn process(
        &self,
        id: TaskId,
        content: Vec<u8>,
        filename: &str,
        client_id: &str,
        business_name: &str,
    ) -> std::result::Result<RunSummary, IngestError> {
        self.registry
            .update(id, |r| {
                r.status = TaskStatus::Processing;
                r.progress = 0;
                r.message = "Starting processing...".to_string();
                r.total_rows = 0;
                r.processed_rows = 0;
            })
            .await;
        self.emit(Event::TaskProgress {
            task_id: id,
            progress: 0,
            current_batch: 0,
            total_rows: 0,
        });

        let producer =
            BatchProducer::new(content, filename, self.config.processing.batch_size)?;
        let mut summary = RunSummary::default();

        for batch in producer {
            let batch = batch?;
            summary.total_batches += 1;
            summary.total_rows += batch.len() as u64;

            let batch_number = summary.total_batches;
            let total_rows = summary.total_rows;
            let progress = estimate_progress(total_rows);

            self.registry
                .update(id, |r| {
                    r.progress = progress;
                    r.message = format!("Processing batch {batch_number}...");
                    r.total_rows = total_rows;
                    r.processed_rows = total_rows;
                    r.current_batch = batch_number;
                    r.total_batches = batch_number;
                })
                .await;
            self.emit(Event::TaskProgress {
                task_id: id,
                progress,
                current_batch: batch_number,
                total_rows,
            });

            tracing::info!(
                task_id = %id,
                batch = batch_number,
                documents = batch.len(),
                "forwarding batch"
            );

            if !self.sink.send(client_id, business_name, &batch).await {
                summary.failed_batches += 1;
                let failed = summary.failed_batches;
                tracing::error!(task_id = %id, batch = batch_number, "batch failed");
                self.registry
                    .update(id, |r| r.failed_batches = failed)
                    .await;
            }

            tokio::task::yield_now().await;
        }

        Ok(summary)
    }

    async fn complete(
        &self,
        id: TaskId,
        summary: RunSummary,
        client_id: &str,
        business_name: &str,
        elapsed: f64,
    ) {
        let RunSummary {
            total_rows,
            total_batches,
            failed_batches,
        } = summary;

        let (status, message) = if failed_batches == 0 {
            (
                TaskStatus::Completed,
                format!("Completed successfully. {total_rows} documents inserted."),
            )
        } else {
            (
                TaskStatus::CompletedWithErrors,
                format!("Completed with errors. {failed_batches}/{total_batches} batches failed."),
            )
        };
        let collection = collection_name(client_id, business_name);

        self.registry
            .update(id, |r| {
                r.status = status;
                r.progress = 100;
                r.message = message;
                r.total_rows = total_rows;
                r.processed_rows = total_rows;
                r.total_batches = total_batches;
                r.failed_batches = failed_batches;
                r.collection_name = Some(collection.clone());
                r.processing_time_seconds = Some(elapsed);
            })
            .await;

        if failed_batches == 0 {
            tracing::info!(
                task_id = %id,
                total_rows,
                total_batches,
                collection = %collection,
                elapsed_secs = elapsed,
                "task completed"
            );
        } else {
            tracing::warn!(
                task_id = %id,
                total_rows,
                total_batches,
                failed_batches,
                collection = %collection,
                elapsed_secs = elapsed,
                "task completed with errors"
            );
        }

        self.emit(Event::TaskCompleted {
            task_id: id,
            status,
            total_rows,
            failed_batches,
        });
    }

    async fn fail(&self, id: TaskId, detail: String, elapsed: f64) {
        tracing::error!(task_id = %id, error = %detail, "task failed");

        let message = format!("Error: {detail}");
        self.registry
            .update(id, |r| {
                r.status = TaskStatus::Failed;
                r.progress = 0;
                r.message = message;
                r.total_rows = 0;
                r.processed_rows = 0;
                r.error_detail = Some(detail.clone());
                r.processing_time_seconds = Some(elapsed);
            })
            .await;

        self.emit(Event::TaskFailed {
            task_id: id,
            error: detail,
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Sink answering from a script; answers `true` once the script runs out
    #[derive(Default)]
    struct ScriptedSink {
        answers: Mutex<VecDeque<bool>>,
        calls: Mutex<Vec<(String, String, Vec<Document>)>>,
    }

    impl ScriptedSink {
        fn answering(answers: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<(String, String, Vec<Document>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchSink for ScriptedSink {
        async fn send(&self, client_id: &str, business_name: &str, documents: &[Document]) -> bool {
            self.calls.lock().unwrap().push((
                client_id.to_string(),
                business_name.to_string(),
                documents.to_vec(),
            ));
            self.answers.lock().unwrap().pop_front().unwrap_or(true)
        }
    }

    struct PanickingSink;

    #[async_trait]
    impl BatchSink for PanickingSink {
        async fn send(&self, _: &str, _: &str, _: &[Document]) -> bool {
            panic!("sink exploded");
        }
    }

    fn config_with_batch_size(batch_size: usize) -> Arc<Config> {
        let mut config = Config::default();
        config.processing.batch_size = batch_size;
        Arc::new(config)
    }

    fn orchestrator(batch_size: usize, sink: Arc<dyn BatchSink>) -> TaskOrchestrator {
        TaskOrchestrator::new(config_with_batch_size(batch_size), sink)
    }

    const SCENARIO_CSV: &[u8] = b"id,name\n1,Ann\n2,Bo\n3,Cy\n";

    async fn run(orch: &TaskOrchestrator, content: &[u8], filename: &str) -> TaskRecord {
        let id = orch.create_task("C001", "Acme", filename).await;
        orch.run_task(
            id,
            content.to_vec(),
            filename.to_string(),
            "C001".into(),
            "Acme".into(),
        )
        .await;
        orch.get_status(id).await.unwrap()
    }

    #[test]
    fn progress_estimate_saturates_below_100() {
        assert_eq!(estimate_progress(0), 0);
        assert_eq!(estimate_progress(999), 0);
        assert_eq!(estimate_progress(1_000), 1);
        assert_eq!(estimate_progress(50_000), 50);
        assert_eq!(estimate_progress(99_999), 99);
        assert_eq!(estimate_progress(100_000), 99);
        assert_eq!(estimate_progress(u64::MAX), 99);
    }

    #[test]
    fn seconds_are_rounded_to_two_decimals() {
        assert_eq!(round_seconds(1.23456), 1.23);
        assert_eq!(round_seconds(2.499), 2.5);
        assert_eq!(round_seconds(0.004), 0.0);
    }

    #[tokio::test]
    async fn create_task_registers_queued_record() {
        let orch = orchestrator(2, ScriptedSink::answering(&[]));
        let id = orch.create_task("C001", "Acme", "rows.csv").await;

        let record = orch.get_status(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Queued);
        assert_eq!(record.progress, 0);
        assert_eq!(record.message, "File received, queued for processing");
        assert_eq!(record.filename, "rows.csv");
    }

    #[tokio::test]
    async fn all_batches_accepted_completes() {
        let sink = ScriptedSink::answering(&[true, true]);
        let orch = orchestrator(2, sink.clone());
        let record = run(&orch, SCENARIO_CSV, "people.csv").await;

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.total_rows, 3);
        assert_eq!(record.processed_rows, 3);
        assert_eq!(record.total_batches, 2);
        assert_eq!(record.failed_batches, 0);
        assert_eq!(record.collection_name.as_deref(), Some("C001/Acme-DB"));
        assert!(record.processing_time_seconds.is_some());
        assert!(record.error_detail.is_none());
        assert_eq!(record.message, "Completed successfully. 3 documents inserted.");

        let calls = sink.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "C001");
        assert_eq!(calls[0].1, "Acme");
        let expected_first: Vec<Document> = vec![
            [("_id", "1"), ("id", "1"), ("name", "Ann")].into_iter().collect(),
            [("_id", "2"), ("id", "2"), ("name", "Bo")].into_iter().collect(),
        ];
        assert_eq!(calls[0].2, expected_first);
        assert_eq!(calls[1].2.len(), 1);
        assert_eq!(calls[1].2[0].get("name"), Some("Cy"));
    }

    #[tokio::test]
    async fn rejected_batch_completes_with_errors() {
        let orch = orchestrator(2, ScriptedSink::answering(&[false, true]));
        let record = run(&orch, SCENARIO_CSV, "people.csv").await;

        assert_eq!(record.status, TaskStatus::CompletedWithErrors);
        assert_eq!(record.failed_batches, 1);
        assert_eq!(record.total_batches, 2);
        assert_eq!(record.total_rows, 3);
        assert_eq!(record.progress, 100);
        assert_eq!(record.message, "Completed with errors. 1/2 batches failed.");
        assert_eq!(record.collection_name.as_deref(), Some("C001/Acme-DB"));
    }

    #[tokio::test]
    async fn every_failed_batch_is_counted_and_run_continues() {
        let rows: String = (1..=10).map(|i| format!("{i}\n")).collect();
        let content = format!("id\n{rows}");
        let sink = ScriptedSink::answering(&[false, true, false, false, true]);
        let orch = orchestrator(2, sink.clone());

        let record = run(&orch, content.as_bytes(), "ids.csv").await;

        assert_eq!(sink.calls().len(), 5);
        assert_eq!(record.status, TaskStatus::CompletedWithErrors);
        assert_eq!(record.failed_batches, 3);
        assert!(record.failed_batches <= record.total_batches);
    }

    #[tokio::test]
    async fn header_only_file_completes_with_zero_rows() {
        let sink = ScriptedSink::answering(&[]);
        let orch = orchestrator(2, sink.clone());
        let record = run(&orch, b"id,name\n", "empty.csv").await;

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.total_rows, 0);
        assert_eq!(record.total_batches, 0);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn file_without_headers_fails() {
        let sink = ScriptedSink::answering(&[]);
        let orch = orchestrator(2, sink.clone());
        let record = run(&orch, b"", "empty.csv").await;

        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.progress, 0);
        assert_eq!(record.total_rows, 0);
        assert_eq!(record.error_detail.as_deref(), Some("file has no header row"));
        assert_eq!(record.message, "Error: file has no header row");
        assert!(record.processing_time_seconds.is_some());
        assert!(record.collection_name.is_none());
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn unreadable_spreadsheet_fails() {
        let orch = orchestrator(2, ScriptedSink::answering(&[]));
        let record = run(&orch, b"not a workbook", "book.xlsx").await;

        assert_eq!(record.status, TaskStatus::Failed);
        let detail = record.error_detail.unwrap();
        assert!(detail.starts_with("could not read spreadsheet"), "{detail}");
    }

    #[tokio::test]
    async fn panic_during_run_is_recorded_as_failure() {
        let orch = orchestrator(2, Arc::new(PanickingSink));
        let record = run(&orch, SCENARIO_CSV, "people.csv").await;

        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.progress, 0);
        assert_eq!(
            record.error_detail.as_deref(),
            Some("internal error: sink exploded")
        );
    }

    #[tokio::test]
    async fn progress_never_decreases_and_stays_below_100_while_processing() {
        let mut content = String::from("id\n");
        for i in 0..120_000 {
            content.push_str(&format!("{i}\n"));
        }
        let orch = orchestrator(10_000, ScriptedSink::answering(&[]));
        let mut events = orch.subscribe();

        let record = run(&orch, content.as_bytes(), "big.csv").await;
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.total_batches, 12);

        let mut progress = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::TaskProgress { progress: p, .. } = event {
                progress.push(p);
            }
        }
        assert_eq!(progress.len(), 13);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|p| *p <= 99));
        assert_eq!(progress.last(), Some(&99));
    }

    #[tokio::test]
    async fn events_cover_the_lifecycle() {
        let orch = orchestrator(2, ScriptedSink::answering(&[false]));
        let mut events = orch.subscribe();
        let record = run(&orch, SCENARIO_CSV, "people.csv").await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.task_id(), record.task_id);
            seen.push(event);
        }

        assert!(matches!(seen.first(), Some(Event::TaskQueued { .. })));
        assert!(matches!(
            seen.last(),
            Some(Event::TaskCompleted {
                status: TaskStatus::CompletedWithErrors,
                failed_batches: 1,
                total_rows: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn terminal_record_is_not_changed_by_a_second_run() {
        let orch = orchestrator(2, ScriptedSink::answering(&[]));
        let first = run(&orch, SCENARIO_CSV, "people.csv").await;

        orch.run_task(
            first.task_id,
            b"".to_vec(),
            "people.csv".into(),
            "C001".into(),
            "Acme".into(),
        )
        .await;

        let after = orch.get_status(first.task_id).await.unwrap();
        assert_eq!(after.status, TaskStatus::Completed);
        assert_eq!(after.total_rows, 3);
    }

    #[test]
    fn validation_rejects_bad_uploads() {
        let mut config = Config::default();
        config.processing.max_file_size_mb = 1;
        let orch = TaskOrchestrator::new(Arc::new(config), ScriptedSink::answering(&[]));

        assert!(matches!(
            orch.validate_upload("", 10),
            Err(ValidationError::MissingFilename)
        ));
        assert!(matches!(
            orch.validate_upload("notes.txt", 10),
            Err(ValidationError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            orch.validate_upload("rows.csv", 1024 * 1024 + 1),
            Err(ValidationError::FileTooLarge { max_mb: 1, .. })
        ));
        assert!(orch.validate_upload("rows.csv", 1024 * 1024).is_ok());
        assert!(orch.validate_upload("Book.XLS", 10).is_ok());
    }

    #[tokio::test]
    async fn unsupported_upload_creates_no_task() {
        let orch = orchestrator(2, ScriptedSink::answering(&[]));
        let result = orch
            .submit(UploadRequest {
                client_id: "C001".into(),
                business_name: "Acme".into(),
                filename: Some("notes.txt".into()),
                content: b"id\n1\n".to_vec(),
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::UnsupportedExtension { .. }))
        ));
        assert!(orch.registry().is_empty().await);
    }

    #[tokio::test]
    async fn missing_filename_is_rejected() {
        let orch = orchestrator(2, ScriptedSink::answering(&[]));
        let result = orch
            .submit(UploadRequest {
                client_id: "C001".into(),
                business_name: "Acme".into(),
                filename: None,
                content: Vec::new(),
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::MissingFilename))
        ));
    }

    #[tokio::test]
    async fn submit_runs_task_in_background() {
        let sink = ScriptedSink::answering(&[]);
        let orch = orchestrator(2, sink.clone());
        let mut events = orch.subscribe();

        let id = orch
            .submit(UploadRequest {
                client_id: "C001".into(),
                business_name: "Acme".into(),
                filename: Some("people.csv".into()),
                content: SCENARIO_CSV.to_vec(),
            })
            .await
            .unwrap();

        let done = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                match events.recv().await.unwrap() {
                    Event::TaskCompleted { task_id, .. } if task_id == id => break,
                    _ => continue,
                }
            }
        })
        .await;
        assert!(done.is_ok(), "task did not complete in time");

        let record = orch.require_status(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(sink.calls().len(), 2);
    }

    #[tokio::test]
    async fn require_status_reports_unknown_ids() {
        let orch = orchestrator(2, ScriptedSink::answering(&[]));
        let result = orch.require_status(TaskId::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
