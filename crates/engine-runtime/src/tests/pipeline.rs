use crate::{error::PipelineError, error::Side, pipeline::Pipeline, state::PipelineState};
use async_trait::async_trait;
use engine_core::{
    connectors::{
        destination::Destination,
        source::{BatchStream, Source},
    },
    error::{ConnectorError, TransformError},
    logger::LogLevel,
};
use futures::{StreamExt, stream};
use model::{
    core::value::Value,
    record,
    records::{batch::Batch, record::Record},
};
use serde_json::Value as JsonValue;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

#[derive(Default)]
struct Calls {
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl Calls {
    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

enum Step {
    Rows(Vec<Record>),
    Fail(&'static str),
}

struct MockSource {
    steps: Vec<Vec<Record>>,
    fail_at: Option<usize>,
    fail_connect: bool,
    fail_close: bool,
    calls: Arc<Calls>,
}

impl MockSource {
    fn new(steps: Vec<Vec<Record>>) -> Self {
        Self {
            steps,
            fail_at: None,
            fail_connect: false,
            fail_close: false,
            calls: Arc::new(Calls::default()),
        }
    }

    fn script(&self) -> Vec<Step> {
        let mut script: Vec<Step> = self.steps.iter().cloned().map(Step::Rows).collect();
        if let Some(idx) = self.fail_at {
            script.truncate(idx);
            script.push(Step::Fail("source went away"));
        }
        script
    }
}

#[async_trait]
impl Source for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ConnectorError::connection("source refused"));
        }
        Ok(())
    }

    fn fetch(&self) -> BatchStream<'_> {
        stream::iter(self.script().into_iter().map(|step| match step {
            Step::Rows(rows) => Ok(Batch::new(rows)),
            Step::Fail(msg) => Err(ConnectorError::query(msg)),
        }))
        .boxed()
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ConnectorError::close("source close failed"));
        }
        Ok(())
    }
}

struct MockDestination {
    received: Arc<Mutex<Vec<Batch>>>,
    fail_on_insert: Option<usize>,
    fail_connect: bool,
    fail_close: bool,
    inserts: usize,
    /// Rows reported as accepted but not yet committed.
    pending: usize,
    calls: Arc<Calls>,
}

impl MockDestination {
    fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            fail_on_insert: None,
            fail_connect: false,
            fail_close: false,
            inserts: 0,
            pending: 0,
            calls: Arc::new(Calls::default()),
        }
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ConnectorError::connection("destination refused"));
        }
        Ok(())
    }

    async fn insert(&mut self, batch: Batch) -> Result<(), ConnectorError> {
        self.inserts += 1;
        if self.fail_on_insert == Some(self.inserts) {
            return Err(ConnectorError::write("insert rejected"));
        }
        self.received.lock().unwrap().push(batch);
        Ok(())
    }

    fn pending_rows(&self) -> usize {
        self.pending
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ConnectorError::close("destination close failed"));
        }
        Ok(())
    }
}

type LogLines = Arc<Mutex<Vec<(LogLevel, String, Option<JsonValue>)>>>;

fn collecting_logger() -> (
    LogLines,
    impl Fn(LogLevel, &str, Option<&JsonValue>) + Send + Sync + 'static,
) {
    let lines: LogLines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let logger = move |level: LogLevel, message: &str, data: Option<&JsonValue>| {
        sink.lock()
            .unwrap()
            .push((level, message.to_string(), data.cloned()));
    };
    (lines, logger)
}

fn five_rows() -> Vec<Vec<Record>> {
    vec![
        vec![record! { "id" => 1 }, record! { "id" => 2 }],
        vec![record! { "id" => 3 }, record! { "id" => 4 }],
        vec![record! { "id" => 5 }],
    ]
}

#[tokio::test]
async fn run_moves_every_batch_and_tracks_progress() {
    let source = MockSource::new(five_rows());
    let destination = MockDestination::new();
    let received = destination.received.clone();
    let (src_calls, dst_calls) = (source.calls.clone(), destination.calls.clone());

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let metrics = pipeline.run().await.unwrap();

    assert_eq!(metrics.batch_count, 3);
    assert_eq!(metrics.total_rows, 5);
    let cursor = metrics.cursor.unwrap();
    assert_eq!(cursor.position, 5);
    assert_eq!(cursor.last_item, record! { "id" => 5 });

    let received = received.lock().unwrap();
    let sizes: Vec<usize> = received.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    assert_eq!(src_calls.closes(), 1);
    assert_eq!(dst_calls.closes(), 1);
    assert_eq!(pipeline.state(), PipelineState::CleanedUp);
}

#[tokio::test]
async fn write_failure_stops_the_run_with_last_cursor() {
    let source = MockSource::new(five_rows());
    let mut destination = MockDestination::new();
    destination.fail_on_insert = Some(2);
    let (src_calls, dst_calls) = (source.calls.clone(), destination.calls.clone());
    let (lines, logger) = collecting_logger();

    let mut pipeline =
        Pipeline::new(Box::new(source), Box::new(destination)).with_logger(logger);
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Write { .. }));
    let cursor = err.cursor().unwrap();
    assert_eq!(cursor.position, 2);
    assert_eq!(cursor.last_item, record! { "id" => 2 });

    let metrics = pipeline.metrics();
    assert_eq!(metrics.batch_count, 1);
    assert_eq!(metrics.total_rows, 2);

    assert_eq!(src_calls.closes(), 1);
    assert_eq!(dst_calls.closes(), 1);

    let lines = lines.lock().unwrap();
    let failure = lines
        .iter()
        .find(|(level, message, _)| *level == LogLevel::Error && message == "Processing failed")
        .unwrap();
    let data = failure.2.as_ref().unwrap();
    assert_eq!(data["cursor"]["position"], 2);
}

#[tokio::test]
async fn fetch_failure_reports_progress_so_far() {
    let mut source = MockSource::new(five_rows());
    source.fail_at = Some(1);
    let destination = MockDestination::new();

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch { .. }));
    assert_eq!(err.cursor().map(|c| c.position), Some(2));
    assert_eq!(pipeline.metrics().batch_count, 1);
}

#[tokio::test]
async fn transform_reshapes_batches_but_cursor_keeps_source_row() {
    let source = MockSource::new(vec![vec![
        record! { "id" => 1, "secret" => "x" },
        record! { "id" => 2, "secret" => "y" },
    ]]);
    let destination = MockDestination::new();
    let received = destination.received.clone();

    let drop_secret = |batch: Batch| -> Result<Batch, TransformError> {
        Ok(batch
            .into_iter()
            .map(|mut row| {
                row.remove("secret");
                row
            })
            .collect())
    };

    let mut pipeline =
        Pipeline::new(Box::new(source), Box::new(destination)).with_transform(drop_secret);
    let metrics = pipeline.run().await.unwrap();

    let received = received.lock().unwrap();
    assert!(received[0].iter().all(|row| !row.contains("secret")));
    let last_item = metrics.cursor.unwrap().last_item;
    assert_eq!(last_item.get("secret"), Some(&Value::from("y")));
}

#[tokio::test]
async fn transform_failure_is_not_written() {
    let source = MockSource::new(five_rows());
    let destination = MockDestination::new();
    let received = destination.received.clone();

    let reject = |_: Batch| -> Result<Batch, TransformError> {
        Err(TransformError::Failed("bad row".into()))
    };

    let mut pipeline =
        Pipeline::new(Box::new(source), Box::new(destination)).with_transform(reject);
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Transform { cursor: None, .. }));
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_source_completes_with_zero_metrics() {
    let source = MockSource::new(vec![vec![]]);
    let destination = MockDestination::new();
    let received = destination.received.clone();

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let metrics = pipeline.run().await.unwrap();

    assert_eq!(metrics.batch_count, 0);
    assert!(metrics.cursor.is_none());
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn connect_is_idempotent() {
    let source = MockSource::new(vec![]);
    let destination = MockDestination::new();
    let (src_calls, dst_calls) = (source.calls.clone(), destination.calls.clone());

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    pipeline.connect().await.unwrap();
    pipeline.connect().await.unwrap();

    assert_eq!(src_calls.connects(), 1);
    assert_eq!(dst_calls.connects(), 1);
    assert!(pipeline.is_connected());
    assert_eq!(pipeline.state(), PipelineState::Connected);
}

#[tokio::test]
async fn process_requires_connect() {
    let mut pipeline = Pipeline::new(
        Box::new(MockSource::new(five_rows())),
        Box::new(MockDestination::new()),
    );

    let err = pipeline.process().await.unwrap_err();
    assert!(matches!(err, PipelineError::NotConnected));
}

#[tokio::test]
async fn destination_connect_failure_cleans_up_both_sides() {
    let source = MockSource::new(five_rows());
    let mut destination = MockDestination::new();
    destination.fail_connect = true;
    let (src_calls, dst_calls) = (source.calls.clone(), destination.calls.clone());

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Connection {
            side: Side::Destination,
            ..
        }
    ));
    assert_eq!(src_calls.closes(), 1);
    assert_eq!(dst_calls.closes(), 1);
    assert!(!pipeline.is_connected());
}

#[tokio::test]
async fn source_connect_failure_skips_destination_connect() {
    let mut source = MockSource::new(five_rows());
    source.fail_connect = true;
    let destination = MockDestination::new();
    let dst_calls = destination.calls.clone();

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.connect().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Connection {
            side: Side::Source,
            ..
        }
    ));
    assert_eq!(dst_calls.connects(), 0);
}

#[tokio::test]
async fn single_close_failure_is_logged_not_raised() {
    let mut source = MockSource::new(five_rows());
    source.fail_close = true;
    let destination = MockDestination::new();
    let dst_calls = destination.calls.clone();
    let (lines, logger) = collecting_logger();

    let mut pipeline =
        Pipeline::new(Box::new(source), Box::new(destination)).with_logger(logger);
    pipeline.run().await.unwrap();

    assert_eq!(dst_calls.closes(), 1);
    assert!(lines.lock().unwrap().iter().any(|(level, message, _)| {
        *level == LogLevel::Error && message == "Failed to close source"
    }));
}

#[tokio::test]
async fn both_close_failures_are_raised() {
    let mut source = MockSource::new(five_rows());
    source.fail_close = true;
    let mut destination = MockDestination::new();
    destination.fail_close = true;

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Cleanup { .. }));
    assert_eq!(pipeline.metrics().total_rows, 5);
}

#[tokio::test]
async fn destination_close_failure_fails_an_otherwise_clean_run() {
    let source = MockSource::new(five_rows());
    let mut destination = MockDestination::new();
    destination.fail_close = true;
    destination.pending = 1;

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Write { cursor: None, .. }));
    let metrics = pipeline.metrics();
    assert_eq!(metrics.total_rows, 5);
    assert!(metrics.checkpoint.is_none());
}

#[tokio::test]
async fn checkpoint_lags_while_destination_holds_rows() {
    let source = MockSource::new(five_rows());
    let mut destination = MockDestination::new();
    destination.pending = 1;

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let handle = pipeline.subscribe();
    pipeline.connect().await.unwrap();
    pipeline.process().await.unwrap();

    assert_eq!(handle.snapshot().total_rows, 5);
    assert!(handle.snapshot().checkpoint.is_none());

    pipeline.cleanup().await.unwrap();
    let checkpoint = pipeline.metrics().checkpoint.unwrap();
    assert_eq!(checkpoint.position, 5);
    assert_eq!(checkpoint.last_item, record! { "id" => 5 });
}

#[tokio::test]
async fn clean_close_commits_rows_held_at_a_fetch_failure() {
    let mut source = MockSource::new(five_rows());
    source.fail_at = Some(1);
    let mut destination = MockDestination::new();
    destination.pending = 2;

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch { cursor: None, .. }));
    let checkpoint = pipeline.metrics().checkpoint.unwrap();
    assert_eq!(checkpoint.position, 2);
}

#[tokio::test]
async fn processing_error_wins_over_cleanup_error() {
    let mut source = MockSource::new(five_rows());
    source.fail_close = true;
    let mut destination = MockDestination::new();
    destination.fail_close = true;
    destination.fail_on_insert = Some(1);

    let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Write { cursor: None, .. }));
}

#[tokio::test]
async fn subscribers_see_final_metrics() {
    let mut pipeline = Pipeline::new(
        Box::new(MockSource::new(five_rows())),
        Box::new(MockDestination::new()),
    );
    let handle = pipeline.subscribe();

    pipeline.run().await.unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.batch_count, 3);
    assert_eq!(snapshot.total_rows, 5);
}

#[tokio::test]
async fn info_and_debug_events_reach_the_logger() {
    let (lines, logger) = collecting_logger();
    let mut pipeline = Pipeline::new(
        Box::new(MockSource::new(five_rows())),
        Box::new(MockDestination::new()),
    )
    .with_logger(logger);

    pipeline.run().await.unwrap();

    let lines = lines.lock().unwrap();
    let batches = lines
        .iter()
        .filter(|(level, message, _)| *level == LogLevel::Debug && message == "Batch processed")
        .count();
    assert_eq!(batches, 3);
    assert!(lines.iter().any(|(level, message, _)| {
        *level == LogLevel::Info && message == "Processing completed"
    }));
}
