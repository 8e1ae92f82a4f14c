use crate::{
    error::{PipelineError, Side},
    state::PipelineState,
};
use engine_core::{
    connectors::{destination::Destination, source::Source},
    error::ConnectorError,
    logger::{LogLevel, PipelineLogger},
    transform::pipeline::Transform,
};
use futures::StreamExt;
use model::{execution::metrics::PipelineMetrics, pagination::cursor::PipelineCursor};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tokio::sync::watch;

/// Read-only view of a pipeline's metrics that can outlive borrows of the
/// pipeline itself, e.g. for a progress reporter on another task.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    rx: watch::Receiver<PipelineMetrics>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> PipelineMetrics {
        self.rx.borrow().clone()
    }

    /// Waits for the next batch to be accounted. Returns `false` once the
    /// pipeline has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Moves every batch from a source to a destination, optionally reshaping
/// it on the way.
///
/// Batches are processed strictly one at a time: the next batch is not
/// fetched until the previous one has been transformed and inserted.
pub struct Pipeline {
    source: Box<dyn Source>,
    destination: Box<dyn Destination>,
    transform: Option<Box<dyn Transform>>,
    logger: Option<Arc<dyn PipelineLogger>>,
    connected: bool,
    state: PipelineState,
    metrics: watch::Sender<PipelineMetrics>,
    /// Set once a write fails; rows accepted before it may have been dropped.
    write_failed: bool,
}

impl Pipeline {
    pub fn new(source: Box<dyn Source>, destination: Box<dyn Destination>) -> Self {
        let (metrics, _) = watch::channel(PipelineMetrics::default());
        Self {
            source,
            destination,
            transform: None,
            logger: None,
            connected: false,
            state: PipelineState::Idle,
            metrics,
            write_failed: false,
        }
    }

    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn with_logger(mut self, logger: impl PipelineLogger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn with_shared_logger(mut self, logger: Arc<dyn PipelineLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Counters as of the last written batch. Never reset by a failure.
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.borrow().clone()
    }

    pub fn subscribe(&self) -> MetricsHandle {
        MetricsHandle {
            rx: self.metrics.subscribe(),
        }
    }

    /// Connects the source, then the destination. A second call is a no-op.
    ///
    /// If either side fails, both are closed before the error is returned.
    pub async fn connect(&mut self) -> Result<(), PipelineError> {
        if self.connected {
            self.log(LogLevel::Debug, "Pipeline already connected", None);
            return Ok(());
        }

        self.log(
            LogLevel::Info,
            "Connecting pipeline",
            Some(json!({
                "source": self.source.name(),
                "destination": self.destination.name(),
            })),
        );

        let connected = match self.source.connect().await {
            Ok(()) => self
                .destination
                .connect()
                .await
                .map_err(|source| PipelineError::Connection {
                    side: Side::Destination,
                    source,
                }),
            Err(source) => Err(PipelineError::Connection {
                side: Side::Source,
                source,
            }),
        };

        if let Err(err) = connected {
            self.log(
                LogLevel::Error,
                "Pipeline connection failed",
                Some(json!({ "error": err.to_string() })),
            );
            self.state = PipelineState::Failed;
            if let Err(cleanup_err) = self.cleanup().await {
                self.log(
                    LogLevel::Error,
                    "Cleanup after failed connect also failed",
                    Some(json!({ "error": cleanup_err.to_string() })),
                );
            }
            return Err(err);
        }

        self.connected = true;
        self.state = PipelineState::Connected;
        self.log(LogLevel::Info, "Pipeline connected", None);
        Ok(())
    }

    /// Drains the source into the destination.
    ///
    /// Does not connect or clean up. On failure, metrics keep the progress
    /// made so far and the error carries the last committed cursor.
    pub async fn process(&mut self) -> Result<PipelineMetrics, PipelineError> {
        if !self.connected {
            return Err(PipelineError::NotConnected);
        }

        self.state = PipelineState::Processing;
        self.log(LogLevel::Info, "Processing started", None);

        let outcome = drive(
            self.source.as_ref(),
            self.destination.as_mut(),
            self.transform.as_deref(),
            &self.metrics,
            self.logger.as_deref(),
        )
        .await;

        let metrics = self.metrics();
        match outcome {
            Ok(()) => {
                self.state = PipelineState::Completed;
                self.log(
                    LogLevel::Info,
                    "Processing completed",
                    Some(json!({
                        "batches": metrics.batch_count,
                        "rows": metrics.total_rows,
                    })),
                );
                Ok(metrics)
            }
            Err(err) => {
                self.state = PipelineState::Failed;
                self.write_failed |= matches!(err, PipelineError::Write { .. });
                self.log(
                    LogLevel::Error,
                    "Processing failed",
                    Some(json!({
                        "error": err.to_string(),
                        "cursor": err.cursor(),
                        "batches": metrics.batch_count,
                        "rows": metrics.total_rows,
                    })),
                );
                Err(err)
            }
        }
    }

    /// Closes both sides independently.
    ///
    /// A single failing side is logged and swallowed; an error is returned
    /// only when both fail. A clean destination close moves the checkpoint
    /// up to the last accepted batch.
    pub async fn cleanup(&mut self) -> Result<(), PipelineError> {
        match self.close_sides().await {
            (Err(source_error), Err(destination_error)) => Err(PipelineError::Cleanup {
                source_error,
                destination_error,
            }),
            _ => Ok(()),
        }
    }

    /// Connects, processes and cleans up. Cleanup runs exactly once whatever
    /// the outcome; a processing error takes precedence over a cleanup error.
    ///
    /// After a successful `process`, a destination that fails to close has
    /// not committed everything it accepted, so the run fails with a write
    /// error carrying the last committed checkpoint.
    pub async fn run(&mut self) -> Result<PipelineMetrics, PipelineError> {
        self.connect().await?;

        let processed = self.process().await;
        let (source_closed, destination_closed) = self.close_sides().await;

        match (processed, source_closed, destination_closed) {
            (Err(err), _, _) => Err(err),
            (Ok(_), Err(source_error), Err(destination_error)) => Err(PipelineError::Cleanup {
                source_error,
                destination_error,
            }),
            (Ok(_), _, Err(source)) => Err(PipelineError::Write {
                cursor: last_cursor(&self.metrics),
                source,
            }),
            (Ok(_), _, Ok(())) => Ok(self.metrics()),
        }
    }

    async fn close_sides(&mut self) -> (Result<(), ConnectorError>, Result<(), ConnectorError>) {
        self.log(LogLevel::Debug, "Cleaning up pipeline", None);

        let source_result = self.source.close().await;
        if let Err(err) = &source_result {
            self.log(
                LogLevel::Error,
                "Failed to close source",
                Some(json!({ "error": err.to_string() })),
            );
        }

        let destination_result = self.destination.close().await;
        if let Err(err) = &destination_result {
            self.log(
                LogLevel::Error,
                "Failed to close destination",
                Some(json!({ "error": err.to_string() })),
            );
        }

        // A clean close has flushed every accepted row, unless a failed write
        // already dropped some of them.
        if destination_result.is_ok() && !self.write_failed {
            self.metrics.send_modify(PipelineMetrics::mark_committed);
        }

        self.connected = false;
        self.state = PipelineState::CleanedUp;
        if source_result.is_ok() || destination_result.is_ok() {
            self.log(LogLevel::Info, "Pipeline cleaned up", None);
        }

        (source_result, destination_result)
    }

    fn log(&self, level: LogLevel, message: &str, data: Option<JsonValue>) {
        emit(self.logger.as_deref(), level, message, data);
    }
}

fn emit(
    logger: Option<&dyn PipelineLogger>,
    level: LogLevel,
    message: &str,
    data: Option<JsonValue>,
) {
    if let Some(logger) = logger {
        logger.log(level, message, data.as_ref());
    }
}

/// The resume point errors report: the last fully committed cursor.
fn last_cursor(metrics: &watch::Sender<PipelineMetrics>) -> Option<PipelineCursor> {
    metrics.borrow().checkpoint.clone()
}

async fn drive(
    source: &dyn Source,
    destination: &mut dyn Destination,
    transform: Option<&dyn Transform>,
    metrics: &watch::Sender<PipelineMetrics>,
    logger: Option<&dyn PipelineLogger>,
) -> Result<(), PipelineError> {
    let mut batches = source.fetch();

    while let Some(next) = batches.next().await {
        let batch = next.map_err(|source| PipelineError::Fetch {
            cursor: last_cursor(metrics),
            source,
        })?;

        let Some(last_item) = batch.last().cloned() else {
            emit(logger, LogLevel::Debug, "Skipping empty batch", None);
            continue;
        };
        let rows = batch.len();

        let batch = match transform {
            Some(transform) => {
                transform
                    .apply(batch)
                    .map_err(|source| PipelineError::Transform {
                        cursor: last_cursor(metrics),
                        source,
                    })?
            }
            None => batch,
        };

        destination
            .insert(batch)
            .await
            .map_err(|source| PipelineError::Write {
                cursor: last_cursor(metrics),
                source,
            })?;

        let committed = destination.pending_rows() == 0;
        let mut progress = (0, 0);
        metrics.send_modify(|m| {
            m.record_batch(rows, last_item);
            if committed {
                m.mark_committed();
            }
            progress = (m.batch_count, m.total_rows);
        });

        emit(
            logger,
            LogLevel::Debug,
            "Batch processed",
            Some(json!({
                "batch": progress.0,
                "rows": rows,
                "position": progress.1,
                "committed": committed,
            })),
        );
    }

    Ok(())
}
