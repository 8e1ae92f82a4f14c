use crate::error::ConnectorError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use model::records::batch::Batch;

/// Lazily fetched sequence of batches. `None` marks normal termination.
pub type BatchStream<'a> = BoxStream<'a, Result<Batch, ConnectorError>>;

/// A queryable backend that yields records in batches.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Starts a fresh pass over the configured query.
    ///
    /// The stream borrows the source, so it has to be dropped before
    /// `close()` can run.
    fn fetch(&self) -> BatchStream<'_>;

    async fn close(&mut self) -> Result<(), ConnectorError>;
}
