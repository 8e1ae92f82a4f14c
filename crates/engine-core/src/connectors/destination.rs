use crate::error::ConnectorError;
use async_trait::async_trait;
use model::records::batch::Batch;

/// A writable backend.
#[async_trait]
pub trait Destination: Send {
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Persists a batch. Adapters that buffer may hold rows until a later
    /// call or until `close()`.
    async fn insert(&mut self, batch: Batch) -> Result<(), ConnectorError>;

    /// Rows accepted by `insert` that are not committed yet.
    fn pending_rows(&self) -> usize {
        0
    }

    /// Flushes anything still buffered, then releases the connection.
    async fn close(&mut self) -> Result<(), ConnectorError>;
}
