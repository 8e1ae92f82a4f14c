use model::error::ModelError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by source and destination adapters.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Establishing the connection (or pool) failed.
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),

    /// An operation that needs a live connection ran before `connect()`.
    #[error("{0} is not connected")]
    NotConnected(&'static str),

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] ModelError),

    /// Executing a read query failed.
    #[error("query failed: {0}")]
    Query(#[source] BoxError),

    /// A single write attempt failed. Retried by the batched writer.
    #[error("write failed: {0}")]
    Write(#[source] BoxError),

    /// A flush unit failed on every attempt.
    #[error("write failed after {attempts} attempt(s): {source}")]
    WriteExhausted {
        attempts: usize,
        #[source]
        source: Box<ConnectorError>,
    },

    /// Releasing the connection failed.
    #[error("close failed: {0}")]
    Close(#[source] BoxError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConnectorError {
    pub fn connection(err: impl Into<BoxError>) -> Self {
        ConnectorError::Connection(err.into())
    }

    pub fn query(err: impl Into<BoxError>) -> Self {
        ConnectorError::Query(err.into())
    }

    pub fn write(err: impl Into<BoxError>) -> Self {
        ConnectorError::Write(err.into())
    }

    pub fn close(err: impl Into<BoxError>) -> Self {
        ConnectorError::Close(err.into())
    }
}

/// Failure raised by a per-batch transform. Aborts the run.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("transformation failed: {0}")]
    Failed(String),

    #[error("field `{0}` is missing")]
    MissingField(String),
}
