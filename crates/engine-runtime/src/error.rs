use engine_core::error::{ConnectorError, TransformError};
use model::pagination::cursor::PipelineCursor;
use std::fmt;
use thiserror::Error;

/// Which end of the pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

/// Errors that end a pipeline run.
///
/// Failures after connecting carry the cursor of the last batch that was
/// written, so a caller can resume from it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{side} connection failed: {source}")]
    Connection {
        side: Side,
        #[source]
        source: ConnectorError,
    },

    #[error("pipeline is not connected")]
    NotConnected,

    #[error("fetch failed: {source}")]
    Fetch {
        cursor: Option<PipelineCursor>,
        #[source]
        source: ConnectorError,
    },

    #[error("transform failed: {source}")]
    Transform {
        cursor: Option<PipelineCursor>,
        #[source]
        source: TransformError,
    },

    #[error("write failed: {source}")]
    Write {
        cursor: Option<PipelineCursor>,
        #[source]
        source: ConnectorError,
    },

    /// Both ends failed to close.
    #[error("cleanup failed: source: {source_error}; destination: {destination_error}")]
    Cleanup {
        source_error: ConnectorError,
        destination_error: ConnectorError,
    },
}

impl PipelineError {
    /// Last known progress when the error happened.
    pub fn cursor(&self) -> Option<&PipelineCursor> {
        match self {
            PipelineError::Fetch { cursor, .. }
            | PipelineError::Transform { cursor, .. }
            | PipelineError::Write { cursor, .. } => cursor.as_ref(),
            _ => None,
        }
    }
}
