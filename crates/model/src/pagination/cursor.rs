use crate::records::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress snapshot taken after every successfully written batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCursor {
    /// Cumulative number of source rows processed.
    pub position: u64,
    /// Last record of the most recent batch, as the source produced it.
    pub last_item: Record,
    pub timestamp: DateTime<Utc>,
}

impl PipelineCursor {
    pub fn new(position: u64, last_item: Record) -> Self {
        PipelineCursor {
            position,
            last_item,
            timestamp: Utc::now(),
        }
    }
}
