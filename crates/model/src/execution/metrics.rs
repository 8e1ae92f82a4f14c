use crate::{pagination::cursor::PipelineCursor, records::record::Record};
use serde::{Deserialize, Serialize};

/// Counters for one pipeline instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub batch_count: u64,
    pub total_rows: u64,
    pub cursor: Option<PipelineCursor>,
    /// Last cursor whose rows are all committed at the destination. Lags
    /// `cursor` while a buffering destination holds rows.
    #[serde(default)]
    pub checkpoint: Option<PipelineCursor>,
}

impl PipelineMetrics {
    /// Accounts for one written batch and replaces the cursor snapshot.
    pub fn record_batch(&mut self, rows: usize, last_item: Record) {
        self.batch_count += 1;
        self.total_rows += rows as u64;
        self.cursor = Some(PipelineCursor::new(self.total_rows, last_item));
    }

    /// Every batch recorded so far is committed.
    pub fn mark_committed(&mut self) {
        self.checkpoint = self.cursor.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn cursor_is_replaced_not_merged() {
        let mut metrics = PipelineMetrics::default();
        metrics.record_batch(2, record! { "id" => 2, "extra" => true });
        metrics.record_batch(1, record! { "id" => 3 });

        assert_eq!(metrics.batch_count, 2);
        assert_eq!(metrics.total_rows, 3);
        let cursor = metrics.cursor.unwrap();
        assert_eq!(cursor.position, 3);
        assert_eq!(cursor.last_item, record! { "id" => 3 });
    }

    #[test]
    fn checkpoint_only_moves_when_marked() {
        let mut metrics = PipelineMetrics::default();
        metrics.record_batch(2, record! { "id" => 2 });
        metrics.mark_committed();
        metrics.record_batch(2, record! { "id" => 4 });

        assert_eq!(metrics.cursor.as_ref().unwrap().position, 4);
        assert_eq!(metrics.checkpoint.as_ref().unwrap().position, 2);

        metrics.mark_committed();
        assert_eq!(metrics.checkpoint, metrics.cursor);
    }
}
