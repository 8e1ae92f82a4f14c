use crate::error::CliError;
use model::{execution::metrics::PipelineMetrics, pagination::cursor::PipelineCursor};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// What `sluice run` prints when it finishes.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub status: RunStatus,
    pub batches: u64,
    pub rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<u64>,
    pub cursor: Option<PipelineCursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(pipeline: &str, metrics: &PipelineMetrics, cursor: Option<PipelineCursor>) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            status: RunStatus::Completed,
            batches: metrics.batch_count,
            rows: metrics.total_rows,
            resumed_from: None,
            cursor,
            error: None,
        }
    }

    pub fn failed(mut self, error: impl ToString) -> Self {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(CliError::JsonSerialize)?;
    println!("{json}");
    Ok(())
}

pub fn print_cursor_table(pipeline: &str, cursor: &PipelineCursor) {
    println!("Progress for pipeline '{pipeline}':");
    println!("-----------------------------");
    println!("{:<16} {}", "Rows done", cursor.position);
    println!("{:<16} {}", "Last item", cursor.last_item.to_json());
    println!("{:<16} {}", "Saved at", cursor.timestamp.to_rfc3339());
}

pub fn print_checkpoint_list(entries: &[(String, PipelineCursor)]) {
    if entries.is_empty() {
        println!("No checkpoints stored");
        return;
    }
    println!("{:<24} {:>12}  {}", "Pipeline", "Rows done", "Saved at");
    for (pipeline, cursor) in entries {
        println!(
            "{:<24} {:>12}  {}",
            pipeline,
            cursor.position,
            cursor.timestamp.to_rfc3339()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::record;

    #[test]
    fn failed_summary_carries_error_and_cursor() {
        let mut metrics = PipelineMetrics::default();
        metrics.record_batch(2, record! { "id" => 2 });

        let summary = RunSummary::new("users", &metrics, metrics.cursor.clone()).failed("boom");
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["rows"], 2);
        assert_eq!(json["error"], "boom");
        assert_eq!(json["cursor"]["last_item"]["id"], 2);
        assert!(json.get("resumed_from").is_none());
    }
}
