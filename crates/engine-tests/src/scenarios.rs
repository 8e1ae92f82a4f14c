#[cfg(test)]
mod tests {
    use crate::fixtures::{FlakyDestination, PagedSource, RecordingDestination, ScriptedExecutor};
    use engine_core::{
        error::{ConnectorError, TransformError},
        logger::TracingLogger,
        retry::RetryPolicy,
        transform::{mapping::RenameFields, pipeline::TransformPipeline, pruner::DropFields},
        writer::WriterConfig,
    };
    use engine_runtime::{
        checkpoint::CheckpointStore, error::PipelineError, pipeline::Pipeline,
    };
    use model::{
        core::value::Value,
        pagination::query::QuerySpec,
        record,
        records::{batch::Batch, record::Record},
    };
    use std::time::Duration;
    use tracing_test::traced_test;

    fn id_rows(ids: &[i64]) -> Vec<Record> {
        ids.iter().map(|id| record! { "id" => *id }).collect()
    }

    fn cursor_spec() -> QuerySpec {
        QuerySpec::new(
            "SELECT id FROM users WHERE id > $1 ORDER BY id LIMIT 2",
            vec![Value::Int(0)],
        )
        .with_cursor("id", 0)
    }

    fn ids(batch: &Batch) -> Vec<i64> {
        batch
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .collect()
    }

    #[traced_test]
    #[tokio::test]
    async fn batches_arrive_in_order_and_are_counted() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2]), id_rows(&[3])]);
        let source = PagedSource::new(executor, cursor_spec());
        let destination = RecordingDestination::default();
        let received = destination.received.clone();

        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination))
            .with_logger(TracingLogger::for_pipeline("users-copy"));
        let metrics = pipeline.run().await.unwrap();

        let received = received.lock().unwrap();
        let batches: Vec<Vec<i64>> = received.iter().map(ids).collect();
        assert_eq!(batches, vec![vec![1, 2], vec![3]]);
        assert_eq!(metrics.total_rows, 3);
        assert_eq!(metrics.batch_count, 2);
        assert!(logs_contain("Processing completed"));
    }

    #[tokio::test]
    async fn cursor_snapshot_keeps_untransformed_row() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2])]);
        let source = PagedSource::new(executor, QuerySpec::new("SELECT id FROM users", vec![]));
        let destination = RecordingDestination::default();
        let received = destination.received.clone();

        let times_ten = |batch: Batch| -> Result<Batch, TransformError> {
            batch
                .into_iter()
                .map(|mut row| -> Result<Record, TransformError> {
                    let id = row
                        .get("id")
                        .and_then(Value::as_i64)
                        .ok_or_else(|| TransformError::MissingField("id".into()))?;
                    row.set("id", id * 10);
                    Ok(row)
                })
                .collect()
        };

        let mut pipeline =
            Pipeline::new(Box::new(source), Box::new(destination)).with_transform(times_ten);
        let metrics = pipeline.run().await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(ids(&received[0]), vec![10, 20]);
        assert_eq!(metrics.cursor.unwrap().last_item, record! { "id" => 2i64 });
    }

    #[tokio::test]
    async fn paginator_rebinds_cursor_until_empty_page() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2]), id_rows(&[3]), vec![]]);
        let calls = executor.calls();
        let source = PagedSource::new(executor, cursor_spec());
        let destination = RecordingDestination::default();
        let received = destination.received.clone();

        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
        pipeline.run().await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![vec![Value::Int(0)], vec![Value::Int(2)], vec![Value::Int(3)]]
        );
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[traced_test]
    #[tokio::test]
    async fn flush_unit_retries_until_commit() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2])]);
        let source = PagedSource::new(executor, QuerySpec::new("SELECT id FROM users", vec![]));
        let config = WriterConfig {
            retry: RetryPolicy::fixed(3, Duration::ZERO),
            ..WriterConfig::default()
        };
        let destination = FlakyDestination::new(2, config);
        let statements = destination.statements();

        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
        let metrics = pipeline.run().await.unwrap();

        let statements = statements.lock().unwrap();
        assert_eq!(statements.begins, 3);
        assert_eq!(statements.rollbacks, 2);
        assert_eq!(statements.commits, 1);
        assert_eq!(statements.committed_rows, id_rows(&[1, 2]));
        assert_eq!(metrics.batch_count, 1);
        assert_eq!(metrics.total_rows, 2);
        assert!(logs_contain("Flush unit failed, retrying"));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_run() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2])]);
        let source = PagedSource::new(executor, cursor_spec());
        let config = WriterConfig {
            retry: RetryPolicy::fixed(1, Duration::ZERO),
            ..WriterConfig::default()
        };
        let destination = FlakyDestination::new(5, config);
        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
        let err = pipeline.run().await.unwrap_err();

        match err {
            PipelineError::Write {
                cursor,
                source: ConnectorError::WriteExhausted { attempts, .. },
            } => {
                assert_eq!(attempts, 2);
                assert!(cursor.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pipeline.metrics().batch_count, 0);
    }

    #[tokio::test]
    async fn built_in_transform_chain_reshapes_rows() {
        let executor = ScriptedExecutor::new(vec![vec![
            record! { "id" => 1, "name" => "Ann", "password" => "x" },
        ]]);
        let source = PagedSource::new(executor, QuerySpec::new("SELECT * FROM users", vec![]));
        let destination = RecordingDestination::default();
        let received = destination.received.clone();

        let chain = TransformPipeline::new()
            .add_transform(RenameFields::new([("name", "full_name")]))
            .add_transform(DropFields::new(["password"]));

        let mut pipeline =
            Pipeline::new(Box::new(source), Box::new(destination)).with_transform(chain);
        pipeline.run().await.unwrap();

        let received = received.lock().unwrap();
        let row = &received[0].rows[0];
        let names: Vec<&str> = row.names().collect();
        assert_eq!(names, vec!["id", "full_name"]);
    }

    #[tokio::test]
    async fn checkpoint_resumes_where_the_last_run_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();

        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2]), id_rows(&[3])]);
        let source = PagedSource::new(executor, cursor_spec());
        let mut pipeline =
            Pipeline::new(Box::new(source), Box::new(RecordingDestination::default()));
        let metrics = pipeline.run().await.unwrap();
        store.save("users", metrics.cursor.as_ref().unwrap()).unwrap();

        let checkpoint = store.load("users").unwrap().unwrap();
        let resumed = cursor_spec().resume_from(&checkpoint.last_item).unwrap();

        let executor = ScriptedExecutor::new(vec![id_rows(&[4])]);
        let calls = executor.calls();
        let source = PagedSource::new(executor, resumed);
        let mut pipeline =
            Pipeline::new(Box::new(source), Box::new(RecordingDestination::default()));
        pipeline.run().await.unwrap();

        assert_eq!(calls.lock().unwrap()[0], vec![Value::Int(3)]);
    }

    fn no_retry() -> WriterConfig {
        WriterConfig {
            batch_size: 3,
            retry: RetryPolicy::none(),
            ..WriterConfig::default()
        }
    }

    #[tokio::test]
    async fn buffered_rows_are_not_checkpointed_until_committed() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2]), id_rows(&[3, 4])]);
        let source = PagedSource::new(executor, cursor_spec());
        let destination = FlakyDestination::buffered(usize::MAX, no_retry());
        let statements = destination.statements();

        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::Write { .. }));
        assert!(err.cursor().is_none());
        assert!(pipeline.metrics().checkpoint.is_none());
        assert!(statements.lock().unwrap().committed_rows.is_empty());
    }

    #[tokio::test]
    async fn failed_final_flush_fails_the_run() {
        let executor = ScriptedExecutor::new(vec![id_rows(&[1, 2])]);
        let source = PagedSource::new(executor, cursor_spec());
        let destination = FlakyDestination::buffered(usize::MAX, no_retry());

        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
        let err = pipeline.run().await.unwrap_err();

        match err {
            PipelineError::Write {
                cursor,
                source: ConnectorError::WriteExhausted { attempts, .. },
            } => {
                assert_eq!(attempts, 1);
                assert!(cursor.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
        let metrics = pipeline.metrics();
        assert_eq!(metrics.total_rows, 2);
        assert!(metrics.checkpoint.is_none());
    }

    #[tokio::test]
    async fn checkpoint_follows_committed_units_and_final_flush() {
        let executor =
            ScriptedExecutor::new(vec![id_rows(&[1, 2]), id_rows(&[3, 4]), id_rows(&[5, 6])]);
        let source = PagedSource::new(executor, cursor_spec());
        let destination = FlakyDestination::buffered(0, no_retry());
        let statements = destination.statements();
        let mut pipeline = Pipeline::new(Box::new(source), Box::new(destination));
        let handle = pipeline.subscribe();

        let metrics = pipeline.run().await.unwrap();

        assert_eq!(statements.lock().unwrap().committed_rows, id_rows(&[1, 2, 3, 4, 5, 6]));
        let checkpoint = metrics.checkpoint.unwrap();
        assert_eq!(checkpoint.position, 6);
        assert_eq!(checkpoint.last_item, record! { "id" => 6 });
        assert_eq!(handle.snapshot().checkpoint.map(|c| c.position), Some(6));
    }
}
