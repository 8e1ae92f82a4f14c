use crate::{connectors::source::BatchStream, error::ConnectorError};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use model::{
    core::value::Value,
    pagination::query::QuerySpec,
    records::{batch::Batch, record::Record},
};
use tracing::debug;

/// Runs one parameterized read against a live connection.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, ConnectorError>;
}

enum PageState {
    Next(Vec<Value>),
    Done,
}

/// Turns a [`QuerySpec`] into a lazy stream of non-empty batches.
///
/// Each page rebinds `params[cursor_params_index]` to the cursor field of the
/// previous page's last row. The stream ends on an empty page, after the first
/// page when no cursor field is configured, or when the last row has no cursor
/// value. Read errors are yielded once and end the stream; reads are never
/// retried here.
pub fn paginate<'a>(executor: &'a dyn QueryExecutor, spec: QuerySpec) -> BatchStream<'a> {
    if let Err(err) = spec.validate() {
        return stream::once(async move { Err(ConnectorError::from(err)) }).boxed();
    }

    let initial = PageState::Next(spec.params.clone());
    stream::unfold(
        (initial, spec, 0usize),
        move |(state, spec, page)| async move {
            let PageState::Next(params) = state else {
                return None;
            };

            let rows = match executor.query(&spec.query, &params).await {
                Ok(rows) => rows,
                Err(err) => return Some((Err(err), (PageState::Done, spec, page))),
            };

            if rows.is_empty() {
                debug!(page, "Empty page, pagination finished");
                return None;
            }

            let batch = Batch::new(rows);
            let next = match (spec.cursor_params_index, batch.last()) {
                (Some(index), Some(last)) if spec.cursor_field.is_some() => {
                    match spec.cursor_value(last) {
                        Some(cursor) => {
                            debug!(page, rows = batch.len(), cursor = %cursor, "Fetched page");
                            let mut params = params;
                            params[index] = cursor;
                            PageState::Next(params)
                        }
                        None => {
                            debug!(
                                page,
                                field = spec.cursor_field.as_deref().unwrap_or_default(),
                                "Last row has no cursor value, stopping pagination"
                            );
                            PageState::Done
                        }
                    }
                }
                _ => PageState::Done,
            };

            Some((Ok(batch), (next, spec, page + 1)))
        },
    )
    .boxed()
}
