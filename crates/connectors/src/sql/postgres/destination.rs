use crate::{
    error::DbError,
    sql::{
        ddl::{CreateTable, HintSupport, TableSpec},
        dialect::Postgres,
        postgres::{params::PgParamStore, utils::connect_client},
        query::QueryGenerator,
    },
};
use async_trait::async_trait;
use engine_core::{
    connectors::destination::Destination,
    error::ConnectorError,
    writer::{BatchedWriter, FlushTarget, WriterConfig},
};
use futures_util::{FutureExt, StreamExt, TryStreamExt, future::BoxFuture, stream};
use model::records::{batch::Batch, record::Record};
use std::collections::HashMap;
use tokio_postgres::{Client, Statement};
use tracing::{debug, info};

const NAME: &str = "postgres destination";

/// Writes batches to a Postgres table.
///
/// Immediate flush: `insert` writes every row before it returns, one
/// `INSERT` per row with up to `concurrency` statements pipelined on the
/// connection. `connect()` must be called first; `insert` on an unconnected
/// destination fails without attempting to connect. Retries default to
/// [`RetryPolicy::for_database`](engine_core::retry::RetryPolicy::for_database).
pub struct PostgresDestination {
    writer: BatchedWriter,
    sink: PgSink,
}

impl PostgresDestination {
    pub fn new(url: impl Into<String>, table: impl Into<String>, config: WriterConfig) -> Self {
        Self {
            writer: BatchedWriter::immediate(config),
            sink: PgSink {
                url: url.into(),
                table: table.into(),
                table_spec: None,
                table_ready: false,
                client: None,
                statements: HashMap::new(),
            },
        }
    }

    /// Creates the table from `spec` before the first write if it is missing.
    pub fn with_table_spec(mut self, spec: TableSpec) -> Self {
        self.sink.table_spec = Some(spec);
        self
    }

    pub fn create_table_sql(&self) -> Option<String> {
        self.sink.create_table_sql()
    }
}

struct PgSink {
    url: String,
    table: String,
    table_spec: Option<TableSpec>,
    table_ready: bool,
    client: Option<Client>,
    statements: HashMap<String, Statement>,
}

impl PgSink {
    fn client(&self) -> Result<&Client, ConnectorError> {
        self.client.as_ref().ok_or(ConnectorError::NotConnected(NAME))
    }

    fn create_table_sql(&self) -> Option<String> {
        let spec = self.table_spec.as_ref()?;
        let support = HintSupport {
            partition: true,
            engine: false,
        };
        Some(CreateTable::new(&self.table, spec).to_sql(&Postgres, support))
    }

    async fn exec(&self, sql: &str) -> Result<(), ConnectorError> {
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(|e| DbError::from(e).into_write())
    }
}

#[async_trait]
impl FlushTarget for PgSink {
    async fn prepare(&mut self) -> Result<(), ConnectorError> {
        if self.table_ready {
            return Ok(());
        }
        if let Some(ddl) = self.create_table_sql() {
            self.exec(&ddl).await?;
            info!(table = %self.table, "Ensured destination table exists");
        }
        self.table_ready = true;
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), ConnectorError> {
        self.exec("BEGIN").await
    }

    async fn write(&mut self, rows: &[Record], concurrency: usize) -> Result<(), ConnectorError> {
        let client = self.client.as_ref().ok_or(ConnectorError::NotConnected(NAME))?;
        let generator = QueryGenerator::new(&Postgres);
        let inserts: Vec<_> = rows
            .iter()
            .map(|row| generator.insert_row(&self.table, row))
            .collect();

        for (sql, _) in &inserts {
            if !self.statements.contains_key(sql) {
                let stmt = client
                    .prepare(sql)
                    .await
                    .map_err(|e| DbError::from(e).into_write())?;
                self.statements.insert(sql.clone(), stmt);
            }
        }

        let pending: Vec<BoxFuture<'_, Result<u64, ConnectorError>>> = inserts
            .into_iter()
            .map(|(sql, params)| {
                let stmt = self.statements.get(&sql).cloned();
                async move {
                    let stmt = stmt.ok_or_else(|| {
                        ConnectorError::write(format!("statement not prepared: {sql}"))
                    })?;
                    let bindings =
                        PgParamStore::coerce(&params, stmt.params()).map_err(DbError::into_write)?;
                    client
                        .execute(&stmt, &bindings.as_refs())
                        .await
                        .map_err(|e| DbError::from(e).into_write())
                }
                .boxed()
            })
            .collect();

        stream::iter(pending)
            .buffer_unordered(concurrency)
            .try_collect::<Vec<u64>>()
            .await?;

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ConnectorError> {
        self.exec("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), ConnectorError> {
        self.exec("ROLLBACK").await
    }
}

#[async_trait]
impl Destination for PostgresDestination {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.sink.client.is_some() {
            return Ok(());
        }
        let client = connect_client(&self.sink.url)
            .await
            .map_err(DbError::into_connection)?;
        self.sink.client = Some(client);
        info!(table = %self.sink.table, "Postgres destination connected");
        Ok(())
    }

    async fn insert(&mut self, batch: Batch) -> Result<(), ConnectorError> {
        if self.sink.client.is_none() {
            return Err(ConnectorError::NotConnected(NAME));
        }
        let written = self.writer.insert(&mut self.sink, batch.into_rows()).await?;
        debug!(table = %self.sink.table, rows = written, "Batch written");
        Ok(())
    }

    fn pending_rows(&self) -> usize {
        self.writer.pending_len()
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        if self.sink.client.is_none() {
            return Ok(());
        }
        let flushed = self.writer.finish(&mut self.sink).await;
        self.sink.client = None;
        self.sink.statements.clear();
        info!(table = %self.sink.table, "Postgres destination closed");
        flushed.map(|_| ())
    }
}
