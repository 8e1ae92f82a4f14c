use crate::{
    error::DbError,
    sql::{
        ddl::{CreateTable, HintSupport, TableSpec},
        dialect::MySql,
        mysql::params::MySqlParamStore,
        query::{QueryGenerator, column_union},
    },
};
use async_trait::async_trait;
use engine_core::{
    connectors::destination::Destination,
    error::ConnectorError,
    retry::RetryPolicy,
    writer::{BatchedWriter, FlushTarget, WriterConfig},
};
use model::records::{batch::Batch, record::Record};
use mysql_async::{Conn, Opts, prelude::Queryable};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on bind parameters in one MySQL prepared statement.
const MAX_PLACEHOLDERS: usize = 65_535;

/// Writes batches to a MySQL table.
///
/// Buffered flush: `insert` queues rows and writes only complete units of
/// `batch_size` rows as multi-row `INSERT`s; `close()` writes the rest.
/// The connection is opened lazily on first use if `connect()` was not
/// called. Statements run one at a time on that connection, so
/// `concurrency` has no effect. Retries use a fixed delay by default.
pub struct MySqlDestination {
    writer: BatchedWriter,
    sink: MySqlSink,
}

impl MySqlDestination {
    pub fn new(url: impl Into<String>, table: impl Into<String>, config: WriterConfig) -> Self {
        Self {
            writer: BatchedWriter::buffered(config),
            sink: MySqlSink {
                url: url.into(),
                table: table.into(),
                table_spec: None,
                table_ready: false,
                conn: None,
            },
        }
    }

    /// Creates the table from `spec` before the first write if it is missing.
    pub fn with_table_spec(mut self, spec: TableSpec) -> Self {
        self.sink.table_spec = Some(spec);
        self
    }

    pub fn default_retry() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::from_secs(1))
    }

    pub fn create_table_sql(&self) -> Option<String> {
        self.sink.create_table_sql()
    }
}

struct MySqlSink {
    url: String,
    table: String,
    table_spec: Option<TableSpec>,
    table_ready: bool,
    conn: Option<Conn>,
}

impl MySqlSink {
    async fn ensure_connected(&mut self) -> Result<(), ConnectorError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let opts = Opts::from_url(&self.url)
            .map_err(|e| DbError::InvalidUrl(e.to_string()).into_connection())?;
        let conn = Conn::new(opts)
            .await
            .map_err(|e| DbError::from(e).into_connection())?;
        self.conn = Some(conn);
        info!(table = %self.table, "MySQL destination connected");
        Ok(())
    }

    fn conn(&mut self) -> Result<&mut Conn, ConnectorError> {
        self.conn
            .as_mut()
            .ok_or(ConnectorError::NotConnected("mysql destination"))
    }

    fn create_table_sql(&self) -> Option<String> {
        let spec = self.table_spec.as_ref()?;
        let support = HintSupport {
            partition: true,
            engine: true,
        };
        Some(CreateTable::new(&self.table, spec).to_sql(&MySql, support))
    }

    async fn exec(&mut self, sql: &str) -> Result<(), ConnectorError> {
        self.conn()?
            .query_drop(sql)
            .await
            .map_err(|e| DbError::from(e).into_write())
    }
}

#[async_trait]
impl FlushTarget for MySqlSink {
    async fn prepare(&mut self) -> Result<(), ConnectorError> {
        if self.table_ready {
            return Ok(());
        }
        // DDL commits implicitly in MySQL, so it runs before the transaction.
        if let Some(ddl) = self.create_table_sql() {
            self.exec(&ddl).await?;
            info!(table = %self.table, "Ensured destination table exists");
        }
        self.table_ready = true;
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), ConnectorError> {
        self.exec("START TRANSACTION").await
    }

    async fn write(&mut self, rows: &[Record], _concurrency: usize) -> Result<(), ConnectorError> {
        let width = column_union(rows).len().max(1);
        let rows_per_statement = (MAX_PLACEHOLDERS / width).max(1);
        let generator = QueryGenerator::new(&MySql);

        for chunk in rows.chunks(rows_per_statement) {
            let (sql, values) = generator.insert_rows(&self.table, chunk);
            let bindings = MySqlParamStore::from_values(&values).map_err(DbError::into_write)?;
            self.conn()?
                .exec_drop(sql, bindings.params())
                .await
                .map_err(|e| DbError::from(e).into_write())?;
        }
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
impl Destination for MySqlDestination {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.sink.ensure_connected().await
    }

    async fn insert(&mut self, batch: Batch) -> Result<(), ConnectorError> {
        self.sink.ensure_connected().await?;
        let written = self.writer.insert(&mut self.sink, batch.into_rows()).await?;
        debug!(
            table = %self.sink.table,
            rows = written,
            pending = self.writer.pending_len(),
            "Batch accepted"
        );
        Ok(())
    }

    fn pending_rows(&self) -> usize {
        self.writer.pending_len()
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        let flushed = if self.writer.pending_len() > 0 {
            match self.sink.ensure_connected().await {
                Ok(()) => self.writer.finish(&mut self.sink).await.map(|_| ()),
                Err(err) => Err(err),
            }
        } else {
            Ok(())
        };

        if let Some(conn) = self.sink.conn.take() {
            if let Err(err) = conn.disconnect().await {
                warn!(error = %err, "MySQL disconnect failed");
                if flushed.is_ok() {
                    return Err(DbError::from(err).into_close());
                }
            }
            info!(table = %self.sink.table, "MySQL destination closed");
        }
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ddl::{ColumnDef, TableOptions};

    #[test]
    fn renders_engine_hint() {
        let spec = TableSpec::new(vec![ColumnDef::new("id", "INT").primary_key()]).with_options(
            TableOptions {
                engine: Some("InnoDB".into()),
                ..Default::default()
            },
        );
        let dest = MySqlDestination::new("mysql://localhost/db", "users", WriterConfig::default())
            .with_table_spec(spec);

        assert_eq!(
            dest.create_table_sql().as_deref(),
            Some("CREATE TABLE IF NOT EXISTS `users` (`id` INT NOT NULL, PRIMARY KEY (`id`)) ENGINE=InnoDB")
        );
    }

    #[tokio::test]
    async fn close_with_nothing_pending_never_connects() {
        let mut dest =
            MySqlDestination::new("mysql://nobody@127.0.0.1:1/none", "users", WriterConfig::default());
        assert!(dest.close().await.is_ok());
        assert_eq!(dest.pending_rows(), 0);
    }
}
