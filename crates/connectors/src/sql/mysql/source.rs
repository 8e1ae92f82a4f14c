use crate::{
    error::DbError,
    sql::mysql::{params::MySqlParamStore, row::decode_row},
};
use async_trait::async_trait;
use engine_core::{
    connectors::source::{BatchStream, Source},
    error::ConnectorError,
    pagination::{QueryExecutor, paginate},
};
use model::{core::value::Value, pagination::query::QuerySpec, records::record::Record};
use mysql_async::{Opts, Pool, Row, prelude::Queryable};
use tracing::{debug, info};

/// Pages through a query using a connection pool. Each page checks a
/// connection out of the pool and returns it when the page is read.
pub struct MySqlSource {
    url: String,
    spec: QuerySpec,
    pool: Option<Pool>,
}

impl MySqlSource {
    pub fn new(url: impl Into<String>, spec: QuerySpec) -> Self {
        Self {
            url: url.into(),
            spec,
            pool: None,
        }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }
}

#[async_trait]
impl QueryExecutor for MySqlSource {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, ConnectorError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or(ConnectorError::NotConnected("mysql source"))?;

        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| DbError::from(e).into_query())?;
        let bindings = MySqlParamStore::from_values(params).map_err(DbError::into_query)?;
        let rows: Vec<Row> = conn
            .exec(sql, bindings.params())
            .await
            .map_err(|e| DbError::from(e).into_query())?;

        debug!(rows = rows.len(), "MySQL page fetched");
        Ok(rows.iter().map(decode_row).collect())
    }
}

#[async_trait]
impl Source for MySqlSource {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.pool.is_some() {
            return Ok(());
        }
        self.spec.validate()?;
        let opts = Opts::from_url(&self.url)
            .map_err(|e| DbError::InvalidUrl(e.to_string()).into_connection())?;
        let pool = Pool::new(opts);

        // Bad credentials and unreachable hosts fail here, not on the first page.
        if let Err(err) = pool.get_conn().await {
            let _ = pool.disconnect().await;
            return Err(DbError::from(err).into_connection());
        }

        self.pool = Some(pool);
        info!("MySQL source connected");
        Ok(())
    }

    fn fetch(&self) -> BatchStream<'_> {
        paginate(self, self.spec.clone())
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        let Some(pool) = self.pool.take() else {
            return Ok(());
        };
        pool.disconnect()
            .await
            .map_err(|e| DbError::from(e).into_close())?;
        info!("MySQL source closed");
        Ok(())
    }
}
