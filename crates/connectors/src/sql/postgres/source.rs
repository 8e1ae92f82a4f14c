use crate::{
    error::DbError,
    sql::postgres::{
        params::PgParamStore,
        row::{decode_row, is_supported},
        utils::connect_client,
    },
};
use async_trait::async_trait;
use engine_core::{
    connectors::source::{BatchStream, Source},
    error::ConnectorError,
    pagination::{QueryExecutor, paginate},
};
use model::{core::value::Value, pagination::query::QuerySpec, records::record::Record};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Statement};
use tracing::{debug, info};

/// Pages through a query on a single Postgres connection.
pub struct PostgresSource {
    url: String,
    spec: QuerySpec,
    client: Option<Client>,
    statements: Mutex<HashMap<String, Statement>>,
}

impl PostgresSource {
    pub fn new(url: impl Into<String>, spec: QuerySpec) -> Self {
        Self {
            url: url.into(),
            spec,
            client: None,
            statements: Mutex::new(HashMap::new()),
        }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    async fn statement(&self, client: &Client, sql: &str) -> Result<Statement, DbError> {
        let mut statements = self.statements.lock().await;
        if let Some(stmt) = statements.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = client.prepare(sql).await?;
        statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }
}

#[async_trait]
impl QueryExecutor for PostgresSource {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, ConnectorError> {
        let client = self
            .client
            .as_ref()
            .ok_or(ConnectorError::NotConnected("postgres source"))?;

        let stmt = self.statement(client, sql).await.map_err(DbError::into_query)?;
        if let Some(column) = stmt.columns().iter().find(|c| !is_supported(c.type_())) {
            return Err(DbError::Decode {
                column: column.name().to_string(),
                message: format!("unsupported column type `{}`", column.type_().name()),
            }
            .into_query());
        }
        let bindings = PgParamStore::coerce(params, stmt.params()).map_err(DbError::into_query)?;
        let rows = client
            .query(&stmt, &bindings.as_refs())
            .await
            .map_err(|e| DbError::from(e).into_query())?;

        debug!(rows = rows.len(), "Postgres page fetched");
        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::into_query)
    }
}

#[async_trait]
impl Source for PostgresSource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.client.is_some() {
            return Ok(());
        }
        self.spec.validate()?;
        let client = connect_client(&self.url)
            .await
            .map_err(DbError::into_connection)?;
        self.client = Some(client);
        info!("Postgres source connected");
        Ok(())
    }

    fn fetch(&self) -> BatchStream<'_> {
        paginate(self, self.spec.clone())
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        // Dropping the client ends the spawned connection task.
        if self.client.take().is_some() {
            self.statements.get_mut().clear();
            info!("Postgres source closed");
        }
        Ok(())
    }
}
