use crate::error::CliError;
use async_trait::async_trait;
use connectors::adapter::Driver;
use engine_core::error::ConnectorError;
use futures_util::TryStreamExt;
use model::{core::value::Value, pagination::query::QuerySpec};
use tracing::{error, info};

/// Trait for "pinging" a data source
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Runs `SELECT 1` through the driver's source adapter, so the check covers
/// the same URL parsing and TLS setup a pipeline would use.
pub struct DriverPinger {
    pub driver: Driver,
    pub conn_str: String,
}

#[async_trait]
impl ConnectionPinger for DriverPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!(driver = %self.driver, "Pinging '{}'", redact(&self.conn_str));

        let mut source = self
            .driver
            .source(&self.conn_str, QuerySpec::new("SELECT 1 AS ok", vec![]));
        if let Err(e) = source.connect().await {
            error!(driver = %self.driver, error = %e, "Connection failed");
            return Err(e.into());
        }

        let batches: Result<Vec<_>, ConnectorError> = source.fetch().try_collect().await;
        let closed = source.close().await;
        let batches = batches?;
        closed?;

        let value = batches
            .first()
            .and_then(|batch| batch.last())
            .and_then(|row| row.get("ok"))
            .and_then(Value::as_i64);
        if value != Some(1) {
            let msg = format!("{} ping returned unexpected result: {value:?}", self.driver);
            error!("{}", msg);
            return Err(CliError::Unexpected(msg));
        }

        info!(driver = %self.driver, "Ping succeeded");
        Ok(())
    }
}

/// Hides the password part of a connection URL.
pub fn redact(conn_str: &str) -> String {
    let Some((scheme, rest)) = conn_str.split_once("://") else {
        return conn_str.to_string();
    };
    let Some((auth, host)) = rest.split_once('@') else {
        return conn_str.to_string();
    };
    match auth.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => conn_str.to_string(),
    }
}
