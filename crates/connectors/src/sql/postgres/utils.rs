//! Client setup shared by the Postgres source and destination.

use crate::error::DbError;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::future::Future;
use tokio_postgres::{Client, Config, NoTls, config::SslMode};
use tracing::{debug, error, warn};

const APPLICATION_NAME: &str = "sluice";

/// How a connection negotiates TLS, derived from the URL's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TlsPlan {
    Plain,
    Required,
    /// Try TLS first and fall back to plaintext if the handshake fails.
    Preferred,
}

impl From<SslMode> for TlsPlan {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => TlsPlan::Plain,
            SslMode::Prefer => TlsPlan::Preferred,
            _ => TlsPlan::Required,
        }
    }
}

/// Parses a connection URL and tags the session with the pipeline's
/// application name unless the URL sets one.
pub(crate) fn parse_config(url: &str) -> Result<Config, DbError> {
    let mut config = url
        .parse::<Config>()
        .map_err(|e| DbError::InvalidUrl(e.to_string()))?;
    if config.get_application_name().is_none() {
        config.application_name(APPLICATION_NAME);
    }
    Ok(config)
}

pub(crate) async fn connect_client(url: &str) -> Result<Client, DbError> {
    let config = parse_config(url)?;
    let plan = TlsPlan::from(config.get_ssl_mode());
    debug!(?plan, "Opening Postgres connection");

    match plan {
        TlsPlan::Plain => open_plain(&config).await,
        TlsPlan::Required => open_tls(&config).await,
        TlsPlan::Preferred => match open_tls(&config).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                open_plain(&config).await
            }
        },
    }
}

async fn open_tls(config: &Config) -> Result<Client, DbError> {
    let tls = MakeTlsConnector::new(TlsConnector::builder().build()?);
    let (client, connection) = config.connect(tls).await?;
    drive(connection);
    Ok(client)
}

async fn open_plain(config: &Config) -> Result<Client, DbError> {
    let (client, connection) = config.connect(NoTls).await?;
    drive(connection);
    Ok(client)
}

/// The connection half does the socket I/O; it runs until the client is
/// dropped.
fn drive<C>(connection: C)
where
    C: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
}
