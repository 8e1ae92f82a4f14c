use engine_core::error::ConnectorError;
use thiserror::Error;

/// Errors coming from the database drivers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    /// A value could not be bound to a parameter of the given SQL type.
    #[error("Cannot bind {value} as {sql_type}")]
    Coercion { value: String, sql_type: String },

    /// A column value could not be decoded.
    #[error("Cannot decode column `{column}`: {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    pub fn into_connection(self) -> ConnectorError {
        ConnectorError::connection(self)
    }

    pub fn into_query(self) -> ConnectorError {
        ConnectorError::query(self)
    }

    pub fn into_write(self) -> ConnectorError {
        ConnectorError::write(self)
    }

    pub fn into_close(self) -> ConnectorError {
        ConnectorError::close(self)
    }
}
