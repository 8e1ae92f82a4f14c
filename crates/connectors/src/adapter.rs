use crate::sql::{
    ddl::{CreateTable, HintSupport, TableSpec},
    dialect::{MySql, Postgres},
    mysql::{destination::MySqlDestination, source::MySqlSource},
    postgres::{destination::PostgresDestination, source::PostgresSource},
};
use engine_core::{
    connectors::{destination::Destination, source::Source},
    retry::RetryPolicy,
    writer::WriterConfig,
};
use model::pagination::query::QuerySpec;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "pg", alias = "postgresql")]
    Postgres,
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Driver::MySql),
            "pg" | "postgres" | "postgresql" => Ok(Driver::Postgres),
            other => Err(format!("Unknown driver: {other}")),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::MySql => write!(f, "mysql"),
            Driver::Postgres => write!(f, "postgres"),
        }
    }
}

impl Driver {
    pub fn source(&self, url: &str, spec: QuerySpec) -> Box<dyn Source> {
        match self {
            Driver::MySql => Box::new(MySqlSource::new(url, spec)),
            Driver::Postgres => Box::new(PostgresSource::new(url, spec)),
        }
    }

    pub fn destination(
        &self,
        url: &str,
        table: &str,
        config: WriterConfig,
        table_spec: Option<TableSpec>,
    ) -> Box<dyn Destination> {
        match self {
            Driver::MySql => {
                let dest = MySqlDestination::new(url, table, config);
                Box::new(match table_spec {
                    Some(spec) => dest.with_table_spec(spec),
                    None => dest,
                })
            }
            Driver::Postgres => {
                let dest = PostgresDestination::new(url, table, config);
                Box::new(match table_spec {
                    Some(spec) => dest.with_table_spec(spec),
                    None => dest,
                })
            }
        }
    }

    /// Retry policy destinations of this backend use unless configured.
    pub fn default_retry(&self) -> RetryPolicy {
        match self {
            Driver::MySql => MySqlDestination::default_retry(),
            Driver::Postgres => RetryPolicy::for_database(),
        }
    }

    pub fn create_table_sql(&self, table: &str, spec: &TableSpec) -> String {
        let create = CreateTable::new(table, spec);
        match self {
            Driver::MySql => create.to_sql(&MySql, HintSupport {
                partition: true,
                engine: true,
            }),
            Driver::Postgres => create.to_sql(&Postgres, HintSupport {
                partition: true,
                engine: false,
            }),
        }
    }
}
