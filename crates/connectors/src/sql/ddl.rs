//! Declarative `CREATE TABLE IF NOT EXISTS` generation.

use crate::sql::dialect::Dialect;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// SQL type, passed through verbatim (e.g. `BIGINT`, `VARCHAR(255)`).
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Raw SQL default expression.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            unique: false,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

/// Backend-specific physical layout hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOptions {
    #[serde(default)]
    pub partition_by: Option<String>,
    #[serde(default)]
    pub cluster_by: Option<Vec<String>>,
    #[serde(default)]
    pub distribute_by: Option<String>,
    /// MySQL storage engine.
    #[serde(default)]
    pub engine: Option<String>,
}

/// Columns plus hints for the destination table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub columns: Vec<ColumnDef>,
    #[serde(default, flatten)]
    pub options: TableOptions,
}

impl TableSpec {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        TableSpec {
            columns,
            options: TableOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }
}

/// Which hints a dialect can express.
#[derive(Debug, Clone, Copy, Default)]
pub struct HintSupport {
    pub partition: bool,
    pub engine: bool,
}

pub struct CreateTable<'a> {
    pub table: &'a str,
    pub spec: &'a TableSpec,
}

impl<'a> CreateTable<'a> {
    pub fn new(table: &'a str, spec: &'a TableSpec) -> Self {
        Self { table, spec }
    }

    /// Renders the statement. Hints the dialect cannot express are skipped
    /// with a warning.
    pub fn to_sql(&self, dialect: &dyn Dialect, support: HintSupport) -> String {
        let mut parts: Vec<String> = self
            .spec
            .columns
            .iter()
            .map(|col| column_sql(dialect, col))
            .collect();

        let pk: Vec<String> = self
            .spec
            .columns
            .iter()
            .filter(|col| col.primary_key)
            .map(|col| dialect.quote_identifier(&col.name))
            .collect();
        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote_table(self.table),
            parts.join(", ")
        );

        let options = &self.spec.options;
        if let Some(engine) = &options.engine {
            if support.engine {
                sql.push_str(&format!(" ENGINE={engine}"));
            } else {
                warn!(dialect = %dialect.name(), table = self.table, "Ignoring unsupported `engine` hint");
            }
        }
        if let Some(partition) = &options.partition_by {
            if support.partition {
                sql.push_str(&format!(" PARTITION BY {partition}"));
            } else {
                warn!(dialect = %dialect.name(), table = self.table, "Ignoring unsupported `partition_by` hint");
            }
        }
        if options.cluster_by.is_some() {
            warn!(dialect = %dialect.name(), table = self.table, "Ignoring unsupported `cluster_by` hint");
        }
        if options.distribute_by.is_some() {
            warn!(dialect = %dialect.name(), table = self.table, "Ignoring unsupported `distribute_by` hint");
        }

        sql
    }
}

fn column_sql(dialect: &dyn Dialect, col: &ColumnDef) -> String {
    let mut sql = format!("{} {}", dialect.quote_identifier(&col.name), col.data_type);
    if !col.nullable || col.primary_key {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        sql.push_str(&format!(" DEFAULT {default}"));
    }
    if col.unique && !col.primary_key {
        sql.push_str(" UNIQUE");
    }
    sql
}
