use crate::{env::EnvManager, error::CliError};
use connectors::{adapter::Driver, sql::ddl::TableSpec};
use engine_core::{
    retry::Backoff,
    transform::{
        mapping::RenameFields,
        pipeline::TransformPipeline,
        pruner::{DropFields, SelectFields},
    },
    writer::WriterConfig,
};
use model::pagination::query::QuerySpec;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

/// A pipeline definition as written in the JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub driver: Driver,
    pub url: String,
    #[serde(flatten)]
    pub query: QuerySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub driver: Driver,
    pub url: String,
    pub table: String,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub transactions: Option<bool>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry: Option<Backoff>,
    #[serde(default)]
    pub create_table: Option<TableSpec>,
}

/// One step of the transform chain, applied in file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformConfig {
    Rename(BTreeMap<String, String>),
    Drop(Vec<String>),
    Select(Vec<String>),
}

impl PipelineConfig {
    /// Reads, interpolates and validates a config file.
    pub async fn load(path: impl AsRef<Path>, env: &EnvManager) -> Result<Self, CliError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::parse(&raw, env)
    }

    pub fn parse(raw: &str, env: &EnvManager) -> Result<Self, CliError> {
        let content = env.interpolate(raw)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CliError> {
        if self.name.trim().is_empty() {
            return Err(CliError::Config("pipeline `name` must not be empty".into()));
        }
        self.source.query.validate()?;

        let dest = &self.destination;
        if dest.table.trim().is_empty() {
            return Err(CliError::Config("destination `table` must not be empty".into()));
        }
        if dest.batch_size == Some(0) {
            return Err(CliError::Config("destination `batch_size` must be positive".into()));
        }
        if dest.concurrency == Some(0) {
            return Err(CliError::Config("destination `concurrency` must be positive".into()));
        }
        if let Some(spec) = &dest.create_table {
            if spec.columns.is_empty() {
                return Err(CliError::Config("`create_table` needs at least one column".into()));
            }
        }
        Ok(())
    }

    /// Writer settings: backend defaults overridden by whatever the file sets.
    pub fn writer_config(&self) -> WriterConfig {
        let dest = &self.destination;
        let defaults = WriterConfig::default();

        let mut retry = dest.driver.default_retry();
        if let Some(backoff) = dest.retry {
            retry.backoff = match backoff {
                Backoff::Exponential { base, max } if max.is_zero() => {
                    Backoff::Exponential { base, max: base }
                }
                other => other,
            };
        }
        if let Some(max_retries) = dest.max_retries {
            retry.max_retries = max_retries;
        }

        WriterConfig {
            batch_size: dest.batch_size.unwrap_or(defaults.batch_size),
            transactional: dest.transactions.unwrap_or(defaults.transactional),
            concurrency: dest.concurrency.unwrap_or(defaults.concurrency),
            retry,
        }
    }

    /// The configured transform chain, or `None` when rows pass through.
    pub fn transform(&self) -> Option<TransformPipeline> {
        if self.transforms.is_empty() {
            return None;
        }
        let pipeline = self
            .transforms
            .iter()
            .fold(TransformPipeline::new(), |pipeline, step| match step {
                TransformConfig::Rename(map) => pipeline.add_transform(RenameFields::new(
                    map.iter().map(|(from, to)| (from.clone(), to.clone())),
                )),
                TransformConfig::Drop(fields) => {
                    pipeline.add_transform(DropFields::new(fields.iter().cloned()))
                }
                TransformConfig::Select(fields) => {
                    pipeline.add_transform(SelectFields::new(fields.iter().cloned()))
                }
            });
        Some(pipeline)
    }

    pub fn create_table_sql(&self) -> Option<String> {
        let dest = &self.destination;
        dest.create_table
            .as_ref()
            .map(|spec| dest.driver.create_table_sql(&dest.table, spec))
    }
}
