use engine_core::error::ConnectorError;
use engine_runtime::{checkpoint::CheckpointError, error::PipelineError};
use model::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read the configuration file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error("Failed to parse the configuration file as JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Undefined environment variable `{0}` referenced in configuration")]
    UndefinedVariable(String),

    #[error("Invalid source query: {0}")]
    InvalidQuery(#[from] ModelError),

    #[error("Invalid connection format provided: {0}")]
    InvalidConnectionFormat(String),

    #[error("Connection check failed: {0}")]
    Connection(#[from] ConnectorError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
