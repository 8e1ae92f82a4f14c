use crate::{
    config::PipelineConfig,
    conn::{ConnectionPinger, DriverPinger, redact},
    env::EnvManager,
    error::CliError,
    output::RunSummary,
};
use clap::Parser;
use commands::Commands;
use connectors::adapter::Driver;
use engine_core::logger::TracingLogger;
use engine_runtime::{checkpoint::CheckpointStore, pipeline::Pipeline};
use model::{execution::metrics::PipelineMetrics, pagination::cursor::PipelineCursor};
use serde_json::json;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod conn;
mod env;
mod error;
mod output;

#[derive(Parser)]
#[command(
    name = "sluice",
    version = "0.1.0",
    about = "Batch data pipelines between SQL databases"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            config,
            env_file,
            resume,
            state_dir,
        } => run_pipeline(&config, env_file.as_deref(), resume, state_dir).await?,
        Commands::Check { config, env_file } => {
            let env = load_env(env_file.as_deref())?;
            let config = PipelineConfig::load(&config, &env).await?;
            print_check(&config)?;
        }
        Commands::TestConn { format, conn_str } => {
            let driver = format
                .parse::<Driver>()
                .map_err(|_| CliError::InvalidConnectionFormat(format))?;
            DriverPinger { driver, conn_str }.ping().await?;
        }
        Commands::Progress {
            pipeline,
            state_dir,
            json,
        } => show_progress(pipeline.as_deref(), state_dir, json)?,
        Commands::Reset {
            pipeline,
            state_dir,
        } => {
            let store = open_checkpoints(state_dir)?;
            if store.clear(&pipeline)? {
                info!(pipeline = %pipeline, "Checkpoint removed");
            } else {
                warn!(pipeline = %pipeline, "No checkpoint stored");
            }
        }
    }

    Ok(())
}

fn load_env(env_file: Option<&Path>) -> Result<EnvManager, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = env_file {
        env.load_from_file(path)?;
    }
    Ok(env)
}

fn open_checkpoints(state_dir: Option<PathBuf>) -> Result<CheckpointStore, CliError> {
    let path = match state_dir {
        Some(path) => path,
        None => dirs::home_dir()
            .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?
            .join(".sluice/state"),
    };
    let store = CheckpointStore::open(&path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open checkpoint store at {}: {err}",
            path.display()
        ))
    })?;
    Ok(store)
}

async fn run_pipeline(
    config_path: &Path,
    env_file: Option<&Path>,
    resume: bool,
    state_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let env = load_env(env_file)?;
    let config = PipelineConfig::load(config_path, &env).await?;
    let store = open_checkpoints(state_dir)?;

    let mut spec = config.source.query.clone();
    let mut resumed_from = None;
    if resume {
        match store.load(&config.name)? {
            Some(checkpoint) if spec.cursor_field.is_some() => {
                spec = spec.resume_from(&checkpoint.last_item)?;
                resumed_from = Some(checkpoint.position);
                info!(
                    pipeline = %config.name,
                    position = checkpoint.position,
                    "Resuming from checkpoint"
                );
            }
            Some(_) => warn!(
                pipeline = %config.name,
                "Source has no cursor_field, ignoring --resume and starting over"
            ),
            None => info!(pipeline = %config.name, "No checkpoint found, starting from the beginning"),
        }
    }

    info!(
        pipeline = %config.name,
        source = %redact(&config.source.url),
        destination = %redact(&config.destination.url),
        table = %config.destination.table,
        "Starting pipeline"
    );

    let source = config.source.driver.source(&config.source.url, spec);
    let dest = &config.destination;
    let destination = dest.driver.destination(
        &dest.url,
        &dest.table,
        config.writer_config(),
        dest.create_table.clone(),
    );

    let mut pipeline = Pipeline::new(source, destination)
        .with_logger(TracingLogger::for_pipeline(config.name.clone()));
    if let Some(transform) = config.transform() {
        pipeline = pipeline.with_transform(transform);
    }

    let result = pipeline.run().await;

    let metrics = pipeline.metrics();
    let cursor = resume_point(&metrics, resumed_from.unwrap_or(0));

    if let Some(cursor) = &cursor {
        if let Err(err) = store.save(&config.name, cursor) {
            error!(pipeline = %config.name, error = %err, "Failed to save checkpoint");
            if result.is_ok() {
                return Err(err.into());
            }
        }
    }

    let mut summary = RunSummary::new(&config.name, &metrics, cursor);
    summary.resumed_from = resumed_from;
    match result {
        Ok(_) => {
            output::print_json(&summary)?;
            Ok(())
        }
        Err(err) => {
            output::print_json(&summary.failed(&err))?;
            Err(err.into())
        }
    }
}

/// The checkpoint to persist: the last cursor whose rows are committed,
/// with its position continued from the run it resumed.
fn resume_point(metrics: &PipelineMetrics, offset: u64) -> Option<PipelineCursor> {
    metrics.checkpoint.clone().map(|mut cursor| {
        cursor.position += offset;
        cursor
    })
}

fn print_check(config: &PipelineConfig) -> Result<(), CliError> {
    let writer = config.writer_config();
    let dest = &config.destination;
    output::print_json(&json!({
        "name": config.name,
        "source": {
            "driver": config.source.driver,
            "query": config.source.query,
        },
        "destination": {
            "driver": dest.driver,
            "table": dest.table,
            "batch_size": writer.batch_size,
            "transactions": writer.transactional,
            "concurrency": writer.concurrency,
            "max_retries": writer.retry.max_retries,
            "retry": writer.retry.backoff,
        },
        "transforms": config.transforms,
        "create_table_sql": config.create_table_sql(),
    }))
}

fn show_progress(
    pipeline: Option<&str>,
    state_dir: Option<PathBuf>,
    as_json: bool,
) -> Result<(), CliError> {
    let store = open_checkpoints(state_dir)?;

    let Some(pipeline) = pipeline else {
        let entries = store.list()?;
        if as_json {
            let by_name: BTreeMap<&str, &PipelineCursor> = entries
                .iter()
                .map(|(name, cursor)| (name.as_str(), cursor))
                .collect();
            return output::print_json(&by_name);
        }
        output::print_checkpoint_list(&entries);
        return Ok(());
    };

    let checkpoint = store.load(pipeline)?;
    if as_json {
        return output::print_json(&json!({
            "pipeline": pipeline,
            "checkpoint": checkpoint,
        }));
    }

    match checkpoint {
        Some(cursor) => output::print_cursor_table(pipeline, &cursor),
        None => println!("No checkpoint stored for pipeline '{pipeline}'"),
    }
    Ok(())
}
