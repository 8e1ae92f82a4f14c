use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline to completion
    Run {
        #[arg(long, help = "Pipeline config file path")]
        config: PathBuf,

        #[arg(long, help = "Extra KEY=VALUE file used for ${VAR} interpolation")]
        env_file: Option<PathBuf>,

        #[arg(long, help = "Continue after the last checkpointed row")]
        resume: bool,

        #[arg(long, help = "Checkpoint directory (defaults to ~/.sluice/state)")]
        state_dir: Option<PathBuf>,
    },
    /// Validate a config and print the resolved query and DDL
    Check {
        #[arg(long, help = "Pipeline config file path")]
        config: PathBuf,

        #[arg(long, help = "Extra KEY=VALUE file used for ${VAR} interpolation")]
        env_file: Option<PathBuf>,
    },
    /// Test a connection string against a given format
    TestConn {
        /// Driver: "mysql", "mariadb", "pg", "postgres"
        #[arg(long)]
        format: String,

        /// Connection string
        #[arg(long)]
        conn_str: String,
    },
    /// Show the stored checkpoint of a pipeline, or of every pipeline
    Progress {
        #[arg(long, help = "Pipeline name to inspect (all pipelines if omitted)")]
        pipeline: Option<String>,

        #[arg(long, help = "Checkpoint directory (defaults to ~/.sluice/state)")]
        state_dir: Option<PathBuf>,

        #[arg(
            long,
            help = "If set, prints the progress information as JSON instead of a table"
        )]
        json: bool,
    },
    /// Forget a pipeline's checkpoint so the next resume starts over
    Reset {
        #[arg(long, help = "Pipeline name whose checkpoint is removed")]
        pipeline: String,

        #[arg(long, help = "Checkpoint directory (defaults to ~/.sluice/state)")]
        state_dir: Option<PathBuf>,
    },
}
