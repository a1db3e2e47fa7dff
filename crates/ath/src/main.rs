//! Ath command line
//!
//! Drives the sample pipeline without the HTTP surface:
//! - `hook` feeds one upload gateway webhook to the ingestor
//! - `worker` drains the job queue until Ctrl-C
//! - `process` runs a single sample in the foreground
//! - `samples` / `report` read back what the pipeline stored

use anyhow::{Context, Result};
use ath_ids::{SampleId, UploadId};
use ath_logging::{init_logging, LogConfig};
use ath_protocol::HookName;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::context::{AppContext, ConfigArgs};

#[derive(Parser, Debug)]
#[command(name = "ath", about = "Pull request timing analysis pipeline")]
struct Cli {
    /// Mirror logs on stderr (otherwise warnings only)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Handle one upload gateway webhook
    Hook {
        /// Hook name (pre-create, post-finish, ...)
        #[arg(long)]
        name: HookName,

        /// JSON body file, or - for stdin
        #[arg(long, default_value = "-")]
        body: PathBuf,
    },

    /// Run the queue worker until interrupted
    Worker,

    /// Process one sample now, bypassing the queue
    Process {
        /// Sample ID
        sample_id: SampleId,
    },

    /// List samples with their status
    Samples {
        /// Only the sample registered for this upload
        #[arg(long)]
        upload_id: Option<UploadId>,

        /// Skip the first N samples
        #[arg(long, default_value = "0")]
        skip: u32,

        /// Maximum samples to show
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the summary statistics of a processed sample
    Report {
        /// Sample ID
        sample_id: SampleId,
    },

    /// Store a local CSV in the datasets bucket
    Put {
        /// CSV file to store
        file: PathBuf,

        /// Object key (default: a fresh opaque id)
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "ath",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let ctx = AppContext::open(&cli.config).await?;

        match cli.command {
            Commands::Hook { name, body } => cli::hook::run(&ctx, name, &body).await,
            Commands::Worker => cli::pipeline::worker(&ctx).await,
            Commands::Process { sample_id } => cli::pipeline::process(&ctx, &sample_id).await,
            Commands::Samples {
                upload_id,
                skip,
                limit,
                json,
            } => {
                cli::samples::list(
                    &ctx,
                    cli::samples::SamplesArgs {
                        upload_id,
                        skip,
                        limit,
                        json,
                    },
                )
                .await
            }
            Commands::Report { sample_id } => cli::samples::report(&ctx, &sample_id).await,
            Commands::Put { file, key } => cli::put::run(&ctx, &file, key),
        }
    })
}
