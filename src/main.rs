use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod client;
mod config;
mod error;
mod evaluation;
mod extract;
mod models;
mod output;
mod prompts;
mod runner;
mod server;
mod stats;
mod stream;
#[cfg(test)]
mod testing;

use crate::client::OpenAiClient;
use crate::config::{Config, RunFile};
use crate::evaluation::{Evaluator, RetryPolicy};
use crate::models::EvaluationRequest;
use crate::output::OutputFormat;
use crate::runner::Runner;
use crate::server::AppState;
use crate::stream::RunEvent;

/// Prompt evaluation service - grade LLM prompts qualitatively and over repeated runs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - log every iteration and retry
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to bind, overriding the configuration
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run one quantitative evaluation and print its statistics
    Run {
        /// Path to the TOML run file
        run_file: PathBuf,

        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { config, bind } => serve(config, bind).await,
        Commands::Run {
            run_file,
            config,
            output,
        } => run(run_file, config, output).await,
    }
}

fn build_evaluator(config: &Config) -> Arc<Evaluator> {
    let client = OpenAiClient::new(config.provider.api_endpoint.clone());
    Arc::new(Evaluator::new(
        Arc::new(client),
        RetryPolicy::from(&config.quantitative),
        config.judge.clone(),
    ))
}

async fn serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let evaluator = build_evaluator(&config);
    let state = Arc::new(AppState::new(config, evaluator));

    server::serve(state, &addr).await
}

async fn run(run_path: PathBuf, config_path: Option<PathBuf>, output: OutputFormat) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let run_file = RunFile::from_file(&run_path)?;
    let api_key = run_file.api_key()?;

    if run_file.iterations == 0 || run_file.iterations > config.server.max_iterations {
        bail!(
            "iterations must be between 1 and {}",
            config.server.max_iterations
        );
    }

    let evaluator = build_evaluator(&config);
    let runner = Runner::new(evaluator, &config.provider, &config.quantitative);

    let request = EvaluationRequest {
        system_prompt: run_file.system_prompt,
        user_prompt: run_file.user_prompt,
        model: run_file.model,
        iterations: run_file.iterations,
        batch_size: run_file.batch_size,
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let RunEvent::Progress(p) = event {
                match &p.error {
                    Some(error) => warn!(
                        "[{}/{}] batch {}/{} ({}%): {}",
                        p.completed, p.total, p.batch_index, p.total_batches, p.progress, error
                    ),
                    None => info!(
                        "[{}/{}] batch {}/{} ({}%)",
                        p.completed, p.total, p.batch_index, p.total_batches, p.progress
                    ),
                }
            }
        }
    });

    let results = runner.run(&request, &api_key, &tx).await;
    drop(tx);
    progress.await?;

    output::print_results(&results, output);

    Ok(())
}
