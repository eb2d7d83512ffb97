//! CLI binary for sage.
//!
//! Runs one research query and prints the result as pretty JSON on stdout.
//! All tracing output goes to stderr so stdout stays machine-readable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sage::aggregate::{RunResult, RunStatus};
use sage::config::{Credentials, RunConfig, SageConfig, DEFAULT_MAX_RESULTS, DEFAULT_MAX_URLS};
use sage::PipelineCoordinator;
use tracing_subscriber::EnvFilter;

/// Sage: search the web, read the results and summarize them.
#[derive(Parser)]
#[command(name = "sage", version, about)]
struct Cli {
    /// Research query.
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// Results requested from each search provider (1-20).
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,

    /// Maximum distinct URLs to fetch (1-50).
    #[arg(long, default_value_t = DEFAULT_MAX_URLS)]
    max_urls: usize,

    /// Save the result as JSON in the configured output directory.
    #[arg(long)]
    save: bool,

    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sage=info,sage_search=info")),
        )
        .init();

    let cli = Cli::parse();
    let query = cli.query.join(" ");

    let run = match RunConfig::new(query.as_str()) {
        Ok(run) => run
            .with_max_results(cli.max_results)
            .with_max_urls(cli.max_urls)
            .with_persist(cli.save),
        Err(e) => return print_result(&RunResult::failed(query, &e)),
    };

    let config = SageConfig::load(cli.config.as_deref())?;
    let coordinator = PipelineCoordinator::from_config(&config, &Credentials::from_env())
        .map_err(|e| anyhow::anyhow!("cannot start pipeline: {e}"))?;

    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let result = coordinator.run(&run).await;
    print_result(&result)
}

fn print_result(result: &RunResult) -> anyhow::Result<ExitCode> {
    println!("{}", result.to_json_pretty()?);
    Ok(match result.status {
        RunStatus::Error => ExitCode::FAILURE,
        RunStatus::Success | RunStatus::Partial => ExitCode::SUCCESS,
    })
}
