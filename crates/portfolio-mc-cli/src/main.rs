mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::ingest::FetchArgs;
use commands::simulate::{RunArgs, SimulateArgs};
use commands::Workspace;

/// Sharded Monte Carlo portfolio risk simulation
#[derive(Parser)]
#[command(
    name = "pmc",
    version,
    about = "Sharded Monte Carlo portfolio risk simulation",
    long_about = "Downloads price history, derives annualized statistics, simulates random \
                  candidate portfolios under correlated GBM in independent shards, and \
                  selects the max-Sharpe and min-volatility portfolios across all shards."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Path to a JSON or YAML configuration file (stdin JSON when piped)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory holding the object and metadata stores
    #[arg(long, default_value = "pmc-data", global = true)]
    store_dir: PathBuf,

    /// Override the configured base seed
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load closing prices for the configured assets and store the raw table
    Fetch(FetchArgs),
    /// Derive daily returns and annualized statistics from the raw table
    Preprocess,
    /// Simulate one shard of candidate portfolios
    Simulate(SimulateArgs),
    /// Merge every shard and select the optimal portfolios
    Combine,
    /// Run every stage on this machine
    Run(RunArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_mc=info,pmc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let open = || Workspace::open(cli.config.as_deref(), &cli.store_dir, cli.seed);
    let result = match cli.command {
        Commands::Fetch(args) => open().and_then(|ws| commands::ingest::run_fetch(&ws, args)),
        Commands::Preprocess => open().and_then(|ws| commands::ingest::run_preprocess(&ws)),
        Commands::Simulate(args) => {
            open().and_then(|ws| commands::simulate::run_simulate(&ws, args))
        }
        Commands::Combine => open().and_then(|ws| commands::combine::run_combine(&ws)),
        Commands::Run(args) => open().and_then(|ws| commands::simulate::run_all(&ws, args)),
        Commands::Version => {
            println!("pmc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(invocation) => {
            let succeeded = invocation.is_success();
            match serde_json::to_value(&invocation) {
                Ok(value) => output::format_output(&cli.output, &value),
                Err(e) => eprintln!("{}: {}", "error".red().bold(), e),
            }
            process::exit(if succeeded { 0 } else { 1 });
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
