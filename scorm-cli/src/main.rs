use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "scorm", about = "SCORM runtime server and attempt ledger tools")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh a cached exam definition
    Cache(commands::cache::CacheArgs),
    /// Run one compaction pass over the ledger
    Compact(commands::compact::CompactArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Report outcomes to the launching platform
    Report(commands::report::ReportArgs),
    /// Run the scorm server
    Serve(commands::serve::ServeArgs),
    /// Show an attempt's recorded data
    Show(commands::show::ShowArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load()?;

    match cli.command {
        Commands::Cache(args) => commands::cache::run(args, &config).await,
        Commands::Compact(args) => commands::compact::run(args, &config),
        Commands::Config(args) => commands::config::run(args, &config),
        Commands::Report(args) => commands::report::run(args, &config).await,
        Commands::Serve(args) => commands::serve::run(args, &config).await,
        Commands::Show(args) => commands::show::run(args, &config),
    }
}
