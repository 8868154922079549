//! CLI application for exporting CFDI invoices.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{config, export, open, scan};

/// Facturas - Export CFDI invoices to a CSV summary and a merged PDF
#[derive(Parser)]
#[command(name = "facturas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the invoices found in a directory
    Scan(scan::ScanArgs),

    /// Export a directory's invoices to CSV and PDF
    Export(export::ExportArgs),

    /// Open a file, or show it in its folder
    Open(open::OpenArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG directives take precedence
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Scan(args) => scan::run(args, cli.config.as_deref()).await,
        Commands::Export(args) => export::run(args, cli.config.as_deref()).await,
        Commands::Open(args) => open::run(args).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    }
}
