//! Open command: hand a file to the desktop.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::warn;

/// Arguments for the open command.
#[derive(Args)]
pub struct OpenArgs {
    /// File or directory to open
    path: PathBuf,

    /// Show the item in its folder instead of opening it
    #[arg(long)]
    reveal: bool,
}

/// Failures are logged, never returned.
pub async fn run(args: OpenArgs) -> anyhow::Result<()> {
    let result = if args.reveal {
        opener::reveal(&args.path)
    } else {
        opener::open(&args.path)
    };

    match result {
        Ok(()) => println!("{} Opened {}", style("✓").green(), args.path.display()),
        Err(e) => warn!("Cannot open {}: {}", args.path.display(), e),
    }

    Ok(())
}
