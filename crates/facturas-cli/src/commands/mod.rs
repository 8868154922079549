//! Subcommands and the terminal glue they share.

pub mod config;
pub mod export;
pub mod open;
pub mod scan;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Duration;

use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use facturas_core::models::config::FacturasConfig;
use facturas_core::scan::{select_and_scan, DirectoryPicker, Scanner, Selection};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facturas")
        .join("config.json")
}

/// The `--config` path if given, else the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration. An explicit path must exist; the default one may not.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<FacturasConfig> {
    if let Some(path) = explicit {
        return Ok(FacturasConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading configuration from {}", path.display());
        Ok(FacturasConfig::from_file(&path)?)
    } else {
        Ok(FacturasConfig::default())
    }
}

/// Asks for a directory on the terminal. An empty answer cancels.
pub struct TerminalPicker {
    term: Term,
}

impl TerminalPicker {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl DirectoryPicker for TerminalPicker {
    fn pick(&self) -> Option<PathBuf> {
        if let Err(e) = self.term.write_str("Directory to scan: ") {
            warn!("Cannot prompt for a directory: {}", e);
            return None;
        }
        match read_answer(&self.term) {
            Ok(line) if !line.trim().is_empty() => Some(PathBuf::from(line.trim())),
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot read directory: {}", e);
                None
            }
        }
    }
}

/// Read one line from the terminal, or from piped stdin.
pub fn read_answer(term: &Term) -> io::Result<String> {
    if term.is_term() {
        return term.read_line();
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Scan `dir`, or the directory typed on the terminal when none is given.
///
/// Runs on the blocking pool.
pub async fn pick_and_scan(dir: Option<PathBuf>, scanner: Scanner) -> anyhow::Result<Selection> {
    let selection = tokio::task::spawn_blocking(move || match dir {
        Some(dir) => select_and_scan(&move || Some(dir.clone()), &scanner),
        None => select_and_scan(&TerminalPicker::new(), &scanner),
    })
    .await??;

    Ok(selection)
}

/// Spinner shown while a phase runs.
pub fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
