//! Directory selection ahead of a scan.

use std::path::PathBuf;

use tracing::info;

use super::{Result, ScanReport, Scanner};

/// Source of the directory to scan, such as a dialog or a terminal prompt.
pub trait DirectoryPicker {
    /// Return the chosen directory, or `None` if the user cancelled.
    fn pick(&self) -> Option<PathBuf>;
}

impl<F> DirectoryPicker for F
where
    F: Fn() -> Option<PathBuf>,
{
    fn pick(&self) -> Option<PathBuf> {
        self()
    }
}

/// Outcome of a pick-then-scan request.
#[derive(Debug)]
pub enum Selection {
    /// Nothing was selected. This is not an error.
    Cancelled,
    /// A directory was selected and scanned.
    Scanned(ScanReport),
}

/// Ask `picker` for a directory and scan it.
pub fn select_and_scan(picker: &dyn DirectoryPicker, scanner: &Scanner) -> Result<Selection> {
    match picker.pick() {
        Some(root) => scanner.scan(&root).map(Selection::Scanned),
        None => {
            info!("Directory selection cancelled");
            Ok(Selection::Cancelled)
        }
    }
}
