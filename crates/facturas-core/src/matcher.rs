//! Pairing of invoices with their companion PDFs and ticket images.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::invoice::{CfdiParser, InvoiceParser};
use crate::models::file::{FileKind, FileObject};
use crate::models::invoice::Invoice;

/// An XML file that did not produce an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// A usable invoice with a field that had to be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Two companions of the same kind competing for one basename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanionConflict {
    pub basename: String,
    pub kind: FileKind,
    /// The companion that was attached.
    pub kept: PathBuf,
    /// The companion that lost.
    pub discarded: PathBuf,
}

/// Everything derived from one scan's files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchReport {
    /// Invoices in the order their XML files were given.
    pub invoices: Vec<Invoice>,
    pub failures: Vec<ParseFailure>,
    pub warnings: Vec<ParseWarning>,
    pub conflicts: Vec<CompanionConflict>,
    /// Companions that no invoice claimed.
    pub unmatched: Vec<PathBuf>,
}

/// Derives invoices from scanned files and attaches companions by basename.
pub struct FileMatcher {
    parser: CfdiParser,
}

impl Default for FileMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileMatcher {
    pub fn new() -> Self {
        Self {
            parser: CfdiParser::new(),
        }
    }

    /// Parse every XML file and attach companions.
    ///
    /// Companions are indexed in the order given; when two files of the same
    /// kind share a basename the later one wins and the collision is
    /// reported. Pass files sorted by path for a reproducible outcome.
    pub fn match_files(&self, files: &[FileObject]) -> MatchReport {
        let mut report = MatchReport::default();

        let mut companions: HashMap<(FileKind, &str), &PathBuf> = HashMap::new();
        for file in files.iter().filter(|f| f.kind != FileKind::Xml) {
            if let Some(previous) = companions.insert((file.kind, file.name.as_str()), &file.file_path) {
                warn!(
                    "{} {} shadows {}",
                    file.kind.label(),
                    file.file_path.display(),
                    previous.display()
                );
                report.conflicts.push(CompanionConflict {
                    basename: file.name.clone(),
                    kind: file.kind,
                    kept: file.file_path.clone(),
                    discarded: previous.clone(),
                });
            }
        }

        let mut claimed: HashSet<&PathBuf> = HashSet::new();

        for file in files.iter().filter(|f| f.kind == FileKind::Xml) {
            let Some(contents) = file.contents.as_deref() else {
                report.failures.push(ParseFailure {
                    path: file.file_path.clone(),
                    reason: "XML contents were not loaded".to_string(),
                });
                continue;
            };

            let result = match self.parser.parse(contents, &file.file_path) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to parse {}: {}", file.file_path.display(), e);
                    report.failures.push(ParseFailure {
                        path: file.file_path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            report
                .warnings
                .extend(result.warnings.into_iter().map(|message| ParseWarning {
                    path: file.file_path.clone(),
                    message,
                }));

            let mut invoice = result.invoice;
            let basename = file.name.as_str();

            if let Some(pdf) = companions.get(&(FileKind::Pdf, basename)) {
                debug!("Matched {} with {}", file.file_path.display(), pdf.display());
                invoice.pdf_path = Some((*pdf).clone());
                claimed.insert(*pdf);
            }
            if let Some(ticket) = companions.get(&(FileKind::Ticket, basename)) {
                debug!("Matched {} with {}", file.file_path.display(), ticket.display());
                invoice.image_path = Some((*ticket).clone());
                claimed.insert(*ticket);
            }

            report.invoices.push(invoice);
        }

        let mut unmatched: Vec<PathBuf> = companions
            .into_values()
            .filter(|path| !claimed.contains(path))
            .cloned()
            .collect();
        unmatched.sort();
        report.unmatched = unmatched;

        info!(
            "Derived {} invoices ({} failed, {} companions unmatched)",
            report.invoices.len(),
            report.failures.len(),
            report.unmatched.len()
        );

        report
    }
}
