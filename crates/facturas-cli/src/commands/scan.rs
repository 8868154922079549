//! Scan command: list the invoices found in a directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::style;
use serde::Serialize;
use tracing::debug;

use facturas_core::matcher::{
    CompanionConflict, FileMatcher, MatchReport, ParseFailure, ParseWarning,
};
use facturas_core::models::file::FileKind;
use facturas_core::models::invoice::Invoice;
use facturas_core::scan::{ScanReport, Scanner, Selection, SkippedEntry};

use super::{load_config, pick_and_scan, spinner};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Directory to scan (asked for on the terminal when omitted)
    dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of threads reading XML files
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON document
    Json,
    /// Human readable listing
    Text,
}

/// Serialized form of a scan.
#[derive(Serialize)]
struct ScanOutput<'a> {
    root: &'a Path,
    xml_files: usize,
    pdf_files: usize,
    ticket_files: usize,
    /// XML files that could not be read as text.
    unreadable_xml: usize,
    invoices: &'a [Invoice],
    failures: &'a [ParseFailure],
    warnings: &'a [ParseWarning],
    conflicts: &'a [CompanionConflict],
    unmatched: &'a [PathBuf],
    skipped: &'a [SkippedEntry],
}

impl<'a> ScanOutput<'a> {
    fn new(scan: &'a ScanReport, matched: &'a MatchReport) -> Self {
        Self {
            root: &scan.root,
            xml_files: scan.count(FileKind::Xml),
            pdf_files: scan.count(FileKind::Pdf),
            ticket_files: scan.count(FileKind::Ticket),
            unreadable_xml: scan.unreadable().count(),
            invoices: &matched.invoices,
            failures: &matched.failures,
            warnings: &matched.warnings,
            conflicts: &matched.conflicts,
            unmatched: &matched.unmatched,
            skipped: &scan.skipped,
        }
    }
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let mut scanner = Scanner::from_config(&config.scan);
    if let Some(jobs) = args.jobs {
        scanner = scanner.with_read_jobs(jobs);
    }

    let scan = match pick_and_scan(args.dir, scanner).await? {
        Selection::Scanned(scan) => scan,
        Selection::Cancelled => {
            println!("{} No directory selected.", style("ℹ").blue());
            return Ok(());
        }
    };

    let pb = spinner("Parsing invoices...")?;
    let matched = FileMatcher::new().match_files(&scan.files);
    pb.finish_and_clear();

    let output = ScanOutput::new(&scan, &matched);
    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&output)?,
        OutputFormat::Text => format_text(&output),
    };

    match args.output {
        Some(path) => {
            fs::write(&path, rendered)?;
            println!(
                "{} Output written to {}",
                style("✓").green(),
                path.display()
            );
        }
        None => println!("{}", rendered),
    }

    debug!("Scan finished in {:?}", start.elapsed());

    Ok(())
}

fn format_text(output: &ScanOutput<'_>) -> String {
    let mut text = String::new();

    text.push_str(&format!("Directory: {}\n", output.root.display()));
    text.push_str(&format!(
        "Files: {} XML, {} PDF, {} tickets ({} skipped)\n",
        output.xml_files,
        output.pdf_files,
        output.ticket_files,
        output.skipped.len()
    ));
    if output.unreadable_xml > 0 {
        text.push_str(&format!("Unreadable XML: {}\n", output.unreadable_xml));
    }
    text.push_str(&format!("Invoices: {}\n", output.invoices.len()));

    for invoice in output.invoices {
        text.push('\n');
        text.push_str(&format!(
            "  {}  {}\n",
            invoice.display_folio().trim(),
            invoice.basename().unwrap_or("")
        ));
        text.push_str(&format!(
            "    Emisor: {} ({})\n",
            invoice.emisor_name.as_deref().unwrap_or("-"),
            invoice.emisor_rfc.as_deref().unwrap_or("-")
        ));
        text.push_str(&format!(
            "    Fecha: {}  Total: {}\n",
            invoice.date.as_deref().unwrap_or("-"),
            invoice.total.as_deref().unwrap_or("-")
        ));
        if let Some(pdf) = &invoice.pdf_path {
            text.push_str(&format!("    PDF: {}\n", pdf.display()));
        }
        if let Some(image) = &invoice.image_path {
            text.push_str(&format!("    Ticket: {}\n", image.display()));
        }
    }

    if !output.failures.is_empty() {
        text.push_str("\nFailed to parse:\n");
        for failure in output.failures {
            text.push_str(&format!("  - {}: {}\n", failure.path.display(), failure.reason));
        }
    }

    if !output.warnings.is_empty() {
        text.push_str("\nWarnings:\n");
        for warning in output.warnings {
            text.push_str(&format!("  - {}: {}\n", warning.path.display(), warning.message));
        }
    }

    if !output.conflicts.is_empty() {
        text.push_str("\nBasename conflicts:\n");
        for conflict in output.conflicts {
            text.push_str(&format!(
                "  - {}: kept {}, ignored {}\n",
                conflict.basename,
                conflict.kept.display(),
                conflict.discarded.display()
            ));
        }
    }

    if !output.unmatched.is_empty() {
        text.push_str("\nUnmatched companions:\n");
        for path in output.unmatched {
            text.push_str(&format!("  - {}\n", path.display()));
        }
    }

    text.trim_end().to_string()
}
