//! Export command: write the CSV summary and the merged PDF.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::{style, Term};
use tracing::{debug, warn};

use facturas_core::artifact::{
    save_artifacts, Artifact, ConflictResolver, FixedResolver, Resolution, SaveReport,
};
use facturas_core::export::{CsvExporter, MergeStatistics, PdfMerger};
use facturas_core::matcher::FileMatcher;
use facturas_core::models::config::{CompanionFailurePolicy, FacturasConfig, OverwritePolicy};
use facturas_core::models::invoice::Invoice;
use facturas_core::scan::{Scanner, Selection};

use super::{load_config, pick_and_scan, read_answer, spinner};

/// Arguments for the export command.
#[derive(Args)]
pub struct ExportArgs {
    /// Directory to scan (asked for on the terminal when omitted)
    dir: Option<PathBuf>,

    /// Write the CSV summary
    #[arg(long)]
    csv: bool,

    /// Write the merged PDF
    #[arg(long)]
    pdf: bool,

    /// Directory the artifacts are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// File name of the artifacts, without extension
    #[arg(long)]
    name: Option<String>,

    /// What to do when an artifact already exists
    #[arg(long, value_enum)]
    overwrite: Option<OverwriteArg>,

    /// What to do when a companion PDF cannot be loaded
    #[arg(long, value_enum)]
    on_companion_error: Option<CompanionErrorArg>,

    /// Number of threads reading XML files
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Show the first written file in the file manager
    #[arg(long)]
    reveal: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OverwriteArg {
    Replace,
    Skip,
    Prompt,
}

impl From<OverwriteArg> for OverwritePolicy {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::Replace => OverwritePolicy::Replace,
            OverwriteArg::Skip => OverwritePolicy::Skip,
            OverwriteArg::Prompt => OverwritePolicy::Prompt,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompanionErrorArg {
    Abort,
    Skip,
}

impl From<CompanionErrorArg> for CompanionFailurePolicy {
    fn from(arg: CompanionErrorArg) -> Self {
        match arg {
            CompanionErrorArg::Abort => CompanionFailurePolicy::Abort,
            CompanionErrorArg::Skip => CompanionFailurePolicy::Skip,
        }
    }
}

/// Asks on the terminal whether to replace each existing file.
struct PromptResolver {
    term: Term,
}

impl ConflictResolver for PromptResolver {
    fn resolve(&mut self, destination: &Path) -> Resolution {
        let question = format!(
            "{} {} already exists. Replace it? [y/N] ",
            style("?").yellow(),
            destination.display()
        );
        if let Err(e) = self.term.write_str(&question) {
            warn!("Cannot prompt about {}: {}", destination.display(), e);
            return Resolution::Skip;
        }
        match read_answer(&self.term) {
            Ok(answer) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => {
                Resolution::Replace
            }
            Ok(_) => Resolution::Skip,
            Err(e) => {
                warn!("Cannot read answer: {}", e);
                Resolution::Skip
            }
        }
    }
}

pub async fn run(args: ExportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    let (want_csv, want_pdf) = match (args.csv, args.pdf) {
        (false, false) => (true, true),
        flags => flags,
    };

    let mut scanner = Scanner::from_config(&config.scan);
    if let Some(jobs) = args.jobs {
        scanner = scanner.with_read_jobs(jobs);
    }

    let scan = match pick_and_scan(args.dir, scanner).await? {
        Selection::Scanned(scan) => scan,
        Selection::Cancelled => {
            println!("{} No directory selected, nothing exported.", style("ℹ").blue());
            return Ok(());
        }
    };

    let matched = FileMatcher::new().match_files(&scan.files);
    if matched.invoices.is_empty() {
        anyhow::bail!("No invoices found in {}", scan.root.display());
    }

    println!(
        "{} Found {} invoices in {}",
        style("ℹ").blue(),
        matched.invoices.len(),
        scan.root.display()
    );
    for failure in &matched.failures {
        println!(
            "{} Not exported, {}: {}",
            style("⚠").yellow(),
            failure.path.display(),
            failure.reason
        );
    }

    let pb = spinner("Building export...")?;
    let invoices = matched.invoices;
    let stem = config.output.file_stem.clone();
    let export_config = config.clone();
    let (artifacts, statistics) = tokio::task::spawn_blocking(move || {
        build_artifacts(&export_config, &invoices, &stem, want_csv, want_pdf)
    })
    .await??;
    pb.finish_and_clear();

    let report = match FixedResolver::for_policy(config.output.overwrite) {
        Some(mut resolver) => save_artifacts(&args.output_dir, &artifacts, &mut resolver)?,
        None => {
            let mut resolver = PromptResolver {
                term: Term::stderr(),
            };
            save_artifacts(&args.output_dir, &artifacts, &mut resolver)?
        }
    };

    print_summary(&report, statistics.as_ref());

    if args.reveal {
        if let Some(first) = report.saved.first() {
            if let Err(e) = opener::reveal(&first.path) {
                warn!("Cannot reveal {}: {}", first.path.display(), e);
            }
        }
    }

    debug!("Export finished in {:?}", start.elapsed());

    Ok(())
}

fn apply_overrides(config: &mut FacturasConfig, args: &ExportArgs) {
    if let Some(name) = &args.name {
        config.output.file_stem = name.clone();
    }
    if let Some(overwrite) = args.overwrite {
        config.output.overwrite = overwrite.into();
    }
    if let Some(policy) = args.on_companion_error {
        config.pdf.companion_failure = policy.into();
    }
}

fn build_artifacts(
    config: &FacturasConfig,
    invoices: &[Invoice],
    stem: &str,
    want_csv: bool,
    want_pdf: bool,
) -> anyhow::Result<(Vec<Artifact>, Option<MergeStatistics>)> {
    let mut artifacts = Vec::new();
    let mut statistics = None;

    if want_csv {
        let csv = CsvExporter::from_config(&config.csv).export(invoices)?;
        artifacts.push(Artifact::text(stem, ".csv", csv));
    }

    if want_pdf {
        let output = PdfMerger::from_config(&config.pdf).merge(invoices)?;
        artifacts.push(Artifact::bytes(stem, ".pdf", output.bytes));
        statistics = Some(output.statistics);
    }

    Ok((artifacts, statistics))
}

fn print_summary(report: &SaveReport, statistics: Option<&MergeStatistics>) {
    for saved in &report.saved {
        println!("{} Saved {}", style("✓").green(), saved.path.display());
    }
    for skipped in &report.skipped {
        println!(
            "{} {}: {}",
            style("⚠").yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }

    if let Some(statistics) = statistics {
        println!(
            "   {} pages ({} from companion PDFs, {} rendered)",
            statistics.total_pages, statistics.companion_pages, statistics.rendered_pages
        );
        for companion in &statistics.skipped_companions {
            println!(
                "{} Companion left out, {}: {}",
                style("⚠").yellow(),
                companion.path.display(),
                companion.reason
            );
        }
    }
}
