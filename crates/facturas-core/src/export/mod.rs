//! Export artifacts built from a list of invoices.

pub mod csv;
pub mod pdf;

pub use self::csv::CsvExporter;
pub use self::pdf::{MergeOutput, MergeStatistics, PdfMerger, SkippedCompanion};
