//! Core library for CFDI invoice extraction and export.
//!
//! This crate provides:
//! - Recursive directory scanning with file classification
//! - CFDI invoice XML parsing
//! - Matching invoices with their companion PDFs and ticket images
//! - CSV summary and merged PDF export

pub mod artifact;
pub mod error;
pub mod export;
pub mod invoice;
pub mod matcher;
pub mod models;
pub mod scan;

#[cfg(test)]
mod fixtures;

pub use artifact::{
    read_file, save_artifacts, Artifact, ConflictResolver, FileContent, FixedResolver,
    Resolution, SaveReport,
};
pub use error::{FacturasError, ParseError, PdfError, Result, ScanError};
pub use export::{CsvExporter, MergeOutput, MergeStatistics, PdfMerger};
pub use invoice::{CfdiParser, ExtractionResult, InvoiceParser};
pub use matcher::{FileMatcher, MatchReport};
pub use models::config::FacturasConfig;
pub use models::file::{FileKind, FileObject};
pub use models::invoice::Invoice;
pub use scan::{select_and_scan, DirectoryPicker, ScanReport, Scanner, Selection};
