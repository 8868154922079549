//! Error types for the facturas-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the facturas library.
#[derive(Error, Debug)]
pub enum FacturasError {
    /// Directory scanning error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Invoice XML parsing error.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// PDF merge error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that fail a whole directory scan.
///
/// Per-file problems never show up here; they are recorded as skipped
/// entries on the scan report instead.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The root path does not exist.
    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The root path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The root directory cannot be listed.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Any other I/O failure on the root directory.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The recursive listing pattern could not be built.
    #[error("invalid listing pattern: {0}")]
    Pattern(String),

    /// The reader thread pool could not be started.
    #[error("failed to start reader pool: {0}")]
    ThreadPool(String),
}

/// Errors that abort parsing of a single invoice XML.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The XML tokenizer rejected the document.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    /// The document ended with open elements.
    #[error("unclosed element <{0}>")]
    Unclosed(String),

    /// The document has no root element.
    #[error("document has no root element")]
    NoRoot,

    /// A second top-level element follows the root.
    #[error("unexpected element <{0}> after the root element")]
    TrailingElement(String),
}

/// Errors related to building the merged PDF.
#[derive(Error, Debug)]
pub enum PdfError {
    /// A companion PDF could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A companion PDF is encrypted with a non-empty password.
    #[error("{} is encrypted", .0.display())]
    Encrypted(PathBuf),

    /// A source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The merged document could not be encoded.
    #[error("failed to write merged PDF: {0}")]
    Write(String),

    /// There is nothing to put in the document.
    #[error("merged PDF would have no pages")]
    NoPages,
}

/// Result type for the facturas library.
pub type Result<T> = std::result::Result<T, FacturasError>;
