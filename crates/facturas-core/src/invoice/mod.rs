//! CFDI invoice extraction module.

mod parser;
pub mod tree;

pub use parser::{CfdiParser, ExtractionResult, InvoiceParser};

use crate::error::ParseError;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ParseError>;
