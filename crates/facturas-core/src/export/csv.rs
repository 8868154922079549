//! Fixed-column CSV summary of invoices.

use tracing::debug;

use crate::error::Result;
use crate::models::config::CsvConfig;
use crate::models::invoice::Invoice;

/// Column headers, in output order.
pub const HEADERS: [&str; 8] = [
    "Emisión", "Concepto", "Folio", "RFC", "Emisor", "Subtotal", "Iva", "Total",
];

/// UTF-8 byte-order mark prepended so spreadsheet apps detect the encoding.
pub const BOM: &str = "\u{feff}";

/// Serializes invoices into the CSV summary.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    date_format: String,
    include_bom: bool,
}

impl CsvExporter {
    /// Create an exporter with default settings.
    pub fn new() -> Self {
        Self::from_config(&CsvConfig::default())
    }

    /// Create an exporter from configuration.
    pub fn from_config(config: &CsvConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            include_bom: config.include_bom,
        }
    }

    /// Map one invoice to its row.
    pub fn row(&self, invoice: &Invoice) -> [String; 8] {
        [
            invoice.format_date(&self.date_format),
            invoice.concept.clone().unwrap_or_default(),
            invoice.display_folio(),
            invoice.emisor_rfc.clone().unwrap_or_default(),
            invoice.emisor_name.clone().unwrap_or_default(),
            invoice.subtotal.clone().unwrap_or_default(),
            invoice.tax.map(|t| t.to_string()).unwrap_or_default(),
            invoice.total.clone().unwrap_or_default(),
        ]
    }

    /// Render the whole document: header plus one row per invoice.
    pub fn export(&self, invoices: &[Invoice]) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);

        wtr.write_record(HEADERS)?;
        for invoice in invoices {
            wtr.write_record(self.row(invoice))?;
        }

        let data = wtr.into_inner().map_err(|e| e.into_error())?;
        let body = String::from_utf8(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        debug!("Rendered CSV with {} rows", invoices.len() + 1);

        if self.include_bom {
            Ok(format!("{BOM}{body}"))
        } else {
            Ok(body)
        }
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}
