//! Invoice record derived from a CFDI document.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single invoice extracted from a CFDI XML file.
///
/// Every field read from the document is optional: partial invoices are
/// valid and render with empty cells in the exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice series (`Serie`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serie: Option<String>,

    /// Invoice number within the series (`Folio`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folio: Option<String>,

    /// Issuer legal name (`Emisor/@Nombre`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emisor_name: Option<String>,

    /// Issuer tax id (`Emisor/@Rfc`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emisor_rfc: Option<String>,

    /// Issue timestamp as written in the document (`Fecha`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Subtotal as written in the document (`SubTotal`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<String>,

    /// Transferred tax of the first concept (`Traslado/@Importe`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<Decimal>,

    /// Total as written in the document (`Total`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,

    /// Description of the first concept (`Concepto/@Descripcion`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,

    /// Free-form notes from the addenda.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Path of the XML the invoice was read from.
    pub xml_path: PathBuf,

    /// Companion PDF sharing the XML basename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<PathBuf>,

    /// Companion ticket image sharing the XML basename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

impl Invoice {
    /// Create an invoice with no extracted fields for the given XML.
    pub fn new(xml_path: impl Into<PathBuf>) -> Self {
        Self {
            xml_path: xml_path.into(),
            ..Self::default()
        }
    }

    /// Basename of the source XML, the key used to find companions.
    pub fn basename(&self) -> Option<&str> {
        file_basename(&self.xml_path)
    }

    /// Series and folio joined by a single space.
    ///
    /// Missing parts render as empty strings, so an invoice without series
    /// yields `" 123"`.
    pub fn display_folio(&self) -> String {
        format!(
            "{} {}",
            self.serie.as_deref().unwrap_or_default(),
            self.folio.as_deref().unwrap_or_default()
        )
    }

    /// Parse the issue date.
    ///
    /// CFDI timestamps carry no offset (`2024-01-01T10:00:00`); RFC 3339
    /// values and bare dates are accepted as well.
    pub fn issued_at(&self) -> Option<NaiveDateTime> {
        let raw = self.date.as_deref()?.trim();

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_local()))
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    /// Format the issue date for display.
    ///
    /// Unparseable dates, and dates the format string cannot render, are
    /// returned verbatim; a missing date is empty.
    pub fn format_date(&self, format: &str) -> String {
        let Some(raw) = &self.date else {
            return String::new();
        };
        let Some(parsed) = self.issued_at() else {
            return raw.clone();
        };

        let mut out = String::new();
        match write!(out, "{}", parsed.format(format)) {
            Ok(()) => out,
            Err(_) => raw.clone(),
        }
    }
}

/// File name without its extension.
pub fn file_basename(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_folio() {
        let mut invoice = Invoice::new("a.xml");
        invoice.serie = Some("A".to_string());
        invoice.folio = Some("123".to_string());
        assert_eq!(invoice.display_folio(), "A 123");

        invoice.serie = None;
        assert_eq!(invoice.display_folio(), " 123");
    }

    #[test]
    fn test_issued_at_formats() {
        let mut invoice = Invoice::new("a.xml");

        invoice.date = Some("2024-01-01T10:00:00".to_string());
        assert_eq!(invoice.format_date("%d/%m/%Y %H:%M:%S"), "01/01/2024 10:00:00");

        invoice.date = Some("2024-03-05".to_string());
        assert_eq!(invoice.format_date("%d/%m/%Y"), "05/03/2024");

        invoice.date = Some("2024-03-05T08:30:00-06:00".to_string());
        assert_eq!(invoice.format_date("%H:%M"), "08:30");
    }

    #[test]
    fn test_format_date_fallbacks() {
        let mut invoice = Invoice::new("a.xml");
        assert_eq!(invoice.format_date("%d/%m/%Y"), "");

        invoice.date = Some("ayer".to_string());
        assert_eq!(invoice.format_date("%d/%m/%Y"), "ayer");

        invoice.date = Some("2024-01-01T10:00:00".to_string());
        assert_eq!(invoice.format_date("%Q"), "2024-01-01T10:00:00");
    }

    #[test]
    fn test_basename() {
        let invoice = Invoice::new("/data/2024/F-001.xml");
        assert_eq!(invoice.basename(), Some("F-001"));
    }
}
