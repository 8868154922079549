//! CFDI invoice parser.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::models::invoice::Invoice;

use super::tree::{parse_document, FieldError, Lookup, Node};
use super::Result;

/// Local name of the CFDI root element.
const ROOT_ELEMENT: &str = "Comprobante";

/// Result of invoice extraction.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Extracted invoice data.
    pub invoice: Invoice,
    /// Fields that were present but could not be used.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for invoice parsing.
pub trait InvoiceParser {
    /// Parse the XML text of the invoice stored at `xml_path`.
    fn parse(&self, xml: &str, xml_path: &Path) -> Result<ExtractionResult>;
}

/// Parser for CFDI documents.
///
/// Reads the fixed paths below and leaves anything it cannot find unset:
///
/// - `Comprobante/@Serie`, `@Folio`, `@Fecha`, `@SubTotal`, `@Total`
/// - `Comprobante/Emisor/@Nombre`, `@Rfc`
/// - `Comprobante/Conceptos/Concepto/@Descripcion`
/// - `Comprobante/Conceptos/Concepto/Impuestos/Traslados/Traslado/@Importe`
/// - `Comprobante/Addenda/addendaFacto/notas`
#[derive(Debug, Clone, Default)]
pub struct CfdiParser;

impl CfdiParser {
    pub fn new() -> Self {
        Self
    }
}

impl InvoiceParser for CfdiParser {
    fn parse(&self, xml: &str, xml_path: &Path) -> Result<ExtractionResult> {
        let start = Instant::now();
        let root = parse_document(xml)?;
        let doc = Node::root(&root);

        let mut invoice = Invoice::new(xml_path);
        let mut warnings = Vec::new();

        if root.local_name() != ROOT_ELEMENT {
            warn!(
                "{}: root element is <{}>, expected <{}>",
                xml_path.display(),
                root.name,
                ROOT_ELEMENT
            );
            warnings.push(format!("unexpected root element <{}>", root.name));
            return Ok(ExtractionResult {
                invoice,
                warnings,
                processing_time_ms: start.elapsed().as_millis() as u64,
            });
        }

        let mut settle = |lookup: Lookup<&str>| owned(lookup, &mut warnings);

        invoice.serie = settle(doc.attr("Serie"));
        invoice.folio = settle(doc.attr("Folio"));
        invoice.date = settle(doc.attr("Fecha"));
        invoice.subtotal = settle(doc.attr("SubTotal"));
        invoice.total = settle(doc.attr("Total"));

        let emisor = doc.child("Emisor");
        invoice.emisor_name = settle(emisor.clone().and_then(|n| n.attr("Nombre")));
        invoice.emisor_rfc = settle(emisor.and_then(|n| n.attr("Rfc")));

        let concepto = doc.child("Conceptos").and_then(|n| n.child("Concepto"));
        invoice.concept = settle(concepto.clone().and_then(|n| n.attr("Descripcion")));

        invoice.notes = settle(
            doc.child("Addenda")
                .and_then(|n| n.child("addendaFacto"))
                .and_then(|n| n.child("notas"))
                .and_then(|n| n.text()),
        );

        let tax = concepto
            .and_then(|n| n.child("Impuestos"))
            .and_then(|n| n.child("Traslados"))
            .and_then(|n| n.child("Traslado"))
            .and_then(|n| n.decimal_attr("Importe"));
        invoice.tax = settle_value(tax, &mut warnings);

        debug!(
            "Extracted invoice {} from {} ({} warnings)",
            invoice.display_folio().trim(),
            xml_path.display(),
            warnings.len()
        );

        Ok(ExtractionResult {
            invoice,
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn owned(lookup: Lookup<&str>, warnings: &mut Vec<String>) -> Option<String> {
    settle_value(lookup.map(str::to_string), warnings)
}

fn settle_value<T>(lookup: Lookup<T>, warnings: &mut Vec<String>) -> Option<T> {
    match lookup {
        Ok(value) => Some(value),
        Err(FieldError::Absent { path }) => {
            trace!("{} is absent", path);
            None
        }
        Err(err @ FieldError::Malformed { .. }) => {
            warnings.push(err.to_string());
            None
        }
    }
}
