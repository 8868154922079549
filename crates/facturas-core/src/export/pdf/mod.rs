//! Merged PDF export.
//!
//! For every invoice, in input order, the merged document holds the pages of
//! its companion PDF (if any) followed by a monospace rendering of its
//! pretty-printed XML.

mod layout;
mod pretty;

use std::path::{Path, PathBuf};
use std::time::Instant;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use layout::{PageLayout, PlacedLine};
pub use pretty::pretty_print;

use crate::artifact::{read_file, FileContent};
use crate::error::PdfError;
use crate::models::config::{CompanionFailurePolicy, PdfConfig};
use crate::models::invoice::Invoice;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Indentation of the rendered XML.
const XML_INDENT: usize = 2;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic Parent chains in broken files.
const MAX_TREE_DEPTH: usize = 64;

/// A companion PDF left out under the skip policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCompanion {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters collected while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStatistics {
    /// Invoices processed.
    pub invoices: usize,
    /// Pages copied from companion PDFs.
    pub companion_pages: usize,
    /// Pages rendered from invoice XML.
    pub rendered_pages: usize,
    /// Pages in the merged document.
    pub total_pages: usize,
    /// Companions dropped under [`CompanionFailurePolicy::Skip`].
    pub skipped_companions: Vec<SkippedCompanion>,
    /// Wall time of the merge.
    pub processing_time_ms: u64,
}

/// Serialized document plus statistics.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub statistics: MergeStatistics,
}

/// Builds the merged PDF for an export request.
#[derive(Debug, Clone)]
pub struct PdfMerger {
    layout: PageLayout,
    companion_failure: CompanionFailurePolicy,
}

impl PdfMerger {
    /// Create a merger with default layout and the abort policy.
    pub fn new() -> Self {
        Self::from_config(&PdfConfig::default())
    }

    /// Create a merger from configuration.
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            layout: PageLayout::from_config(config),
            companion_failure: config.companion_failure,
        }
    }

    /// Set the handling of companion PDFs that fail to load.
    pub fn with_companion_failure(mut self, policy: CompanionFailurePolicy) -> Self {
        self.companion_failure = policy;
        self
    }

    /// Merge `invoices` into one document, in order.
    pub fn merge(&self, invoices: &[Invoice]) -> Result<MergeOutput> {
        if invoices.is_empty() {
            return Err(PdfError::NoPages);
        }

        let start = Instant::now();
        let mut merged = MergedDocument::new(&self.layout);
        let mut statistics = MergeStatistics::default();

        for invoice in invoices {
            if let Some(pdf_path) = &invoice.pdf_path {
                match merged.append_companion(pdf_path) {
                    Ok(pages) => statistics.companion_pages += pages,
                    Err(e) => match self.companion_failure {
                        CompanionFailurePolicy::Abort => return Err(e),
                        CompanionFailurePolicy::Skip => {
                            warn!("Skipping companion {}: {}", pdf_path.display(), e);
                            statistics.skipped_companions.push(SkippedCompanion {
                                path: pdf_path.clone(),
                                reason: e.to_string(),
                            });
                        }
                    },
                }
            }

            let text = render_xml(&invoice.xml_path)?;
            let pages = self.layout.paginate(&text);
            debug!(
                "Rendering {} as {} page(s)",
                invoice.xml_path.display(),
                pages.len()
            );
            for lines in &pages {
                merged.append_text_page(&self.layout, lines)?;
            }
            statistics.rendered_pages += pages.len();
            statistics.invoices += 1;
        }

        statistics.total_pages = merged.page_count();
        let bytes = merged.finish()?;
        statistics.processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Merged {} invoice(s) into {} page(s)",
            statistics.invoices, statistics.total_pages
        );

        Ok(MergeOutput { bytes, statistics })
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Pretty-printed XML of one invoice, or the raw text if it cannot be re-indented.
fn render_xml(path: &Path) -> Result<String> {
    let text = match read_file(path) {
        Ok(FileContent::Text(text)) => text,
        Ok(binary) => binary.to_text(),
        Err(source) => {
            return Err(PdfError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match pretty_print(&text, XML_INDENT) {
        Ok(pretty) => Ok(pretty),
        Err(e) => {
            warn!("Rendering {} unformatted: {}", path.display(), e);
            Ok(text)
        }
    }
}

/// Output document under construction.
struct MergedDocument {
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    kids: Vec<Object>,
}

impl MergedDocument {
    fn new(layout: &PageLayout) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        debug!(
            "Output pages {}x{} pt, {} chars per line",
            layout.width,
            layout.height,
            layout.chars_per_line()
        );

        Self {
            doc,
            pages_id,
            resources_id,
            kids: Vec::new(),
        }
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Copy every page of the PDF at `path`. Returns the number of pages added.
    fn append_companion(&mut self, path: &Path) -> Result<usize> {
        let bytes = match read_file(path) {
            Ok(FileContent::Binary(bytes)) => bytes,
            Ok(FileContent::Text(text)) => text.into_bytes(),
            Err(source) => {
                return Err(PdfError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut source = Document::load_mem(&bytes).map_err(|e| PdfError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if source.is_encrypted() {
            if source.decrypt("").is_err() {
                return Err(PdfError::Encrypted(path.to_path_buf()));
            }
            debug!("Decrypted {} with empty password", path.display());
        }

        source.renumber_objects_with(self.doc.max_id + 1);
        let pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        if pages.is_empty() {
            warn!("{} has no pages", path.display());
            return Ok(0);
        }

        let inherited: Vec<(ObjectId, Vec<(&[u8], Object)>)> = pages
            .iter()
            .map(|&page_id| (page_id, inherited_attributes(&source, page_id)))
            .collect();

        for (page_id, attributes) in inherited {
            if let Ok(Object::Dictionary(page)) = source.get_object_mut(page_id) {
                for (key, value) in attributes {
                    page.set(key, value);
                }
                page.set("Parent", self.pages_id);
            }
        }

        for (id, object) in source.objects {
            if is_tree_node(&object) {
                continue;
            }
            self.doc.max_id = self.doc.max_id.max(id.0);
            self.doc.objects.insert(id, object);
        }

        self.kids
            .extend(pages.iter().map(|&page_id| Object::Reference(page_id)));
        debug!("Appended {} page(s) from {}", pages.len(), path.display());

        Ok(pages.len())
    }

    /// Add one page of rendered text.
    fn append_text_page(&mut self, layout: &PageLayout, lines: &[PlacedLine]) -> Result<()> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Real(layout.font_size)]),
        ];
        for line in lines {
            operations.push(Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    Object::Real(layout.margin),
                    Object::Real(line.y),
                ],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(&line.text), StringFormat::Hexadecimal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations }
            .encode()
            .map_err(|e| PdfError::Write(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(layout.width),
                Object::Real(layout.height),
            ],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        });
        self.kids.push(Object::Reference(page_id));

        Ok(())
    }

    /// Close the page tree and serialize.
    fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.prune_objects();

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| PdfError::Write(e.to_string()))?;
        Ok(bytes)
    }
}

/// Catalog and page tree nodes are rebuilt for the merged document.
fn is_tree_node(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type").and_then(Object::as_name),
            Ok(b"Catalog") | Ok(b"Pages")
        ),
        _ => false,
    }
}

/// Attributes the page lacks but one of its ancestors defines.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    INHERITABLE
        .iter()
        .filter(|key| !page.has(key))
        .filter_map(|&key| find_in_ancestors(doc, page, key).map(|value| (key, value)))
        .collect()
}

fn find_in_ancestors(doc: &Document, node: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut current = node;
    for _ in 0..MAX_TREE_DEPTH {
        let parent_id = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        let parent = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = parent.get(key) {
            return Some(value.clone());
        }
        current = parent;
    }
    None
}

/// Encode text for a standard font with WinAnsiEncoding.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20AC => 0x80,
            0x00..=0x1F => b' ',
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{cfdi_xml, pdf_with_pages};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write_invoice(dir: &Path, name: &str, xml: &str, pdf: Option<Vec<u8>>) -> Invoice {
        let xml_path = dir.join(format!("{name}.xml"));
        fs::write(&xml_path, xml).unwrap();

        let mut invoice = Invoice::new(xml_path);
        if let Some(bytes) = pdf {
            let pdf_path = dir.join(format!("{name}.pdf"));
            fs::write(&pdf_path, bytes).unwrap();
            invoice.pdf_path = Some(pdf_path);
        }
        invoice
    }

    fn rendered_pages(xml: &str) -> usize {
        let text = pretty_print(xml, XML_INDENT).unwrap();
        PageLayout::default().paginate(&text).len()
    }

    fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let content = doc.get_page_content(id).unwrap();
                String::from_utf8_lossy(&content).into_owned()
            })
            .collect()
    }

    #[test]
    fn test_merge_companion_then_xml_pages() {
        let dir = tempfile::tempdir().unwrap();
        let long_xml = cfdi_xml("A", &"9".repeat(400), 16);
        let first = write_invoice(dir.path(), "first", &long_xml, Some(pdf_with_pages(2)));
        let short_xml = cfdi_xml("B", "2", 8);
        let second = write_invoice(dir.path(), "second", &short_xml, None);

        let output = PdfMerger::new().merge(&[first, second]).unwrap();
        let expected = 2 + rendered_pages(&long_xml) + rendered_pages(&short_xml);

        let doc = Document::load_mem(&output.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), expected);
        assert_eq!(output.statistics.total_pages, expected);
        assert_eq!(output.statistics.companion_pages, 2);
        assert_eq!(output.statistics.invoices, 2);

        let texts = page_texts(&output.bytes);
        assert!(texts[0].contains("page 1"));
        assert!(texts[1].contains("page 2"));
        assert!(texts[2].contains("Tj"));
        assert!(!texts[2].contains("page"));
    }

    #[test]
    fn test_companion_pages_keep_inherited_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let invoice = write_invoice(dir.path(), "a", &cfdi_xml("A", "1", 16), Some(pdf_with_pages(1)));

        let output = PdfMerger::new().merge(&[invoice]).unwrap();
        let doc = Document::load_mem(&output.bytes).unwrap();
        let first = doc.get_pages()[&1];
        let page = doc.get_dictionary(first).unwrap();

        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[3].as_i64().unwrap(), 842);
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn test_text_page_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let invoice = write_invoice(dir.path(), "a", &cfdi_xml("A", "1", 16), None);

        let output = PdfMerger::new().merge(&[invoice]).unwrap();
        let doc = Document::load_mem(&output.bytes).unwrap();
        let page_id = doc.get_pages()[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();

        assert_eq!(media_box[2].as_float().unwrap(), 612.0);
        assert_eq!(media_box[3].as_float().unwrap(), 792.0);
    }

    #[test]
    fn test_corrupt_companion_aborts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let invoice = write_invoice(
            dir.path(),
            "broken",
            &cfdi_xml("A", "1", 16),
            Some(b"not a pdf".to_vec()),
        );

        let err = PdfMerger::new().merge(&[invoice]).unwrap_err();
        assert!(matches!(err, PdfError::Parse { .. }));
    }

    #[test]
    fn test_corrupt_companion_skipped_under_skip_policy() {
        let dir = tempfile::tempdir().unwrap();
        let xml = cfdi_xml("A", "1", 16);
        let invoice = write_invoice(dir.path(), "broken", &xml, Some(b"not a pdf".to_vec()));
        let pdf_path = invoice.pdf_path.clone().unwrap();

        let output = PdfMerger::new()
            .with_companion_failure(CompanionFailurePolicy::Skip)
            .merge(&[invoice])
            .unwrap();

        assert_eq!(output.statistics.total_pages, rendered_pages(&xml));
        assert_eq!(output.statistics.skipped_companions.len(), 1);
        assert_eq!(output.statistics.skipped_companions[0].path, pdf_path);
    }

    #[test]
    fn test_missing_xml_fails() {
        let invoice = Invoice::new("/definitely/missing/invoice.xml");
        let err = PdfMerger::new().merge(&[invoice]).unwrap_err();
        assert!(matches!(err, PdfError::Read { .. }));
    }

    #[test]
    fn test_malformed_xml_rendered_raw() {
        let dir = tempfile::tempdir().unwrap();
        let invoice = write_invoice(dir.path(), "raw", "<a><b></a>", None);

        let output = PdfMerger::new().merge(&[invoice]).unwrap();
        assert_eq!(output.statistics.rendered_pages, 1);
    }

    #[test]
    fn test_empty_list_is_an_error() {
        assert!(matches!(PdfMerger::new().merge(&[]), Err(PdfError::NoPages)));
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(win_ansi("Año €\tx"), vec![b'A', 0xF1, b'o', b' ', 0x80, b' ', b'x']);
        assert_eq!(win_ansi("日本"), b"??".to_vec());
    }
}
