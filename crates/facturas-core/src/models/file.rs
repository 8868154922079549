//! Files discovered by a directory scan.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::invoice::file_basename;

/// Kind of a scanned file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    /// Electronic invoice (`.xml`).
    Xml,
    /// Companion receipt document (`.pdf`).
    Pdf,
    /// Companion ticket photo (`.jpg`, `.jpeg`).
    Ticket,
}

impl FileKind {
    /// Classify a lowercase extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xml" => Some(FileKind::Xml),
            "pdf" => Some(FileKind::Pdf),
            "jpg" | "jpeg" => Some(FileKind::Ticket),
            _ => None,
        }
    }

    /// Classify a path by its extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::from_extension(&ext)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Xml => "XML",
            FileKind::Pdf => "PDF",
            FileKind::Ticket => "TICKET",
        }
    }
}

/// A classified file from one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    /// Full path of the file.
    pub file_path: PathBuf,

    /// File name without extension.
    pub name: String,

    /// Kind decided by extension.
    pub kind: FileKind,

    /// UTF-8 text of the file, only loaded for XML.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

impl FileObject {
    /// Create a file entry without contents.
    pub fn new(file_path: impl Into<PathBuf>, kind: FileKind) -> Self {
        let file_path = file_path.into();
        let name = file_basename(&file_path).unwrap_or_default().to_string();
        Self {
            file_path,
            name,
            kind,
            contents: None,
        }
    }

    /// Attach the XML text.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }
}
