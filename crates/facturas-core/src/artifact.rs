//! Reading source files and saving export artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::config::OverwritePolicy;

/// Raw contents of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// UTF-8 text (XML and anything that is not a PDF).
    Text(String),
    /// Binary PDF bytes.
    Binary(Vec<u8>),
}

impl FileContent {
    /// View the contents as text, replacing invalid UTF-8.
    pub fn to_text(&self) -> String {
        match self {
            FileContent::Text(text) => text.clone(),
            FileContent::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Read one file: PDFs as bytes, everything else as UTF-8 text.
///
/// A leading byte-order mark is removed from text.
pub fn read_file(path: &Path) -> std::io::Result<FileContent> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        return fs::read(path).map(FileContent::Binary);
    }

    let text = fs::read_to_string(path)?;
    Ok(FileContent::Text(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }))
}

/// Body of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactContents {
    Text(String),
    Bytes(Vec<u8>),
}

impl ArtifactContents {
    fn as_bytes(&self) -> &[u8] {
        match self {
            ArtifactContents::Text(text) => text.as_bytes(),
            ArtifactContents::Bytes(bytes) => bytes,
        }
    }
}

/// A named export result waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name without extension.
    pub name: String,
    /// Extension including the leading dot, e.g. `.csv`.
    pub extension: String,
    pub contents: ArtifactContents,
}

impl Artifact {
    pub fn text(name: impl Into<String>, extension: impl Into<String>, text: String) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            contents: ArtifactContents::Text(text),
        }
    }

    pub fn bytes(name: impl Into<String>, extension: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            contents: ArtifactContents::Bytes(bytes),
        }
    }

    /// File name with extension.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}

/// Decision for a destination that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Replace,
    Skip,
}

/// Decides what happens to artifacts whose destination exists.
pub trait ConflictResolver {
    fn resolve(&mut self, destination: &Path) -> Resolution;
}

/// Resolver that gives the same answer for every conflict.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub Resolution);

impl ConflictResolver for FixedResolver {
    fn resolve(&mut self, _destination: &Path) -> Resolution {
        self.0
    }
}

impl FixedResolver {
    /// Resolver for a non-interactive policy; `Prompt` has no fixed answer.
    pub fn for_policy(policy: OverwritePolicy) -> Option<Self> {
        match policy {
            OverwritePolicy::Replace => Some(Self(Resolution::Replace)),
            OverwritePolicy::Skip => Some(Self(Resolution::Skip)),
            OverwritePolicy::Prompt => None,
        }
    }
}

/// An artifact that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFile {
    pub name: String,
    pub path: PathBuf,
}

/// An artifact that was not written because its destination exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of saving a batch of artifacts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveReport {
    pub saved: Vec<SavedFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Write `artifacts` into `dir`, asking `resolver` about existing files.
pub fn save_artifacts(
    dir: &Path,
    artifacts: &[Artifact],
    resolver: &mut dyn ConflictResolver,
) -> Result<SaveReport> {
    fs::create_dir_all(dir)?;

    let mut report = SaveReport::default();

    for artifact in artifacts {
        let path = dir.join(artifact.file_name());

        if path.exists() && resolver.resolve(&path) == Resolution::Skip {
            info!("Skipping {}: file exists", path.display());
            report.skipped.push(SkippedFile {
                name: artifact.name.clone(),
                path,
                reason: "skipped due to existing file".to_string(),
            });
            continue;
        }

        fs::write(&path, artifact.contents.as_bytes())?;
        debug!("Wrote {}", path.display());

        report.saved.push(SavedFile {
            name: artifact.name.clone(),
            path,
        });
    }

    Ok(report)
}
