//! Configuration structures for the export pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for facturas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacturasConfig {
    /// Directory scanning configuration.
    pub scan: ScanConfig,

    /// CSV export configuration.
    pub csv: CsvConfig,

    /// Merged PDF configuration.
    pub pdf: PdfConfig,

    /// Output artifact configuration.
    pub output: OutputConfig,
}

/// Directory scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of threads reading XML files in parallel.
    pub read_jobs: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { read_jobs: 8 }
    }
}

/// CSV export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// chrono format string for the issue date column.
    pub date_format: String,

    /// Prefix the output with a UTF-8 byte-order mark.
    pub include_bom: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            date_format: "%d/%m/%Y %H:%M:%S".to_string(),
            include_bom: true,
        }
    }
}

/// Merged PDF layout and failure handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Page width in points.
    pub page_width: f32,

    /// Page height in points.
    pub page_height: f32,

    /// Margin on every side in points.
    pub margin: f32,

    /// Font size of the rendered XML.
    pub font_size: f32,

    /// Extra space between lines in points.
    pub line_gap: f32,

    /// What to do when a companion PDF cannot be loaded.
    pub companion_failure: CompanionFailurePolicy,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            margin: 40.0,
            font_size: 12.0,
            line_gap: 2.0,
            companion_failure: CompanionFailurePolicy::Abort,
        }
    }
}

/// Handling of a companion PDF that fails to load during a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanionFailurePolicy {
    /// Fail the whole export.
    #[default]
    Abort,
    /// Leave the companion out and still render the invoice XML.
    Skip,
}

/// Output artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name (without extension) of the exported artifacts.
    pub file_stem: String,

    /// What to do when an artifact already exists.
    pub overwrite: OverwritePolicy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_stem: "exported".to_string(),
            overwrite: OverwritePolicy::Prompt,
        }
    }
}

/// Handling of an existing destination file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Always replace.
    Replace,
    /// Never replace, report the file as skipped.
    Skip,
    /// Ask for every conflicting file.
    #[default]
    Prompt,
}

impl FacturasConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: FacturasConfig =
            serde_json::from_str(r#"{ "pdf": { "companion_failure": "skip" } }"#).unwrap();

        assert_eq!(config.pdf.companion_failure, CompanionFailurePolicy::Skip);
        assert_eq!(config.pdf.page_width, 612.0);
        assert_eq!(config.scan.read_jobs, 8);
        assert_eq!(config.output.file_stem, "exported");
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = FacturasConfig::default();
        config.output.overwrite = OverwritePolicy::Skip;
        config.save(&path).unwrap();

        let loaded = FacturasConfig::from_file(&path).unwrap();
        assert_eq!(loaded.output.overwrite, OverwritePolicy::Skip);
    }
}
