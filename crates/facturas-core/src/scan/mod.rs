//! Recursive directory scanning and file classification.

mod selection;

pub use selection::{select_and_scan, DirectoryPicker, Selection};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::models::config::ScanConfig;
use crate::models::file::{FileKind, FileObject};

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a listed entry did not make it into the scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The extension is not one of xml, pdf, jpg, jpeg.
    UnsupportedExtension(String),
    /// The file has no extension at all.
    NoExtension,
    /// The XML could not be read as UTF-8 text.
    Unreadable(String),
    /// The directory walk failed at this path.
    WalkFailed(String),
    /// The entry is a symbolic link; links are never followed.
    Symlink,
}

/// A dropped entry and the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of scanning one directory tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Directory that was scanned.
    pub root: PathBuf,
    /// Accepted files, sorted by path.
    pub files: Vec<FileObject>,
    /// Entries that were listed but dropped, sorted by path.
    pub skipped: Vec<SkippedEntry>,
}

impl ScanReport {
    /// Number of accepted files of the given kind.
    pub fn count(&self, kind: FileKind) -> usize {
        self.files.iter().filter(|f| f.kind == kind).count()
    }

    /// Skipped entries whose XML could not be read.
    pub fn unreadable(&self) -> impl Iterator<Item = &SkippedEntry> {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::Unreadable(_)))
    }
}

/// Directory scanner.
#[derive(Debug, Clone)]
pub struct Scanner {
    /// Threads used to read XML files.
    read_jobs: usize,
}

impl Scanner {
    /// Create a scanner with default settings.
    pub fn new() -> Self {
        Self::from_config(&ScanConfig::default())
    }

    /// Create a scanner from configuration.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            read_jobs: config.read_jobs.max(1),
        }
    }

    /// Set the number of reader threads.
    pub fn with_read_jobs(mut self, jobs: usize) -> Self {
        self.read_jobs = jobs.max(1);
        self
    }

    /// Scan `root` recursively.
    ///
    /// Fails only when the root itself cannot be listed. Everything below
    /// the root either becomes a [`FileObject`] or a [`SkippedEntry`].
    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        check_root(root)?;

        let pattern = format!("{}/**/*", glob::Pattern::escape(&root.to_string_lossy()));
        let entries = glob::glob(&pattern).map_err(|e| ScanError::Pattern(e.to_string()))?;

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut links = LinkCache::default();

        for entry in entries {
            let listed = match &entry {
                Ok(path) => path.as_path(),
                Err(e) => e.path(),
            };
            if let Some(link) = links.first_link(root, listed) {
                if links.report(&link) {
                    debug!("Not following symlink {}", link.display());
                    skipped.push(SkippedEntry {
                        path: link,
                        reason: SkipReason::Symlink,
                    });
                }
                continue;
            }

            match entry {
                Ok(path) => {
                    if !path.is_file() {
                        continue;
                    }
                    match classify(&path) {
                        Ok(kind) => candidates.push((path, kind)),
                        Err(reason) => {
                            debug!("Skipping {}: {:?}", path.display(), reason);
                            skipped.push(SkippedEntry { path, reason });
                        }
                    }
                }
                Err(e) => {
                    warn!("Could not list {}: {}", e.path().display(), e.error());
                    skipped.push(SkippedEntry {
                        path: e.path().to_path_buf(),
                        reason: SkipReason::WalkFailed(e.error().to_string()),
                    });
                }
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.read_jobs)
            .build()
            .map_err(|e| ScanError::ThreadPool(e.to_string()))?;

        let loaded: Vec<std::result::Result<FileObject, SkippedEntry>> = pool.install(|| {
            candidates
                .into_par_iter()
                .map(|(path, kind)| load(path, kind))
                .collect()
        });

        let mut files = Vec::with_capacity(loaded.len());
        for result in loaded {
            match result {
                Ok(file) => files.push(file),
                Err(entry) => skipped.push(entry),
            }
        }

        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        skipped.sort_by(|a, b| a.path.cmp(&b.path));
        skipped.dedup_by(|a, b| a.path == b.path);

        info!(
            "Scanned {}: {} files accepted, {} skipped",
            root.display(),
            files.len(),
            skipped.len()
        );

        Ok(ScanReport {
            root: root.to_path_buf(),
            files,
            skipped,
        })
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

fn check_root(root: &Path) -> Result<()> {
    let to_scan_error = |e: std::io::Error| match e.kind() {
        ErrorKind::NotFound => ScanError::NotFound(root.to_path_buf()),
        ErrorKind::PermissionDenied => ScanError::PermissionDenied(root.to_path_buf()),
        _ => ScanError::Io {
            path: root.to_path_buf(),
            source: e,
        },
    };

    let metadata = fs::metadata(root).map_err(to_scan_error)?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    fs::read_dir(root).map_err(to_scan_error)?;
    Ok(())
}

/// Symlink lookups for the paths seen during one walk.
#[derive(Default)]
struct LinkCache {
    is_link: HashMap<PathBuf, bool>,
    reported: HashSet<PathBuf>,
}

impl LinkCache {
    /// Outermost symlink between `root` (exclusive) and `path` (inclusive).
    fn first_link(&mut self, root: &Path, path: &Path) -> Option<PathBuf> {
        let mut below_root: Vec<&Path> = path
            .ancestors()
            .take_while(|p| *p != root && !p.as_os_str().is_empty())
            .collect();
        below_root.reverse();

        below_root.into_iter().find_map(|candidate| {
            let is_link = *self
                .is_link
                .entry(candidate.to_path_buf())
                .or_insert_with(|| {
                    fs::symlink_metadata(candidate)
                        .map(|m| m.file_type().is_symlink())
                        .unwrap_or(false)
                });
            is_link.then(|| candidate.to_path_buf())
        })
    }

    /// True the first time `link` is seen.
    fn report(&mut self, link: &Path) -> bool {
        self.reported.insert(link.to_path_buf())
    }
}

fn classify(path: &Path) -> std::result::Result<FileKind, SkipReason> {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return Err(SkipReason::NoExtension),
    };

    FileKind::from_extension(&ext).ok_or(SkipReason::UnsupportedExtension(ext))
}

fn load(path: PathBuf, kind: FileKind) -> std::result::Result<FileObject, SkippedEntry> {
    if kind != FileKind::Xml {
        return Ok(FileObject::new(path, kind));
    }

    match fs::read_to_string(&path) {
        Ok(text) => {
            debug!("Read {} ({} bytes)", path.display(), text.len());
            let text = match text.strip_prefix('\u{feff}') {
                Some(stripped) => stripped.to_string(),
                None => text,
            };
            Ok(FileObject::new(path, kind).with_contents(text))
        }
        Err(e) => {
            warn!("Could not read XML file {}: {}", path.display(), e);
            Err(SkippedEntry {
                path,
                reason: SkipReason::Unreadable(e.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, rel: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = Scanner::new().scan(dir.path()).unwrap();

        assert!(report.files.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_scan_classifies_recursively() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.xml", b"<r/>");
        write(dir.path(), "nested/b.PDF", b"%PDF-1.4");
        write(dir.path(), "nested/deeper/c.jpg", b"\xff\xd8");
        write(dir.path(), "nested/deeper/d.JPEG", b"\xff\xd8");
        write(dir.path(), "notes.txt", b"hello");
        write(dir.path(), "Makefile", b"all:");

        let report = Scanner::new().with_read_jobs(2).scan(dir.path()).unwrap();

        let kinds: Vec<(String, FileKind)> = report
            .files
            .iter()
            .map(|f| (f.name.clone(), f.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a".to_string(), FileKind::Xml),
                ("b".to_string(), FileKind::Pdf),
                ("c".to_string(), FileKind::Ticket),
                ("d".to_string(), FileKind::Ticket),
            ]
        );

        for file in &report.files {
            assert_eq!(FileKind::from_path(&file.file_path), Some(file.kind));
            assert_eq!(file.contents.is_some(), file.kind == FileKind::Xml);
        }

        let reasons: Vec<&SkipReason> = report.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &SkipReason::NoExtension,
                &SkipReason::UnsupportedExtension("txt".to_string()),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_follow_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let xml = write(dir.path(), "a.xml", b"<r/>");
        symlink(dir.path(), dir.path().join("loop")).unwrap();
        symlink(&xml, dir.path().join("b.xml")).unwrap();

        let report = Scanner::new().scan(dir.path()).unwrap();

        let files: Vec<&Path> = report.files.iter().map(|f| f.file_path.as_path()).collect();
        assert_eq!(files, vec![xml.as_path()]);
        assert_eq!(
            report.skipped,
            vec![
                SkippedEntry {
                    path: dir.path().join("b.xml"),
                    reason: SkipReason::Symlink,
                },
                SkippedEntry {
                    path: dir.path().join("loop"),
                    reason: SkipReason::Symlink,
                },
            ]
        );
    }

    #[test]
    fn test_scan_reads_xml_and_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.xml", "\u{feff}<r/>".as_bytes());

        let report = Scanner::new().scan(dir.path()).unwrap();
        assert_eq!(report.files[0].contents.as_deref(), Some("<r/>"));
    }

    #[test]
    fn test_unreadable_xml_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.xml", b"<r/>");
        let bad = write(dir.path(), "bad.xml", b"\xff\xfe\x00broken");

        let report = Scanner::new().scan(dir.path()).unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].name, "good");

        let unreadable: Vec<&SkippedEntry> = report.unreadable().collect();
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].path, bad);
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = Scanner::new().scan(&missing).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_scan_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "a.xml", b"<r/>");

        let err = Scanner::new().scan(&file).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn test_scan_root_with_glob_characters() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "[2024]/a.xml", b"<r/>");

        let report = Scanner::new().scan(&dir.path().join("[2024]")).unwrap();
        assert_eq!(report.files.len(), 1);
    }

    /// Remove all permissions from `dir`. False when they are not enforced,
    /// as for the superuser.
    #[cfg(unix)]
    fn lock(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(dir).is_ok() {
            unlock(dir);
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn unlock(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_subdirectory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.xml", b"<r/>");
        write(dir.path(), "locked/b.xml", b"<r/>");
        let locked = dir.path().join("locked");
        if !lock(&locked) {
            return;
        }

        let report = Scanner::new().scan(dir.path());
        unlock(&locked);
        let report = report.unwrap();

        let names: Vec<&str> = report.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, locked);
        assert!(matches!(report.skipped[0].reason, SkipReason::WalkFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_unlistable_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        if !lock(&root) {
            return;
        }

        let result = Scanner::new().scan(&root);
        unlock(&root);

        assert!(matches!(result, Err(ScanError::PermissionDenied(p)) if p == root));
    }
}
