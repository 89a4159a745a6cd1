//! Input detection and validation.
//!
//! [`FileDetector`] decides what kind of document a path holds and checks,
//! before any merge starts, that it can actually be read:
//! - File existence and accessibility
//! - Size limits
//! - Format signature
//! - A shallow open through the format library
//!
//! # Examples
//!
//! ```no_run
//! use filemerge::validation::FileDetector;
//! use filemerge::FileType;
//! use std::path::Path;
//!
//! let detector = FileDetector::new();
//! let path = Path::new("report.pdf");
//! assert_eq!(FileDetector::detect(path), FileType::Pdf);
//! if let Err(detail) = detector.validate(path, FileType::Pdf) {
//!     eprintln!("{detail}");
//! }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::{DEFAULT_MAX_FILE_SIZE, EXCEL_EXTENSIONS, PDF_EXTENSIONS, Settings};
use crate::error::{ErrorDetail, MergeError, Result};
use crate::merge::{ExcelMerger, FormatMerger, PdfMerger};
use crate::types::{FileEntry, FileType};

/// Bytes scanned for the `%PDF-` marker.
const PDF_HEADER_WINDOW: usize = 1024;

/// Bytes of a ZIP container scanned for an `xl/` part name.
const ZIP_SCAN_WINDOW: usize = 64 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Container signature found at the start of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// `%PDF-` header.
    Pdf,
    /// ZIP local file header.
    Zip,
    /// OLE2 compound document header.
    Ole2,
}

/// Read the signature of `path`, if it has a known one.
pub fn sniff(path: &Path) -> Option<Signature> {
    let head = read_head(path, PDF_HEADER_WINDOW).ok()?;
    signature_of(&head)
}

fn signature_of(head: &[u8]) -> Option<Signature> {
    if head.starts_with(ZIP_MAGIC) {
        Some(Signature::Zip)
    } else if head.starts_with(OLE2_MAGIC) {
        Some(Signature::Ole2)
    } else if contains(head, PDF_MAGIC) {
        Some(Signature::Pdf)
    } else {
        None
    }
}

fn read_head(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(limit);
    File::open(path)?
        .take(limit as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Classifies and validates input files.
#[derive(Debug, Clone)]
pub struct FileDetector {
    max_file_size: u64,
}

impl FileDetector {
    /// Create a detector with the default size limit.
    pub fn new() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Create a detector using the limits in `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_file_size: settings.max_file_size,
        }
    }

    /// Detect the type of `path` by extension, or by signature when the
    /// extension is missing or unknown. Never fails.
    pub fn detect(path: &Path) -> FileType {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());

        match ext.as_deref() {
            Some(e) if PDF_EXTENSIONS.contains(&e) => FileType::Pdf,
            Some(e) if EXCEL_EXTENSIONS.contains(&e) => FileType::Excel,
            _ => Self::detect_by_content(path),
        }
    }

    fn detect_by_content(path: &Path) -> FileType {
        match sniff(path) {
            Some(Signature::Pdf) => FileType::Pdf,
            Some(Signature::Ole2) => FileType::Excel,
            Some(Signature::Zip) => match read_head(path, ZIP_SCAN_WINDOW) {
                Ok(head) if contains(&head, b"xl/") => FileType::Excel,
                _ => FileType::Unknown,
            },
            None => FileType::Unknown,
        }
    }

    /// Validate `path` as a file of type `file_type`.
    ///
    /// Checks, in order: existence, regular file, readability, non-zero
    /// size, size limit, signature, and a shallow open.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as an [`ErrorDetail`].
    pub fn validate(&self, path: &Path, file_type: FileType) -> std::result::Result<(), ErrorDetail> {
        self.check(path, file_type).map_err(ErrorDetail::from)
    }

    /// Same checks as [`FileDetector::validate`], keeping the full error.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn check(&self, path: &Path, file_type: FileType) -> Result<()> {
        match file_type {
            FileType::Pdf => self.check_with(&PdfMerger::new(), path),
            FileType::Excel => self.check_with(&ExcelMerger::new(), path),
            FileType::Unknown => self.check_container(path, file_type),
        }
    }

    /// Container checks for `M::FILE_TYPE`, then a shallow open by `merger`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn check_with<M: FormatMerger>(&self, merger: &M, path: &Path) -> Result<()> {
        self.check_container(path, M::FILE_TYPE)?;
        merger.validate(path)
    }

    /// Existence, size and signature checks, without opening the file
    /// through a format library.
    ///
    /// # Errors
    ///
    /// Returns the first failed check. [`FileType::Unknown`] is always
    /// rejected as unsupported once the file is known to exist.
    pub fn check_container(&self, path: &Path, file_type: FileType) -> Result<()> {
        if !path.exists() {
            return Err(MergeError::not_found(path));
        }
        if !path.is_file() {
            return Err(MergeError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let head = read_head(path, PDF_HEADER_WINDOW)
            .map_err(|e| MergeError::from_read_error(path, e))?;

        let size = std::fs::metadata(path)
            .map_err(|e| MergeError::from_read_error(path, e))?
            .len();
        if size == 0 {
            return Err(MergeError::corrupted(path, "File is empty"));
        }
        if size > self.max_file_size {
            return Err(MergeError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_file_size,
            });
        }

        let signature = signature_of(&head);
        match file_type {
            FileType::Pdf if signature != Some(Signature::Pdf) => {
                Err(MergeError::corrupted(path, "Missing %PDF- header"))
            }
            FileType::Excel
                if !matches!(signature, Some(Signature::Zip) | Some(Signature::Ole2)) =>
            {
                Err(MergeError::corrupted(
                    path,
                    "Not a ZIP or OLE2 workbook container",
                ))
            }
            FileType::Pdf | FileType::Excel => Ok(()),
            FileType::Unknown => Err(MergeError::unsupported(
                path,
                "Only PDF and Excel (.xlsx, .xlsm, .xls) files are supported",
            )),
        }
    }

    /// Validate an entry against its detected type, recording the outcome
    /// on the entry. Returns whether it is valid.
    pub fn validate_entry(&self, entry: &mut FileEntry) -> bool {
        if let Ok(metadata) = std::fs::metadata(&entry.path) {
            entry.size_bytes = metadata.len();
        }

        match self.validate(&entry.path, entry.detected_type) {
            Ok(()) => entry.mark_valid(),
            Err(detail) => entry.mark_invalid(detail),
        }
        entry.is_valid
    }

    /// Whether `path` is an existing file that can be opened for reading.
    pub fn is_accessible(path: &Path) -> bool {
        path.is_file() && File::open(path).is_ok()
    }
}

impl Default for FileDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Format file size as human-readable string.
///
/// # Examples
///
/// ```
/// use filemerge::validation::format_file_size;
///
/// assert_eq!(format_file_size(1536), "1.50 KB");
/// ```
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
