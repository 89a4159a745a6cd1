//! Loading of PDF documents and workbooks.
//!
//! Every loader is synchronous and maps library failures onto
//! [`MergeError`] variants that name the offending file. File handles live
//! only as long as the returned value.

use calamine::{Reader, Xls, open_workbook};
use lopdf::Document;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use umya_spreadsheet::Spreadsheet;

use crate::error::{MergeError, Result};
use crate::validation::{self, Signature};

/// A loaded PDF document.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document.
    pub document: Document,

    /// Path to the source file.
    pub path: PathBuf,

    /// Number of pages in the document.
    pub page_count: usize,
}

/// PDF loader. Documents without pages are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a new PDF reader.
    pub fn new() -> Self {
        Self
    }

    /// Load a single PDF document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - File is not a valid PDF
    /// - PDF is encrypted
    /// - PDF has no pages
    pub fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let document = self.open(path)?;

        if document.is_encrypted() {
            return Err(MergeError::Encrypted {
                path: path.to_path_buf(),
            });
        }

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(MergeError::corrupted(path, "PDF has no pages"));
        }

        Ok(LoadedPdf {
            document,
            path: path.to_path_buf(),
            page_count,
        })
    }

    /// Parse the document without any structural checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(&self, path: &Path) -> Result<Document> {
        let bytes = std::fs::read(path).map_err(|e| MergeError::from_read_error(path, e))?;

        Document::load_mem(&bytes).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("encrypt") || msg.contains("password") {
                MergeError::Encrypted {
                    path: path.to_path_buf(),
                }
            } else {
                MergeError::corrupted(path, msg)
            }
        })
    }
}

/// Container format of a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// Office Open XML (`.xlsx`, `.xlsm`).
    OpenXml,
    /// Legacy BIFF (`.xls`).
    Biff,
}

impl WorkbookFormat {
    /// Decide the format from the extension, falling back to the file
    /// signature.
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        match ext.as_deref() {
            Some("xls") => Self::Biff,
            Some("xlsx") | Some("xlsm") => Self::OpenXml,
            _ => match validation::sniff(path) {
                Some(Signature::Ole2) => Self::Biff,
                _ => Self::OpenXml,
            },
        }
    }
}

/// An opened source workbook.
pub enum LoadedWorkbook {
    /// Fully parsed `.xlsx` / `.xlsm` workbook.
    OpenXml(Box<Spreadsheet>),
    /// Legacy workbook read through calamine.
    Biff(Box<Xls<BufReader<File>>>),
}

impl LoadedWorkbook {
    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        match self {
            Self::OpenXml(book) => book
                .get_sheet_collection()
                .iter()
                .map(|sheet| sheet.get_name().to_string())
                .collect(),
            Self::Biff(xls) => xls.sheet_names(),
        }
    }
}

/// Workbook loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookReader;

impl WorkbookReader {
    /// Create a new workbook reader.
    pub fn new() -> Self {
        Self
    }

    /// Open a workbook with all sheets parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not a
    /// workbook the underlying library understands.
    pub fn load(&self, path: &Path) -> Result<LoadedWorkbook> {
        check_readable(path)?;

        match WorkbookFormat::of(path) {
            WorkbookFormat::OpenXml => umya_spreadsheet::reader::xlsx::read(path)
                .map(|book| LoadedWorkbook::OpenXml(Box::new(book)))
                .map_err(|e| MergeError::corrupted(path, e.to_string())),
            WorkbookFormat::Biff => open_workbook::<Xls<_>, _>(path)
                .map(|xls| LoadedWorkbook::Biff(Box::new(xls)))
                .map_err(|e| MergeError::corrupted(path, e.to_string())),
        }
    }

    /// Open the workbook container without parsing sheet contents.
    ///
    /// # Errors
    ///
    /// Same as [`WorkbookReader::load`].
    pub fn open_shallow(&self, path: &Path) -> Result<()> {
        check_readable(path)?;

        match WorkbookFormat::of(path) {
            WorkbookFormat::OpenXml => umya_spreadsheet::reader::xlsx::lazy_read(path)
                .map(|_| ())
                .map_err(|e| MergeError::corrupted(path, e.to_string())),
            WorkbookFormat::Biff => open_workbook::<Xls<_>, _>(path)
                .map(|_| ())
                .map_err(|e| MergeError::corrupted(path, e.to_string())),
        }
    }
}

fn check_readable(path: &Path) -> Result<()> {
    File::open(path)
        .map(|_| ())
        .map_err(|e| MergeError::from_read_error(path, e))
}
