//! Format-specific mergers.
//!
//! - [`pdf::PdfMerger`] concatenates PDF pages and builds outlines
//! - [`excel::ExcelMerger`] copies workbook sheets into one workbook
//!
//! Both implement [`FormatMerger`], the capability set the orchestrator
//! dispatches on.
//!
//! # Examples
//!
//! ```no_run
//! use filemerge::merge::pdf::PdfMerger;
//! use std::path::{Path, PathBuf};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let report = PdfMerger::new().merge_with_bookmarks(
//!     &inputs,
//!     Path::new("merged.pdf"),
//!     &mut |p| println!("{}/{}", p.completed, p.total),
//! )?;
//! println!("Merged {} pages", report.page_count);
//! # Ok(())
//! # }
//! ```

pub mod bookmarks;
pub mod excel;
pub mod metadata;
pub mod pages;
pub mod pdf;
pub mod sheets;

pub use bookmarks::BookmarkManager;
pub use excel::{ExcelInput, ExcelInputOptions, ExcelMergeReport, ExcelMerger, SheetInfo, WorkbookInfo};
pub use metadata::PdfInfo;
pub use pdf::{PdfMergeReport, PdfMerger};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ErrorDetail, Result};
use crate::types::{FileInfo, FileType, MergeOptions, MergeProgress};

/// What a format merger produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Pages or sheets written.
    pub units_written: usize,
    /// Inputs that made it into the output.
    pub files_merged: usize,
    /// PDF: start page of each input.
    pub bookmark_pages: Vec<usize>,
    /// Excel: destination sheet names.
    pub sheet_names: Vec<String>,
    /// Inputs that were skipped.
    pub per_file_errors: BTreeMap<PathBuf, ErrorDetail>,
    /// Non-fatal notes.
    pub warnings: Vec<String>,
    /// Size of the output file.
    pub bytes_written: u64,
}

impl From<PdfMergeReport> for MergeReport {
    fn from(report: PdfMergeReport) -> Self {
        Self {
            units_written: report.page_count,
            files_merged: report.files_merged,
            bookmark_pages: report.bookmark_pages,
            bytes_written: report.bytes_written,
            ..Self::default()
        }
    }
}

impl From<ExcelMergeReport> for MergeReport {
    fn from(report: ExcelMergeReport) -> Self {
        Self {
            units_written: report.sheet_names.len(),
            files_merged: report.files_merged,
            sheet_names: report.sheet_names,
            per_file_errors: report.per_file_errors,
            warnings: report.warnings,
            bytes_written: report.bytes_written,
            ..Self::default()
        }
    }
}

/// Operations every supported format provides.
///
/// Keys of the per-file maps in `options` are positions in `inputs`.
pub trait FormatMerger {
    /// Type this merger handles.
    const FILE_TYPE: FileType;

    /// Shallow open: the file opens as this format.
    fn validate(&self, path: &Path) -> Result<()>;

    /// Type-specific details.
    fn info(&self, path: &Path) -> Result<FileInfo>;

    /// Merge `inputs` in order into `output`.
    fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        options: &MergeOptions,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<MergeReport>;
}

impl FormatMerger for PdfMerger {
    const FILE_TYPE: FileType = FileType::Pdf;

    fn validate(&self, path: &Path) -> Result<()> {
        PdfMerger::validate(self, path).map(|_| ())
    }

    fn info(&self, path: &Path) -> Result<FileInfo> {
        self.get_info(path).map(FileInfo::Pdf)
    }

    fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        options: &MergeOptions,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<MergeReport> {
        let report = if options.add_bookmarks {
            self.merge_with_bookmarks(inputs, output, progress)?
        } else {
            PdfMerger::merge(self, inputs, output, progress)?
        };
        Ok(report.into())
    }
}

impl FormatMerger for ExcelMerger {
    const FILE_TYPE: FileType = FileType::Excel;

    fn validate(&self, path: &Path) -> Result<()> {
        ExcelMerger::validate(self, path)
    }

    fn info(&self, path: &Path) -> Result<FileInfo> {
        self.get_info(path).map(FileInfo::Excel)
    }

    fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        options: &MergeOptions,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<MergeReport> {
        let inputs: Vec<ExcelInput> = inputs
            .iter()
            .enumerate()
            .map(|(index, path)| ExcelInput {
                path: path.clone(),
                options: ExcelInputOptions {
                    prefix: options.sheet_prefixes.get(&index).cloned(),
                    sheets: options.sheet_selection.get(&index).cloned(),
                },
            })
            .collect();

        self.consolidate(&inputs, options.preserve_sheet_names, output, progress)
            .map(Into::into)
    }
}
