//! filemerge - Concatenate PDF files and consolidate Excel workbooks.
//!
//! The library takes an ordered list of input files of one type and writes
//! a single combined output:
//!
//! - PDF inputs are concatenated page by page, optionally with one outline
//!   entry per input
//! - Excel inputs (`.xlsx`, `.xlsm`, `.xls`) have their sheets copied into
//!   one `.xlsx` workbook under unique names
//!
//! [`FileMerger`] is the entry point. It validates the request, dispatches
//! to [`merge::PdfMerger`] or [`merge::ExcelMerger`] and reports the
//! outcome as a [`MergeResult`].
//!
//! # Examples
//!
//! ## Merge PDFs with bookmarks
//!
//! ```no_run
//! use filemerge::{FileMerger, MergeOptions, MergeRequest};
//!
//! let mut merger = FileMerger::new();
//! let request = MergeRequest::new(["a.pdf", "b.pdf"], "merged.pdf").with_options(MergeOptions {
//!     add_bookmarks: true,
//!     ..MergeOptions::default()
//! });
//!
//! let result = merger.merge(request, &mut |_| {});
//! if result.success {
//!     println!("Start pages: {:?}", result.bookmark_pages);
//! } else {
//!     eprintln!("{}", result.message());
//! }
//! ```
//!
//! ## Preview before merging
//!
//! ```no_run
//! use filemerge::FileMerger;
//!
//! let preview = FileMerger::new().preview(["q1.xlsx", "q2.xlsx"]);
//! println!("{} sheet(s), about {} bytes", preview.total_units, preview.estimated_output_size);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod file_merger;
pub mod io;
pub mod logging;
pub mod merge;
pub mod output;
pub mod types;
pub mod utils;
pub mod validation;
pub mod worker;

// Re-export commonly used types
pub use config::{CompressionLevel, OverwriteMode, Settings};
pub use error::{ErrorDetail, ErrorKind, MergeError, Result};
pub use file_merger::{FileMerger, generate_output_filename};
pub use types::{
    FileEntry, FileInfo, FilePreview, FileType, MergeOptions, MergeProgress, MergeRequest,
    MergeResult, MergeState, PreviewSummary,
};
pub use validation::FileDetector;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
