//! Request and result types shared by the detector, the mergers and the
//! orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ErrorDetail, MergeError};
use crate::merge::excel::WorkbookInfo;
use crate::merge::metadata::PdfInfo;
use crate::validation::FileDetector;

/// The kind of document a path holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Portable Document Format.
    Pdf,
    /// Excel workbook (`.xlsx`, `.xlsm`, `.xls`).
    Excel,
    /// Anything else.
    Unknown,
}

impl FileType {
    /// Lowercase name, as used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Excel => "excel",
            Self::Unknown => "unknown",
        }
    }

    /// Extension used for generated output names.
    pub fn output_extension(self) -> Option<&'static str> {
        match self {
            Self::Pdf => Some("pdf"),
            Self::Excel => Some("xlsx"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "excel" | "xlsx" => Ok(Self::Excel),
            _ => Err(MergeError::invalid_request(format!(
                "Invalid file type: {s}. Must be one of: pdf, excel"
            ))),
        }
    }
}

/// One input file selected for a merge.
///
/// Only `is_valid` and `error` change after creation, and only through
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path as given by the caller.
    pub path: PathBuf,

    /// Type detected from extension or signature.
    pub detected_type: FileType,

    /// Size on disk (0 when unknown).
    pub size_bytes: u64,

    /// Set by validation.
    pub is_valid: bool,

    /// Why validation failed.
    pub error: Option<ErrorDetail>,
}

impl FileEntry {
    /// Create an entry, detecting its type and size. The entry is not valid
    /// until it has been validated.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let detected_type = FileDetector::detect(&path);
        let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        Self {
            path,
            detected_type,
            size_bytes,
            is_valid: false,
            error: None,
        }
    }

    /// File name for display.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }

    pub(crate) fn mark_valid(&mut self) {
        self.is_valid = true;
        self.error = None;
    }

    pub(crate) fn mark_invalid(&mut self, error: ErrorDetail) {
        self.is_valid = false;
        self.error = Some(error);
    }
}

/// Per-request options. Keys of the per-file maps are positions in
/// [`MergeRequest::entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// PDF: add one outline entry per input file.
    pub add_bookmarks: bool,

    /// Excel: keep original sheet names when no prefix is given. When
    /// false, the file stem is used as the prefix.
    pub preserve_sheet_names: bool,

    /// Excel: explicit sheet name prefix per input.
    pub sheet_prefixes: BTreeMap<usize, String>,

    /// Excel: copy only these sheets from the given input.
    pub sheet_selection: BTreeMap<usize, Vec<String>>,

    /// Drop invalid inputs instead of failing the request.
    pub skip_invalid: bool,

    /// Reject the request unless the inputs are of this type.
    pub expected_type: Option<FileType>,
}

/// A complete merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Inputs, in output order.
    pub entries: Vec<FileEntry>,

    /// Output file, or a directory to generate a name in.
    pub output_path: PathBuf,

    /// Request options.
    pub options: MergeOptions,
}

impl MergeRequest {
    /// Build a request from plain paths.
    pub fn new<I, P>(paths: I, output_path: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: paths.into_iter().map(FileEntry::new).collect(),
            output_path: output_path.into(),
            options: MergeOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }
}

/// Lifecycle of a single merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeState {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Probing inputs.
    Validating,
    /// Writing the output.
    Merging,
    /// Output written.
    Done,
    /// Request rejected or merge failed.
    Failed,
}

impl MergeState {
    /// Whether the state can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: MergeState) -> bool {
        use MergeState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Merging)
                | (Validating, Failed)
                | (Merging, Done)
                | (Merging, Failed)
        )
    }
}

/// Progress after one input has been processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeProgress {
    /// Inputs processed so far.
    pub completed: usize,
    /// Inputs in this merge.
    pub total: usize,
    /// Input that was just processed.
    pub path: PathBuf,
    /// Whether it was merged successfully.
    pub ok: bool,
}

/// Outcome of one merge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    /// Whether an output file was written.
    pub success: bool,

    /// Final state (`Done` or `Failed`).
    pub state: MergeState,

    /// Type of the merged inputs, once known.
    pub file_type: Option<FileType>,

    /// Output path, once resolved.
    pub output_path: Option<PathBuf>,

    /// Pages (PDF) or sheets (Excel) written.
    pub units_written: usize,

    /// Inputs that made it into the output.
    pub files_merged: usize,

    /// Failures attributed to individual inputs.
    pub per_file_errors: BTreeMap<PathBuf, ErrorDetail>,

    /// PDF: 0-based start page of each merged input.
    pub bookmark_pages: Vec<usize>,

    /// Excel: destination sheet names, in order.
    pub sheet_names: Vec<String>,

    /// Non-fatal notes.
    pub warnings: Vec<String>,

    /// Request-level failure.
    pub failure: Option<ErrorDetail>,

    /// Set when some Excel inputs were skipped but an output was written.
    pub partial: Option<ErrorDetail>,
}

impl MergeResult {
    pub(crate) fn new() -> Self {
        Self {
            success: false,
            state: MergeState::Idle,
            file_type: None,
            output_path: None,
            units_written: 0,
            files_merged: 0,
            per_file_errors: BTreeMap::new(),
            bookmark_pages: Vec::new(),
            sheet_names: Vec::new(),
            warnings: Vec::new(),
            failure: None,
            partial: None,
        }
    }

    /// One-line summary for display.
    pub fn message(&self) -> String {
        if let Some(failure) = &self.failure {
            return failure.message.clone();
        }
        let unit = match self.file_type {
            Some(FileType::Excel) => "sheet(s)",
            _ => "page(s)",
        };
        format!(
            "Successfully merged {} {} file(s) into {} {}",
            self.files_merged,
            self.file_type.map(FileType::as_str).unwrap_or("unknown"),
            self.units_written,
            unit
        )
    }

    /// Process exit code: 0 on success.
    pub fn exit_code(&self) -> i32 {
        match (&self.failure, self.success) {
            (_, true) => 0,
            (Some(failure), false) => failure.kind.exit_code(),
            (None, false) => 1,
        }
    }
}

/// Type-specific details about one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileInfo {
    /// PDF metadata.
    Pdf(PdfInfo),
    /// Workbook structure and properties.
    Excel(WorkbookInfo),
}

impl FileInfo {
    /// Pages or sheets in the file.
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Pdf(info) => info.page_count,
            Self::Excel(info) => info.sheet_count,
        }
    }
}

/// Preview of one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePreview {
    /// The validated entry.
    pub entry: FileEntry,
    /// Details, when the file could be read.
    pub info: Option<FileInfo>,
}

/// What a merge would do, computed without writing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSummary {
    /// Whether the inputs could be merged as they are.
    pub valid: bool,
    /// Common type of the inputs, when consistent.
    pub file_type: Option<FileType>,
    /// Per-input details, in order.
    pub files: Vec<FilePreview>,
    /// Pages or sheets across valid inputs.
    pub total_units: usize,
    /// Bytes across valid inputs.
    pub total_size: u64,
    /// Rough output size (10% over the inputs).
    pub estimated_output_size: u64,
    /// Request-level problems.
    pub errors: Vec<String>,
}

/// File name of `path` for display and bookmark titles.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// File stem of `path`, falling back to the display name.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_name(path))
}
