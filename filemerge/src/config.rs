//! Configuration for filemerge.
//!
//! [`Settings`] holds everything that is shared between merge requests:
//! limits, PDF compression and the output overwrite policy. A
//! [`crate::FileMerger`] keeps its settings for its whole lifetime; the
//! per-request knobs live in [`crate::MergeOptions`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::MergeError;

/// Largest input file accepted by default (500 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Largest number of inputs accepted in one request by default.
pub const DEFAULT_MAX_FILES: usize = 50;

/// Extensions recognised as PDF.
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Extensions recognised as Excel workbooks.
pub const EXCEL_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

/// Producer string written into merged PDFs.
pub const PRODUCER: &str = concat!("filemerge ", env!("CARGO_PKG_VERSION"));

/// Compression level for the output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Streams are written exactly as read.
    #[default]
    None,
    /// Compress uncompressed streams.
    Standard,
    /// Compress and drop unreferenced objects.
    Maximum,
}

impl FromStr for CompressionLevel {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "standard" => Ok(Self::Standard),
            "maximum" => Ok(Self::Maximum),
            _ => Err(MergeError::invalid_request(format!(
                "Invalid compression level: {s}. Must be one of: none, standard, maximum"
            ))),
        }
    }
}

/// What to do when the output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    /// Ask the user first. The library treats this like `Force`; prompting
    /// is the front end's job.
    #[default]
    Prompt,
    /// Always overwrite.
    Force,
    /// Never overwrite; fail the request instead.
    NoClobber,
}

/// Settings shared by every request run through one [`crate::FileMerger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Inputs larger than this are rejected during validation.
    pub max_file_size: u64,

    /// Requests with more inputs than this are rejected.
    pub max_files: usize,

    /// Compression applied to merged PDFs.
    pub compression: CompressionLevel,

    /// Overwrite policy for the output path.
    pub overwrite: OverwriteMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            compression: CompressionLevel::default(),
            overwrite: OverwriteMode::default(),
        }
    }
}

impl Settings {
    /// Check the settings for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns an error if a limit is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_files == 0 {
            return Err(MergeError::invalid_request(
                "max_files must be at least 1",
            ));
        }
        if self.max_file_size == 0 {
            return Err(MergeError::invalid_request(
                "max_file_size must be greater than zero",
            ));
        }
        Ok(())
    }
}
