//! Error types for filemerge.
//!
//! Every failure the library can hit is a [`MergeError`]. Errors are never
//! allowed to escape the orchestrator: [`crate::FileMerger`] converts them
//! into an [`ErrorDetail`] (kind + message) inside the returned
//! [`crate::MergeResult`].
//!
//! # Error Categories
//!
//! - **Input errors**: missing files, permission problems, corrupted content
//! - **Request errors**: mixed file types, empty requests, limits
//! - **Output errors**: the merged file could not be written

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for filemerge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Classification of a failure, shared by per-file and request-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input path does not exist.
    NotFound,
    /// The input exists but cannot be read.
    PermissionDenied,
    /// The input could not be parsed by the underlying library.
    Corrupted,
    /// The input is not a PDF or Excel file, or not the requested type.
    UnsupportedType,
    /// The request mixes PDF and Excel inputs.
    MixedTypeRequest,
    /// The output could not be written.
    WriteFailed,
    /// Some Excel inputs were skipped but an output was produced.
    PartialInputFailure,
    /// Nothing valid was left to merge.
    NoValidFiles,
    /// A configured size or count limit was exceeded.
    LimitExceeded,
    /// The output exists and overwriting is not allowed.
    OutputExists,
    /// The request itself is malformed.
    InvalidRequest,
}

impl ErrorKind {
    /// Process exit code used by the CLI for this kind of failure.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::NotFound | Self::PermissionDenied => 2,
            Self::Corrupted => 3,
            Self::OutputExists => 4,
            Self::WriteFailed => 5,
            Self::PartialInputFailure => 6,
            Self::UnsupportedType
            | Self::MixedTypeRequest
            | Self::NoValidFiles
            | Self::LimitExceeded
            | Self::InvalidRequest => 1,
        }
    }

    /// Short label for summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Corrupted => "unreadable or corrupted",
            Self::UnsupportedType => "unsupported type",
            Self::MixedTypeRequest => "mixed file types",
            Self::WriteFailed => "write failed",
            Self::PartialInputFailure => "partial input failure",
            Self::NoValidFiles => "no valid files",
            Self::LimitExceeded => "limit exceeded",
            Self::OutputExists => "output exists",
            Self::InvalidRequest => "invalid request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Serialisable description of a failure, as carried in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable reason, including any library message.
    pub message: String,
}

impl ErrorDetail {
    /// Create a new detail.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&MergeError> for ErrorDetail {
    fn from(err: &MergeError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<MergeError> for ErrorDetail {
    fn from(err: MergeError) -> Self {
        Self::from(&err)
    }
}

/// Main error type for filemerge operations.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Input file was not found.
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Input exists but is not readable.
    #[error("Cannot read file: {}\n  Reason: {source}", path.display())]
    PermissionDenied {
        /// Path to the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Input path is not a regular file.
    #[error("Not a file: {}", path.display())]
    NotAFile {
        /// Offending path.
        path: PathBuf,
    },

    /// Input could not be parsed, or failed an integrity check.
    #[error("Unreadable or corrupted file: {}\n  Reason: {reason}", path.display())]
    Corrupted {
        /// Path to the file.
        path: PathBuf,
        /// Library message or check result.
        reason: String,
    },

    /// Input is encrypted and cannot be merged.
    #[error(
        "PDF is encrypted and cannot be processed: {}\n  \
         Hint: Decrypt the PDF first using 'qpdf --decrypt' or similar tools",
        path.display()
    )]
    Encrypted {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// Input type is not supported, or not the requested type.
    #[error("Unsupported file type: {}\n  Reason: {reason}", path.display())]
    UnsupportedType {
        /// Path to the file.
        path: PathBuf,
        /// Why the type was rejected.
        reason: String,
    },

    /// Inputs of different types in one request.
    #[error("All files must be of the same type. Found: {found}")]
    MixedTypes {
        /// The distinct types that were found.
        found: String,
    },

    /// Nothing valid remained to merge.
    #[error("No valid input files to merge")]
    NoValidFiles,

    /// The input file is larger than the configured limit.
    #[error("File too large: {} ({size} bytes, limit {limit} bytes)", path.display())]
    FileTooLarge {
        /// Path to the file.
        path: PathBuf,
        /// Actual size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Too many inputs in one request.
    #[error("Too many input files: {count} (limit {limit})")]
    TooManyFiles {
        /// Number of inputs given.
        count: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Output already exists and overwriting is not allowed.
    #[error(
        "Output file already exists: {}\n  \
         Use --force to overwrite or choose a different output path",
        path.display()
    )]
    OutputExists {
        /// Path to the existing output.
        path: PathBuf,
    },

    /// Writing the output failed.
    #[error("Failed to write output file: {}\n  Reason: {reason}", path.display())]
    WriteFailed {
        /// Output path.
        path: PathBuf,
        /// Library or I/O message.
        reason: String,
    },

    /// No sheet could be copied from any Excel input.
    #[error("No sheets could be copied ({} input file(s) failed)", failures.len())]
    NothingCopied {
        /// Inputs that failed, with the reason.
        failures: Vec<(PathBuf, ErrorDetail)>,
    },

    /// Malformed request or configuration.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl MergeError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a Corrupted error.
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedType error.
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a WriteFailed error.
    pub fn write_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidRequest error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Map an I/O error raised while opening `path` for reading.
    pub fn from_read_error(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
                source: err,
            },
            _ => Self::corrupted(path, err.to_string()),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotAFile { .. } | Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::Corrupted { .. } | Self::Encrypted { .. } => ErrorKind::Corrupted,
            Self::MixedTypes { .. } => ErrorKind::MixedTypeRequest,
            Self::NoValidFiles | Self::NothingCopied { .. } => ErrorKind::NoValidFiles,
            Self::FileTooLarge { .. } | Self::TooManyFiles { .. } => ErrorKind::LimitExceeded,
            Self::OutputExists { .. } => ErrorKind::OutputExists,
            Self::WriteFailed { .. } | Self::Io { .. } => ErrorKind::WriteFailed,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
        }
    }

    /// The input or output path this error is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path, .. }
            | Self::NotAFile { path }
            | Self::Corrupted { path, .. }
            | Self::Encrypted { path }
            | Self::UnsupportedType { path, .. }
            | Self::FileTooLarge { path, .. }
            | Self::OutputExists { path }
            | Self::WriteFailed { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}
