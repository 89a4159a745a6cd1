//! I/O operations for filemerge.
//!
//! This module handles all file I/O:
//! - Loading PDF documents and workbooks from disk
//! - Writing merged output atomically
//!
//! # Examples
//!
//! ```no_run
//! use filemerge::io::{OutputWriter, PdfReader};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut loaded = PdfReader::new().load(Path::new("input.pdf"))?;
//! OutputWriter::new().write_pdf(&mut loaded.document, Path::new("copy.pdf"))?;
//! # Ok(())
//! # }
//! ```

pub mod reader;
pub mod writer;

pub use reader::{LoadedPdf, LoadedWorkbook, PdfReader, WorkbookFormat, WorkbookReader};
pub use writer::{OutputWriter, partial_path};
