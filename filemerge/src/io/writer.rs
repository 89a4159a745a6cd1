//! Output writing.
//!
//! Both PDF and workbook output are written to `<output>.partial` first and
//! renamed into place once the library has finished serialising, so a
//! failed merge never leaves a truncated output behind.

use lopdf::Document;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use umya_spreadsheet::Spreadsheet;

use crate::config::CompressionLevel;
use crate::error::{MergeError, Result};

/// Buffer size for output files.
const BUFFER_SIZE: usize = 64 * 1024;

/// Writes merged documents to disk.
#[derive(Debug, Clone, Default)]
pub struct OutputWriter {
    compression: CompressionLevel,
}

impl OutputWriter {
    /// Create a writer that applies no PDF compression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with the given PDF compression level.
    pub fn with_compression(compression: CompressionLevel) -> Self {
        Self { compression }
    }

    /// Save a PDF document.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WriteFailed`] if the file cannot be created,
    /// serialised or renamed into place.
    pub fn write_pdf(&self, doc: &mut Document, path: &Path) -> Result<u64> {
        match self.compression {
            CompressionLevel::None => {}
            CompressionLevel::Standard => doc.compress(),
            CompressionLevel::Maximum => {
                doc.delete_zero_length_streams();
                doc.prune_objects();
                doc.renumber_objects();
                doc.compress();
            }
        }

        write_atomic(path, |writer| {
            doc.save_to(writer).map(|_| ()).map_err(|e| e.to_string())
        })
    }

    /// Save a workbook as `.xlsx`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WriteFailed`] if the file cannot be created,
    /// serialised or renamed into place.
    pub fn write_workbook(&self, book: &Spreadsheet, path: &Path) -> Result<u64> {
        write_atomic(path, |writer| {
            umya_spreadsheet::writer::xlsx::write_writer(book, writer).map_err(|e| e.to_string())
        })
    }
}

/// Path of the temporary file used while writing `path`.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_atomic<F>(path: &Path, serialise: F) -> Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), String>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| MergeError::write_failed(path, e.to_string()))?;
    }

    let temp = partial_path(path);
    let result = write_temp(&temp, serialise)
        .and_then(|()| std::fs::rename(&temp, path).map_err(|e| e.to_string()));

    match result {
        Ok(()) => Ok(std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)),
        Err(reason) => {
            let _ = std::fs::remove_file(&temp);
            Err(MergeError::write_failed(path, reason))
        }
    }
}

fn write_temp<F>(temp: &Path, serialise: F) -> std::result::Result<(), String>
where
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), String>,
{
    let file = File::create(temp).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
    serialise(&mut writer)?;
    writer.flush().map_err(|e| e.to_string())?;
    writer
        .into_inner()
        .map_err(|e| e.to_string())?
        .sync_all()
        .map_err(|e| e.to_string())
}
