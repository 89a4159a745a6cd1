//! PDF concatenation.
//!
//! Inputs are loaded one at a time, renumbered into a shared id space and
//! copied into a fresh document with a flat page tree and a new catalog.
//! Any input that fails to load aborts the merge before anything is
//! written.

use lopdf::{Document, ObjectId, dictionary};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::CompressionLevel;
use crate::error::Result;
use crate::io::{OutputWriter, PdfReader};
use crate::logging::{SharedSink, Stage, default_sink};
use crate::types::{MergeProgress, file_stem};

use super::bookmarks::{BookmarkManager, FileOutline};
use super::metadata::{PdfInfo, stamp_producer};
use super::pages;

/// Outcome of a successful PDF merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfMergeReport {
    /// Written file.
    pub output_path: PathBuf,
    /// Pages in the output.
    pub page_count: usize,
    /// Inputs merged.
    pub files_merged: usize,
    /// 0-based start page of each input.
    pub bookmark_pages: Vec<usize>,
    /// Size of the written file.
    pub bytes_written: u64,
}

/// A merged document that has not been written yet.
#[derive(Debug)]
pub struct AssembledPdf {
    /// The merged document.
    pub document: Document,
    /// Pages in the document.
    pub page_count: usize,
    /// 0-based start page of each input.
    pub start_pages: Vec<usize>,
}

/// Concatenates PDF files.
pub struct PdfMerger {
    reader: PdfReader,
    writer: OutputWriter,
    bookmarks: BookmarkManager,
    sink: SharedSink,
}

impl PdfMerger {
    /// Create a merger that writes uncompressed output and logs through the
    /// `log` facade.
    pub fn new() -> Self {
        Self::with_sink(CompressionLevel::None, default_sink())
    }

    /// Create a merger with the given compression and event sink.
    pub fn with_sink(compression: CompressionLevel, sink: SharedSink) -> Self {
        Self {
            reader: PdfReader::new(),
            writer: OutputWriter::with_compression(compression),
            bookmarks: BookmarkManager::new(),
            sink,
        }
    }

    /// Concatenate `inputs` into `output`, keeping source outlines at the
    /// top level.
    ///
    /// # Errors
    ///
    /// Returns the first input's load error, or a write error. Nothing is
    /// written in either case.
    pub fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<PdfMergeReport> {
        self.merge_to(inputs, output, false, progress)
    }

    /// Like [`PdfMerger::merge`], adding one outline entry per input that
    /// points at its first page.
    ///
    /// # Errors
    ///
    /// Same as [`PdfMerger::merge`].
    pub fn merge_with_bookmarks(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<PdfMergeReport> {
        self.merge_to(inputs, output, true, progress)
    }

    fn merge_to(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        bookmarks: bool,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<PdfMergeReport> {
        let mut assembled = self.assemble(inputs, bookmarks, progress)?;

        self.sink.info(
            Stage::Write,
            Some(output),
            format!("writing {} page(s)", assembled.page_count),
        );
        let bytes_written = self
            .writer
            .write_pdf(&mut assembled.document, output)
            .inspect_err(|e| self.sink.error(Stage::Write, Some(output), e.to_string()))?;

        Ok(PdfMergeReport {
            output_path: output.to_path_buf(),
            page_count: assembled.page_count,
            files_merged: inputs.len(),
            bookmark_pages: assembled.start_pages,
            bytes_written,
        })
    }

    /// Build the merged document in memory.
    ///
    /// # Errors
    ///
    /// Returns the load error of the first input that cannot be read.
    pub fn assemble(
        &self,
        inputs: &[PathBuf],
        bookmarks: bool,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<AssembledPdf> {
        let mut merged = Document::with_version("1.5");
        let mut next_id = 1;
        let mut page_ids: Vec<ObjectId> = Vec::new();
        let mut page_counts = Vec::with_capacity(inputs.len());
        let mut sections = Vec::with_capacity(inputs.len());

        for (index, path) in inputs.iter().enumerate() {
            let loaded = match self.reader.load(path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    self.sink.error(Stage::Merge, Some(path), e.to_string());
                    progress(MergeProgress {
                        completed: index + 1,
                        total: inputs.len(),
                        path: path.clone(),
                        ok: false,
                    });
                    return Err(e);
                }
            };

            let mut doc = loaded.document;
            doc.renumber_objects_with(next_id);
            next_id = doc.max_id + 1;

            pages::push_down_inherited(&mut doc);
            self.bookmarks.resolve_named_destinations(&mut doc);

            let doc_pages = pages::page_ids(&doc);
            let (outline_root, items) = self.bookmarks.top_level_items(&doc);
            let catalog_id = doc.trailer.get(b"Root").and_then(|r| r.as_reference()).ok();

            if version_key(&doc.version) > version_key(&merged.version) {
                merged.version = doc.version.clone();
            }

            for (id, object) in doc.objects {
                if Some(id) == catalog_id || Some(id) == outline_root || pages::is_structural(&object)
                {
                    continue;
                }
                merged.objects.insert(id, object);
            }

            page_counts.push(doc_pages.len());
            if let Some(first_page) = doc_pages.first() {
                sections.push(FileOutline {
                    title: file_stem(path),
                    first_page: *first_page,
                    items,
                });
            }
            page_ids.extend(doc_pages);

            self.sink.debug(
                Stage::Merge,
                Some(path),
                format!("appended {} page(s)", loaded.page_count),
            );
            progress(MergeProgress {
                completed: index + 1,
                total: inputs.len(),
                path: path.clone(),
                ok: true,
            });
        }

        merged.max_id = next_id.saturating_sub(1);

        let pages_id = pages::install_page_tree(&mut merged, &page_ids);
        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };

        let outline = if bookmarks {
            self.bookmarks.build_file_outline(&mut merged, &sections)
        } else {
            let items: Vec<ObjectId> = sections.iter().flat_map(|s| s.items.clone()).collect();
            self.bookmarks.concatenate(&mut merged, &items)
        };
        if let Some(outline_id) = outline {
            catalog.set("Outlines", outline_id);
            if bookmarks {
                catalog.set("PageMode", "UseOutlines");
            }
        }

        let catalog_id = merged.add_object(catalog);
        merged.trailer.set("Root", catalog_id);
        stamp_producer(&mut merged);

        merged.prune_objects();
        merged.renumber_objects();

        Ok(AssembledPdf {
            document: merged,
            page_count: page_ids.len(),
            start_pages: start_pages(&page_counts),
        })
    }

    /// Open `path` and count its pages without writing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn validate(&self, path: &Path) -> Result<usize> {
        self.reader.load(path).map(|loaded| loaded.page_count)
    }

    /// Read the metadata of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed. Missing fields
    /// are `None`, never an error.
    pub fn get_info(&self, path: &Path) -> Result<PdfInfo> {
        let doc = self.reader.open(path)?;
        Ok(PdfInfo::from_document(&doc))
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Running start page of each input, given their page counts.
pub fn start_pages(page_counts: &[usize]) -> Vec<usize> {
    page_counts
        .iter()
        .scan(0, |offset, count| {
            let start = *offset;
            *offset += count;
            Some(start)
        })
        .collect()
}

fn version_key(version: &str) -> (u32, u32) {
    let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
    (
        major.trim().parse().unwrap_or_default(),
        minor.trim().parse().unwrap_or_default(),
    )
}
