//! Workbook consolidation.
//!
//! Every selected sheet of every input becomes one sheet of a new `.xlsx`
//! workbook. An input that cannot be read is recorded and skipped; the merge
//! only fails when no sheet at all could be copied.

use calamine::Reader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{ErrorDetail, MergeError, Result};
use crate::io::{LoadedWorkbook, OutputWriter, WorkbookReader};
use crate::logging::{SharedSink, Stage, default_sink};
use crate::types::{MergeProgress, display_name, file_stem};

use super::sheets::{LegacySheet, SheetNamer, add_renamed, destination_name};

/// Per-input options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcelInputOptions {
    /// Prefix for the copied sheet names.
    pub prefix: Option<String>,
    /// Copy only these sheets. `None` copies all.
    pub sheets: Option<Vec<String>>,
}

/// One queued input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcelInput {
    /// Workbook path.
    pub path: PathBuf,
    /// How to copy it.
    pub options: ExcelInputOptions,
}

/// Outcome of a workbook merge that produced output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcelMergeReport {
    /// Written file.
    pub output_path: PathBuf,
    /// Destination sheet names, in order.
    pub sheet_names: Vec<String>,
    /// Inputs that contributed at least one sheet.
    pub files_merged: usize,
    /// Inputs that were skipped.
    pub per_file_errors: BTreeMap<PathBuf, ErrorDetail>,
    /// Requested sheets that did not exist.
    pub warnings: Vec<String>,
    /// Size of the written file.
    pub bytes_written: u64,
}

/// Dimensions of one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    /// Sheet name.
    pub name: String,
    /// Highest used row (1-based, 0 when empty).
    pub max_row: u32,
    /// Highest used column (1-based, 0 when empty).
    pub max_column: u32,
}

/// Structure and document properties of a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookInfo {
    /// Number of sheets.
    pub sheet_count: usize,
    /// Per-sheet dimensions.
    pub sheets: Vec<SheetInfo>,
    /// Document title.
    pub title: Option<String>,
    /// Document creator.
    pub creator: Option<String>,
    /// Document description.
    pub description: Option<String>,
    /// Creation timestamp as stored.
    pub created: Option<String>,
    /// Last modification timestamp as stored.
    pub modified: Option<String>,
}

/// One sheet read from an input, ready to be added.
enum StagedSheet {
    OpenXml(Box<Worksheet>),
    Legacy(LegacySheet),
}

impl StagedSheet {
    fn add_to(self, book: &mut Spreadsheet, name: &str, output: &Path) -> Result<()> {
        match self {
            Self::OpenXml(sheet) => add_renamed(book, *sheet, name, output),
            Self::Legacy(sheet) => sheet.write_to(book, name, output),
        }
    }
}

/// Destination naming state for one merge.
struct Naming<'a> {
    namer: &'a mut SheetNamer,
    preserve_sheet_names: bool,
}

/// Consolidates workbooks.
pub struct ExcelMerger {
    queue: Vec<ExcelInput>,
    preserve_sheet_names: bool,
    reader: WorkbookReader,
    writer: OutputWriter,
    sink: SharedSink,
}

impl ExcelMerger {
    /// Create a merger that prefixes sheet names with the file stem.
    pub fn new() -> Self {
        Self::with_sink(default_sink())
    }

    /// Create a merger reporting to `sink`.
    pub fn with_sink(sink: SharedSink) -> Self {
        Self {
            queue: Vec::new(),
            preserve_sheet_names: false,
            reader: WorkbookReader::new(),
            writer: OutputWriter::new(),
            sink,
        }
    }

    /// Keep original sheet names for inputs without a prefix.
    pub fn preserve_sheet_names(mut self, preserve: bool) -> Self {
        self.preserve_sheet_names = preserve;
        self
    }

    /// Queue an input for [`ExcelMerger::merge`].
    pub fn add_file(&mut self, path: impl Into<PathBuf>, options: ExcelInputOptions) {
        self.queue.push(ExcelInput {
            path: path.into(),
            options,
        });
    }

    /// Number of queued inputs.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Merge the queued inputs into `output` and empty the queue.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::NothingCopied`] if no sheet could be copied,
    /// or a write error.
    pub fn merge(
        &mut self,
        output: &Path,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<ExcelMergeReport> {
        let inputs = std::mem::take(&mut self.queue);
        self.merge_inputs(&inputs, output, progress)
    }

    /// Merge every sheet of `inputs` into `output`.
    ///
    /// # Errors
    ///
    /// Same as [`ExcelMerger::merge`].
    pub fn merge_files(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<ExcelMergeReport> {
        let inputs: Vec<ExcelInput> = inputs
            .iter()
            .map(|path| ExcelInput {
                path: path.clone(),
                options: ExcelInputOptions::default(),
            })
            .collect();
        self.merge_inputs(&inputs, output, progress)
    }

    /// Merge `inputs` with their own options into `output`.
    ///
    /// # Errors
    ///
    /// Same as [`ExcelMerger::merge`].
    pub fn merge_inputs(
        &self,
        inputs: &[ExcelInput],
        output: &Path,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<ExcelMergeReport> {
        self.consolidate(inputs, self.preserve_sheet_names, output, progress)
    }

    pub(crate) fn consolidate(
        &self,
        inputs: &[ExcelInput],
        preserve_sheet_names: bool,
        output: &Path,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> Result<ExcelMergeReport> {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        let mut namer = SheetNamer::new();
        let mut sheet_names = Vec::new();
        let mut per_file_errors = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut files_merged = 0;

        for (index, input) in inputs.iter().enumerate() {
            let copied = self
                .stage(input, &mut warnings)
                .and_then(|staged| {
                    let naming = Naming {
                        namer: &mut namer,
                        preserve_sheet_names,
                    };
                    self.commit(&mut book, naming, staged, input, output)
                });

            let ok = match copied {
                Ok(names) => {
                    if !names.is_empty() {
                        files_merged += 1;
                    }
                    self.sink.debug(
                        Stage::Merge,
                        Some(&input.path),
                        format!("copied {} sheet(s)", names.len()),
                    );
                    sheet_names.extend(names);
                    true
                }
                Err(e) => {
                    self.sink.warn(Stage::Merge, Some(&input.path), format!("skipped: {e}"));
                    per_file_errors.insert(input.path.clone(), ErrorDetail::from(&e));
                    false
                }
            };

            progress(MergeProgress {
                completed: index + 1,
                total: inputs.len(),
                path: input.path.clone(),
                ok,
            });
        }

        if sheet_names.is_empty() {
            return Err(MergeError::NothingCopied {
                failures: per_file_errors.into_iter().collect(),
            });
        }

        self.sink.info(
            Stage::Write,
            Some(output),
            format!("writing {} sheet(s)", sheet_names.len()),
        );
        let bytes_written = self
            .writer
            .write_workbook(&book, output)
            .inspect_err(|e| self.sink.error(Stage::Write, Some(output), e.to_string()))?;

        Ok(ExcelMergeReport {
            output_path: output.to_path_buf(),
            sheet_names,
            files_merged,
            per_file_errors,
            warnings,
            bytes_written,
        })
    }

    /// Read the selected sheets of one input without touching the
    /// destination, so a failure leaves no partial copy behind.
    fn stage(
        &self,
        input: &ExcelInput,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<(String, StagedSheet)>> {
        let loaded = self.reader.load(&input.path)?;
        let selected = self.select(&input.path, &loaded.sheet_names(), &input.options, warnings);

        match loaded {
            LoadedWorkbook::OpenXml(source) => Ok(selected
                .into_iter()
                .filter_map(|name| {
                    let sheet = source.get_sheet_by_name(&name)?.clone();
                    Some((name, StagedSheet::OpenXml(Box::new(sheet))))
                })
                .collect()),
            LoadedWorkbook::Biff(mut source) => selected
                .into_iter()
                .map(|name| -> Result<(String, StagedSheet)> {
                    let sheet = LegacySheet::read(&mut source, &name, &input.path)?;
                    Ok((name, StagedSheet::Legacy(sheet)))
                })
                .collect(),
        }
    }

    fn select(
        &self,
        path: &Path,
        available: &[String],
        options: &ExcelInputOptions,
        warnings: &mut Vec<String>,
    ) -> Vec<String> {
        let Some(requested) = &options.sheets else {
            return available.to_vec();
        };

        let mut selected = Vec::with_capacity(requested.len());
        for name in requested {
            if available.contains(name) {
                selected.push(name.clone());
            } else {
                let message = format!("Sheet '{name}' not found in {}", display_name(path));
                self.sink.warn(Stage::Merge, Some(path), message.clone());
                warnings.push(message);
            }
        }
        selected
    }

    /// Add the staged sheets of one input. If any of them is rejected, the
    /// sheets already added for this input are removed again and their
    /// names released, so the input contributes all of its sheets or none.
    fn commit(
        &self,
        book: &mut Spreadsheet,
        naming: Naming<'_>,
        staged: Vec<(String, StagedSheet)>,
        input: &ExcelInput,
        output: &Path,
    ) -> Result<Vec<String>> {
        let stem = file_stem(&input.path);
        let prefix = input.options.prefix.as_deref();
        let Naming {
            namer,
            preserve_sheet_names,
        } = naming;

        let mut names: Vec<String> = Vec::with_capacity(staged.len());
        for (original, sheet) in staged {
            let name = namer.claim(&destination_name(
                &original,
                &stem,
                prefix,
                preserve_sheet_names,
            ));
            if let Err(e) = sheet.add_to(book, &name, output) {
                namer.release(&name);
                for added in &names {
                    namer.release(added);
                    // Present: it was added above under this exact name.
                    let _ = book.remove_sheet_by_name(added);
                }
                return Err(e);
            }
            names.push(name);
        }
        Ok(names)
    }

    /// Check that `path` opens as a workbook.
    ///
    /// # Errors
    ///
    /// Returns an error if it does not.
    pub fn validate(&self, path: &Path) -> Result<()> {
        self.reader.open_shallow(path)
    }

    /// Read sheet dimensions and document properties.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be read.
    pub fn get_info(&self, path: &Path) -> Result<WorkbookInfo> {
        match self.reader.load(path)? {
            LoadedWorkbook::OpenXml(book) => {
                let sheets: Vec<SheetInfo> = book
                    .get_sheet_collection()
                    .iter()
                    .map(|sheet| {
                        let (max_column, max_row) = sheet.get_highest_column_and_row();
                        SheetInfo {
                            name: sheet.get_name().to_string(),
                            max_row,
                            max_column,
                        }
                    })
                    .collect();
                let props = book.get_properties();

                Ok(WorkbookInfo {
                    sheet_count: sheets.len(),
                    sheets,
                    title: non_empty(props.get_title()),
                    creator: non_empty(props.get_creator()),
                    description: non_empty(props.get_description()),
                    created: non_empty(props.get_created()),
                    modified: non_empty(props.get_modified()),
                })
            }
            LoadedWorkbook::Biff(mut xls) => {
                let mut sheets = Vec::new();
                for name in xls.sheet_names() {
                    let (max_row, max_column) = LegacySheet::read(&mut xls, &name, path)?.extent();
                    sheets.push(SheetInfo {
                        name,
                        max_row,
                        max_column,
                    });
                }

                Ok(WorkbookInfo {
                    sheet_count: sheets.len(),
                    sheets,
                    ..WorkbookInfo::default()
                })
            }
        }
    }
}

impl Default for ExcelMerger {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
