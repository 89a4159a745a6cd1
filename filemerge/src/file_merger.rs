//! Request orchestration.
//!
//! [`FileMerger`] takes a [`MergeRequest`] through validation, output
//! resolution and the type-specific merge, and always answers with a
//! [`MergeResult`]. Errors never escape [`FileMerger::merge`].

use chrono::{Local, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::{OverwriteMode, Settings};
use crate::error::{ErrorDetail, ErrorKind, MergeError, Result};
use crate::logging::{SharedSink, Stage, default_sink};
use crate::merge::{ExcelMerger, FormatMerger, MergeReport, PdfMerger};
use crate::types::{
    FileEntry, FileInfo, FilePreview, FileType, MergeOptions, MergeProgress, MergeRequest,
    MergeResult, MergeState, PreviewSummary,
};
use crate::validation::FileDetector;

/// Estimated output size relative to the summed input size.
const OUTPUT_SIZE_FACTOR: f64 = 1.1;

/// Validated, resolved work for one merge.
#[derive(Debug)]
struct MergePlan {
    file_type: FileType,
    inputs: Vec<PathBuf>,
    output: PathBuf,
    options: MergeOptions,
}

/// State of a single request.
struct MergeSession {
    result: MergeResult,
}

impl MergeSession {
    fn new() -> Self {
        Self {
            result: MergeResult::new(),
        }
    }

    fn state(&self) -> MergeState {
        self.result.state
    }

    fn advance(&mut self, next: MergeState) {
        debug_assert!(
            self.state().can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state(),
            next
        );
        if self.state().can_transition_to(next) {
            self.result.state = next;
        }
    }

    fn fail(mut self, error: MergeError) -> MergeResult {
        if let MergeError::NothingCopied { failures } = &error {
            self.result
                .per_file_errors
                .extend(failures.iter().cloned());
        }
        self.result.failure = Some(ErrorDetail::from(&error));
        self.result.success = false;
        self.advance(MergeState::Failed);
        self.result
    }

    fn complete(mut self, report: MergeReport, total_inputs: usize) -> MergeResult {
        let result = &mut self.result;
        result.success = true;
        result.units_written = report.units_written;
        result.files_merged = report.files_merged;
        result.bookmark_pages = report.bookmark_pages;
        result.sheet_names = report.sheet_names;
        result.warnings.extend(report.warnings);
        result.per_file_errors.extend(report.per_file_errors);

        if !result.per_file_errors.is_empty() {
            result.partial = Some(ErrorDetail::new(
                ErrorKind::PartialInputFailure,
                format!(
                    "{} of {} input file(s) were skipped",
                    result.per_file_errors.len(),
                    total_inputs
                ),
            ));
        }
        self.advance(MergeState::Done);
        self.result
    }
}

/// Runs merge requests.
///
/// Holds configuration only; every call to [`FileMerger::merge`] starts
/// from a fresh session.
///
/// # Examples
///
/// ```no_run
/// use filemerge::{FileMerger, MergeOptions, MergeRequest};
///
/// let mut merger = FileMerger::new();
/// let request = MergeRequest::new(["q1.xlsx", "q2.xlsx"], "year.xlsx").with_options(
///     MergeOptions {
///         preserve_sheet_names: true,
///         ..MergeOptions::default()
///     },
/// );
/// let result = merger.merge(request, &mut |p| println!("{}/{}", p.completed, p.total));
/// println!("{}", result.message());
/// ```
pub struct FileMerger {
    settings: Settings,
    sink: SharedSink,
    detector: FileDetector,
    pdf: PdfMerger,
    excel: ExcelMerger,
}

impl FileMerger {
    /// Create a merger with default settings, logging through `log`.
    pub fn new() -> Self {
        Self::build(Settings::default(), default_sink())
    }

    /// Create a merger with `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn with_settings(settings: Settings) -> Result<Self> {
        Self::with_sink(settings, default_sink())
    }

    /// Create a merger with `settings`, reporting events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn with_sink(settings: Settings, sink: SharedSink) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(settings, sink))
    }

    fn build(settings: Settings, sink: SharedSink) -> Self {
        Self {
            detector: FileDetector::from_settings(&settings),
            pdf: PdfMerger::with_sink(settings.compression, sink.clone()),
            excel: ExcelMerger::with_sink(sink.clone()),
            settings,
            sink,
        }
    }

    /// Settings in use.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `request` to completion.
    ///
    /// `progress` is called once after each input has been processed.
    pub fn merge(
        &mut self,
        request: MergeRequest,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> MergeResult {
        let mut session = MergeSession::new();
        session.advance(MergeState::Validating);
        self.sink.info(
            Stage::Validate,
            None,
            format!("validating {} file(s)", request.entries.len()),
        );

        let plan = match self.plan(request, &mut session.result) {
            Ok(plan) => plan,
            Err(e) => {
                self.sink.error(Stage::Validate, e.path(), e.to_string());
                return session.fail(e);
            }
        };

        session.advance(MergeState::Merging);
        self.sink.info(
            Stage::Merge,
            Some(&plan.output),
            format!("merging {} {} file(s)", plan.inputs.len(), plan.file_type),
        );

        match plan.file_type {
            FileType::Pdf => Self::run(&self.pdf, &plan, session, progress),
            FileType::Excel => Self::run(&self.excel, &plan, session, progress),
            FileType::Unknown => session.fail(MergeError::invalid_request("no mergeable type")),
        }
    }

    fn run<M: FormatMerger>(
        merger: &M,
        plan: &MergePlan,
        mut session: MergeSession,
        progress: &mut dyn FnMut(MergeProgress),
    ) -> MergeResult {
        let total_inputs = plan.inputs.len() + session.result.per_file_errors.len();

        match merger.merge(&plan.inputs, &plan.output, &plan.options, progress) {
            Ok(report) => session.complete(report, total_inputs),
            Err(e) => {
                if let Some(path) = e
                    .path()
                    .filter(|p| plan.inputs.iter().any(|i| i.as_path() == *p))
                {
                    session
                        .result
                        .per_file_errors
                        .insert(path.to_path_buf(), ErrorDetail::from(&e));
                }
                session.fail(e)
            }
        }
    }

    /// Validate the request and work out what to merge where. Per-file
    /// findings are recorded in `result` as they are made.
    fn plan(&self, request: MergeRequest, result: &mut MergeResult) -> Result<MergePlan> {
        let MergeRequest {
            mut entries,
            output_path,
            options,
        } = request;

        if entries.is_empty() {
            return Err(MergeError::invalid_request("No input files provided"));
        }
        if entries.len() > self.settings.max_files {
            return Err(MergeError::TooManyFiles {
                count: entries.len(),
                limit: self.settings.max_files,
            });
        }
        check_option_indices(&options, entries.len())?;

        let file_type = self.request_type(&entries, options.expected_type, result)?;
        result.file_type = Some(file_type);

        let mut valid = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter_mut().enumerate() {
            match self.check(&entry.path, entry.detected_type) {
                Ok(()) => {
                    entry.mark_valid();
                    valid.push(index);
                }
                Err(e) => {
                    let detail = ErrorDetail::from(&e);
                    entry.mark_invalid(detail.clone());
                    result.per_file_errors.insert(entry.path.clone(), detail);

                    if file_type == FileType::Pdf && !options.skip_invalid {
                        return Err(e);
                    }
                    self.sink
                        .warn(Stage::Validate, Some(&entry.path), format!("skipping: {e}"));
                }
            }
        }

        if valid.is_empty() {
            return Err(MergeError::NoValidFiles);
        }

        let inputs: Vec<PathBuf> = valid.iter().map(|&i| entries[i].path.clone()).collect();
        let output = self.resolve_output(&output_path, file_type, inputs.len(), &inputs)?;
        result.output_path = Some(output.clone());

        Ok(MergePlan {
            file_type,
            options: remap_options(&options, &valid),
            inputs,
            output,
        })
    }

    /// The single known type of `entries`, checked against `expected`.
    fn request_type(
        &self,
        entries: &[FileEntry],
        expected: Option<FileType>,
        result: &mut MergeResult,
    ) -> Result<FileType> {
        let known: BTreeSet<FileType> = entries
            .iter()
            .map(|e| e.detected_type)
            .filter(|t| *t != FileType::Unknown)
            .collect();

        if known.len() > 1 {
            let found: Vec<&str> = known.iter().map(|t| t.as_str()).collect();
            return Err(MergeError::MixedTypes {
                found: found.join(", "),
            });
        }

        match (known.first().copied(), expected) {
            (Some(found), Some(expected)) if found != expected => {
                let path = entries
                    .iter()
                    .find(|e| e.detected_type == found)
                    .map(|e| e.path.clone())
                    .unwrap_or_default();
                Err(MergeError::unsupported(
                    path,
                    format!("expected {expected} input, found {found}"),
                ))
            }
            (Some(found), _) => Ok(found),
            (None, Some(expected)) => Ok(expected),
            (None, None) => {
                for entry in entries {
                    result.per_file_errors.insert(
                        entry.path.clone(),
                        ErrorDetail::new(ErrorKind::UnsupportedType, "not a PDF or Excel file"),
                    );
                }
                Err(MergeError::unsupported(
                    entries[0].path.clone(),
                    "Only PDF and Excel (.xlsx, .xlsm, .xls) files are supported",
                ))
            }
        }
    }

    /// Final output path: generated inside `output` when it is a directory
    /// or has no extension.
    fn resolve_output(
        &self,
        output: &Path,
        file_type: FileType,
        file_count: usize,
        inputs: &[PathBuf],
    ) -> Result<PathBuf> {
        if output.as_os_str().is_empty() {
            return Err(MergeError::invalid_request("No output path provided"));
        }

        let resolved = if output.is_dir() || output.extension().is_none() {
            output.join(generate_output_filename(file_type, file_count))
        } else {
            output.to_path_buf()
        };

        if resolved.exists() {
            if resolved.is_dir() {
                return Err(MergeError::invalid_request(format!(
                    "Output path is a directory: {}",
                    resolved.display()
                )));
            }
            if is_one_of(&resolved, inputs) {
                return Err(MergeError::invalid_request(format!(
                    "Output file cannot be one of the inputs: {}",
                    resolved.display()
                )));
            }
            if self.settings.overwrite == OverwriteMode::NoClobber {
                return Err(MergeError::OutputExists { path: resolved });
            }
        }
        Ok(resolved)
    }

    /// Validate `paths` without merging.
    pub fn validate<I, P>(&self, paths: I) -> Vec<FileEntry>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .map(|path| {
                let mut entry = FileEntry::new(path);
                self.detector.validate_entry(&mut entry);
                entry
            })
            .collect()
    }

    /// Describe what merging `paths` would do. Reads inputs only.
    pub fn preview<I, P>(&self, paths: I) -> PreviewSummary
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let entries = self.validate(paths);
        self.sink.info(
            Stage::Preview,
            None,
            format!("previewing {} file(s)", entries.len()),
        );
        let mut errors = Vec::new();

        let known: BTreeSet<FileType> = entries
            .iter()
            .map(|e| e.detected_type)
            .filter(|t| *t != FileType::Unknown)
            .collect();
        let file_type = match known.len() {
            0 => None,
            1 => known.first().copied(),
            _ => {
                let found: Vec<&str> = known.iter().map(|t| t.as_str()).collect();
                errors.push(format!(
                    "All files must be of the same type. Found: {}",
                    found.join(", ")
                ));
                None
            }
        };

        let files: Vec<FilePreview> = entries
            .into_iter()
            .map(|entry| {
                let info = entry
                    .is_valid
                    .then(|| self.info_for(&entry.path, entry.detected_type).ok())
                    .flatten();
                FilePreview { entry, info }
            })
            .collect();

        let valid: Vec<&FilePreview> = files.iter().filter(|f| f.entry.is_valid).collect();
        if files.is_empty() {
            errors.push("No input files provided".to_string());
        } else if valid.is_empty() {
            errors.push("No valid input files to merge".to_string());
        }
        if file_type == Some(FileType::Pdf) {
            for file in files.iter().filter(|f| !f.entry.is_valid) {
                errors.push(format!("Invalid PDF: {}", file.entry.display_name()));
            }
        }

        let total_units = valid
            .iter()
            .filter_map(|f| f.info.as_ref())
            .map(FileInfo::unit_count)
            .sum();
        let total_size: u64 = valid.iter().map(|f| f.entry.size_bytes).sum();

        PreviewSummary {
            valid: errors.is_empty(),
            file_type,
            total_units,
            total_size,
            estimated_output_size: (total_size as f64 * OUTPUT_SIZE_FACTOR) as u64,
            files,
            errors,
        }
    }

    /// Type-specific details of one file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file fails validation or cannot be read.
    pub fn file_info(&self, path: &Path) -> Result<FileInfo> {
        let file_type = FileDetector::detect(path);
        self.check(path, file_type)?;
        self.info_for(path, file_type)
    }

    /// Container checks, then a shallow open by the merger for `file_type`.
    fn check(&self, path: &Path, file_type: FileType) -> Result<()> {
        match file_type {
            FileType::Pdf => self.detector.check_with(&self.pdf, path),
            FileType::Excel => self.detector.check_with(&self.excel, path),
            FileType::Unknown => self.detector.check_container(path, file_type),
        }
    }

    fn info_for(&self, path: &Path, file_type: FileType) -> Result<FileInfo> {
        match file_type {
            FileType::Pdf => self.pdf.info(path),
            FileType::Excel => self.excel.info(path),
            FileType::Unknown => Err(MergeError::unsupported(
                path,
                "Only PDF and Excel (.xlsx, .xlsm, .xls) files are supported",
            )),
        }
    }

    /// Reorder `files` so that position `i` holds `files[order[i]]`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidRequest`] unless `order` is a
    /// permutation of `0..files.len()`.
    pub fn reorder<T: Clone>(files: &[T], order: &[usize]) -> Result<Vec<T>> {
        let mut seen = vec![false; files.len()];
        let is_permutation = order.len() == files.len()
            && order
                .iter()
                .all(|&i| i < files.len() && !std::mem::replace(&mut seen[i], true));

        if !is_permutation {
            return Err(MergeError::invalid_request(format!(
                "Order {order:?} is not a permutation of {} file(s)",
                files.len()
            )));
        }
        Ok(order.iter().map(|&i| files[i].clone()).collect())
    }
}

impl Default for FileMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Generated output file name, stamped with the current local time.
pub fn generate_output_filename(file_type: FileType, file_count: usize) -> String {
    output_filename_at(file_type, file_count, Local::now().naive_local())
}

fn output_filename_at(file_type: FileType, file_count: usize, at: NaiveDateTime) -> String {
    let ext = file_type.output_extension().unwrap_or("out");
    format!(
        "merged_{}_{}files_{}.{ext}",
        file_type.as_str(),
        file_count,
        at.format("%Y%m%d_%H%M%S")
    )
}

fn check_option_indices(options: &MergeOptions, len: usize) -> Result<()> {
    let out_of_range = options
        .sheet_prefixes
        .keys()
        .chain(options.sheet_selection.keys())
        .find(|&&i| i >= len);

    match out_of_range {
        Some(index) => Err(MergeError::invalid_request(format!(
            "Option refers to file #{index}, but only {len} file(s) were given"
        ))),
        None => Ok(()),
    }
}

/// Rekey per-file options from request positions to positions among the
/// valid inputs.
fn remap_options(options: &MergeOptions, valid: &[usize]) -> MergeOptions {
    fn remap<V: Clone>(map: &BTreeMap<usize, V>, valid: &[usize]) -> BTreeMap<usize, V> {
        valid
            .iter()
            .enumerate()
            .filter_map(|(position, index)| map.get(index).map(|v| (position, v.clone())))
            .collect()
    }

    MergeOptions {
        sheet_prefixes: remap(&options.sheet_prefixes, valid),
        sheet_selection: remap(&options.sheet_selection, valid),
        ..options.clone()
    }
}

fn is_one_of(path: &Path, inputs: &[PathBuf]) -> bool {
    let Ok(target) = path.canonicalize() else {
        return false;
    };
    inputs
        .iter()
        .filter_map(|input| input.canonicalize().ok())
        .any(|input| input == target)
}
