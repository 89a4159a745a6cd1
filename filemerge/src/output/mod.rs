//! User-facing output for front ends.
//!
//! - [`OutputFormatter`] prints levelled messages, honouring quiet and
//!   verbose modes
//! - [`ProgressBar`] draws per-input progress
//! - The `display_*` functions render results and previews
//!
//! # Examples
//!
//! ```no_run
//! use filemerge::output::{OutputFormatter, display_result};
//! use filemerge::{FileMerger, MergeRequest};
//!
//! let formatter = OutputFormatter::new(false, false);
//! let mut merger = FileMerger::new();
//! let result = merger.merge(MergeRequest::new(["a.pdf", "b.pdf"], "out.pdf"), &mut |_| {});
//! display_result(&formatter, &result);
//! ```

pub mod formatter;
pub mod progress;

pub use formatter::{MessageLevel, OutputFormatter};
pub use progress::{ProgressBar, ProgressStyle};

use crate::types::{FileEntry, FileInfo, MergeResult, PreviewSummary, display_name};
use crate::validation::format_file_size;

/// Print the outcome of a merge: a success or failure line, then the
/// per-file summary when there is anything to report.
pub fn display_result(formatter: &OutputFormatter, result: &MergeResult) {
    if result.success {
        formatter.success(&result.message());
        if let Some(output) = &result.output_path {
            formatter.info(&format!("  Output: {}", output.display()));
        }
    } else {
        formatter.error(&result.message());
    }

    for warning in &result.warnings {
        formatter.warning(warning);
    }

    if let Some(partial) = &result.partial {
        formatter.warning(&partial.message);
    }

    display_file_errors(formatter, result);

    if formatter.is_verbose() {
        if !result.bookmark_pages.is_empty() {
            let pages: Vec<String> = result
                .bookmark_pages
                .iter()
                .map(|p| (p + 1).to_string())
                .collect();
            formatter.detail("Start pages", &pages.join(", "));
        }
        if !result.sheet_names.is_empty() {
            formatter.detail("Sheets", &result.sheet_names.join(", "));
        }
    }
}

/// Print one line per input that failed.
pub fn display_file_errors(formatter: &OutputFormatter, result: &MergeResult) {
    if result.per_file_errors.is_empty() {
        return;
    }

    formatter.warning(&format!(
        "{} file(s) could not be used:",
        result.per_file_errors.len()
    ));
    for (path, detail) in &result.per_file_errors {
        formatter.warning(&format!("  {}: {}", display_name(path), detail.kind));
        formatter.debug(&detail.message);
    }
}

/// Print one line per validated input.
pub fn display_validation(formatter: &OutputFormatter, entries: &[FileEntry]) {
    let invalid = entries.iter().filter(|e| !e.is_valid).count();

    formatter.section("Validation");
    for (index, entry) in entries.iter().enumerate() {
        match &entry.error {
            None => formatter.list_item(
                index + 1,
                &format!("{} ok ({})", entry.display_name(), format_file_size(entry.size_bytes)),
            ),
            Some(error) => {
                formatter.list_item(index + 1, &format!("{} invalid", entry.display_name()));
                formatter.warning(&format!("  {}: {}", entry.display_name(), error.kind));
                formatter.debug(&error.message);
            }
        }
    }
    if invalid > 0 {
        formatter.warning(&format!(
            "{invalid} of {} file(s) failed validation",
            entries.len()
        ));
    }
    formatter.blank_line();
}

/// Print a dry-run preview.
pub fn display_preview(formatter: &OutputFormatter, preview: &PreviewSummary) {
    let unit = match preview.file_type {
        Some(crate::FileType::Excel) => "sheet(s)",
        _ => "page(s)",
    };

    formatter.section("Preview");
    for (index, file) in preview.files.iter().enumerate() {
        let entry = &file.entry;
        let line = match (&file.info, &entry.error) {
            (_, Some(error)) => format!("{} (invalid: {})", entry.display_name(), error.kind),
            (Some(info), None) => format!(
                "{} ({} {unit}, {})",
                entry.display_name(),
                info.unit_count(),
                format_file_size(entry.size_bytes)
            ),
            (None, None) => entry.display_name(),
        };
        formatter.list_item(index + 1, &line);

        if let (Some(FileInfo::Excel(workbook)), true) = (&file.info, formatter.is_verbose()) {
            for sheet in &workbook.sheets {
                formatter.detail(
                    &sheet.name,
                    &format!("{} row(s) x {} column(s)", sheet.max_row, sheet.max_column),
                );
            }
        }
    }

    formatter.blank_line();
    formatter.info(&format!("Total: {} {unit}", preview.total_units));
    formatter.info(&format!(
        "Input size: {}, estimated output: {}",
        format_file_size(preview.total_size),
        format_file_size(preview.estimated_output_size)
    ));

    for error in &preview.errors {
        formatter.error(error);
    }
}
