//! Worksheet naming and copying.
//!
//! Destination names follow Excel's rules: at most 31 characters, none of
//! `[ ] : * ? / \`, and unique without regard to case.

use calamine::{Data, Range, Reader, Xls};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{MergeError, Result};

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Number format applied to dates read from legacy workbooks.
const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Make `name` a legal sheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim().trim_matches('\'');
    let truncated: String = trimmed.chars().take(MAX_SHEET_NAME_LEN).collect();

    if truncated.is_empty() {
        "Sheet".to_string()
    } else {
        truncated
    }
}

/// Name for a copied sheet before collision handling.
///
/// An explicit prefix wins; otherwise the file stem is used as prefix
/// unless original names are preserved.
pub fn destination_name(
    original: &str,
    file_stem: &str,
    prefix: Option<&str>,
    preserve_sheet_names: bool,
) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}_{original}"),
        _ if preserve_sheet_names => original.to_string(),
        _ => format!("{file_stem}_{original}"),
    }
}

/// Hands out unique sheet names for one destination workbook.
#[derive(Debug, Default)]
pub struct SheetNamer {
    used: HashSet<String>,
}

impl SheetNamer {
    /// Create a namer with no names taken.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitise `candidate` and make it unique, appending `_2`, `_3`, ...
    /// on collision.
    pub fn claim(&mut self, candidate: &str) -> String {
        let base = sanitize_sheet_name(candidate);
        if self.used.insert(base.to_lowercase()) {
            return base;
        }

        let mut counter = 2;
        loop {
            let suffix = format!("_{counter}");
            let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
            let stem: String = base.chars().take(keep).collect();
            let name = format!("{stem}{suffix}");
            if self.used.insert(name.to_lowercase()) {
                return name;
            }
            counter += 1;
        }
    }

    /// Make `name` available again.
    pub fn release(&mut self, name: &str) {
        self.used.remove(&name.to_lowercase());
    }
}

/// Add a copy of an `.xlsx` worksheet under a new name.
///
/// Cell values, formulas, styles, dimensions, merged regions and page setup
/// all live on the worksheet, so the clone carries them over.
///
/// # Errors
///
/// Returns an error if the destination rejects the sheet.
pub fn add_renamed(
    destination: &mut Spreadsheet,
    mut sheet: Worksheet,
    name: &str,
    output: &Path,
) -> Result<()> {
    sheet.set_name(name);
    destination
        .add_sheet(sheet)
        .map(|_| ())
        .map_err(|e| MergeError::write_failed(output, format!("cannot add sheet '{name}': {e}")))
}

/// Contents of one legacy `.xls` sheet.
pub struct LegacySheet {
    values: Range<Data>,
    formulas: Option<Range<String>>,
}

impl LegacySheet {
    /// Read sheet `original` from a legacy workbook.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Corrupted`] if calamine cannot read the sheet.
    pub fn read(source: &mut Xls<BufReader<File>>, original: &str, path: &Path) -> Result<Self> {
        let values = source
            .worksheet_range(original)
            .map_err(|e| MergeError::corrupted(path, format!("sheet '{original}': {e}")))?;
        let formulas = source.worksheet_formula(original).ok();
        Ok(Self { values, formulas })
    }

    /// Highest used (row, column), 1-based; `(0, 0)` for an empty sheet.
    pub fn extent(&self) -> (u32, u32) {
        self.values
            .end()
            .map(|(row, col)| (row + 1, col + 1))
            .unwrap_or((0, 0))
    }

    /// Write values, formulas and date formats into a new sheet named
    /// `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination rejects the sheet.
    pub fn write_to(&self, destination: &mut Spreadsheet, name: &str, output: &Path) -> Result<()> {
        let sheet = destination.new_sheet(name).map_err(|e| {
            MergeError::write_failed(output, format!("cannot add sheet '{name}': {e}"))
        })?;

        fill_values(sheet, &self.values);
        if let Some(formulas) = &self.formulas {
            fill_formulas(sheet, formulas);
        }
        Ok(())
    }
}

fn fill_values(sheet: &mut Worksheet, range: &Range<Data>) {
    let Some((row0, col0)) = range.start() else {
        return;
    };

    for (row, col, value) in range.used_cells() {
        let coordinate = (col0 + col as u32 + 1, row0 + row as u32 + 1);
        let cell = sheet.get_cell_mut(coordinate);
        match value {
            Data::Empty => {}
            Data::Int(v) => {
                cell.set_value_number(*v as f64);
            }
            Data::Float(v) => {
                cell.set_value_number(*v);
            }
            Data::Bool(v) => {
                cell.set_value_bool(*v);
            }
            Data::String(v) => {
                cell.set_value_string(v.as_str());
            }
            Data::DateTime(v) => {
                cell.set_value_number(v.as_f64());
                cell.get_style_mut()
                    .get_number_format_mut()
                    .set_format_code(DATE_FORMAT);
            }
            other => {
                cell.set_value_string(other.to_string());
            }
        }
    }
}

fn fill_formulas(sheet: &mut Worksheet, range: &Range<String>) {
    let Some((row0, col0)) = range.start() else {
        return;
    };

    for (row, col, formula) in range.used_cells() {
        if formula.is_empty() {
            continue;
        }
        let coordinate = (col0 + col as u32 + 1, row0 + row as u32 + 1);
        sheet
            .get_cell_mut(coordinate)
            .set_formula(formula.trim_start_matches('='));
    }
}
