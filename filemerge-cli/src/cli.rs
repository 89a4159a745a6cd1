//! CLI argument parsing for filemerge.
//!
//! Also compiled by `build.rs` to render the man page, so it only depends
//! on crates available at build time.

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

use filemerge::config::{CompressionLevel, OverwriteMode, Settings};
use filemerge::error::{MergeError, Result};
use filemerge::types::{FileType, MergeOptions};
use filemerge::utils::{collect_paths_for_patterns, parse_input_list};

/// Merge PDF files or consolidate Excel workbooks.
///
/// All inputs must be of one type. PDFs are concatenated in the order
/// given; Excel sheets are copied into one workbook under unique names.
#[derive(Parser, Debug)]
#[command(name = "filemerge")]
#[command(version)]
#[command(about = "Merge PDF files or consolidate Excel workbooks", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Type of the input files
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    #[arg(value_parser = ["pdf", "excel"])]
    pub file_type: String,

    /// Input files, in output order
    ///
    /// Glob patterns are expanded, e.g. "reports/*.xlsx".
    #[arg(short, long, value_name = "FILE", num_args = 1..)]
    #[arg(required_unless_present = "input_list")]
    pub files: Vec<String>,

    /// Output file, or a directory to generate a name in
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// PDF: add one bookmark per input file
    #[arg(short, long)]
    pub bookmarks: bool,

    /// Skip invalid files instead of failing, and print a per-file summary
    #[arg(long = "validate")]
    pub validate_files: bool,

    /// Excel: keep original sheet names when no prefix is given
    #[arg(long)]
    pub preserve_sheet_names: bool,

    /// Excel: sheet name prefix for one input, e.g. "2=Q2" (1-based)
    #[arg(long, value_name = "INDEX=PREFIX")]
    pub prefix: Vec<String>,

    /// Excel: copy only these sheets of one input, e.g. "1=Summary,Data"
    #[arg(long, value_name = "INDEX=NAME[,NAME]")]
    pub sheets: Vec<String>,

    /// PDF: compression level of the output
    #[arg(short, long, value_name = "LEVEL", default_value = "none")]
    #[arg(value_parser = ["none", "standard", "maximum"])]
    pub compression: String,

    /// Show what would be merged without writing anything
    #[arg(short = 'n', long, visible_alias = "dry-run")]
    pub preview: bool,

    /// Overwrite an existing output file without asking
    #[arg(long)]
    pub force: bool,

    /// Never overwrite an existing output file
    #[arg(long, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Read additional inputs from a file, one per line
    ///
    /// Empty lines and lines starting with '#' are ignored. Listed inputs
    /// come after those given with --files.
    #[arg(long, value_name = "FILE")]
    pub input_list: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Show details about every input
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", env = "FILEMERGE_LOG", default_value = "warn")]
    #[arg(value_parser = ["off", "error", "warn", "info", "debug", "trace"])]
    pub log_level: String,
}

impl Cli {
    /// Requested input type.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown type name.
    pub fn file_type(&self) -> Result<FileType> {
        self.file_type.parse()
    }

    /// Overwrite policy from `--force` / `--no-clobber`.
    pub fn overwrite_mode(&self) -> OverwriteMode {
        if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        }
    }

    /// Library settings.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown compression level.
    pub fn to_settings(&self) -> Result<Settings> {
        let settings = Settings {
            compression: self.compression.parse::<CompressionLevel>()?,
            overwrite: self.overwrite_mode(),
            ..Settings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Request options.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `--prefix` or `--sheets` value.
    pub fn to_options(&self) -> Result<MergeOptions> {
        let sheet_prefixes = parse_assignments(&self.prefix, "--prefix")?;
        let sheet_selection = parse_assignments(&self.sheets, "--sheets")?
            .into_iter()
            .map(|(index, names)| {
                let names = names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect();
                (index, names)
            })
            .collect();

        Ok(MergeOptions {
            add_bookmarks: self.bookmarks,
            preserve_sheet_names: self.preserve_sheet_names,
            sheet_prefixes,
            sheet_selection,
            skip_invalid: self.validate_files,
            expected_type: Some(self.file_type()?),
        })
    }

    /// Check arguments that clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn check(&self) -> Result<()> {
        let file_type = self.file_type()?;
        if self.bookmarks && file_type != FileType::Pdf {
            return Err(MergeError::invalid_request(
                "--bookmarks only applies to PDF merges",
            ));
        }
        let excel_only = self.preserve_sheet_names || !self.prefix.is_empty() || !self.sheets.is_empty();
        if excel_only && file_type != FileType::Excel {
            return Err(MergeError::invalid_request(
                "--preserve-sheet-names, --prefix and --sheets only apply to Excel merges",
            ));
        }
        self.to_options().map(|_| ())
    }

    /// Every input path: `--files` first, then the input list, with glob
    /// patterns expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the input list cannot be read, a pattern is
    /// invalid, or no input remains.
    pub async fn get_all_inputs(&self) -> Result<Vec<PathBuf>> {
        let mut patterns = self.files.clone();

        if let Some(list) = &self.input_list {
            let content = tokio::fs::read_to_string(list)
                .await
                .map_err(|e| MergeError::from_read_error(list, e))?;
            patterns.extend(parse_input_list(&content));
        }

        let inputs = collect_paths_for_patterns(&patterns)?;
        if inputs.is_empty() {
            return Err(MergeError::invalid_request("No input files specified"));
        }
        Ok(inputs)
    }
}

/// Parse repeated `INDEX=VALUE` arguments with 1-based indices into a map
/// keyed by 0-based position.
fn parse_assignments(values: &[String], flag: &str) -> Result<BTreeMap<usize, String>> {
    let mut map = BTreeMap::new();

    for value in values {
        let parsed = value
            .split_once('=')
            .and_then(|(index, rest)| Some((index.trim().parse::<usize>().ok()?, rest)))
            .filter(|(index, rest)| *index > 0 && !rest.is_empty());

        let Some((index, rest)) = parsed else {
            return Err(MergeError::invalid_request(format!(
                "Invalid {flag} value '{value}': expected INDEX=VALUE with INDEX starting at 1"
            )));
        };
        if map.insert(index - 1, rest.to_string()).is_some() {
            return Err(MergeError::invalid_request(format!(
                "{flag} given twice for file #{index}"
            )));
        }
    }
    Ok(map)
}
