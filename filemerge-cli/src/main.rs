//! filemerge - Merge PDF files or consolidate Excel workbooks.

mod cli;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use crate::cli::Cli;
use filemerge::config::OverwriteMode;
use filemerge::error::MergeError;
use filemerge::output::{
    OutputFormatter, ProgressBar, ProgressStyle, display_preview, display_result,
    display_validation,
};
use filemerge::worker::spawn_merge;
use filemerge::{FileMerger, MergeRequest};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let outcome = run(&cli).await;
    if let Err(err) = &outcome {
        eprintln!("Error: {err:#}");
    }
    process::exit(exit_code(&outcome));
}

/// Process exit code for the outcome of a run.
fn exit_code(outcome: &anyhow::Result<i32>) -> i32 {
    match outcome {
        Ok(code) => *code,
        Err(err) => err
            .downcast_ref::<MergeError>()
            .map(MergeError::exit_code)
            .unwrap_or(1),
    }
}

/// Main application logic. Returns the process exit code.
async fn run(cli: &Cli) -> anyhow::Result<i32> {
    cli.check()?;
    init_logging(cli)?;
    execute(cli).await
}

/// Everything after logging is installed.
async fn execute(cli: &Cli) -> anyhow::Result<i32> {
    let inputs = cli.get_all_inputs().await?;
    let settings = cli.to_settings()?;
    let options = cli.to_options()?;
    let formatter = OutputFormatter::new(cli.quiet || cli.json, cli.verbose);

    log::info!("{} v{} starting with {} input(s)", filemerge::NAME, filemerge::VERSION, inputs.len());
    let merger = FileMerger::with_settings(settings.clone())?;

    if formatter.should_print() {
        formatter.section(&format!("filemerge v{}", filemerge::VERSION));
        formatter.blank_line();
    }

    if cli.preview {
        let preview = merger.preview(inputs);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else {
            display_preview(&formatter, &preview);
            if preview.valid {
                formatter.success("Preview completed, nothing was written");
            }
        }
        return Ok(if preview.valid { 0 } else { 1 });
    }

    if cli.validate_files {
        let entries = merger.validate(inputs.iter().cloned());
        display_validation(&formatter, &entries);
    }

    handle_output_overwrite(&cli.output, settings.overwrite, &formatter)?;

    let total = inputs.len();
    let request = MergeRequest::new(inputs, &cli.output).with_options(options);

    formatter.info(&format!("Merging {total} {} file(s)...", cli.file_type));
    let mut progress = if formatter.should_print() {
        ProgressBar::new(total, ProgressStyle::Bar)
    } else {
        ProgressBar::disabled()
    };

    let mut handle = spawn_merge(merger, request);
    let mut seen = 0;
    while let Some(event) = handle.next_progress().await {
        seen += 1;
        progress.observe(&event);
    }
    if seen > 0 {
        progress.finish();
    }
    let (_, result) = handle.wait().await.context("merge worker failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        display_result(&formatter, &result);
    }
    log::info!("finished with exit code {}", result.exit_code());

    Ok(result.exit_code())
}

/// Install the terminal logger and, when requested, a file logger.
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level: LevelFilter = cli
        .log_level
        .parse()
        .ok()
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;
    let term_level = if cli.quiet || cli.json {
        level.min(LevelFilter::Error)
    } else if cli.verbose {
        level.max(LevelFilter::Info)
    } else {
        level
    };

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = &cli.log_file {
        let file = File::create(path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level.max(LevelFilter::Info), config, file));
    }

    CombinedLogger::init(loggers).context("failed to initialise logging")
}

/// Decide whether an existing output file may be replaced.
fn handle_output_overwrite(
    output: &Path,
    mode: OverwriteMode,
    formatter: &OutputFormatter,
) -> Result<(), MergeError> {
    if !output.is_file() {
        return Ok(());
    }

    match mode {
        OverwriteMode::Force => Ok(()),
        OverwriteMode::NoClobber => Err(MergeError::OutputExists {
            path: output.to_path_buf(),
        }),
        OverwriteMode::Prompt => {
            if formatter.is_quiet() {
                return Err(MergeError::OutputExists {
                    path: output.to_path_buf(),
                });
            }

            formatter.warning(&format!("Output file already exists: {}", output.display()));
            print!("Overwrite? [y/N]: ");
            io::stdout().flush().ok();

            let mut response = String::new();
            io::stdin().read_line(&mut response)?;

            match response.trim().to_lowercase().as_str() {
                "y" | "yes" => Ok(()),
                _ => Err(MergeError::OutputExists {
                    path: output.to_path_buf(),
                }),
            }
        }
    }
}
