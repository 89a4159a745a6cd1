//! Request handling shared by both file types.

use log::Level;
use std::sync::Arc;
use tempfile::TempDir;

use filemerge::logging::{MemorySink, Stage};
use filemerge::{
    ErrorKind, FileInfo, FileMerger, FileType, MergeOptions, MergeRequest, MergeState,
    OverwriteMode, Settings,
};

use crate::common::{quiet_merger, write_corrupted_pdf, write_pdf, write_workbook};

#[test]
fn test_mixed_types_rejected_before_writing() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 1),
        write_workbook(dir.path(), "b.xlsx", &[("S", &[("A1", "b")])]),
    ];
    let output = dir.path().join("out.pdf");

    let result = quiet_merger().merge(MergeRequest::new(inputs, &output), &mut |_| {});

    assert!(!result.success);
    assert_eq!(result.state, MergeState::Failed);
    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::MixedTypeRequest)
    );
    assert!(!output.exists());
}

#[test]
fn test_expected_type_must_match_inputs() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![write_pdf(dir.path(), "a.pdf", "A", 1)];
    let output = dir.path().join("out.xlsx");
    let request = MergeRequest::new(inputs, &output).with_options(MergeOptions {
        expected_type: Some(FileType::Excel),
        ..MergeOptions::default()
    });

    let result = quiet_merger().merge(request, &mut |_| {});

    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::UnsupportedType)
    );
    assert!(!output.exists());
}

#[test]
fn test_empty_request_is_invalid() {
    let dir = TempDir::new().unwrap();
    let request = MergeRequest::new(Vec::<std::path::PathBuf>::new(), dir.path().join("out.pdf"));

    let result = quiet_merger().merge(request, &mut |_| {});

    assert!(!result.success);
    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::InvalidRequest);
    assert!(failure.message.contains("No input files"));
}

#[test]
fn test_missing_input_is_not_found() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.pdf");
    let inputs = vec![write_pdf(dir.path(), "a.pdf", "A", 1), missing.clone()];
    let output = dir.path().join("out.pdf");

    let result = quiet_merger().merge(MergeRequest::new(inputs, &output), &mut |_| {});

    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::NotFound)
    );
    assert_eq!(result.exit_code(), 2);
    assert!(result.per_file_errors.contains_key(&missing));
}

#[test]
fn test_directory_output_gets_generated_name() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 1),
        write_pdf(dir.path(), "b.pdf", "B", 1),
    ];
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let result = quiet_merger().merge(MergeRequest::new(inputs, &out_dir), &mut |_| {});

    assert!(result.success, "{}", result.message());
    let output = result.output_path.unwrap();
    assert_eq!(output.parent(), Some(out_dir.as_path()));
    let name = output.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("merged_pdf_2files_"), "{name}");
    assert!(name.ends_with(".pdf"), "{name}");
    assert!(output.is_file());
}

#[test]
fn test_no_clobber_keeps_existing_output() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![write_pdf(dir.path(), "a.pdf", "A", 1)];
    let output = dir.path().join("out.pdf");
    std::fs::write(&output, b"keep").unwrap();

    let mut merger = FileMerger::with_settings(Settings {
        overwrite: OverwriteMode::NoClobber,
        ..Settings::default()
    })
    .unwrap();
    let result = merger.merge(MergeRequest::new(inputs, &output), &mut |_| {});

    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::OutputExists)
    );
    assert_eq!(result.exit_code(), 4);
    assert_eq!(std::fs::read(&output).unwrap(), b"keep");
}

#[test]
fn test_output_may_not_be_an_input() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", "A", 1);
    let inputs = vec![a.clone(), write_pdf(dir.path(), "b.pdf", "B", 1)];

    let result = quiet_merger().merge(MergeRequest::new(inputs, &a), &mut |_| {});

    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::InvalidRequest)
    );
    assert_eq!(filemerge::merge::PdfMerger::new().validate(&a).unwrap(), 1);
}

#[test]
fn test_too_many_files() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<_> = (0..3)
        .map(|i| write_pdf(dir.path(), &format!("{i}.pdf"), "P", 1))
        .collect();
    let mut merger = FileMerger::with_settings(Settings {
        max_files: 2,
        ..Settings::default()
    })
    .unwrap();

    let result = merger.merge(
        MergeRequest::new(inputs, dir.path().join("out.pdf")),
        &mut |_| {},
    );

    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::LimitExceeded)
    );
}

#[test]
fn test_preview_reads_without_writing() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 3),
        write_pdf(dir.path(), "b.pdf", "B", 2),
    ];
    let before: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();

    let preview = quiet_merger().preview(inputs);

    assert!(preview.valid);
    assert_eq!(preview.file_type, Some(FileType::Pdf));
    assert_eq!(preview.total_units, 5);
    assert!(preview.total_size > 0);
    assert!(preview.estimated_output_size >= preview.total_size);
    assert_eq!(preview.files.len(), 2);
    assert!(preview.errors.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), before.len());
}

#[test]
fn test_preview_flags_invalid_pdf() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 3),
        write_corrupted_pdf(dir.path(), "bad.pdf"),
    ];

    let preview = quiet_merger().preview(inputs);

    assert!(!preview.valid);
    assert_eq!(preview.total_units, 3);
    assert!(preview.errors.iter().any(|e| e.contains("bad.pdf")));
    assert!(!preview.files[1].entry.is_valid);
}

#[test]
fn test_file_info_by_type() {
    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(dir.path(), "a.pdf", "A", 4);
    let book = write_workbook(dir.path(), "b.xlsx", &[("One", &[]), ("Two", &[])]);
    let merger = quiet_merger();

    match merger.file_info(&pdf).unwrap() {
        FileInfo::Pdf(info) => assert_eq!(info.page_count, 4),
        other => panic!("expected PDF info, got {other:?}"),
    }
    match merger.file_info(&book).unwrap() {
        FileInfo::Excel(info) => assert_eq!(info.sheet_count, 2),
        other => panic!("expected workbook info, got {other:?}"),
    }
}

#[test]
fn test_validate_marks_each_entry() {
    let dir = TempDir::new().unwrap();
    let good = write_pdf(dir.path(), "a.pdf", "A", 1);
    let bad = write_corrupted_pdf(dir.path(), "bad.pdf");

    let entries = quiet_merger().validate([good, bad]);

    assert!(entries[0].is_valid);
    assert!(entries[0].error.is_none());
    assert!(!entries[1].is_valid);
    assert_eq!(
        entries[1].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Corrupted)
    );
}

#[test]
fn test_reorder_then_merge() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 1),
        write_pdf(dir.path(), "b.pdf", "B", 2),
    ];
    let ordered = FileMerger::reorder(&inputs, &[1, 0]).unwrap();
    let output = dir.path().join("out.pdf");
    let request = MergeRequest::new(ordered, &output).with_options(MergeOptions {
        add_bookmarks: true,
        ..MergeOptions::default()
    });

    let result = quiet_merger().merge(request, &mut |_| {});

    assert_eq!(result.bookmark_pages, vec![0, 2]);
    assert!(FileMerger::reorder(&inputs, &[0, 0]).is_err());
}

#[test]
fn test_events_reach_the_sink() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 1),
        write_pdf(dir.path(), "b.pdf", "B", 1),
    ];
    let sink = Arc::new(MemorySink::new());
    let mut merger = FileMerger::with_sink(Settings::default(), sink.clone()).unwrap();

    let result = merger.merge(
        MergeRequest::new(inputs, dir.path().join("out.pdf")),
        &mut |_| {},
    );
    assert!(result.success);

    let events = sink.events();
    let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
    assert_eq!(stages.first(), Some(&Stage::Validate));
    assert!(stages.contains(&Stage::Merge));
    assert_eq!(stages.last(), Some(&Stage::Write));
    assert!(sink.at_least(Level::Warn).is_empty());
}
