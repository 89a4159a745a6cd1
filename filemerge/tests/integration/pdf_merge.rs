//! PDF merges end to end.

use lopdf::Document;
use rstest::rstest;
use std::path::PathBuf;
use tempfile::TempDir;

use filemerge::io::partial_path;
use filemerge::merge::PdfMerger;
use filemerge::{
    CompressionLevel, ErrorKind, FileMerger, MergeOptions, MergeRequest, MergeState, Settings,
};

use crate::common::{
    outline, page_contents, page_text, quiet_merger, write_corrupted_pdf, write_pdf,
    write_pdf_with_outline,
};

fn three_inputs(dir: &TempDir) -> Vec<PathBuf> {
    vec![
        write_pdf(dir.path(), "a.pdf", "A", 3),
        write_pdf(dir.path(), "b.pdf", "B", 5),
        write_pdf(dir.path(), "c.pdf", "C", 2),
    ]
}

fn with_bookmarks() -> MergeOptions {
    MergeOptions {
        add_bookmarks: true,
        ..MergeOptions::default()
    }
}

#[test]
fn test_pages_appended_in_order() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("merged.pdf");
    let request = MergeRequest::new(three_inputs(&dir), &output);

    let result = quiet_merger().merge(request, &mut |_| {});

    assert!(result.success, "{}", result.message());
    assert_eq!(result.state, MergeState::Done);
    assert_eq!(result.units_written, 10);
    assert_eq!(result.files_merged, 3);
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));

    let contents = page_contents(&output);
    let expected: Vec<String> = (1..=3)
        .map(|p| page_text("A", p))
        .chain((1..=5).map(|p| page_text("B", p)))
        .chain((1..=2).map(|p| page_text("C", p)))
        .collect();
    assert_eq!(contents.len(), expected.len());
    for (content, text) in contents.iter().zip(&expected) {
        assert!(content.contains(text.as_str()), "{content:?} should show {text}");
    }
}

#[test]
fn test_bookmarks_point_at_start_pages() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("merged.pdf");
    let request = MergeRequest::new(three_inputs(&dir), &output).with_options(with_bookmarks());

    let result = quiet_merger().merge(request, &mut |_| {});
    assert!(result.success, "{}", result.message());
    assert_eq!(result.bookmark_pages, vec![0, 3, 8]);

    let doc = Document::load(&output).unwrap();
    let entries: Vec<(String, u32)> = outline(&doc)
        .into_iter()
        .map(|(title, page, _)| (title, page))
        .collect();
    assert_eq!(
        entries,
        vec![("a".to_string(), 1), ("b".to_string(), 4), ("c".to_string(), 9)]
    );
}

#[test]
fn test_source_outline_nests_under_file_entry() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "cover.pdf", "Cover", 1),
        write_pdf_with_outline(dir.path(), "book.pdf", "Book", 2),
    ];
    let output = dir.path().join("merged.pdf");
    let request = MergeRequest::new(inputs, &output).with_options(with_bookmarks());

    assert!(quiet_merger().merge(request, &mut |_| {}).success);

    let doc = Document::load(&output).unwrap();
    let entries = outline(&doc);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], ("cover".to_string(), 1, vec![]));
    assert_eq!(
        entries[1],
        (
            "book".to_string(),
            2,
            vec!["Chapter 1".to_string(), "Chapter 2".to_string()]
        )
    );
}

#[test]
fn test_source_outline_kept_without_bookmarks() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "cover.pdf", "Cover", 1),
        write_pdf_with_outline(dir.path(), "book.pdf", "Book", 2),
    ];
    let output = dir.path().join("merged.pdf");

    assert!(quiet_merger().merge(MergeRequest::new(inputs, &output), &mut |_| {}).success);

    let doc = Document::load(&output).unwrap();
    let entries: Vec<(String, u32)> = outline(&doc)
        .into_iter()
        .map(|(title, page, _)| (title, page))
        .collect();
    assert_eq!(
        entries,
        vec![("Chapter 1".to_string(), 2), ("Chapter 2".to_string(), 3)]
    );
}

#[test]
fn test_corrupted_input_aborts_whole_merge() {
    let dir = TempDir::new().unwrap();
    let bad = write_corrupted_pdf(dir.path(), "bad.pdf");
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 1),
        write_pdf(dir.path(), "b.pdf", "B", 1),
        bad.clone(),
        write_pdf(dir.path(), "d.pdf", "D", 1),
    ];
    let output = dir.path().join("merged.pdf");

    let result = quiet_merger().merge(MergeRequest::new(inputs, &output), &mut |_| {});

    assert!(!result.success);
    assert_eq!(result.state, MergeState::Failed);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::Corrupted);
    assert!(failure.message.contains("bad.pdf"));
    assert!(result.per_file_errors.contains_key(&bad));
    assert_eq!(result.exit_code(), 3);
    assert!(!output.exists());
    assert!(!partial_path(&output).exists());
}

#[test]
fn test_skip_invalid_drops_bad_input() {
    let dir = TempDir::new().unwrap();
    let bad = write_corrupted_pdf(dir.path(), "bad.pdf");
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 2),
        bad.clone(),
        write_pdf(dir.path(), "c.pdf", "C", 1),
    ];
    let output = dir.path().join("merged.pdf");
    let request = MergeRequest::new(inputs, &output).with_options(MergeOptions {
        skip_invalid: true,
        add_bookmarks: true,
        ..MergeOptions::default()
    });

    let result = quiet_merger().merge(request, &mut |_| {});

    assert!(result.success, "{}", result.message());
    assert_eq!(result.units_written, 3);
    assert_eq!(result.bookmark_pages, vec![0, 2]);
    assert_eq!(result.per_file_errors.len(), 1);
    assert!(result.per_file_errors.contains_key(&bad));
    assert_eq!(
        result.partial.as_ref().map(|p| p.kind),
        Some(ErrorKind::PartialInputFailure)
    );
    assert_eq!(result.exit_code(), 0);
}

#[test]
fn test_same_inputs_give_identical_output() {
    let dir = TempDir::new().unwrap();
    let inputs = three_inputs(&dir);
    let first = dir.path().join("first.pdf");
    let second = dir.path().join("second.pdf");

    let mut merger = quiet_merger();
    let options = with_bookmarks();
    assert!(merger
        .merge(MergeRequest::new(inputs.clone(), &first).with_options(options.clone()), &mut |_| {})
        .success);
    assert!(merger
        .merge(MergeRequest::new(inputs, &second).with_options(options), &mut |_| {})
        .success);

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn test_output_carries_producer() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("merged.pdf");
    assert!(quiet_merger()
        .merge(MergeRequest::new(three_inputs(&dir), &output), &mut |_| {})
        .success);

    let info = PdfMerger::new().get_info(&output).unwrap();
    assert_eq!(info.page_count, 10);
    assert!(info.producer.unwrap().starts_with("filemerge"));
}

#[rstest]
#[case(CompressionLevel::None)]
#[case(CompressionLevel::Standard)]
#[case(CompressionLevel::Maximum)]
fn test_compression_levels_keep_pages(#[case] compression: CompressionLevel) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("merged.pdf");
    let mut merger = FileMerger::with_settings(Settings {
        compression,
        ..Settings::default()
    })
    .unwrap();

    let result = merger.merge(MergeRequest::new(three_inputs(&dir), &output), &mut |_| {});
    assert!(result.success, "{}", result.message());
    assert_eq!(PdfMerger::new().validate(&output).unwrap(), 10);
    assert!(page_contents(&output)[9].contains(&page_text("C", 2)));
}

#[test]
fn test_merger_reports_progress_per_input() {
    let dir = TempDir::new().unwrap();
    let inputs = three_inputs(&dir);
    let output = dir.path().join("merged.pdf");
    let mut events = Vec::new();

    let report = PdfMerger::new()
        .merge(&inputs, &output, &mut |p| events.push(p))
        .unwrap();

    assert_eq!(report.page_count, 10);
    assert_eq!(report.bookmark_pages, vec![0, 3, 8]);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.ok && e.total == 3));
    assert_eq!(events[2].completed, 3);
    assert_eq!(events[1].path, inputs[1]);
}
