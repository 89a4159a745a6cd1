//! Background merges.

use tempfile::TempDir;

use filemerge::MergeRequest;
use filemerge::worker::spawn_merge;

use crate::common::{quiet_merger, sheet_names, write_pdf, write_workbook};

#[tokio::test]
async fn test_progress_streams_one_event_per_input() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", "A", 2),
        write_pdf(dir.path(), "b.pdf", "B", 1),
        write_pdf(dir.path(), "c.pdf", "C", 4),
    ];
    let output = dir.path().join("out.pdf");

    let mut handle = spawn_merge(quiet_merger(), MergeRequest::new(inputs.clone(), &output));
    let mut events = Vec::new();
    while let Some(event) = handle.next_progress().await {
        events.push(event);
    }
    let (_, result) = handle.wait().await.unwrap();

    assert!(result.success, "{}", result.message());
    assert_eq!(result.units_written, 7);
    assert_eq!(events.len(), 3);
    let completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
    assert_eq!(completed, vec![1, 2, 3]);
    let paths: Vec<_> = events.iter().map(|e| e.path.clone()).collect();
    assert_eq!(paths, inputs);
}

#[tokio::test]
async fn test_merger_is_returned_for_reuse() {
    let dir = TempDir::new().unwrap();
    let books = vec![
        write_workbook(dir.path(), "a.xlsx", &[("S", &[("A1", "a")])]),
        write_workbook(dir.path(), "b.xlsx", &[("S", &[("A1", "b")])]),
    ];
    let first = dir.path().join("first.xlsx");
    let second = dir.path().join("second.xlsx");

    let handle = spawn_merge(quiet_merger(), MergeRequest::new(books.clone(), &first));
    let (merger, result) = handle.wait().await.unwrap();
    assert!(result.success, "{}", result.message());

    let handle = spawn_merge(merger, MergeRequest::new(books, &second));
    let (_, result) = handle.wait().await.unwrap();
    assert!(result.success, "{}", result.message());
    assert_eq!(sheet_names(&first), sheet_names(&second));
}
