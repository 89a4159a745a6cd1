//! Background merges for interactive front ends.
//!
//! A request runs on tokio's blocking pool while progress events stream
//! back over a channel. The channel closes when the merge returns.
//!
//! ```no_run
//! use filemerge::worker::spawn_merge;
//! use filemerge::{FileMerger, MergeRequest};
//!
//! # async fn example() -> Result<(), tokio::task::JoinError> {
//! let request = MergeRequest::new(["a.pdf", "b.pdf"], "out.pdf");
//! let mut handle = spawn_merge(FileMerger::new(), request);
//! while let Some(event) = handle.next_progress().await {
//!     println!("{}/{}", event.completed, event.total);
//! }
//! let (_merger, result) = handle.wait().await?;
//! println!("{}", result.message());
//! # Ok(())
//! # }
//! ```

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::file_merger::FileMerger;
use crate::types::{MergeProgress, MergeRequest, MergeResult};

/// A merge running in the background.
pub struct MergeHandle {
    progress: mpsc::UnboundedReceiver<MergeProgress>,
    task: JoinHandle<(FileMerger, MergeResult)>,
}

impl MergeHandle {
    /// Next progress event, or `None` once the merge has finished.
    pub async fn next_progress(&mut self) -> Option<MergeProgress> {
        self.progress.recv().await
    }

    /// Whether the merge has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the merge and get the merger back for the next request.
    ///
    /// Progress events not yet received are dropped.
    ///
    /// # Errors
    ///
    /// Returns the join error if the worker panicked.
    pub async fn wait(self) -> Result<(FileMerger, MergeResult), JoinError> {
        self.task.await
    }
}

/// Run `request` on a blocking worker thread.
///
/// The merger moves into the worker, so a merger can only run one request
/// at a time. Must be called from within a tokio runtime.
pub fn spawn_merge(mut merger: FileMerger, request: MergeRequest) -> MergeHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::task::spawn_blocking(move || {
        let result = merger.merge(request, &mut |event| {
            // The receiver may have been dropped; the merge still completes.
            let _ = tx.send(event);
        });
        (merger, result)
    });

    MergeHandle { progress: rx, task }
}
