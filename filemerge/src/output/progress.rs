//! Count-based progress display.
//!
//! A merge reports one [`MergeProgress`] per input; [`ProgressBar::observe`]
//! turns those into a redrawn terminal line.
//!
//! ```
//! use filemerge::output::progress::{ProgressBar, ProgressStyle};
//!
//! let mut progress = ProgressBar::new(3, ProgressStyle::Bar);
//! for i in 1..=3 {
//!     progress.update(i);
//! }
//! progress.finish();
//! ```

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use crate::types::{MergeProgress, display_name};

/// How progress is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStyle {
    /// `[=====>    ] 50% 2/4`
    Bar,
    /// `2/4`
    Counter,
}

/// Terminal progress line.
pub struct ProgressBar {
    total: usize,
    current: usize,
    failed: usize,
    style: ProgressStyle,
    message: Option<String>,
    start_time: Instant,
    enabled: bool,
}

impl ProgressBar {
    /// Create a progress bar for `total` inputs. Drawing is enabled only
    /// when stdout is a terminal.
    pub fn new(total: usize, style: ProgressStyle) -> Self {
        Self {
            total,
            current: 0,
            failed: 0,
            style,
            message: None,
            start_time: Instant::now(),
            enabled: io::stdout().is_terminal(),
        }
    }

    /// A progress bar that tracks counts but never draws.
    pub fn disabled() -> Self {
        let mut pb = Self::new(0, ProgressStyle::Counter);
        pb.enabled = false;
        pb
    }

    /// Set the text shown next to the bar.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Move to `current` and redraw.
    pub fn update(&mut self, current: usize) {
        self.current = current;
        self.render();
    }

    /// Apply one merge progress event.
    pub fn observe(&mut self, event: &MergeProgress) {
        self.total = event.total;
        if !event.ok {
            self.failed += 1;
        }
        let status = if event.ok { "" } else { " (failed)" };
        self.set_message(format!("{}{status}", display_name(&event.path)));
        self.update(event.completed);
    }

    /// Inputs reported as failed so far.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Draw the final state and end the line.
    pub fn finish(&mut self) {
        self.current = self.total;
        if self.enabled {
            self.render();
            println!();
        }
    }

    /// Erase the line.
    pub fn clear(&self) {
        if self.enabled {
            print!("\r\x1b[K");
            io::stdout().flush().ok();
        }
    }

    fn render(&self) {
        if !self.enabled {
            return;
        }
        print!("\r\x1b[K{}", self.line());
        io::stdout().flush().ok();
    }

    /// The line as it would be drawn.
    pub fn line(&self) -> String {
        let counter = format!("{}/{}", self.current, self.total);
        let elapsed = format_duration(self.start_time.elapsed());

        let mut parts = match self.style {
            ProgressStyle::Bar => {
                let width = 30;
                let filled = (width * self.current) / self.total.max(1);
                let head = if filled > 0 && filled < width { ">" } else { "" };
                let body = "=".repeat(filled.saturating_sub(head.len()));
                let bar = format!("[{body}{head}{}]", " ".repeat(width - filled.min(width)));
                vec![bar, format!("{:.0}%", self.percent()), counter, elapsed]
            }
            ProgressStyle::Counter => vec![counter, elapsed],
        };

        if let Some(msg) = &self.message {
            parts.push(msg.clone());
        }
        parts.join(" ")
    }

    /// Completed share in percent.
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            (self.current as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
