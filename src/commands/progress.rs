// src/commands/progress.rs
//! Terminal feedback for import runs
//!
//! [`ImportProgress`] is a [`ReportSink`] that drives an indicatif bar from
//! the importer's progress calls and prints warnings and errors above it.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use vfsimport::report::{ReportFormat, ReportSink};

pub struct ImportProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl ImportProgress {
    /// Create a progress display; `verbose` prints every report line
    pub fn new(archive: &str, verbose: bool) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(format!("Importing {archive}"));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, verbose }
    }

    /// Finish the bar with a closing message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl ReportSink for ImportProgress {
    fn print(&self, format: ReportFormat, message: &str) {
        match format {
            ReportFormat::Warning => self.bar.println(format!("warning: {message}")),
            ReportFormat::Error => self.bar.println(format!("error: {message}")),
            ReportFormat::Headline => {
                self.bar.set_message(message.to_string());
                if self.verbose {
                    self.bar.println(message);
                }
            }
            _ if self.verbose => self.bar.println(format!("  {message}")),
            _ => {}
        }
    }

    fn progress(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }
}
