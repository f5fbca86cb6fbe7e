// src/report.rs

//! Caller-supplied report sinks
//!
//! An import emits an ordered stream of human-readable report lines: run
//! headers, one line per imported or skipped entry, warnings for
//! sub-item failures, and a final error line for fatal conditions. The
//! caller decides where they go:
//!
//! - `LogReport`: forwards lines to tracing
//! - `MemoryReport`: keeps lines for later inspection (tests, UIs)
//! - `CallbackReport`: hands each line to a closure
//! - `SilentReport`: discards everything
//!
//! [`Reporter`] wraps a sink for the duration of one run and keeps the
//! ok/skipped/warning/error counters that end up in [`ReportSummary`].

use std::sync::Mutex;
use tracing::{error, info, warn};

/// Kind of a report line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Default,
    /// Section heading ("Importing groups")
    Headline,
    /// Secondary detail
    Note,
    /// Entry finished successfully
    Ok,
    Warning,
    Error,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Default => "default",
            ReportFormat::Headline => "headline",
            ReportFormat::Note => "note",
            ReportFormat::Ok => "ok",
            ReportFormat::Warning => "warning",
            ReportFormat::Error => "error",
        }
    }
}

/// One emitted report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub format: ReportFormat,
    pub message: String,
}

/// Destination for report lines
pub trait ReportSink: Send + Sync {
    /// Emit one line
    fn print(&self, format: ReportFormat, message: &str);

    /// Position within the resource list, 1-based
    fn progress(&self, _current: usize, _total: usize) {}
}

/// Discards all report output
#[derive(Debug, Default)]
pub struct SilentReport;

impl ReportSink for SilentReport {
    fn print(&self, _format: ReportFormat, _message: &str) {}
}

/// Forwards report lines to tracing
#[derive(Debug, Default)]
pub struct LogReport;

impl ReportSink for LogReport {
    fn print(&self, format: ReportFormat, message: &str) {
        match format {
            ReportFormat::Warning => warn!("{}", message),
            ReportFormat::Error => error!("{}", message),
            _ => info!("{}", message),
        }
    }
}

/// Collects report lines in memory
#[derive(Debug, Default)]
pub struct MemoryReport {
    lines: Mutex<Vec<ReportLine>>,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything printed so far
    pub fn lines(&self) -> Vec<ReportLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages of the given kind, in emission order
    pub fn messages(&self, format: ReportFormat) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.format == format)
            .map(|l| l.message)
            .collect()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.message.contains(needle))
    }
}

impl ReportSink for MemoryReport {
    fn print(&self, format: ReportFormat, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(ReportLine {
                format,
                message: message.to_string(),
            });
        }
    }
}

/// Hands each report line to a closure
pub struct CallbackReport<F>
where
    F: Fn(ReportFormat, &str) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackReport<F>
where
    F: Fn(ReportFormat, &str) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ReportSink for CallbackReport<F>
where
    F: Fn(ReportFormat, &str) + Send + Sync,
{
    fn print(&self, format: ReportFormat, message: &str) {
        (self.callback)(format, message);
    }
}

/// Counters accumulated over one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub ok: usize,
    pub skipped: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl ReportSummary {
    /// Completed, but something was skipped or warned about
    pub fn has_problems(&self) -> bool {
        self.skipped > 0 || self.warnings > 0 || self.errors > 0
    }
}

/// Per-run wrapper around a sink that keeps the summary counters
pub struct Reporter<'a> {
    sink: &'a dyn ReportSink,
    summary: ReportSummary,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn ReportSink) -> Self {
        Self {
            sink,
            summary: ReportSummary::default(),
        }
    }

    pub fn headline(&mut self, message: &str) {
        self.sink.print(ReportFormat::Headline, message);
    }

    pub fn note(&mut self, message: &str) {
        self.sink.print(ReportFormat::Note, message);
    }

    pub fn ok(&mut self, message: &str) {
        self.summary.ok += 1;
        self.sink.print(ReportFormat::Ok, message);
    }

    /// Entry intentionally not imported (immutable, excluded, unreadable)
    pub fn skipped(&mut self, message: &str) {
        self.summary.skipped += 1;
        self.sink.print(ReportFormat::Note, message);
    }

    pub fn warning(&mut self, message: &str) {
        self.summary.warnings += 1;
        self.sink.print(ReportFormat::Warning, message);
    }

    pub fn error(&mut self, message: &str) {
        self.summary.errors += 1;
        self.sink.print(ReportFormat::Error, message);
    }

    pub fn progress(&self, current: usize, total: usize) {
        self.sink.progress(current, total);
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }
}
