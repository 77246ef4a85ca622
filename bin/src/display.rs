//! Progress bars and run summaries for the ohlcvault CLI.

use indicatif::{ProgressBar, ProgressStyle};
use ohlcvault_lib::prelude::*;
use ohlcvault_lib::RestoreReport;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} ({percent}%) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {pos} {prefix} {msg}";

/// Creates a bar over a known number of items, hidden in quiet mode.
pub(crate) fn progress_bar(len: u64, unit: &'static str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(bar_style());
    pb.set_prefix(unit);
    pb
}

/// Creates a spinner for an open-ended number of items, hidden in quiet mode.
pub(crate) fn progress_spinner(unit: &'static str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(unit);
    pb
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"))
}

/// Drives a progress bar from pipeline events.
#[derive(Debug)]
pub(crate) struct FileProgress {
    bar: ProgressBar,
}

impl FileProgress {
    pub(crate) fn new(quiet: bool) -> Self {
        Self {
            bar: progress_spinner("files", quiet),
        }
    }
}

impl ProgressObserver for FileProgress {
    fn on_start(&self, total: Option<u64>) {
        if let Some(total) = total {
            self.bar.set_length(total);
            self.bar.set_style(bar_style());
        }
    }

    fn on_file(&self, file: &SourceFile, outcome: &ProcessingOutcome) {
        self.bar.set_message(format!("{} {}", file.pair(), outcome.label()));
        self.bar.inc(1);
    }

    fn on_finish(&self, report: &RunReport) {
        self.bar.finish_with_message(format!(
            "{} merged, {} rows appended",
            report.merged, report.stats.rows_appended
        ));
    }
}

/// Prints the outcome of an archiving run.
pub(crate) fn print_run_summary(report: &RunReport) {
    println!(
        "Discovered {} files: {} merged, {} skipped, {} already settled",
        report.discovered, report.merged, report.skipped, report.settled
    );
    println!(
        "Rows: {} read, {} appended, {} duplicates across {} partition merges",
        report.stats.rows_read,
        report.stats.rows_appended,
        report.stats.duplicates,
        report.stats.partitions
    );
    if report.deleted > 0 || report.marked_errors > 0 {
        println!(
            "Source files: {} deleted, {} marked as errors",
            report.deleted, report.marked_errors
        );
    }
    print_failures(report);
}

/// Prints per-file failures to stderr.
pub(crate) fn print_failures(report: &RunReport) {
    if report.failures.is_empty() {
        return;
    }
    eprintln!("{} files failed:", report.failures.len());
    for failure in &report.failures {
        let marker = if failure.tolerated { " (set aside)" } else { "" };
        eprintln!("  {}{marker}: {}", failure.path.display(), failure.message);
    }
}

/// Prints the outcome of a restore.
pub(crate) fn print_restore_summary(report: &RestoreReport) {
    println!("Restored {} files", report.restored.len());
    for (path, error) in &report.failed {
        eprintln!("  {}: {error}", path.display());
    }
}
