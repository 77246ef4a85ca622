//! Incremental archiving run over a source tree.

use ohlcvault_format::SourceReader;
use ohlcvault_types::{
    ArchiveError, MergeError, MergeStats, ProcessingOutcome, SourceFile, SourceState,
};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::{ArchiveAppender, ArchiveConfig, SourceLocator, StateTransitioner, Transition};

/// Receives progress events during a run.
///
/// All methods default to doing nothing.
pub trait ProgressObserver {
    /// Called once before the first file. `total` is known for migrations.
    fn on_start(&self, _total: Option<u64>) {}

    /// Called after each file has been processed and settled.
    fn on_file(&self, _file: &SourceFile, _outcome: &ProcessingOutcome) {}

    /// Called once after the last file.
    fn on_finish(&self, _report: &RunReport) {}
}

impl ProgressObserver for () {}

/// A source file that did not make it into the archive.
#[derive(Debug, Clone)]
pub struct FileFailure {
    /// Path of the file when it was processed.
    pub path: PathBuf,
    /// Rendered error.
    pub message: String,
    /// True if the run was configured to set this failure aside.
    pub tolerated: bool,
}

/// Outcome of one pipeline or migration run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Source files discovered, in any state.
    pub discovered: usize,
    /// Files merged and moved to the processed state.
    pub merged: usize,
    /// Files skipped this run (e.g. partition lock contention).
    pub skipped: usize,
    /// Files already processed or in error when discovered.
    pub settled: usize,
    /// Files deleted after processing.
    pub deleted: usize,
    /// Files moved to the error state.
    pub marked_errors: usize,
    /// Row counters summed over every merged file.
    pub stats: MergeStats,
    /// Per-file failures, including failed state transitions.
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    /// Returns true if any failure was not set aside by configuration.
    #[must_use]
    pub fn has_untolerated_failures(&self) -> bool {
        self.failures.iter().any(|f| !f.tolerated)
    }

    /// Returns the process exit code for this report: 0 or 2.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.has_untolerated_failures() { 2 } else { 0 }
    }

    fn record_failure(&mut self, path: PathBuf, message: String, tolerated: bool) {
        self.failures.push(FileFailure {
            path,
            message,
            tolerated,
        });
    }
}

/// Drives discovery, parsing, merging and state transitions for one run.
#[derive(Debug, Clone)]
pub struct PipelineDriver {
    config: ArchiveConfig,
    reader: SourceReader,
    appender: ArchiveAppender,
    transitioner: StateTransitioner,
}

impl PipelineDriver {
    /// Creates a driver from run configuration.
    #[must_use]
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            reader: SourceReader::new(),
            appender: ArchiveAppender::from_config(&config),
            transitioner: StateTransitioner::from_config(&config),
            config,
        }
    }

    /// Returns the run configuration.
    #[must_use]
    pub const fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Returns the appender used for merges.
    #[must_use]
    pub const fn appender(&self) -> &ArchiveAppender {
        &self.appender
    }

    /// Runs without progress reporting.
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub fn run(&self) -> Result<RunReport, ArchiveError> {
        self.run_with(&())
    }

    /// Processes every source file under the input root, in order.
    ///
    /// # Errors
    ///
    /// Returns an error only for discovery failures. Per-file problems are
    /// collected in the report.
    pub fn run_with<O: ProgressObserver>(&self, observer: &O) -> Result<RunReport, ArchiveError> {
        let locator = SourceLocator::new(&self.config.input)?.with_pairs(self.config.pairs.clone());
        info!(
            input = %self.config.input.display(),
            output = %self.config.output.display(),
            "starting archive run"
        );

        let mut report = RunReport::default();
        observer.on_start(None);
        for file in locator.iter()? {
            self.handle(&file?, &mut report, observer);
        }

        self.finish(&report, observer);
        Ok(report)
    }

    /// Reads and merges one unprocessed file, without touching its name.
    #[must_use]
    pub fn process_file(&self, file: &SourceFile) -> ProcessingOutcome {
        let rows = match self.reader.read_path(file.path(), file.pair()) {
            Ok(rows) => rows,
            Err(e) => return ProcessingOutcome::Failed(e.into()),
        };

        match self.appender.append_rows(rows) {
            Ok(stats) => ProcessingOutcome::Merged(stats),
            Err(e @ MergeError::LockContention { .. }) => ProcessingOutcome::Skipped(e.to_string()),
            Err(e) => ProcessingOutcome::Failed(e.into()),
        }
    }

    /// Processes and settles one discovered file, updating the report.
    pub(crate) fn handle<O: ProgressObserver>(
        &self,
        file: &SourceFile,
        report: &mut RunReport,
        observer: &O,
    ) {
        report.discovered += 1;

        match file.state() {
            SourceState::Unprocessed => {}
            SourceState::Processed if self.config.delete_processed => {
                report.settled += 1;
                match self.transitioner.delete_processed(file) {
                    Ok(_) => report.deleted += 1,
                    Err(e) => report.record_failure(file.path().to_path_buf(), e.to_string(), false),
                }
                return;
            }
            SourceState::Processed | SourceState::Error => {
                debug!(file = %file, "already settled");
                report.settled += 1;
                return;
            }
        }

        let outcome = self.process_file(file);
        match &outcome {
            ProcessingOutcome::Merged(stats) => {
                report.merged += 1;
                report.stats += *stats;
                debug!(file = %file, appended = stats.rows_appended, duplicates = stats.duplicates, "merged");
            }
            ProcessingOutcome::Skipped(reason) => {
                report.skipped += 1;
                warn!(file = %file, reason = %reason, "skipped");
            }
            ProcessingOutcome::Failed(e) => {
                let tolerated = outcome.is_source_failure() && self.config.mark_errors;
                error!(file = %file, error = %e, "processing failed");
                report.record_failure(file.path().to_path_buf(), e.to_string(), tolerated);
            }
        }

        match self.transitioner.apply(file, &outcome) {
            Ok(Transition::Deleted(_)) => report.deleted += 1,
            Ok(Transition::Renamed { .. }) if outcome.is_source_failure() => {
                report.marked_errors += 1;
            }
            Ok(_) => {}
            Err(e) => report.record_failure(file.path().to_path_buf(), e.to_string(), false),
        }

        observer.on_file(file, &outcome);
    }

    pub(crate) fn finish<O: ProgressObserver>(&self, report: &RunReport, observer: &O) {
        info!(
            discovered = report.discovered,
            merged = report.merged,
            skipped = report.skipped,
            failed = report.failures.len(),
            rows_appended = report.stats.rows_appended,
            duplicates = report.stats.duplicates,
            "archive run finished"
        );
        observer.on_finish(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const HEADER: &str = "time,open,high,low,close,vwap,volume,count,pair\n";

    fn write_source(root: &Path, rel: &str, body: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("{HEADER}{body}")).unwrap();
        path
    }

    #[derive(Default)]
    struct Counter {
        files: Cell<usize>,
        finished: Cell<bool>,
    }

    impl ProgressObserver for Counter {
        fn on_file(&self, _file: &SourceFile, _outcome: &ProcessingOutcome) {
            self.files.set(self.files.get() + 1);
        }

        fn on_finish(&self, _report: &RunReport) {
            self.finished.set(true);
        }
    }

    #[test]
    fn test_run_merges_and_settles() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        let source = write_source(
            &input,
            "2024/01/2024-01-05-10-00-XETHZEUR.csv",
            "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
        );

        let driver = PipelineDriver::new(ArchiveConfig::new(&input, &output));
        let counter = Counter::default();
        let report = driver.run_with(&counter).unwrap();

        assert_eq!(report.merged, 1);
        assert_eq!(report.stats.rows_appended, 1);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(counter.files.get(), 1);
        assert!(counter.finished.get());
        assert!(!source.exists());
        assert!(PathBuf::from(format!("{}.copied", source.display())).exists());

        let again = driver.run().unwrap();
        assert_eq!(again.merged, 0);
        assert_eq!(again.settled, 1);
    }

    #[test]
    fn test_parse_failure_exit_code() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        write_source(&input, "2024/01/2024-01-05-10-00-XETHZEUR.csv", "garbage\n");

        let report = PipelineDriver::new(ArchiveConfig::new(&input, temp_dir.path().join("out")))
            .run()
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.marked_errors, 0);
    }

    #[test]
    fn test_marked_parse_failure_is_tolerated() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let source = write_source(&input, "2024/01/2024-01-05-10-00-XETHZEUR.csv", "garbage\n");

        let config =
            ArchiveConfig::new(&input, temp_dir.path().join("out")).with_mark_errors(true);
        let report = PipelineDriver::new(config).run().unwrap();

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.marked_errors, 1);
        assert!(PathBuf::from(format!("{}.error", source.display())).exists());
    }

    #[test]
    fn test_delete_processed_cleans_settled_files() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let old = input.join("2024/01/2024-01-04-10-00-XETHZEUR.csv.copied");
        fs::create_dir_all(old.parent().unwrap()).unwrap();
        fs::write(&old, HEADER).unwrap();
        write_source(
            &input,
            "2024/01/2024-01-05-10-00-XETHZEUR.csv",
            "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
        );

        let config =
            ArchiveConfig::new(&input, temp_dir.path().join("out")).with_delete_processed(true);
        let report = PipelineDriver::new(config).run().unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(fs::read_dir(input.join("2024/01")).unwrap().count(), 0);
    }

    #[test]
    fn test_report_exit_codes() {
        let mut report = RunReport::default();
        assert_eq!(report.exit_code(), 0);

        report.record_failure(PathBuf::from("a.csv"), "bad".into(), true);
        assert_eq!(report.exit_code(), 0);

        report.record_failure(PathBuf::from("b.csv"), "bad".into(), false);
        assert_eq!(report.exit_code(), 2);
    }
}
