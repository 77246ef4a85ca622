//! End-to-end runs over temporary source trees.

use arrow::array::{Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use ohlcvault_archive::{
    ArchiveAppender, ArchiveConfig, LockPolicy, PartitionLock, PipelineDriver, RestoreTool,
};
use ohlcvault_format::parquet::read_rows;
use ohlcvault_types::{ArchiveLayout, YearMonth};
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str = "time,open,high,low,close,vwap,volume,count,pair\n";

struct Fixture {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data");
        let output = dir.path().join("parquet-data");
        Self {
            _dir: dir,
            input,
            output,
        }
    }

    fn config(&self) -> ArchiveConfig {
        ArchiveConfig::new(&self.input, &self.output).with_layout(ArchiveLayout::Flat)
    }

    fn write_source(&self, name: &str, body: &str) -> PathBuf {
        let path = self.input.join("2024/01").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("{HEADER}{body}")).unwrap();
        path
    }

    fn partition(&self) -> PathBuf {
        self.output.join("2024/01.parquet")
    }

    fn row_count(&self) -> usize {
        read_rows(&self.partition()).unwrap().len()
    }
}

fn marked(path: &Path, marker: &str) -> PathBuf {
    PathBuf::from(format!("{}.{marker}", path.display()))
}

fn january() -> YearMonth {
    YearMonth::new(2024, 1).unwrap()
}

#[test]
fn test_two_files_in_two_runs() {
    let fx = Fixture::new();
    let driver = PipelineDriver::new(fx.config());

    let first = fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,2100.5,2101,2099.9,2100.1,2100.3,3.25,12,XETHZEUR\n",
    );
    let report = driver.run().unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(fx.row_count(), 1);

    let second = fx.write_source(
        "2024-01-05-22-00-XETHZEUR.csv",
        "2024-01-05 22:00,2110.5,2111,2109.9,2110.1,2110.3,1.5,7,XETHZEUR\n",
    );
    let report = driver.run().unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(report.settled, 1);
    assert_eq!(report.exit_code(), 0);

    assert_eq!(fx.row_count(), 2);
    assert!(marked(&first, "copied").exists());
    assert!(marked(&second, "copied").exists());
    assert!(!first.exists());
    assert!(!second.exists());
}

#[test]
fn test_rerun_is_idempotent() {
    let fx = Fixture::new();
    fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n2024-01-05 10:01,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    let driver = PipelineDriver::new(fx.config());
    driver.run().unwrap();
    let before = fs::read(fx.partition()).unwrap();

    let report = driver.run().unwrap();

    assert_eq!(report.merged, 0);
    assert_eq!(report.stats.rows_appended, 0);
    assert_eq!(fs::read(fx.partition()).unwrap(), before);
}

#[test]
fn test_restore_then_rerun_changes_nothing() {
    let fx = Fixture::new();
    let source = fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n2024-01-05 10:01,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    let driver = PipelineDriver::new(fx.config());
    driver.run().unwrap();
    assert_eq!(fx.row_count(), 2);

    let restored = RestoreTool::new().restore_all(&fx.input).unwrap();
    assert_eq!(restored.restored, vec![source.clone()]);
    assert!(source.exists());

    let report = driver.run().unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(report.stats.duplicates, 2);
    assert_eq!(report.stats.rows_appended, 0);
    assert_eq!(fx.row_count(), 2);
    assert!(marked(&source, "copied").exists());
}

#[test]
fn test_truncated_last_line_is_marked_error() {
    let fx = Fixture::new();
    fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    PipelineDriver::new(fx.config()).run().unwrap();
    let before = fs::read(fx.partition()).unwrap();

    let broken = fx.write_source(
        "2024-01-05-22-00-XETHZEUR.csv",
        "2024-01-05 22:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n2024-01-05 22:01,1,2,0.5",
    );
    let report = PipelineDriver::new(fx.config().with_mark_errors(true))
        .run()
        .unwrap();

    assert_eq!(report.marked_errors, 1);
    assert_eq!(report.exit_code(), 0);
    assert!(marked(&broken, "error").exists());
    assert_eq!(fs::read(fx.partition()).unwrap(), before);

    let report = PipelineDriver::new(fx.config()).run().unwrap();
    assert_eq!(report.merged, 0);
    assert_eq!(report.settled, 2);
}

#[test]
fn test_dropped_stage_leaves_partition_byte_identical() {
    let fx = Fixture::new();
    fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    PipelineDriver::new(fx.config()).run().unwrap();
    let before = fs::read(fx.partition()).unwrap();

    let appender = ArchiveAppender::from_config(&fx.config());
    let rows = ohlcvault_format::SourceReader::new()
        .read_from(
            "time,open,high,low,close,volume\n2024-01-06 00:00,1,2,0.5,1.5,10\n".as_bytes(),
            Path::new("inline.csv"),
            "XETHZEUR",
        )
        .unwrap();
    let staged = appender.stage(january(), rows).unwrap();
    let temp = staged.temp_path().unwrap().to_path_buf();
    assert!(fs::metadata(&temp).unwrap().len() > 0);

    // interrupted before the rename
    drop(staged);

    assert_eq!(fs::read(fx.partition()).unwrap(), before);
    assert!(!temp.exists());
}

#[test]
fn test_stale_partial_is_replaced() {
    let fx = Fixture::new();
    let stale = PathBuf::from(format!("{}.partial", fx.partition().display()));
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"half a file").unwrap();

    fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    let report = PipelineDriver::new(fx.config()).run().unwrap();

    assert_eq!(report.merged, 1);
    assert_eq!(fx.row_count(), 1);
    assert!(!stale.exists());
}

#[cfg(unix)]
#[test]
fn test_locked_partition_is_skipped() {
    let fx = Fixture::new();
    let source = fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    fs::create_dir_all(fx.partition().parent().unwrap()).unwrap();
    let held = PartitionLock::try_acquire(&fx.partition()).unwrap().unwrap();

    let config = fx.config().with_lock_policy(LockPolicy::no_retry());
    let report = PipelineDriver::new(config.clone()).run().unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.exit_code(), 0);
    assert!(source.exists());
    assert!(!fx.partition().exists());

    drop(held);
    let report = PipelineDriver::new(config).run().unwrap();
    assert_eq!(report.merged, 1);
}

#[test]
fn test_foreign_partition_schema_is_rejected() {
    let fx = Fixture::new();
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
    let batch =
        RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
    fs::create_dir_all(fx.partition().parent().unwrap()).unwrap();
    let mut writer = ArrowWriter::try_new(File::create(fx.partition()).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    let before = fs::read(fx.partition()).unwrap();

    let source = fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );
    let report = PipelineDriver::new(fx.config().with_mark_errors(true))
        .run()
        .unwrap();

    assert_eq!(report.exit_code(), 2);
    assert!(report.failures[0].message.contains("unexpected schema"));
    assert!(source.exists());
    assert_eq!(fs::read(fx.partition()).unwrap(), before);
}

#[test]
fn test_nested_layout_by_default() {
    let fx = Fixture::new();
    fx.write_source(
        "2024-01-05-10-00-XETHZEUR.csv",
        "2024-01-05 10:00,1,2,0.5,1.5,1.2,10,3,XETHZEUR\n",
    );

    PipelineDriver::new(ArchiveConfig::new(&fx.input, &fx.output))
        .run()
        .unwrap();

    assert!(fx.output.join("2024/01/2024-01.parquet").exists());
    assert!(!fx.partition().exists());
}
