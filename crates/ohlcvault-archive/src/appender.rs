//! Streaming merge of new rows into monthly Parquet partitions.
//!
//! A merge never decodes a whole partition. Existing keys are read through a
//! two-column projection into a [`KeyIndex`], then the partition is copied
//! into `<partition>.partial` one row group at a time, followed by the new
//! rows, and the temp file is renamed over the original. Readers therefore
//! see either the old or the new partition, never a mix.

use arrow::array::RecordBatch;
use ohlcvault_format::parquet::{archive_schema, check_schema, rows_to_batch, writer_properties};
use ohlcvault_format::{Codec, FormatError};
use ohlcvault_types::{ArchiveLayout, MergeError, MergeStats, OhlcRow, YearMonth};
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder,
};
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::lock::with_suffix;
use crate::{ArchiveConfig, KeyIndex, LockPolicy, PartitionLock};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
    move |source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn parquet_error<E: std::fmt::Display>(path: &Path) -> impl FnOnce(E) -> MergeError + '_ {
    move |e| MergeError::Parquet {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn format_error(path: &Path) -> impl FnOnce(FormatError) -> MergeError + '_ {
    move |e| match e {
        FormatError::Schema(found) => MergeError::SchemaMismatch {
            path: path.to_path_buf(),
            found,
        },
        FormatError::Io(source) => MergeError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => MergeError::Parquet {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

/// An existing partition opened for streaming.
struct ExistingPartition {
    path: PathBuf,
    file: File,
    metadata: ArrowReaderMetadata,
}

impl ExistingPartition {
    /// Opens a partition and reads its footer only.
    fn open(path: &Path) -> Result<Self, MergeError> {
        let file = File::open(path).map_err(io_error(path))?;
        let metadata = ArrowReaderMetadata::load(&file, ArrowReaderOptions::default())
            .map_err(parquet_error(path))?;
        check_schema(metadata.schema()).map_err(format_error(path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            metadata,
        })
    }

    fn builder(&self) -> Result<ParquetRecordBatchReaderBuilder<File>, MergeError> {
        let file = self.file.try_clone().map_err(io_error(&self.path))?;
        Ok(ParquetRecordBatchReaderBuilder::new_with_metadata(
            file,
            self.metadata.clone(),
        ))
    }

    fn num_row_groups(&self) -> usize {
        self.metadata.metadata().num_row_groups()
    }

    fn num_rows(&self) -> u64 {
        u64::try_from(self.metadata.metadata().file_metadata().num_rows()).unwrap_or_default()
    }

    fn largest_row_group(&self) -> usize {
        self.metadata
            .metadata()
            .row_groups()
            .iter()
            .map(|rg| usize::try_from(rg.num_rows()).unwrap_or_default())
            .max()
            .unwrap_or_default()
    }

    /// Codec of the first column chunk, if the file has any row group.
    fn compression(&self) -> Option<Compression> {
        self.metadata
            .metadata()
            .row_groups()
            .first()
            .and_then(|rg| rg.columns().first())
            .map(|column| column.compression())
    }

    /// Reads the `pair` and `timestamp` columns only.
    fn key_index(&self, batch_size: usize) -> Result<KeyIndex, MergeError> {
        let builder = self.builder()?;
        // pair and timestamp are the first two root columns
        let mask = ProjectionMask::roots(builder.parquet_schema(), [0, 1]);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(batch_size)
            .build()
            .map_err(parquet_error(&self.path))?;

        let mut index = KeyIndex::builder();
        for batch in reader {
            let batch = batch.map_err(parquet_error(&self.path))?;
            index.push_batch(&batch).map_err(format_error(&self.path))?;
        }
        Ok(index.build())
    }

    /// Copies row group `idx` into `writer` as one row group.
    fn copy_row_group(
        &self,
        idx: usize,
        batch_size: usize,
        writer: &mut ArrowWriter<File>,
        temp: &Path,
    ) -> Result<(), MergeError> {
        let schema = archive_schema();
        let reader = self
            .builder()?
            .with_row_groups(vec![idx])
            .with_batch_size(batch_size)
            .build()
            .map_err(parquet_error(&self.path))?;

        for batch in reader {
            let batch = batch.map_err(parquet_error(&self.path))?;
            let batch = RecordBatch::try_new(schema.clone(), batch.columns().to_vec())
                .map_err(parquet_error(&self.path))?;
            writer.write(&batch).map_err(parquet_error(temp))?;
        }
        writer.flush().map_err(parquet_error(temp))
    }
}

/// A merge whose temp file is fully written but not yet in place.
///
/// Holds the partition lock. [`commit`](Self::commit) renames the temp file
/// over the partition; dropping the stage instead removes the temp file and
/// leaves the partition untouched.
#[derive(Debug)]
#[must_use = "a staged merge does nothing until committed"]
pub struct StagedMerge {
    partition: PathBuf,
    temp: Option<PathBuf>,
    stats: MergeStats,
    _lock: PartitionLock,
}

impl StagedMerge {
    /// Returns the partition path.
    #[must_use]
    pub fn partition(&self) -> &Path {
        &self.partition
    }

    /// Returns the temp file path, or `None` if there is nothing to write.
    #[must_use]
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_deref()
    }

    /// Returns the merge counters.
    #[must_use]
    pub const fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Returns true if every incoming row was a duplicate.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.temp.is_none()
    }

    /// Renames the temp file over the partition and releases the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails; the partition is then unchanged.
    pub fn commit(mut self) -> Result<MergeStats, MergeError> {
        let Some(temp) = self.temp.take() else {
            debug!(partition = %self.partition.display(), "nothing new to merge");
            return Ok(self.stats);
        };

        if let Err(source) = fs::rename(&temp, &self.partition) {
            let _ = fs::remove_file(&temp);
            return Err(MergeError::Io {
                path: self.partition.clone(),
                source,
            });
        }
        sync_parent(&self.partition);

        info!(
            partition = %self.partition.display(),
            appended = self.stats.rows_appended,
            duplicates = self.stats.duplicates,
            "merged rows into partition"
        );
        Ok(self.stats)
    }
}

impl Drop for StagedMerge {
    fn drop(&mut self) {
        if let Some(temp) = self.temp.take() {
            match fs::remove_file(&temp) {
                Ok(()) => debug!(path = %temp.display(), "discarded uncommitted merge"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %temp.display(), error = %e, "failed to remove temp file"),
            }
        }
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = File::open(parent).and_then(|dir| dir.sync_all())
    {
        debug!(path = %parent.display(), error = %e, "directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

/// Merges rows into the archive under an output root.
#[derive(Debug, Clone)]
pub struct ArchiveAppender {
    root: PathBuf,
    layout: ArchiveLayout,
    codec: Codec,
    row_group_size: usize,
    read_batch_size: usize,
    lock_policy: LockPolicy,
}

impl ArchiveAppender {
    /// Creates an appender with default settings.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = ArchiveConfig::default();
        Self {
            root: root.into(),
            layout: defaults.layout,
            codec: defaults.compression,
            row_group_size: defaults.row_group_size,
            read_batch_size: defaults.read_batch_size,
            lock_policy: defaults.lock,
        }
    }

    /// Creates an appender for the configured output root.
    #[must_use]
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            root: config.output.clone(),
            layout: config.layout,
            codec: config.compression,
            row_group_size: config.row_group_size,
            read_batch_size: config.read_batch_size,
            lock_policy: config.lock,
        }
    }

    /// Sets the layout for new partitions.
    #[must_use]
    pub const fn with_layout(mut self, layout: ArchiveLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the codec for new partitions.
    #[must_use]
    pub const fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the maximum rows per new row group.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Sets the decoded batch size used when reading a partition.
    #[must_use]
    pub const fn with_read_batch_size(mut self, size: usize) -> Self {
        self.read_batch_size = size;
        self
    }

    /// Sets the lock retry policy.
    #[must_use]
    pub const fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Returns the archive root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the partition path for a month.
    ///
    /// An existing nested partition wins over an existing flat one; if
    /// neither exists the configured layout decides.
    #[must_use]
    pub fn resolve_partition(&self, ym: YearMonth) -> PathBuf {
        ArchiveLayout::all()
            .iter()
            .map(|layout| layout.partition_path(&self.root, ym))
            .find(|path| path.is_file())
            .unwrap_or_else(|| self.layout.partition_path(&self.root, ym))
    }

    /// Returns the number of rows in a month's partition, zero if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition exists but its footer is unreadable.
    pub fn row_count(&self, ym: YearMonth) -> Result<u64, MergeError> {
        let path = self.resolve_partition(ym);
        if !path.is_file() {
            return Ok(0);
        }
        Ok(ExistingPartition::open(&path)?.num_rows())
    }

    /// Groups rows by month and merges each group, in ascending month order.
    ///
    /// Stops at the first failing partition. Partitions merged before it
    /// stay merged; a retry deduplicates them.
    ///
    /// # Errors
    ///
    /// Returns the first merge error.
    pub fn append_rows(&self, rows: Vec<OhlcRow>) -> Result<MergeStats, MergeError> {
        let rows_read = rows.len();
        let mut groups: BTreeMap<YearMonth, Vec<OhlcRow>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.year_month()).or_default().push(row);
        }

        let mut total = MergeStats::default();
        for (ym, rows) in groups {
            total += self.append(ym, rows)?;
        }
        debug_assert_eq!(total.rows_read, rows_read);
        Ok(total)
    }

    /// Merges rows into one month's partition.
    ///
    /// # Errors
    ///
    /// See [`stage`](Self::stage) and [`StagedMerge::commit`].
    pub fn append(&self, ym: YearMonth, rows: Vec<OhlcRow>) -> Result<MergeStats, MergeError> {
        self.stage(ym, rows)?.commit()
    }

    /// Locks the month's partition and writes the merged temp file.
    ///
    /// Every row must belong to `ym`; [`append_rows`](Self::append_rows)
    /// does the grouping.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::LockContention`] if the lock stays held,
    /// [`MergeError::SchemaMismatch`] if the existing partition has a
    /// foreign schema, and I/O or Parquet errors otherwise. The partition
    /// is never modified by this call.
    pub fn stage(&self, ym: YearMonth, rows: Vec<OhlcRow>) -> Result<StagedMerge, MergeError> {
        debug_assert!(rows.iter().all(|r| ym.contains(r.timestamp)));

        let partition = self.resolve_partition(ym);
        if let Some(parent) = partition.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let lock = PartitionLock::acquire(&partition, &self.lock_policy)?;

        let existing = if partition.is_file() {
            Some(ExistingPartition::open(&partition)?)
        } else {
            None
        };

        let rows_read = rows.len();
        let (mut fresh, duplicates) = match &existing {
            Some(existing) => existing.key_index(self.read_batch_size)?.split_new(rows),
            None => KeyIndex::default().split_new(rows),
        };
        debug!(
            partition = %partition.display(),
            existing_rows = existing.as_ref().map_or(0, ExistingPartition::num_rows),
            incoming = rows_read,
            fresh = fresh.len(),
            "deduplicated incoming rows"
        );

        let mut staged = StagedMerge {
            partition,
            temp: None,
            stats: MergeStats {
                rows_read,
                rows_appended: fresh.len(),
                duplicates,
                partitions: usize::from(!fresh.is_empty()),
            },
            _lock: lock,
        };
        if fresh.is_empty() {
            return Ok(staged);
        }

        fresh.sort_by(|a, b| a.key().cmp(&b.key()));
        let temp = with_suffix(&staged.partition, ".partial");
        staged.temp = Some(temp.clone());
        self.write_partition(&temp, existing.as_ref(), &fresh)?;

        Ok(staged)
    }

    fn write_partition(
        &self,
        temp: &Path,
        existing: Option<&ExistingPartition>,
        fresh: &[OhlcRow],
    ) -> Result<(), MergeError> {
        let compression = existing
            .and_then(ExistingPartition::compression)
            .unwrap_or_else(|| self.codec.compression());
        let row_group_size = self.row_group_size.max(1);
        let max_rows = existing
            .map_or(0, ExistingPartition::largest_row_group)
            .max(row_group_size);

        // truncate: a stale temp file from an interrupted run may exist
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp)
            .map_err(io_error(temp))?;
        let props = writer_properties(compression, max_rows);
        let mut writer =
            ArrowWriter::try_new(file, archive_schema(), Some(props)).map_err(parquet_error(temp))?;

        if let Some(existing) = existing {
            for idx in 0..existing.num_row_groups() {
                existing.copy_row_group(idx, self.read_batch_size.max(1), &mut writer, temp)?;
            }
        }

        for chunk in fresh.chunks(row_group_size) {
            let batch = rows_to_batch(chunk).map_err(format_error(temp))?;
            writer.write(&batch).map_err(parquet_error(temp))?;
            writer.flush().map_err(parquet_error(temp))?;
        }

        let file = writer.into_inner().map_err(parquet_error(temp))?;
        file.sync_all().map_err(io_error(temp))
    }
}
