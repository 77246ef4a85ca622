//! Apache Parquet encoding of archive partitions.

use arrow::array::{
    Array, AsArray, Float64Array, PrimitiveArray, RecordBatch, StringArray,
    TimestampMicrosecondArray, UInt64Array,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, Float64Type, Schema, SchemaRef, TimeUnit,
    TimestampMicrosecondType, UInt64Type,
};
use chrono::DateTime;
use ohlcvault_types::OhlcRow;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::{FormatError, Formatter};

/// Name of the pair column.
pub const PAIR_COLUMN: &str = "pair";

/// Name of the timestamp column.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

static ARCHIVE_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new(PAIR_COLUMN, DataType::Utf8, false),
        Field::new(
            TIMESTAMP_COLUMN,
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new("vwap", DataType::Float64, true),
        Field::new("volume", DataType::Float64, false),
        Field::new("trade_count", DataType::UInt64, true),
    ]))
});

/// Returns the Arrow schema shared by every archive partition.
#[must_use]
pub fn archive_schema() -> SchemaRef {
    Arc::clone(&ARCHIVE_SCHEMA)
}

/// Checks that a partition's schema matches [`archive_schema`].
///
/// Field names, order and data types must agree. Nullability and metadata
/// are not compared.
///
/// # Errors
///
/// Returns [`FormatError::Schema`] describing the schema found.
pub fn check_schema(found: &Schema) -> Result<(), FormatError> {
    let expected = archive_schema();
    let matches = found.fields().len() == expected.fields().len()
        && found
            .fields()
            .iter()
            .zip(expected.fields().iter())
            .all(|(f, e)| f.name() == e.name() && f.data_type() == e.data_type());

    if matches {
        Ok(())
    } else {
        let description = found
            .fields()
            .iter()
            .map(|f| format!("{}: {}", f.name(), f.data_type()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(FormatError::Schema(format!("[{description}]")))
    }
}

/// Converts rows to an Arrow record batch with the archive schema.
///
/// # Errors
///
/// Returns an error if Arrow rejects the batch.
pub fn rows_to_batch(rows: &[OhlcRow]) -> Result<RecordBatch, FormatError> {
    let pairs = StringArray::from_iter_values(rows.iter().map(|r| r.pair.as_str()));
    let timestamps: Vec<_> = rows.iter().map(|r| r.timestamp.timestamp_micros()).collect();
    let opens: Vec<_> = rows.iter().map(|r| r.open).collect();
    let highs: Vec<_> = rows.iter().map(|r| r.high).collect();
    let lows: Vec<_> = rows.iter().map(|r| r.low).collect();
    let closes: Vec<_> = rows.iter().map(|r| r.close).collect();
    let vwaps: Vec<_> = rows.iter().map(|r| r.vwap).collect();
    let volumes: Vec<_> = rows.iter().map(|r| r.volume).collect();
    let counts: Vec<_> = rows.iter().map(|r| r.trade_count).collect();

    RecordBatch::try_new(
        archive_schema(),
        vec![
            Arc::new(pairs),
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
            Arc::new(Float64Array::from(opens)),
            Arc::new(Float64Array::from(highs)),
            Arc::new(Float64Array::from(lows)),
            Arc::new(Float64Array::from(closes)),
            Arc::new(Float64Array::from(vwaps)),
            Arc::new(Float64Array::from(volumes)),
            Arc::new(UInt64Array::from(counts)),
        ],
    )
    .map_err(|e| FormatError::Parquet(e.to_string()))
}

/// Converts a record batch with the archive schema back to rows.
///
/// # Errors
///
/// Returns an error if a column is missing, mistyped, or holds an
/// out-of-range timestamp.
pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<OhlcRow>, FormatError> {
    let (pairs, timestamps) = key_columns(batch)?;
    let opens = primitive::<Float64Type>(batch, "open")?;
    let highs = primitive::<Float64Type>(batch, "high")?;
    let lows = primitive::<Float64Type>(batch, "low")?;
    let closes = primitive::<Float64Type>(batch, "close")?;
    let vwaps = primitive::<Float64Type>(batch, "vwap")?;
    let volumes = primitive::<Float64Type>(batch, "volume")?;
    let counts = primitive::<UInt64Type>(batch, "trade_count")?;

    (0..batch.num_rows())
        .map(|i| {
            let micros = timestamps.value(i);
            let timestamp = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                FormatError::Schema(format!("timestamp {micros} is out of range"))
            })?;
            Ok(OhlcRow {
                pair: pairs.value(i).to_string(),
                timestamp,
                open: opens.value(i),
                high: highs.value(i),
                low: lows.value(i),
                close: closes.value(i),
                vwap: (!vwaps.is_null(i)).then(|| vwaps.value(i)),
                volume: volumes.value(i),
                trade_count: (!counts.is_null(i)).then(|| counts.value(i)),
            })
        })
        .collect()
}

/// Returns the `pair` and `timestamp` columns of a batch.
///
/// Works on full batches and on batches projected to the key columns.
///
/// # Errors
///
/// Returns an error if either column is missing or mistyped.
pub fn key_columns(
    batch: &RecordBatch,
) -> Result<(&StringArray, &TimestampMicrosecondArray), FormatError> {
    let pairs = batch
        .column_by_name(PAIR_COLUMN)
        .and_then(|c| c.as_string_opt::<i32>())
        .ok_or_else(|| missing_column(PAIR_COLUMN))?;
    let timestamps = primitive::<TimestampMicrosecondType>(batch, TIMESTAMP_COLUMN)?;
    Ok((pairs, timestamps))
}

fn primitive<'a, T: ArrowPrimitiveType>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a PrimitiveArray<T>, FormatError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<T>())
        .ok_or_else(|| missing_column(name))
}

fn missing_column(name: &str) -> FormatError {
    FormatError::Schema(format!("missing or mistyped column '{name}'"))
}

/// Reads every row of a partition file into memory.
///
/// Intended for inspection and tests; merges never decode a whole partition.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded, or if its
/// schema is not the archive schema.
pub fn read_rows(path: &Path) -> Result<Vec<OhlcRow>, FormatError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| FormatError::Parquet(e.to_string()))?;
    check_schema(builder.schema())?;

    let reader = builder
        .build()
        .map_err(|e| FormatError::Parquet(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| FormatError::Parquet(e.to_string()))?;
        rows.extend(batch_to_rows(&batch)?);
    }
    Ok(rows)
}

/// Compression codec for newly created partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// No compression.
    None,
    /// Snappy.
    Snappy,
    /// Gzip at the default level.
    #[default]
    Gzip,
    /// Zstandard at the default level.
    Zstd,
}

impl Codec {
    /// Returns the Parquet compression setting for this codec.
    #[must_use]
    pub fn compression(&self) -> Compression {
        match self {
            Self::None => Compression::UNCOMPRESSED,
            Self::Snappy => Compression::SNAPPY,
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }

    /// Returns the codec as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    /// Returns all codecs.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::None, Self::Snappy, Self::Gzip, Self::Zstd]
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Codec {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            _ => Err(FormatError::UnknownCodec(s.to_string())),
        }
    }
}

/// Builds writer properties for a partition.
#[must_use]
pub fn writer_properties(compression: Compression, row_group_size: usize) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(compression)
        .set_max_row_group_size(row_group_size.max(1))
        .build()
}

/// Writes rows as a complete Parquet partition in one pass.
#[derive(Debug, Clone)]
pub struct ParquetFormatter {
    /// Row group size (number of rows per group).
    row_group_size: usize,
    /// Compression codec.
    codec: Codec,
}

impl Default for ParquetFormatter {
    fn default() -> Self {
        Self {
            row_group_size: 100_000,
            codec: Codec::default(),
        }
    }
}

impl ParquetFormatter {
    /// Creates a new Parquet formatter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the row group size.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Sets the compression codec.
    #[must_use]
    pub const fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

impl Formatter for ParquetFormatter {
    fn write_rows<W: Write + Send>(&self, rows: &[OhlcRow], writer: W) -> Result<(), FormatError> {
        let props = writer_properties(self.codec.compression(), self.row_group_size);
        let mut arrow_writer = ArrowWriter::try_new(writer, archive_schema(), Some(props))
            .map_err(|e| FormatError::Parquet(e.to_string()))?;

        for chunk in rows.chunks(self.row_group_size.max(1)) {
            let batch = rows_to_batch(chunk)?;
            arrow_writer
                .write(&batch)
                .map_err(|e| FormatError::Parquet(e.to_string()))?;
        }

        arrow_writer
            .close()
            .map_err(|e| FormatError::Parquet(e.to_string()))?;

        Ok(())
    }

    fn extension(&self) -> &str {
        "parquet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    fn create_test_row(minute: u32) -> OhlcRow {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 5, 10, minute, 0).unwrap();
        OhlcRow::new("XETHZEUR", timestamp, 2100.5, 2101.0, 2099.9, 2100.1, 3.25)
    }

    #[test]
    fn test_parquet_magic() {
        let formatter = ParquetFormatter::new();
        let mut output = Cursor::new(Vec::new());

        formatter
            .write_rows(&[create_test_row(0)], &mut output)
            .unwrap();

        let data = output.into_inner();
        assert!(data.len() > 4);
        assert_eq!(&data[0..4], b"PAR1");
    }

    #[test]
    fn test_archive_schema() {
        let schema = archive_schema();
        assert_eq!(schema.fields().len(), 9);
        assert_eq!(schema.field(0).name(), PAIR_COLUMN);
        assert_eq!(schema.field(1).name(), TIMESTAMP_COLUMN);
        assert!(schema.field_with_name("vwap").unwrap().is_nullable());
        assert!(check_schema(&schema).is_ok());
    }

    #[test]
    fn test_check_schema_rejects_foreign() {
        let foreign = Schema::new(vec![
            Field::new("time", DataType::Utf8, false),
            Field::new("open", DataType::Float64, false),
        ]);

        let err = check_schema(&foreign).unwrap_err();
        assert!(err.to_string().contains("time: Utf8"));
    }

    #[test]
    fn test_batch_preserves_optional_fields() {
        let rows = vec![
            create_test_row(0).with_vwap(2100.3).with_trade_count(12),
            create_test_row(1),
        ];

        let batch = rows_to_batch(&rows).unwrap();
        let back = batch_to_rows(&batch).unwrap();

        assert_eq!(back.len(), 2);
        assert_relative_eq!(back[0].vwap.unwrap(), 2100.3);
        assert_eq!(back[0].trade_count, Some(12));
        assert_eq!(back[1].vwap, None);
        assert_eq!(back[1].trade_count, None);
        assert_eq!(back[1].timestamp, rows[1].timestamp);
    }

    #[test]
    fn test_read_rows_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-01.parquet");
        let rows: Vec<_> = (0..25).map(create_test_row).collect();

        ParquetFormatter::new()
            .with_row_group_size(10)
            .with_codec(Codec::Zstd)
            .write_rows(&rows, File::create(&path).unwrap())
            .unwrap();

        let back = read_rows(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_codec_parse() {
        assert_eq!("gzip".parse::<Codec>().unwrap(), Codec::Gzip);
        assert_eq!("UNCOMPRESSED".parse::<Codec>().unwrap(), Codec::None);
        assert!("lzo".parse::<Codec>().is_err());
        assert_eq!(Codec::default(), Codec::Gzip);
    }
}
