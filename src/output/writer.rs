//! Parquet output
//!
//! Writes entity results to Parquet files, one file per entity.

use super::batch::{result_schema, to_record_batch};
use crate::error::{Error, Result};
use crate::results::{EntityResult, Results};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Parquet writer settings
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
    dictionary_enabled: bool,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 64 * 1024,
            dictionary_enabled: true,
        }
    }
}

impl ParquetWriterConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Enable or disable dictionary encoding
    #[must_use]
    pub fn with_dictionary(mut self, enabled: bool) -> Self {
        self.dictionary_enabled = enabled;
        self
    }

    #[must_use]
    pub fn uncompressed(self) -> Self {
        self.with_compression(Compression::UNCOMPRESSED)
    }

    #[must_use]
    pub fn zstd(self) -> Self {
        self.with_compression(Compression::ZSTD(ZstdLevel::default()))
    }

    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    #[must_use]
    pub fn is_dictionary_enabled(&self) -> bool {
        self.dictionary_enabled
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_dictionary_enabled(self.dictionary_enabled)
            .build()
    }
}

/// Streams record batches into one Parquet file
pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    rows_written: usize,
}

impl ParquetWriter {
    pub fn new(
        path: impl AsRef<Path>,
        schema: &Schema,
        config: &ParquetWriterConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::output(format!("Failed to create '{}': {e}", path.display()))
        })?;
        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(config.properties()))?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch)?;
        self.rows_written += batch.num_rows();
        Ok(())
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Finish the file and return the number of rows written
    pub fn close(self) -> Result<usize> {
        let rows = self.rows_written;
        self.writer.close()?;
        Ok(rows)
    }
}

impl std::fmt::Debug for ParquetWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetWriter")
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

/// Write the rows of one entity to a Parquet file
pub fn write_result_to_parquet(
    path: impl AsRef<Path>,
    result: &EntityResult,
    config: Option<&ParquetWriterConfig>,
) -> Result<usize> {
    let default_config = ParquetWriterConfig::default();
    let config = config.unwrap_or(&default_config);

    let mut writer = ParquetWriter::new(path, &result_schema(result), config)?;
    if !result.is_empty() {
        writer.write(&to_record_batch(result)?)?;
    }
    writer.close()
}

/// Write every entity to `<dir>/<entity>.parquet`
///
/// Returns the written paths in entity order.
pub fn write_results_to_parquet(
    dir: impl AsRef<Path>,
    results: &Results,
    config: Option<&ParquetWriterConfig>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(results.len());
    for (name, result) in results.iter() {
        let path = dir.join(format!("{}.parquet", file_stem(name)));
        let rows = write_result_to_parquet(&path, result, config)?;
        debug!(entity = %name, rows, path = %path.display(), "Wrote Parquet file");
        paths.push(path);
    }
    Ok(paths)
}

/// Entity name usable as a file name
fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
