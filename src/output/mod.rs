//! Output module
//!
//! Turns parse results into Arrow record batches, Parquet files or JSON.
//!
//! # Overview
//!
//! - `to_record_batch` converts one entity into nullable Utf8 columns
//! - `write_results_to_parquet` writes one Parquet file per entity
//! - `results_to_json` nests child results under `"_linked"`

mod batch;
mod json;
mod writer;

pub use batch::{batch_to_rows, result_schema, to_record_batch};
pub use json::{result_to_json, results_to_json, LINKED_KEY};
pub use writer::{
    write_result_to_parquet, write_results_to_parquet, ParquetWriter, ParquetWriterConfig,
};
