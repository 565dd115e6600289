//! Fetch module
//!
//! Retrieves documents for the parser and optionally persists them.
//!
//! - `Fetcher` - async trait implemented by every document source
//! - `FileFetcher` - reads `file://` URLs
//! - `MemoryFetcher` - serves fixed documents, records fetch times
//! - `DownloadStore` - writes fetched documents under patterned names
//!
//! The HTTP implementation lives in `crate::http`.

mod download;
mod file;
mod memory;
mod types;

pub use download::{DownloadSettings, DownloadStore};
pub use file::FileFetcher;
pub use memory::{FetchRecord, MemoryFetcher};
pub use types::{Document, Fetcher, Request};

#[cfg(test)]
mod tests;
