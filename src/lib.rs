//! Feedkit - replay tooling for a log-ingestion lab
//!
//! Shared modules for the `ndjson-to-bulk` and `packet-replay` binaries.

pub mod bulk;
pub mod elasticsearch;
pub mod packet;
pub mod timestamp;

pub use bulk::{BulkConverter, ConversionStats};
pub use timestamp::Realigner;
