//! NDJSON to Elasticsearch bulk format conversion.

mod convert;
mod input;

pub use convert::{BulkConverter, ConversionStats, CREATE_ACTION};
pub use input::open_input;
