//! Elasticsearch client and bulk loading.

mod bulk;
mod client;

pub use bulk::{push_bulk_file, BulkDocuments, BulkIndexer};
pub use client::EsClient;
