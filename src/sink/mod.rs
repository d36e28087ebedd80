//! Search sink.
//!
//! Documents are written to a search engine index keyed by document id.
//! This module provides:
//! - [`SearchSink`] - the trait every sink implements
//! - [`elastic`] - Elasticsearch over HTTP
//! - [`memory`] - in-process sink for dry runs and tests
//! - [`schema`] - index settings and strict mapping
//! - [`loader`] - the index writer that wraps a sink with retries

pub mod elastic;
pub mod loader;
pub mod memory;
pub mod schema;

use std::future::Future;

use crate::error::Result;
use crate::model::MovieDocument;

pub use elastic::ElasticsearchSink;
pub use loader::IndexWriter;
pub use memory::MemorySink;
pub use schema::IndexSchema;

/// Trait for search sinks.
///
/// Writes are upserts: indexing a document whose id already exists replaces
/// it entirely, so repeating a write is harmless.
pub trait SearchSink: Send + Sync {
    /// Check whether `index` exists.
    fn index_exists(&self, index: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Create `index` with the given settings and mappings.
    ///
    /// Creating an index that already exists is not an error.
    fn create_index(
        &self,
        index: &str,
        schema: &IndexSchema,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Upsert `docs` into `index`, returning the number written.
    fn bulk_index(
        &self,
        index: &str,
        docs: &[MovieDocument],
    ) -> impl Future<Output = Result<usize>> + Send;
}
