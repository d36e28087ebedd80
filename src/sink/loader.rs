//! Index writer.
//!
//! Wraps a [`SearchSink`] so that every call survives transient outages:
//! the exists-check, index creation, and bulk writes all go through the
//! retry combinator. Writes are upserts keyed by document id, which makes
//! replaying a batch after a crash safe.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::MovieDocument;
use crate::retry::{retry_with_backoff, Backoff};

use super::schema::IndexSchema;
use super::SearchSink;

/// Loader stage of the pipeline.
pub struct IndexWriter<S> {
    sink: S,
    backoff: Backoff,
}

impl<S: SearchSink> IndexWriter<S> {
    #[must_use]
    pub fn new(sink: S, backoff: Backoff) -> Self {
        Self { sink, backoff }
    }

    /// The wrapped sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Create `index` unless it already exists.
    ///
    /// Returns `true` when the index was created by this call.
    ///
    /// # Errors
    ///
    /// Returns the last sink error once retries are exhausted, or the first
    /// non-transient one.
    pub async fn ensure_schema(&self, index: &str, schema: &IndexSchema) -> Result<bool> {
        let exists = retry_with_backoff("index_exists", &self.backoff, Error::is_transient, || {
            self.sink.index_exists(index)
        })
        .await?;

        if exists {
            debug!(index, "index already exists");
            return Ok(false);
        }

        retry_with_backoff("create_index", &self.backoff, Error::is_transient, || {
            self.sink.create_index(index, schema)
        })
        .await?;
        info!(index, "index ready");
        Ok(true)
    }

    /// Upsert `docs` into `index`.
    ///
    /// # Errors
    ///
    /// Returns the last sink error once retries are exhausted, or the first
    /// non-transient one (such as a mapping rejection).
    pub async fn write(&self, index: &str, docs: &[MovieDocument]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let count = retry_with_backoff("bulk_index", &self.backoff, Error::is_transient, || {
            self.sink.bulk_index(index, docs)
        })
        .await?;
        info!(index, count, "wrote documents");
        Ok(count)
    }
}
