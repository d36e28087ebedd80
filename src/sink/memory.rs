//! In-process sink.
//!
//! Keeps every indexed document as JSON in memory. Used by `run --dry-run`
//! and by tests that need to observe what the pipeline wrote.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::Result;
use crate::model::MovieDocument;

use super::schema::IndexSchema;
use super::SearchSink;

type Indices = BTreeMap<String, BTreeMap<String, Value>>;

/// Sink that stores documents per index, keyed by id.
#[derive(Debug, Default)]
pub struct MemorySink {
    indices: Mutex<Indices>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Indices> {
        self.indices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of documents stored in `index`.
    #[must_use]
    pub fn count(&self, index: &str) -> usize {
        self.lock().get(index).map_or(0, BTreeMap::len)
    }

    /// Stored source of document `id`, if any.
    #[must_use]
    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.lock().get(index).and_then(|docs| docs.get(id).cloned())
    }

    /// Stored document `id` decoded back into a [`MovieDocument`].
    #[must_use]
    pub fn document(&self, index: &str, id: &str) -> Option<MovieDocument> {
        self.get(index, id)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Ids stored in `index`, sorted.
    #[must_use]
    pub fn ids(&self, index: &str) -> Vec<String> {
        self.lock()
            .get(index)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl SearchSink for MemorySink {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.lock().contains_key(index))
    }

    async fn create_index(&self, index: &str, _schema: &IndexSchema) -> Result<()> {
        self.lock().entry(index.to_string()).or_default();
        Ok(())
    }

    async fn bulk_index(&self, index: &str, docs: &[MovieDocument]) -> Result<usize> {
        let encoded = docs
            .iter()
            .map(|doc| Ok((doc.id.clone(), serde_json::to_value(doc)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut indices = self.lock();
        let stored = indices.entry(index.to_string()).or_default();
        for (id, value) in encoded {
            stored.insert(id, value);
        }
        Ok(docs.len())
    }
}
