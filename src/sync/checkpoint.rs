//! Durable per-stream watermarks.
//!
//! The store is one JSON object mapping stream key to an RFC 3339 timestamp.
//! It is read in full when opened and rewritten in full, atomically, on every
//! advancement. Any failure to read or write it is fatal to the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::sync::file::{atomic_write, read_optional};

/// Process-wide key → watermark map.
#[derive(Debug)]
pub struct CheckpointStore {
    /// `None` keeps watermarks in memory only (dry runs, tests).
    path: Option<PathBuf>,
    state: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl CheckpointStore {
    /// Load the store from `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Checkpoint` if the file exists but cannot be read or
    /// does not contain a JSON object of timestamps.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = read_optional(&path).map_err(|e| Error::checkpoint(&path, e))?;

        let state = match content {
            Some(content) if !content.trim().is_empty() => parse_state(&path, &content)?,
            _ => BTreeMap::new(),
        };

        tracing::debug!(path = %path.display(), streams = state.len(), "loaded checkpoints");
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(BTreeMap::new()),
        }
    }

    /// In-memory copy of the current watermarks.
    ///
    /// Advancing the copy never touches the backing file; dry runs start
    /// from the real watermarks this way without moving them.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            path: None,
            state: Mutex::new(self.all()),
        }
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Watermark for `key`; `None` means scan from the beginning.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.lock().get(key).copied()
    }

    /// Snapshot of every stored watermark.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.lock().clone()
    }

    /// Advance the watermark for `key` and persist the whole map.
    ///
    /// Watermarks never move backwards: a value older than the stored one is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Checkpoint` if the file cannot be written; the
    /// in-memory value is left unchanged in that case.
    pub fn set(&self, key: &str, watermark: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock();
        if state.get(key).is_some_and(|current| *current > watermark) {
            tracing::warn!(stream = key, %watermark, "ignoring watermark regression");
            return Ok(());
        }

        let mut next = state.clone();
        next.insert(key.to_string(), watermark);
        self.persist(&next)?;
        *state = next;

        tracing::debug!(stream = key, %watermark, "checkpoint advanced");
        Ok(())
    }

    /// Forget the watermark for `key`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Checkpoint` if the file cannot be written.
    pub fn clear(&self, key: &str) -> Result<bool> {
        let mut state = self.lock();
        if !state.contains_key(key) {
            return Ok(false);
        }

        let mut next = state.clone();
        next.remove(key);
        self.persist(&next)?;
        *state = next;
        Ok(true)
    }

    /// Forget every watermark. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Checkpoint` if the file cannot be written.
    pub fn clear_all(&self) -> Result<usize> {
        let mut state = self.lock();
        let removed = state.len();
        self.persist(&BTreeMap::new())?;
        state.clear();
        Ok(removed)
    }

    fn persist(&self, state: &BTreeMap<String, DateTime<Utc>>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let rendered: BTreeMap<&str, String> = state
            .iter()
            .map(|(key, ts)| (key.as_str(), ts.to_rfc3339()))
            .collect();
        let content =
            serde_json::to_string_pretty(&rendered).map_err(|e| Error::checkpoint(path, e))?;
        atomic_write(path, &content).map_err(|e| Error::checkpoint(path, e))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, DateTime<Utc>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_state(path: &Path, content: &str) -> Result<BTreeMap<String, DateTime<Utc>>> {
    let raw: BTreeMap<String, String> =
        serde_json::from_str(content).map_err(|e| Error::checkpoint(path, e))?;

    raw.into_iter()
        .map(|(key, value)| {
            DateTime::parse_from_rfc3339(&value)
                .map(|ts| (key.clone(), ts.with_timezone(&Utc)))
                .map_err(|e| Error::checkpoint(path, format!("{key}: {e}")))
        })
        .collect()
}
