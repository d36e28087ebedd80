//! Configuration management.
//!
//! Settings are layered, later layers winning:
//! 1. Built-in defaults (batch size 50, index `movies`, `http://localhost:9200`)
//! 2. An optional JSON config file (`--config` / `FILMSYNC_CONFIG`)
//! 3. Environment variables and command-line flags, merged by clap
//!
//! The resolved [`SyncConfig`] is validated once at startup so a bad value
//! fails the process before any checkpoint or index is touched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::Backoff;
use crate::sync::PipelineOptions;
use crate::validate::{validate_batch_size, validate_index_name, validate_sink_url};

pub const DEFAULT_ELASTIC_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX_NAME: &str = "movies";
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Catalog database to read from.
    pub source_db: Option<PathBuf>,
    /// Busy timeout for the source connection, in milliseconds.
    pub source_busy_timeout_ms: Option<u64>,
    pub elastic_url: String,
    pub index_name: String,
    pub batch_size: usize,
    /// Checkpoint file; defaults to the platform data directory.
    pub state_path: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Retry policy for transient source and sink failures.
    pub backoff: Backoff,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_db: None,
            source_busy_timeout_ms: None,
            elastic_url: DEFAULT_ELASTIC_URL.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            state_path: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            backoff: Backoff::default(),
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// `None` leaves the lower layer untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source_db: Option<PathBuf>,
    pub elastic_url: Option<String>,
    pub index_name: Option<String>,
    pub batch_size: Option<usize>,
    pub state_path: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
}

impl SyncConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {e}", path.display())))
    }

    /// Defaults, then the optional file, then `overrides`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the config file is unreadable.
    pub fn resolve(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    /// Apply the set fields of `overrides`.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.source_db {
            self.source_db = Some(path.clone());
        }
        if let Some(url) = &overrides.elastic_url {
            self.elastic_url.clone_from(url);
        }
        if let Some(index) = &overrides.index_name {
            self.index_name.clone_from(index);
        }
        if let Some(size) = overrides.batch_size {
            self.batch_size = size;
        }
        if let Some(path) = &overrides.state_path {
            self.state_path = Some(path.clone());
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
    }

    /// Check every setting needed to run the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        validate_batch_size(self.batch_size).map_err(Error::Config)?;
        validate_index_name(&self.index_name).map_err(Error::Config)?;
        validate_sink_url(&self.elastic_url).map_err(Error::Config)?;
        let source = self.source_db()?;
        if !source.exists() {
            return Err(Error::Config(format!(
                "Source database {} does not exist",
                source.display()
            )));
        }
        Ok(())
    }

    /// Source database path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no source was configured.
    pub fn source_db(&self) -> Result<&Path> {
        self.source_db.as_deref().ok_or_else(|| {
            Error::Config("No source database (set --source-db or FILMSYNC_SOURCE_DB)".to_string())
        })
    }

    /// Checkpoint file path, falling back to the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no path was set and no home directory can
    /// be determined.
    pub fn state_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.state_path {
            return Ok(path.clone());
        }
        default_state_path().ok_or_else(|| {
            Error::Config("Cannot determine a data directory; set FILMSYNC_STATE_PATH".to_string())
        })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Pipeline settings shared by every stream.
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            index_name: self.index_name.clone(),
            batch_size: self.batch_size,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            source_backoff: self.backoff.clone(),
        }
    }
}

/// Default checkpoint file: `<data dir>/filmsync/state.json`.
#[must_use]
pub fn default_state_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "filmsync").map(|dirs| dirs.data_dir().join("state.json"))
}
