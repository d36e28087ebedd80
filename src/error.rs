//! Error types for filmsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=source, 3=integrity, 4=sink, etc.)
//! - Transient/fatal classification driving retry and shutdown
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for filmsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Source (exit 2)
    SourceUnavailable,
    SourceError,

    // Source data integrity (exit 3)
    SourceIntegrity,

    // Sink (exit 4)
    SinkUnavailable,
    SinkError,

    // Sink schema conflict (exit 5)
    SinkSchemaConflict,

    // Checkpoint (exit 6)
    CheckpointError,

    // Config (exit 7)
    ConfigError,
    InvalidArgument,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::SourceUnavailable => "SOURCE_UNAVAILABLE",
            Self::SourceError => "SOURCE_ERROR",
            Self::SourceIntegrity => "SOURCE_INTEGRITY",
            Self::SinkUnavailable => "SINK_UNAVAILABLE",
            Self::SinkError => "SINK_ERROR",
            Self::SinkSchemaConflict => "SINK_SCHEMA_CONFLICT",
            Self::CheckpointError => "CHECKPOINT_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::SourceUnavailable | Self::SourceError => 2,
            Self::SourceIntegrity => 3,
            Self::SinkUnavailable | Self::SinkError => 4,
            Self::SinkSchemaConflict => 5,
            Self::CheckpointError => 6,
            Self::ConfigError | Self::InvalidArgument => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the failing operation may succeed if simply repeated.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable | Self::SinkUnavailable)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while synchronizing the catalog.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source temporarily unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Source error: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("Malformed data in relation '{relation}': {cause}")]
    SourceIntegrity { relation: String, cause: String },

    #[error("Search sink unreachable: {0}")]
    SinkUnavailable(String),

    #[error("Search sink error: {0}")]
    Sink(String),

    #[error("Index '{index}' rejected document {id}: {reason}")]
    SinkSchema {
        index: String,
        id: String,
        reason: String,
    },

    #[error("Checkpoint store failure at {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SourceUnavailable(_) => ErrorCode::SourceUnavailable,
            Self::Source(_) => ErrorCode::SourceError,
            Self::SourceIntegrity { .. } => ErrorCode::SourceIntegrity,
            Self::SinkUnavailable(_) => ErrorCode::SinkUnavailable,
            Self::Sink(_) => ErrorCode::SinkError,
            Self::SinkSchema { .. } => ErrorCode::SinkSchemaConflict,
            Self::Checkpoint { .. } => ErrorCode::CheckpointError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// True for connectivity failures that the retry combinator may repeat.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.error_code().is_transient()
    }

    /// True when the process must stop instead of retrying on the next pass.
    ///
    /// Only checkpoint failures qualify: without a trustworthy watermark the
    /// daemon would either reprocess forever or leave silent gaps.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Checkpoint { .. })
    }

    /// Build a data-integrity error for `relation`.
    pub fn integrity(relation: impl Into<String>, cause: impl ToString) -> Self {
        Self::SourceIntegrity {
            relation: relation.into(),
            cause: cause.to_string(),
        }
    }

    /// Build a checkpoint error for the store at `path`.
    pub fn checkpoint(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Checkpoint {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Context-aware recovery hint for operators.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::SourceUnavailable(_) => Some(
                "The source database is locked by another writer. The next pass will retry."
                    .to_string(),
            ),
            Self::SinkUnavailable(_) => Some(
                "Check that Elasticsearch is reachable at the configured ELASTIC_URL.".to_string(),
            ),
            Self::SinkSchema { index, .. } => Some(format!(
                "The document shape does not match the mapping of '{index}'. \
                 Recreate the index with `filmsync index ensure` after deleting it."
            )),
            Self::Checkpoint { path, .. } => Some(format!(
                "Inspect or restore {}. Use `filmsync checkpoint reset --all` to rescan from scratch.",
                path.display()
            )),
            Self::Config(_) => Some(
                "Settings come from --config, then environment variables, then CLI flags."
                    .to_string(),
            ),
            Self::Source(_)
            | Self::SourceIntegrity { .. }
            | Self::Sink(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "transient": code.is_transient(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::SinkUnavailable("refused".into()).is_transient());
        assert!(Error::SourceUnavailable("busy".into()).is_transient());
        assert!(!Error::Sink("bad request".into()).is_transient());
        assert!(!Error::integrity("film_work", "rating is text").is_transient());
    }

    #[test]
    fn test_only_checkpoint_errors_are_fatal() {
        assert!(Error::checkpoint("/tmp/state.json", "disk full").is_fatal());
        assert!(!Error::SinkUnavailable("refused".into()).is_fatal());
        assert!(!Error::Config("missing".into()).is_fatal());
    }

    #[test]
    fn test_structured_json_shape() {
        let err = Error::SinkSchema {
            index: "movies".into(),
            id: "a1".into(),
            reason: "strict_dynamic_mapping_exception".into(),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "SINK_SCHEMA_CONFLICT");
        assert_eq!(json["error"]["exit_code"], 5);
        assert_eq!(json["error"]["transient"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("movies"));
    }
}
