//! filmsync - incremental sync of a relational film catalog into a search index
//!
//! Changed rows are read from the catalog by revision, joined into one
//! denormalized document per film work, and upserted into Elasticsearch.
//! Per-stream watermarks make the process restartable without loss.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Layered configuration (file, environment, flags)
//! - [`model`] - Streams, roles, flat merge rows, documents
//! - [`source`] - Read-only SQLite source: extractor, propagator, merger
//! - [`sync`] - Checkpoints, document builder, orchestrator
//! - [`sink`] - Search sink trait, Elasticsearch and in-memory sinks, index writer
//! - [`retry`] - Retry-with-backoff combinator
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod sink;
pub mod source;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
