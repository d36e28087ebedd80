//! Read-only SQL source.
//!
//! The catalog lives in a normalized SQLite database. This module provides:
//! - [`sqlite`] - Connection handling, read transactions, error classification
//! - [`schema`] - DDL of the source relations
//! - [`extract`] - Incremental keyset scan of one relation by revision
//! - [`enrich`] - Related-entity ids to affected film work ids
//! - [`merge`] - Denormalizing join producing flat rows
//!
//! Nothing in this module writes to the source, except `schema::apply_schema`
//! which is only used to create fresh databases.

pub mod enrich;
pub mod extract;
pub mod merge;
pub mod schema;
pub mod sqlite;

pub use enrich::AffectedRoots;
pub use extract::BatchCursor;
pub use merge::MergeCursor;
pub use schema::{apply_schema, SOURCE_SCHEMA_SQL};
pub use sqlite::SourceStore;
