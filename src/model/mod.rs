//! Data models for filmsync.
//!
//! This module contains the domain models flowing through the pipeline:
//! - StreamKind: the three independently checkpointed source streams
//! - Role: the closed set of attachment roles and their document fields
//! - Rows: extractor rows and flat merge rows
//! - MovieDocument: the sink-side document

pub mod document;
pub mod role;
pub mod row;
pub mod stream;

pub use document::{MovieDocument, NamedRef};
pub use role::{RelationKind, Role};
pub use row::{FlatRow, RelatedAttachment, RevisionedRow};
pub use stream::StreamKind;
