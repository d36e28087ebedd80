//! Rows produced by the source stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::role::Role;

/// Extractor/propagator output: an id and its revision timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionedRow {
    pub id: String,
    pub modified: DateTime<Utc>,
}

/// One related entity attached to a film work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedAttachment {
    /// Role exactly as stored in the bridge relation.
    pub role: String,
    pub entity_id: String,
    pub entity_name: String,
}

impl RelatedAttachment {
    /// Parsed role, `None` when the bridge carries an unknown role.
    #[must_use]
    pub fn parsed_role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Denormalized join output.
///
/// A film work with N attachments yields N rows sharing the same scalar
/// fields; a film work with none yields one row whose `attachment` is `None`.
/// Only fields that reach the document are carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub film_work_id: String,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub film_type: String,
    pub attachment: Option<RelatedAttachment>,
}
