//! Incremental batch cursor over one source relation.
//!
//! Rows are emitted in ascending `(revision, id)` order starting at the
//! watermark (inclusive). Pagination is keyset-based, so rows sharing a
//! revision across a batch boundary are neither skipped nor repeated within
//! one scan. A restart from the last row's revision re-emits its ties, which
//! the idempotent load absorbs.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::error::Result;
use crate::model::RevisionedRow;
use crate::source::sqlite::{get_revision, revision_expr, sql_timestamp, SourceStore};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    /// Nothing read yet; `None` scans from the earliest revision.
    From(Option<DateTime<Utc>>),
    /// Strictly after this `(revision, id)` key.
    After(DateTime<Utc>, String),
    Exhausted,
}

/// Lazy, restartable scan of `relation` from a watermark.
pub struct BatchCursor<'a> {
    store: &'a SourceStore,
    relation: &'static str,
    batch_size: usize,
    position: Position,
}

impl<'a> BatchCursor<'a> {
    /// Start a scan. `watermark == None` means "from the beginning".
    #[must_use]
    pub fn new(
        store: &'a SourceStore,
        relation: &'static str,
        watermark: Option<DateTime<Utc>>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            relation,
            batch_size: batch_size.max(1),
            position: Position::From(watermark),
        }
    }

    /// Relation being scanned.
    #[must_use]
    pub fn relation(&self) -> &'static str {
        self.relation
    }

    /// Fetch the next batch, or `None` once the relation is drained.
    ///
    /// The cursor only moves forward when a batch was read successfully, so
    /// a failed call can simply be repeated.
    ///
    /// # Errors
    ///
    /// Returns a classified source error if the query fails.
    pub fn next_batch(&mut self) -> Result<Option<Vec<RevisionedRow>>> {
        let (predicate, mut params) = match &self.position {
            Position::Exhausted => return Ok(None),
            Position::From(None) => (String::new(), Vec::new()),
            Position::From(Some(watermark)) => (
                "AND julianday(modified) >= julianday(?1)".to_string(),
                vec![Value::Text(sql_timestamp(watermark))],
            ),
            Position::After(revision, id) => (
                "AND (julianday(modified), CAST(id AS TEXT)) > (julianday(?1), ?2)".to_string(),
                vec![Value::Text(sql_timestamp(revision)), Value::Text(id.clone())],
            ),
        };
        let limit = i64::try_from(self.batch_size).unwrap_or(i64::MAX);
        params.push(Value::Integer(limit));

        let sql = format!(
            "SELECT CAST(id AS TEXT) AS rid, {revision} AS revision
             FROM {relation}
             WHERE id IS NOT NULL AND julianday(modified) IS NOT NULL {predicate}
             ORDER BY julianday(modified), rid
             LIMIT ?{limit_idx}",
            revision = revision_expr("modified"),
            relation = self.relation,
            limit_idx = params.len(),
        );

        let rows = self.store.read(self.relation, |tx| {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(RevisionedRow {
                        id: row.get(0)?,
                        modified: get_revision(row, 1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        self.position = match rows.last() {
            None => Position::Exhausted,
            Some(_) if rows.len() < self.batch_size => Position::Exhausted,
            Some(last) => Position::After(last.modified, last.id.clone()),
        };

        if rows.is_empty() {
            Ok(None)
        } else {
            tracing::debug!(relation = self.relation, count = rows.len(), "extracted batch");
            Ok(Some(rows))
        }
    }
}

impl Iterator for BatchCursor<'_> {
    type Item = Result<Vec<RevisionedRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
