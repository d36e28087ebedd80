//! Change propagation from related entities to film works.
//!
//! When a person or genre changes, every film work linked to it through the
//! bridge relation must be re-indexed even though the film work's own
//! revision is untouched.

use rusqlite::types::Value;

use crate::error::Result;
use crate::model::stream::{Bridge, ROOT_RELATION};
use crate::source::sqlite::SourceStore;

/// Lazy sequence of batches of affected film work ids.
///
/// Ids are paged by keyset on the film work id, so each affected film work
/// appears exactly once per scan regardless of how many of the changed
/// entities it references.
pub struct AffectedRoots<'a> {
    store: &'a SourceStore,
    bridge: Bridge,
    entity_ids: Vec<String>,
    batch_size: usize,
    after: Option<String>,
    exhausted: bool,
}

impl<'a> AffectedRoots<'a> {
    #[must_use]
    pub fn new(
        store: &'a SourceStore,
        bridge: Bridge,
        entity_ids: Vec<String>,
        batch_size: usize,
    ) -> Self {
        let exhausted = entity_ids.is_empty();
        Self {
            store,
            bridge,
            entity_ids,
            batch_size: batch_size.max(1),
            after: None,
            exhausted,
        }
    }

    /// Fetch the next batch of film work ids, or `None` when done.
    ///
    /// # Errors
    ///
    /// Returns a classified source error if the query fails.
    pub fn next_batch(&mut self) -> Result<Option<Vec<String>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut params: Vec<Value> = self
            .entity_ids
            .iter()
            .map(|id| Value::Text(id.clone()))
            .collect();
        let placeholders = placeholders(1, params.len());

        let keyset = match &self.after {
            Some(after) => {
                params.push(Value::Text(after.clone()));
                format!("AND CAST(fw.id AS TEXT) > ?{}", params.len())
            }
            None => String::new(),
        };
        params.push(Value::Integer(
            i64::try_from(self.batch_size).unwrap_or(i64::MAX),
        ));

        let sql = format!(
            "SELECT DISTINCT CAST(fw.id AS TEXT) AS rid
             FROM {root} fw
             JOIN {bridge} b ON b.film_work_id = fw.id
             WHERE b.{column} IN ({placeholders}) {keyset}
             ORDER BY rid
             LIMIT ?{limit_idx}",
            root = ROOT_RELATION,
            bridge = self.bridge.relation,
            column = self.bridge.entity_column,
            limit_idx = params.len(),
        );

        let ids = self.store.read(self.bridge.relation, |tx| {
            let mut stmt = tx.prepare(&sql)?;
            let ids = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })?;

        if ids.len() < self.batch_size {
            self.exhausted = true;
        }
        self.after = ids.last().cloned();

        if ids.is_empty() {
            self.exhausted = true;
            Ok(None)
        } else {
            tracing::debug!(
                bridge = self.bridge.relation,
                changed = self.entity_ids.len(),
                affected = ids.len(),
                "propagated changes"
            );
            Ok(Some(ids))
        }
    }
}

impl Iterator for AffectedRoots<'_> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

/// `?start, ?start+1, ...` for `count` numbered parameters.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
