//! Denormalizing join of film works with their people and genres.
//!
//! For each chunk of film work ids, one query emits a row per
//! (film work, related entity, role) and a single all-null row for film works
//! without any attachment. All rows of a film work land in the same batch.

use rusqlite::types::Value;

use crate::error::Result;
use crate::model::stream::ROOT_RELATION;
use crate::model::{FlatRow, RelatedAttachment};
use crate::source::enrich::placeholders;
use crate::source::sqlite::SourceStore;

/// Lazy sequence of flat-row batches for a set of film work ids.
pub struct MergeCursor<'a> {
    store: &'a SourceStore,
    root_ids: Vec<String>,
    batch_size: usize,
    offset: usize,
}

impl<'a> MergeCursor<'a> {
    #[must_use]
    pub fn new(store: &'a SourceStore, root_ids: Vec<String>, batch_size: usize) -> Self {
        Self {
            store,
            root_ids,
            batch_size: batch_size.max(1),
            offset: 0,
        }
    }

    /// Join the next chunk of film works, or `None` once every id is merged.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceIntegrity` when a row cannot be decoded, or
    /// another classified source error if the query fails.
    pub fn next_batch(&mut self) -> Result<Option<Vec<FlatRow>>> {
        if self.offset >= self.root_ids.len() {
            return Ok(None);
        }
        let end = (self.offset + self.batch_size).min(self.root_ids.len());
        let chunk = &self.root_ids[self.offset..end];

        let sql = merge_sql(chunk.len());
        let params: Vec<Value> = chunk.iter().map(|id| Value::Text(id.clone())).collect();

        let rows = self.store.read(ROOT_RELATION, |tx| {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), decode_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        tracing::debug!(roots = chunk.len(), rows = rows.len(), "merged batch");
        self.offset = end;
        Ok(Some(rows))
    }
}

impl Iterator for MergeCursor<'_> {
    type Item = Result<Vec<FlatRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

fn merge_sql(id_count: usize) -> String {
    let ids = placeholders(1, id_count);
    let scalars = "CAST(fw.id AS TEXT), fw.title, fw.description, fw.rating, fw.type";

    format!(
        "SELECT {scalars}, pfw.role, CAST(p.id AS TEXT), p.full_name
         FROM film_work fw
         JOIN person_film_work pfw ON pfw.film_work_id = fw.id
         JOIN person p ON p.id = pfw.person_id
         WHERE fw.id IN ({ids})
         UNION ALL
         SELECT {scalars}, 'genre', CAST(g.id AS TEXT), g.name
         FROM film_work fw
         JOIN genre_film_work gfw ON gfw.film_work_id = fw.id
         JOIN genre g ON g.id = gfw.genre_id
         WHERE fw.id IN ({ids})
         UNION ALL
         SELECT {scalars}, NULL, NULL, NULL
         FROM film_work fw
         WHERE fw.id IN ({ids})
           AND NOT EXISTS (
               SELECT 1 FROM person_film_work pfw
               JOIN person p ON p.id = pfw.person_id
               WHERE pfw.film_work_id = fw.id)
           AND NOT EXISTS (
               SELECT 1 FROM genre_film_work gfw
               JOIN genre g ON g.id = gfw.genre_id
               WHERE gfw.film_work_id = fw.id)"
    )
}

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FlatRow> {
    let entity_id: Option<String> = row.get(6)?;
    let attachment = match entity_id {
        Some(entity_id) => Some(RelatedAttachment {
            role: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            entity_id,
            entity_name: row.get(7)?,
        }),
        None => None,
    };

    Ok(FlatRow {
        film_work_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        rating: row.get(3)?,
        film_type: row.get(4)?,
        attachment,
    })
}
