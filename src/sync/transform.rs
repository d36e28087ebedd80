//! Folding flat merge rows into one document per film work.
//!
//! A `DocumentBuilder` lives for exactly one cycle. It starts a document
//! from the scalar fields of the first row seen for a film work, then
//! applies every row's attachment with a dedup-append rule: an entity id is
//! added to a role's lists at most once, however many times it reappears.

use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::model::{FlatRow, MovieDocument, NamedRef, RelatedAttachment, RelationKind, Role};

/// Per-document accumulation state.
struct Accumulator {
    document: MovieDocument,
    seen: HashSet<(Role, String)>,
}

impl Accumulator {
    fn from_row(row: &FlatRow) -> Self {
        Self {
            document: MovieDocument::new(
                row.film_work_id.clone(),
                row.title.clone(),
                row.description.clone(),
                row.rating,
                row.film_type.clone(),
            ),
            seen: HashSet::new(),
        }
    }

    fn attach(&mut self, role: Role, attachment: &RelatedAttachment) {
        if !self.seen.insert((role, attachment.entity_id.clone())) {
            return;
        }

        let entity = NamedRef {
            id: attachment.entity_id.clone(),
            name: attachment.entity_name.clone(),
        };
        let doc = &mut self.document;

        match role.kind() {
            RelationKind::Tag => doc.genre.push(entity),
            RelationKind::Credit => {
                if let Some((names, refs)) = doc.credit_lists_mut(role) {
                    names.push(entity.name.clone());
                    refs.push(entity);
                }
            }
        }
    }
}

/// Builds the documents of one cycle. Construct a fresh one per cycle.
#[derive(Default)]
pub struct DocumentBuilder {
    documents: BTreeMap<String, Accumulator>,
    skipped_rows: usize,
}

impl DocumentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one flat row into its film work's document.
    pub fn apply(&mut self, row: &FlatRow) {
        let acc = self
            .documents
            .entry(row.film_work_id.clone())
            .or_insert_with(|| Accumulator::from_row(row));

        let Some(attachment) = &row.attachment else {
            return;
        };

        match attachment.parsed_role() {
            Some(role) => acc.attach(role, attachment),
            None => {
                self.skipped_rows += 1;
                tracing::warn!(
                    film_work_id = %row.film_work_id,
                    role = %attachment.role,
                    entity_id = %attachment.entity_id,
                    "skipping attachment with unknown role"
                );
            }
        }
    }

    /// Fold a whole batch.
    pub fn apply_batch(&mut self, rows: &[FlatRow]) {
        for row in rows {
            self.apply(row);
        }
    }

    /// Fold every batch of a merge sequence, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `batches`.
    pub fn apply_all<I>(&mut self, batches: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Vec<FlatRow>>>,
    {
        for batch in batches {
            self.apply_batch(&batch?);
        }
        Ok(())
    }

    /// Number of documents built so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Rows dropped because of an unknown role.
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Finish the cycle, yielding documents keyed by film work id.
    #[must_use]
    pub fn finish(self) -> BTreeMap<String, MovieDocument> {
        self.documents
            .into_iter()
            .map(|(id, acc)| (id, acc.document))
            .collect()
    }
}

/// Build documents from a sequence of flat-row batches.
///
/// # Errors
///
/// Returns the first error produced by `batches`.
pub fn build<I>(batches: I) -> Result<BTreeMap<String, MovieDocument>>
where
    I: IntoIterator<Item = Result<Vec<FlatRow>>>,
{
    let mut builder = DocumentBuilder::new();
    builder.apply_all(batches)?;
    Ok(builder.finish())
}
