//! Source streams.
//!
//! Each stream scans one relation by revision and owns one checkpoint key.
//! The film work stream feeds root ids straight into the merger; the person
//! and genre streams first map changed entity ids to affected film works
//! through their bridge relation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The relation holding aggregate roots.
pub const ROOT_RELATION: &str = "film_work";

/// A source stream with its own watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    FilmWork,
    Person,
    Genre,
}

/// Bridge relation linking related entities to film works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bridge {
    /// Bridge table name.
    pub relation: &'static str,
    /// Column referencing the related entity.
    pub entity_column: &'static str,
}

impl StreamKind {
    /// All streams, in the order the orchestrator starts them.
    pub const ALL: [Self; 3] = [Self::Genre, Self::Person, Self::FilmWork];

    /// Relation scanned by this stream's extractor.
    #[must_use]
    pub const fn relation(&self) -> &'static str {
        match self {
            Self::FilmWork => ROOT_RELATION,
            Self::Person => "person",
            Self::Genre => "genre",
        }
    }

    /// Key under which the watermark is persisted.
    #[must_use]
    pub const fn checkpoint_key(&self) -> &'static str {
        self.relation()
    }

    /// Bridge relation for related-entity streams; `None` for the root stream.
    #[must_use]
    pub const fn bridge(&self) -> Option<Bridge> {
        match self {
            Self::FilmWork => None,
            Self::Person => Some(Bridge {
                relation: "person_film_work",
                entity_column: "person_id",
            }),
            Self::Genre => Some(Bridge {
                relation: "genre_film_work",
                entity_column: "genre_id",
            }),
        }
    }

    /// Whether batches must be propagated to root ids before merging.
    #[must_use]
    pub const fn is_related(&self) -> bool {
        self.bridge().is_some()
    }

    /// Look a stream up by its checkpoint key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.checkpoint_key() == key)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.checkpoint_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_keys_are_distinct() {
        let keys: std::collections::HashSet<_> =
            StreamKind::ALL.iter().map(StreamKind::checkpoint_key).collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_only_related_streams_have_bridges() {
        assert!(!StreamKind::FilmWork.is_related());
        assert_eq!(
            StreamKind::Person.bridge().unwrap().relation,
            "person_film_work"
        );
        assert_eq!(StreamKind::Genre.bridge().unwrap().entity_column, "genre_id");
    }

    #[test]
    fn test_from_key() {
        assert_eq!(StreamKind::from_key("person"), Some(StreamKind::Person));
        assert_eq!(StreamKind::from_key("film_work"), Some(StreamKind::FilmWork));
        assert_eq!(StreamKind::from_key("persons"), None);
    }
}
