//! Sink-side document.
//!
//! Documents are rebuilt from scratch every cycle and replace any prior
//! version stored under the same id.

use serde::{Deserialize, Serialize};

use super::role::Role;

/// Structured reference to a related entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

/// A film work as indexed in the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDocument {
    pub id: String,
    pub imdb_rating: Option<f64>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub film_type: String,
    pub genre: Vec<NamedRef>,
    pub directors_names: Vec<String>,
    pub directors: Vec<NamedRef>,
    pub actors_names: Vec<String>,
    pub actors: Vec<NamedRef>,
    pub writers_names: Vec<String>,
    pub writers: Vec<NamedRef>,
}

impl MovieDocument {
    /// Document with scalar fields set and every relation list empty.
    #[must_use]
    pub fn new(
        id: String,
        title: String,
        description: Option<String>,
        imdb_rating: Option<f64>,
        film_type: String,
    ) -> Self {
        Self {
            id,
            imdb_rating,
            title,
            description,
            film_type,
            genre: Vec::new(),
            directors_names: Vec::new(),
            directors: Vec::new(),
            actors_names: Vec::new(),
            actors: Vec::new(),
            writers_names: Vec::new(),
            writers: Vec::new(),
        }
    }

    /// Name list and structured list filled by a credit role.
    pub fn credit_lists_mut(
        &mut self,
        role: Role,
    ) -> Option<(&mut Vec<String>, &mut Vec<NamedRef>)> {
        match role {
            Role::Director => Some((&mut self.directors_names, &mut self.directors)),
            Role::Actor => Some((&mut self.actors_names, &mut self.actors)),
            Role::Writer => Some((&mut self.writers_names, &mut self.writers)),
            Role::Genre => None,
        }
    }
}
