//! Index settings and mapping for the movies index.

use serde::Serialize;
use serde_json::{json, Value};

/// Name of the custom analyzer used for full-text fields.
pub const ANALYZER: &str = "ru_en";

/// Settings and mappings sent when creating an index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSchema {
    pub settings: Value,
    pub mappings: Value,
}

impl IndexSchema {
    /// Schema for film work documents.
    ///
    /// The mapping is strict: a document carrying a field not listed here
    /// is rejected by the engine instead of silently widening the index.
    #[must_use]
    pub fn movies() -> Self {
        Self {
            settings: analysis_settings(),
            mappings: json!({
                "dynamic": "strict",
                "properties": {
                    "id": { "type": "keyword" },
                    "imdb_rating": { "type": "float" },
                    "type": { "type": "keyword" },
                    "title": {
                        "type": "text",
                        "analyzer": ANALYZER,
                        "fields": { "raw": { "type": "keyword" } }
                    },
                    "description": { "type": "text", "analyzer": ANALYZER },
                    "genre": named_refs(),
                    "directors_names": { "type": "text", "analyzer": ANALYZER },
                    "actors_names": { "type": "text", "analyzer": ANALYZER },
                    "writers_names": { "type": "text", "analyzer": ANALYZER },
                    "directors": named_refs(),
                    "actors": named_refs(),
                    "writers": named_refs()
                }
            }),
        }
    }

    /// Request body for index creation.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({ "settings": self.settings, "mappings": self.mappings })
    }

    /// Top-level field names accepted by the mapping.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.mappings["properties"]
            .as_object()
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn named_refs() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": { "type": "text", "analyzer": ANALYZER }
        }
    })
}

fn analysis_settings() -> Value {
    json!({
        "refresh_interval": "1s",
        "analysis": {
            "filter": {
                "english_stop": { "type": "stop", "stopwords": "_english_" },
                "english_stemmer": { "type": "stemmer", "language": "english" },
                "english_possessive_stemmer": {
                    "type": "stemmer",
                    "language": "possessive_english"
                },
                "russian_stop": { "type": "stop", "stopwords": "_russian_" },
                "russian_stemmer": { "type": "stemmer", "language": "russian" }
            },
            "analyzer": {
                ANALYZER: {
                    "tokenizer": "standard",
                    "filter": [
                        "lowercase",
                        "english_stop",
                        "english_stemmer",
                        "english_possessive_stemmer",
                        "russian_stop",
                        "russian_stemmer"
                    ]
                }
            }
        }
    })
}
