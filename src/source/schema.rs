//! Source schema definitions.
//!
//! Mirrors the catalog's relational layout: three entity relations, each with
//! a `modified` revision column, and two many-to-many bridges. Timestamps are
//! stored as ISO-8601 TEXT.

use rusqlite::{Connection, Result};

/// The SQL schema of the catalog source.
pub const SOURCE_SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS film_work (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    creation_date TEXT,
    rating REAL,
    type TEXT NOT NULL,
    created TEXT,
    modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_film_work_modified ON film_work(modified);

CREATE TABLE IF NOT EXISTS person (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    created TEXT,
    modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_person_modified ON person(modified);

CREATE TABLE IF NOT EXISTS genre (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created TEXT,
    modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_genre_modified ON genre(modified);

CREATE TABLE IF NOT EXISTS person_film_work (
    id TEXT PRIMARY KEY,
    film_work_id TEXT NOT NULL REFERENCES film_work(id) ON DELETE CASCADE,
    person_id TEXT NOT NULL REFERENCES person(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    created TEXT,
    UNIQUE (film_work_id, person_id, role)
);

CREATE INDEX IF NOT EXISTS idx_person_film_work_person ON person_film_work(person_id);

CREATE TABLE IF NOT EXISTS genre_film_work (
    id TEXT PRIMARY KEY,
    film_work_id TEXT NOT NULL REFERENCES film_work(id) ON DELETE CASCADE,
    genre_id TEXT NOT NULL REFERENCES genre(id) ON DELETE CASCADE,
    created TEXT,
    UNIQUE (film_work_id, genre_id)
);

CREATE INDEX IF NOT EXISTS idx_genre_film_work_genre ON genre_film_work(genre_id);
";

/// Create the source relations if they do not exist.
///
/// # Errors
///
/// Returns an error if the DDL cannot be executed.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SOURCE_SCHEMA_SQL)
}
