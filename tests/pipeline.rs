//! End-to-end pipeline scenarios against a file-backed catalog and the
//! in-memory sink.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use filmsync::error::{Error, Result};
use filmsync::model::{MovieDocument, StreamKind};
use filmsync::retry::Backoff;
use filmsync::sink::{IndexSchema, IndexWriter, MemorySink, SearchSink};
use filmsync::source::{apply_schema, SourceStore};
use filmsync::sync::{CheckpointStore, Orchestrator, PipelineOptions, StreamRunner};
use rusqlite::Connection;
use tempfile::TempDir;

const INDEX: &str = "movies";

fn catalog(dir: &TempDir) -> Connection {
    let conn = Connection::open(dir.path().join("catalog.db")).unwrap();
    apply_schema(&conn).unwrap();
    conn.execute_batch(
        "INSERT INTO film_work (id, title, description, rating, type, modified) VALUES
            ('a1', 'X', NULL, 7.5, 'movie', '2024-01-01T00:00:00Z'),
            ('a2', 'Night Train', 'A long night', 8.2, 'movie', '2024-01-02T00:00:00Z'),
            ('a3', 'Harbor', NULL, 6.1, 'tv_show', '2024-01-03T00:00:00Z'),
            ('a4', 'Lantern', NULL, NULL, 'movie', '2024-01-04T00:00:00Z'),
            ('a5', 'Quiet Hills', NULL, 5.5, 'movie', '2024-01-05T00:00:00Z');
         INSERT INTO person (id, full_name, modified) VALUES
            ('p1', 'Jane', '2024-01-01T00:00:00Z'),
            ('p2', 'Ivan Petrov', '2024-01-01T00:00:00Z');
         INSERT INTO genre (id, name, modified) VALUES
            ('g1', 'Drama', '2024-01-01T00:00:00Z'),
            ('g2', 'Comedy', '2024-01-01T00:00:00Z');
         INSERT INTO person_film_work (id, film_work_id, person_id, role) VALUES
            ('b1', 'a2', 'p1', 'actor'),
            ('b2', 'a3', 'p1', 'actor'),
            ('b3', 'a3', 'p1', 'director'),
            ('b4', 'a4', 'p2', 'writer'),
            ('b5', 'a5', 'p1', 'actor');
         INSERT INTO genre_film_work (id, film_work_id, genre_id) VALUES
            ('c1', 'a2', 'g1'),
            ('c2', 'a2', 'g2'),
            ('c3', 'a4', 'g1');",
    )
    .unwrap();
    conn
}

fn options(batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        index_name: INDEX.to_string(),
        batch_size,
        poll_interval: Duration::from_millis(10),
        source_backoff: Backoff::immediate(3),
    }
}

fn open_source(dir: &TempDir) -> SourceStore {
    SourceStore::open(&dir.path().join("catalog.db")).unwrap()
}

fn state_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("state.json")
}

/// Sink whose bulk writes fail permanently from call `fail_from` on.
struct BrokenAfter {
    inner: MemorySink,
    fail_from: usize,
    calls: AtomicUsize,
}

impl SearchSink for BrokenAfter {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        self.inner.create_index(index, schema).await
    }

    async fn bulk_index(&self, index: &str, docs: &[MovieDocument]) -> Result<usize> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_from {
            return Err(Error::Sink("HTTP 500 Internal Server Error".into()));
        }
        self.inner.bulk_index(index, docs).await
    }
}

async fn sync_all<S: SearchSink>(
    source: &SourceStore,
    checkpoints: &CheckpointStore,
    writer: &IndexWriter<S>,
    batch_size: usize,
) {
    let opts = options(batch_size);
    Orchestrator::new(source, checkpoints, writer, &opts)
        .run_once()
        .await
        .unwrap();
}

/// Stored documents with relation lists sorted; list order carries no meaning.
fn snapshot(sink: &MemorySink) -> Vec<MovieDocument> {
    sink.ids(INDEX)
        .iter()
        .filter_map(|id| sink.document(INDEX, id))
        .map(|mut doc| {
            for list in [&mut doc.genre, &mut doc.directors, &mut doc.actors, &mut doc.writers] {
                list.sort_by(|a, b| a.id.cmp(&b.id));
            }
            for names in [&mut doc.directors_names, &mut doc.actors_names, &mut doc.writers_names] {
                names.sort();
            }
            doc
        })
        .collect()
}

#[tokio::test]
async fn test_first_run_scans_from_the_beginning() {
    let dir = TempDir::new().unwrap();
    let _conn = catalog(&dir);
    let source = open_source(&dir);
    let checkpoints = CheckpointStore::open(state_path(&dir)).unwrap();
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));

    sync_all(&source, &checkpoints, &writer, 2).await;

    let sink = writer.sink();
    assert_eq!(sink.ids(INDEX), vec!["a1", "a2", "a3", "a4", "a5"]);

    let a1 = sink.document(INDEX, "a1").unwrap();
    assert_eq!(a1.title, "X");
    assert_eq!(a1.imdb_rating, Some(7.5));
    assert!(a1.genre.is_empty() && a1.actors.is_empty() && a1.directors.is_empty());

    let a2 = sink.document(INDEX, "a2").unwrap();
    assert_eq!(a2.actors_names, vec!["Jane"]);
    assert_eq!(a2.genre.len(), 2);

    let a3 = sink.document(INDEX, "a3").unwrap();
    assert_eq!(a3.actors.len(), 1);
    assert_eq!(a3.directors.len(), 1);

    let reopened = CheckpointStore::open(state_path(&dir)).unwrap();
    assert_eq!(
        reopened.get("film_work"),
        Some("2024-01-05T00:00:00Z".parse().unwrap())
    );
    assert!(reopened.get("person").is_some());
    assert!(reopened.get("genre").is_some());
}

#[tokio::test]
async fn test_rename_propagates_without_touching_roots() {
    let dir = TempDir::new().unwrap();
    let conn = catalog(&dir);
    let source = open_source(&dir);
    let checkpoints = CheckpointStore::open(state_path(&dir)).unwrap();
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));
    sync_all(&source, &checkpoints, &writer, 2).await;
    let root_watermark = checkpoints.get("film_work");

    conn.execute(
        "UPDATE person SET full_name = 'Jane Doe', modified = '2024-02-01T00:00:00Z' WHERE id = 'p1'",
        [],
    )
    .unwrap();

    let opts = options(2);
    let stats = StreamRunner::new(StreamKind::Person, &source, &checkpoints, &writer, &opts)
        .run_pass()
        .await
        .unwrap();

    // p2 sits on the inclusive watermark and is re-read with p1.
    assert_eq!(stats.affected_roots, 4);
    for id in ["a2", "a3", "a5"] {
        let doc = writer.sink().document(INDEX, id).unwrap();
        assert!(doc.actors_names.contains(&"Jane Doe".to_string()), "{id}");
        assert!(doc.actors.iter().all(|a| a.name != "Jane"), "{id}");
    }
    assert_eq!(
        writer.sink().document(INDEX, "a3").unwrap().directors_names,
        vec!["Jane Doe"]
    );
    assert_eq!(checkpoints.get("film_work"), root_watermark);
    assert_eq!(
        checkpoints.get("person"),
        Some("2024-02-01T00:00:00Z".parse().unwrap())
    );
}

#[tokio::test]
async fn test_rename_reaches_films_with_unparsable_revision() {
    let dir = TempDir::new().unwrap();
    let conn = catalog(&dir);
    conn.execute_batch(
        "INSERT INTO film_work (id, title, type, modified) VALUES
            ('good', 'Good Dates', 'movie', '2024-01-06T00:00:00Z'),
            ('bad', 'Bad Dates', 'movie', 'not-a-date');
         INSERT INTO person (id, full_name, modified) VALUES
            ('p3', 'Olga', '2024-01-01T00:00:00Z');
         INSERT INTO person_film_work (id, film_work_id, person_id, role) VALUES
            ('b7', 'good', 'p3', 'actor'),
            ('b8', 'bad', 'p3', 'actor');",
    )
    .unwrap();
    let source = open_source(&dir);
    let checkpoints = CheckpointStore::in_memory();
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));
    let opts = options(10);

    conn.execute(
        "UPDATE person SET full_name = 'Olga Ivanova', modified = '2024-02-01T00:00:00Z' WHERE id = 'p3'",
        [],
    )
    .unwrap();
    let stats = StreamRunner::new(StreamKind::Person, &source, &checkpoints, &writer, &opts)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(stats.skipped_batches, 0);
    for id in ["good", "bad"] {
        let doc = writer.sink().document(INDEX, id).unwrap();
        assert_eq!(doc.actors_names, vec!["Olga Ivanova"], "{id}");
    }
    assert_eq!(
        checkpoints.get("person"),
        Some("2024-02-01T00:00:00Z".parse().unwrap())
    );
}

#[tokio::test]
async fn test_genre_change_reindexes_linked_films() {
    let dir = TempDir::new().unwrap();
    let conn = catalog(&dir);
    let source = open_source(&dir);
    let checkpoints = CheckpointStore::open(state_path(&dir)).unwrap();
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));
    sync_all(&source, &checkpoints, &writer, 10).await;

    conn.execute(
        "UPDATE genre SET name = 'Melodrama', modified = '2024-03-01T00:00:00Z' WHERE id = 'g1'",
        [],
    )
    .unwrap();
    sync_all(&source, &checkpoints, &writer, 10).await;

    for id in ["a2", "a4"] {
        let doc = writer.sink().document(INDEX, id).unwrap();
        assert!(doc.genre.iter().any(|g| g.id == "g1" && g.name == "Melodrama"), "{id}");
    }
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let _conn = catalog(&dir);
    let source = open_source(&dir);
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));

    sync_all(&source, &CheckpointStore::in_memory(), &writer, 3).await;
    let first = snapshot(writer.sink());

    // Fresh checkpoints replay everything on top of the same index.
    sync_all(&source, &CheckpointStore::in_memory(), &writer, 3).await;
    assert_eq!(snapshot(writer.sink()), first);
    assert_eq!(writer.sink().count(INDEX), 5);
}

#[tokio::test]
async fn test_interrupted_load_resumes_without_loss() {
    let dir = TempDir::new().unwrap();
    let _conn = catalog(&dir);
    let source = open_source(&dir);

    // Reference: one uninterrupted run.
    let reference = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));
    sync_all(&source, &CheckpointStore::in_memory(), &reference, 2).await;

    // The third bulk write of the root stream fails for good.
    let checkpoints = CheckpointStore::open(state_path(&dir)).unwrap();
    let broken = IndexWriter::new(
        BrokenAfter {
            inner: MemorySink::new(),
            fail_from: 2,
            calls: AtomicUsize::new(0),
        },
        Backoff::immediate(3),
    );
    let opts = options(2);
    let err = StreamRunner::new(StreamKind::FilmWork, &source, &checkpoints, &broken, &opts)
        .run_pass()
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(broken.sink().inner.count(INDEX), 4);
    assert_eq!(
        checkpoints.get("film_work"),
        Some("2024-01-04T00:00:00Z".parse().unwrap())
    );
    drop(checkpoints);

    // Restart from the persisted watermark with a healthy sink that
    // already holds what the broken run managed to write.
    let checkpoints = CheckpointStore::open(state_path(&dir)).unwrap();
    let healthy = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));
    let partial: Vec<MovieDocument> = broken
        .sink()
        .inner
        .ids(INDEX)
        .iter()
        .filter_map(|id| broken.sink().inner.document(INDEX, id))
        .collect();
    healthy.write(INDEX, &partial).await.unwrap();

    sync_all(&source, &checkpoints, &healthy, 2).await;
    assert_eq!(snapshot(healthy.sink()), snapshot(reference.sink()));
}

#[tokio::test]
async fn test_ties_across_batches_are_not_skipped() {
    let dir = TempDir::new().unwrap();
    let conn = catalog(&dir);
    conn.execute_batch(
        "INSERT INTO film_work (id, title, type, modified) VALUES
            ('t1', 'Tie One', 'movie', '2024-06-01T00:00:00Z'),
            ('t2', 'Tie Two', 'movie', '2024-06-01T00:00:00Z'),
            ('t3', 'Tie Three', 'movie', '2024-06-01T00:00:00Z');",
    )
    .unwrap();
    let source = open_source(&dir);
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));

    sync_all(&source, &CheckpointStore::in_memory(), &writer, 2).await;

    for id in ["t1", "t2", "t3"] {
        assert!(writer.sink().get(INDEX, id).is_some(), "{id}");
    }
}

#[tokio::test]
async fn test_unknown_role_keeps_rest_of_document() {
    let dir = TempDir::new().unwrap();
    let conn = catalog(&dir);
    conn.execute(
        "INSERT INTO person_film_work (id, film_work_id, person_id, role) VALUES ('b9', 'a4', 'p1', 'composer')",
        [],
    )
    .unwrap();
    let source = open_source(&dir);
    let writer = IndexWriter::new(MemorySink::new(), Backoff::immediate(3));

    sync_all(&source, &CheckpointStore::in_memory(), &writer, 10).await;

    let a4 = writer.sink().document(INDEX, "a4").unwrap();
    assert_eq!(a4.writers_names, vec!["Ivan Petrov"]);
    assert!(a4.actors.is_empty());
}

#[test]
fn test_source_is_opened_read_only() {
    let dir = TempDir::new().unwrap();
    let _conn = catalog(&dir);
    let source = open_source(&dir);
    let err = source
        .conn()
        .execute("DELETE FROM film_work", [])
        .unwrap_err();
    assert!(err.to_string().contains("readonly") || err.to_string().contains("read-only"));
    assert!(Path::new(&dir.path().join("catalog.db")).exists());
}
