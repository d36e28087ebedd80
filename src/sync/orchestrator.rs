//! Per-stream pipeline driver.
//!
//! Every stream runs the same loop: extract a batch of changed rows from its
//! relation, turn it into film work ids (directly for the root stream,
//! through the bridge relation for persons and genres), merge, transform,
//! load, and only then advance the watermark to the batch's last revision.
//!
//! ```text
//! film_work: Idle → Extracting → Merging → Transforming → Loading → Checkpointing → Idle
//! person:    Idle → Extracting → Propagating ⇄ (Merging → Transforming → Loading) → Checkpointing → Idle
//! ```
//!
//! A crash anywhere before `Checkpointing` leaves the watermark where it was,
//! so the batch is replayed on restart. Replays are harmless because loads
//! replace documents by id.

use std::collections::BTreeMap;
use std::fmt;
use std::future::ready;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::model::{RevisionedRow, StreamKind};
use crate::retry::{retry_with_backoff, Backoff};
use crate::sink::{IndexSchema, IndexWriter, SearchSink};
use crate::source::{AffectedRoots, BatchCursor, MergeCursor, SourceStore};
use crate::sync::checkpoint::CheckpointStore;
use crate::sync::transform::DocumentBuilder;

// ── Phases ───────────────────────────────────────────────────

/// Stage a stream is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    Idle,
    Extracting,
    Propagating,
    Merging,
    Transforming,
    Loading,
    Checkpointing,
}

impl StreamPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Propagating => "propagating",
            Self::Merging => "merging",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Checkpointing => "checkpointing",
        }
    }

    /// Whether `self → to` is a legal step for a stream.
    ///
    /// `related` selects the related-entity shape, where propagation sits
    /// between extraction and merging and is re-entered after every load
    /// until the affected roots are drained. Falling back to `Idle` is
    /// always allowed; it is how a drained or aborted pass ends.
    #[must_use]
    pub const fn can_transition(self, to: Self, related: bool) -> bool {
        match (self, to) {
            (_, Self::Idle)
            | (Self::Idle, Self::Extracting)
            | (Self::Merging, Self::Transforming)
            | (Self::Transforming, Self::Loading) => true,
            (Self::Extracting | Self::Loading, Self::Propagating)
            | (Self::Propagating, Self::Merging | Self::Checkpointing) => related,
            (Self::Extracting, Self::Merging) | (Self::Loading, Self::Checkpointing) => !related,
            _ => false,
        }
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Options and stats ────────────────────────────────────────

/// Settings shared by every stream.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub index_name: String,
    pub batch_size: usize,
    /// Pause between passes once a stream is drained.
    pub poll_interval: Duration,
    /// Retry policy for locked-database reads.
    pub source_backoff: Backoff,
}

/// Counters for one extractor batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub extracted: usize,
    pub affected_roots: usize,
    pub documents: usize,
    pub skipped_rows: usize,
}

/// Counters for one drain of a stream.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub cycles: usize,
    pub extracted: usize,
    pub affected_roots: usize,
    pub documents: usize,
    pub skipped_rows: usize,
    pub skipped_batches: usize,
    /// Watermark after the pass, if any batch was ever checkpointed.
    pub watermark: Option<DateTime<Utc>>,
    /// True when the pass stopped early on a shutdown request.
    pub interrupted: bool,
}

impl PassStats {
    fn absorb(&mut self, cycle: CycleStats) {
        self.cycles += 1;
        self.extracted += cycle.extracted;
        self.affected_roots += cycle.affected_roots;
        self.documents += cycle.documents;
        self.skipped_rows += cycle.skipped_rows;
    }
}

// ── Stream runner ────────────────────────────────────────────

/// Drives one stream through its phases.
pub struct StreamRunner<'a, S> {
    kind: StreamKind,
    store: &'a SourceStore,
    checkpoints: &'a CheckpointStore,
    writer: &'a IndexWriter<S>,
    options: &'a PipelineOptions,
    shutdown: Option<watch::Receiver<bool>>,
    phase: StreamPhase,
}

impl<'a, S: SearchSink> StreamRunner<'a, S> {
    #[must_use]
    pub fn new(
        kind: StreamKind,
        store: &'a SourceStore,
        checkpoints: &'a CheckpointStore,
        writer: &'a IndexWriter<S>,
        options: &'a PipelineOptions,
    ) -> Self {
        Self {
            kind,
            store,
            checkpoints,
            writer,
            options,
            shutdown: None,
            phase: StreamPhase::Idle,
        }
    }

    /// Stop between cycles once `shutdown` carries `true`.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn enter(&mut self, next: StreamPhase) -> Result<()> {
        if !self.phase.can_transition(next, self.kind.is_related()) {
            return Err(Error::Other(format!(
                "stream {} cannot move from {} to {next}",
                self.kind, self.phase
            )));
        }
        debug!(stream = %self.kind, from = %self.phase, to = %next, "phase");
        self.phase = next;
        Ok(())
    }

    /// Drain the stream from its stored watermark.
    ///
    /// A batch whose rows turn out to be malformed is logged and skipped;
    /// later batches still advance the watermark past it. Any other failure
    /// aborts the pass with the watermark at the last completed batch.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass. Checkpoint errors are fatal
    /// (see [`Error::is_fatal`]); anything else may be retried next pass.
    pub async fn run_pass(&mut self) -> Result<PassStats> {
        let result = self.drain().await;
        if result.is_err() {
            self.phase = StreamPhase::Idle;
        }
        result
    }

    async fn drain(&mut self) -> Result<PassStats> {
        let key = self.kind.checkpoint_key();
        let watermark = self.checkpoints.get(key);
        debug!(stream = %self.kind, watermark = ?watermark, "starting pass");

        let store = self.store;
        let mut cursor = BatchCursor::new(
            store,
            self.kind.relation(),
            watermark,
            self.options.batch_size,
        );
        let mut stats = PassStats::default();

        loop {
            if self.stop_requested() {
                stats.interrupted = true;
                break;
            }

            self.enter(StreamPhase::Extracting)?;
            let batch = retry_with_backoff(
                "extract",
                &self.options.source_backoff,
                Error::is_transient,
                || ready(cursor.next_batch()),
            )
            .await?;

            let Some(rows) = batch else {
                self.enter(StreamPhase::Idle)?;
                break;
            };

            match self.run_cycle(&rows).await {
                Ok(cycle) => stats.absorb(cycle),
                Err(Error::SourceIntegrity { relation, cause }) => {
                    error!(stream = %self.kind, relation = %relation, cause = %cause, rows = rows.len(), "skipping malformed batch");
                    stats.skipped_batches += 1;
                    self.phase = StreamPhase::Idle;
                }
                Err(err) => return Err(err),
            }
        }

        stats.watermark = self.checkpoints.get(key);
        Ok(stats)
    }

    /// Process one extractor batch end to end and checkpoint it.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; the watermark is untouched.
    pub async fn run_cycle(&mut self, rows: &[RevisionedRow]) -> Result<CycleStats> {
        let Some(last) = rows.last() else {
            return Ok(CycleStats::default());
        };
        let mut stats = CycleStats {
            extracted: rows.len(),
            ..CycleStats::default()
        };
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();

        if let Some(bridge) = self.kind.bridge() {
            let store = self.store;
            let mut roots = AffectedRoots::new(store, bridge, ids, self.options.batch_size);
            loop {
                self.enter(StreamPhase::Propagating)?;
                let batch = retry_with_backoff(
                    "propagate",
                    &self.options.source_backoff,
                    Error::is_transient,
                    || ready(roots.next_batch()),
                )
                .await?;
                let Some(root_ids) = batch else { break };

                stats.affected_roots += root_ids.len();
                self.load_roots(root_ids, &mut stats).await?;
            }
        } else {
            stats.affected_roots = ids.len();
            self.load_roots(ids, &mut stats).await?;
        }

        self.enter(StreamPhase::Checkpointing)?;
        self.checkpoints.set(self.kind.checkpoint_key(), last.modified)?;
        self.enter(StreamPhase::Idle)?;

        debug!(
            stream = %self.kind,
            watermark = %last.modified,
            extracted = stats.extracted,
            documents = stats.documents,
            "cycle complete"
        );
        Ok(stats)
    }

    /// Merge, transform and load one group of film work ids.
    async fn load_roots(&mut self, root_ids: Vec<String>, stats: &mut CycleStats) -> Result<()> {
        self.enter(StreamPhase::Merging)?;
        let store = self.store;
        let mut merge = MergeCursor::new(store, root_ids, self.options.batch_size);
        let mut builder = DocumentBuilder::new();
        loop {
            let batch = retry_with_backoff(
                "merge",
                &self.options.source_backoff,
                Error::is_transient,
                || ready(merge.next_batch()),
            )
            .await?;
            let Some(rows) = batch else { break };
            builder.apply_batch(&rows);
        }

        self.enter(StreamPhase::Transforming)?;
        stats.skipped_rows += builder.skipped_rows();
        let docs: Vec<_> = builder.finish().into_values().collect();

        self.enter(StreamPhase::Loading)?;
        stats.documents += self.writer.write(&self.options.index_name, &docs).await?;
        Ok(())
    }
}

// ── Orchestrator ─────────────────────────────────────────────

/// Runs every stream against one source, checkpoint store, and sink.
pub struct Orchestrator<'a, S> {
    store: &'a SourceStore,
    checkpoints: &'a CheckpointStore,
    writer: &'a IndexWriter<S>,
    options: &'a PipelineOptions,
}

impl<'a, S: SearchSink> Orchestrator<'a, S> {
    #[must_use]
    pub fn new(
        store: &'a SourceStore,
        checkpoints: &'a CheckpointStore,
        writer: &'a IndexWriter<S>,
        options: &'a PipelineOptions,
    ) -> Self {
        Self {
            store,
            checkpoints,
            writer,
            options,
        }
    }

    fn runner(&self, kind: StreamKind) -> StreamRunner<'a, S> {
        StreamRunner::new(kind, self.store, self.checkpoints, self.writer, self.options)
    }

    /// Create the target index unless it exists.
    ///
    /// # Errors
    ///
    /// Returns the sink error once retries are exhausted.
    pub async fn ensure_schema(&self) -> Result<bool> {
        self.writer
            .ensure_schema(&self.options.index_name, &IndexSchema::movies())
            .await
    }

    /// One pass of every stream, concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first stream error; the other streams are dropped at
    /// their current await point, which is always before a checkpoint write.
    pub async fn run_once(&self) -> Result<BTreeMap<StreamKind, PassStats>> {
        self.ensure_schema().await?;

        let (genre, person, film_work) = tokio::try_join!(
            self.single_pass(StreamKind::Genre),
            self.single_pass(StreamKind::Person),
            self.single_pass(StreamKind::FilmWork),
        )?;

        Ok(BTreeMap::from([
            (StreamKind::Genre, genre),
            (StreamKind::Person, person),
            (StreamKind::FilmWork, film_work),
        ]))
    }

    async fn single_pass(&self, kind: StreamKind) -> Result<PassStats> {
        let stats = self.runner(kind).run_pass().await?;
        log_pass(kind, &stats);
        Ok(stats)
    }

    /// Run every stream until `shutdown` flips to `true`.
    ///
    /// Non-fatal pass failures are logged and retried after the poll
    /// interval. A checkpoint failure stops everything.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped a stream, or the startup schema
    /// error.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.ensure_schema().await?;
        info!(
            index = %self.options.index_name,
            batch_size = self.options.batch_size,
            poll_secs = self.options.poll_interval.as_secs(),
            "sync started"
        );

        tokio::try_join!(
            self.stream_loop(StreamKind::Genre, shutdown.clone()),
            self.stream_loop(StreamKind::Person, shutdown.clone()),
            self.stream_loop(StreamKind::FilmWork, shutdown),
        )?;

        info!("sync stopped");
        Ok(())
    }

    async fn stream_loop(&self, kind: StreamKind, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut runner = self.runner(kind).with_shutdown(shutdown.clone());

        loop {
            if *shutdown.borrow() {
                break;
            }

            match runner.run_pass().await {
                Ok(stats) => log_pass(kind, &stats),
                Err(err) if err.is_fatal() => {
                    error!(stream = %kind, error = %err, "fatal error, stopping");
                    return Err(err);
                }
                Err(err) => {
                    warn!(stream = %kind, error = %err, code = err.error_code().as_str(), "pass aborted, will retry");
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.options.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can ask us to stop any more.
                        break;
                    }
                }
            }
        }

        debug!(stream = %kind, "stream stopped");
        Ok(())
    }
}

fn log_pass(kind: StreamKind, stats: &PassStats) {
    if stats.cycles == 0 && stats.skipped_batches == 0 {
        debug!(stream = %kind, "nothing to sync");
        return;
    }
    info!(
        stream = %kind,
        cycles = stats.cycles,
        extracted = stats.extracted,
        affected_roots = stats.affected_roots,
        documents = stats.documents,
        skipped_batches = stats.skipped_batches,
        watermark = ?stats.watermark,
        "pass complete"
    );
}
