//! Run command implementation.

use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::StreamKind;
use crate::sink::{ElasticsearchSink, IndexWriter, MemorySink, SearchSink};
use crate::source::SourceStore;
use crate::sync::{CheckpointStore, Orchestrator, PassStats};

#[derive(Serialize)]
struct RunOutput<'a> {
    dry_run: bool,
    index: &'a str,
    streams: BTreeMap<&'static str, PassStats>,
}

/// Execute the run command.
///
/// `--dry-run` drains every stream once into an in-memory sink, starting
/// from a detached copy of the stored watermarks.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a resource cannot be
/// opened, or a stream stops on a fatal error.
pub fn execute(config: &SyncConfig, once: bool, dry_run: bool, json: bool) -> Result<()> {
    config.validate()?;

    let source = SourceStore::open_with_timeout(config.source_db()?, config.source_busy_timeout_ms)?;
    let state_path = config.state_path()?;
    let checkpoints = CheckpointStore::open(&state_path)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {e}")))?;

    if dry_run {
        let checkpoints = checkpoints.detached();
        let writer = IndexWriter::new(MemorySink::new(), config.backoff.clone());
        let stats = rt.block_on(run_once(config, &source, &checkpoints, &writer))?;
        return print_stats(config, &stats, true, json);
    }

    let sink = ElasticsearchSink::new(&config.elastic_url, config.request_timeout())?;
    let writer = IndexWriter::new(sink, config.backoff.clone());
    info!(
        source = %config.source_db()?.display(),
        sink = %config.elastic_url,
        state = %state_path.display(),
        "starting"
    );

    if once {
        let stats = rt.block_on(run_once(config, &source, &checkpoints, &writer))?;
        return print_stats(config, &stats, false, json);
    }

    rt.block_on(async {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, finishing current cycle");
                let _ = tx.send(true);
            }
        });

        let options = config.pipeline_options();
        Orchestrator::new(&source, &checkpoints, &writer, &options)
            .run(rx)
            .await
    })
}

async fn run_once<S: SearchSink>(
    config: &SyncConfig,
    source: &SourceStore,
    checkpoints: &CheckpointStore,
    writer: &IndexWriter<S>,
) -> Result<BTreeMap<StreamKind, PassStats>> {
    let options = config.pipeline_options();
    Orchestrator::new(source, checkpoints, writer, &options)
        .run_once()
        .await
}

fn print_stats(
    config: &SyncConfig,
    stats: &BTreeMap<StreamKind, PassStats>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    if json {
        let output = RunOutput {
            dry_run,
            index: &config.index_name,
            streams: stats
                .iter()
                .map(|(kind, pass)| (kind.checkpoint_key(), pass.clone()))
                .collect(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let heading = if dry_run { "Dry run" } else { "Sync pass" };
    println!("{} → {}", heading.bold(), config.index_name.cyan());
    for (kind, pass) in stats {
        let watermark = pass
            .watermark
            .map_or_else(|| "none".to_string(), |ts| ts.to_rfc3339());
        println!(
            "  {:<10} {} rows, {} roots, {} documents  {}",
            kind.checkpoint_key().bold(),
            pass.extracted,
            pass.affected_roots,
            pass.documents.to_string().green(),
            format!("watermark {watermark}").dimmed()
        );
        if pass.skipped_batches > 0 {
            println!(
                "  {:<10} {}",
                "",
                format!("{} malformed batch(es) skipped", pass.skipped_batches).yellow()
            );
        }
    }
    Ok(())
}
