//! Checkpoint command implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::cli::CheckpointCommands;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::model::StreamKind;
use crate::sync::CheckpointStore;
use crate::validate::normalize_stream;

#[derive(Serialize)]
struct ShowOutput {
    path: String,
    checkpoints: BTreeMap<&'static str, Option<DateTime<Utc>>>,
}

#[derive(Serialize)]
struct ResetOutput {
    reset: Vec<String>,
}

/// Execute checkpoint commands.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written, or the stream
/// name is unknown.
pub fn execute(command: &CheckpointCommands, config: &SyncConfig, json: bool) -> Result<()> {
    let path = config.state_path()?;
    let store = CheckpointStore::open(&path)?;

    match command {
        CheckpointCommands::Show => show(&store, json),
        CheckpointCommands::Reset { stream, all } => reset(&store, stream.as_deref(), *all, json),
    }
}

fn show(store: &CheckpointStore, json: bool) -> Result<()> {
    let path = store
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let checkpoints: BTreeMap<&'static str, Option<DateTime<Utc>>> = StreamKind::ALL
        .iter()
        .map(|kind| (kind.checkpoint_key(), store.get(kind.checkpoint_key())))
        .collect();

    if json {
        let output = ShowOutput { path, checkpoints };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Checkpoints ({}):", path.dimmed());
    for (key, watermark) in &checkpoints {
        match watermark {
            Some(ts) => println!("  {:<10} {}", key.bold(), ts.to_rfc3339()),
            None => println!("  {:<10} {}", key.bold(), "none (full scan)".yellow()),
        }
    }
    Ok(())
}

fn reset(store: &CheckpointStore, stream: Option<&str>, all: bool, json: bool) -> Result<()> {
    let reset: Vec<String> = if all {
        let keys: Vec<String> = store.all().into_keys().collect();
        store.clear_all()?;
        keys
    } else {
        let input = stream
            .ok_or_else(|| Error::InvalidArgument("Name a stream or pass --all".to_string()))?;
        let kind = normalize_stream(input).map_err(|(input, suggestion)| {
            Error::InvalidArgument(match suggestion {
                Some(s) => format!("Unknown stream '{input}'. Did you mean '{s}'?"),
                None => format!("Unknown stream '{input}' (expected film_work, person or genre)"),
            })
        })?;
        if store.clear(kind.checkpoint_key())? {
            vec![kind.checkpoint_key().to_string()]
        } else {
            Vec::new()
        }
    };

    if json {
        println!("{}", serde_json::to_string(&ResetOutput { reset })?);
    } else if reset.is_empty() {
        println!("Nothing to reset.");
    } else {
        println!("Reset: {}", reset.join(", ").green());
    }
    Ok(())
}
