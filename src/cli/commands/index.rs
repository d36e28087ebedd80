//! Index command implementations.

use serde::Serialize;

use crate::cli::IndexCommands;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sink::{ElasticsearchSink, IndexSchema, IndexWriter};
use crate::validate::{validate_index_name, validate_sink_url};

#[derive(Serialize)]
struct EnsureOutput<'a> {
    index: &'a str,
    created: bool,
}

/// Execute index commands.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the sink call fails.
pub fn execute(command: &IndexCommands, config: &SyncConfig, json: bool) -> Result<()> {
    match command {
        IndexCommands::Ensure => ensure(config, json),
        IndexCommands::Schema => schema(),
    }
}

fn ensure(config: &SyncConfig, json: bool) -> Result<()> {
    validate_index_name(&config.index_name).map_err(Error::Config)?;
    validate_sink_url(&config.elastic_url).map_err(Error::Config)?;

    let sink = ElasticsearchSink::new(&config.elastic_url, config.request_timeout())?;
    let writer = IndexWriter::new(sink, config.backoff.clone());

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {e}")))?;
    let created = rt.block_on(writer.ensure_schema(&config.index_name, &IndexSchema::movies()))?;

    if json {
        let output = EnsureOutput {
            index: &config.index_name,
            created,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if created {
        println!("Created index: {}", config.index_name);
    } else {
        println!("Index already exists: {}", config.index_name);
    }
    Ok(())
}

fn schema() -> Result<()> {
    let body = IndexSchema::movies().body();
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
