//! Source command implementations.

use rusqlite::Connection;
use serde::Serialize;

use crate::cli::SourceCommands;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::source::apply_schema;

#[derive(Serialize)]
struct InitOutput {
    path: String,
}

/// Execute source commands.
///
/// # Errors
///
/// Returns an error if the database cannot be created or the DDL fails.
pub fn execute(command: &SourceCommands, config: &SyncConfig, json: bool) -> Result<()> {
    match command {
        SourceCommands::Init { path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => config.source_db()?.to_path_buf(),
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let conn = Connection::open(&path)?;
            apply_schema(&conn)?;

            let path = path.display().to_string();
            if json {
                println!("{}", serde_json::to_string(&InitOutput { path })?);
            } else {
                println!("Initialized source schema: {path}");
            }
            Ok(())
        }
    }
}
