//! Incremental synchronization pipeline.
//!
//! This module owns everything between the source and the sink:
//!
//! - **Checkpoints**: durable per-stream watermarks, written atomically
//! - **Transform**: flat merge rows → nested, de-duplicated documents
//! - **Orchestration**: the per-stream phase machine and the daemon loop
//!
//! # Example
//!
//! ```ignore
//! use filmsync::sync::{CheckpointStore, Orchestrator, PipelineOptions};
//!
//! let checkpoints = CheckpointStore::open(&state_path)?;
//! let orchestrator = Orchestrator::new(&source, &checkpoints, &writer, &options);
//! let stats = orchestrator.run_once().await?;
//! ```

pub mod checkpoint;
pub mod file;
pub mod orchestrator;
pub mod transform;

pub use checkpoint::CheckpointStore;
pub use file::{atomic_write, read_optional};
pub use orchestrator::{
    CycleStats, Orchestrator, PassStats, PipelineOptions, StreamPhase, StreamRunner,
};
pub use transform::{build, DocumentBuilder};
