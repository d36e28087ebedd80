//! Command implementations.

pub mod checkpoint;
pub mod index;
pub mod run;
pub mod source;
pub mod version;
