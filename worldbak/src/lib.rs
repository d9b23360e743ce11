pub mod archive;
pub mod args;
pub mod artifact;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod pruner;
pub mod staleness;
pub mod store;

pub use error::BackupError;
