use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Failure kinds of a backup run.
///
/// Only [`BackupError::Config`] and [`BackupError::Catalog`] may end a run;
/// everything else is scoped to one world and is reported, then skipped.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("failed to list objects in bucket {bucket}: {source}")]
    Catalog {
        bucket: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to access world data {world} at {}: {source}", path.display())]
    LocalAccess {
        world: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to upload {key} for world {world} to bucket {bucket}: {source}")]
    Upload {
        world: String,
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to delete old backup {key} of world {world} in bucket {bucket}: {source}")]
    Delete {
        world: String,
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl BackupError {
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BackupError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole run rather than a single world.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackupError::Config { .. } | BackupError::Catalog { .. })
    }

    /// The world the failure belongs to, if it is scoped to one.
    pub fn world(&self) -> Option<&str> {
        match self {
            BackupError::LocalAccess { world, .. }
            | BackupError::Upload { world, .. }
            | BackupError::Delete { world, .. } => Some(world),
            BackupError::Config { .. } | BackupError::Catalog { .. } => None,
        }
    }

    /// Short human readable description of the failed operation, used as
    /// the body of user notifications.
    pub fn summary(&self) -> String {
        match self {
            BackupError::Config { path, .. } => {
                format!("Failed to load config {}", path.display())
            }
            BackupError::Catalog { bucket, .. } => {
                format!("Failed to get object list from bucket {bucket}")
            }
            BackupError::LocalAccess { world, .. } => {
                format!("Failed to access world data {world}")
            }
            BackupError::Upload { bucket, key, .. } => {
                format!("Failed to backup world data {key} to bucket {bucket}")
            }
            BackupError::Delete { bucket, key, .. } => {
                format!("Failed to delete old backup {key} on bucket {bucket}")
            }
        }
    }
}
