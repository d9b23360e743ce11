//! Object store adapters.
//!
//! Submodules:
//! - `s3`: S3-compatible backend built on `aws-sdk-s3`
//! - `localfs`: a local directory standing in for a bucket
//! - `memory`: in-process store used by tests
//!
//! The backup core only needs three blocking-style calls: list a bucket,
//! upload a file under a key and delete a key.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::{Backend, Config};

pub mod localfs;
pub mod memory;
pub mod s3;

pub use localfs::LocalDirStore;
pub use memory::MemoryStore;
pub use s3::{S3Store, S3StoreConfig};

/// One object as reported by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_modified,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        StoreError::Service {
            operation,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object of `bucket`.
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectEntry>, StoreError>;

    /// Upload the file at `local_path` under `key`.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// Build the store client described by the configuration.
pub async fn from_config(config: &Config) -> Box<dyn ObjectStore> {
    match config.backend {
        Backend::S3 => {
            let store = S3Store::new(S3StoreConfig::from_config(config)).await;
            tracing::debug!("Using S3 store in region {:?}", config.region_name);
            Box::new(store)
        }
        Backend::Local => {
            let root = config.local_store_root();
            tracing::debug!("Using local directory store at {}", root.display());
            Box::new(LocalDirStore::new(root))
        }
    }
}
