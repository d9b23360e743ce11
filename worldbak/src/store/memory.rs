//! In-process object store.
//!
//! Keeps objects in a map and records every upload and delete so tests can
//! assert on the calls a run made. Failures can be injected per key, and for
//! listings.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ObjectEntry, ObjectStore, StoreError};

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, DateTime<Utc>>>,
    uploads: Vec<(String, String)>,
    uploaded_paths: Vec<std::path::PathBuf>,
    deletes: Vec<(String, String)>,
    failing_keys: HashSet<String>,
    failing_prefixes: Vec<String>,
    fail_listing: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // a panicking test thread must not hide the recorded calls
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an object without recording an upload.
    pub fn insert(&self, bucket: &str, key: &str, last_modified: DateTime<Utc>) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), last_modified);
    }

    /// Create an empty bucket.
    pub fn create_bucket(&self, bucket: &str) {
        self.state().buckets.entry(bucket.to_string()).or_default();
    }

    /// Make uploads and deletes of exactly `key` fail.
    pub fn fail_key(&self, key: &str) {
        self.state().failing_keys.insert(key.to_string());
    }

    /// Make uploads of any key starting with `prefix` fail. Useful when the
    /// key embeds the current time.
    pub fn fail_uploads_with_prefix(&self, prefix: &str) {
        self.state().failing_prefixes.push(prefix.to_string());
    }

    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys of successful uploads, in call order.
    pub fn uploaded(&self) -> Vec<String> {
        self.state().uploads.iter().map(|(_, k)| k.clone()).collect()
    }

    /// Local files handed to `upload`, successful or not.
    pub fn uploaded_paths(&self) -> Vec<std::path::PathBuf> {
        self.state().uploaded_paths.clone()
    }

    /// Keys of successful deletes, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.state().deletes.iter().map(|(_, k)| k.clone()).collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let state = self.state();
        if state.fail_listing {
            return Err(StoreError::service("list", "injected failure"));
        }
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| StoreError::service("list", format!("NoSuchBucket: {bucket}")))?;
        Ok(objects
            .iter()
            .map(|(key, modified)| ObjectEntry::new(key.clone(), *modified))
            .collect())
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.uploaded_paths.push(local_path.to_path_buf());
        if state.failing_keys.contains(key)
            || state
                .failing_prefixes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
        {
            return Err(StoreError::service("upload", "injected failure"));
        }
        // the file must exist at upload time
        std::fs::metadata(local_path)?;
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), Utc::now());
        state.uploads.push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failing_keys.contains(key) {
            return Err(StoreError::service("delete", "injected failure"));
        }
        if let Some(objects) = state.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        state.deletes.push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}
