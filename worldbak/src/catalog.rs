//! Per-run view of the backups already in the store.
//!
//! Rebuilt from a full bucket listing at the start of every run and never
//! persisted: the bucket itself is the index.

use std::collections::BTreeMap;

use crate::artifact::{ArtifactKey, BackupArtifact, has_archive_extension};
use crate::error::BackupError;
use crate::store::{ObjectEntry, ObjectStore};

/// Artifacts grouped by world. Each group is kept sorted by
/// `(last_modified, key)`, oldest first.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    by_world: BTreeMap<String, Vec<BackupArtifact>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw listing entries, keeping only archives whose key can be
    /// attributed to a world.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ObjectEntry>,
    {
        let mut catalog = Self::new();
        for entry in entries {
            if has_archive_extension(&entry.key) {
                catalog.insert(BackupArtifact::new(entry.key, entry.last_modified));
            }
        }
        catalog
    }

    /// Add an artifact under the world its key names. Returns `false` when
    /// the key does not follow the artifact naming scheme.
    pub fn insert(&mut self, artifact: BackupArtifact) -> bool {
        let Some(parsed) = ArtifactKey::parse(&artifact.key) else {
            tracing::warn!("Ignoring archive {} not named like a backup", artifact.key);
            return false;
        };
        let artifacts = self.by_world.entry(parsed.world().to_string()).or_default();
        let at = artifacts.partition_point(|a| {
            (a.last_modified, a.key.as_str()) <= (artifact.last_modified, artifact.key.as_str())
        });
        artifacts.insert(at, artifact);
        true
    }

    pub fn remove(&mut self, world: &str, key: &str) -> Option<BackupArtifact> {
        let artifacts = self.by_world.get_mut(world)?;
        let idx = artifacts.iter().position(|a| a.key == key)?;
        let removed = artifacts.remove(idx);
        if artifacts.is_empty() {
            self.by_world.remove(world);
        }
        Some(removed)
    }

    /// Artifacts of `world`, oldest first. Empty for unknown worlds.
    pub fn artifacts(&self, world: &str) -> &[BackupArtifact] {
        self.by_world.get(world).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, world: &str) -> Option<&BackupArtifact> {
        self.artifacts(world).last()
    }

    pub fn worlds(&self) -> impl Iterator<Item = &str> {
        self.by_world.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BackupArtifact)> {
        self.by_world
            .iter()
            .flat_map(|(world, artifacts)| artifacts.iter().map(move |a| (world.as_str(), a)))
    }

    pub fn len(&self) -> usize {
        self.by_world.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_world.is_empty()
    }
}

/// List `bucket` and build the catalog. A failed listing is fatal for the
/// run: without it no world can be judged.
pub async fn list_backups(store: &dyn ObjectStore, bucket: &str) -> Result<Catalog, BackupError> {
    let entries = store
        .list(bucket)
        .await
        .map_err(|source| BackupError::Catalog {
            bucket: bucket.to_string(),
            source,
        })?;
    let listed = entries.len();
    let catalog = Catalog::from_entries(entries);
    tracing::info!(
        "Found {} backups of {} worlds among {listed} objects in {bucket}",
        catalog.len(),
        catalog.by_world.len()
    );
    Ok(catalog)
}
