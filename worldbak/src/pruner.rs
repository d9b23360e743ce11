use crate::artifact::BackupArtifact;
use crate::catalog::Catalog;
use crate::error::BackupError;
use crate::store::ObjectStore;

/// Result of pruning one world.
#[derive(Debug, Default)]
pub struct PruneOutcome {
    /// Keys deleted from the store, oldest first.
    pub deleted: Vec<String>,
    pub failures: Vec<BackupError>,
}

/// Artifacts of `world` beyond the newest `generation`, oldest first.
///
/// Artifacts are ordered by `(last_modified, key)` so equal timestamps are
/// resolved the same way on every run.
pub fn select_expired<'a>(
    artifacts: &'a [BackupArtifact],
    world: &str,
    generation: usize,
) -> Vec<&'a BackupArtifact> {
    let mut owned: Vec<&BackupArtifact> = artifacts.iter().filter(|a| a.belongs_to(world)).collect();
    owned.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    });
    let excess = owned.len().saturating_sub(generation);
    owned.truncate(excess);
    owned
}

/// Delete the artifacts of `world` that exceed `generation`.
///
/// Every deletion is attempted even after a failure. Failures are collected
/// in the outcome for the caller to report.
pub async fn prune_old_backups(
    store: &dyn ObjectStore,
    bucket: &str,
    catalog: &Catalog,
    world: &str,
    generation: usize,
) -> PruneOutcome {
    let mut outcome = PruneOutcome::default();
    for artifact in select_expired(catalog.artifacts(world), world, generation) {
        match store.delete(bucket, &artifact.key).await {
            Ok(()) => {
                tracing::info!("Deleted old backup {}", artifact.key);
                outcome.deleted.push(artifact.key.clone());
            }
            Err(source) => {
                outcome.failures.push(BackupError::Delete {
                    world: world.to_string(),
                    bucket: bucket.to_string(),
                    key: artifact.key.clone(),
                    source,
                });
            }
        }
    }
    outcome
}
