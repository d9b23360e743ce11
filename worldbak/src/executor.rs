use std::path::Path;

use chrono::{DateTime, Utc};

use crate::archive::Archiver;
use crate::artifact::{ArtifactKey, BackupArtifact};
use crate::error::BackupError;
use crate::store::ObjectStore;

/// Archive `world`, upload it as `<world>_<timestamp>.zip` and return the
/// new artifact stamped with `now`.
///
/// The archive is staged in a temporary directory that is removed when this
/// function returns, whatever the outcome.
pub async fn backup_world(
    store: &dyn ObjectStore,
    bucket: &str,
    archiver: &dyn Archiver,
    source_root: &Path,
    world: &str,
    now: DateTime<Utc>,
) -> Result<BackupArtifact, BackupError> {
    let local_error = |path: &Path, source| BackupError::LocalAccess {
        world: world.to_string(),
        path: path.to_path_buf(),
        source,
    };

    let staging = tempfile::Builder::new()
        .prefix("worldbak-")
        .tempdir()
        .map_err(|e| local_error(&std::env::temp_dir(), e))?;
    let archive_path = archiver
        .make_archive(source_root, world, &staging.path().join(world))
        .map_err(|e| local_error(&source_root.join(world), e))?;

    let key = ArtifactKey::new(world, now).to_string();
    store
        .upload(&archive_path, bucket, &key)
        .await
        .map_err(|source| BackupError::Upload {
            world: world.to_string(),
            bucket: bucket.to_string(),
            key: key.clone(),
            source,
        })?;

    tracing::info!("Backed up {world} as {key} to {bucket}");
    Ok(BackupArtifact::new(key, now))
}
