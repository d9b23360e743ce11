use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::artifact::BackupArtifact;
use crate::catalog::Catalog;
use crate::error::BackupError;

/// Modification time of `<source_root>/<world>`.
pub fn world_mtime(source_root: &Path, world: &str) -> Result<DateTime<Utc>, BackupError> {
    let path = source_root.join(world);
    let local_error = |source| BackupError::LocalAccess {
        world: world.to_string(),
        path: path.clone(),
        source,
    };
    let modified = fs::metadata(&path)
        .and_then(|meta| meta.modified())
        .map_err(local_error)?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Whether any artifact of `world` is at least as new as `mtime`.
/// Equal timestamps count as covered.
pub fn is_covered(artifacts: &[BackupArtifact], world: &str, mtime: DateTime<Utc>) -> bool {
    artifacts
        .iter()
        .any(|a| a.belongs_to(world) && a.last_modified >= mtime)
}

/// Whether `world` needs no new backup.
///
/// A missing or unreadable world directory is an error, never a reason to
/// back up.
pub fn is_up_to_date(
    catalog: &Catalog,
    source_root: &Path,
    world: &str,
) -> Result<bool, BackupError> {
    let mtime = world_mtime(source_root, world)?;
    let up_to_date = is_covered(catalog.artifacts(world), world, mtime);
    tracing::debug!("World {world} modified at {mtime}, up to date: {up_to_date}");
    Ok(up_to_date)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;
    use crate::artifact::ArtifactKey;

    fn artifact(world: &str, at: DateTime<Utc>) -> BackupArtifact {
        BackupArtifact::new(ArtifactKey::new(world, at).to_string(), at)
    }

    #[test]
    fn test_unknown_world_is_stale() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("w1")).unwrap();
        assert!(!is_up_to_date(&Catalog::new(), root.path(), "w1").unwrap());
    }

    #[test]
    fn test_equal_timestamp_is_up_to_date() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("w1")).unwrap();
        let mtime = world_mtime(root.path(), "w1").unwrap();

        let mut catalog = Catalog::new();
        catalog.insert(artifact("w1", mtime));
        assert!(is_up_to_date(&catalog, root.path(), "w1").unwrap());
    }

    #[test]
    fn test_older_backup_is_stale() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("w1")).unwrap();
        let mtime = world_mtime(root.path(), "w1").unwrap();

        let mut catalog = Catalog::new();
        catalog.insert(artifact("w1", mtime - Duration::seconds(1)));
        assert!(!is_up_to_date(&catalog, root.path(), "w1").unwrap());

        catalog.insert(artifact("w1", mtime + Duration::hours(1)));
        assert!(is_up_to_date(&catalog, root.path(), "w1").unwrap());
    }

    #[test]
    fn test_other_world_backup_does_not_count() {
        let mtime = Utc::now();
        let newer = mtime + Duration::hours(1);
        let artifacts = vec![artifact("AB", newer), artifact("A_B", newer)];
        assert!(!is_covered(&artifacts, "A", mtime));
        assert!(is_covered(&artifacts, "AB", mtime));
    }

    #[test]
    fn test_missing_world_is_local_access_error() {
        let root = tempdir().unwrap();
        let err = is_up_to_date(&Catalog::new(), root.path(), "w2").unwrap_err();
        match err {
            BackupError::LocalAccess { world, path, .. } => {
                assert_eq!(world, "w2");
                assert_eq!(path, root.path().join("w2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
