//! Local directory backend: `<root>/<bucket>/<key>` files stand in for objects.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use walkdir::WalkDir;

use super::{ObjectEntry, ObjectStore, StoreError};

pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn path_for(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_dir(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let dir = self.bucket_dir(bucket);
        // a missing bucket is an error, same as NoSuchBucket on S3
        fs::metadata(&dir).await?;

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let modified = entry.metadata().map_err(std::io::Error::from)?.modified()?;
            entries.push(ObjectEntry::new(key, DateTime::<Utc>::from(modified)));
        }
        Ok(entries)
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(bucket, key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::copy(local_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        fs::remove_file(self.path_for(bucket, key)).await?;
        Ok(())
    }
}
