//! S3 backend built on `aws-sdk-s3`: paginated listing, uploads from a file
//! body (multipart for large archives), deletes, and exponential-backoff
//! retries.

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use chrono::{DateTime, Utc};
use tokio::time::{Duration, sleep};

use super::{ObjectEntry, ObjectStore, StoreError};
use crate::config::Config;

/// Upper bound for a single backoff sleep.
const MAX_RETRY_DELAY_MS: u64 = 30_000;
/// S3 refuses multipart uploads with more parts than this.
const MAX_PARTS: u64 = 10_000;

/// S3 backend options
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// S3-compatible endpoint, path-style addressing is used when set
    pub endpoint_url: Option<String>,
    pub max_retries: u32,
    /// Initial retry delay (milliseconds), doubled on every attempt
    pub initial_retry_delay_ms: u64,
    /// Archives larger than this go up as a multipart upload
    pub part_size: u64,
}

impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: None,
            endpoint_url: None,
            max_retries: 3,
            initial_retry_delay_ms: 200,
            part_size: 8 * 1024 * 1024, // 8MB
        }
    }
}

impl S3StoreConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            access_key_id: config.aws_access_key_id.clone(),
            secret_access_key: config.aws_secret_access_key.clone(),
            region: config.region_name.clone(),
            endpoint_url: config.endpoint_url.clone(),
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

pub struct S3Store {
    client: Client,
    config: S3StoreConfig,
}

impl S3Store {
    pub async fn new(config: S3StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        // without configured keys the default credential chain applies
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "worldbak-config",
            ));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint_url.is_some())
            .build();
        Self {
            client: Client::from_conf(s3_config),
            config,
        }
    }

    async fn execute_with_retry<T, F, Fut>(
        &self,
        operation: F,
        operation_name: &'static str,
    ) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let mut attempt = 0;
        let max_retries = self.config.max_retries;
        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt > max_retries {
                        return Err(StoreError::service(
                            operation_name,
                            format!("gave up after {attempt} attempts: {e}"),
                        ));
                    }

                    tracing::warn!("{operation_name} attempt {attempt} failed: {e}");
                    sleep(retry_delay(self.config.initial_retry_delay_ms, attempt)).await;
                }
            }
        }
    }

    async fn put_whole(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        // the body is consumed by each attempt, so reopen the file every time
        self.execute_with_retry(
            || async move {
                let body = ByteStream::from_path(local_path)
                    .await
                    .map_err(|e| format!("cannot read {}: {e}", local_path.display()))?;
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(body)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| DisplayErrorContext(e).to_string())
            },
            "put_object",
        )
        .await
    }

    async fn put_multipart(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        size: u64,
    ) -> Result<(), StoreError> {
        let upload_id = self
            .execute_with_retry(
                || {
                    let request = self.client.create_multipart_upload().bucket(bucket).key(key);
                    async move {
                        let created = request
                            .send()
                            .await
                            .map_err(|e| DisplayErrorContext(e).to_string())?;
                        created
                            .upload_id()
                            .map(str::to_string)
                            .ok_or_else(|| "response carries no upload id".to_string())
                    }
                },
                "create_multipart_upload",
            )
            .await?;

        match self.upload_parts(local_path, bucket, key, &upload_id, size).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.execute_with_retry(
                    || {
                        let request = self
                            .client
                            .complete_multipart_upload()
                            .bucket(bucket)
                            .key(key)
                            .upload_id(&upload_id)
                            .multipart_upload(completed.clone());
                        async move {
                            request
                                .send()
                                .await
                                .map(|_| ())
                                .map_err(|e| DisplayErrorContext(e).to_string())
                        }
                    },
                    "complete_multipart_upload",
                )
                .await
            }
            Err(err) => {
                let aborted = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(e) = aborted {
                    tracing::warn!(
                        "Failed to abort multipart upload of {key}: {}",
                        DisplayErrorContext(e)
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let ranges = part_ranges(size, self.config.part_size);
        tracing::debug!("Uploading {key} in {} parts", ranges.len());
        let mut completed = Vec::with_capacity(ranges.len());
        for part in ranges {
            let e_tag = self
                .execute_with_retry(
                    || async move {
                        let body = ByteStream::read_from()
                            .path(local_path)
                            .offset(part.offset)
                            .length(Length::Exact(part.length))
                            .build()
                            .await
                            .map_err(|e| format!("cannot read {}: {e}", local_path.display()))?;
                        self.client
                            .upload_part()
                            .bucket(bucket)
                            .key(key)
                            .upload_id(upload_id)
                            .part_number(part.number)
                            .body(body)
                            .send()
                            .await
                            .map(|resp| resp.e_tag().map(str::to_string))
                            .map_err(|e| DisplayErrorContext(e).to_string())
                    },
                    "upload_part",
                )
                .await?;
            completed.push(
                CompletedPart::builder()
                    .part_number(part.number)
                    .set_e_tag(e_tag)
                    .build(),
            );
        }
        Ok(completed)
    }
}

/// Backoff before retry number `attempt` (1-based), capped at
/// `MAX_RETRY_DELAY_MS`.
fn retry_delay(initial_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(initial_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}

/// One slice of a multipart upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartRange {
    number: i32,
    offset: u64,
    length: u64,
}

/// Split `size` bytes into consecutive parts of `part_size` bytes, growing the
/// part size when the file would otherwise need more than `MAX_PARTS` parts.
fn part_ranges(size: u64, part_size: u64) -> Vec<PartRange> {
    let part_size = part_size.max(1).max(size.div_ceil(MAX_PARTS));
    let mut parts = Vec::new();
    let mut offset = 0;
    let mut number = 1;
    while offset < size {
        let length = part_size.min(size - offset);
        parts.push(PartRange {
            number,
            offset,
            length,
        });
        offset += length;
        number += 1;
    }
    parts
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let token = continuation.take();
            let page = self
                .execute_with_retry(
                    || {
                        let request = self
                            .client
                            .list_objects_v2()
                            .bucket(bucket)
                            .set_continuation_token(token.clone());
                        async move {
                            request
                                .send()
                                .await
                                .map_err(|e| DisplayErrorContext(e).to_string())
                        }
                    },
                    "list_objects_v2",
                )
                .await?;

            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let Some(last_modified) = object.last_modified().and_then(to_chrono) else {
                    tracing::warn!("Skipping object {key} without a usable last-modified time");
                    continue;
                };
                entries.push(ObjectEntry::new(key, last_modified));
            }

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(next.to_string());
                }
                _ => break,
            }
        }
        tracing::debug!("Listed {} objects in bucket {bucket}", entries.len());
        Ok(entries)
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let size = tokio::fs::metadata(local_path).await?.len();
        if size <= self.config.part_size {
            self.put_whole(local_path, bucket, key).await
        } else {
            self.put_multipart(local_path, bucket, key, size).await
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.execute_with_retry(
            || {
                let request = self.client.delete_object().bucket(bucket).key(key);
                async move {
                    request
                        .send()
                        .await
                        .map(|_| ())
                        .map_err(|e| DisplayErrorContext(e).to_string())
                }
            },
            "delete_object",
        )
        .await
    }
}
