//! MinIO-backed storage and lock backends
//!
//! MinIO is the deployment target, but any S3-compatible endpoint works:
//! the client speaks plain S3 with path-style addressing and static
//! credentials.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;

use crate::backend::{
    LockBackend, LockError, LockResult, MinioSettings, StorageBackend, StorageError, StorageResult,
};
use crate::lock::{LockInfo, lock_key};

/// Attempts at the conditional-create/read-back cycle before giving up
const MAX_LOCK_ATTEMPTS: u32 = 5;

/// Storage backend over a MinIO bucket
#[derive(Clone)]
pub struct S3StorageBackend {
    client: Client,
    bucket: String,
}

impl S3StorageBackend {
    /// Connect to the endpoint described by `settings`
    pub async fn connect(settings: &MinioSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "tfhttp-config",
        );

        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(endpoint_url(&settings.host, settings.secure))
            .credentials_provider(credentials)
            .load()
            .await;

        // MinIO serves buckets under the path, not a subdomain.
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
        }
    }

    /// Get the bucket name
    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    /// Check if the bucket exists
    async fn bucket_exists(&self) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if has_status(&err, 404) => Ok(false),
            Err(err) => Err(StorageError::backend(err)),
        }
    }

    /// Create the bucket
    async fn create_bucket(&self) -> StorageResult<()> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(StorageError::backend)?;

        tracing::info!(bucket = %self.bucket, "Created bucket.");
        Ok(())
    }

    /// Write `data` under `key` only if no object exists there
    ///
    /// Returns `Ok(false)` when the conditional write lost to an existing
    /// object. S3 reports that as HTTP 412; two conditional writers racing
    /// on the same key can also see 409.
    pub(crate) async fn create_exclusive(&self, key: &str, data: &[u8]) -> StorageResult<bool> {
        if !self.bucket_exists().await? {
            self.create_bucket().await?;
        }

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(data.to_vec()))
            .content_type("application/json")
            .metadata("owner", "")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if has_status(&err, 412) || has_status(&err, 409) => Ok(false),
            Err(err) => Err(StorageError::backend(err)),
        }
    }
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        if !self.bucket_exists().await? {
            return Err(StorageError::not_found(key));
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let body = output.body.collect().await.map_err(StorageError::backend)?;
                Ok(body.into_bytes().to_vec())
            }
            Err(err) if has_status(&err, 404) => Err(StorageError::not_found(key)),
            Err(err) => Err(StorageError::backend(err)),
        }
    }

    async fn create(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        if !self.bucket_exists().await? {
            self.create_bucket().await?;
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .metadata("owner", "")
            .send()
            .await
            .map_err(StorageError::backend)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if !self.bucket_exists().await? {
            return Err(StorageError::not_found(key));
        }

        // DeleteObject succeeds silently on a missing key; probe first so
        // deleting an absent object reports NotFound.
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(err) if has_status(&err, 404) => return Err(StorageError::not_found(key)),
            Err(err) => return Err(StorageError::backend(err)),
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(StorageError::backend)?;

        Ok(())
    }
}

/// Lock backend using marker objects in the same MinIO bucket
///
/// MinIO has no native lock primitive, so a `<key>.lock` object alongside
/// the state blob represents the lock. Acquisition is a conditional
/// `If-None-Match: *` write, so of any number of concurrent callers
/// exactly one creates the marker and the rest observe the conflict.
pub struct S3LockBackend {
    storage: S3StorageBackend,
}

impl S3LockBackend {
    /// Create a lock backend sharing `storage`'s bucket and client
    pub fn new(storage: S3StorageBackend) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl LockBackend for S3LockBackend {
    async fn lock(&self, key: &str, info: &LockInfo) -> LockResult<()> {
        let marker = lock_key(key);
        let data = serde_json::to_vec(info).map_err(|err| LockError::Backend(err.to_string()))?;

        for _ in 0..MAX_LOCK_ATTEMPTS {
            if self.storage.create_exclusive(&marker, &data).await? {
                return Ok(());
            }

            match self.storage.get(&marker).await {
                Ok(bytes) => {
                    let holder: LockInfo = serde_json::from_slice(&bytes)
                        .map_err(|err| LockError::Decode(err.to_string()))?;
                    return Err(LockError::AlreadyLocked(holder));
                }
                // The marker vanished between the failed write and the
                // read-back: the holder released immediately. Try again.
                Err(StorageError::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(LockError::Backend(format!(
            "could not acquire the {key} lock: contention limit reached"
        )))
    }

    async fn unlock(&self, key: &str) -> LockResult<LockInfo> {
        let marker = lock_key(key);

        let bytes = match self.storage.get(&marker).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return Err(LockError::NotLocked(key.to_string())),
            Err(err) => return Err(err.into()),
        };

        let info: LockInfo =
            serde_json::from_slice(&bytes).map_err(|err| LockError::Decode(err.to_string()))?;

        match self.storage.delete(&marker).await {
            Ok(()) => Ok(info),
            // Lost a release race: the marker is already gone.
            Err(StorageError::NotFound(_)) => Err(LockError::NotLocked(key.to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

fn endpoint_url(host: &str, secure: bool) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{host}")
}

/// Check if an S3 error carries the given HTTP status
fn has_status<E: std::fmt::Debug>(err: &aws_sdk_s3::error::SdkError<E>, status: u16) -> bool {
    err.raw_response()
        .is_some_and(|raw| raw.status().as_u16() == status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(endpoint_url("play.min.io", true), "https://play.min.io");
        assert_eq!(endpoint_url("localhost:9000", false), "http://localhost:9000");
    }

    #[test]
    fn test_marker_key_format() {
        assert_eq!(lock_key("envs/prod"), "envs/prod.lock");
    }
}
