//! Backend implementations for state storage and locking

mod memory;
mod s3;

pub use memory::{MemoryLockBackend, MemoryStorageBackend};
pub use s3::{S3LockBackend, S3StorageBackend};

use std::sync::Arc;

use crate::backend::{BackendSettings, LockBackend, SetupError, StorageBackend};

/// Construct the storage and lock backends selected by `settings`
///
/// When both halves select the same backend type they share one underlying
/// client, so lock markers land in the same keyspace as the blobs they
/// guard.
pub async fn create_backends(
    settings: &BackendSettings,
) -> Result<(Arc<dyn StorageBackend>, Arc<dyn LockBackend>), SetupError> {
    let mut s3: Option<S3StorageBackend> = None;
    let mut memory: Option<MemoryStorageBackend> = None;

    let storage: Arc<dyn StorageBackend> = match settings.storage_backend.as_str() {
        "minio" => {
            let backend = connect_s3(settings).await?;
            s3 = Some(backend.clone());
            Arc::new(backend)
        }
        "memory" => {
            let backend = MemoryStorageBackend::new();
            memory = Some(backend.clone());
            Arc::new(backend)
        }
        other => return Err(SetupError::UnsupportedStorageBackend(other.to_string())),
    };

    let locks: Arc<dyn LockBackend> = match settings.lock_backend.as_str() {
        "minio" => {
            let backend = match s3 {
                Some(backend) => backend,
                None => connect_s3(settings).await?,
            };
            Arc::new(S3LockBackend::new(backend))
        }
        "memory" => Arc::new(MemoryLockBackend::new(memory.unwrap_or_default())),
        other => return Err(SetupError::UnsupportedLockBackend(other.to_string())),
    };

    Ok((storage, locks))
}

async fn connect_s3(settings: &BackendSettings) -> Result<S3StorageBackend, SetupError> {
    let minio = settings.minio.as_ref().ok_or_else(|| {
        SetupError::Configuration("the minio backend requires connection settings".to_string())
    })?;
    Ok(S3StorageBackend::connect(minio).await)
}
