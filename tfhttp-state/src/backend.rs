//! Backend traits and error types for state storage and locking

use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockInfo;

/// Errors that can occur when interacting with a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object (or its containing bucket) does not exist
    #[error("The {0} object not found.")]
    NotFound(String),

    /// Any other storage-layer failure (network, auth, I/O)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Create a NotFound error for the given key
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create a generic backend error
    pub fn backend(message: impl ToString) -> Self {
        Self::Backend(message.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur when interacting with a lock backend
#[derive(Debug, Error)]
pub enum LockError {
    /// The key is already locked; carries the current holder's record
    #[error("Already locked with ID {} by {}.", .0.id, .0.who)]
    AlreadyLocked(LockInfo),

    /// An unlock was requested for a key that holds no lock
    #[error("The {0} lock not acquired.")]
    NotLocked(String),

    /// A stored lock record exists but does not decode as one
    #[error("Cannot decode the lock record: {0}")]
    Decode(String),

    /// Any other lock-backend failure
    #[error("Lock backend error: {0}")]
    Backend(String),
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

impl From<StorageError> for LockError {
    // Lock call sites translate NotFound themselves (absent marker means
    // "not locked", not "missing object"); anything that reaches this
    // conversion is a backend failure.
    fn from(err: StorageError) -> Self {
        LockError::Backend(err.to_string())
    }
}

/// Errors that can occur while constructing backends
#[derive(Debug, Error)]
pub enum SetupError {
    /// The storage backend type is not supported
    #[error("Unsupported storage backend: {0}")]
    UnsupportedStorageBackend(String),

    /// The lock backend type is not supported
    #[error("Unsupported lock backend: {0}")]
    UnsupportedLockBackend(String),

    /// The selected backend is missing required settings
    #[error("Backend configuration error: {0}")]
    Configuration(String),
}

/// Trait for state blob storage backends
///
/// A storage backend is a key/value object store holding opaque byte
/// sequences. Keys are arbitrary path-like strings and may contain slashes.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch the exact bytes stored under `key`
    ///
    /// Fails with [`StorageError::NotFound`] if the object or its
    /// containing bucket does not exist.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store `data` under `key`, overwriting any previous object
    ///
    /// The containing bucket is created lazily on first use.
    async fn create(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Remove the object stored under `key`
    ///
    /// Fails with [`StorageError::NotFound`] if the object or its
    /// containing bucket does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Trait for advisory lock backends
///
/// A lock is a marker object stored alongside the state blob under a
/// derived key (the state key with a `.lock` suffix appended). Locking is
/// cooperative: nothing prevents a caller from mutating a blob without
/// holding its lock.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Acquire the lock for `key`, recording `info` as the holder
    ///
    /// Acquisition is atomic: of any number of concurrent callers exactly
    /// one wins and the rest observe [`LockError::AlreadyLocked`] carrying
    /// the winner's record.
    async fn lock(&self, key: &str, info: &LockInfo) -> LockResult<()>;

    /// Release the lock for `key` and return the removed holder record
    ///
    /// No candidate lock id is taken or verified. The HTTP backend
    /// protocol's unlock request does not carry one, so release always
    /// removes whichever marker is present.
    async fn unlock(&self, key: &str) -> LockResult<LockInfo>;
}

/// Connection settings for a MinIO (or any S3-compatible) endpoint
#[derive(Debug, Clone)]
pub struct MinioSettings {
    /// Host and port, without a scheme (e.g. "play.min.io")
    pub host: String,
    /// Whether to connect over https
    pub secure: bool,
    /// Region name passed to the client; MinIO accepts any value
    pub region: String,
    /// Bucket holding state blobs and lock markers
    pub bucket: String,
    /// Access key
    pub access_key: String,
    /// Secret key
    pub secret_key: String,
}

/// Backend selection handed to [`crate::create_backends`]
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Storage backend type ("minio" or "memory")
    pub storage_backend: String,
    /// Lock backend type ("minio" or "memory")
    pub lock_backend: String,
    /// Connection settings, required when either backend is "minio"
    pub minio: Option<MinioSettings>,
}
