//! tfhttp State Storage
//!
//! This crate provides the storage core for the tfhttp remote state server.
//! It stores opaque Terraform/OpenTofu state blobs in an object store
//! (currently MinIO or any other S3-compatible endpoint) and coordinates
//! advisory locks over them via marker objects stored alongside each blob.
//!
//! # Overview
//!
//! The storage core consists of:
//!
//! - **StorageBackend**: a trait for byte-exact get/create/delete over an
//!   opaque state key
//! - **LockBackend**: a trait for advisory locking, built on the same
//!   keyspace as the blobs it guards
//! - **LockInfo**: the lock record exchanged with Terraform/OpenTofu clients
//! - **StateDocument**: the state schema validated on the read path
//!
//! # Example
//!
//! ```ignore
//! use tfhttp_state::{BackendSettings, create_backends};
//!
//! let settings = BackendSettings {
//!     storage_backend: "minio".to_string(),
//!     lock_backend: "minio".to_string(),
//!     minio: Some(minio_settings),
//! };
//!
//! let (storage, locks) = create_backends(&settings).await?;
//!
//! // Acquire the lock before touching the blob
//! locks.lock("envs/prod", &info).await?;
//!
//! let blob = storage.get("envs/prod").await?;
//! storage.create("envs/prod", &updated).await?;
//!
//! let released = locks.unlock("envs/prod").await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

// Re-export main types for convenience
pub use backend::{
    BackendSettings, LockBackend, LockError, LockResult, MinioSettings, SetupError,
    StorageBackend, StorageError, StorageResult,
};
pub use backends::create_backends;
pub use lock::{LOCK_SUFFIX, LockInfo, lock_key};
pub use state::StateDocument;
