//! Object storage backends.
//!
//! [`ObjectStore`] is the seam between the transfer engine and the network:
//! one method per remote operation, each issuing exactly one request.
//! Errors are per-job ([`TransferError`]) and never abort a run by
//! themselves; the caller decides which tier an error belongs to.

mod memory;
mod swift;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::ObjectKey;

pub use memory::MemoryStore;
pub use swift::SwiftStore;

/// Failure of a single remote or local operation.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Local file could not be opened, created or written
    #[error("local I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection or protocol failure talking to the storage service
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("{method} {url} returned status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// Key would resolve outside the local base directory
    #[error("object key {0:?} does not map to a path under the base directory")]
    UnsafeKey(String),

    /// Key has `.` or `..` segments, which no request URL can carry
    #[error("object key {0:?} contains `.` or `..` segments and cannot be addressed")]
    UnaddressableKey(String),

    #[error("invalid URL: {0}")]
    Url(String),
}

impl TransferError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Status code when the service rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A container-scoped view of an object storage service.
///
/// Implementations are shared by every worker, so all methods take `&self`
/// and must be safe to call concurrently.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// One listing page: the names sorted after `marker` (exclusive).
    ///
    /// Lists the session's container, or the account's containers when the
    /// session has none. An empty page terminates pagination.
    async fn list(&self, marker: Option<&str>) -> Result<Vec<String>, TransferError>;

    /// Idempotently create the container, returning the response status.
    async fn create_container(&self) -> Result<u16, TransferError>;

    /// Stream the file at `source` into the object `key`. Returns bytes sent.
    async fn upload(&self, key: &ObjectKey, source: &Path) -> Result<u64, TransferError>;

    /// Stream the object `key` into a newly created file at `destination`,
    /// creating parent directories as needed. Returns bytes written.
    async fn download(&self, key: &ObjectKey, destination: &Path) -> Result<u64, TransferError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), TransferError>;
}
