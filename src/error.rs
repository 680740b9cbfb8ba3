//! Error types for haste.
//!
//! Two tiers exist. [`HasteError`] aborts the whole run (authentication,
//! listing the first page, an empty job source, bad configuration).
//! [`crate::store::TransferError`] belongs to a single job and is only
//! ever logged and counted by the worker that hit it.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::TransferError;

/// Run-aborting error.
#[derive(Error, Debug)]
pub enum HasteError {
    /// Missing or invalid configuration (usage error)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be assembled from its sources
    #[error("Failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    /// The identity endpoint could not be reached
    #[error("Unable to authenticate: {0}")]
    AuthTransport(#[source] reqwest::Error),

    /// The identity endpoint answered with a non-success status
    #[error("Unable to authenticate: identity service returned status {status}")]
    AuthRejected { status: u16 },

    /// The identity response body could not be understood
    #[error("Unable to authenticate: malformed identity response: {0}")]
    AuthResponse(String),

    /// The service catalog has no object-store endpoint for the region
    #[error("No {interface} found for object-store in region {region}")]
    RegionNotFound {
        region: String,
        interface: &'static str,
    },

    /// Listing failed before enumeration produced anything
    #[error("Listing failed on page {page}: {source}")]
    Listing {
        page: usize,
        #[source]
        source: TransferError,
    },

    #[error("Unable to create container: {0}")]
    ContainerCreate(#[source] TransferError),

    #[error("No files to operate on")]
    NoObjects,

    /// The local upload root is missing or unreadable
    #[error("Cannot read source directory {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every worker went away while jobs were still being produced
    #[error("Worker pool closed before all jobs were dispatched")]
    PoolClosed,

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for HasteError {
    fn from(err: figment::Error) -> Self {
        HasteError::Figment(Box::new(err))
    }
}

impl HasteError {
    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        HasteError::Config(message.into())
    }
}

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, HasteError>;
