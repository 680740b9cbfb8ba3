//! Job sources: ordered, finite sequences of object keys.
//!
//! - [`RemoteEnumerator`] pages through a container listing with markers.
//! - [`LocalWalker`] walks a local directory tree on a blocking thread.
//!
//! Both are pull-based and hold a bounded amount of keys in memory; the
//! consumer decides what an error means (fatal before the first key,
//! end-of-enumeration afterwards).

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::models::ObjectKey;
use crate::error::{HasteError, Result};
use crate::store::ObjectStore;

/// Keys buffered between the walking thread and the dispatcher.
const WALK_BUFFER: usize = 256;

#[async_trait]
pub trait JobSource: Send {
    /// The next key, `Ok(None)` once the sequence is exhausted.
    async fn next_key(&mut self) -> Result<Option<ObjectKey>>;
}

/// Marker-paginated listing of the session's container (or account).
pub struct RemoteEnumerator {
    store: Arc<dyn ObjectStore>,
    page: VecDeque<ObjectKey>,
    marker: Option<String>,
    pages_fetched: usize,
    exhausted: bool,
}

impl RemoteEnumerator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            page: VecDeque::new(),
            marker: None,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page_number = self.pages_fetched + 1;
        let names = self
            .store
            .list(self.marker.as_deref())
            .await
            .map_err(|source| HasteError::Listing {
                page: page_number,
                source,
            })?;
        self.pages_fetched = page_number;

        debug!(page = page_number, count = names.len(), "Fetched listing page");

        match names.last() {
            Some(last) => self.marker = Some(last.clone()),
            None => self.exhausted = true,
        }
        self.page.extend(names.into_iter().filter_map(ObjectKey::new));
        Ok(())
    }
}

#[async_trait]
impl JobSource for RemoteEnumerator {
    async fn next_key(&mut self) -> Result<Option<ObjectKey>> {
        loop {
            if let Some(key) = self.page.pop_front() {
                return Ok(Some(key));
            }
            if self.exhausted {
                return Ok(None);
            }
            if let Err(e) = self.fetch_page().await {
                // Never ask for the same page again
                self.exhausted = true;
                return Err(e);
            }
        }
    }
}

/// Lazily yield the key of every non-directory entry under `root`.
///
/// Unreadable entries are skipped with a warning.
pub fn walk_keys(root: &Path) -> impl Iterator<Item = ObjectKey> + use<> {
    let root = root.to_path_buf();
    WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    path = ?e.path().map(Path::display).map(|p| p.to_string()),
                    error = %e,
                    "Skipping unreadable entry"
                );
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(move |entry| {
            let key = ObjectKey::from_relative_path(&root, entry.path());
            if key.is_none() {
                warn!(path = %entry.path().display(), "Skipping entry without a valid object key");
            }
            key
        })
}

/// Directory walk feeding keys from a blocking thread.
pub struct LocalWalker {
    rx: mpsc::Receiver<ObjectKey>,
}

impl LocalWalker {
    /// Check that `root` is a readable directory, then start walking it.
    pub fn spawn(root: &Path) -> Result<Self> {
        std::fs::read_dir(root).map_err(|source| HasteError::SourceUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let (tx, rx) = mpsc::channel(WALK_BUFFER);
        let walk_root = root.to_path_buf();

        tokio::task::spawn_blocking(move || {
            for key in walk_keys(&walk_root) {
                if tx.blocking_send(key).is_err() {
                    debug!(root = %walk_root.display(), "Walk receiver dropped, stopping walk");
                    break;
                }
            }
        });

        Ok(Self { rx })
    }
}

#[async_trait]
impl JobSource for LocalWalker {
    async fn next_key(&mut self) -> Result<Option<ObjectKey>> {
        Ok(self.rx.recv().await)
    }
}
