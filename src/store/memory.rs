//! In-process object store.
//!
//! Holds a single container's objects in a sorted map and records how it was
//! driven (listing markers, peak number of concurrent operations) so the
//! engine's pagination and concurrency behaviour can be observed without a
//! network.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::{ObjectStore, TransferError};
use crate::core::ObjectKey;

pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    op_delay: Duration,
    /// 1-based listing request numbers that fail with a 500
    failing_pages: HashSet<usize>,
    markers: Mutex<Vec<Option<String>>>,
    containers_created: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: 10_000,
            op_delay: Duration::ZERO,
            failing_pages: HashSet::new(),
            markers: Mutex::new(Vec::new()),
            containers_created: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Hold every upload, download and delete for `delay`.
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    pub fn with_failing_page(mut self, request: usize) -> Self {
        self.failing_pages.insert(request);
        self
    }

    pub fn with_objects<I, K, V>(self, objects: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.lock_objects()
            .extend(objects.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock_objects().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_objects().keys().cloned().collect()
    }

    /// Marker of every listing request issued, in order.
    pub fn list_markers(&self) -> Vec<Option<String>> {
        self.markers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn containers_created(&self) -> usize {
        self.containers_created.load(Ordering::SeqCst)
    }

    /// Highest number of object operations that were running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn begin_op(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.op_delay.is_zero() {
            sleep(self.op_delay).await;
        }
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn not_found(method: &'static str, key: &ObjectKey) -> TransferError {
    TransferError::Status {
        method,
        url: format!("memory:///{}", key),
        status: 404,
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, marker: Option<&str>) -> Result<Vec<String>, TransferError> {
        let request = {
            let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
            markers.push(marker.map(str::to_string));
            markers.len()
        };

        if self.failing_pages.contains(&request) {
            return Err(TransferError::Status {
                method: "GET",
                url: format!("memory:///?marker={}", marker.unwrap_or_default()),
                status: 500,
            });
        }

        let lower = match marker {
            Some(m) => Bound::Excluded(m.to_string()),
            None => Bound::Unbounded,
        };
        Ok(self
            .lock_objects()
            .range((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn create_container(&self) -> Result<u16, TransferError> {
        let previous = self.containers_created.fetch_add(1, Ordering::SeqCst);
        Ok(if previous == 0 { 201 } else { 202 })
    }

    async fn upload(&self, key: &ObjectKey, source: &Path) -> Result<u64, TransferError> {
        let _guard = self.begin_op().await;
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| TransferError::io(source, e))?;
        let len = data.len() as u64;
        self.lock_objects().insert(key.to_string(), data);
        Ok(len)
    }

    async fn download(&self, key: &ObjectKey, destination: &Path) -> Result<u64, TransferError> {
        let _guard = self.begin_op().await;
        let data = self.get(key.as_str()).ok_or_else(|| not_found("GET", key))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }
        tokio::fs::write(destination, &data)
            .await
            .map_err(|e| TransferError::io(destination, e))?;
        Ok(data.len() as u64)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), TransferError> {
        let _guard = self.begin_op().await;
        self.lock_objects()
            .remove(key.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found("DELETE", key))
    }
}
