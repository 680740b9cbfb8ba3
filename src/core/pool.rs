//! Fixed-size worker pool fed through a bounded job channel.
//!
//! Workers share one multi-consumer receiver, so every key sent is taken by
//! exactly one worker. Closing the channel (dropping the pool's sender) is
//! the only stop signal: each worker drains what is left and returns its
//! [`WorkerReport`]. [`WorkerPool::finish`] is the completion barrier.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};

use super::models::{ObjectKey, RunReport, WorkerReport};
use crate::error::{HasteError, Result};
use crate::store::{ObjectStore, TransferError};

/// Capacity of the job channel. Senders block as soon as one job is
/// waiting and no worker is free to take it.
const JOB_CHANNEL_CAPACITY: usize = 1;

/// The network operation every worker performs per key.
#[derive(Debug, Clone)]
pub enum Action {
    /// PUT `{base}/{key}` to the object `key`
    Upload { base: PathBuf },
    /// GET the object `key` into `{base}/{key}`
    Download { base: PathBuf },
    Delete,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Upload { .. } => "upload",
            Action::Download { .. } => "download",
            Action::Delete => "delete",
        }
    }

    async fn perform(
        &self,
        store: &dyn ObjectStore,
        key: &ObjectKey,
    ) -> std::result::Result<u64, TransferError> {
        match self {
            Action::Upload { base } => {
                let path = local_path(key, base)?;
                store.upload(key, &path).await
            }
            Action::Download { base } => {
                let path = local_path(key, base)?;
                store.download(key, &path).await
            }
            Action::Delete => store.delete(key).await.map(|()| 0),
        }
    }
}

fn local_path(key: &ObjectKey, base: &Path) -> std::result::Result<PathBuf, TransferError> {
    key.to_local_path(base)
        .ok_or_else(|| TransferError::UnsafeKey(key.to_string()))
}

pub struct WorkerPool {
    jobs: Sender<ObjectKey>,
    workers: JoinSet<WorkerReport>,
}

impl WorkerPool {
    /// Start `size` workers. They block on the channel until jobs arrive.
    pub fn spawn(size: usize, store: Arc<dyn ObjectStore>, action: Action) -> Result<Self> {
        if size == 0 {
            return Err(HasteError::InvalidConcurrency);
        }

        let (jobs, rx) = async_channel::bounded(JOB_CHANNEL_CAPACITY);
        let action = Arc::new(action);
        let mut workers = JoinSet::new();

        for id in 0..size {
            let span = info_span!("worker", worker = id);
            workers.spawn(run_worker(rx.clone(), store.clone(), action.clone()).instrument(span));
        }

        debug!(workers = size, action = action.verb(), "Worker pool started");
        Ok(Self { jobs, workers })
    }

    /// Hand one key to the next free worker, waiting while all are busy.
    pub async fn submit(&self, key: ObjectKey) -> Result<()> {
        self.jobs.send(key).await.map_err(|_| HasteError::PoolClosed)
    }

    /// Close the job channel and wait for every worker to drain and exit.
    pub async fn finish(self) -> Result<RunReport> {
        let Self { jobs, mut workers } = self;
        jobs.close();
        drop(jobs);

        let mut report = RunReport::default();
        while let Some(joined) = workers.join_next().await {
            report.merge(joined?);
        }
        Ok(report)
    }
}

async fn run_worker(
    jobs: Receiver<ObjectKey>,
    store: Arc<dyn ObjectStore>,
    action: Arc<Action>,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    while let Ok(key) = jobs.recv().await {
        debug!(key = %key, "Starting {}", action.verb());

        match action.perform(store.as_ref(), &key).await {
            Ok(bytes) => {
                info!(key = %key, bytes, "{} complete", action.verb());
                report.record_success(bytes);
            }
            Err(e) => {
                error!(key = %key, error = %e, "{} failed", action.verb());
                report.record_failure(key, e);
            }
        }
    }

    debug!("Job channel closed, worker exiting");
    report
}
