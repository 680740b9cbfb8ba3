use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{Instrument, info, info_span, warn};

use super::models::{ObjectKey, Operation, RunReport};
use super::pool::{Action, WorkerPool};
use super::source::{JobSource, LocalWalker, RemoteEnumerator};
use crate::context::AppContext;
use crate::error::{HasteError, Result};
use crate::logging::LogThrottle;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Drives one run: job source → worker pool → completion barrier.
pub struct Orchestrator {
    ctx: AppContext,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Execute `operation` to completion.
    ///
    /// Returns only after every worker has exited. Per-job failures are in
    /// the report; an `Err` means the run was aborted.
    pub async fn run(&self, operation: &Operation) -> Result<RunReport> {
        let span = info_span!(
            "run",
            run_id = %self.ctx.run_id,
            operation = operation.name(),
            container = operation.container().unwrap_or_default()
        );

        async {
            let start = Instant::now();
            let mut report = match operation {
                Operation::Upload { source, .. } => {
                    let walker = LocalWalker::spawn(source)?;
                    let action = Action::Upload {
                        base: source.clone(),
                    };
                    self.dispatch(walker, action).await?
                }
                Operation::Download { destination, .. } => {
                    let base = std::path::absolute(destination)?;
                    let source = RemoteEnumerator::new(self.ctx.store.clone());
                    self.dispatch(source, Action::Download { base }).await?
                }
                Operation::Delete { .. } => {
                    let source = RemoteEnumerator::new(self.ctx.store.clone());
                    self.dispatch(source, Action::Delete).await?
                }
                Operation::List { .. } => self.list_into(&mut std::io::stdout()).await?,
            };
            report.elapsed = start.elapsed();
            Ok::<_, HasteError>(report)
        }
        .instrument(span)
        .await
    }

    /// Write every name in the listing to `out`, one per line.
    pub async fn list_into<W: Write + Send>(&self, out: &mut W) -> Result<RunReport> {
        let mut source = RemoteEnumerator::new(self.ctx.store.clone());
        let mut report = RunReport::default();

        let mut next = Some(first_key(&mut source).await?);
        while let Some(key) = next {
            writeln!(out, "{}", key)?;
            report.succeeded += 1;
            next = following_key(&mut source, report.succeeded).await;
        }
        out.flush()?;

        Ok(report)
    }

    async fn dispatch<S: JobSource>(&self, mut source: S, action: Action) -> Result<RunReport> {
        let first = first_key(&mut source).await?;

        if matches!(action, Action::Upload { .. }) {
            self.ensure_container().await?;
        }

        let pool = WorkerPool::spawn(self.ctx.config.concurrency, self.ctx.store.clone(), action)?;
        let mut throttle = LogThrottle::new(PROGRESS_LOG_INTERVAL);
        let mut dispatched: u64 = 0;

        let mut next = Some(first);
        while let Some(key) = next {
            if let Err(e) = pool.submit(key).await {
                // Only happens when every worker died; surface why
                return Err(pool.finish().await.err().unwrap_or(e));
            }
            dispatched += 1;
            if throttle.ready() {
                info!(dispatched, "Dispatching jobs");
            }
            next = following_key(&mut source, dispatched).await;
        }

        info!(dispatched, "All jobs dispatched, waiting for workers");
        pool.finish().await
    }

    async fn ensure_container(&self) -> Result<()> {
        let status = self
            .ctx
            .store
            .create_container()
            .await
            .map_err(HasteError::ContainerCreate)?;

        if (200..300).contains(&status) {
            info!(status, "Container ready");
        } else {
            warn!(status, "Container creation returned an unexpected status, continuing");
        }
        Ok(())
    }
}

/// The first key decides whether there is any work: an error or an empty
/// source aborts the run.
async fn first_key<S: JobSource>(source: &mut S) -> Result<ObjectKey> {
    source.next_key().await?.ok_or(HasteError::NoObjects)
}

/// Past the first key, a source error ends enumeration instead of the run.
async fn following_key<S: JobSource>(source: &mut S, produced: u64) -> Option<ObjectKey> {
    match source.next_key().await {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, produced, "Enumeration stopped early, finishing jobs already produced");
            None
        }
    }
}
