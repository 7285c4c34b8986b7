//! Bounded-concurrency job scheduler.
//!
//! Jobs are dispatched in slot order under a [`Semaphore`]; each finished
//! job writes its outcome back into its own slot, so completion order does
//! not matter.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::executor::{JobContext, RenditionExecutor};
use crate::job::{JobOutcome, RenditionJob};

/// Upper bound on auto-detected workers.
const MAX_AUTO_WORKERS: usize = 8;

/// Lower bound on auto-detected workers.
const MIN_AUTO_WORKERS: usize = 2;

/// Worker count: the explicit setting, else `cpus - 1` clamped to 2..=8 so
/// the encoders' own threads keep some headroom.
pub fn effective_workers(max_workers: Option<usize>, cpus: usize) -> usize {
    match max_workers {
        Some(n) if n > 0 => n,
        _ => cpus.saturating_sub(1).clamp(MIN_AUTO_WORKERS, MAX_AUTO_WORKERS),
    }
}

/// Threads handed to each encoder process.
pub fn threads_per_job(cpus: usize, workers: usize) -> u32 {
    (cpus / workers.max(1)).max(2) as u32
}

/// Runs rendition jobs through a [`RenditionExecutor`].
pub struct Scheduler {
    executor: Arc<dyn RenditionExecutor>,
    workers: usize,
}

impl Scheduler {
    pub fn new(executor: Arc<dyn RenditionExecutor>, workers: usize) -> Self {
        Self {
            executor,
            workers: workers.max(1),
        }
    }

    /// Execute every job and return them with their outcomes filled in.
    ///
    /// Never fails: per-job errors become [`JobOutcome::Failed`], and a
    /// failed job's partial output is removed.
    pub async fn run(&self, mut jobs: Vec<RenditionJob>, ctx: Arc<JobContext>) -> Vec<RenditionJob> {
        let total = jobs.len();
        tracing::info!(
            "Dispatching {total} job(s) on {} worker(s) via {}",
            self.workers,
            self.executor.name()
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for job in jobs.iter().cloned() {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let executor = Arc::clone(&self.executor);
            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move {
                let _permit = permit;
                tracing::info!("Starting {} job: {}", job.kind(), job.label);
                let outcome = match executor.execute(&job, &ctx).await {
                    Ok(artifact) => JobOutcome::Succeeded(artifact),
                    Err(e) => {
                        job.remove_output(&ctx.output_root).await;
                        JobOutcome::Failed(e.to_string())
                    }
                };
                (job.slot, outcome)
            });
        }

        let mut done = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    done += 1;
                    let Some(job) = jobs.get_mut(slot) else {
                        tracing::warn!("Job result for unknown slot {slot}");
                        continue;
                    };
                    match &outcome {
                        JobOutcome::Failed(reason) => {
                            tracing::warn!("[{done}/{total}] Failed: {} ({reason})", job.label)
                        }
                        _ => tracing::info!("[{done}/{total}] Completed: {}", job.label),
                    }
                    job.outcome = outcome;
                }
                Err(e) => tracing::error!("Job task did not complete: {e}"),
            }
        }

        for job in jobs.iter_mut().filter(|j| j.outcome == JobOutcome::Pending) {
            job.remove_output(&ctx.output_root).await;
            job.outcome = JobOutcome::Failed("job task aborted".into());
        }

        jobs
    }
}
