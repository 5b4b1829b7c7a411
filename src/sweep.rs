//! Parameter-sweep scheduling across a fixed-size worker pool.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{info, warn};
use rayon::prelude::*;

use crate::runner::{self, RunSink};
use crate::schema::{ConfigError, SweepConfig};

/// What happened to a sweep, in aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Runs enumerated from the grid.
    pub queued: usize,
    /// Runs that finished and reached the sink.
    pub completed: usize,
    /// Runs that errored or panicked. Always `queued - completed`.
    pub failed: usize,
}

/// Errors that abort a sweep before any run starts.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Execute every run in the sweep on a pool of `parallelism` workers.
///
/// The whole grid is enumerated and validated before the pool starts, so
/// a malformed grid costs nothing. Individual runs are isolated: a
/// panicking run is logged and counted as failed, and the remaining runs
/// proceed.
pub fn run_sweep(config: &SweepConfig, sink: &dyn RunSink) -> Result<SweepSummary, SweepError> {
    let runs = config.enumerate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallelism)
        .build()?;

    info!(
        "sweep: {} runs queued across {} workers",
        runs.len(),
        config.parallelism
    );

    let completed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.install(|| {
        runs.par_iter().for_each(|run_config| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                runner::run(run_config).map(|outcome| sink.store(&outcome))
            }));
            match result {
                Ok(Ok(())) => {
                    completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!("{}: failed: {err}", run_config.run_id);
                }
                Err(_) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!("{}: worker panicked", run_config.run_id);
                }
            }
        });
    });

    let summary = SweepSummary {
        queued: runs.len(),
        completed: completed.into_inner(),
        failed: failed.into_inner(),
    };
    info!(
        "sweep: {} completed, {} failed of {} queued",
        summary.completed, summary.failed, summary.queued
    );
    Ok(summary)
}
