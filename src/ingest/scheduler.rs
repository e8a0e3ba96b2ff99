// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::context::AppContext;
use crate::ingest::{run_ingestion_batch, BatchReport};

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    /// Must be non-zero.
    pub interval: Duration,
    /// Run a batch immediately instead of waiting one interval.
    pub run_on_startup: bool,
}

/// Run one batch unless another one holds the run lock.
pub async fn run_guarded(ctx: &AppContext) -> Option<BatchReport> {
    let Some(_guard) = ctx.try_begin_run() else {
        tracing::warn!(target: "ingest", "previous batch still running; tick skipped");
        metrics::counter!("ingest_ticks_skipped_total").increment(1);
        return None;
    };
    Some(run_ingestion_batch(ctx).await)
}

/// Handle to the periodic ingest task.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking and cancel a batch in flight at its next await point.
    /// Rows it already inserted stay committed.
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn spawn_scheduler(ctx: Arc<AppContext>, cfg: IngestSchedulerCfg) -> SchedulerHandle {
    let task = tokio::spawn(async move {
        let start = if cfg.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + cfg.interval
        };
        let mut ticker = interval_at(start, cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            target: "ingest",
            interval_secs = cfg.interval.as_secs(),
            run_on_startup = cfg.run_on_startup,
            "ingest scheduler started"
        );

        // Batches run in their own tasks so the ticker keeps ticking (overlap is
        // caught by the run lock). Dropping the set on abort cancels them too.
        let mut batches = JoinSet::new();
        loop {
            ticker.tick().await;
            while batches.try_join_next().is_some() {}

            let ctx = ctx.clone();
            batches.spawn(async move {
                if let Some(report) = run_guarded(&ctx).await {
                    tracing::info!(
                        target: "ingest",
                        saved = report.saved,
                        "scheduled batch finished"
                    );
                }
            });
        }
    });
    SchedulerHandle { task }
}
