//! Batch Progress Tracker
//!
//! Publishes elapsed / estimated-remaining time for the batch operation that
//! is currently running. A `BatchRun` owns a ticker task that refreshes the
//! numbers once per second; dropping the run stops the ticker and clears the
//! published stats, whether the batch finished, failed or unwound.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Stats refresh period
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Batch operations that report progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Split,
    Extract,
    Save,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Split => write!(f, "split"),
            Self::Extract => write!(f, "extract"),
            Self::Save => write!(f, "save"),
        }
    }
}

/// Snapshot of a running batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub operation: Operation,
    pub started_at: DateTime<Utc>,
    pub processed_count: usize,
    pub total_count: usize,
    #[serde(rename = "elapsedMs", serialize_with = "as_millis")]
    pub elapsed: Duration,
    #[serde(rename = "estimatedRemainingMs", serialize_with = "as_millis")]
    pub estimated_time_remaining: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ProcessingStats {
    /// Recompute elapsed and ETA from the run's start instant
    fn refresh(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        self.estimated_time_remaining =
            estimate_remaining(elapsed, self.processed_count, self.total_count);
    }

    pub fn percent(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.processed_count as f64 / self.total_count as f64 * 100.0
    }
}

/// `elapsed / processed * (total - processed)`, or zero before the first unit
pub fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Duration {
    if processed == 0 {
        return Duration::ZERO;
    }
    let remaining = total.saturating_sub(processed);
    let per_item = elapsed.as_secs_f64() / processed as f64;
    Duration::from_secs_f64(per_item * remaining as f64)
}

/// `"{m}m {s}s"`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Where the running batch publishes its stats
#[derive(Clone, Default)]
pub struct ProgressSlot {
    inner: Arc<Mutex<Option<ProcessingStats>>>,
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<ProcessingStats> {
        self.inner.lock().clone()
    }
}

/// Handle to an active batch; see module docs
pub struct BatchRun {
    slot: ProgressSlot,
    started: Instant,
    ticker: JoinHandle<()>,
}

impl BatchRun {
    /// Publish fresh stats and start the ticker. Must be called from
    /// within a tokio runtime.
    pub fn start(slot: &ProgressSlot, operation: Operation, total: usize) -> Self {
        let started = Instant::now();

        *slot.inner.lock() = Some(ProcessingStats {
            operation,
            started_at: Utc::now(),
            processed_count: 0,
            total_count: total,
            elapsed: Duration::ZERO,
            estimated_time_remaining: Duration::ZERO,
        });

        let ticker_slot = slot.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(started + TICK_INTERVAL, TICK_INTERVAL);
            loop {
                interval.tick().await;
                if let Some(stats) = ticker_slot.inner.lock().as_mut() {
                    stats.refresh(started.elapsed());
                }
            }
        });

        tracing::debug!(%operation, total, "Batch started");

        Self {
            slot: slot.clone(),
            started,
            ticker,
        }
    }

    /// Count one finished unit (success or failure)
    pub fn record_completion(&self) {
        if let Some(stats) = self.slot.inner.lock().as_mut() {
            stats.processed_count = (stats.processed_count + 1).min(stats.total_count);
            stats.refresh(self.started.elapsed());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> Option<ProcessingStats> {
        self.slot.snapshot()
    }

    /// End the run and return the total time it took
    pub fn finish(self) -> Duration {
        self.elapsed()
    }
}

impl Drop for BatchRun {
    fn drop(&mut self) {
        self.ticker.abort();
        *self.slot.inner.lock() = None;
        tracing::debug!(elapsed = ?self.started.elapsed(), "Batch finished");
    }
}

/// Progress of `run_in_batches`, reported after every settled batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based
    pub batch: usize,
    pub total_batches: usize,
    /// Units settled so far
    pub completed: usize,
}

/// Run `f` over `items` in concurrent batches of `batch_size`.
///
/// Units inside a batch are polled concurrently with no ordering among
/// them; batch N+1 starts only after every unit of batch N has settled.
/// Every unit counts towards `run` when it settles, whatever its outcome.
/// Outputs are returned in input order.
pub async fn run_in_batches<T, F, Fut, P>(
    items: Vec<T>,
    batch_size: usize,
    run: &BatchRun,
    mut f: F,
    mut on_batch: P,
) -> Vec<Fut::Output>
where
    F: FnMut(T) -> Fut,
    Fut: Future,
    P: FnMut(BatchProgress),
{
    let batch_size = batch_size.max(1);
    let total = items.len();
    let total_batches = total.div_ceil(batch_size);
    let mut outputs = Vec::with_capacity(total);
    let mut items = items.into_iter();

    for batch in 1..=total_batches {
        let units: Vec<_> = items
            .by_ref()
            .take(batch_size)
            .map(|item| {
                let unit = f(item);
                async move {
                    let output = unit.await;
                    run.record_completion();
                    output
                }
            })
            .collect();

        outputs.extend(join_all(units).await);

        on_batch(BatchProgress {
            batch,
            total_batches,
            completed: outputs.len(),
        });
    }

    outputs
}
