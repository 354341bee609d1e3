//! Periodic aggregation cycles.
//!
//! One background task per granularity wakes up every `period`, computes the
//! window containing "now" and refreshes that window's bucket. The first tick
//! fires one period after the task starts; ticks are not aligned to wall-clock
//! hour or day boundaries.
//!
//! Every store write in the process (both cycles plus reading ingest) runs
//! under the scheduler's single write lock. A failed tick is logged and
//! dropped; the next tick starts from scratch.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::models::{Bucket, Reading};
use crate::store::Store;
use crate::window::Granularity;

// ---

/// Shortest accepted cycle period.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Longest accepted cycle period (366 days).
pub const MAX_PERIOD: Duration = Duration::from_secs(crate::config::MAX_INTERVAL_SECS);

/// Source of "now" for window selection.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Owns the store handle, the clock and the process-wide write lock.
///
/// Cheap to clone; clones share the same lock.
#[derive(Clone)]
pub struct Scheduler {
    store: Store,
    clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    // ---
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run one aggregation pass for the window containing the clock's "now".
    ///
    /// The sum and the upsert happen in one transaction while the write lock
    /// is held. On error the transaction is rolled back and the lock released.
    pub async fn tick(&self, granularity: Granularity) -> Result<Bucket, StoreError> {
        // ---
        let _guard = self.write_lock.lock().await;

        // Read the clock only once the lock is ours; waiting may cross a boundary
        let now = self.clock.now();
        let window = granularity.window_containing(now);
        debug_assert!(window.contains(now));
        debug!("{} tick: computing {}", granularity, window);

        let bucket = self.store.refresh_bucket(granularity, window).await?;
        info!(
            "{} bucket {} = {:.2} kWh",
            granularity,
            bucket.window_start.to_rfc3339(),
            bucket.kwh_value
        );
        Ok(bucket)
    }

    /// Upsert readings under the write lock so ingest never interleaves with
    /// an aggregation transaction.
    pub async fn ingest(&self, readings: &[Reading]) -> Result<usize, StoreError> {
        // ---
        let _guard = self.write_lock.lock().await;
        let count = self.store.upsert_readings(readings).await?;
        debug!("Ingested {} readings", count);
        Ok(count)
    }

    /// Start the background cycle for one granularity. The task never ends on
    /// its own; it lives as long as the runtime.
    ///
    /// `period` is clamped to `MIN_PERIOD..=MAX_PERIOD`.
    pub fn spawn(&self, granularity: Granularity, period: Duration) -> JoinHandle<()> {
        // ---
        let requested = period;
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        if period != requested {
            warn!(
                "{} period {}s out of range, using {}s",
                granularity,
                requested.as_secs_f64(),
                period.as_secs_f64()
            );
        }

        info!(
            "Starting {} aggregation cycle every {}s",
            granularity,
            period.as_secs_f64()
        );

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run(granularity, period).await })
    }

    async fn run(self, granularity: Granularity, period: Duration) {
        // ---
        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(granularity).await {
                error!("{} aggregation failed, retrying next tick: {}", granularity, e);
            }
        }
    }
}
