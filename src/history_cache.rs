// Lazily backfilled per-day / per-month history.
// Closed buckets (elapsed period with a value) are never queried again; open buckets
// (current period or still unset) are queried once per refresh, oldest first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::error::HubError;
use crate::models::{BucketView, HistoryBucket, HistoryPeriod};

const MAX_BUCKETS: usize = 31;

/// Upstream historical query keyed by calendar unit. For months, `date` is the first day.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn query(&self, period: HistoryPeriod, date: NaiveDate) -> Result<Option<f64>, HubError>;
}

/// Counters for one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub fetched: usize,
    pub filled: usize,
    pub skipped_closed: usize,
    pub skipped_future: usize,
    pub reinitialized: bool,
}

/// Fixed-capacity bucket array; `len` is the active length for the current period.
struct BucketSet {
    buckets: [HistoryBucket; MAX_BUCKETS],
    len: usize,
    /// (year, month) the active buckets belong to; month is 0 for the month period.
    anchor: Option<(i32, u32)>,
}

pub struct BucketedHistoryCache {
    period: HistoryPeriod,
    source: Arc<dyn HistorySource>,
    state: RwLock<BucketSet>,
    refresh_lock: Mutex<()>,
}

impl BucketedHistoryCache {
    pub fn new(period: HistoryPeriod, source: Arc<dyn HistorySource>) -> Self {
        Self {
            period,
            source,
            state: RwLock::new(BucketSet {
                buckets: [HistoryBucket::default(); MAX_BUCKETS],
                len: 0,
                anchor: None,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn period(&self) -> HistoryPeriod {
        self.period
    }

    fn expected_len(&self, today: NaiveDate) -> usize {
        match self.period {
            HistoryPeriod::Day => today.day() as usize,
            HistoryPeriod::Month => HistoryPeriod::Month.capacity(),
        }
    }

    fn anchor(&self, today: NaiveDate) -> (i32, u32) {
        match self.period {
            HistoryPeriod::Day => (today.year(), today.month()),
            HistoryPeriod::Month => (today.year(), 0),
        }
    }

    fn slot_of(&self, index: usize) -> u32 {
        match self.period {
            HistoryPeriod::Day => index as u32 + 1,
            HistoryPeriod::Month => index as u32,
        }
    }

    fn is_current(&self, slot: u32, today: NaiveDate) -> bool {
        match self.period {
            HistoryPeriod::Day => slot == today.day(),
            HistoryPeriod::Month => slot == today.month0(),
        }
    }

    fn is_future(&self, slot: u32, today: NaiveDate) -> bool {
        match self.period {
            HistoryPeriod::Day => slot > today.day(),
            HistoryPeriod::Month => slot > today.month0(),
        }
    }

    fn date_of(&self, slot: u32, today: NaiveDate) -> Option<NaiveDate> {
        match self.period {
            HistoryPeriod::Day => NaiveDate::from_ymd_opt(today.year(), today.month(), slot),
            HistoryPeriod::Month => NaiveDate::from_ymd_opt(today.year(), slot + 1, 1),
        }
    }

    /// One refresh cycle for `today`. Concurrent calls are serialized.
    #[instrument(skip(self), fields(component = "history", period = self.period.as_str()))]
    pub async fn refresh(&self, today: NaiveDate) -> RefreshSummary {
        let _refreshing = self.refresh_lock.lock().await;
        let mut summary = RefreshSummary::default();

        let len = self.expected_len(today);
        let anchor = self.anchor(today);
        {
            let mut state = self.state.write().await;
            if state.len != len || state.anchor != Some(anchor) {
                for i in 0..len {
                    state.buckets[i] = HistoryBucket::unset(self.slot_of(i));
                }
                state.len = len;
                state.anchor = Some(anchor);
                summary.reinitialized = true;
                info!(buckets = len, "history buckets reinitialized");
            }
        }

        for i in 0..len {
            let slot = self.slot_of(i);
            let bucket = self.state.read().await.buckets[i];
            let current = self.is_current(slot, today);

            if bucket.value.is_some() && !current {
                summary.skipped_closed += 1;
                continue;
            }
            if self.is_future(slot, today) {
                self.state.write().await.buckets[i].loading = false;
                summary.skipped_future += 1;
                continue;
            }
            let Some(date) = self.date_of(slot, today) else {
                warn!(slot, "no calendar date for bucket");
                continue;
            };

            self.state.write().await.buckets[i].loading = true;
            summary.fetched += 1;
            let result = self.source.query(self.period, date).await;

            let mut state = self.state.write().await;
            let bucket = &mut state.buckets[i];
            match result {
                Ok(Some(value)) => {
                    bucket.value = Some(value);
                    bucket.loading = false;
                    summary.filled += 1;
                }
                Ok(None) => {
                    debug!(slot, "no value yet");
                    bucket.loading = bucket.value.is_none();
                }
                Err(e) => {
                    warn!(slot, error = %e, operation = "history_query", "history query failed");
                    bucket.loading = bucket.value.is_none();
                }
            }
        }

        debug!(
            fetched = summary.fetched,
            filled = summary.filled,
            skipped_closed = summary.skipped_closed,
            "history refresh done"
        );
        summary
    }

    /// Copy of the active buckets in calendar order.
    pub async fn snapshot(&self) -> Vec<HistoryBucket> {
        let state = self.state.read().await;
        state.buckets[..state.len].to_vec()
    }

    pub async fn views(&self) -> Vec<BucketView> {
        self.snapshot()
            .await
            .iter()
            .map(|b| b.view(self.period))
            .collect()
    }
}
