// Per-day / per-month history buckets

use chrono::Month;
use serde::{Deserialize, Serialize};

use super::format_power;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPeriod {
    Day,
    Month,
}

impl HistoryPeriod {
    /// Largest number of buckets the period can ever hold.
    pub const fn capacity(self) -> usize {
        match self {
            HistoryPeriod::Day => 31,
            HistoryPeriod::Month => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HistoryPeriod::Day => "day",
            HistoryPeriod::Month => "month",
        }
    }
}

/// One calendar unit. `slot` is the day of month (1..=31) or the month index (0..=11).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistoryBucket {
    pub slot: u32,
    pub value: Option<f64>,
    pub loading: bool,
}

impl HistoryBucket {
    pub fn unset(slot: u32) -> Self {
        Self {
            slot,
            value: None,
            loading: true,
        }
    }

    pub fn view(&self, period: HistoryPeriod) -> BucketView {
        let label = match period {
            HistoryPeriod::Day => self.slot.to_string(),
            HistoryPeriod::Month => u8::try_from(self.slot + 1)
                .ok()
                .and_then(|m| Month::try_from(m).ok())
                .map(|m| m.name().to_string())
                .unwrap_or_default(),
        };
        BucketView {
            slot: self.slot,
            label,
            value: self.value,
            display: self
                .value
                .map(format_power)
                .unwrap_or_else(|| "unknown".to_string()),
            loading: self.loading,
        }
    }
}

/// Copy of a bucket handed to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketView {
    pub slot: u32,
    pub label: String,
    pub value: Option<f64>,
    pub display: String,
    pub loading: bool,
}
