// Solar inverter: live telemetry behind time-windowed caches, historical day/month
// queries for the bucket caches, and the work mode control surface.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tokio::time::Duration;
use tracing::{info, instrument, warn};

use crate::device_client::{DeviceClient, DeviceRequest};
use crate::error::HubError;
use crate::history_cache::HistorySource;
use crate::models::{
    EnergyStats, HistoryPeriod, InverterParams, WorkMode, is_acknowledged, parse_history_value,
    parse_params, parse_stats,
};
use crate::window_cache::TimeWindowedCache;

pub struct InverterService {
    client: Arc<dyn DeviceClient>,
    address: String,
    window: Duration,
    params: TimeWindowedCache<InverterParams>,
    stats: TimeWindowedCache<EnergyStats>,
    work_mode: TimeWindowedCache<WorkMode>,
}

impl InverterService {
    pub fn new(client: Arc<dyn DeviceClient>, address: impl Into<String>, window: Duration) -> Self {
        Self {
            client,
            address: address.into(),
            window,
            params: TimeWindowedCache::new("inverter_params"),
            stats: TimeWindowedCache::new("inverter_stats"),
            work_mode: TimeWindowedCache::new("inverter_work_mode"),
        }
    }

    async fn text(&self, path: &str) -> Result<String, HubError> {
        let resp = self
            .client
            .request(DeviceRequest::get(&self.address, path))
            .await?;
        Ok(resp.text())
    }

    /// Live parameters; at most one device call per window.
    pub async fn params(&self) -> Result<InverterParams, HubError> {
        self.params
            .get(self.window, move || async move {
                let raw = self.text("/params").await?;
                parse_params(&raw)
            })
            .await
    }

    /// Energy counters. A zero day counter is filled from a day query for `today`.
    pub async fn stats(&self, today: NaiveDate) -> Result<EnergyStats, HubError> {
        self.stats
            .get(self.window, move || async move {
                let raw = self.text("/stats").await?;
                let mut stats = parse_stats(&raw)?;
                if stats.needs_day_fallback() {
                    match self.query_day(today).await {
                        Ok(day) => stats.day = day.unwrap_or(0.0),
                        Err(e) => {
                            warn!(error = %e, operation = "stats_day_fallback", "day query failed; day counter left at 0");
                        }
                    }
                }
                Ok(stats)
            })
            .await
    }

    pub async fn work_mode(&self) -> Result<WorkMode, HubError> {
        self.work_mode
            .get(self.window, move || async move {
                let raw = self.text("/worktype").await?;
                Ok(WorkMode::from_device(&raw))
            })
            .await
    }

    /// Switches the work mode and returns the device's raw answer.
    /// The cached mode is updated only when the answer is an acknowledgement.
    #[instrument(skip(self), fields(component = "inverter", operation = "set_work_mode"))]
    pub async fn set_work_mode(&self, mode: WorkMode) -> Result<String, HubError> {
        let path = mode
            .command_path()
            .ok_or_else(|| HubError::validation("unknown work mode"))?;
        let raw = self.text(path).await?;
        if is_acknowledged(&raw) {
            info!(mode = mode.label(), "work mode switched");
            self.work_mode.replace(mode, self.window).await;
        } else {
            warn!(mode = mode.label(), answer = %raw.trim(), "work mode switch not acknowledged");
        }
        Ok(raw)
    }

    /// Energy produced on `date` (`/qed?d=YYYYMMDD`). `None` when the inverter has no value.
    pub async fn query_day(&self, date: NaiveDate) -> Result<Option<f64>, HubError> {
        let raw = self
            .text(&format!("/qed?d={}", date.format("%Y%m%d")))
            .await?;
        Ok(parse_history_value(&raw))
    }

    /// Energy produced in the month of `date` (`/qem?m=YYYYMM`).
    pub async fn query_month(&self, date: NaiveDate) -> Result<Option<f64>, HubError> {
        let raw = self
            .text(&format!("/qem?m={:04}{:02}", date.year(), date.month()))
            .await?;
        Ok(parse_history_value(&raw))
    }
}

#[async_trait]
impl HistorySource for InverterService {
    async fn query(&self, period: HistoryPeriod, date: NaiveDate) -> Result<Option<f64>, HubError> {
        match period {
            HistoryPeriod::Day => self.query_day(date).await,
            HistoryPeriod::Month => self.query_month(date).await,
        }
    }
}
