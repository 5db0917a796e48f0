// Everything the scheduler refreshes and the routes read, built once per process.
// Latest poll results live in watch cells: the refresh cycle is the only writer,
// readers get a copy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::device_client::{DeviceClient, DeviceRequest};
use crate::error::HubError;
use crate::guide_cache::ProgramGuideCache;
use crate::history_cache::BucketedHistoryCache;
use crate::inverter::InverterService;
use crate::models::{AggregateResult, DeviceQuery, HistoryPeriod};
use crate::poller::ScatterGatherPoller;

/// Light controller commands forwarded as-is (POST, JSON body).
pub const LIGHT_COMMANDS: [&str; 4] = ["onoff", "auto", "brightness", "save"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceGroup {
    Sockets,
    Lights,
}

impl DeviceGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceGroup::Sockets => "sockets",
            DeviceGroup::Lights => "lights",
        }
    }
}

/// A socket confirms a switch by answering with the new state and nothing else.
pub fn socket_acknowledged(raw: &str, state: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(state)
}

pub struct HubServices {
    pub client: Arc<dyn DeviceClient>,
    pub poller: ScatterGatherPoller,
    pub sockets: Vec<DeviceQuery>,
    pub lights: Vec<DeviceQuery>,
    latest_sockets: watch::Sender<AggregateResult>,
    latest_lights: watch::Sender<AggregateResult>,
    pub inverter: Arc<InverterService>,
    pub day_history: BucketedHistoryCache,
    pub month_history: BucketedHistoryCache,
    pub guide: ProgramGuideCache,
}

impl HubServices {
    pub fn new(config: &AppConfig, client: Arc<dyn DeviceClient>) -> Self {
        let request_timeout = Duration::from_millis(config.client.request_timeout_ms);
        let sockets = config.socket_queries();
        let lights = config.light_queries();
        let inverter = Arc::new(InverterService::new(
            client.clone(),
            config.inverter.address.clone(),
            Duration::from_secs(config.inverter.telemetry_window_secs),
        ));
        let (latest_sockets, _) = watch::channel(AggregateResult::pending(&sockets));
        let (latest_lights, _) = watch::channel(AggregateResult::pending(&lights));
        Self {
            poller: ScatterGatherPoller::new(client.clone(), request_timeout),
            client,
            sockets,
            lights,
            latest_sockets,
            latest_lights,
            day_history: BucketedHistoryCache::new(HistoryPeriod::Day, inverter.clone()),
            month_history: BucketedHistoryCache::new(HistoryPeriod::Month, inverter.clone()),
            inverter,
            guide: ProgramGuideCache::new(
                config.guide.source.clone(),
                config.guide.channels.clone(),
                config.guide.excluded_categories.clone(),
            ),
        }
    }

    pub fn devices(&self, group: DeviceGroup) -> &[DeviceQuery] {
        match group {
            DeviceGroup::Sockets => &self.sockets,
            DeviceGroup::Lights => &self.lights,
        }
    }

    fn latest_cell(&self, group: DeviceGroup) -> &watch::Sender<AggregateResult> {
        match group {
            DeviceGroup::Sockets => &self.latest_sockets,
            DeviceGroup::Lights => &self.latest_lights,
        }
    }

    /// Polls one device group and publishes the complete result.
    #[instrument(skip(self), fields(component = "hub", group = group.as_str()))]
    pub async fn refresh_group(&self, group: DeviceGroup) -> AggregateResult {
        let result = self.poller.poll(self.devices(group)).await;
        if result.failures() > 0 {
            warn!(
                failures = result.failures(),
                devices = result.len(),
                "poll completed with failures"
            );
        }
        self.latest_cell(group).send_replace(result.clone());
        result
    }

    /// Copy of the latest published result.
    pub fn latest(&self, group: DeviceGroup) -> AggregateResult {
        self.latest_cell(group).borrow().clone()
    }

    pub fn subscribe(&self, group: DeviceGroup) -> watch::Receiver<AggregateResult> {
        self.latest_cell(group).subscribe()
    }

    fn device(&self, group: DeviceGroup, id: usize) -> Result<&DeviceQuery, HubError> {
        self.devices(group)
            .get(id)
            .ok_or_else(|| HubError::validation("unknown id"))
    }

    /// Switches a socket on or off; returns the raw answer. A socket confirms by echoing the state.
    #[instrument(skip(self), fields(component = "hub", operation = "socket_command"))]
    pub async fn socket_command(&self, id: usize, on: bool) -> Result<String, HubError> {
        let device = self.device(DeviceGroup::Sockets, id)?;
        let state = if on { "on" } else { "off" };
        let resp = self
            .client
            .request(DeviceRequest::get(&device.address, format!("/{}", state)))
            .await?;
        let raw = resp.text();
        if socket_acknowledged(&raw, state) {
            info!(device = %device.device_id, state, "socket switched");
        } else {
            warn!(device = %device.device_id, state, answer = %raw.trim(), "socket switch not acknowledged");
        }
        Ok(raw)
    }

    /// Forwards a light controller command with its JSON body; returns the raw answer.
    #[instrument(skip(self, body), fields(component = "hub", operation = "light_command"))]
    pub async fn light_command(
        &self,
        id: usize,
        command: &str,
        body: String,
    ) -> Result<String, HubError> {
        if !LIGHT_COMMANDS.contains(&command) {
            return Err(HubError::validation(format!("unknown command {:?}", command)));
        }
        let device = self.device(DeviceGroup::Lights, id)?;
        let resp = self
            .client
            .request(DeviceRequest::post(
                &device.address,
                format!("/{}", command),
                body,
            ))
            .await?;
        Ok(resp.text())
    }
}
