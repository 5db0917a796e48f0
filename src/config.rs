use std::collections::HashSet;
use std::str::FromStr;

use serde::Deserialize;

use crate::models::{DeviceQuery, GuideChannel};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    pub polling: PollingConfig,
    pub inverter: InverterConfig,
    #[serde(default)]
    pub sockets: Vec<DeviceConfig>,
    #[serde(default)]
    pub lights: Vec<DeviceConfig>,
    pub guide: GuideConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Every device call fails with "timeout" after this long.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Day/month history is refreshed every N polling ticks.
    #[serde(default = "default_history_every_ticks")]
    pub history_every_ticks: u64,
    /// How often to log scheduler stats (ticks run / skipped) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_history_every_ticks() -> u64 {
    60
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct InverterConfig {
    pub address: String,
    /// Validity window for cached telemetry; bounds inverter calls to one per window.
    #[serde(default = "default_telemetry_window_secs")]
    pub telemetry_window_secs: u64,
}

fn default_telemetry_window_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

fn default_status_path() -> String {
    "/".into()
}

impl DeviceConfig {
    pub fn to_query(&self) -> DeviceQuery {
        DeviceQuery::new(&self.name, &self.address, &self.status_path)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuideConfig {
    pub source: String,
    /// Cron expression (local time, with seconds) for warming the current and next hour slot.
    #[serde(default = "default_prewarm_schedule")]
    pub prewarm_schedule: String,
    #[serde(default = "default_excluded_categories")]
    pub excluded_categories: Vec<String>,
    #[serde(default)]
    pub channels: Vec<GuideChannel>,
}

fn default_prewarm_schedule() -> String {
    "0 1 * * * *".into()
}

fn default_excluded_categories() -> Vec<String> {
    vec!["Kodi W Pigulce".into()]
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn socket_queries(&self) -> Vec<DeviceQuery> {
        self.sockets.iter().map(DeviceConfig::to_query).collect()
    }

    pub fn light_queries(&self) -> Vec<DeviceQuery> {
        self.lights.iter().map(DeviceConfig::to_query).collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.client.request_timeout_ms > 0,
            "client.request_timeout_ms must be > 0, got {}",
            self.client.request_timeout_ms
        );
        anyhow::ensure!(
            self.polling.interval_secs > 0,
            "polling.interval_secs must be > 0, got {}",
            self.polling.interval_secs
        );
        anyhow::ensure!(
            self.polling.history_every_ticks > 0,
            "polling.history_every_ticks must be > 0, got {}",
            self.polling.history_every_ticks
        );
        anyhow::ensure!(
            self.polling.stats_log_interval_secs > 0,
            "polling.stats_log_interval_secs must be > 0, got {}",
            self.polling.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.inverter.address.is_empty(),
            "inverter.address must be non-empty"
        );
        anyhow::ensure!(
            self.inverter.telemetry_window_secs > 0,
            "inverter.telemetry_window_secs must be > 0, got {}",
            self.inverter.telemetry_window_secs
        );
        for (group, devices) in [("sockets", &self.sockets), ("lights", &self.lights)] {
            for (i, d) in devices.iter().enumerate() {
                anyhow::ensure!(
                    !d.address.is_empty(),
                    "{}[{}].address must be non-empty",
                    group,
                    i
                );
                anyhow::ensure!(!d.name.is_empty(), "{}[{}].name must be non-empty", group, i);
            }
        }
        anyhow::ensure!(!self.guide.source.is_empty(), "guide.source must be non-empty");
        anyhow::ensure!(
            cron::Schedule::from_str(&self.guide.prewarm_schedule).is_ok(),
            "guide.prewarm_schedule is not a valid cron expression: {:?}",
            self.guide.prewarm_schedule
        );
        let mut seen = HashSet::new();
        for c in &self.guide.channels {
            anyhow::ensure!(!c.name.is_empty(), "guide.channels: name must be non-empty");
            anyhow::ensure!(
                seen.insert(c.name.as_str()),
                "guide.channels: duplicate channel {:?}",
                c.name
            );
        }
        Ok(())
    }
}
