// Inverter telemetry: live parameters, energy counters, work mode, display helpers

use serde::Serialize;

use crate::error::HubError;

/// Minimum number of whitespace-separated fields in a `/params` answer.
const PARAMS_MIN_FIELDS: usize = 20;
/// Each counter in `/stats` and the history answers is 8 characters wide.
const COUNTER_WIDTH: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PvReading {
    pub voltage: f64,
    pub amp: f64,
    pub watt: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatteryReading {
    pub voltage: f64,
    pub discharge: f64,
    pub charging: f64,
    pub soc: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineReading {
    pub voltage: f64,
    pub hz: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerReading {
    pub apparent: f64,
    pub active: f64,
}

/// Live inverter parameters (one `/params` answer).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterParams {
    pub pv: PvReading,
    pub battery: BatteryReading,
    pub load: f64,
    pub ac_in: LineReading,
    pub ac_out: LineReading,
    pub power: PowerReading,
    pub temperature: f64,
    pub bus_voltage: f64,
}

/// Parse a `/params` answer. A leading `(` is tolerated.
pub fn parse_params(raw: &str) -> Result<InverterParams, HubError> {
    let body = raw.trim().trim_start_matches('(');
    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() < PARAMS_MIN_FIELDS {
        return Err(HubError::malformed(format!(
            "params: expected at least {} fields, got {}",
            PARAMS_MIN_FIELDS,
            fields.len()
        )));
    }
    let f = |i: usize| -> Result<f64, HubError> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| HubError::malformed(format!("params: field {} = {:?}", i, fields[i])))
    };
    Ok(InverterParams {
        pv: PvReading {
            voltage: f(13)?,
            amp: f(12)?,
            watt: f(19)?,
        },
        battery: BatteryReading {
            voltage: f(8)?,
            discharge: f(15)?,
            charging: f(9)?,
            soc: f(10)?,
        },
        load: f(6)?,
        ac_in: LineReading {
            voltage: f(0)?,
            hz: f(1)?,
        },
        ac_out: LineReading {
            voltage: f(2)?,
            hz: f(3)?,
        },
        power: PowerReading {
            apparent: f(4)?,
            active: f(5)?,
        },
        temperature: f(11)?,
        bus_voltage: f(7)?,
    })
}

/// Energy counters (Wh) from `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyStats {
    pub year: f64,
    pub month: f64,
    pub day: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyStatsDisplay {
    pub year: String,
    pub month: String,
    pub day: String,
    pub total: String,
}

impl EnergyStats {
    /// True when the device reported no day counter and a `/qed` query must supply it.
    pub fn needs_day_fallback(&self) -> bool {
        self.day == 0.0 || !self.day.is_finite()
    }

    pub fn display(&self) -> EnergyStatsDisplay {
        EnergyStatsDisplay {
            year: format_power(self.year),
            month: format_power(self.month),
            day: format_power(self.day),
            total: format_power(self.total),
        }
    }
}

/// Stats plus their dashboard rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub stats: EnergyStats,
    pub display: EnergyStatsDisplay,
}

impl From<EnergyStats> for StatsReport {
    fn from(stats: EnergyStats) -> Self {
        let display = stats.display();
        Self { stats, display }
    }
}

fn counter(segment: &str) -> Option<f64> {
    let head: String = segment.trim().chars().take(COUNTER_WIDTH).collect();
    head.parse::<f64>().ok()
}

/// Parse a `/stats` answer: `YEAR.MONTH.DAY.TOTAL`. An unreadable day counter
/// is reported as 0 so the caller falls back to a day query.
pub fn parse_stats(raw: &str) -> Result<EnergyStats, HubError> {
    let parts: Vec<&str> = raw.trim().split('.').collect();
    if parts.len() < 4 {
        return Err(HubError::malformed(format!(
            "stats: expected 4 segments, got {}",
            parts.len()
        )));
    }
    let required = |i: usize, name: &str| {
        counter(parts[i]).ok_or_else(|| HubError::malformed(format!("stats: bad {} counter", name)))
    };
    Ok(EnergyStats {
        year: required(0, "year")?,
        month: required(1, "month")?,
        day: counter(parts[2]).unwrap_or(0.0),
        total: required(3, "total")?,
    })
}

/// Parse a `/qed` or `/qem` answer: `(NNNNNNNN...`. Zero or unreadable means "no value yet".
pub fn parse_history_value(raw: &str) -> Option<f64> {
    let body: String = raw.chars().skip(1).take(COUNTER_WIDTH).collect();
    match body.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v != 0.0 => Some(v),
        _ => None,
    }
}

/// Display rule shared by stats and history: above 1000 switch to kilo-units.
pub fn format_power(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0 W".to_string();
    }
    if value > 1000.0 {
        format!("{} kW", value / 1000.0)
    } else {
        format!("{} W", value)
    }
}

/// Inverse of [`format_power`].
pub fn parse_power(display: &str) -> Option<f64> {
    let display = display.trim();
    if let Some(kw) = display.strip_suffix(" kW") {
        // Scale in decimal so "1.001 kW" reads back as exactly 1001.
        return format!("{}e3", kw.trim()).parse::<f64>().ok();
    }
    display.strip_suffix(" W")?.parse::<f64>().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Sub,
    Sbu,
    #[default]
    Unknown,
}

impl WorkMode {
    /// Parse the `/worktype` answer.
    pub fn from_device(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "sub" => WorkMode::Sub,
            "sbu" => WorkMode::Sbu,
            _ => WorkMode::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkMode::Sub => "SUB (PV AC ACU)",
            WorkMode::Sbu => "SBU (PV ACU AC)",
            WorkMode::Unknown => "Unknown",
        }
    }

    /// Device path that switches the inverter into this mode.
    pub fn command_path(self) -> Option<&'static str> {
        match self {
            WorkMode::Sub => Some("/sub"),
            WorkMode::Sbu => Some("/sbu"),
            WorkMode::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkType {
    pub mode: WorkMode,
    pub label: String,
}

impl From<WorkMode> for WorkType {
    fn from(mode: WorkMode) -> Self {
        Self {
            mode,
            label: mode.label().to_string(),
        }
    }
}

/// Inverter commands succeed only when the answer carries `ACK` (and not `NAK`).
pub fn is_acknowledged(raw: &str) -> bool {
    raw.contains("ACK") && !raw.contains("NAK")
}

/// A read-surface value that is always well typed: degraded reads carry
/// `online = false`, the error text, and a default value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading<T> {
    pub online: bool,
    pub error: Option<String>,
    pub value: T,
}

impl<T: Default> Reading<T> {
    pub fn from_result(result: Result<T, HubError>) -> Self {
        match result {
            Ok(value) => Self {
                online: true,
                error: None,
                value,
            },
            Err(e) => Self {
                online: false,
                error: Some(e.to_string()),
                value: T::default(),
            },
        }
    }
}
