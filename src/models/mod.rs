// Domain models: device outcomes, inverter telemetry, history buckets, TV guide

mod device;
mod guide;
mod history;
mod inverter;

pub use device::{AggregateResult, DeviceOutcome, DeviceQuery, Outcome, Payload, StreamEvent};
pub use guide::{GuideChannel, GuideEntry};
pub use history::{BucketView, HistoryBucket, HistoryPeriod};
pub use inverter::{
    BatteryReading, EnergyStats, EnergyStatsDisplay, InverterParams, LineReading, PowerReading,
    PvReading, Reading, StatsReport, WorkMode, WorkType, format_power, is_acknowledged,
    parse_history_value, parse_params, parse_power, parse_stats,
};
