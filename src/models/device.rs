// Device queries and per-device outcomes of a scatter-gather poll

use serde::{Deserialize, Serialize};

/// One device to poll. Defined by configuration, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    pub device_id: String,
    pub address: String,
    pub path: String,
}

impl DeviceQuery {
    pub fn new(
        device_id: impl Into<String>,
        address: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            path: path.into(),
        }
    }
}

/// Raw device answer: JSON when the device says so, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// Text form of the payload (JSON is re-serialized).
    pub fn to_text(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Json(v) => v.to_string(),
        }
    }
}

/// Terminal state of one device request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success { payload: Payload },
    Failure { cause: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Outcome tagged with the position and id of the device that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceOutcome {
    pub index: usize,
    pub device_id: String,
    pub online: bool,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl DeviceOutcome {
    pub fn new(index: usize, device_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            index,
            device_id: device_id.into(),
            online: outcome.is_success(),
            outcome,
        }
    }
}

/// Index-aligned outcomes: `outcomes[i]` always belongs to the i-th queried device.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AggregateResult {
    pub outcomes: Vec<DeviceOutcome>,
}

impl AggregateResult {
    /// Placeholder published before the first poll completes.
    pub fn pending(devices: &[DeviceQuery]) -> Self {
        let outcomes = devices
            .iter()
            .enumerate()
            .map(|(i, d)| {
                DeviceOutcome::new(
                    i,
                    d.device_id.clone(),
                    Outcome::Failure {
                        cause: "pending".to_string(),
                    },
                )
            })
            .collect();
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceOutcome> {
        self.outcomes.get(index)
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.online).count()
    }
}

/// Event emitted by the streaming poll variant, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    Outcome(DeviceOutcome),
    Done { total: usize },
}
