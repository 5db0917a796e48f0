// Shared test helpers: scripted device client and a test config

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use homehub::device_client::{DeviceClient, DeviceRequest, DeviceResponse};
use homehub::error::HubError;
use homehub::models::Payload;

/// What a scripted route answers, optionally after a delay.
#[derive(Debug, Clone)]
pub struct Script {
    pub delay: Option<Duration>,
    pub result: Result<Payload, String>,
    pub panic: bool,
}

impl Script {
    pub fn text(s: &str) -> Self {
        Self {
            delay: None,
            panic: false,
            result: Ok(Payload::Text(s.to_string())),
        }
    }

    pub fn json(v: serde_json::Value) -> Self {
        Self {
            delay: None,
            panic: false,
            result: Ok(Payload::Json(v)),
        }
    }

    pub fn fail(cause: &str) -> Self {
        Self {
            delay: None,
            panic: false,
            result: Err(cause.to_string()),
        }
    }

    /// Device call that panics inside the polling task.
    pub fn panics() -> Self {
        Self {
            panic: true,
            ..Self::fail("panicked")
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Device client answering from a route table keyed by `address + path`.
/// Unknown routes fail like a refused connection. Every call is recorded.
#[derive(Default)]
pub struct MockClient {
    routes: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<DeviceRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, path: &str, script: Script) -> Self {
        self.set(address, path, script);
        self
    }

    pub fn set(&self, address: &str, path: &str, script: Script) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{}{}", address, path), script);
    }

    pub fn calls(&self) -> Vec<DeviceRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, address: &str, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.address == address && r.path == path)
            .count()
    }
}

#[async_trait]
impl DeviceClient for MockClient {
    async fn request(&self, req: DeviceRequest) -> Result<DeviceResponse, HubError> {
        let key = format!("{}{}", req.address, req.path);
        let address = req.address.clone();
        self.calls.lock().unwrap().push(req);
        let script = self.routes.lock().unwrap().get(&key).cloned();
        let Some(script) = script else {
            return Err(HubError::network(address, "connection refused"));
        };
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        if script.panic {
            panic!("scripted device panic for {}", key);
        }
        script
            .result
            .map(|payload| DeviceResponse {
                status: 200,
                payload,
            })
            .map_err(|cause| HubError::network(address, cause))
    }
}

pub const INVERTER: &str = "10.0.0.40";
pub const SOCKET_A: &str = "10.0.0.51";
pub const SOCKET_B: &str = "10.0.0.52";
pub const LIGHT: &str = "10.0.0.61";

/// `/params` answer with every field populated.
pub const PARAMS_ANSWER: &str = "(230.1 49.9 229.8 50.0 0483 0412 010 380 26.40 008 085 0034 02.1 180.5 00.00 00000 00010110 00 00 00377 010";

pub fn test_config(guide_source: &str) -> String {
    format!(
        r#"
[server]
port = 8081
host = "0.0.0.0"

[client]
request_timeout_ms = 500

[polling]
interval_secs = 1
history_every_ticks = 5
stats_log_interval_secs = 60

[inverter]
address = "{inverter}"
telemetry_window_secs = 10

[[sockets]]
name = "kitchen"
address = "{a}"

[[sockets]]
name = "garage"
address = "{b}"
status_path = "/status"

[[lights]]
name = "living-room"
address = "{light}"
status_path = "/state"

[guide]
source = "{source}"
channels = [
    {{ name = "TVP1", number = 1 }},
    {{ name = "TVN", number = 3 }},
]
"#,
        inverter = INVERTER,
        a = SOCKET_A,
        b = SOCKET_B,
        light = LIGHT,
        source = guide_source,
    )
}
