// Scatter-gather poll over a fixed device list.
// One request per device, all in flight at once; a failing device degrades its own slot only.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::device_client::{DeviceClient, DeviceRequest};
use crate::error::HubError;
use crate::models::{AggregateResult, DeviceOutcome, DeviceQuery, Outcome, StreamEvent};

#[derive(Clone)]
pub struct ScatterGatherPoller {
    client: Arc<dyn DeviceClient>,
    request_timeout: Duration,
}

impl ScatterGatherPoller {
    pub fn new(client: Arc<dyn DeviceClient>, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    async fn query_one(&self, index: usize, device: &DeviceQuery) -> DeviceOutcome {
        let req = DeviceRequest::get(&device.address, &device.path);
        let result = match tokio::time::timeout(self.request_timeout, self.client.request(req)).await
        {
            Ok(r) => r,
            Err(_) => Err(HubError::network(&device.device_id, "timeout")),
        };
        let outcome = match result {
            Ok(resp) => Outcome::Success {
                payload: resp.payload,
            },
            Err(e) => {
                warn!(device = %device.device_id, error = %e, operation = "poll", "device poll failed");
                Outcome::Failure {
                    cause: e.to_string(),
                }
            }
        };
        DeviceOutcome::new(index, device.device_id.clone(), outcome)
    }

    /// Polls every device and returns only once all of them reached a terminal outcome.
    #[instrument(skip_all, fields(component = "poller", operation = "poll", devices = devices.len()))]
    pub async fn poll(&self, devices: &[DeviceQuery]) -> AggregateResult {
        let outcomes = join_all(
            devices
                .iter()
                .enumerate()
                .map(|(i, d)| self.query_one(i, d)),
        )
        .await;
        AggregateResult { outcomes }
    }

    /// Pushes each outcome to `tx` as soon as it resolves (arrival order), then `Done`.
    /// Stops early when the receiver goes away.
    #[instrument(skip_all, fields(component = "poller", operation = "poll_streaming", devices = devices.len()))]
    pub async fn poll_streaming(&self, devices: &[DeviceQuery], tx: mpsc::Sender<StreamEvent>) {
        let mut pending: FuturesUnordered<_> = devices
            .iter()
            .enumerate()
            .map(|(i, d)| self.query_one(i, d))
            .collect();
        while let Some(outcome) = pending.next().await {
            if tx.send(StreamEvent::Outcome(outcome)).await.is_err() {
                debug!("stream receiver dropped");
                return;
            }
        }
        let _ = tx
            .send(StreamEvent::Done {
                total: devices.len(),
            })
            .await;
    }
}
