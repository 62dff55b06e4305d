// Fetch coordinator - one concurrent poll of every configured device
use super::lock;
use super::status_client::{FailureKind, FetchError, StatusClient};
use crate::domain::device::Device;
use crate::domain::stats::DeviceStats;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOutcome {
    Success(DeviceStats),
    Failed {
        error: FetchError,
        /// Same failure as the previous one for this device.
        repeated: bool,
    },
    /// Superseded by cancellation; neither success nor failure.
    Dropped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolledDevice {
    pub device_id: String,
    /// Status URL the request went to.
    pub url: String,
    pub outcome: DeviceOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub cycle: u64,
    /// The cycle's token was cancelled before every fetch resolved.
    pub superseded: bool,
    /// One entry per polled device, in configuration order.
    pub outcomes: Vec<PolledDevice>,
}

#[cfg(test)]
impl CycleReport {
    pub fn outcome(&self, device_id: &str) -> Option<&DeviceOutcome> {
        self.outcomes
            .iter()
            .find(|polled| polled.device_id == device_id)
            .map(|polled| &polled.outcome)
    }
}

#[derive(Debug)]
pub enum PollResult {
    /// A previous cycle is still unresolved; nothing was started.
    Busy,
    Completed(CycleReport),
}

pub struct FetchCoordinator {
    client: Arc<dyn StatusClient>,
    token: Mutex<CancellationToken>,
    in_flight: Mutex<Option<u64>>,
    next_cycle: AtomicU64,
    last_failure: Mutex<HashMap<String, String>>,
}

struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<u64>>,
    cycle: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(self.slot);
        // A cancel may already have cleared the slot and a newer cycle taken it.
        if *slot == Some(self.cycle) {
            *slot = None;
        }
    }
}

impl FetchCoordinator {
    pub fn new(client: Arc<dyn StatusClient>) -> Self {
        Self {
            client,
            token: Mutex::new(CancellationToken::new()),
            in_flight: Mutex::new(None),
            next_cycle: AtomicU64::new(1),
            last_failure: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Fetch every configured device concurrently and wait for all of them.
    ///
    /// Devices without an address are skipped. Returns [`PollResult::Busy`]
    /// without doing anything while another cycle is outstanding.
    pub async fn poll_all(&self, devices: &[Device]) -> PollResult {
        let Some(guard) = self.begin_cycle() else {
            tracing::debug!("Poll cycle still in flight, ignoring request");
            return PollResult::Busy;
        };
        let cycle = guard.cycle;
        let token = lock(&self.token).clone();

        let fetches = devices
            .iter()
            .filter_map(|device| device.status_url().map(|url| (device, url)))
            .map(|(device, url)| self.fetch_one(device, url, &token));
        let outcomes = join_all(fetches).await;
        let superseded = token.is_cancelled();

        tracing::debug!(cycle, devices = outcomes.len(), superseded, "Poll cycle resolved");
        PollResult::Completed(CycleReport {
            cycle,
            superseded,
            outcomes,
        })
    }

    /// Cancel outstanding requests and hand out a fresh token for later work.
    pub fn cancel_in_flight(&self) {
        let old = std::mem::replace(&mut *lock(&self.token), CancellationToken::new());
        old.cancel();
        *lock(&self.in_flight) = None;
    }

    /// Stop a device's failure memo, e.g. after it was removed.
    pub fn forget(&self, device_id: &str) {
        lock(&self.last_failure).remove(device_id);
    }

    /// Cancel everything and release the client's connections.
    pub fn abort(&self) {
        self.cancel_in_flight();
        self.client.abort();
    }

    fn begin_cycle(&self) -> Option<InFlightGuard<'_>> {
        let mut slot = lock(&self.in_flight);
        if slot.is_some() {
            return None;
        }
        let cycle = self.next_cycle.fetch_add(1, Ordering::Relaxed);
        *slot = Some(cycle);
        Some(InFlightGuard {
            slot: &self.in_flight,
            cycle,
        })
    }

    async fn fetch_one(
        &self,
        device: &Device,
        url: String,
        token: &CancellationToken,
    ) -> PolledDevice {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.client.fetch_status(&url) => Some(result),
        };

        let outcome = match result {
            None => {
                tracing::trace!(device_id = %device.id, "Fetch cancelled");
                DeviceOutcome::Dropped
            }
            Some(Ok(stats)) => {
                if lock(&self.last_failure).remove(&device.id).is_some() {
                    tracing::info!(device_id = %device.id, address = %device.address, "Device reachable again");
                }
                DeviceOutcome::Success(stats)
            }
            Some(Err(error)) => {
                let repeated = self.note_failure(device, &error);
                DeviceOutcome::Failed { error, repeated }
            }
        };
        PolledDevice {
            device_id: device.id.clone(),
            url,
            outcome,
        }
    }

    fn note_failure(&self, device: &Device, error: &FetchError) -> bool {
        let signature = error.signature();
        let previous = lock(&self.last_failure).insert(device.id.clone(), signature.clone());
        let repeated = previous.as_deref() == Some(signature.as_str());

        if repeated {
            tracing::debug!(device_id = %device.id, %error, "Device still failing");
        } else {
            match error.kind() {
                FailureKind::Expected => {
                    tracing::warn!(device_id = %device.id, address = %device.address, %error, "Failed to fetch device stats")
                }
                FailureKind::Unexpected => {
                    tracing::error!(device_id = %device.id, address = %device.address, %error, "Device returned an invalid response")
                }
            }
        }
        repeated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    enum Response {
        Ok(Value),
        Err(FetchError),
        Hang,
    }

    struct FakeClient {
        responses: Mutex<HashMap<String, Response>>,
        hanging: Arc<Notify>,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(HashMap::new()),
                hanging: Arc::new(Notify::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn respond(&self, address: &str, response: Response) {
            let url = format!("http://{}/api/system/info", address);
            self.responses.lock().unwrap().insert(url, response);
        }
    }

    #[async_trait]
    impl StatusClient for FakeClient {
        async fn fetch_status(&self, url: &str) -> Result<DeviceStats, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = match self.responses.lock().unwrap().get(url) {
                Some(Response::Ok(value)) => Some(Ok(DeviceStats::from_value(value.clone()).unwrap())),
                Some(Response::Err(error)) => Some(Err(error.clone())),
                Some(Response::Hang) | None => None,
            };
            match response {
                Some(result) => result,
                None => {
                    self.hanging.notify_one();
                    std::future::pending().await
                }
            }
        }
    }

    fn device(id: &str, address: &str) -> Device {
        Device::new(id.to_string(), id.to_uppercase(), address.to_string())
    }

    #[tokio::test]
    async fn test_poll_all_collects_every_device() {
        let client = FakeClient::new();
        client.respond("a", Response::Ok(json!({"hashRate": 500})));
        client.respond("b", Response::Err(FetchError::Transport("refused".into())));
        let coordinator = FetchCoordinator::new(client.clone());

        let devices = vec![device("a", "a"), device("b", "b"), device("c", "")];
        let PollResult::Completed(report) = coordinator.poll_all(&devices).await else {
            panic!("expected a completed cycle");
        };

        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(report.outcome("a"), Some(DeviceOutcome::Success(_))));
        assert!(matches!(
            report.outcome("b"),
            Some(DeviceOutcome::Failed { repeated: false, .. })
        ));
        assert!(report.outcome("c").is_none());
        assert!(!report.superseded);
        assert_eq!(report.outcomes[0].url, "http://a/api/system/info");
        assert!(!coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_cancelled_device_is_dropped_not_failed() {
        let client = FakeClient::new();
        client.respond("a", Response::Ok(json!({"hashRate": 1})));
        client.respond("b", Response::Hang);
        client.respond("c", Response::Ok(json!({"hashRate": 3})));
        let coordinator = Arc::new(FetchCoordinator::new(client.clone()));

        let devices = vec![device("a", "a"), device("b", "b"), device("c", "c")];
        let task = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.poll_all(&devices).await }
        });

        client.hanging.notified().await;
        assert!(coordinator.is_in_flight());
        coordinator.cancel_in_flight();
        assert!(!coordinator.is_in_flight());

        let PollResult::Completed(report) = task.await.unwrap() else {
            panic!("expected a completed cycle");
        };
        assert!(matches!(report.outcome("a"), Some(DeviceOutcome::Success(_))));
        assert_eq!(report.outcome("b"), Some(&DeviceOutcome::Dropped));
        assert!(matches!(report.outcome("c"), Some(DeviceOutcome::Success(_))));
        assert!(report.superseded);
    }

    #[tokio::test]
    async fn test_second_poll_while_in_flight_is_busy() {
        let client = FakeClient::new();
        client.respond("a", Response::Hang);
        let coordinator = Arc::new(FetchCoordinator::new(client.clone()));
        let devices = vec![device("a", "a")];

        let task = tokio::spawn({
            let coordinator = coordinator.clone();
            let devices = devices.clone();
            async move { coordinator.poll_all(&devices).await }
        });
        client.hanging.notified().await;

        assert!(matches!(coordinator.poll_all(&devices).await, PollResult::Busy));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        coordinator.cancel_in_flight();
        assert!(matches!(task.await.unwrap(), PollResult::Completed(_)));
    }

    #[tokio::test]
    async fn test_new_token_after_cancel() {
        let client = FakeClient::new();
        client.respond("a", Response::Ok(json!({})));
        let coordinator = FetchCoordinator::new(client.clone());
        coordinator.cancel_in_flight();

        let PollResult::Completed(report) = coordinator.poll_all(&[device("a", "a")]).await else {
            panic!("expected a completed cycle");
        };
        assert!(matches!(report.outcome("a"), Some(DeviceOutcome::Success(_))));
        assert!(!report.superseded);
    }

    #[tokio::test]
    async fn test_repeated_failures_are_marked() {
        let client = FakeClient::new();
        client.respond("a", Response::Err(FetchError::Timeout));
        let coordinator = FetchCoordinator::new(client.clone());
        let devices = vec![device("a", "a")];

        let repeated = |result: PollResult| match result {
            PollResult::Completed(report) => match report.outcome("a") {
                Some(DeviceOutcome::Failed { repeated, .. }) => *repeated,
                other => panic!("unexpected outcome {:?}", other),
            },
            PollResult::Busy => panic!("unexpected busy"),
        };

        assert!(!repeated(coordinator.poll_all(&devices).await));
        assert!(repeated(coordinator.poll_all(&devices).await));

        client.respond("a", Response::Err(FetchError::Decode("eof".into())));
        assert!(!repeated(coordinator.poll_all(&devices).await));

        client.respond("a", Response::Ok(json!({})));
        coordinator.poll_all(&devices).await;
        client.respond("a", Response::Err(FetchError::Decode("eof".into())));
        assert!(!repeated(coordinator.poll_all(&devices).await));
    }
}
