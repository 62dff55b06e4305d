// Telemetry session - owns the device registry and sparkline buffers
use super::coordinator::{CycleReport, DeviceOutcome, FetchCoordinator, PollResult, PolledDevice};
use super::registry::{DeviceRegistry, LoadOutcome};
use super::scheduler::CycleRunner;
use super::settings_store::SettingsStore;
use super::status_client::StatusClient;
use crate::domain::metric::MetricKey;
use crate::domain::series::{Sample, TimeSeriesBuffer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock, RwLockReadGuard};
use tokio::time::Instant;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Exactly one per completed cycle, after every outcome was applied.
    CycleComplete { cycle: u64, online: usize, total: usize },
    SeriesUpdated {
        device_id: String,
        metric: MetricKey,
        sample: Sample,
    },
}

/// Everything the presentation reads: devices, latest payloads, histories.
#[derive(Debug)]
pub struct TelemetryContext {
    pub registry: DeviceRegistry,
    series: HashMap<(String, MetricKey), TimeSeriesBuffer>,
    window_secs: u64,
}

impl TelemetryContext {
    pub fn new(window_secs: u64) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            series: HashMap::new(),
            window_secs,
        }
    }

    pub fn series(&self, device_id: &str, metric: MetricKey) -> Option<&TimeSeriesBuffer> {
        self.series.get(&(device_id.to_string(), metric))
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn set_window_secs(&mut self, window_secs: u64) {
        self.window_secs = window_secs;
        for buffer in self.series.values_mut() {
            buffer.set_window_seconds(window_secs);
        }
    }

    /// Drop history for removed devices and clear it for re-addressed ones.
    pub fn apply_load(&mut self, outcome: &LoadOutcome) {
        self.series.retain(|(id, _), _| !outcome.removed.contains(id));
        for ((id, _), buffer) in self.series.iter_mut() {
            if outcome.readdressed.contains(id) {
                buffer.clear();
            }
        }
    }

    /// Fold one cycle's outcomes into the registry and buffers.
    ///
    /// Outcomes for devices that were removed or re-addressed since the
    /// request went out are ignored.
    pub fn apply_cycle(&mut self, report: &CycleReport, now: Instant) -> Vec<TelemetryEvent> {
        let mut events = Vec::new();

        for PolledDevice { device_id, url, outcome } in &report.outcomes {
            let current_url = self.registry.device(device_id).and_then(|d| d.status_url());
            if current_url.as_deref() != Some(url.as_str()) {
                tracing::debug!(%device_id, %url, "Ignoring outcome for a stale address");
                continue;
            }
            match outcome {
                DeviceOutcome::Success(stats) => {
                    for metric in MetricKey::ALL {
                        let value = metric.extract(stats);
                        let window_secs = self.window_secs;
                        let buffer = self
                            .series
                            .entry((device_id.clone(), metric))
                            .or_insert_with(|| TimeSeriesBuffer::new(window_secs));
                        buffer.push_at(value, now);
                        if !buffer.take_dirty() {
                            continue;
                        }
                        if let Some(sample) = buffer.latest() {
                            events.push(TelemetryEvent::SeriesUpdated {
                                device_id: device_id.clone(),
                                metric,
                                sample: *sample,
                            });
                        }
                    }
                    self.registry.record_success(device_id, stats.clone());
                }
                DeviceOutcome::Failed { .. } => {
                    self.registry.record_failure(device_id);
                    for metric in MetricKey::ALL {
                        if let Some(buffer) = self.series.get_mut(&(device_id.clone(), metric)) {
                            buffer.push_at(None, now);
                        }
                    }
                }
                DeviceOutcome::Dropped => {}
            }
        }

        events
    }
}

pub struct TelemetrySession {
    context: RwLock<TelemetryContext>,
    coordinator: FetchCoordinator,
    settings: Arc<dyn SettingsStore>,
    events: broadcast::Sender<TelemetryEvent>,
}

impl TelemetrySession {
    /// Build the session and load the configured devices, migrating a legacy
    /// single address when needed.
    pub fn new(settings: Arc<dyn SettingsStore>, client: Arc<dyn StatusClient>) -> Self {
        let current = settings.current();
        let mut context = TelemetryContext::new(current.sparkline_window_secs());
        context
            .registry
            .set_last_selected(Some(current.selected_device_id.clone()));
        let outcome = context.registry.load(current.devices.clone(), &current.bitaxe_ip);
        persist_migration(settings.as_ref(), &context.registry, &outcome);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            context: RwLock::new(context),
            coordinator: FetchCoordinator::new(client),
            settings,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.events.subscribe()
    }

    /// Read-only view for rendering between cycles.
    pub async fn read(&self) -> RwLockReadGuard<'_, TelemetryContext> {
        self.context.read().await
    }

    pub fn settings(&self) -> Arc<dyn SettingsStore> {
        self.settings.clone()
    }

    pub async fn reload_devices(&self) {
        let current = self.settings.current();
        let mut context = self.context.write().await;
        let outcome = context.registry.load(current.devices.clone(), &current.bitaxe_ip);
        context.apply_load(&outcome);
        persist_migration(self.settings.as_ref(), &context.registry, &outcome);
        for id in &outcome.removed {
            self.coordinator.forget(id);
        }
        tracing::info!(
            devices = context.registry.devices().len(),
            removed = outcome.removed.len(),
            readdressed = outcome.readdressed.len(),
            "Device list reloaded"
        );
    }

    pub async fn set_window_minutes(&self, minutes: u64) {
        let mut context = self.context.write().await;
        context.set_window_secs(minutes.max(1) * 60);
    }

    pub async fn select_device(&self, device_id: &str) -> bool {
        self.context.write().await.registry.select(device_id)
    }
}

fn persist_migration(settings: &dyn SettingsStore, registry: &DeviceRegistry, outcome: &LoadOutcome) {
    let Some(device) = &outcome.migrated else {
        return;
    };
    if let Err(e) = settings.persist_migration(registry.devices(), &device.id) {
        tracing::error!(error = %e, "Failed to persist migrated device list");
    }
}

#[async_trait]
impl CycleRunner for TelemetrySession {
    fn is_busy(&self) -> bool {
        self.coordinator.is_in_flight()
    }

    async fn run_cycle(&self) {
        let devices = self.context.read().await.registry.devices().to_vec();
        let report = match self.coordinator.poll_all(&devices).await {
            PollResult::Busy => return,
            PollResult::Completed(report) => report,
        };
        if report.superseded {
            tracing::debug!(cycle = report.cycle, "Discarding superseded cycle");
            return;
        }

        let (events, online, total) = {
            let mut context = self.context.write().await;
            let events = context.apply_cycle(&report, Instant::now());
            (
                events,
                context.registry.online_count(),
                context.registry.devices().len(),
            )
        };

        for event in events {
            let _ = self.events.send(event);
        }
        let _ = self.events.send(TelemetryEvent::CycleComplete {
            cycle: report.cycle,
            online,
            total,
        });
        tracing::debug!(cycle = report.cycle, online, total, "Cycle complete");
    }

    fn cancel_in_flight(&self) {
        self.coordinator.cancel_in_flight();
    }

    async fn reconfigure(&self) {
        self.reload_devices().await;
    }

    fn shutdown(&self) {
        self.coordinator.abort();
    }
}
