// Watches the settings file and forwards edits to the session and scheduler
use super::config::{FileConfigStore, Settings};
use crate::application::scheduler::{PollScheduler, RECONFIGURE_DEBOUNCE};
use crate::application::session::TelemetrySession;
use crate::application::settings_store::SettingsStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const WATCH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsChange {
    /// Device list or legacy address edited.
    Devices,
    Interval(u64),
    Paused(bool),
    WindowMinutes(u64),
    SelectedDevice(String),
}

/// Changes between two settings snapshots that the core must act on.
pub fn diff_settings(previous: &Settings, next: &Settings) -> Vec<SettingsChange> {
    let mut changes = Vec::new();
    if previous.devices != next.devices || previous.bitaxe_ip != next.bitaxe_ip {
        changes.push(SettingsChange::Devices);
    }
    if previous.refresh_interval_secs() != next.refresh_interval_secs() {
        changes.push(SettingsChange::Interval(next.refresh_interval_secs()));
    }
    if previous.paused != next.paused {
        changes.push(SettingsChange::Paused(next.paused));
    }
    if previous.sparkline_window_minutes != next.sparkline_window_minutes {
        changes.push(SettingsChange::WindowMinutes(next.sparkline_window_minutes.max(1)));
    }
    if previous.selected_device_id != next.selected_device_id && !next.selected_device_id.is_empty() {
        changes.push(SettingsChange::SelectedDevice(next.selected_device_id.clone()));
    }
    changes
}

pub async fn watch_config(
    store: Arc<FileConfigStore>,
    session: Arc<TelemetrySession>,
    scheduler: PollScheduler,
    shutdown: CancellationToken,
) {
    let mut previous = store.current();
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let next = match store.reload_if_changed() {
            Ok(Some(next)) => next,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, path = %store.path().display(), "Failed to reload settings");
                continue;
            }
        };

        for change in diff_settings(&previous, &next) {
            tracing::debug!(?change, "Settings changed");
            match change {
                SettingsChange::Devices => scheduler.debounce_reconfigure(RECONFIGURE_DEBOUNCE),
                SettingsChange::Interval(secs) => scheduler.set_interval(secs),
                SettingsChange::Paused(true) => scheduler.pause(),
                SettingsChange::Paused(false) => scheduler.resume(),
                SettingsChange::WindowMinutes(minutes) => session.set_window_minutes(minutes).await,
                SettingsChange::SelectedDevice(id) => {
                    session.select_device(&id).await;
                }
            }
        }
        previous = next;
    }
}
