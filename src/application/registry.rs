// Device registry - configured devices and their latest payloads
use crate::domain::device::Device;
use crate::domain::stats::DeviceStats;
use crate::domain::view::{resolve_default_view, DefaultView, View};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const MIGRATED_NICKNAME: &str = "My Bitaxe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// No address configured; never polled.
    Unconfigured,
    /// Configured, no outcome yet.
    Connecting,
    Online,
    Disconnected,
}

impl DeviceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Unconfigured => "No IP set",
            DeviceStatus::Connecting => "Connecting...",
            DeviceStatus::Online => "Online",
            DeviceStatus::Disconnected => "Disconnected",
        }
    }
}

/// What changed in a [`DeviceRegistry::load`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadOutcome {
    /// Device synthesized from the legacy single-address setting.
    pub migrated: Option<Device>,
    pub removed: Vec<String>,
    /// Devices whose address changed; their history no longer applies.
    pub readdressed: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    stats: HashMap<String, DeviceStats>,
    status: HashMap<String, DeviceStatus>,
    last_seen: HashMap<String, DateTime<Utc>>,
    selected: Option<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the device set.
    ///
    /// An empty list plus a legacy address yields one synthesized device; the
    /// caller persists it. Duplicate ids keep their first occurrence.
    pub fn load(&mut self, raw: Vec<Device>, legacy_address: &str) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        let mut incoming = raw;
        if incoming.is_empty() && !legacy_address.trim().is_empty() {
            let device =
                Device::with_generated_id(MIGRATED_NICKNAME.to_string(), legacy_address.trim().to_string());
            tracing::info!(device_id = %device.id, "Migrated single address to device list");
            outcome.migrated = Some(device.clone());
            self.selected = Some(device.id.clone());
            incoming.push(device);
        }

        let mut seen = HashSet::new();
        incoming.retain(|device| {
            let fresh = seen.insert(device.id.clone());
            if !fresh {
                tracing::warn!(device_id = %device.id, "Ignoring device with duplicate id");
            }
            fresh
        });

        for old in &self.devices {
            match incoming.iter().find(|d| d.id == old.id) {
                None => outcome.removed.push(old.id.clone()),
                Some(new) if new.address.trim() != old.address.trim() => {
                    outcome.readdressed.push(old.id.clone())
                }
                Some(_) => {}
            }
        }

        for id in outcome.removed.iter().chain(outcome.readdressed.iter()) {
            self.stats.remove(id);
            self.status.remove(id);
            self.last_seen.remove(id);
        }
        for device in &incoming {
            let initial = if device.is_configured() {
                DeviceStatus::Connecting
            } else {
                DeviceStatus::Unconfigured
            };
            match self.status.get(&device.id) {
                Some(_) if device.is_configured() => {}
                _ => {
                    self.stats.remove(&device.id);
                    self.last_seen.remove(&device.id);
                    self.status.insert(device.id.clone(), initial);
                }
            }
        }

        let selection_gone = self
            .selected
            .as_ref()
            .is_some_and(|selected| !incoming.iter().any(|d| &d.id == selected));
        if selection_gone {
            self.selected = None;
        }

        self.devices = incoming;
        outcome
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn latest_stats(&self, id: &str) -> Option<&DeviceStats> {
        self.stats.get(id)
    }

    pub fn status(&self, id: &str) -> Option<DeviceStatus> {
        self.status.get(id).copied()
    }

    /// Wall-clock time of the last successful poll.
    pub fn last_seen(&self, id: &str) -> Option<DateTime<Utc>> {
        self.last_seen.get(id).copied()
    }

    /// Replace the device's payload wholesale.
    pub fn record_success(&mut self, id: &str, stats: DeviceStats) {
        if self.device(id).is_none() {
            return;
        }
        self.stats.insert(id.to_string(), stats);
        self.status.insert(id.to_string(), DeviceStatus::Online);
        self.last_seen.insert(id.to_string(), Utc::now());
    }

    /// Forget the device's payload: unknown, not zero.
    pub fn record_failure(&mut self, id: &str) {
        if self.device(id).is_none() {
            return;
        }
        self.stats.remove(id);
        self.status.insert(id.to_string(), DeviceStatus::Disconnected);
    }

    pub fn online_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| self.stats.contains_key(&d.id))
            .count()
    }

    pub fn select(&mut self, id: &str) -> bool {
        if self.device(id).is_some() {
            self.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn set_last_selected(&mut self, id: Option<String>) {
        self.selected = id.filter(|id| !id.is_empty());
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn resolve_view(&self, configured: DefaultView) -> View {
        let ids: Vec<&str> = self.devices.iter().map(|d| d.id.as_str()).collect();
        resolve_default_view(&ids, configured, self.selected())
    }
}
