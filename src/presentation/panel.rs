// Panel label, stat rows and the farm aggregate
use super::format::{
    format_bytes, format_count, format_difficulty, format_efficiency, format_fan, format_frequency,
    format_hashrate, format_power, format_rssi, format_temperature, format_uptime, format_voltage,
    PLACEHOLDER,
};
use crate::application::registry::{DeviceRegistry, DeviceStatus};
use crate::domain::device::Device;
use crate::domain::stats::{DeviceStats, ACCEPTED_SHARES_ALIASES, IP_ALIASES, REJECTED_SHARES_ALIASES};
use crate::domain::view::View;
use crate::infrastructure::config::{HashrateUnit, Settings};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const EMPTY_LABEL: &str = "Bitaxe: --";
const FALLBACK_LABEL: &str = "Bitaxe";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatRow {
    pub section: &'static str,
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RailRow {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    #[serde(flatten)]
    pub device: Device,
    pub name: String,
    pub status: DeviceStatus,
    pub status_label: &'static str,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceDetail {
    #[serde(flatten)]
    pub summary: DeviceSummary,
    pub rows: Vec<StatRow>,
    pub voltage_rails: Vec<RailRow>,
}

/// Totals over devices that currently have live stats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmSummary {
    pub online: usize,
    pub total: usize,
    pub total_hashrate: f64,
    pub total_power: f64,
    pub mean_temperature: Option<f64>,
    pub shares_accepted: f64,
    pub shares_rejected: f64,
    pub hashrate_text: String,
    pub power_text: String,
    pub temperature_text: String,
}

pub fn summarize(registry: &DeviceRegistry, device: &Device) -> DeviceSummary {
    let status = registry.status(&device.id).unwrap_or(DeviceStatus::Unconfigured);
    DeviceSummary {
        device: device.clone(),
        name: device.display_name().to_string(),
        status,
        status_label: status.label(),
        last_seen: registry.last_seen(&device.id),
    }
}

pub fn device_detail(registry: &DeviceRegistry, device: &Device, unit: HashrateUnit) -> DeviceDetail {
    let stats = registry.latest_stats(&device.id);
    DeviceDetail {
        summary: summarize(registry, device),
        rows: stat_rows(stats, unit),
        voltage_rails: stats.map(rail_rows).unwrap_or_default(),
    }
}

/// Label for the resolved view.
pub fn panel_label(registry: &DeviceRegistry, view: &View, settings: &Settings) -> String {
    match view {
        View::Empty => EMPTY_LABEL.to_string(),
        View::Farm => {
            let farm = farm_summary(registry, settings.hashrate_unit);
            format!(
                "{}/{} online{}{}",
                farm.online,
                farm.total,
                padded(settings.separator()),
                farm.hashrate_text
            )
        }
        View::Single(id) => match registry.latest_stats(id) {
            Some(stats) => single_label(stats, settings),
            None => registry
                .status(id)
                .unwrap_or(DeviceStatus::Unconfigured)
                .label()
                .to_string(),
        },
    }
}

fn padded(separator: &str) -> String {
    format!(" {} ", separator)
}

/// Toggled parts for one device joined by the configured separator.
pub fn single_label(stats: &DeviceStats, settings: &Settings) -> String {
    let mut parts = Vec::new();

    if settings.show_hashrate {
        parts.push(format_hashrate(stats.hashrate(), settings.hashrate_unit));
    }
    if settings.show_temperature {
        parts.push(format_temperature(stats.number("temp", 0.0)));
    }
    if settings.show_vrm_temp {
        parts.push(format!("VRM:{}", format_temperature(stats.number("vrTemp", 0.0))));
    }
    if settings.show_power {
        parts.push(format!("{:.1}W", stats.power()));
    }
    if settings.show_efficiency {
        if let Some(efficiency) = stats.efficiency() {
            parts.push(format!("{:.1}GH/W", efficiency));
        }
    }
    if settings.show_fan_rpm {
        let rpm = stats.number("fanrpm", 0.0);
        if rpm > 0.0 {
            parts.push(format!("{}RPM", rpm));
        }
    }
    if settings.show_frequency {
        let mhz = stats.number("frequency", 0.0);
        if mhz > 0.0 {
            parts.push(format!("{}MHz", mhz));
        }
    }
    if settings.show_shares {
        let accepted = stats.shares(ACCEPTED_SHARES_ALIASES).unwrap_or(0.0);
        parts.push(format!("{}sh", accepted));
    }
    if settings.show_uptime {
        let seconds = stats.number("uptimeSeconds", 0.0);
        if seconds > 0.0 {
            let seconds = seconds.floor() as u64;
            let (hours, minutes) = (seconds / 3600, (seconds % 3600) / 60);
            if hours > 0 {
                parts.push(format!("{}h{}m", hours, minutes));
            } else {
                parts.push(format!("{}m", minutes));
            }
        }
    }

    if parts.is_empty() {
        FALLBACK_LABEL.to_string()
    } else {
        parts.join(&padded(settings.separator()))
    }
}

fn row(section: &'static str, key: &'static str, label: &'static str, value: String) -> StatRow {
    StatRow {
        section,
        key,
        label,
        value,
    }
}

fn text_or(stats: &DeviceStats, key: &str, fallback: &str) -> String {
    stats.text(key).unwrap_or(fallback).to_string()
}

/// Detail rows in display order. Every value is `--` without stats.
pub fn stat_rows(stats: Option<&DeviceStats>, unit: HashrateUnit) -> Vec<StatRow> {
    let Some(s) = stats else {
        return ROW_LAYOUT
            .iter()
            .map(|&(section, key, label)| row(section, key, label, PLACEHOLDER.to_string()))
            .collect();
    };

    let temp_target = s.number("temptarget", 0.0).round();
    let core_voltage = s.number("coreVoltageActual", 0.0);
    let values = [
        format_hashrate(s.hashrate(), unit),
        format_hashrate(s.number("hashRate_1m", 0.0), unit),
        format_hashrate(s.number("hashRate_10m", 0.0), unit),
        format_hashrate(s.number("hashRate_1h", 0.0), unit),
        format!("{:.2}%", s.number("errorPercentage", 0.0)),
        format_temperature(s.number("temp", 0.0)),
        format_temperature(s.number("vrTemp", 0.0)),
        if temp_target > 0.0 {
            format_temperature(temp_target)
        } else {
            PLACEHOLDER.to_string()
        },
        format_power(s.power()),
        format!("{:.0}mV", s.number("voltage", 0.0)),
        format!("{:.0}mA", s.number("current", 0.0)),
        if core_voltage > 0.0 {
            format!("{}mV", core_voltage)
        } else {
            PLACEHOLDER.to_string()
        },
        format_fan(s.finite("fanrpm")),
        format_frequency(s.number("frequency", 0.0)),
        format_efficiency(s.efficiency()),
        if s.number("overclockEnabled", 0.0) == 1.0 {
            "Enabled".to_string()
        } else {
            "Disabled".to_string()
        },
        text_or(s, "stratumURL", "Not connected"),
        format_difficulty(s.number("poolDifficulty", 0.0)),
        text_or(s, "fallbackStratumURL", PLACEHOLDER),
        format_count(Some(s.shares(ACCEPTED_SHARES_ALIASES).unwrap_or(0.0))),
        format_count(Some(s.shares(REJECTED_SHARES_ALIASES).unwrap_or(0.0))),
        format_difficulty(s.number("bestDiff", 0.0)),
        format_difficulty(s.number("bestSessionDiff", 0.0)),
        format_uptime(s.get("uptimeSeconds")),
        text_or(s, "ASICModel", "Unknown"),
        text_or(s, "version", "Unknown"),
        text_or(s, "boardVersion", PLACEHOLDER),
        s.lookup_text(IP_ALIASES).unwrap_or(PLACEHOLDER).to_string(),
        text_or(s, "ssid", PLACEHOLDER),
        format_rssi(s.wifi_rssi()),
        format_bytes(s.number("freeHeap", 0.0)),
    ];

    ROW_LAYOUT
        .iter()
        .zip(values)
        .map(|(&(section, key, label), value)| row(section, key, label, value))
        .collect()
}

const ROW_LAYOUT: [(&str, &str, &str); 31] = [
    ("Hashrate", "hashrate", "Hashrate"),
    ("Hashrate", "hashrate_1m", "Hashrate 1m"),
    ("Hashrate", "hashrate_10m", "Hashrate 10m"),
    ("Hashrate", "hashrate_1h", "Hashrate 1h"),
    ("Hashrate", "error_rate", "Error Rate"),
    ("Temperature", "asic_temp", "ASIC Temp"),
    ("Temperature", "vrm_temp", "VRM Temp"),
    ("Temperature", "temp_target", "Temp Target"),
    ("Power", "power", "Power"),
    ("Power", "voltage", "Voltage"),
    ("Power", "current", "Current"),
    ("Power", "core_voltage", "Core Voltage"),
    ("Performance", "fan", "Fan"),
    ("Performance", "frequency", "Frequency"),
    ("Performance", "efficiency", "Efficiency"),
    ("Performance", "overclock", "Overclock"),
    ("Pool", "pool", "Pool"),
    ("Pool", "pool_difficulty", "Pool Diff"),
    ("Pool", "fallback_pool", "Fallback Pool"),
    ("Shares", "shares_accepted", "Accepted"),
    ("Shares", "shares_rejected", "Rejected"),
    ("Shares", "best_diff", "Best Diff"),
    ("Shares", "best_session_diff", "Session Best"),
    ("System", "uptime", "Uptime"),
    ("System", "model", "Model"),
    ("System", "version", "Version"),
    ("System", "board_version", "Board Version"),
    ("Network", "ip_address", "IP Address"),
    ("Network", "ssid", "SSID"),
    ("Network", "wifi_rssi", "Wi-Fi RSSI"),
    ("Network", "free_heap", "Free Heap"),
];

pub fn rail_rows(stats: &DeviceStats) -> Vec<RailRow> {
    stats
        .voltage_rails()
        .into_iter()
        .map(|(name, value)| RailRow {
            name,
            value: format_voltage(value),
        })
        .collect()
}

pub fn farm_summary(registry: &DeviceRegistry, unit: HashrateUnit) -> FarmSummary {
    let live: Vec<&DeviceStats> = registry
        .devices()
        .iter()
        .filter_map(|d| registry.latest_stats(&d.id))
        .collect();

    let total_hashrate: f64 = live.iter().map(|s| s.hashrate()).sum();
    let total_power: f64 = live.iter().map(|s| s.power()).sum();
    let temps: Vec<f64> = live.iter().filter_map(|s| s.finite("temp")).collect();
    let mean_temperature = (!temps.is_empty()).then(|| temps.iter().sum::<f64>() / temps.len() as f64);

    FarmSummary {
        online: live.len(),
        total: registry.devices().len(),
        total_hashrate,
        total_power,
        mean_temperature,
        shares_accepted: live.iter().filter_map(|s| s.shares(ACCEPTED_SHARES_ALIASES)).sum(),
        shares_rejected: live.iter().filter_map(|s| s.shares(REJECTED_SHARES_ALIASES)).sum(),
        hashrate_text: format_hashrate(total_hashrate, unit),
        power_text: format_power(total_power),
        temperature_text: mean_temperature
            .map(format_temperature)
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    }
}
