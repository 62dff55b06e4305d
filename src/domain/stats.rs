// Device stats domain model - one status payload from one poll
use super::coercion::{is_present, to_finite, to_number};
use serde::Serialize;
use serde_json::{Map, Value};

/// Ordered list of candidate field names. The first present, non-empty value wins.
pub type StatAlias = &'static [&'static str];

pub const EFFICIENCY_ALIASES: StatAlias = &[
    "efficiency",
    "efficiencyGHW",
    "efficiency_ghw",
    "ghw",
    "gh_per_watt",
    "hashRatePerWatt",
];
pub const RSSI_ALIASES: StatAlias = &["wifiRSSI", "wifi_rssi", "rssi", "signal", "wifiSignal"];
pub const WIFI_OBJECT_ALIASES: StatAlias = &["wifi", "wifiInfo", "wlan"];
pub const NESTED_RSSI_ALIASES: StatAlias = &["rssi", "RSSI", "signal", "signalDbm", "dbm"];
pub const IP_ALIASES: StatAlias = &["ipv4", "ipAddress"];
pub const VOLTAGE_RAIL_ALIASES: StatAlias = &["voltageRails", "voltage_rails", "voltages", "voltageMap"];
pub const ACCEPTED_SHARES_ALIASES: StatAlias = &["sharesAccepted", "accepted"];
pub const REJECTED_SHARES_ALIASES: StatAlias = &["sharesRejected", "rejected"];

/// Raw status payload. Always a JSON object; replaced wholesale every poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeviceStats(Map<String, Value>);

impl DeviceStats {
    /// Accepts only JSON objects; anything else is not a status payload.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str, fallback: f64) -> f64 {
        to_number(self.0.get(key), fallback)
    }

    pub fn finite(&self, key: &str) -> Option<f64> {
        to_finite(self.0.get(key))
    }

    /// Non-empty string value of a field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// First present, non-empty value among the aliases.
    pub fn lookup(&self, aliases: StatAlias) -> Option<&Value> {
        lookup_in(&self.0, aliases)
    }

    pub fn lookup_number(&self, aliases: StatAlias) -> Option<f64> {
        to_finite(self.lookup(aliases))
    }

    pub fn lookup_text(&self, aliases: StatAlias) -> Option<&str> {
        self.lookup(aliases)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn hashrate(&self) -> f64 {
        self.number("hashRate", 0.0)
    }

    pub fn power(&self) -> f64 {
        self.number("power", 0.0)
    }

    /// Reported efficiency (GH/W), else derived as hashrate / power.
    pub fn efficiency(&self) -> Option<f64> {
        if let Some(reported) = self.lookup_number(EFFICIENCY_ALIASES) {
            return Some(reported);
        }

        let hashrate = self.hashrate();
        let power = self.power();
        (hashrate > 0.0 && power > 0.0).then(|| hashrate / power)
    }

    /// Share counter, preferring a nested `shares` object when present.
    pub fn shares(&self, aliases: StatAlias) -> Option<f64> {
        if let Some(Value::Object(shares)) = self.0.get("shares") {
            if let Some(key) = aliases.iter().find(|key| shares.contains_key(**key)) {
                return to_finite(shares.get(*key));
            }
        }
        self.lookup_number(aliases)
    }

    /// WiFi signal in dBm from top-level aliases or a nested wifi object.
    pub fn wifi_rssi(&self) -> Option<f64> {
        if let Some(direct) = self.lookup_number(RSSI_ALIASES) {
            return Some(direct);
        }

        let wifi = WIFI_OBJECT_ALIASES
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_object))?;
        let key = NESTED_RSSI_ALIASES.iter().find(|key| wifi.contains_key(**key))?;
        to_finite(wifi.get(*key))
    }

    /// Voltage rails sorted by rail name. Empty when the device reports none.
    pub fn voltage_rails(&self) -> Vec<(String, Option<f64>)> {
        let Some(rails) = VOLTAGE_RAIL_ALIASES
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_object))
        else {
            return Vec::new();
        };

        let mut entries: Vec<(String, Option<f64>)> = rails
            .iter()
            .map(|(name, value)| (name.clone(), to_finite(Some(value))))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

fn lookup_in<'a>(map: &'a Map<String, Value>, aliases: StatAlias) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| is_present(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(value: Value) -> DeviceStats {
        DeviceStats::from_value(value).unwrap()
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(DeviceStats::from_value(json!([1, 2])).is_none());
        assert!(DeviceStats::from_value(json!("ok")).is_none());
    }

    #[test]
    fn test_efficiency_derived_from_hashrate_and_power() {
        let s = stats(json!({"hashRate": 550, "power": 12.0, "temp": 58}));
        let eff = s.efficiency().unwrap();
        assert!((eff - 45.8333).abs() < 1e-3);
    }

    #[test]
    fn test_efficiency_prefers_reported_alias() {
        let s = stats(json!({"hashRate": 550, "power": 12.0, "efficiency": "", "ghw": 40.5}));
        assert_eq!(s.efficiency(), Some(40.5));
    }

    #[test]
    fn test_efficiency_absent_without_power() {
        let s = stats(json!({"hashRate": 550, "power": 0}));
        assert_eq!(s.efficiency(), None);
    }

    #[test]
    fn test_wifi_rssi_from_nested_object() {
        let s = stats(json!({"wifiInfo": {"signalDbm": -61}}));
        assert_eq!(s.wifi_rssi(), Some(-61.0));

        let direct = stats(json!({"wifiRSSI": -50, "wifi": {"rssi": -70}}));
        assert_eq!(direct.wifi_rssi(), Some(-50.0));
    }

    #[test]
    fn test_shares_prefers_nested_object() {
        let s = stats(json!({"sharesAccepted": 10, "shares": {"sharesAccepted": 12}}));
        assert_eq!(s.shares(&["sharesAccepted"]), Some(12.0));

        let flat = stats(json!({"sharesAccepted": 10}));
        assert_eq!(flat.shares(&["sharesAccepted"]), Some(10.0));
    }

    #[test]
    fn test_voltage_rails_sorted_by_name() {
        let s = stats(json!({"voltage_rails": {"vcore": 1200, "3v3": 3.31, "5v": "bad"}}));
        let rails = s.voltage_rails();
        let names: Vec<&str> = rails.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["3v3", "5v", "vcore"]);
        assert_eq!(rails[1].1, None);
        assert_eq!(rails[2].1, Some(1200.0));
    }

    #[test]
    fn test_lookup_text_skips_empty() {
        let s = stats(json!({"ipv4": "", "ipAddress": "10.0.0.9"}));
        assert_eq!(s.lookup_text(IP_ALIASES), Some("10.0.0.9"));
    }
}
