// Metrics recorded as sparkline history
use super::stats::DeviceStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Hashrate,
    AsicTemp,
    VrmTemp,
    Power,
    Efficiency,
    FanRpm,
    Frequency,
}

impl MetricKey {
    pub const ALL: [MetricKey; 7] = [
        MetricKey::Hashrate,
        MetricKey::AsicTemp,
        MetricKey::VrmTemp,
        MetricKey::Power,
        MetricKey::Efficiency,
        MetricKey::FanRpm,
        MetricKey::Frequency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Hashrate => "hashrate",
            MetricKey::AsicTemp => "asic_temp",
            MetricKey::VrmTemp => "vrm_temp",
            MetricKey::Power => "power",
            MetricKey::Efficiency => "efficiency",
            MetricKey::FanRpm => "fan_rpm",
            MetricKey::Frequency => "frequency",
        }
    }

    /// Value of this metric in one payload; `None` becomes a gap in the series.
    pub fn extract(&self, stats: &DeviceStats) -> Option<f64> {
        match self {
            MetricKey::Hashrate => stats.finite("hashRate"),
            MetricKey::AsicTemp => stats.finite("temp"),
            MetricKey::VrmTemp => stats.finite("vrTemp"),
            MetricKey::Power => stats.finite("power"),
            MetricKey::Efficiency => stats.efficiency(),
            MetricKey::FanRpm => stats.finite("fanrpm"),
            MetricKey::Frequency => stats.finite("frequency"),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricKey {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_round_trips_names() {
        assert_eq!("fan_rpm".parse::<MetricKey>().unwrap(), MetricKey::FanRpm);
        assert!("voltage".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_extract_missing_field_is_gap() {
        let stats = DeviceStats::from_value(json!({"hashRate": "abc", "temp": 61.5})).unwrap();
        assert_eq!(MetricKey::Hashrate.extract(&stats), None);
        assert_eq!(MetricKey::AsicTemp.extract(&stats), Some(61.5));
        assert_eq!(MetricKey::FanRpm.extract(&stats), None);
    }
}
