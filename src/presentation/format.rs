// Display formatting for device stats
use crate::domain::coercion::to_finite;
use crate::infrastructure::config::HashrateUnit;
use serde_json::Value;

/// Shown wherever a value is unavailable.
pub const PLACEHOLDER: &str = "--";

/// Automatic unit selection switches to TH/s at this many GH/s.
const TERAHASH_THRESHOLD: f64 = 1000.0;

fn placeholder() -> String {
    PLACEHOLDER.to_string()
}

/// Hashrate reported in GH/s.
pub fn format_hashrate(gigahash: f64, unit: HashrateUnit) -> String {
    if !gigahash.is_finite() || gigahash == 0.0 {
        return "0 GH/s".to_string();
    }

    let terahash = match unit {
        HashrateUnit::TeraHash => true,
        HashrateUnit::GigaHash => false,
        HashrateUnit::Auto => gigahash >= TERAHASH_THRESHOLD,
    };
    if terahash {
        format!("{:.2} TH/s", gigahash / 1000.0)
    } else {
        format!("{:.2} GH/s", gigahash)
    }
}

pub fn format_efficiency(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => format!("{:.2} GH/W", v),
        _ => placeholder(),
    }
}

pub fn format_temperature(celsius: f64) -> String {
    // Adding zero turns -0 into 0.
    format!("{}°C", celsius.round() + 0.0)
}

pub fn format_power(watts: f64) -> String {
    format!("{:.2}W", watts)
}

/// Rail readings at or above 20 are millivolts, below are volts.
pub fn format_voltage(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v >= 20.0 => format!("{:.0} mV", v),
        Some(v) if v.is_finite() => format!("{:.2} V", v),
        _ => placeholder(),
    }
}

pub fn format_frequency(mhz: f64) -> String {
    if !mhz.is_finite() || mhz <= 0.0 {
        return placeholder();
    }
    format!("{:.0} MHz", mhz)
}

pub fn format_fan(rpm: Option<f64>) -> String {
    match rpm {
        Some(v) if v.is_finite() && v > 0.0 => format!("{:.0} RPM", v),
        _ => placeholder(),
    }
}

pub fn format_rssi(dbm: Option<f64>) -> String {
    match dbm {
        Some(v) if v.is_finite() => format!("{:.0} dBm", v),
        _ => placeholder(),
    }
}

pub fn format_count(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", v.round()),
        _ => placeholder(),
    }
}

/// Uptime as `Nd Nh Nm`, dropping leading zero units. Non-numeric text is
/// shown as-is.
pub fn format_uptime(value: Option<&Value>) -> String {
    let Some(value) = value.filter(|v| !v.is_null() && v.as_str() != Some("")) else {
        return placeholder();
    };
    let Some(seconds) = to_finite(Some(value)) else {
        return match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
    };

    let seconds = seconds.max(0.0).floor() as u64;
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn format_difficulty(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return placeholder();
    }

    const SUFFIXES: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
    for (scale, suffix) in SUFFIXES {
        if value >= scale {
            return format!("{:.2}{}", value / scale, suffix);
        }
    }
    format!("{}", value.round())
}

pub fn format_bytes(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return placeholder();
    }

    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    if value >= MB {
        format!("{:.2} MB", value / MB)
    } else if value >= KB {
        format!("{:.2} KB", value / KB)
    } else {
        format!("{} B", value.round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hashrate_units() {
        assert_eq!(format_hashrate(550.0, HashrateUnit::Auto), "550.00 GH/s");
        assert_eq!(format_hashrate(1250.0, HashrateUnit::Auto), "1.25 TH/s");
        assert_eq!(format_hashrate(550.0, HashrateUnit::TeraHash), "0.55 TH/s");
        assert_eq!(format_hashrate(1250.0, HashrateUnit::GigaHash), "1250.00 GH/s");
        assert_eq!(format_hashrate(0.0, HashrateUnit::Auto), "0 GH/s");
        assert_eq!(format_hashrate(f64::NAN, HashrateUnit::TeraHash), "0 GH/s");
    }

    #[test]
    fn test_efficiency_and_temperature() {
        assert_eq!(format_efficiency(Some(550.0 / 12.0)), "45.83 GH/W");
        assert_eq!(format_efficiency(Some(0.0)), "--");
        assert_eq!(format_efficiency(None), "--");
        assert_eq!(format_temperature(58.0), "58°C");
        assert_eq!(format_temperature(57.6), "58°C");
        assert_eq!(format_temperature(-0.4), "0°C");
    }

    #[test]
    fn test_voltage_switches_between_millivolts_and_volts() {
        assert_eq!(format_voltage(Some(1200.0)), "1200 mV");
        assert_eq!(format_voltage(Some(20.0)), "20 mV");
        assert_eq!(format_voltage(Some(5.1)), "5.10 V");
        assert_eq!(format_voltage(None), "--");
    }

    #[test]
    fn test_non_positive_values_are_placeholders() {
        assert_eq!(format_frequency(0.0), "--");
        assert_eq!(format_frequency(485.0), "485 MHz");
        assert_eq!(format_fan(Some(0.0)), "--");
        assert_eq!(format_fan(Some(3120.0)), "3120 RPM");
        assert_eq!(format_rssi(Some(-61.0)), "-61 dBm");
        assert_eq!(format_rssi(None), "--");
        assert_eq!(format_count(Some(41.6)), "42");
    }

    #[test]
    fn test_uptime() {
        assert_eq!(format_uptime(Some(&json!(90_061))), "1d 1h 1m");
        assert_eq!(format_uptime(Some(&json!(3_720))), "1h 2m");
        assert_eq!(format_uptime(Some(&json!("59"))), "0m");
        assert_eq!(format_uptime(Some(&json!("booting"))), "booting");
        assert_eq!(format_uptime(Some(&json!(""))), "--");
        assert_eq!(format_uptime(None), "--");
    }

    #[test]
    fn test_difficulty_suffixes() {
        assert_eq!(format_difficulty(512.0), "512");
        assert_eq!(format_difficulty(4_096.0), "4.10K");
        assert_eq!(format_difficulty(2.5e9), "2.50B");
        assert_eq!(format_difficulty(1.2e12), "1.20T");
        assert_eq!(format_difficulty(0.0), "--");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(150_000.0), "146.48 KB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0), "3.00 MB");
        assert_eq!(format_bytes(-1.0), "--");
    }
}
