// Device domain model
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const STATUS_PATH: &str = "/api/system/info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
    /// Host, host:port or full URL. Stored as `ip` for compatibility with
    /// existing device lists.
    #[serde(rename = "ip", alias = "address", default)]
    pub address: String,
}

impl Device {
    pub fn new(id: String, nickname: String, address: String) -> Self {
        Self {
            id,
            nickname,
            address,
        }
    }

    /// Create a device with a freshly generated id.
    pub fn with_generated_id(nickname: String, address: String) -> Self {
        Self::new(generate_id(), nickname, address)
    }

    pub fn is_configured(&self) -> bool {
        !self.address.trim().is_empty()
    }

    /// Nickname, or the address when no nickname was given.
    pub fn display_name(&self) -> &str {
        if self.nickname.trim().is_empty() {
            self.address.trim()
        } else {
            &self.nickname
        }
    }

    /// URL of the device's status endpoint, `None` when unconfigured.
    pub fn status_url(&self) -> Option<String> {
        let address = self.address.trim().trim_end_matches('/');
        if address.is_empty() {
            return None;
        }

        if address.contains("://") {
            if address.ends_with(STATUS_PATH) {
                Some(address.to_string())
            } else {
                Some(format!("{}{}", address, STATUS_PATH))
            }
        } else {
            Some(format!("http://{}{}", address, STATUS_PATH))
        }
    }
}

/// Opaque id: millisecond timestamp plus a process-local counter, base 36.
pub fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", to_base36(millis), to_base36(seq))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
