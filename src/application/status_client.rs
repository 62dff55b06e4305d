// Client trait for reading a device's status endpoint
use crate::domain::stats::DeviceStats;
use async_trait::async_trait;

/// How a failed fetch should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Device unreachable, refused, reset or timed out.
    Expected,
    /// Device answered but misbehaved: bad status with a body, or malformed JSON.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("device returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("response is not a JSON object")]
    NotAnObject,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport(_) | FetchError::Timeout => FailureKind::Expected,
            FetchError::Status { body, .. } if body.trim().is_empty() => FailureKind::Expected,
            FetchError::Status { .. } | FetchError::Decode(_) | FetchError::NotAnObject => {
                FailureKind::Unexpected
            }
        }
    }

    /// Stable identity of a failure, used to suppress repeats per device.
    pub fn signature(&self) -> String {
        match self {
            FetchError::Status { status, .. } => format!("status:{}", status),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait StatusClient: Send + Sync {
    /// GET the status URL and parse the body as a JSON object.
    async fn fetch_status(&self, url: &str) -> Result<DeviceStats, FetchError>;

    /// Drop pooled connections; later calls may reconnect.
    fn abort(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(FetchError::Timeout.kind(), FailureKind::Expected);
        assert_eq!(FetchError::Transport("refused".into()).kind(), FailureKind::Expected);
        assert_eq!(FetchError::Decode("eof".into()).kind(), FailureKind::Unexpected);
        assert_eq!(
            FetchError::Status { status: 500, body: "boom".into() }.kind(),
            FailureKind::Unexpected
        );
        assert_eq!(
            FetchError::Status { status: 503, body: "".into() }.kind(),
            FailureKind::Expected
        );
    }

    #[test]
    fn test_signature_ignores_body() {
        let a = FetchError::Status { status: 500, body: "x".into() };
        let b = FetchError::Status { status: 500, body: "y".into() };
        assert_eq!(a.signature(), b.signature());
    }
}
