// reqwest implementation of the device status client
use crate::application::status_client::{FetchError, StatusClient};
use crate::domain::stats::DeviceStats;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::sync::RwLock;

/// One shared connection pool for every device and cycle.
pub struct HttpStatusClient {
    client: RwLock<reqwest::Client>,
}

impl HttpStatusClient {
    pub fn new() -> Self {
        Self {
            client: RwLock::new(build_client()),
        }
    }

    fn client(&self) -> reqwest::Client {
        self.client.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for HttpStatusClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("bitaxe-monitor/", env!("CARGO_PKG_VERSION")))
        // Devices live on the LAN.
        .no_proxy()
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_decode() {
        FetchError::Decode(error.to_string())
    } else {
        FetchError::Transport(error.to_string())
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn fetch_status(&self, url: &str) -> Result<DeviceStats, FetchError> {
        let response = self
            .client()
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let body = response.bytes().await.map_err(classify)?;
        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        DeviceStats::from_value(value).ok_or(FetchError::NotAnObject)
    }

    /// Replacing the client drops its pooled connections.
    fn abort(&self) {
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = build_client();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on an ephemeral port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/api/system/info", addr)
    }

    #[tokio::test]
    async fn test_fetch_parses_json_object() {
        let url = serve_once("200 OK", r#"{"hashRate": 550, "temp": 58}"#).await;
        let stats = HttpStatusClient::new().fetch_status(&url).await.unwrap();
        assert_eq!(stats.hashrate(), 550.0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let url = serve_once("500 Internal Server Error", "oops").await;
        let error = HttpStatusClient::new().fetch_status(&url).await.unwrap_err();
        assert_eq!(
            error,
            FetchError::Status {
                status: 500,
                body: "oops".into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_failure() {
        let url = serve_once("200 OK", "{not json").await;
        let error = HttpStatusClient::new().fetch_status(&url).await.unwrap_err();
        assert!(matches!(error, FetchError::Decode(_)));

        let url = serve_once("200 OK", "[1,2]").await;
        let error = HttpStatusClient::new().fetch_status(&url).await.unwrap_err();
        assert_eq!(error, FetchError::NotAnObject);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/api/system/info", addr);
        let error = HttpStatusClient::new().fetch_status(&url).await.unwrap_err();
        assert!(matches!(error, FetchError::Transport(_)));
    }
}
