use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::settings::RecallSettings;
use crate::error::{AppError, Result};

/// Raw page/image retrieval. Headers and timeout belong to the implementation.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `PageFetcher` over a shared reqwest client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &RecallSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::trace!("[HTTP] GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::network(format!("{url}: failed to read body: {e}")))?;
        tracing::trace!("[HTTP] Received {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}

/// Builds the client with the configured default headers and timeout.
pub fn create_client(settings: &RecallSettings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &settings.request_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::config(format!("invalid header value for {name}: {e}")))?;
        headers.insert(name, value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .map_err(|e| AppError::config(format!("failed to build HTTP client: {e}")))
}

/// Decodes fetched markup, honouring a byte-order mark and falling back to UTF-8.
pub fn decode_markup(bytes: &[u8]) -> String {
    let encoding = encoding_rs::Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!("[HTTP] Markup contained invalid {} sequences", encoding.name());
    }
    text.into_owned()
}

/// Enforces the fixed pause between successive origin requests.
///
/// The first request of a run goes out immediately; every later one waits
/// `delay` first.
pub struct RequestPacer {
    delay: Duration,
    requests: usize,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, requests: 0 }
    }

    pub fn from_millis(delay_ms: u64) -> Self {
        Self::new(Duration::from_millis(delay_ms))
    }

    pub async fn wait_turn(&mut self) {
        if self.requests > 0 && !self.delay.is_zero() {
            tracing::trace!("[HTTP] Waiting {}ms before next request", self.delay.as_millis());
            sleep(self.delay).await;
        }
        self.requests += 1;
    }

    pub fn requests(&self) -> usize {
        self.requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PersistenceMode;

    fn settings() -> RecallSettings {
        RecallSettings::defaults_with_mode(PersistenceMode::Append)
    }

    #[test]
    fn test_decode_markup_strips_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<p>café</p>".as_bytes());
        assert_eq!(decode_markup(&bytes), "<p>café</p>");
    }

    #[test]
    fn test_decode_markup_utf16_bom() {
        let bytes = [0xFF, 0xFE, b'o', 0, b'k', 0];
        assert_eq!(decode_markup(&bytes), "ok");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut settings = settings();
        settings
            .request_headers
            .insert("Bad Header".to_string(), "x".to_string());
        let err = create_client(&settings).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_pacer_waits_after_first_request() {
        let mut pacer = RequestPacer::from_millis(20);
        let start = std::time::Instant::now();
        pacer.wait_turn().await;
        assert!(start.elapsed() < Duration::from_millis(20));
        pacer.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(pacer.requests(), 2);
    }

    // ===== Integration tests for HttpFetcher using mock server =====

    #[tokio::test]
    async fn test_fetch_sends_configured_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/recalls")
            .match_header("accept-language", "en-US,en;q=0.9")
            .match_header("user-agent", mockito::Matcher::Regex("Mozilla/5.0".into()))
            .with_status(200)
            .with_body("<table></table>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/recalls", server.url()))
            .await
            .unwrap();
        assert_eq!(body, b"<table></table>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.jpg")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing.jpg", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)));
        assert!(err.to_string().contains("404"));
    }
}
