use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::FetchError;

/// Where calendar text comes from.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpCalendarSource {
    client: reqwest::Client,
}

impl HttpCalendarSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpCalendarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarSource for HttpCalendarSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            // bare paths are treated as local files
            Err(_) if url.starts_with('/') || url.starts_with('.') => {
                return read_file(url).await;
            }
            Err(_) => return Err(FetchError::InvalidUrl(url.to_string())),
        };

        match parsed.scheme() {
            "http" | "https" => {
                let response = self
                    .client
                    .get(parsed)
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::debug!(error = %e, "calendar request failed");
                        FetchError::Network(url.to_string())
                    })?;
                if !response.status().is_success() {
                    return Err(FetchError::Status(response.status().as_u16()));
                }
                response
                    .text()
                    .await
                    .map_err(|_| FetchError::Network(url.to_string()))
            }
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
                read_file(&path.to_string_lossy()).await
            }
            _ => Err(FetchError::InvalidUrl(url.to_string())),
        }
    }
}

async fn read_file(path: &str) -> Result<String, FetchError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FetchError::Io(format!("{}: {}", path, e)))
}
