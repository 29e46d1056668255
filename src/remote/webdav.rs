use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};

use super::{RemoteStore, RemoteTarget, DATABASE_CONTENT_TYPE};
use crate::error::{AppError, Result};

/// Plain GET/PUT against a WebDAV server using HTTP Basic auth.
pub struct WebDavStore {
    client: Client,
}

impl WebDavStore {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("thinknote-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Human-readable reason for a non-success status.
fn describe_status(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("authentication failed (HTTP {})", status.as_u16())
        }
        StatusCode::NOT_FOUND => "database file not found (HTTP 404)".to_string(),
        status => format!("HTTP {}", status),
    }
}

async fn error_body(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    text.chars().take(200).collect()
}

#[async_trait]
impl RemoteStore for WebDavStore {
    async fn fetch_database(&self, target: &RemoteTarget) -> Result<Vec<u8>> {
        let url = target.database_url();
        tracing::debug!("Downloading {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(
                &target.credentials.username,
                Some(&target.credentials.password),
            )
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            tracing::debug!("GET {} returned {}: {}", url, status, body);
            return Err(AppError::RemoteUnavailable(describe_status(status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;
        tracing::debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn store_database(&self, target: &RemoteTarget, bytes: Vec<u8>) -> Result<()> {
        let url = target.database_url();
        tracing::debug!("Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .client
            .put(&url)
            .basic_auth(
                &target.credentials.username,
                Some(&target.credentials.password),
            )
            .header(CONTENT_TYPE, DATABASE_CONTENT_TYPE)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::RemoteWriteFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            tracing::debug!("PUT {} returned {}: {}", url, status, body);
            return Err(AppError::RemoteWriteFailed(describe_status(status)));
        }

        Ok(())
    }
}
