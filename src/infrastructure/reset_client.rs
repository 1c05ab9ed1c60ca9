// HTTP client for the telemetry server's reset command
use crate::application::telemetry_source::TelemetrySource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct HttpResetClient {
    client: reqwest::Client,
    reset_url: Url,
}

#[derive(Debug, Deserialize)]
struct ResetResponse {
    #[serde(default)]
    status: Option<String>,
}

impl HttpResetClient {
    pub fn new(reset_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            reset_url,
        }
    }
}

#[async_trait]
impl TelemetrySource for HttpResetClient {
    async fn request_reset(&self) -> Result<()> {
        let response = self
            .client
            .post(self.reset_url.clone())
            .send()
            .await
            .context("Failed to send reset request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Reset request failed with status {}: {}", status, body);
        }

        // The acknowledgement body is informational only
        match response.json::<ResetResponse>().await {
            Ok(ResetResponse { status: Some(status) }) => {
                tracing::info!("Server acknowledged reset: {}", status)
            }
            Ok(_) | Err(_) => tracing::info!("Server acknowledged reset"),
        }

        Ok(())
    }
}
