//! HTTP client for the guildboard API server.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// API response wrapper matching the server's envelope.
#[derive(Debug, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[allow(dead_code)]
    pub error_code: Option<String>,
}

/// HTTP client for the guildboard API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an enveloped response and unwrap the data.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;

        unwrap_envelope(api_resp)
    }

    /// GET a bare (non-enveloped) response, as served by /health.
    pub async fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("API error ({})", status);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// POST a JSON body and unwrap the enveloped response.
    ///
    /// Lifecycle rejections (404/409) still carry an envelope with a
    /// human-readable message, so those are surfaced as-is rather than as
    /// raw HTTP failures.
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = resp.status();
        let is_domain_rejection =
            status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::CONFLICT;

        if !status.is_success() && !is_domain_rejection {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;

        unwrap_envelope(api_resp)
    }
}

fn unwrap_envelope<T>(resp: ApiResponse<T>) -> Result<T> {
    if resp.success {
        resp.data
            .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
    } else {
        Err(anyhow::anyhow!(
            "{}",
            resp.error.unwrap_or_else(|| "Unknown error".into())
        ))
    }
}
