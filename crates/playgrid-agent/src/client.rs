//! HTTP client for the control-plane host surface.

use playgrid_core::{GpuTier, HostCapabilities};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Agent errors.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The control plane refused the request.
    #[error("control plane rejected request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// The control plane never became healthy.
    #[error("control plane not healthy within {0:?}")]
    HealthTimeout(Duration),

    /// Registration attempts exhausted.
    #[error("registration failed after {attempts} attempts")]
    RegistrationExhausted { attempts: u32 },
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Registration payload sent to `/api/hosts/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub host_id: String,
    pub name: String,
    pub region: String,
    pub capacity: u32,
    pub capabilities: HostCapabilities,
}

impl Registration {
    /// Builds a registration from the agent's advertised profile.
    #[must_use]
    pub fn new(
        host_id: &str,
        name: &str,
        region: &str,
        capacity: u32,
        gpu_tier: GpuTier,
        max_fps: u32,
        supported_games: Vec<String>,
    ) -> Self {
        Self {
            host_id: host_id.to_owned(),
            name: name.to_owned(),
            region: region.to_owned(),
            capacity: capacity.max(1),
            capabilities: HostCapabilities {
                supported_games,
                gpu_tier,
                max_fps,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Client for the host-agent surface of the control plane.
#[derive(Debug, Clone)]
pub struct ControlClient {
    client: Client,
    base_url: String,
    host_key: String,
}

impl ControlClient {
    /// Creates a client.
    pub fn new(base_url: &str, host_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(AgentError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            host_key: host_key.to_owned(),
        })
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| status.to_string());
        Err(AgentError::Rejected { status, message })
    }

    /// Probes the control-plane health endpoint.
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::expect_success(response).await
    }

    /// Registers (or re-registers) this host.
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let url = format!("{}/api/hosts/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-host-key", &self.host_key)
            .json(registration)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// Sends a heartbeat.
    pub async fn heartbeat(&self, host_id: &str) -> Result<()> {
        let url = format!("{}/api/hosts/{host_id}/heartbeat", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-host-key", &self.host_key)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// Best-effort graceful offline report.
    pub async fn offline(&self, host_id: &str) -> Result<()> {
        let url = format!("{}/api/hosts/{host_id}/offline", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-host-key", &self.host_key)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::expect_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = ControlClient::new("http://localhost:5500/", "key");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "http://localhost:5500");
    }

    #[test]
    fn registration_clamps_capacity() {
        let registration =
            Registration::new("h1", "Rig", "local", 0, GpuTier::Basic, 60, Vec::new());
        assert_eq!(registration.capacity, 1);
    }
}
