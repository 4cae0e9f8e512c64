//! Server configuration.

use playgrid_scheduler::SchedulerConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP API configuration.
    pub api: ApiConfig,
    /// Credential configuration.
    pub auth: AuthConfig,
    /// Tick driver configuration.
    pub worker: WorkerConfig,
    /// Scheduler tunables.
    pub scheduler: SchedulerConfig,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5500),
        }
    }
}

/// Shared-secret credentials for host agents and the orchestrator.
///
/// Caller identity is resolved by the upstream auth proxy and arrives as
/// headers; these keys only protect the agent and orchestrator surfaces.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub host_key: String,
    pub orchestrator_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            host_key: "playgrid-host-key".to_owned(),
            orchestrator_key: "playgrid-orchestrator-key".to_owned(),
        }
    }
}

/// Tick driver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Run the periodic tick loop in-process. When false, an external
    /// orchestrator must drive `/internal/orchestrator/tick` and
    /// session-facing routes refuse service once its ticks go stale.
    pub embedded: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { embedded: true }
    }
}
