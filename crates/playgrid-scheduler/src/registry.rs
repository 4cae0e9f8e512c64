//! Host registry operations: registration, heartbeats, mode and capability
//! mutations.
//!
//! Registration is an idempotent upsert keyed by host id. Hosts are never
//! deleted; they decay to offline when heartbeats stop or the agent reports
//! a graceful shutdown.

use chrono::{DateTime, Utc};
use playgrid_core::{HostCapabilities, HostMode, HostStatus, SlotPolicy, StreamHealth};
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, SchedulerError};
use crate::events::EventKind;
use crate::state::{Host, SchedulerState};

/// Registration payload sent by a host agent.
#[derive(Debug, Clone, Deserialize)]
pub struct HostSpec {
    pub host_id: String,
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub mode: Option<HostMode>,
    #[serde(default)]
    pub capabilities: Option<HostCapabilities>,
    #[serde(default)]
    pub slot_policy: Option<SlotPolicy>,
    #[serde(default)]
    pub stream_health: Option<StreamHealth>,
}

fn normalise_capacity(capacity: Option<u32>, fallback: u32) -> u32 {
    capacity.filter(|&c| c >= 1).unwrap_or_else(|| fallback.max(1))
}

impl SchedulerState {
    /// Registers or updates a host. First registration in `maintenance` mode
    /// starts offline; anything else starts online with a fresh heartbeat.
    pub fn register_host(
        &mut self,
        spec: HostSpec,
        default_capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let host_id = spec.host_id.trim().to_owned();
        let name = spec.name.trim().to_owned();
        if host_id.is_empty() || name.is_empty() {
            return Err(SchedulerError::Validation(
                "host_id and name are required".to_owned(),
            ));
        }

        let region = spec
            .region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("local")
            .to_owned();

        let mut capabilities = spec.capabilities.unwrap_or_default();
        capabilities.normalise();
        let mut stream_health = spec.stream_health.unwrap_or_default();
        stream_health.normalise();
        stream_health.updated_at = Some(now);
        let mode = spec.mode.unwrap_or_default();

        let status = if mode == HostMode::Maintenance {
            HostStatus::Offline
        } else {
            HostStatus::Online
        };

        let existing = self.hosts.iter().position(|h| h.id == host_id);
        let updated = match existing {
            Some(index) => {
                let host = &mut self.hosts[index];
                host.name = name;
                host.region = region;
                host.capacity = normalise_capacity(spec.capacity, host.capacity);
                host.capabilities = capabilities;
                host.slot_policy = spec.slot_policy.unwrap_or(host.slot_policy);
                host.stream_health = stream_health;
                host.mode = mode;
                host.status = status;
                host.last_heartbeat_at = Some(now);
                host.clone()
            }
            None => {
                let host = Host {
                    id: host_id.clone(),
                    name,
                    region,
                    capacity: normalise_capacity(spec.capacity, default_capacity),
                    active_sessions: 0,
                    status,
                    mode,
                    capabilities,
                    slot_policy: spec.slot_policy.unwrap_or_default(),
                    stream_health,
                    last_heartbeat_at: Some(now),
                    registered_at: now,
                };
                self.hosts.push(host.clone());
                host
            }
        };

        self.record_event(
            EventKind::HostRegister,
            json!({
                "host_id": updated.id,
                "region": updated.region,
                "mode": updated.mode.as_str(),
            }),
            now,
        );

        Ok(updated)
    }

    /// Refreshes a host's heartbeat, flipping it online unless in
    /// maintenance, and optionally merging a stream-health report.
    pub fn heartbeat_host(
        &mut self,
        host_id: &str,
        stream_health: Option<StreamHealth>,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;

        if host.mode != HostMode::Maintenance {
            host.status = HostStatus::Online;
        }
        if let Some(mut health) = stream_health {
            health.normalise();
            health.updated_at = Some(now);
            host.stream_health = health;
        }
        host.last_heartbeat_at = Some(now);
        Ok(host.clone())
    }

    /// Graceful shutdown signal from the agent.
    pub fn set_host_offline(&mut self, host_id: &str, now: DateTime<Utc>) -> Result<Host> {
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;
        host.status = HostStatus::Offline;
        let snapshot = host.clone();

        self.record_event(
            EventKind::HostOffline,
            json!({ "host_id": snapshot.id }),
            now,
        );
        Ok(snapshot)
    }

    /// Sets a host's administrative mode. Maintenance forces the host
    /// offline immediately; returning to active restores it online with a
    /// fresh heartbeat.
    pub fn set_host_mode(&mut self, host_id: &str, mode: HostMode, now: DateTime<Utc>) -> Result<Host> {
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;

        host.mode = mode;
        match mode {
            HostMode::Maintenance => host.status = HostStatus::Offline,
            HostMode::Active => {
                host.status = HostStatus::Online;
                host.last_heartbeat_at = Some(now);
            }
            HostMode::Draining => {}
        }
        let snapshot = host.clone();

        self.record_event(
            EventKind::HostModeUpdated,
            json!({
                "host_id": snapshot.id,
                "mode": snapshot.mode.as_str(),
                "status": snapshot.status,
            }),
            now,
        );
        Ok(snapshot)
    }

    /// Admin mutation of the capability profile.
    pub fn set_host_capabilities(
        &mut self,
        host_id: &str,
        mut capabilities: HostCapabilities,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        capabilities.normalise();
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;
        host.capabilities = capabilities;
        let snapshot = host.clone();

        self.record_event(
            EventKind::HostCapabilitiesUpdated,
            json!({
                "host_id": snapshot.id,
                "capabilities": snapshot.capabilities,
            }),
            now,
        );
        Ok(snapshot)
    }

    /// Admin mutation of the slot-reservation policy.
    pub fn set_host_slot_policy(
        &mut self,
        host_id: &str,
        slot_policy: SlotPolicy,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;
        host.slot_policy = slot_policy;
        let snapshot = host.clone();

        self.record_event(
            EventKind::HostSlotPolicyUpdated,
            json!({
                "host_id": snapshot.id,
                "slot_policy": snapshot.slot_policy,
            }),
            now,
        );
        Ok(snapshot)
    }

    /// Admin mutation of capacity. Values below one are clamped.
    pub fn set_host_capacity(&mut self, host_id: &str, capacity: u32, now: DateTime<Utc>) -> Result<Host> {
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;
        host.capacity = capacity.max(1);
        let snapshot = host.clone();

        self.record_event(
            EventKind::HostCapacityUpdated,
            json!({
                "host_id": snapshot.id,
                "capacity": snapshot.capacity,
            }),
            now,
        );
        Ok(snapshot)
    }

    /// Replaces the host's stream-health report.
    pub fn set_host_stream_health(
        &mut self,
        host_id: &str,
        mut health: StreamHealth,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        health.normalise();
        health.updated_at = Some(now);
        let host = self
            .host_mut(host_id)
            .ok_or_else(|| SchedulerError::HostNotFound(host_id.to_owned()))?;
        host.stream_health = health;
        let snapshot = host.clone();

        self.record_event(
            EventKind::HostStreamHealthUpdated,
            json!({
                "host_id": snapshot.id,
                "audio_ready": snapshot.stream_health.audio_ready,
                "network_ok": snapshot.stream_health.network_ok,
                "network_type": snapshot.stream_health.network_type,
            }),
            now,
        );
        Ok(snapshot)
    }
}
