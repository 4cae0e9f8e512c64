//! PlayGrid host agent binary.
//!
//! Registers this rig with the control plane (with bounded, jittered
//! backoff), heartbeats on a fixed interval, re-registers after repeated
//! heartbeat failures, and reports offline on SIGINT/SIGTERM before
//! exiting.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use rand::Rng;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod client;
mod config;

use client::{AgentError, ControlClient, Registration};
use config::AgentConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("playgrid_agent=info".parse()?),
        )
        .init();

    let config: AgentConfig = Figment::new()
        .merge(Toml::file("agent.toml"))
        .merge(Env::prefixed("PLAYGRID_AGENT_").split("__"))
        .extract()?;

    info!(
        api = %config.api_base_url,
        host_id = %config.host_id,
        region = %config.region,
        capacity = config.capacity,
        "host agent starting"
    );

    let client = ControlClient::new(&config.api_base_url, &config.host_key)?;
    let registration = Registration::new(
        &config.host_id,
        &config.host_name,
        &config.region,
        config.capacity,
        config.gpu_tier,
        config.max_fps,
        config.supported_games.clone(),
    );

    if config.wait_for_health {
        wait_for_health(&client, config.health_wait_timeout).await?;
    }

    register_with_backoff(&client, &registration, &config).await?;
    info!(host_id = %config.host_id, "registered with control plane");

    run_heartbeat_loop(&client, &registration, &config).await;

    info!(host_id = %config.host_id, "shutdown signal received, reporting offline");
    if let Err(e) = client.offline(&config.host_id).await {
        warn!(error = %e, "offline report failed");
    }

    Ok(())
}

/// Polls the health endpoint until it answers or the timeout elapses.
async fn wait_for_health(client: &ControlClient, timeout: Duration) -> Result<(), AgentError> {
    let deadline = Instant::now() + timeout;
    let poll = Duration::from_millis(500);

    loop {
        match client.health().await {
            Ok(()) => return Ok(()),
            Err(e) if Instant::now() + poll < deadline => {
                warn!(error = %e, "control plane not healthy yet");
                sleep(poll).await;
            }
            Err(_) => return Err(AgentError::HealthTimeout(timeout)),
        }
    }
}

/// Registers with exponential backoff plus uniform jitter, up to the
/// configured attempt count.
async fn register_with_backoff(
    client: &ControlClient,
    registration: &Registration,
    config: &AgentConfig,
) -> Result<(), AgentError> {
    let attempts = config.register_max_attempts.max(1);
    let mut backoff = config.register_backoff;

    for attempt in 1..=attempts {
        match client.register(registration).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if attempt == attempts {
                    error!(error = %e, attempt, "registration failed, giving up");
                    return Err(AgentError::RegistrationExhausted { attempts });
                }
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
                warn!(
                    error = %e,
                    attempt,
                    retry_in_ms = (backoff + jitter).as_millis() as u64,
                    "registration failed, retrying"
                );
                sleep(backoff + jitter).await;
                backoff = (backoff * 2).min(config.register_backoff_max);
            }
        }
    }

    Err(AgentError::RegistrationExhausted { attempts })
}

/// Heartbeats until a shutdown signal arrives. After the configured number
/// of consecutive failures the agent re-registers, since the control plane
/// may have restarted and lost this host.
async fn run_heartbeat_loop(
    client: &ControlClient,
    registration: &Registration,
    config: &AgentConfig,
) {
    let mut ticker = interval(config.heartbeat_interval);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.heartbeat(&registration.host_id).await {
                    Ok(()) => {
                        consecutive_failures = 0;
                        info!(host_id = %registration.host_id, "heartbeat ok");
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            error = %e,
                            consecutive_failures,
                            "heartbeat failed"
                        );
                        if consecutive_failures >= config.heartbeat_failure_threshold {
                            info!("re-registering after repeated heartbeat failures");
                            if let Err(e) = register_with_backoff(client, registration, config).await {
                                error!(error = %e, "re-registration failed");
                            }
                            consecutive_failures = 0;
                        }
                    }
                }
            }
            () = shutdown_signal() => break,
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
