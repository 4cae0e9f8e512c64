//! PlayGrid server binary.
//!
//! Serves the session-scheduler API and, unless configured otherwise,
//! drives the matchmaker on an internal interval.

use chrono::Utc;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use playgrid_scheduler::Scheduler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use playgrid_server::{api, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("playgrid_server=info".parse()?),
        )
        .init();

    info!("PlayGrid server starting");

    let config: ServerConfig = Figment::new()
        .merge(Toml::file("playgrid.toml"))
        .merge(Env::prefixed("PLAYGRID_").split("__"))
        .extract()?;

    info!(listen_addr = %config.api.listen_addr, "configuration loaded");

    let scheduler = Arc::new(Scheduler::new(config.scheduler.clone(), Utc::now()));
    info!(
        heartbeat_timeout_secs = config.scheduler.heartbeat_timeout.as_secs(),
        reconnect_grace_secs = config.scheduler.reconnect_grace.as_secs(),
        "scheduler initialised"
    );

    if config.worker.embedded {
        let driver = scheduler.clone();
        let interval = config.scheduler.tick_interval;
        tokio::spawn(async move {
            playgrid_server::tick::run_tick_loop(driver, interval).await;
        });
    } else {
        info!("embedded tick driver disabled, expecting an external orchestrator");
    }

    let state = Arc::new(api::AppState::new(
        scheduler,
        config.auth.clone(),
        config.worker.embedded,
    ));
    let app = api::router(state);

    let listener = TcpListener::bind(&config.api.listen_addr).await?;
    info!(addr = %config.api.listen_addr, "API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
