//! PlayGrid control-plane server: the HTTP API over the session scheduler
//! plus the embedded tick driver.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod tick;

pub use api::{router, AppState};
pub use config::ServerConfig;
pub use error::ApiError;
