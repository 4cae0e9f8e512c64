//! Shared domain types for the PlayGrid control plane.
//!
//! Every crate in the workspace speaks in these types: plan tiers and the
//! capability ladder, host descriptors (mode, capability profile, stream
//! health, slot policy), session lifecycle states, and the built-in game
//! catalog. Scheduling logic lives in `playgrid-scheduler`; this crate is
//! pure data.

pub mod catalog;
pub mod host;
pub mod plan;
pub mod session;

pub use catalog::{default_catalog, default_providers, Game, Provider};
pub use host::{HostCapabilities, HostMode, HostStatus, SlotPolicy, StreamHealth, StreamProfile};
pub use plan::{GpuTier, Plan};
pub use session::{EndReason, SessionStatus};
