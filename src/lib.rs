//! Incident lifecycle and status propagation engine for a status page.
//!
//! Incidents carry an append-only log of [`models::IncidentUpdate`] entries;
//! the incident row itself is a materialized fold of that log. Every status
//! or impact change, and every component status write made on behalf of an
//! incident, is recorded as a diff with the prior value captured at write
//! time. Resolving an incident cascades its affected components back to
//! operational.
//!
//! [`engine::IncidentEngine`] is the entry point; it runs on top of a
//! pluggable [`state::StatusPageStore`] (in-memory or sled-backed).

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notifications;
pub mod state;

pub use config::EngineConfig;
pub use engine::IncidentEngine;
pub use error::{EngineError, Result};
