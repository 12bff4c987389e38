//! # mp-protocol
//!
//! Shared data models for the marketing pipeline engine.
//!
//! This crate defines the data structures exchanged between the engine and
//! its front-ends:
//! - Step identity, status and completion rules
//! - Progress snapshots returned by progress endpoints
//! - Run-level reports and log entries
//! - Configuration file models (`.mpipe/config.toml`)
//! - Events emitted by the engine while a run is in flight
//!
//! ## Modules
//!
//! - [`step_models`]: Step keys, per-step status and completion rules
//! - [`progress_models`]: Progress snapshots and their wire format
//! - [`run_models`]: Runner states, run status and log entries
//! - [`config_models`]: Global configuration from config.toml
//! - [`ipc`]: Events for engine to front-end communication
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, uuid and chrono
//! - TypeScript generation: All types derive `TS` for the browser dashboard
//! - Independent compilation: No dependencies on other workspace crates

pub mod config_models;
pub mod ipc;
pub mod progress_models;
pub mod run_models;
pub mod step_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use progress_models::*;
pub use run_models::*;
pub use step_models::*;
