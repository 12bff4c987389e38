//! # mp-core
//!
//! Execution engine for the marketing pipeline.
//!
//! This crate provides:
//! - Configuration loading from the `.mpipe/` directory
//! - Collaborator traits for remote steps, progress endpoints and the
//!   artifact store, with HTTP adapters
//! - Adaptive progress polling and the resume decision gate
//! - The step runner and the pipeline orchestrator
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`registry`]: Immutable step registry and the default catalog
//! - [`remote`]: Remote collaborators and their HTTP adapters
//! - [`progress`]: Progress poller and indeterminate ticker
//! - [`resume`]: Resume decision gate and confirmation channel
//! - [`state`]: Status board, run log and session
//! - [`engine`]: Step runner and pipeline orchestrator

pub mod config;
pub mod engine;
pub mod progress;
pub mod registry;
pub mod remote;
pub mod resume;
pub mod state;
