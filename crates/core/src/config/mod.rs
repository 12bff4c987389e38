//! Configuration loading and management.
//!
//! This module provides functionality to load and validate
//! `.mpipe/config.toml`.

pub mod error;
pub mod loader;
