//! Common test utilities shared by the engine integration tests.
//!
//! This module provides:
//! - Scripted remote collaborators (executors, progress sources, artifact
//!   store, confirmer)
//! - Fixtures building registries and orchestrators from them
//! - Assertions over the emitted event stream

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mocks::*;
