//! Remote collaborators of the engine.
//!
//! This module provides:
//! - The `StepExecutor`, `ProgressSource` and `ArtifactStore` traits
//! - The `StepError` taxonomy shared by every remote call
//! - HTTP adapters backed by `reqwest`
//! - A per-project artifact listing cache

pub mod base;
pub mod cache;
pub mod error;
pub mod http;

pub use base::{ArtifactStore, ProgressSource, StepExecutor, StepRequest, StepResponse};
pub use cache::CachedArtifacts;
pub use error::StepError;
