//! Global configuration models for `.mpipe/config.toml`.
//!
//! This module defines the structure of the configuration file that points
//! the engine at the remote step endpoints and tunes its polling schedule.

use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use ts_rs::TS;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_ARTIFACTS_ENDPOINT: &str = "/api/projects/{project_id}/files";

/// Represents the settings from `.mpipe/config.toml`.
///
/// # Example
///
/// ```toml
/// base_url = "https://pipeline.example.com"
/// max_continuations = 20
///
/// [poll]
/// late_interval_ms = 5000
///
/// [steps.keyword-enrichment]
/// endpoint = "/api/v2/keywords/enrich"
/// artifacts = ["enriched_keywords.json"]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct GlobalConfig {
    /// Base URL every relative endpoint is joined to.
    pub base_url: String,

    /// Endpoint listing a project's artifacts. `{project_id}` is substituted.
    pub artifacts_endpoint: String,

    /// Maximum number of "incomplete" responses tolerated for one step
    /// before the runner gives up. `0` disables the cap.
    pub max_continuations: u32,

    /// Timeout for a single progress query, in seconds.
    pub progress_timeout_secs: u64,

    pub poll: PollConfig,

    /// Per-step overrides keyed by kebab-case step key.
    pub steps: BTreeMap<String, StepOverride>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            artifacts_endpoint: DEFAULT_ARTIFACTS_ENDPOINT.to_string(),
            max_continuations: 50,
            progress_timeout_secs: 10,
            poll: PollConfig::default(),
            steps: BTreeMap::new(),
        }
    }
}

/// Polling and progress-ticker tuning.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct PollConfig {
    /// Floor for every poll delay and the delay before the first tick.
    pub min_interval_ms: u64,

    /// Fallback delay while the step is young.
    pub early_interval_ms: u64,

    /// Fallback delay once the step has run past the early window.
    pub late_interval_ms: u64,

    /// Length of the early window measured from poller start.
    pub early_window_ms: u64,

    /// Delay after an inconclusive tick (transport or decode failure).
    pub error_retry_ms: u64,

    /// Interval of the indeterminate ticker used for non-pollable steps.
    pub ticker_interval_ms: u64,

    /// Percent added per ticker beat.
    pub ticker_step: u8,

    /// Percent the ticker never exceeds.
    pub ticker_cap: u8,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            early_interval_ms: 1000,
            late_interval_ms: 4000,
            early_window_ms: 10_000,
            error_retry_ms: 2000,
            ticker_interval_ms: 500,
            ticker_step: 3,
            ticker_cap: 95,
        }
    }
}

/// Overrides for one step of the default catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
#[serde(default)]
pub struct StepOverride {
    pub endpoint: Option<String>,
    pub progress_endpoint: Option<String>,

    /// Replaces the completion rule with `AllOf(artifacts)`.
    pub artifacts: Option<Vec<String>>,
}
