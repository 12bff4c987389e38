//! Step identity and per-step status models.
//!
//! A pipeline is a fixed, ordered sequence of ten stages. Each stage is
//! identified by a [`StepKey`], and its live state within a session is a
//! [`StepStatus`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Set of artifact names already produced for a project.
pub type ArtifactSet = BTreeSet<String>;

/// Stable identifier of one pipeline stage.
///
/// The declaration order is the execution order of a full run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "kebab-case")]
pub enum StepKey {
    /// Crawl the client site and store page contents.
    SiteScrape,
    /// Summarise scraped pages into services and selling points.
    ContentSummary,
    /// Derive seed keywords from the site summary.
    SeedKeywords,
    /// Expand seeds through keyword suggestion sources.
    KeywordExpansion,
    /// Attach volume, competition and CPC data to keywords.
    KeywordEnrichment,
    /// Score keywords for relevance and commercial intent.
    KeywordScoring,
    /// Group scored keywords into themed clusters.
    KeywordClustering,
    /// Build campaigns and ad groups from clusters.
    CampaignStructure,
    /// Generate ad copy for each ad group.
    AdCopy,
    /// Render the final spreadsheet and PDF report.
    Report,
}

impl StepKey {
    /// All step keys in pipeline order.
    pub const ALL: [StepKey; 10] = [
        StepKey::SiteScrape,
        StepKey::ContentSummary,
        StepKey::SeedKeywords,
        StepKey::KeywordExpansion,
        StepKey::KeywordEnrichment,
        StepKey::KeywordScoring,
        StepKey::KeywordClustering,
        StepKey::CampaignStructure,
        StepKey::AdCopy,
        StepKey::Report,
    ];

    /// The kebab-case wire name of this key.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKey::SiteScrape => "site-scrape",
            StepKey::ContentSummary => "content-summary",
            StepKey::SeedKeywords => "seed-keywords",
            StepKey::KeywordExpansion => "keyword-expansion",
            StepKey::KeywordEnrichment => "keyword-enrichment",
            StepKey::KeywordScoring => "keyword-scoring",
            StepKey::KeywordClustering => "keyword-clustering",
            StepKey::CampaignStructure => "campaign-structure",
            StepKey::AdCopy => "ad-copy",
            StepKey::Report => "report",
        }
    }

    /// Human-readable label shown in front-ends.
    pub fn label(&self) -> &'static str {
        match self {
            StepKey::SiteScrape => "Site scrape",
            StepKey::ContentSummary => "Content summary",
            StepKey::SeedKeywords => "Seed keywords",
            StepKey::KeywordExpansion => "Keyword expansion",
            StepKey::KeywordEnrichment => "Keyword enrichment",
            StepKey::KeywordScoring => "Keyword scoring",
            StepKey::KeywordClustering => "Keyword clustering",
            StepKey::CampaignStructure => "Campaign structure",
            StepKey::AdCopy => "Ad copy",
            StepKey::Report => "Report",
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown step key: {s}"))
    }
}

/// Lifecycle status of a step within one session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    /// Never attempted in this session (or reset by a project switch).
    #[default]
    Idle,

    /// A runner currently owns this step.
    Running,

    /// The last attempt finished successfully or its output already existed.
    Success,

    /// The last attempt failed.
    Error,
}

impl StepState {
    /// Whether the state is one a runner leaves behind once finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Success | StepState::Error)
    }
}

/// Status of a single step plus an optional human message.
///
/// The message holds the success summary or the most recent error and is
/// kept until the step is attempted again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct StepStatus {
    pub status: StepState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn running(message: impl Into<String>) -> Self {
        Self {
            status: StepState::Running,
            message: Some(message.into()),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: StepState::Success,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: StepState::Error,
            message: Some(message.into()),
        }
    }
}

/// Declarative completion predicate over a project's artifact names.
///
/// Evaluated before a full run to decide whether a step's output already
/// exists and the step can be skipped.
///
/// # Example
///
/// ```json
/// { "kind": "allOf", "artifacts": ["site_pages.json"] }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(tag = "kind", content = "artifacts", rename_all = "camelCase")]
pub enum CompletionRule {
    /// Satisfied when every listed artifact is present.
    AllOf(Vec<String>),

    /// Satisfied when at least one listed artifact is present.
    AnyOf(Vec<String>),

    /// Never satisfied; the step always runs.
    Never,
}

impl CompletionRule {
    /// Evaluate the rule against the artifact names of a project.
    ///
    /// An empty `AllOf` or `AnyOf` list is never satisfied, so a
    /// misconfigured step runs instead of being skipped.
    pub fn is_satisfied(&self, artifacts: &ArtifactSet) -> bool {
        match self {
            CompletionRule::AllOf(names) => {
                !names.is_empty() && names.iter().all(|name| artifacts.contains(name))
            }
            CompletionRule::AnyOf(names) => names.iter().any(|name| artifacts.contains(name)),
            CompletionRule::Never => false,
        }
    }
}
