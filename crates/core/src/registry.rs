//! Step registry.
//!
//! Steps are defined once at startup and never mutated. Each [`StepDef`]
//! carries its own executor, optional progress source and completion rule,
//! so the engine looks a step up once instead of branching on its name.

use crate::config::error::{ConfigError, ConfigResult};
use crate::remote::base::{ProgressSource, StepExecutor};
use crate::remote::http::{HttpClient, HttpProgressSource, HttpStepExecutor};
use mp_protocol::{CompletionRule, GlobalConfig, StepKey};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// One pipeline stage bound to its remote collaborators.
pub struct StepDef {
    pub key: StepKey,
    pub label: String,
    pub executor: Arc<dyn StepExecutor>,
    pub progress: Option<Arc<dyn ProgressSource>>,
    /// The remote executor can pick up stored partial progress.
    pub resumable: bool,
    pub completion: CompletionRule,
}

impl StepDef {
    /// A non-pollable, non-resumable step that always runs.
    pub fn new(key: StepKey, executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            key,
            label: key.label().to_string(),
            executor,
            progress: None,
            resumable: false,
            completion: CompletionRule::Never,
        }
    }

    pub fn with_progress(mut self, source: Arc<dyn ProgressSource>) -> Self {
        self.progress = Some(source);
        self
    }

    pub fn with_resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }

    pub fn with_completion(mut self, completion: CompletionRule) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_pollable(&self) -> bool {
        self.progress.is_some()
    }

    /// Whether the resume gate applies: the step is resumable and has a
    /// progress channel to inspect.
    pub fn consults_resume_gate(&self) -> bool {
        self.resumable && self.progress.is_some()
    }
}

/// Immutable, ordered set of steps.
pub struct StepRegistry {
    steps: Vec<Arc<StepDef>>,
}

impl StepRegistry {
    /// Build a registry. Steps are kept in pipeline order regardless of the
    /// order given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateStep` if a key appears twice.
    pub fn new(steps: Vec<StepDef>) -> ConfigResult<Self> {
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.key) {
                return Err(ConfigError::DuplicateStep(step.key));
            }
        }

        let mut steps: Vec<Arc<StepDef>> = steps.into_iter().map(Arc::new).collect();
        steps.sort_by_key(|step| step.key);
        Ok(Self { steps })
    }

    pub fn get(&self, key: StepKey) -> Option<Arc<StepDef>> {
        self.steps.iter().find(|step| step.key == key).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StepDef>> {
        self.steps.iter()
    }

    pub fn keys(&self) -> Vec<StepKey> {
        self.steps.iter().map(|step| step.key).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps of a run, in pipeline order.
    ///
    /// `from` drops every step before it; `only` keeps just the listed
    /// steps. Order is always the registry's, never the caller's.
    pub fn select(&self, from: Option<StepKey>, only: Option<&[StepKey]>) -> Vec<Arc<StepDef>> {
        self.steps
            .iter()
            .filter(|step| from.map_or(true, |start| step.key >= start))
            .filter(|step| only.map_or(true, |keys| keys.contains(&step.key)))
            .cloned()
            .collect()
    }
}

/// Static description of one step of the default pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub key: StepKey,
    pub endpoint: &'static str,
    pub progress_endpoint: Option<&'static str>,
    pub resumable: bool,
    pub artifacts: &'static [&'static str],
    /// Any one artifact satisfies the step instead of all of them.
    pub any_artifact: bool,
}

impl CatalogEntry {
    pub fn completion(&self) -> CompletionRule {
        let names = self.artifacts.iter().map(|name| name.to_string()).collect();
        if self.any_artifact {
            CompletionRule::AnyOf(names)
        } else {
            CompletionRule::AllOf(names)
        }
    }
}

/// The ten stages of the marketing pipeline.
pub const DEFAULT_CATALOG: [CatalogEntry; 10] = [
    CatalogEntry {
        key: StepKey::SiteScrape,
        endpoint: "/api/scrape",
        progress_endpoint: Some("/api/scrape/progress"),
        resumable: true,
        artifacts: &["site_pages.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::ContentSummary,
        endpoint: "/api/summarize",
        progress_endpoint: None,
        resumable: false,
        artifacts: &["site_summary.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::SeedKeywords,
        endpoint: "/api/keywords/seeds",
        progress_endpoint: None,
        resumable: false,
        artifacts: &["seed_keywords.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::KeywordExpansion,
        endpoint: "/api/keywords/expand",
        progress_endpoint: Some("/api/keywords/expand/progress"),
        resumable: true,
        artifacts: &["expanded_keywords.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::KeywordEnrichment,
        endpoint: "/api/keywords/enrich",
        progress_endpoint: Some("/api/keywords/enrich/progress"),
        resumable: true,
        artifacts: &["enriched_keywords.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::KeywordScoring,
        endpoint: "/api/keywords/score",
        progress_endpoint: None,
        resumable: false,
        artifacts: &["scored_keywords.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::KeywordClustering,
        endpoint: "/api/keywords/cluster",
        progress_endpoint: None,
        resumable: false,
        artifacts: &["keyword_clusters.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::CampaignStructure,
        endpoint: "/api/campaigns/structure",
        progress_endpoint: Some("/api/campaigns/structure/progress"),
        resumable: true,
        artifacts: &["campaign_structure.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::AdCopy,
        endpoint: "/api/campaigns/ad-copy",
        progress_endpoint: Some("/api/campaigns/ad-copy/progress"),
        resumable: true,
        artifacts: &["ad_copy.json"],
        any_artifact: false,
    },
    CatalogEntry {
        key: StepKey::Report,
        endpoint: "/api/report",
        progress_endpoint: None,
        resumable: false,
        artifacts: &["report.xlsx", "report.pdf"],
        any_artifact: true,
    },
];

/// Build the default pipeline against HTTP endpoints, applying per-step
/// overrides from the configuration.
///
/// # Errors
///
/// Returns `ConfigError::InvalidConfig` if an override names an unknown step.
pub fn build_http_registry(config: &GlobalConfig, http: &HttpClient) -> ConfigResult<StepRegistry> {
    for name in config.steps.keys() {
        name.parse::<StepKey>()
            .map_err(|reason| ConfigError::InvalidConfig {
                path: PathBuf::from("[steps]"),
                reason,
            })?;
    }

    let timeout = Duration::from_secs(config.progress_timeout_secs.max(1));
    let steps = DEFAULT_CATALOG
        .iter()
        .map(|entry| {
            let overrides = config.steps.get(entry.key.as_str()).cloned().unwrap_or_default();

            let endpoint = overrides
                .endpoint
                .unwrap_or_else(|| entry.endpoint.to_string());
            let executor: Arc<dyn StepExecutor> =
                Arc::new(HttpStepExecutor::new(http.clone(), endpoint));

            let completion = match overrides.artifacts {
                Some(names) => CompletionRule::AllOf(names),
                None => entry.completion(),
            };

            let mut step = StepDef::new(entry.key, executor)
                .with_resumable(entry.resumable)
                .with_completion(completion);

            let progress_endpoint = overrides
                .progress_endpoint
                .or_else(|| entry.progress_endpoint.map(str::to_string));
            if let Some(progress_endpoint) = progress_endpoint {
                let source: Arc<dyn ProgressSource> = Arc::new(HttpProgressSource::new(
                    http.clone(),
                    progress_endpoint,
                    timeout,
                ));
                step = step.with_progress(source);
            }
            step
        })
        .collect();

    StepRegistry::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::base::{StepRequest, StepResponse};
    use crate::remote::error::StepError;
    use async_trait::async_trait;
    use mp_protocol::StepOverride;
    use serde_json::Value;

    struct Noop;

    #[async_trait]
    impl StepExecutor for Noop {
        async fn invoke(&self, _request: &StepRequest) -> Result<StepResponse, StepError> {
            Ok(StepResponse::complete(Value::Null))
        }
    }

    fn noop(key: StepKey) -> StepDef {
        StepDef::new(key, Arc::new(Noop))
    }

    #[test]
    fn test_registry_sorts_into_pipeline_order() {
        let registry = StepRegistry::new(vec![
            noop(StepKey::Report),
            noop(StepKey::SiteScrape),
            noop(StepKey::AdCopy),
        ])
        .unwrap();
        assert_eq!(
            registry.keys(),
            vec![StepKey::SiteScrape, StepKey::AdCopy, StepKey::Report]
        );
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = StepRegistry::new(vec![noop(StepKey::Report), noop(StepKey::Report)]);
        assert!(matches!(result, Err(ConfigError::DuplicateStep(StepKey::Report))));
    }

    #[test]
    fn test_select_respects_registry_order() {
        let registry =
            StepRegistry::new(StepKey::ALL.iter().map(|key| noop(*key)).collect()).unwrap();

        let from: Vec<StepKey> = registry
            .select(Some(StepKey::CampaignStructure), None)
            .iter()
            .map(|step| step.key)
            .collect();
        assert_eq!(
            from,
            vec![StepKey::CampaignStructure, StepKey::AdCopy, StepKey::Report]
        );

        let only: Vec<StepKey> = registry
            .select(None, Some(&[StepKey::Report, StepKey::SeedKeywords]))
            .iter()
            .map(|step| step.key)
            .collect();
        assert_eq!(only, vec![StepKey::SeedKeywords, StepKey::Report]);
    }

    #[test]
    fn test_catalog_covers_every_step_in_order() {
        let keys: Vec<StepKey> = DEFAULT_CATALOG.iter().map(|entry| entry.key).collect();
        assert_eq!(keys, StepKey::ALL.to_vec());
        assert!(DEFAULT_CATALOG
            .iter()
            .filter(|entry| entry.resumable)
            .all(|entry| entry.progress_endpoint.is_some()));
    }

    #[test]
    fn test_http_registry_applies_overrides() {
        let mut config = GlobalConfig::default();
        config.steps.insert(
            "report".to_string(),
            StepOverride {
                artifacts: Some(vec!["final.pdf".to_string()]),
                ..Default::default()
            },
        );
        config.steps.insert(
            "seed-keywords".to_string(),
            StepOverride {
                progress_endpoint: Some("/api/keywords/seeds/progress".to_string()),
                ..Default::default()
            },
        );
        let http = HttpClient::new(config.base_url.clone()).unwrap();

        let registry = build_http_registry(&config, &http).unwrap();
        assert_eq!(registry.len(), 10);

        let report = registry.get(StepKey::Report).unwrap();
        assert_eq!(
            report.completion,
            CompletionRule::AllOf(vec!["final.pdf".to_string()])
        );

        let seeds = registry.get(StepKey::SeedKeywords).unwrap();
        assert!(seeds.is_pollable());
        assert!(!seeds.consults_resume_gate());

        assert!(registry.get(StepKey::SiteScrape).unwrap().consults_resume_gate());
    }

    #[test]
    fn test_http_registry_rejects_unknown_override() {
        let mut config = GlobalConfig::default();
        config
            .steps
            .insert("keyword-magic".to_string(), StepOverride::default());
        let http = HttpClient::new(config.base_url.clone()).unwrap();

        assert!(matches!(
            build_http_registry(&config, &http),
            Err(ConfigError::InvalidConfig { .. })
        ));
    }
}
