//! Per-project cache over an [`ArtifactStore`].

use crate::remote::base::ArtifactStore;
use crate::remote::error::StepError;
use log::debug;
use mp_protocol::ArtifactSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Caches one artifact listing per project until it is invalidated.
///
/// Runners invalidate after every successful step so the next completion
/// check sees the new output.
pub struct CachedArtifacts {
    store: Arc<dyn ArtifactStore>,
    listings: Mutex<HashMap<String, ArtifactSet>>,
}

impl CachedArtifacts {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            listings: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached listing, fetching it on a miss.
    pub async fn list(&self, project_id: &str) -> Result<ArtifactSet, StepError> {
        if let Some(cached) = self.listings.lock().get(project_id) {
            return Ok(cached.clone());
        }

        let listing = self.store.list_artifacts(project_id).await?;
        debug!("{} artifacts listed for {project_id}", listing.len());
        self.listings
            .lock()
            .insert(project_id.to_string(), listing.clone());
        Ok(listing)
    }

    pub fn invalidate(&self, project_id: &str) {
        self.listings.lock().remove(project_id);
    }

    /// Drop the cached listing and fetch a fresh one.
    pub async fn refresh(&self, project_id: &str) -> Result<ArtifactSet, StepError> {
        self.invalidate(project_id);
        self.list(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactStore for CountingStore {
        async fn list_artifacts(&self, _project_id: &str) -> Result<ArtifactSet, StepError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok([format!("listing-{n}")].into_iter().collect())
        }
    }

    #[tokio::test]
    async fn test_list_is_cached_until_invalidated() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedArtifacts::new(store.clone());

        let first = cache.list("acme").await.unwrap();
        let second = cache.list("acme").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        cache.invalidate("acme");
        let third = cache.list("acme").await.unwrap();
        assert!(third.contains("listing-1"));

        let fourth = cache.refresh("acme").await.unwrap();
        assert!(fourth.contains("listing-2"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_projects_are_cached_separately() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedArtifacts::new(store.clone());

        cache.list("acme").await.unwrap();
        cache.list("globex").await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
