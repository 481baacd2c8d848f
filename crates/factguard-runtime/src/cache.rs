//! Claim-level result cache.
//!
//! Decisions are keyed by normalized claim text. Lookups consult the durable
//! store first and then the in-memory layer; writes always land in memory,
//! and durable write failures are logged and swallowed.

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use factguard_core::{normalize_claim_text, Action, CachedDecision};

use crate::config::CacheConfig;

/// Errors from a durable store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Durable store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent key-value backend for decisions.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedDecision>, CacheError>;

    /// Insert or replace the record for `key`.
    async fn upsert(&self, key: &str, record: &CachedDecision) -> Result<(), CacheError>;
}

/// Durable store that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDurableStore;

#[async_trait]
impl DurableStore for NoDurableStore {
    async fn get(&self, _key: &str) -> Result<Option<CachedDecision>, CacheError> {
        Ok(None)
    }

    async fn upsert(&self, _key: &str, _record: &CachedDecision) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Two-layer decision cache.
pub struct ResultCache {
    memory: Cache<String, CachedDecision>,
    durable: Arc<dyn DurableStore>,
}

impl ResultCache {
    /// In-memory cache with no durable layer.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let memory = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            memory,
            durable: Arc::new(NoDurableStore),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    /// Attach a durable store.
    pub fn with_durable(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = store;
        self
    }

    /// Look up the decision recorded for a claim.
    pub async fn check(&self, claim_text: &str) -> Option<CachedDecision> {
        let key = normalize_claim_text(claim_text);

        match self.durable.get(&key).await {
            Ok(Some(record)) => return Some(record),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Durable cache lookup failed, using memory"),
        }

        self.memory.get(&key).await
    }

    /// Record a decision for a claim, replacing any previous one.
    pub async fn store(
        &self,
        claim_text: &str,
        action: Action,
        corrected_claim: Option<String>,
        evidence_urls: Vec<String>,
        confidence: f64,
    ) {
        let key = normalize_claim_text(claim_text);
        let record = CachedDecision {
            action,
            corrected_claim,
            evidence_urls,
            confidence,
            updated_at: Utc::now(),
        };

        if let Err(e) = self.durable.upsert(&key, &record).await {
            tracing::warn!(error = %e, "Durable cache write failed");
        }

        self.memory.insert(key, record).await;
    }

    /// Approximate number of in-memory entries.
    pub fn entry_count(&self) -> u64 {
        self.memory.entry_count()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        records: Mutex<HashMap<String, CachedDecision>>,
    }

    #[async_trait]
    impl DurableStore for MapStore {
        async fn get(&self, key: &str) -> Result<Option<CachedDecision>, CacheError> {
            Ok(self.records.lock().get(key).cloned())
        }

        async fn upsert(&self, key: &str, record: &CachedDecision) -> Result<(), CacheError> {
            self.records.lock().insert(key.to_string(), record.clone());
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CachedDecision>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn upsert(&self, _key: &str, _record: &CachedDecision) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ResultCache::default();
        assert!(cache.check("Paris is the capital of France.").await.is_none());

        cache
            .store(
                "Paris is the capital of France.",
                Action::Accept,
                None,
                vec!["https://en.wikipedia.org/wiki/Paris".to_string()],
                0.92,
            )
            .await;

        let hit = cache.check("Paris is the capital of France.").await.unwrap();
        assert_eq!(hit.action, Action::Accept);
        assert_eq!(hit.confidence, 0.92);

        cache.memory.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_key_is_normalized() {
        let cache = ResultCache::default();
        cache
            .store("Paris  is the\tcapital.", Action::Abstain, None, vec![], 0.3)
            .await;
        assert!(cache.check("Paris is the capital.").await.is_some());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let cache = ResultCache::default();
        cache.store("X is 5.", Action::Abstain, None, vec![], 0.3).await;
        cache
            .store("X is 5.", Action::Correct, Some("X is 6.".to_string()), vec![], 0.8)
            .await;

        let hit = cache.check("X is 5.").await.unwrap();
        assert_eq!(hit.action, Action::Correct);
        assert_eq!(hit.corrected_claim.as_deref(), Some("X is 6."));
    }

    #[tokio::test]
    async fn test_durable_store_is_consulted_first() {
        let store = Arc::new(MapStore::default());
        store.records.lock().insert(
            "X is 5.".to_string(),
            CachedDecision {
                action: Action::FlagForHuman,
                corrected_claim: None,
                evidence_urls: vec![],
                confidence: 0.6,
                updated_at: Utc::now(),
            },
        );

        let cache = ResultCache::default().with_durable(store.clone());
        assert_eq!(cache.check("X is 5.").await.unwrap().action, Action::FlagForHuman);

        cache.store("Y is 7.", Action::Accept, None, vec![], 0.9).await;
        assert!(store.records.lock().contains_key("Y is 7."));
    }

    #[tokio::test]
    async fn test_durable_failures_are_swallowed() {
        let cache = ResultCache::default().with_durable(Arc::new(BrokenStore));

        cache.store("X is 5.", Action::Accept, None, vec![], 0.9).await;
        let hit = cache.check("X is 5.").await;
        assert_eq!(hit.map(|r| r.action), Some(Action::Accept));
    }
}
