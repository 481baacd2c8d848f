//! Answer generation at the slm and llm tiers.
//!
//! Each tier is an ordered chain of providers. The first provider that
//! answers within the timeout wins; when the whole chain fails the last error
//! is returned.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use factguard_core::GenerationTier;

use crate::config::{GenerationConfig, ProviderSpec};
use crate::prompts::GENERATION_SYSTEM_PROMPT;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};

/// A generated answer plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub tier: GenerationTier,
    pub tokens: u32,

    /// Estimated USD cost
    pub cost: f64,

    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
}

impl Generation {
    /// A generation with no text, used when every provider failed.
    pub fn empty(tier: GenerationTier) -> Self {
        Self {
            text: String::new(),
            provider: "none".to_string(),
            model: "none".to_string(),
            tier,
            tokens: 0,
            cost: 0.0,
            metadata: BTreeMap::new(),
        }
    }
}

/// Produces an answer for a query at a tier.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, query: &str, tier: GenerationTier) -> Result<Generation, ProviderError>;
}

/// One provider in a tier chain.
#[derive(Clone)]
struct ChainEntry {
    provider: Arc<dyn LlmProvider>,
    model: String,
    cost_per_million: f64,
}

/// Generator that walks a provider chain per tier.
pub struct TieredGenerator {
    slm: Vec<ChainEntry>,
    llm: Vec<ChainEntry>,
    timeout: Duration,
    max_tokens: u32,
}

impl TieredGenerator {
    pub fn new(timeout: Duration, max_tokens: u32) -> Self {
        Self {
            slm: Vec::new(),
            llm: Vec::new(),
            timeout,
            max_tokens,
        }
    }

    /// Append a provider to a tier chain.
    pub fn with_provider(
        mut self,
        tier: GenerationTier,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        cost_per_million: f64,
    ) -> Self {
        let entry = ChainEntry {
            provider,
            model: model.into(),
            cost_per_million,
        };
        self.chain_mut(tier).push(entry);
        self
    }

    /// Build both chains from config. Entries whose provider cannot be
    /// created (unknown type, missing key) are skipped with a warning.
    pub fn from_config(config: &GenerationConfig, registry: &ProviderRegistry) -> Self {
        let mut generator = Self::new(config.timeout, config.max_tokens);

        for (tier, specs) in [
            (GenerationTier::Slm, &config.slm),
            (GenerationTier::Llm, &config.llm),
        ] {
            for spec in specs {
                match build_entry(spec, registry) {
                    Ok(entry) => generator.chain_mut(tier).push(entry),
                    Err(e) => tracing::warn!(
                        %tier,
                        provider = %spec.provider,
                        model = %spec.model,
                        error = %e,
                        "Skipping generation provider"
                    ),
                }
            }
        }

        generator
    }

    /// Number of providers configured for a tier.
    pub fn chain_len(&self, tier: GenerationTier) -> usize {
        self.chain(tier).len()
    }

    fn chain(&self, tier: GenerationTier) -> &[ChainEntry] {
        match tier {
            GenerationTier::Slm => &self.slm,
            GenerationTier::Llm => &self.llm,
        }
    }

    fn chain_mut(&mut self, tier: GenerationTier) -> &mut Vec<ChainEntry> {
        match tier {
            GenerationTier::Slm => &mut self.slm,
            GenerationTier::Llm => &mut self.llm,
        }
    }

    async fn generate_with(
        &self,
        entry: &ChainEntry,
        query: &str,
        tier: GenerationTier,
    ) -> Result<Generation, ProviderError> {
        let config = CompletionConfig {
            model: entry.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            timeout: self.timeout,
        };
        let messages = vec![
            ChatMessage::system(GENERATION_SYSTEM_PROMPT),
            ChatMessage::user(query),
        ];

        let response = tokio::time::timeout(self.timeout, entry.provider.complete(messages, &config))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let tokens = response.usage.total();
        let mut metadata = BTreeMap::new();
        if let Some(stop) = response.stop_reason {
            metadata.insert("stop_reason".to_string(), JsonValue::String(stop));
        }

        Ok(Generation {
            text: response.content,
            provider: entry.provider.name().to_string(),
            model: response.model,
            tier,
            tokens,
            cost: tokens as f64 / 1_000_000.0 * entry.cost_per_million,
            metadata,
        })
    }
}

fn build_entry(spec: &ProviderSpec, registry: &ProviderRegistry) -> Result<ChainEntry, ProviderError> {
    Ok(ChainEntry {
        provider: registry.create(&spec.provider, &spec.settings)?,
        model: spec.model.clone(),
        cost_per_million: spec.cost_per_million,
    })
}

#[async_trait]
impl Generator for TieredGenerator {
    async fn generate(&self, query: &str, tier: GenerationTier) -> Result<Generation, ProviderError> {
        let mut last_error = None;

        for entry in self.chain(tier) {
            match self.generate_with(entry, query, tier).await {
                Ok(generation) => {
                    tracing::info!(
                        %tier,
                        provider = %generation.provider,
                        tokens = generation.tokens,
                        "Generated answer"
                    );
                    return Ok(generation);
                }
                Err(e) => {
                    tracing::warn!(%tier, provider = entry.provider.name(), error = %e, "Provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::NotConfigured(format!("No providers configured for tier {}", tier))
        }))
    }
}

/// Generator that always returns the same text.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    text: String,
}

impl StaticGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Generator for StaticGenerator {
    async fn generate(&self, _query: &str, tier: GenerationTier) -> Result<Generation, ProviderError> {
        Ok(Generation {
            text: self.text.clone(),
            provider: "static".to_string(),
            model: "static".to_string(),
            tokens: self.text.split_whitespace().count() as u32,
            ..Generation::empty(tier)
        })
    }
}
