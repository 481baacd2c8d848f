//! Runtime configuration.
//!
//! Loaded from YAML, with defaults for every field. Durations are written as
//! human-readable strings ("10s", "1h").
//!
//! ```yaml
//! generation:
//!   timeout: 30s
//!   slm:
//!     - provider: openai
//!       model: llama-3.3-70b-versatile
//!       cost_per_million: 0.10
//!       settings: { name: groq, api_key_env: GROQ_API_KEY }
//! retrieval:
//!   top_k: 5
//! cache:
//!   ttl: 1h
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use factguard_core::PolicyThresholds;

use crate::resilience::CircuitBreakerConfig;

/// Environment override for the first slm chain entry's model.
pub const SLM_MODEL_ENV: &str = "FACTGUARD_SLM_MODEL";
/// Environment override for the first llm chain entry's model.
pub const LLM_MODEL_ENV: &str = "FACTGUARD_LLM_MODEL";
/// Environment override for the delegated scorer's model.
pub const VERIFIER_MODEL_ENV: &str = "FACTGUARD_VERIFIER_MODEL";
/// Environment override for the evidence count per claim.
pub const TOP_K_ENV: &str = "FACTGUARD_TOP_K";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde adapter for `humantime` durations.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// One entry of a generation chain, or the scorer backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Registered provider type ("openai", "anthropic")
    pub provider: String,

    pub model: String,

    /// USD per million tokens
    #[serde(default)]
    pub cost_per_million: f64,

    /// Provider settings passed to the factory
    #[serde(default = "empty_settings")]
    pub settings: JsonValue,
}

fn empty_settings() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl ProviderSpec {
    fn openai_compatible(name: &str, base_url: &str, key_env: &str, model: &str, cost: f64) -> Self {
        Self {
            provider: "openai".to_string(),
            model: model.to_string(),
            cost_per_million: cost,
            settings: serde_json::json!({
                "name": name,
                "base_url": base_url,
                "api_key_env": key_env,
            }),
        }
    }
}

/// Generation tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Per-call timeout
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    pub max_tokens: u32,

    /// Cheap tier, tried in order
    pub slm: Vec<ProviderSpec>,

    /// Premium tier, tried in order
    pub llm: Vec<ProviderSpec>,

    /// Premium price per million tokens used to estimate savings
    pub llm_reference_cost: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_tokens: 2000,
            slm: vec![
                ProviderSpec::openai_compatible(
                    "groq",
                    "https://api.groq.com/openai/v1",
                    "GROQ_API_KEY",
                    "llama-3.3-70b-versatile",
                    0.10,
                ),
                ProviderSpec::openai_compatible(
                    "huggingface",
                    "https://router.huggingface.co/v1",
                    "HF_TOKEN",
                    "mistralai/Mistral-7B-Instruct-v0.3",
                    0.10,
                ),
            ],
            llm: vec![
                ProviderSpec::openai_compatible(
                    "gemini",
                    "https://generativelanguage.googleapis.com/v1beta/openai",
                    "GEMINI_API_KEY",
                    "gemini-2.5-flash",
                    0.50,
                ),
                ProviderSpec {
                    provider: "anthropic".to_string(),
                    model: "claude-sonnet-4-20250514".to_string(),
                    cost_per_million: 2.00,
                    settings: empty_settings(),
                },
            ],
            llm_reference_cost: 2.00,
        }
    }
}

/// Evidence retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Evidence items kept per claim
    pub top_k: usize,

    /// Upper bound on web results
    pub web_budget: usize,

    /// Upper bound on reference results
    pub reference_budget: usize,

    /// Per-call timeout
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Claims retrieved or scored concurrently
    pub max_concurrent_claims: usize,

    /// Retries on transient source errors
    pub max_retries: usize,

    /// Query the web source when a key is available
    pub web_enabled: bool,

    /// Query the reference source
    pub reference_enabled: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            web_budget: 3,
            reference_budget: 2,
            timeout: Duration::from_secs(10),
            max_concurrent_claims: 4,
            max_retries: 2,
            web_enabled: true,
            reference_enabled: true,
        }
    }
}

/// Delegated scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub enabled: bool,

    pub backend: ProviderSpec,

    #[serde(with = "duration_str")]
    pub timeout: Duration,

    pub max_tokens: u32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: ProviderSpec::openai_compatible(
                "gemini",
                "https://generativelanguage.googleapis.com/v1beta/openai",
                "GEMINI_API_KEY",
                "gemini-2.5-flash",
                0.50,
            ),
            timeout: Duration::from_secs(20),
            max_tokens: 1000,
        }
    }
}

/// In-memory result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,

    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub scorer: ScorerConfig,
    pub cache: CacheConfig,
    pub policy: PolicyThresholds,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl RuntimeConfig {
    /// Parse and validate YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be at least 1");
        }
        if self.retrieval.max_concurrent_claims == 0 {
            return invalid("retrieval.max_concurrent_claims must be at least 1");
        }
        if self.retrieval.timeout.is_zero()
            || self.generation.timeout.is_zero()
            || self.scorer.timeout.is_zero()
        {
            return invalid("timeouts must be non-zero");
        }
        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries must be at least 1");
        }
        let costs = self
            .generation
            .slm
            .iter()
            .chain(&self.generation.llm)
            .map(|spec| spec.cost_per_million)
            .chain(std::iter::once(self.generation.llm_reference_cost));
        for cost in costs {
            if !cost.is_finite() || cost < 0.0 {
                return invalid("costs must be finite and non-negative");
            }
        }
        self.policy.validate().map_err(ConfigError::Invalid)
    }

    /// Apply `FACTGUARD_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(SLM_MODEL_ENV) {
            if let Some(first) = self.generation.slm.first_mut() {
                first.model = model;
            }
        }
        if let Some(model) = lookup(LLM_MODEL_ENV) {
            if let Some(first) = self.generation.llm.first_mut() {
                first.model = model;
            }
        }
        if let Some(model) = lookup(VERIFIER_MODEL_ENV) {
            self.scorer.backend.model = model;
        }
        if let Some(raw) = lookup(TOP_K_ENV) {
            self.retrieval.top_k = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a positive integer, got '{}'", TOP_K_ENV, raw))
            })?;
        }
        self.validate()
    }
}
