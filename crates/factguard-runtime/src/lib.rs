//! # factguard-runtime
//!
//! Async verification pipeline for factguard.
//!
//! `factguard-core` decides; this crate fetches. It generates answers at the
//! slm and llm tiers, retrieves evidence for each claim, scores it (through
//! a delegated scorer when one is configured) and caches decisions.
//!
//! Every external dependency is optional and degrades:
//! - no generation provider: the error is recorded and the answer is empty
//! - no search source: placeholder evidence
//! - no scorer backend, or an unusable verdict: heuristic scoring
//! - no durable store: in-memory cache only
//!
//! ## Features
//!
//! - `anthropic`: Anthropic Messages API provider
//! - `openai`: OpenAI-compatible chat provider (Groq, Gemini, Hugging Face router)
//! - `web-search`: Brave web search and Wikipedia reference search
//! - `all-providers`: all of the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use factguard_runtime::{Pipeline, RuntimeConfig};
//!
//! let pipeline = Pipeline::from_config(&RuntimeConfig::default())?;
//! let report = pipeline.verify("What is the capital of France?", None).await;
//! println!("{} ({:.2})", report.verified_answer, report.hallucination_score);
//! ```

pub mod cache;
pub mod config;
pub mod evidence;
pub mod generation;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod scorer;

pub use cache::{CacheError, DurableStore, NoDurableStore, ResultCache};
pub use config::{
    CacheConfig, ConfigError, GenerationConfig, ProviderSpec, RetrievalConfig, RuntimeConfig,
    ScorerConfig,
};
pub use evidence::{EvidenceAggregator, EvidenceSource, SearchHit};
pub use generation::{Generation, Generator, StaticGenerator, TieredGenerator};
pub use orchestrator::{
    next, EscalationInfo, GenerationInfo, Outcome, Pipeline, PipelineBuilder, PipelineState,
    RuntimeError, Stage, VerificationReport,
};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderFactory, ProviderRegistry, TokenUsage,
};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, UsageStats, UsageTracker};
pub use scorer::{DelegatedScorer, LlmScorer, ScorerError, VerificationScorer};
