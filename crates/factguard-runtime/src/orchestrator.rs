//! Verification pipeline orchestrator.
//!
//! The pipeline is an explicit state machine:
//!
//! ```text
//! Generate -> Extract -> CheckCache -> RetrieveEvidence -> Verify -> CheckEscalation
//!                            |                                            |   |
//!                            +------------- all cached ------------------>+   |
//!     ^                                                                       |
//!     +---------------------- escalate (at most once) -----------------------+
//!
//! CheckEscalation -> ApplyPolicy -> Assemble -> UpdateCache -> Done
//! ```
//!
//! Transitions are computed by the pure [`next`] function; each stage
//! handler mutates the per-request [`PipelineState`] and reports an
//! [`Outcome`]. No stage is fatal: failures degrade and accumulate in the
//! report's `errors`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use factguard_core::{
    AssembledAnswer, CachedDecision, Claim, ClaimBreakdown, ClaimExtractor, Decision,
    DecisionPolicy, EscalationController, Evidence, GenerationTier, Modification, Synthesizer,
    VerificationResult,
};

use crate::cache::ResultCache;
use crate::config::{ConfigError, RuntimeConfig};
use crate::evidence::EvidenceAggregator;
use crate::generation::{Generation, Generator, TieredGenerator};
use crate::providers::{CompletionConfig, ProviderRegistry};
use crate::resilience::{CircuitBreaker, UsageStats, UsageTracker};
use crate::scorer::{DelegatedScorer, LlmScorer, VerificationScorer};

/// Errors from building a pipeline.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Generator not configured")]
    GeneratorNotConfigured,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generate,
    Extract,
    CheckCache,
    RetrieveEvidence,
    Verify,
    CheckEscalation,
    ApplyPolicy,
    Assemble,
    UpdateCache,
    Done,
}

/// What a stage handler reports back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// Every extracted claim was answered from the cache
    AllCached,
    /// Regenerate at the next tier
    Escalate,
}

/// Pure transition function.
pub fn next(stage: Stage, outcome: Outcome) -> Stage {
    match (stage, outcome) {
        (Stage::Generate, _) => Stage::Extract,
        (Stage::Extract, _) => Stage::CheckCache,
        (Stage::CheckCache, Outcome::AllCached) => Stage::CheckEscalation,
        (Stage::CheckCache, _) => Stage::RetrieveEvidence,
        (Stage::RetrieveEvidence, _) => Stage::Verify,
        (Stage::Verify, _) => Stage::CheckEscalation,
        (Stage::CheckEscalation, Outcome::Escalate) => Stage::Generate,
        (Stage::CheckEscalation, _) => Stage::ApplyPolicy,
        (Stage::ApplyPolicy, _) => Stage::Assemble,
        (Stage::Assemble, _) => Stage::UpdateCache,
        (Stage::UpdateCache, _) | (Stage::Done, _) => Stage::Done,
    }
}

/// Per-request accumulator, owned by one in-flight request.
#[derive(Debug)]
pub struct PipelineState {
    pub query: String,
    pub user_id: Option<String>,
    pub tier: GenerationTier,
    pub generation: Option<Generation>,
    pub claims: Vec<Claim>,

    /// Cache hits keyed by claim id
    pub cached: HashMap<String, CachedDecision>,

    pub evidence: HashMap<String, Vec<Evidence>>,
    pub verifications: HashMap<String, VerificationResult>,
    pub decisions: Vec<Decision>,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub detected_hallucination: f64,
    pub detected_confidence: f64,
    pub errors: Vec<String>,
    assembled: Option<AssembledAnswer>,
    started: Instant,
}

impl PipelineState {
    fn new(query: &str, user_id: Option<&str>, tier: GenerationTier) -> Self {
        Self {
            query: query.to_string(),
            user_id: user_id.map(str::to_string),
            tier,
            generation: None,
            claims: Vec::new(),
            cached: HashMap::new(),
            evidence: HashMap::new(),
            verifications: HashMap::new(),
            decisions: Vec::new(),
            escalated: false,
            escalation_reason: None,
            detected_hallucination: 0.0,
            detected_confidence: 1.0,
            errors: Vec::new(),
            assembled: None,
            started: Instant::now(),
        }
    }

    fn raw_text(&self) -> &str {
        self.generation.as_ref().map(|g| g.text.as_str()).unwrap_or("")
    }

    /// Claims that still need retrieval and scoring.
    fn uncached_claims(&self) -> Vec<Claim> {
        self.claims
            .iter()
            .filter(|c| !self.cached.contains_key(&c.id))
            .cloned()
            .collect()
    }

    /// Forget everything derived from the current generation.
    fn discard_cycle(&mut self) {
        self.claims.clear();
        self.cached.clear();
        self.evidence.clear();
        self.verifications.clear();
    }

    fn into_report(self) -> VerificationReport {
        let generation = self
            .generation
            .unwrap_or_else(|| Generation::empty(self.tier));
        let assembled = self
            .assembled
            .unwrap_or_else(|| Synthesizer::new().assemble(&generation.text, &self.decisions));

        VerificationReport {
            verified_answer: assembled.verified_answer,
            original_answer: generation.text.clone(),
            modifications: assembled.modifications,
            hallucination_score: assembled.hallucination_score,
            confidence: assembled.confidence,
            claim_breakdown: assembled.claim_breakdown,
            decisions: self.decisions,
            claims: self.claims,
            errors: self.errors,
            generation: GenerationInfo {
                provider: generation.provider,
                model: generation.model,
                tier: generation.tier,
                tokens: generation.tokens,
                cost: generation.cost,
            },
            escalation: EscalationInfo {
                escalated: self.escalated,
                reason: self.escalation_reason,
                detected_hallucination_score: self.detected_hallucination,
                detected_confidence: self.detected_confidence,
            },
            processing_time_ms: self.started.elapsed().as_millis() as u64,
            user_id: self.user_id,
            verified_at: Utc::now(),
        }
    }
}

/// Which model produced the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub provider: String,
    pub model: String,
    pub tier: GenerationTier,
    pub tokens: u32,
    pub cost: f64,
}

/// Escalation outcome for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationInfo {
    pub escalated: bool,

    /// Why the answer was regenerated, if it was
    pub reason: Option<String>,

    /// Scores seen at the last escalation check
    pub detected_hallucination_score: f64,
    pub detected_confidence: f64,
}

/// Result of verifying one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified_answer: String,
    pub original_answer: String,
    pub modifications: Vec<Modification>,
    pub hallucination_score: f64,
    pub confidence: f64,
    pub claim_breakdown: ClaimBreakdown,
    pub decisions: Vec<Decision>,
    pub claims: Vec<Claim>,
    pub errors: Vec<String>,
    pub generation: GenerationInfo,
    pub escalation: EscalationInfo,
    pub processing_time_ms: u64,
    pub user_id: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// The verification pipeline.
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    extractor: ClaimExtractor,
    cache: Arc<ResultCache>,
    aggregator: Arc<EvidenceAggregator>,
    scorer: Arc<VerificationScorer>,
    escalation: EscalationController,
    policy: DecisionPolicy,
    synthesizer: Synthesizer,
    usage: Arc<UsageTracker>,
    start_tier: GenerationTier,
    max_concurrent_claims: usize,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Build a pipeline from configuration with every compiled-in provider.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        PipelineBuilder::from_config(config)?.build()
    }

    /// Generate an answer for `query` and verify it. Never fails.
    pub async fn verify(&self, query: &str, user_id: Option<&str>) -> VerificationReport {
        let mut state = PipelineState::new(query, user_id, self.start_tier);
        let mut stage = Stage::Generate;

        while stage != Stage::Done {
            let outcome = self.run_stage(stage, &mut state).await;
            tracing::debug!(?stage, ?outcome, "Stage complete");
            stage = next(stage, outcome);
        }

        if !state.escalated && state.tier == GenerationTier::Slm {
            if let Some(generation) = &state.generation {
                self.usage.record_slm_answer(generation);
            }
        }

        let report = state.into_report();
        tracing::info!(
            claims = report.claims.len(),
            hallucination_score = report.hallucination_score,
            escalated = report.escalation.escalated,
            elapsed_ms = report.processing_time_ms,
            "Verification complete"
        );
        report
    }

    /// Process-wide usage counters.
    pub fn stats(&self) -> UsageStats {
        self.usage.stats()
    }

    /// The shared result cache.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    async fn run_stage(&self, stage: Stage, state: &mut PipelineState) -> Outcome {
        match stage {
            Stage::Generate => self.generate(state).await,
            Stage::Extract => {
                state.claims = self.extractor.extract(state.raw_text());
                tracing::debug!(count = state.claims.len(), "Claims extracted");
                Outcome::Continue
            }
            Stage::CheckCache => self.check_cache(state).await,
            Stage::RetrieveEvidence => {
                let uncached = state.uncached_claims();
                state.evidence = self.aggregator.retrieve_all(&uncached).await;
                Outcome::Continue
            }
            Stage::Verify => {
                let uncached = state.uncached_claims();
                state.verifications = self
                    .scorer
                    .verify_all(&uncached, &state.evidence, self.max_concurrent_claims)
                    .await;
                Outcome::Continue
            }
            Stage::CheckEscalation => self.check_escalation(state),
            Stage::ApplyPolicy => {
                state.decisions = self.apply_policy(state);
                Outcome::Continue
            }
            Stage::Assemble => {
                state.assembled = Some(self.synthesizer.assemble(state.raw_text(), &state.decisions));
                Outcome::Continue
            }
            Stage::UpdateCache => {
                self.update_cache(state).await;
                Outcome::Continue
            }
            Stage::Done => Outcome::Continue,
        }
    }

    async fn generate(&self, state: &mut PipelineState) -> Outcome {
        let tier = state.tier;
        let generation = match self.generator.generate(&state.query, tier).await {
            Ok(generation) => {
                self.usage.record_generation(&generation);
                generation
            }
            Err(e) => {
                tracing::warn!(%tier, error = %e, "Generation failed");
                state.errors.push(format!("Generation failed at {} tier: {}", tier, e));
                Generation::empty(tier)
            }
        };
        state.generation = Some(generation);
        Outcome::Continue
    }

    async fn check_cache(&self, state: &mut PipelineState) -> Outcome {
        for claim in &state.claims {
            if let Some(hit) = self.cache.check(&claim.text).await {
                tracing::debug!(claim_id = %claim.id, "Cache hit");
                state.cached.insert(claim.id.clone(), hit);
            }
        }

        if state.claims.iter().all(|c| state.cached.contains_key(&c.id)) {
            Outcome::AllCached
        } else {
            Outcome::Continue
        }
    }

    fn check_escalation(&self, state: &mut PipelineState) -> Outcome {
        let decision = self
            .escalation
            .evaluate(state.tier, state.verifications.values(), state.raw_text());
        state.detected_hallucination = decision.hallucination_score;
        state.detected_confidence = decision.confidence;

        if !decision.should_escalate || state.escalated {
            return Outcome::Continue;
        }
        let Some(next_tier) = state.tier.escalated() else {
            return Outcome::Continue;
        };

        tracing::info!(from = %state.tier, to = %next_tier, reason = %decision.reason, "Escalating");
        self.usage.record_escalation();
        state.escalated = true;
        state.escalation_reason = Some(decision.reason.to_string());
        state.tier = next_tier;
        state.discard_cycle();
        Outcome::Escalate
    }

    fn apply_policy(&self, state: &PipelineState) -> Vec<Decision> {
        state
            .claims
            .iter()
            .map(|claim| {
                if let Some(hit) = state.cached.get(&claim.id) {
                    return hit.to_decision(claim);
                }
                let evidence = state.evidence.get(&claim.id).map(Vec::as_slice).unwrap_or(&[]);
                match state.verifications.get(&claim.id) {
                    Some(verification) => self.policy.decide(claim, verification, evidence),
                    None => {
                        let neutral = VerificationResult::neutral(&claim.id, evidence);
                        self.policy.decide(claim, &neutral, evidence)
                    }
                }
            })
            .collect()
    }

    async fn update_cache(&self, state: &PipelineState) {
        for decision in &state.decisions {
            if state.cached.contains_key(&decision.claim_id) {
                continue;
            }
            self.cache
                .store(
                    &decision.original_claim,
                    decision.action,
                    decision.corrected_claim.clone(),
                    decision.evidence_urls.clone(),
                    decision.confidence,
                )
                .await;
        }
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    generator: Option<Arc<dyn Generator>>,
    cache: Option<Arc<ResultCache>>,
    aggregator: Option<Arc<EvidenceAggregator>>,
    scorer: Option<Arc<VerificationScorer>>,
    policy: DecisionPolicy,
    usage: Option<Arc<UsageTracker>>,
    start_tier: GenerationTier,
    max_concurrent_claims: usize,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            generator: None,
            cache: None,
            aggregator: None,
            scorer: None,
            policy: DecisionPolicy::default(),
            usage: None,
            start_tier: GenerationTier::Slm,
            max_concurrent_claims: 4,
        }
    }

    /// Pre-populate every component from configuration.
    ///
    /// Providers that cannot be built are skipped with a warning; a disabled
    /// or unbuildable scorer backend leaves the heuristic in place.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let registry = ProviderRegistry::with_defaults();
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));

        let delegate: Option<Arc<dyn DelegatedScorer>> = if config.scorer.enabled {
            let backend = &config.scorer.backend;
            match registry.create(&backend.provider, &backend.settings) {
                Ok(provider) => Some(Arc::new(LlmScorer::new(
                    provider,
                    CompletionConfig {
                        model: backend.model.clone(),
                        max_tokens: config.scorer.max_tokens,
                        temperature: 0.0,
                        timeout: config.scorer.timeout,
                    },
                ))),
                Err(e) => {
                    tracing::warn!(provider = %backend.provider, error = %e, "Scorer backend unavailable, using heuristic");
                    None
                }
            }
        } else {
            None
        };

        let scorer = VerificationScorer::new(delegate, config.scorer.timeout, breaker.clone());
        tracing::debug!(delegated = scorer.is_delegated(), "Verification scorer ready");

        Ok(Self::new()
            .generator(Arc::new(TieredGenerator::from_config(&config.generation, &registry)))
            .cache(Arc::new(ResultCache::from_config(&config.cache)))
            .aggregator(Arc::new(EvidenceAggregator::from_config(
                config.retrieval.clone(),
                breaker,
            )))
            .scorer(Arc::new(scorer))
            .policy(DecisionPolicy::new(config.policy.clone()))
            .usage(Arc::new(UsageTracker::new(config.generation.llm_reference_cost)))
            .max_concurrent_claims(config.retrieval.max_concurrent_claims))
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn aggregator(mut self, aggregator: Arc<EvidenceAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn scorer(mut self, scorer: Arc<VerificationScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Tier of the first generation. Starting at llm disables escalation.
    pub fn start_tier(mut self, tier: GenerationTier) -> Self {
        self.start_tier = tier;
        self
    }

    /// Fan-out limit for scoring.
    pub fn max_concurrent_claims(mut self, limit: usize) -> Self {
        self.max_concurrent_claims = limit.max(1);
        self
    }

    pub fn build(self) -> Result<Pipeline, RuntimeError> {
        let generator = self.generator.ok_or(RuntimeError::GeneratorNotConfigured)?;

        Ok(Pipeline {
            generator,
            extractor: ClaimExtractor::new(),
            cache: self.cache.unwrap_or_default(),
            aggregator: self.aggregator.unwrap_or_else(|| {
                Arc::new(EvidenceAggregator::new(
                    Default::default(),
                    Arc::new(CircuitBreaker::default()),
                ))
            }),
            scorer: self
                .scorer
                .unwrap_or_else(|| Arc::new(VerificationScorer::heuristic())),
            escalation: EscalationController::new(),
            policy: self.policy,
            synthesizer: Synthesizer::new(),
            usage: self.usage.unwrap_or_default(),
            start_tier: self.start_tier,
            max_concurrent_claims: self.max_concurrent_claims,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, DurableStore};
    use crate::evidence::{EvidenceSource, SearchHit};
    use crate::providers::ProviderError;
    use crate::scorer::ScorerError;
    use crate::generation::StaticGenerator;
    use async_trait::async_trait;
    use factguard_core::{Action, ParsedVerdict};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LONG_ANSWER: &str =
        "Paris is the capital of France and it is also the largest city in the whole country.";

    /// Answers differently per tier.
    struct TierGenerator {
        slm: Result<&'static str, ()>,
        llm: Result<&'static str, ()>,
    }

    #[async_trait]
    impl Generator for TierGenerator {
        async fn generate(&self, _query: &str, tier: GenerationTier) -> Result<Generation, ProviderError> {
            let reply = match tier {
                GenerationTier::Slm => self.slm,
                GenerationTier::Llm => self.llm,
            };
            let text = reply.map_err(|_| ProviderError::HttpError("connection refused".to_string()))?;
            Ok(Generation {
                text: text.to_string(),
                provider: format!("mock-{}", tier),
                model: "mock".to_string(),
                tokens: 1_000_000,
                cost: match tier {
                    GenerationTier::Slm => 0.10,
                    GenerationTier::Llm => 2.00,
                },
                ..Generation::empty(tier)
            })
        }
    }

    /// Echoes the query back as evidence and counts calls.
    #[derive(Default)]
    struct EchoSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EvidenceSource for EchoSource {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..limit)
                .map(|i| SearchHit {
                    url: format!("https://news.example.org/{}", i),
                    snippet: query.to_string(),
                    age: None,
                })
                .collect())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct CountingScorer {
        verdict: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DelegatedScorer for CountingScorer {
        async fn score(&self, _claim: &str, _block: &str) -> Result<ParsedVerdict, ScorerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ParsedVerdict::parse(self.verdict)?)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    /// Source that answers but finds nothing.
    struct EmptySource;

    #[async_trait]
    impl EvidenceSource for EmptySource {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CachedDecision>, CacheError> {
            Err(CacheError::Unavailable("disk full".to_string()))
        }

        async fn upsert(&self, _key: &str, _record: &CachedDecision) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("disk full".to_string()))
        }
    }

    fn static_pipeline(text: &str) -> Pipeline {
        Pipeline::builder()
            .generator(Arc::new(StaticGenerator::new(text)))
            .start_tier(GenerationTier::Llm)
            .build()
            .unwrap()
    }

    fn scoring_pipeline(
        generator: Arc<dyn Generator>,
        web: Arc<EchoSource>,
        scorer: Arc<CountingScorer>,
    ) -> Pipeline {
        let aggregator = EvidenceAggregator::new(Default::default(), Arc::new(CircuitBreaker::default()))
            .with_web(web);
        let scorer = VerificationScorer::new(
            Some(scorer as Arc<dyn DelegatedScorer>),
            std::time::Duration::from_secs(1),
            Arc::new(CircuitBreaker::default()),
        );

        Pipeline::builder()
            .generator(generator)
            .aggregator(Arc::new(aggregator))
            .scorer(Arc::new(scorer))
            .start_tier(GenerationTier::Llm)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_generator() {
        assert!(matches!(
            Pipeline::builder().build(),
            Err(RuntimeError::GeneratorNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_single_supported_claim_is_accepted() {
        let report = static_pipeline("Paris is the capital of France.")
            .verify("What is the capital of France?", Some("user-7"))
            .await;

        assert_eq!(report.claims.len(), 1);
        assert_eq!(report.claims[0].claim_type, factguard_core::ClaimType::Entity);
        assert_eq!(report.decisions[0].action, Action::Accept);
        assert_eq!(report.verified_answer, "Paris is the capital of France.");
        assert_eq!(report.hallucination_score, 0.0);
        assert_eq!(report.user_id.as_deref(), Some("user-7"));
        assert_eq!(report.generation.provider, "static");
        assert!(!report.escalation.escalated);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_no_claims() {
        let report = static_pipeline("Hello there.").verify("hi", None).await;

        assert!(report.claims.is_empty());
        assert_eq!(report.hallucination_score, 0.0);
        assert_eq!(report.confidence, 1.0);
        assert!(report.modifications.is_empty());
        assert_eq!(report.verified_answer, "Hello there.");
    }

    #[tokio::test]
    async fn test_hedged_slm_answer_escalates() {
        let generator = TierGenerator {
            slm: Ok("I'm not sure about this."),
            llm: Ok("I'm not sure about this."),
        };
        let pipeline = Pipeline::builder().generator(Arc::new(generator)).build().unwrap();

        let report = pipeline.verify("q", None).await;
        assert!(report.escalation.escalated);
        assert!(report.escalation.reason.unwrap().contains("uncertainty"));
        assert_eq!(report.generation.tier, GenerationTier::Llm);

        let stats = pipeline.stats();
        assert_eq!(stats.slm_calls, 1);
        assert_eq!(stats.llm_calls, 1);
        assert_eq!(stats.escalations, 1);
        assert_eq!(stats.cost_saved, 0.0);
    }

    #[tokio::test]
    async fn test_escalation_discards_slm_claims() {
        let generator = TierGenerator {
            slm: Ok("Rome was founded in 753 BC. I'm not sure though."),
            llm: Ok(LONG_ANSWER),
        };
        let pipeline = Pipeline::builder().generator(Arc::new(generator)).build().unwrap();

        let report = pipeline.verify("q", None).await;
        assert!(report.escalation.escalated);
        assert_eq!(report.claims.len(), 1);
        assert!(report.claims[0].text.starts_with("Paris"));
        assert_eq!(report.decisions.len(), 1);
        assert_eq!(report.original_answer, LONG_ANSWER);
    }

    #[tokio::test]
    async fn test_clean_slm_answer_is_kept_and_saves_cost() {
        let generator = TierGenerator {
            slm: Ok(LONG_ANSWER),
            llm: Err(()),
        };
        let pipeline = Pipeline::builder().generator(Arc::new(generator)).build().unwrap();

        let report = pipeline.verify("q", None).await;
        assert!(!report.escalation.escalated);
        assert_eq!(report.escalation.detected_confidence, 1.0);
        assert_eq!(report.generation.tier, GenerationTier::Slm);

        let stats = pipeline.stats();
        assert_eq!(stats.llm_calls, 0);
        assert!((stats.cost_saved - 1.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_generation_failure_is_recorded() {
        let generator = TierGenerator { slm: Err(()), llm: Err(()) };
        let pipeline = Pipeline::builder().generator(Arc::new(generator)).build().unwrap();

        let report = pipeline.verify("q", None).await;
        // Empty slm answer is too brief, so the llm tier is tried once too
        assert!(report.escalation.escalated);
        assert_eq!(report.errors.len(), 2);
        assert!(report.claims.is_empty());
        assert_eq!(report.verified_answer, "");
        assert_eq!(pipeline.stats().total_calls, 0);
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let web = Arc::new(EchoSource::default());
        let scorer = Arc::new(CountingScorer {
            verdict: r#"{"support_score": 0.95, "contradiction_score": 0.0, "neutral_score": 0.05, "confidence": 0.9}"#,
            calls: AtomicUsize::new(0),
        });
        let pipeline = scoring_pipeline(
            Arc::new(StaticGenerator::new(LONG_ANSWER)),
            web.clone(),
            scorer.clone(),
        );

        let first = pipeline.verify("q", None).await;
        assert_eq!(first.decisions[0].action, Action::Accept);
        assert_eq!(web.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);

        let second = pipeline.verify("q", None).await;
        assert_eq!(second.decisions[0].action, Action::Accept);
        assert_eq!(second.decisions[0].reasoning, "from cache");
        assert_eq!(web.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_contradicted_claim_without_correction() {
        let scorer = Arc::new(CountingScorer {
            verdict: r#"{"support_score": 0.05, "contradiction_score": 0.9, "neutral_score": 0.05, "confidence": 0.85}"#,
            calls: AtomicUsize::new(0),
        });
        let pipeline = scoring_pipeline(
            Arc::new(StaticGenerator::new("Berlin is the capital of France.")),
            Arc::new(EchoSource::default()),
            scorer,
        );

        let report = pipeline.verify("q", None).await;
        assert_eq!(report.decisions[0].action, Action::Correct);
        assert_eq!(report.verified_answer, "Berlin is the capital of France.");
        assert_eq!(report.claim_breakdown.corrected, 1);
        assert_eq!(report.hallucination_score, 1.0);
        assert!(matches!(
            &report.modifications[0],
            Modification::Correction { corrected: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_claims_without_evidence_do_not_force_escalation() {
        let generator = TierGenerator {
            slm: Ok("Zorblax Quintar was founded in 1893 by a small group of travelling merchants from the northern coast."),
            llm: Err(()),
        };
        let aggregator = EvidenceAggregator::new(Default::default(), Arc::new(CircuitBreaker::default()))
            .with_web(Arc::new(EmptySource))
            .with_reference(Arc::new(EmptySource));
        let pipeline = Pipeline::builder()
            .generator(Arc::new(generator))
            .aggregator(Arc::new(aggregator))
            .build()
            .unwrap();

        let report = pipeline.verify("q", None).await;
        assert!(!report.escalation.escalated);
        assert_eq!(report.escalation.detected_hallucination_score, 0.0);
        assert_eq!(report.escalation.detected_confidence, 1.0);
        assert_eq!(report.generation.tier, GenerationTier::Slm);
        assert_eq!(report.claims.len(), 1);
        assert_eq!(report.decisions[0].action, Action::Abstain);
        assert!(report.decisions[0].evidence_urls.is_empty());
        assert_eq!(pipeline.stats().llm_calls, 0);
    }

    #[tokio::test]
    async fn test_cache_failures_do_not_surface() {
        let cache = ResultCache::default().with_durable(Arc::new(BrokenStore));
        let pipeline = Pipeline::builder()
            .generator(Arc::new(StaticGenerator::new("Paris is the capital of France.")))
            .cache(Arc::new(cache))
            .start_tier(GenerationTier::Llm)
            .build()
            .unwrap();

        let first = pipeline.verify("q", None).await;
        assert!(first.errors.is_empty());

        let second = pipeline.verify("q", None).await;
        assert!(second.errors.is_empty());
        assert_eq!(second.decisions[0].reasoning, "from cache");
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut stage = Stage::Generate;
        let mut visited = vec![stage];
        while stage != Stage::Done {
            stage = next(stage, Outcome::Continue);
            visited.push(stage);
        }
        assert_eq!(
            visited,
            vec![
                Stage::Generate,
                Stage::Extract,
                Stage::CheckCache,
                Stage::RetrieveEvidence,
                Stage::Verify,
                Stage::CheckEscalation,
                Stage::ApplyPolicy,
                Stage::Assemble,
                Stage::UpdateCache,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn test_all_cached_skips_retrieval() {
        assert_eq!(next(Stage::CheckCache, Outcome::AllCached), Stage::CheckEscalation);
        assert_eq!(next(Stage::CheckEscalation, Outcome::Escalate), Stage::Generate);
    }

    fn any_stage() -> impl Strategy<Value = Stage> {
        prop_oneof![
            Just(Stage::Generate),
            Just(Stage::Extract),
            Just(Stage::CheckCache),
            Just(Stage::RetrieveEvidence),
            Just(Stage::Verify),
            Just(Stage::CheckEscalation),
            Just(Stage::ApplyPolicy),
            Just(Stage::Assemble),
            Just(Stage::UpdateCache),
            Just(Stage::Done),
        ]
    }

    fn any_outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            Just(Outcome::Continue),
            Just(Outcome::AllCached),
            Just(Outcome::Escalate),
        ]
    }

    proptest! {
        #[test]
        fn only_escalation_returns_to_generate(stage in any_stage(), outcome in any_outcome()) {
            let target = next(stage, outcome);
            if target == Stage::Generate {
                prop_assert_eq!(stage, Stage::CheckEscalation);
                prop_assert_eq!(outcome, Outcome::Escalate);
            }
        }

        #[test]
        fn every_run_terminates(outcomes in proptest::collection::vec(any_outcome(), 32)) {
            // With escalation honoured at most once, any outcome sequence reaches Done
            let mut stage = Stage::Generate;
            let mut escalated = false;
            for outcome in outcomes {
                if stage == Stage::Done {
                    break;
                }
                let outcome = if outcome == Outcome::Escalate && escalated {
                    Outcome::Continue
                } else {
                    outcome
                };
                if stage == Stage::CheckEscalation && outcome == Outcome::Escalate {
                    escalated = true;
                }
                stage = next(stage, outcome);
            }
            prop_assert_eq!(stage, Stage::Done);
        }
    }
}
