//! Generation usage and cost tracking.
//!
//! Counters are process-wide and shared by every request a pipeline serves.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use factguard_core::GenerationTier;

use crate::generation::Generation;

/// Default premium-tier price per million tokens, used to estimate savings.
pub const DEFAULT_LLM_REFERENCE_COST: f64 = 2.00;

/// Snapshot of usage counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub slm_calls: u64,
    pub llm_calls: u64,
    pub total_calls: u64,
    pub escalations: u64,

    /// Escalations per slm call
    pub escalation_rate: f64,

    /// Estimated spend in USD
    pub total_cost: f64,

    /// Estimated USD saved by answering at the slm tier
    pub cost_saved: f64,

    pub avg_cost_per_call: f64,
}

#[derive(Debug, Default)]
struct CostTotals {
    total_cost: f64,
    cost_saved: f64,
}

/// Tracks generation calls, escalations and cost.
pub struct UsageTracker {
    slm_calls: AtomicU64,
    llm_calls: AtomicU64,
    escalations: AtomicU64,
    costs: RwLock<CostTotals>,
    llm_reference_cost: f64,
}

impl UsageTracker {
    /// Create a tracker; `llm_reference_cost` is the premium price per
    /// million tokens used to estimate savings.
    pub fn new(llm_reference_cost: f64) -> Self {
        Self {
            slm_calls: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            costs: RwLock::new(CostTotals::default()),
            llm_reference_cost,
        }
    }

    /// Record a generation call.
    pub fn record_generation(&self, generation: &Generation) {
        match generation.tier {
            GenerationTier::Slm => self.slm_calls.fetch_add(1, Ordering::SeqCst),
            GenerationTier::Llm => self.llm_calls.fetch_add(1, Ordering::SeqCst),
        };
        self.costs.write().total_cost += generation.cost;
    }

    /// Record an escalation from slm to llm.
    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a request answered at the slm tier without escalation.
    pub fn record_slm_answer(&self, generation: &Generation) {
        let premium = generation.tokens as f64 / 1_000_000.0 * self.llm_reference_cost;
        let saved = (premium - generation.cost).max(0.0);
        self.costs.write().cost_saved += saved;
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> UsageStats {
        let slm_calls = self.slm_calls.load(Ordering::SeqCst);
        let llm_calls = self.llm_calls.load(Ordering::SeqCst);
        let escalations = self.escalations.load(Ordering::SeqCst);
        let total_calls = slm_calls + llm_calls;
        let costs = self.costs.read();

        UsageStats {
            slm_calls,
            llm_calls,
            total_calls,
            escalations,
            escalation_rate: escalations as f64 / slm_calls.max(1) as f64,
            total_cost: costs.total_cost,
            cost_saved: costs.cost_saved,
            avg_cost_per_call: costs.total_cost / total_calls.max(1) as f64,
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.slm_calls.store(0, Ordering::SeqCst);
        self.llm_calls.store(0, Ordering::SeqCst);
        self.escalations.store(0, Ordering::SeqCst);
        *self.costs.write() = CostTotals::default();
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LLM_REFERENCE_COST)
    }
}
