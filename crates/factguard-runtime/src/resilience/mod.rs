//! Resilience patterns for factguard-runtime.
//!
//! This module provides:
//! - Circuit breaker per named dependency (evidence sources, scorer)
//! - Process-wide generation usage and cost tracking

mod circuit_breaker;
mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use usage::{UsageStats, UsageTracker};
