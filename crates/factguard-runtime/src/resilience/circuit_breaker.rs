//! Circuit breaker to prevent cascade failures.
//!
//! When a dependency fails repeatedly, its circuit opens and subsequent
//! calls go straight to the fallback path (placeholder evidence, heuristic
//! scoring) until the recovery timeout passes.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::duration_str;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, all calls bypass
    Open { opened_at: Instant },

    /// Testing if circuit can close
    HalfOpen { successes: u32 },
}

/// Circuit breaker keyed by dependency name ("web", "reference", "scorer").
///
/// Each dependency has its own circuit to allow independent recovery.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns true if calls to `key` should bypass the dependency.
    pub fn is_open(&self, key: &str) -> bool {
        let states = self.states.read();
        match states.get(key) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(key);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, key: &str) {
        let mut states = self.states.write();
        match states.get(key).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(key.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(dependency = key, "Circuit closed after successful recovery");
                } else {
                    states.insert(key.to_string(), CircuitState::HalfOpen {
                        successes: successes + 1,
                    });
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(key.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, key: &str) {
        let mut states = self.states.write();
        let failures = match states.get(key).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(key.to_string(), CircuitState::Open {
                    opened_at: Instant::now(),
                });
                tracing::warn!(dependency = key, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(key.to_string(), CircuitState::Open {
                opened_at: Instant::now(),
            });
            tracing::warn!(
                dependency = key,
                failures,
                "Circuit opened after repeated failures"
            );
        } else {
            states.insert(key.to_string(), CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, key: &str) {
        let mut states = self.states.write();
        if matches!(states.get(key), Some(CircuitState::Open { .. })) {
            states.insert(key.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(dependency = key, "Circuit half-open for recovery test");
        }
    }

    /// Current state of a circuit.
    pub fn state(&self, key: &str) -> CircuitState {
        self.states
            .read()
            .get(key)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open("web"));
        assert!(matches!(cb.state("web"), CircuitState::Closed { failures: 0 }));
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        cb.record_failure("web");
        assert!(!cb.is_open("web"));

        cb.record_failure("web");
        assert!(cb.is_open("web"));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();

        cb.record_failure("reference");
        cb.record_failure("reference");
        cb.record_success("reference");

        cb.record_failure("reference");
        cb.record_failure("reference");
        assert!(!cb.is_open("reference"));
    }

    #[test]
    fn test_dependencies_are_independent() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        cb.record_failure("web");
        cb.record_failure("web");

        assert!(cb.is_open("web"));
        assert!(!cb.is_open("reference"));
    }

    #[test]
    fn test_recovery_after_timeout() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 1,
        });

        cb.record_failure("scorer");
        // Zero timeout: the first check moves straight to half-open
        assert!(!cb.is_open("scorer"));
        assert!(matches!(cb.state("scorer"), CircuitState::HalfOpen { .. }));

        cb.record_success("scorer");
        assert!(matches!(cb.state("scorer"), CircuitState::Closed { failures: 0 }));
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 2,
        });

        cb.record_failure("web");
        assert!(!cb.is_open("web"));
        cb.record_failure("web");
        assert!(matches!(cb.state("web"), CircuitState::Open { .. }));
    }
}
