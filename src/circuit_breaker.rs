use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How an attempt against a source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureKind),
}

/// Rate-limit failures trip a breaker faster and keep it open longer than
/// generic transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    RateLimited,
}

/// Per-source breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive transient failures before opening.
    pub failure_threshold: u32,
    /// Rate-limit failures before opening.
    pub rate_limit_trip: u32,
    /// Cool-down after opening on transient failures.
    pub cooldown: Duration,
    /// Cool-down after opening on rate limiting.
    pub rate_limit_cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            rate_limit_trip: 1,
            cooldown: Duration::from_secs(30),
            rate_limit_cooldown: Duration::from_secs(120),
        }
    }
}

/// Breaker states.
///
/// - **Closed**: calls pass through, consecutive failures counted.
/// - **Open**: calls short-circuit with zero cost and zero latency until the
///   cool-down elapses.
/// - **HalfOpen**: exactly one trial call is in flight; its outcome decides
///   whether the breaker closes or re-opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum BreakerInner {
    Closed { consecutive_failures: u32 },
    Open { since: Instant, cooldown: Duration },
    HalfOpen,
}

/// One circuit breaker per enrichment source, created lazily on first use.
///
/// `allow` must be called before every external call -- including before any
/// budget reservation, so a failing source never holds budget back from
/// working ones -- and `record` after every actual attempt. Transitions are
/// check-and-set under one lock, so concurrent workers observe a consistent
/// state and only one of them wins the half-open probe.
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, BreakerInner>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a call to `source` may proceed right now. An open breaker
    /// whose cool-down has elapsed transitions to half-open and admits
    /// exactly one probe; further callers are refused until the probe's
    /// outcome is recorded.
    pub fn allow(&self, source: &str) -> bool {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        let inner = breakers
            .entry(source.to_string())
            .or_insert(BreakerInner::Closed {
                consecutive_failures: 0,
            });

        match inner {
            BreakerInner::Closed { .. } => true,
            BreakerInner::Open { since, cooldown } => {
                if since.elapsed() >= *cooldown {
                    tracing::info!(source, "Breaker cool-down elapsed, admitting probe");
                    *inner = BreakerInner::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerInner::HalfOpen => false,
        }
    }

    /// Record the outcome of an actual attempt against `source`.
    pub fn record(&self, source: &str, outcome: Outcome) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        let inner = breakers
            .entry(source.to_string())
            .or_insert(BreakerInner::Closed {
                consecutive_failures: 0,
            });

        match outcome {
            Outcome::Success => {
                if !matches!(*inner, BreakerInner::Closed { consecutive_failures: 0 }) {
                    tracing::debug!(source, "Breaker closed after success");
                }
                *inner = BreakerInner::Closed {
                    consecutive_failures: 0,
                };
            }
            Outcome::Failure(kind) => {
                let cooldown = match kind {
                    FailureKind::Transient => self.config.cooldown,
                    FailureKind::RateLimited => self.config.rate_limit_cooldown,
                };
                let trip_at = match kind {
                    FailureKind::Transient => self.config.failure_threshold,
                    FailureKind::RateLimited => self.config.rate_limit_trip,
                };

                match inner {
                    BreakerInner::Closed {
                        consecutive_failures,
                    } => {
                        *consecutive_failures += 1;
                        if *consecutive_failures >= trip_at {
                            tracing::warn!(
                                source,
                                failures = *consecutive_failures,
                                ?kind,
                                cooldown_secs = cooldown.as_secs(),
                                "Breaker opened"
                            );
                            *inner = BreakerInner::Open {
                                since: Instant::now(),
                                cooldown,
                            };
                        }
                    }
                    BreakerInner::HalfOpen => {
                        tracing::warn!(source, ?kind, "Probe failed, breaker re-opened");
                        *inner = BreakerInner::Open {
                            since: Instant::now(),
                            cooldown,
                        };
                    }
                    // A late failure report while already open keeps it open.
                    BreakerInner::Open { .. } => {}
                }
            }
        }
    }

    /// Give back an admitted half-open probe without an attempt (e.g. the
    /// budget reservation failed after `allow`). The breaker re-enters Open
    /// with a spent cool-down so the next caller is admitted as the probe.
    pub fn yield_probe(&self, source: &str) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        if let Some(inner) = breakers.get_mut(source) {
            if matches!(*inner, BreakerInner::HalfOpen) {
                *inner = BreakerInner::Open {
                    since: Instant::now(),
                    cooldown: Duration::ZERO,
                };
            }
        }
    }

    pub fn state(&self, source: &str) -> CircuitState {
        let breakers = self.breakers.lock().expect("breaker lock poisoned");
        match breakers.get(source) {
            None | Some(BreakerInner::Closed { .. }) => CircuitState::Closed,
            Some(BreakerInner::Open { .. }) => CircuitState::Open,
            Some(BreakerInner::HalfOpen) => CircuitState::HalfOpen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            rate_limit_trip: 1,
            cooldown: Duration::from_millis(30),
            rate_limit_cooldown: Duration::from_millis(120),
        }
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let registry = CircuitBreakerRegistry::new(fast_config());

        for _ in 0..3 {
            assert!(registry.allow("lookup-a"));
            registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        }
        assert_eq!(registry.state("lookup-a"), CircuitState::Open);
        assert!(!registry.allow("lookup-a"));
    }

    #[test]
    fn success_resets_failure_count() {
        let registry = CircuitBreakerRegistry::new(fast_config());

        registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        registry.record("lookup-a", Outcome::Success);
        registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        assert_eq!(registry.state("lookup-a"), CircuitState::Closed);
        assert!(registry.allow("lookup-a"));
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..3 {
            registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        }
        assert!(!registry.allow("lookup-a"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(registry.allow("lookup-a"));
        // Probe outstanding: nobody else gets in.
        assert!(!registry.allow("lookup-a"));
        assert_eq!(registry.state("lookup-a"), CircuitState::HalfOpen);

        registry.record("lookup-a", Outcome::Success);
        assert_eq!(registry.state("lookup-a"), CircuitState::Closed);
        assert!(registry.allow("lookup-a"));
    }

    #[test]
    fn failed_probe_reopens() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..3 {
            registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        }
        std::thread::sleep(Duration::from_millis(40));
        assert!(registry.allow("lookup-a"));
        registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        assert_eq!(registry.state("lookup-a"), CircuitState::Open);
        assert!(!registry.allow("lookup-a"));
    }

    #[test]
    fn rate_limit_opens_immediately_with_longer_cooldown() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        assert!(registry.allow("lookup-a"));
        registry.record("lookup-a", Outcome::Failure(FailureKind::RateLimited));
        assert_eq!(registry.state("lookup-a"), CircuitState::Open);

        // Generic cool-down has elapsed but the rate-limit one has not.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!registry.allow("lookup-a"));

        std::thread::sleep(Duration::from_millis(90));
        assert!(registry.allow("lookup-a"));
    }

    #[test]
    fn sources_are_independent() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..3 {
            registry.record("lookup-a", Outcome::Failure(FailureKind::Transient));
        }
        assert!(!registry.allow("lookup-a"));
        assert!(registry.allow("lookup-b"));
    }
}
