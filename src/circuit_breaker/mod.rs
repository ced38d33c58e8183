//! Per-process circuit breaker registry. Breakers are identified by name
//! (`"cohere_chat"` is the only named breaker in use) and are mutated under
//! a `parking_lot::Mutex`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<OffsetDateTime>,
    /// Set while a half-open trial call is outstanding so only one caller at
    /// a time gets to probe; everyone else fails fast until it resolves.
    half_open_probe_in_flight: bool,
}

impl Breaker {
    fn new() -> Self {
        Self { state: State::Closed, consecutive_failures: 0, opened_at: None, half_open_probe_in_flight: false }
    }
}

pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Breaker>>,
    failure_threshold: u32,
    open_duration: Duration,
}

/// A single probe slot for a half-open breaker: only one caller at a time
/// may be the trial call, everyone else sees `CircuitOpen` until that call
/// resolves.
pub struct Guard<'a> {
    registry: &'a CircuitBreakerRegistry,
    name: String,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, open_secs: i64) -> Arc<Self> {
        Arc::new(Self {
            breakers: Mutex::new(HashMap::new()),
            failure_threshold,
            open_duration: Duration::seconds(open_secs),
        })
    }

    /// Checks whether a call to `name` may proceed, transitioning
    /// `open` -> `half_open` once the open duration has elapsed. Returns a
    /// [`Guard`] to report the outcome through, or `CircuitOpen` if calls
    /// must fail fast.
    pub fn before_call(&self, name: &str) -> Result<Guard<'_>> {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(name.to_string()).or_insert_with(Breaker::new);

        match breaker.state {
            State::Closed => {}
            State::HalfOpen => {
                if breaker.half_open_probe_in_flight {
                    return Err(Error::circuit_open(name));
                }
                breaker.half_open_probe_in_flight = true;
            }
            State::Open => {
                let opened_at = breaker.opened_at.expect("open state always carries opened_at");
                if crate::time_util::now() - opened_at >= self.open_duration {
                    breaker.state = State::HalfOpen;
                    breaker.half_open_probe_in_flight = true;
                } else {
                    return Err(Error::circuit_open(name));
                }
            }
        }

        Ok(Guard { registry: self, name: name.to_string() })
    }

    fn record_success(&self, name: &str) {
        let mut breakers = self.breakers.lock();
        if let Some(breaker) = breakers.get_mut(name) {
            breaker.state = State::Closed;
            breaker.consecutive_failures = 0;
            breaker.opened_at = None;
            breaker.half_open_probe_in_flight = false;
        }
    }

    fn record_failure(&self, name: &str) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(name.to_string()).or_insert_with(Breaker::new);
        breaker.consecutive_failures += 1;
        breaker.half_open_probe_in_flight = false;

        match breaker.state {
            State::HalfOpen => {
                breaker.state = State::Open;
                breaker.opened_at = Some(crate::time_util::now());
            }
            State::Closed if breaker.consecutive_failures >= self.failure_threshold => {
                breaker.state = State::Open;
                breaker.opened_at = Some(crate::time_util::now());
            }
            _ => {}
        }
    }
}

impl Guard<'_> {
    pub fn success(self) {
        self.registry.record_success(&self.name);
    }

    pub fn failure(self) {
        self.registry.record_failure(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures_then_fails_fast() {
        let registry = CircuitBreakerRegistry::new(5, 60);
        for _ in 0..5 {
            let guard = registry.before_call("cohere_chat").unwrap();
            guard.failure();
        }
        let result = registry.before_call("cohere_chat");
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let registry = CircuitBreakerRegistry::new(5, 60);
        for _ in 0..4 {
            registry.before_call("cohere_chat").unwrap().failure();
        }
        registry.before_call("cohere_chat").unwrap().success();
        for _ in 0..4 {
            registry.before_call("cohere_chat").unwrap().failure();
        }
        // Still only 4 consecutive failures since the reset; breaker stays closed.
        assert!(registry.before_call("cohere_chat").is_ok());
    }

    #[test]
    fn half_open_admits_only_one_probe_at_a_time() {
        // Zero-second open duration: the very next `before_call` after
        // opening already sees the window elapsed and flips to half-open.
        let registry = CircuitBreakerRegistry::new(1, 0);
        registry.before_call("cohere_chat").unwrap().failure();

        let probe = registry.before_call("cohere_chat").unwrap();
        let second_caller = registry.before_call("cohere_chat");
        assert!(matches!(second_caller, Err(Error::CircuitOpen { .. })));

        probe.success();
        assert!(registry.before_call("cohere_chat").is_ok());
    }

    #[test]
    fn half_open_probe_failure_reopens_and_releases_the_slot() {
        let registry = CircuitBreakerRegistry::new(1, 0);
        registry.before_call("cohere_chat").unwrap().failure();

        let probe = registry.before_call("cohere_chat").unwrap();
        probe.failure();

        // Breaker is open again immediately (zero-second duration), so the
        // next call gets to be the new trial probe rather than being
        // permanently locked out by the stale in-flight flag.
        let result = registry.before_call("cohere_chat");
        assert!(result.is_ok());
    }
}
