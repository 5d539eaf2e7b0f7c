//! Circuit breaker for webhook subscribers.
//!
//! Tracks consecutive delivery failures on the subscriber record itself.
//! Once the count reaches the threshold the subscriber is deactivated and
//! receives no further events.
//!
//! > After **5** consecutive failed deliveries, `is_active` flips to false.
//! > A single success resets the count to zero.

use crate::models::Subscriber;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker. Default: 5
    pub failure_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
        }
    }
}

/// Circuit breaker applied to subscriber delivery outcomes.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
}

/// State change caused by one delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerResult {
    /// Success with no prior failures, nothing to persist
    Healthy,
    /// Success after failures, count reset to zero
    Recovered { previous_failures: u32 },
    /// Failure below the threshold
    Degraded { failure_count: u32 },
    /// Failure that reached the threshold, subscriber deactivated
    Tripped { failure_count: u32 },
}

impl CircuitBreakerResult {
    /// Whether the subscriber record changed and must be written back.
    pub fn needs_persist(&self) -> bool {
        !matches!(self, Self::Healthy)
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self { config }
    }

    pub fn with_threshold(failure_threshold: u32) -> Self {
        Self::with_config(CircuitBreakerConfig { failure_threshold })
    }

    pub fn threshold(&self) -> u32 {
        self.config.failure_threshold
    }

    /// Apply a successful delivery.
    pub fn record_success(&self, subscriber: &mut Subscriber) -> CircuitBreakerResult {
        if subscriber.failure_count == 0 {
            return CircuitBreakerResult::Healthy;
        }
        let previous_failures = subscriber.failure_count;
        subscriber.failure_count = 0;
        log::info!(
            "Subscriber {} recovered after {} failures",
            subscriber.id,
            previous_failures
        );
        CircuitBreakerResult::Recovered { previous_failures }
    }

    /// Apply a failed delivery.
    pub fn record_failure(&self, subscriber: &mut Subscriber) -> CircuitBreakerResult {
        subscriber.failure_count = subscriber.failure_count.saturating_add(1);
        let failure_count = subscriber.failure_count;

        if failure_count >= self.config.failure_threshold {
            subscriber.is_active = false;
            log::error!(
                "Circuit breaker: TRIPPED for subscriber {} ({}) after {} consecutive failures",
                subscriber.id,
                subscriber.callback_url,
                failure_count
            );
            CircuitBreakerResult::Tripped { failure_count }
        } else {
            log::warn!(
                "Subscriber {} failure {}/{}",
                subscriber.id,
                failure_count,
                self.config.failure_threshold
            );
            CircuitBreakerResult::Degraded { failure_count }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
