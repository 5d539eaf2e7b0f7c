//! Change monitoring pipeline.
//!
//! - `fingerprint`: content hash of an article
//! - `detect`: fingerprint comparison against a stored source
//! - `circuit_breaker`: subscriber deactivation after repeated failures
//! - `refresh`: sweeps and the interval scheduler
//! - `monitor`: service wiring and the read path

pub mod circuit_breaker;
pub mod detect;
pub mod fingerprint;
pub mod monitor;
pub mod refresh;

#[cfg(test)]
pub(crate) mod testing;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerResult};
pub use detect::{ChangeDetector, Detection, DetectionResult};
pub use fingerprint::fingerprint;
pub use monitor::Monitor;
pub use refresh::{Refresher, SweepReport};
