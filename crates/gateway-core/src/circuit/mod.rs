//! Circuit breaker: closed/open/half-open state machine wrapping a
//! [`Bulkhead`] for concurrency limiting, keyed per provider by the
//! registry in [`crate::registries`].

pub mod bulkhead;
pub mod config;

pub use bulkhead::{Bulkhead, Permit};
pub use config::{profile, CircuitConfig, ConfigError};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    status: CircuitStatus,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

/// One circuit per `(provider, model)` or per-provider key. Tracks
/// consecutive failures in the closed state, trips to open once
/// `failure_threshold` is reached, waits `reset_timeout` before probing in
/// half-open, and either closes after `success_threshold` consecutive
/// successes or reopens on the first half-open failure.
pub struct Circuit {
    config: Mutex<CircuitConfig>,
    state: Mutex<Inner>,
    bulkhead: Arc<Bulkhead>,
    history: Mutex<Vec<CircuitConfig>>,
    version: Mutex<u64>,
}

const MAX_HISTORY: usize = 16;

impl Circuit {
    pub fn new(config: CircuitConfig) -> Self {
        let bulkhead = Arc::new(Bulkhead::new(config.max_concurrent, config.max_queued, config.queue_timeout));
        Self {
            config: Mutex::new(config),
            state: Mutex::new(Inner {
                status: CircuitStatus::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            }),
            bulkhead,
            history: Mutex::new(Vec::new()),
            version: Mutex::new(0),
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.refresh_from_timeout();
        self.state.lock().unwrap().status
    }

    pub fn version(&self) -> u64 {
        *self.version.lock().unwrap()
    }

    /// Moves an `Open` circuit whose `reset_timeout` has elapsed into
    /// `HalfOpen`, so a caller checking status sees the up-to-date phase
    /// without needing a background ticker.
    fn refresh_from_timeout(&self) {
        let reset_timeout = self.config.lock().unwrap().reset_timeout;
        let mut state = self.state.lock().unwrap();
        if state.status == CircuitStatus::Open {
            if let Some(opened_at) = state.opened_at {
                if opened_at.elapsed() >= reset_timeout {
                    state.status = CircuitStatus::HalfOpen;
                    state.success_count = 0;
                    tracing::debug!("circuit reset_timeout elapsed, probing in half-open");
                }
            }
        }
    }

    /// Returns an error without consulting the bulkhead if the circuit is
    /// open; otherwise acquires a bulkhead permit, counting toward the
    /// concurrency/queue limits regardless of phase (half-open probes still
    /// respect the bulkhead). Blocks the calling thread while queued — only
    /// safe to call directly off the async runtime (tests, sync callers);
    /// async call sites must use [`Circuit::acquire_async`] instead.
    pub fn acquire(&self) -> Result<Permit, GatewayError> {
        self.refresh_from_timeout();
        if self.state.lock().unwrap().status == CircuitStatus::Open {
            tracing::debug!("circuit open, rejecting without touching the bulkhead");
            return Err(GatewayError::CircuitOpen("circuit is open".into()));
        }
        Arc::clone(&self.bulkhead).acquire()
    }

    /// The async-safe equivalent of [`Circuit::acquire`]: the bulkhead's
    /// blocking condvar wait runs inside `tokio::task::spawn_blocking` so a
    /// queued caller never parks a runtime worker thread.
    pub async fn acquire_async(&self) -> Result<Permit, GatewayError> {
        self.refresh_from_timeout();
        if self.state.lock().unwrap().status == CircuitStatus::Open {
            tracing::debug!("circuit open, rejecting without touching the bulkhead");
            return Err(GatewayError::CircuitOpen("circuit is open".into()));
        }
        let bulkhead = Arc::clone(&self.bulkhead);
        tokio::task::spawn_blocking(move || bulkhead.acquire())
            .await
            .map_err(|e| GatewayError::NetworkError(format!("bulkhead acquire task panicked: {e}")))?
    }

    pub fn record_success(&self) {
        let config = self.config.lock().unwrap().clone();
        let mut state = self.state.lock().unwrap();
        match state.status {
            CircuitStatus::Closed => {
                state.failure_count = 0;
            }
            CircuitStatus::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= config.success_threshold {
                    state.status = CircuitStatus::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                    tracing::info!("circuit closed after {} consecutive half-open successes", config.success_threshold);
                }
            }
            CircuitStatus::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let config = self.config.lock().unwrap().clone();
        let mut state = self.state.lock().unwrap();
        match state.status {
            CircuitStatus::Closed => {
                state.failure_count += 1;
                if state.failure_count >= config.failure_threshold {
                    state.status = CircuitStatus::Open;
                    state.opened_at = Some(Instant::now());
                    tracing::warn!("circuit tripped open after {} consecutive failures", config.failure_threshold);
                }
            }
            CircuitStatus::HalfOpen => {
                state.status = CircuitStatus::Open;
                state.opened_at = Some(Instant::now());
                state.success_count = 0;
                tracing::warn!("circuit reopened after a half-open probe failure");
            }
            CircuitStatus::Open => {}
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.bulkhead.in_flight()
    }

    pub fn queued(&self) -> u32 {
        self.bulkhead.queued()
    }

    /// Replaces the live config, pushing the old one onto a bounded history
    /// (most recent `MAX_HISTORY` entries) and bumping the version counter.
    /// Does not rebuild the bulkhead's already-admitted slots; new limits
    /// apply to subsequent `acquire` calls, matching a live-reload that
    /// doesn't interrupt in-flight work.
    pub fn update(&self, new_config: CircuitConfig) -> Result<(), ConfigError> {
        new_config.validate()?;
        let mut config = self.config.lock().unwrap();
        let mut history = self.history.lock().unwrap();
        history.push(config.clone());
        if history.len() > MAX_HISTORY {
            history.remove(0);
        }
        *config = new_config;
        *self.version.lock().unwrap() += 1;
        Ok(())
    }

    /// Reverts to the previous config in history, if any.
    pub fn rollback(&self) -> bool {
        let mut history = self.history.lock().unwrap();
        if let Some(previous) = history.pop() {
            *self.config.lock().unwrap() = previous;
            *self.version.lock().unwrap() += 1;
            true
        } else {
            false
        }
    }

    pub fn apply_profile(&self, name: &str) -> Result<bool, ConfigError> {
        match profile(name) {
            Some(cfg) => {
                self.update(cfg)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn config(&self) -> CircuitConfig {
        self.config.lock().unwrap().clone()
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new(CircuitConfig::default())
    }
}

/// Scoped duration-based failure-rate windowing is intentionally not
/// implemented: the design keeps to a simple consecutive-failure counter,
/// matching `CircuitConfig`'s `failure_threshold` naming. A sliding-window
/// rate would need a ring buffer of timestamps; revisit only if spec'd.
pub type CircuitWindow = Duration;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_open_after_threshold_failures() {
        let circuit = Circuit::new(CircuitConfig {
            failure_threshold: 3,
            ..CircuitConfig::default()
        });
        assert_eq!(circuit.status(), CircuitStatus::Closed);
        circuit.record_failure();
        circuit.record_failure();
        assert_eq!(circuit.status(), CircuitStatus::Closed);
        circuit.record_failure();
        assert_eq!(circuit.status(), CircuitStatus::Open);
    }

    #[test]
    fn open_circuit_rejects_without_touching_bulkhead() {
        let circuit = Circuit::new(CircuitConfig {
            failure_threshold: 1,
            ..CircuitConfig::default()
        });
        circuit.record_failure();
        assert!(matches!(circuit.acquire(), Err(GatewayError::CircuitOpen(_))));
        assert_eq!(circuit.in_flight(), 0);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let circuit = Circuit::new(CircuitConfig {
            failure_threshold: 1,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(1),
            ..CircuitConfig::default()
        });
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(circuit.status(), CircuitStatus::HalfOpen);
        circuit.record_success();
        assert_eq!(circuit.status(), CircuitStatus::HalfOpen);
        circuit.record_success();
        assert_eq!(circuit.status(), CircuitStatus::Closed);
    }

    #[test]
    fn half_open_reopens_on_any_failure() {
        let circuit = Circuit::new(CircuitConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(1),
            ..CircuitConfig::default()
        });
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(circuit.status(), CircuitStatus::HalfOpen);
        circuit.record_failure();
        assert_eq!(circuit.status(), CircuitStatus::Open);
    }

    #[test]
    fn update_validates_and_records_history() {
        let circuit = Circuit::default();
        let v0 = circuit.version();
        circuit
            .update(CircuitConfig {
                failure_threshold: 0,
                ..CircuitConfig::default()
            })
            .unwrap_err();
        circuit
            .update(CircuitConfig {
                failure_threshold: 9,
                ..CircuitConfig::default()
            })
            .unwrap();
        assert_eq!(circuit.version(), v0 + 1);
        assert!(circuit.rollback());
        assert_eq!(circuit.config().failure_threshold, CircuitConfig::default().failure_threshold);
    }
}
