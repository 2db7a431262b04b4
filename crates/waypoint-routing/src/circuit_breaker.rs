//! Circuit breaker backend
//!
//! The circuit breaker filter talks to breakers through
//! [`ReactiveCircuitBreakerFactory`] and [`ReactiveCircuitBreaker`]; any
//! implementation can be plugged in. The default backend keeps one
//! consecutive-failure breaker per id with three states:
//! - Closed: Normal operation, calls pass through
//! - Open: Too many failures, calls go straight to the fallback
//! - HalfOpen: Testing recovery, calls pass through and decide the next state
//!
//! State transitions:
//! - Closed → Open: After consecutive failures reach the threshold
//! - Open → HalfOpen: After the open timeout expires
//! - HalfOpen → Closed: After consecutive successes reach the threshold
//! - HalfOpen → Open: On any failure during testing

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use waypoint_core::{GatewayError, Result};

/// Guarded downstream call
pub type CallFuture<'a> = BoxFuture<'a, Result<()>>;

/// Fallback invoked with the error that ended the guarded call
pub type Fallback<'a> = Box<dyn FnOnce(GatewayError) -> CallFuture<'a> + Send + 'a>;

/// One named breaker
#[async_trait]
pub trait ReactiveCircuitBreaker: Send + Sync {
    /// Run `primary` for `route_id` under the breaker; on rejection or
    /// failure run `fallback`
    async fn run<'a>(
        &self,
        route_id: &str,
        primary: CallFuture<'a>,
        fallback: Fallback<'a>,
    ) -> Result<()>;
}

/// Source of breakers by id; the same id must yield the same breaker state
pub trait ReactiveCircuitBreakerFactory: Send + Sync {
    fn create(&self, id: &str) -> Arc<dyn ReactiveCircuitBreaker>;
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed = 0,
    /// Failing - calls rejected immediately
    Open = 1,
    /// Testing recovery
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration for the default breaker backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of consecutive successes to close the circuit from half-open
    pub success_threshold: u32,
    /// Milliseconds to wait before moving from open to half-open
    pub open_timeout_ms: u64,
    /// Optional limit for one guarded call
    pub call_timeout_ms: Option<u64>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout_ms: 60_000,
            call_timeout_ms: None,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Thread-safe consecutive-failure breaker state
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    /// Current circuit state (encoded as u8 for atomic operations)
    state: AtomicU8,
    config: CircuitBreakerConfig,
    consecutive_failures: AtomicU32,
    /// Consecutive success count (used in half-open state)
    consecutive_successes: AtomicU32,
    last_state_change: Mutex<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            last_state_change: Mutex::new(Instant::now()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    fn last_change(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.last_state_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a call may proceed; an expired open circuit moves to half-open
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = self.last_change().elapsed() >= self.config.open_timeout();
                if expired {
                    self.transition_to_half_open();
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed | CircuitState::Open => {
                self.consecutive_failures.store(0, Ordering::Release);
            }
            CircuitState::HalfOpen => {
                let successes = self.consecutive_successes.fetch_add(1, Ordering::AcqRel) + 1;
                self.consecutive_failures.store(0, Ordering::Release);
                if successes >= self.config.success_threshold {
                    self.transition_to_closed();
                }
            }
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                self.consecutive_successes.store(0, Ordering::Release);
                if failures >= self.config.failure_threshold {
                    self.transition_to_open();
                }
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes.store(0, Ordering::Release);
                self.transition_to_open();
            }
            CircuitState::Open => {
                self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Force the circuit open (manual intervention and tests)
    pub fn force_open(&self) {
        self.transition_to_open();
    }

    pub fn force_close(&self) {
        self.transition_to_closed();
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    fn transition(&self, state: CircuitState) {
        self.state.store(state as u8, Ordering::Release);
        *self.last_change() = Instant::now();
        self.consecutive_failures.store(0, Ordering::Release);
        self.consecutive_successes.store(0, Ordering::Release);
    }

    fn transition_to_open(&self) {
        self.transition(CircuitState::Open);
        tracing::warn!(breaker = %self.name, "Circuit breaker opened");
    }

    fn transition_to_half_open(&self) {
        self.transition(CircuitState::HalfOpen);
        tracing::info!(breaker = %self.name, "Circuit breaker half-open (testing recovery)");
    }

    fn transition_to_closed(&self) {
        self.transition(CircuitState::Closed);
        tracing::info!(breaker = %self.name, "Circuit breaker closed (recovered)");
    }
}

/// Default [`ReactiveCircuitBreaker`] over a shared [`CircuitBreaker`]
pub struct DefaultReactiveCircuitBreaker {
    state: Arc<CircuitBreaker>,
    call_timeout: Option<Duration>,
}

#[async_trait]
impl ReactiveCircuitBreaker for DefaultReactiveCircuitBreaker {
    async fn run<'a>(
        &self,
        route_id: &str,
        primary: CallFuture<'a>,
        fallback: Fallback<'a>,
    ) -> Result<()> {
        let name = self.state.name().to_string();

        if !self.state.allow_request() {
            tracing::debug!(breaker = %name, route_id, "Circuit open, calling fallback");
            drop(primary);
            return fallback(GatewayError::CallNotPermitted {
                route_id: route_id.to_string(),
                name,
            })
            .await;
        }

        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, primary).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout {
                    route_id: route_id.to_string(),
                    name: name.clone(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => primary.await,
        };

        match outcome {
            Ok(()) => {
                self.state.record_success();
                Ok(())
            }
            Err(error) => {
                self.state.record_failure();
                tracing::debug!(breaker = %name, error = %error, "Guarded call failed, calling fallback");
                fallback(error).await
            }
        }
    }
}

/// One breaker per id, all sharing one configuration
pub struct DefaultCircuitBreakerFactory {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl DefaultCircuitBreakerFactory {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker state for `id`, once created
    pub fn breaker(&self, id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(id).map(|entry| entry.value().clone())
    }
}

impl Default for DefaultCircuitBreakerFactory {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl ReactiveCircuitBreakerFactory for DefaultCircuitBreakerFactory {
    fn create(&self, id: &str) -> Arc<dyn ReactiveCircuitBreaker> {
        let state = self
            .breakers
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(id, self.config.clone())))
            .clone();
        Arc::new(DefaultReactiveCircuitBreaker {
            state,
            call_timeout: self.config.call_timeout(),
        })
    }
}
