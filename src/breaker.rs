//! Circuit breaker guarding engine requests.
//!
//! Trips after a run of consecutive retryable failures so a sealed or
//! unreachable engine does not absorb every caller's timeout budget. After a
//! cooldown a single probe request is let through; its outcome decides whether
//! the circuit closes again.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected until the cooldown elapses
    Open,
    /// One probe request is in flight
    Probing,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_sent_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker tripping after `threshold` consecutive failures and
    /// probing again after `cooldown`.
    #[must_use]
    pub const fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            inner: Mutex::const_new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_sent_at: None,
            }),
        }
    }

    /// Check whether a request may proceed.
    pub async fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let cooled = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.cooldown);
                if cooled {
                    inner.state = BreakerState::Probing;
                    inner.probe_sent_at = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
            // One probe at a time, but a probe whose outcome was never
            // recorded (a non-retryable response, or a lost caller) must not
            // wedge the breaker: once the cooldown elapses again, a fresh
            // probe is admitted.
            BreakerState::Probing => {
                let probe_expired = inner
                    .probe_sent_at
                    .is_none_or(|at| at.elapsed() >= self.cooldown);
                if probe_expired {
                    inner.probe_sent_at = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request, closing the circuit.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_sent_at = None;
    }

    /// Record a retryable failure; opens the circuit at the threshold and
    /// re-opens it immediately when a probe fails.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let tripped = inner.state == BreakerState::Probing
            || inner.consecutive_failures >= self.threshold;
        if tripped {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            inner.probe_sent_at = None;
        }
    }

    /// Current breaker state.
    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }
}
