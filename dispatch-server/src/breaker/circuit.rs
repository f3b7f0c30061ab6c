//! Single circuit breaker state machine

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use shared::{AppError, AppResult, ErrorCode};
use std::future::Future;
use std::time::{Duration, Instant};

/// Breaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Calls pass through; consecutive failures are counted
    Closed,
    /// Calls are rejected without reaching the upstream
    Open,
    /// One probe call is in flight; its outcome decides the next state
    HalfOpen,
}

/// Tunables for one breaker
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// Time the breaker stays open before admitting a probe
    pub reset_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of a breaker, for the health report
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

/// Per-upstream circuit breaker.
///
/// Admission decisions happen under the lock; the guarded call itself runs
/// outside it. While half-open, exactly one caller is admitted as the probe
/// and every other caller is rejected as if the breaker were still open.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                opened_at: None,
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `action` under this breaker's admission policy
    pub async fn call<T, F, Fut>(&self, action: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.admit()?;
        match action().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    fn admit(&self) -> AppResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.settings.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!("breaker '{}' half-open, admitting probe", self.name);
                    Ok(())
                } else {
                    Err(self.rejection())
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.rejection())
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!("breaker '{}' closed after successful probe", self.name);
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(Utc::now());
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                tracing::warn!("breaker '{}' re-opened after failed probe", self.name);
            }
            _ => {
                inner.failure_count += 1;
                if inner.failure_count >= self.settings.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        "breaker '{}' opened after {} consecutive failures",
                        self.name,
                        inner.failure_count
                    );
                }
            }
        }
    }

    fn rejection(&self) -> AppError {
        AppError::with_message(
            ErrorCode::CircuitOpen,
            format!("upstream '{}' is unavailable", self.name),
        )
        .with_detail("breaker", self.name.clone())
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_at: inner.last_failure_at,
        }
    }
}
