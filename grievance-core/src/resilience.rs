//! Resilient Fetch: bounded retry with stale-while-revalidating state
//!
//! Wraps one logical read (a list page, a grievance detail) and retries
//! transient failures with linear backoff. Data from an earlier success is
//! kept through refreshes and through terminal failures.
//!
//! # Phases
//!
//! ```text
//! Idle ──fetch──▶ Loading { attempt }      (no data yet)
//!                 Refreshing { attempt }   (data already present)
//!                        │
//!          ┌─────────────┼───────────────────────┐
//!          ▼             ▼                       ▼
//!       Ready      retry after base × n     Error { attempts, stale }
//! ```
//!
//! Every `fetch` call starts a new generation and cancels the previous one:
//! a superseded fetch never writes its result (last-requested-wins).
//! [`ResilientFetch::shutdown`] cancels any pending retry timer and puts
//! the phase back to where the last completed fetch left it.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GrievanceError, GrievanceResult};

/// Retry bounds for one logical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure; grows linearly with the attempt number.
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Observable state of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum FetchPhase {
    Idle,
    /// First load in flight, nothing to show yet.
    Loading { attempt: u32 },
    /// Data is present and a refresh is in flight.
    Refreshing { attempt: u32 },
    Ready,
    /// Attempts exhausted or a non-retryable failure.
    Error {
        attempts: u32,
        message: String,
        /// Previously fetched data is still available.
        stale: bool,
    },
}

impl FetchPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Loading { .. } | Self::Refreshing { .. })
    }
}

/// Result of one `fetch` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success(T),
    Failed {
        attempts: u32,
        error: GrievanceError,
        stale_data_available: bool,
    },
    /// A newer fetch started; this result was discarded.
    Superseded,
    /// The owner shut the client down.
    Cancelled,
}

impl<T> FetchOutcome<T> {
    pub fn into_result(self) -> Option<GrievanceResult<T>> {
        match self {
            Self::Success(data) => Some(Ok(data)),
            Self::Failed { error, .. } => Some(Err(error)),
            Self::Superseded | Self::Cancelled => None,
        }
    }
}

/// Point-in-time copy of the fetch state.
#[derive(Debug, Clone)]
pub struct FetchSnapshot<T> {
    pub phase: FetchPhase,
    pub data: Option<T>,
    pub last_error: Option<GrievanceError>,
    pub generation: u64,
}

struct Inner<T> {
    phase: FetchPhase,
    /// Phase left by the last fetch that ran to completion.
    settled: FetchPhase,
    data: Option<T>,
    last_error: Option<GrievanceError>,
    generation: u64,
    current: Option<CancellationToken>,
}

/// One logical read with retry state scoped to this instance.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ResilientFetch<T> {
    policy: RetryPolicy,
    inner: Arc<Mutex<Inner<T>>>,
    shutdown: CancellationToken,
}

impl<T: Clone> ResilientFetch<T> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            inner: Arc::new(Mutex::new(Inner {
                phase: FetchPhase::Idle,
                settled: FetchPhase::Idle,
                data: None,
                last_error: None,
                generation: 0,
                current: None,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> FetchSnapshot<T> {
        let inner = self.lock();
        FetchSnapshot {
            phase: inner.phase.clone(),
            data: inner.data.clone(),
            last_error: inner.last_error.clone(),
            generation: inner.generation,
        }
    }

    pub fn phase(&self) -> FetchPhase {
        self.lock().phase.clone()
    }

    pub fn data(&self) -> Option<T> {
        self.lock().data.clone()
    }

    /// Cancel in-flight work and pending retry timers. Later fetches return
    /// [`FetchOutcome::Cancelled`] immediately.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run `thunk` with bounded retry.
    ///
    /// Also serves as the manual retry: each call starts again from
    /// attempt 1 and supersedes any fetch still in flight.
    pub async fn fetch<F, Fut>(&self, mut thunk: F) -> FetchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GrievanceResult<T>>,
    {
        let (generation, token) = self.begin();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self.mark_attempt(generation, attempt) {
                return FetchOutcome::Superseded;
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return self.interrupted(generation),
                result = thunk() => result,
            };

            match result {
                Ok(data) => return self.succeed(generation, attempt, data),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Fetch failed; retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return self.interrupted(generation),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return self.fail(generation, attempt, err),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut inner = self.lock();
        if let Some(previous) = inner.current.take() {
            previous.cancel();
        }
        inner.generation += 1;
        let token = self.shutdown.child_token();
        inner.current = Some(token.clone());
        debug!(generation = inner.generation, "Fetch started");
        (inner.generation, token)
    }

    /// Publish attempt progress; false once superseded.
    fn mark_attempt(&self, generation: u64, attempt: u32) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.phase = if inner.data.is_some() {
            FetchPhase::Refreshing { attempt }
        } else {
            FetchPhase::Loading { attempt }
        };
        true
    }

    fn succeed(&self, generation: u64, attempt: u32, data: T) -> FetchOutcome<T> {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, "Discarding superseded fetch result");
            return FetchOutcome::Superseded;
        }
        inner.phase = FetchPhase::Ready;
        inner.settled = FetchPhase::Ready;
        inner.data = Some(data.clone());
        inner.last_error = None;
        inner.current = None;
        debug!(generation, attempt, "Fetch succeeded");
        FetchOutcome::Success(data)
    }

    fn fail(&self, generation: u64, attempts: u32, error: GrievanceError) -> FetchOutcome<T> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return FetchOutcome::Superseded;
        }
        let stale = inner.data.is_some();
        warn!(
            generation,
            attempts,
            stale,
            code = %error.reason_code(),
            error = %error,
            "Fetch failed"
        );
        inner.phase = FetchPhase::Error {
            attempts,
            message: error.to_string(),
            stale,
        };
        inner.settled = inner.phase.clone();
        inner.last_error = Some(error.clone());
        inner.current = None;
        FetchOutcome::Failed {
            attempts,
            error,
            stale_data_available: stale,
        }
    }

    fn interrupted(&self, generation: u64) -> FetchOutcome<T> {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, "Fetch superseded");
            return FetchOutcome::Superseded;
        }
        inner.phase = inner.settled.clone();
        inner.current = None;
        debug!(generation, "Fetch cancelled");
        FetchOutcome::Cancelled
    }
}
