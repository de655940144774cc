//! Single-flight credential refresh.
//!
//! When many requests fail with `401` at once, the first caller to reach
//! [`RefreshCoordinator::refresh_after_unauthorized`] becomes the *leader* of a
//! refresh cycle and performs the one refresh exchange. Everyone arriving while
//! the cycle is in flight becomes a *waiter* and receives the leader's outcome
//! over a oneshot channel, in registration order. The cycle always ends back in
//! the idle phase, including when the leader's future is dropped mid-exchange.
//!
//! A failed cycle is remembered together with the access token it gave up on.
//! Late `401`s for that token receive the same error instead of starting (and
//! terminating the session for) a cycle of their own.

use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::errors::RefreshError;
use crate::session::{SessionEvent, SessionTerminator};
use crate::telemetry::refresh::RefreshTelemetry;

use super::{CredentialPair, CredentialStore};

/// What every member of a cycle's cohort observes exactly once.
pub type RefreshOutcome = Result<String, RefreshError>;

enum Phase {
    Idle,
    Refreshing(RefreshTelemetry),
}

/// The most recent cycle that ended in failure.
struct FailedCycle {
    cycle_id: Uuid,
    /// Access token the leader's rejected request carried.
    invalidated: Option<String>,
    reason: RefreshError,
}

struct CycleState {
    phase: Phase,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    last_failure: Option<FailedCycle>,
}

enum Admission<'a> {
    /// Credentials rotated while the request was in flight; replay with these.
    Rotated(String),
    /// The request's token was already given up on by a failed cycle.
    AlreadyFailed(RefreshError),
    Waiter {
        rx: oneshot::Receiver<RefreshOutcome>,
        telemetry: RefreshTelemetry,
    },
    Leader(CycleGuard<'a>),
}

pub struct RefreshCoordinator {
    state: Mutex<CycleState>,
    store: Arc<dyn CredentialStore>,
    terminator: Arc<dyn SessionTerminator>,
    waiter_timeout: Option<Duration>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        terminator: Arc<dyn SessionTerminator>,
        waiter_timeout: Option<Duration>,
    ) -> Self {
        Self {
            state: Mutex::new(CycleState {
                phase: Phase::Idle,
                waiters: Vec::new(),
                last_failure: None,
            }),
            store,
            terminator,
            waiter_timeout,
        }
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self.lock_state().phase, Phase::Refreshing(_))
    }

    pub fn waiter_count(&self) -> usize {
        self.lock_state().waiters.len()
    }

    /// Obtains an access token to replay a request that was rejected with `401`.
    ///
    /// `sent_token` is the access token the rejected request carried. If the
    /// store already holds a different one, no refresh is started and the
    /// stored token is returned. Otherwise the caller either joins the cycle in
    /// flight or leads a new one, in which case `refresh_cb` is invoked with
    /// the stored refresh token. The new pair is saved before any member of the
    /// cohort sees the new access token.
    ///
    /// On failure the store is cleared and the session terminator is notified
    /// once for the whole cohort. A later call carrying the token that cycle
    /// gave up on gets the same error without another notification.
    pub async fn refresh_after_unauthorized<F, Fut>(
        &self,
        sent_token: Option<&str>,
        refresh_cb: F,
    ) -> RefreshOutcome
    where
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = Result<CredentialPair, RefreshError>> + Send,
    {
        match self.admit(sent_token) {
            Admission::Rotated(token) => {
                debug!("credentials rotated while request was in flight");
                Ok(token)
            }
            Admission::AlreadyFailed(reason) => Err(reason),
            Admission::Waiter { rx, telemetry } => self.wait(rx, &telemetry).await,
            Admission::Leader(guard) => self.lead(guard, refresh_cb).await,
        }
    }

    fn admit(&self, sent_token: Option<&str>) -> Admission<'_> {
        let mut state = self.lock_state();
        if let Phase::Refreshing(telemetry) = &state.phase {
            let telemetry = telemetry.clone();
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            telemetry.emit_waiter_joined(state.waiters.len());
            return Admission::Waiter { rx, telemetry };
        }

        if let Some(current) = self.store.access_token()
            && sent_token != Some(current.as_str())
        {
            return Admission::Rotated(current);
        }

        if let Some(failed) = &state.last_failure
            && failed.invalidated.as_deref() == sent_token
        {
            debug!(
                cycle_id = %failed.cycle_id,
                "request carried credentials a failed cycle already gave up on"
            );
            return Admission::AlreadyFailed(failed.reason.clone());
        }

        let telemetry = RefreshTelemetry::new("unauthorized");
        state.phase = Phase::Refreshing(telemetry.clone());
        Admission::Leader(CycleGuard {
            coordinator: self,
            telemetry,
            invalidated: sent_token.map(str::to_owned),
            finished: false,
        })
    }

    async fn wait(
        &self,
        rx: oneshot::Receiver<RefreshOutcome>,
        telemetry: &RefreshTelemetry,
    ) -> RefreshOutcome {
        let received = match self.waiter_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    telemetry.emit_waiter_timeout(limit.as_millis() as u64);
                    return Err(RefreshError::WaitTimeout(limit));
                }
            },
            None => rx.await,
        };
        received.unwrap_or(Err(RefreshError::Abandoned))
    }

    async fn lead<F, Fut>(&self, mut guard: CycleGuard<'_>, refresh_cb: F) -> RefreshOutcome
    where
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = Result<CredentialPair, RefreshError>> + Send,
    {
        guard.telemetry.emit_start(Timestamp::now());
        let exchanged = match self.store.refresh_token() {
            Some(refresh_token) => refresh_cb(refresh_token).await,
            None => Err(RefreshError::MissingRefreshToken),
        };
        let outcome = match exchanged {
            Ok(pair) => {
                let access = pair.access_token().to_string();
                self.store.save(pair);
                Ok(access)
            }
            Err(err) => Err(err),
        };
        guard.finish(outcome.clone());
        outcome
    }

    fn lock_state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns to idle and hands back the cohort, leaving the list empty.
    fn reset(&self, settled: Settled) -> Vec<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.lock_state();
        state.phase = Phase::Idle;
        match settled {
            Settled::Succeeded => state.last_failure = None,
            Settled::Failed(failed) => state.last_failure = Some(failed),
            Settled::Abandoned => {}
        }
        mem::take(&mut state.waiters)
    }
}

enum Settled {
    Succeeded,
    Failed(FailedCycle),
    Abandoned,
}

/// Owned by the leader for the duration of one cycle.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    telemetry: RefreshTelemetry,
    invalidated: Option<String>,
    finished: bool,
}

impl CycleGuard<'_> {
    fn finish(&mut self, outcome: RefreshOutcome) {
        self.finished = true;
        let settled = match &outcome {
            Ok(_) => Settled::Succeeded,
            Err(reason) => Settled::Failed(FailedCycle {
                cycle_id: self.telemetry.cycle_id(),
                invalidated: self.invalidated.take(),
                reason: reason.clone(),
            }),
        };
        let waiters = self.coordinator.reset(settled);
        let cohort = waiters.len();
        for waiter in waiters {
            // A waiter that timed out has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }

        match outcome {
            Ok(_) => self.telemetry.emit_success(cohort, Timestamp::now()),
            Err(reason) => {
                self.telemetry
                    .emit_failure(&reason, cohort, Timestamp::now());
                self.coordinator.store.clear();
                self.coordinator.terminator.terminate(SessionEvent::Terminated {
                    cycle_id: self.telemetry.cycle_id(),
                    reason,
                    at: Timestamp::now(),
                });
            }
        }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let waiters = self.coordinator.reset(Settled::Abandoned);
        self.telemetry.emit_abandoned(waiters.len());
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshError::Abandoned));
        }
    }
}
