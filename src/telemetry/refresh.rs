use jiff::Timestamp;
use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::RefreshError;

/// Structured events for one refresh cycle, all tagged with the same cycle id.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    cycle_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    pub fn emit_start(&self, at: Timestamp) {
        event!(
            Level::INFO,
            cycle_id = %self.cycle_id,
            context = %self.context,
            timestamp = %at,
            "refresh.start"
        );
    }

    pub fn emit_waiter_joined(&self, position: usize) {
        event!(
            Level::DEBUG,
            cycle_id = %self.cycle_id,
            context = %self.context,
            position,
            "refresh.waiter.joined"
        );
    }

    pub fn emit_waiter_timeout(&self, waited_ms: u64) {
        event!(
            Level::WARN,
            cycle_id = %self.cycle_id,
            context = %self.context,
            waited_ms,
            "refresh.waiter.timeout"
        );
    }

    pub fn emit_success(&self, waiters: usize, at: Timestamp) {
        event!(
            Level::INFO,
            cycle_id = %self.cycle_id,
            context = %self.context,
            timestamp = %at,
            waiters,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, error: &RefreshError, waiters: usize, at: Timestamp) {
        event!(
            Level::ERROR,
            cycle_id = %self.cycle_id,
            context = %self.context,
            timestamp = %at,
            waiters,
            error = %error,
            "refresh.failure"
        );
    }

    pub fn emit_abandoned(&self, waiters: usize) {
        event!(
            Level::WARN,
            cycle_id = %self.cycle_id,
            context = %self.context,
            waiters,
            "refresh.abandoned"
        );
    }
}
