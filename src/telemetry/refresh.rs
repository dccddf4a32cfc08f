use std::time::Instant;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

#[derive(Clone, Copy, Debug)]
pub enum RefreshOutcome {
    Success,
    Failed,
    MissingRefreshToken,
}

/// Structured events for a single refresh attempt, correlated by `attempt_id`.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    trigger: String,
    started: Instant,
}

impl RefreshTelemetry {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            trigger: trigger.into(),
            started: Instant::now(),
        }
    }

    pub fn emit_start(&self) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            trigger = %self.trigger,
            "refresh.start"
        );
    }

    /// Emitted for a 401 that arrives while another request owns the refresh.
    pub fn emit_queued(path: &str, queue_len: usize) {
        event!(
            Level::DEBUG,
            path,
            queue_len,
            "refresh.queued"
        );
    }

    pub fn emit_success(&self, replayed: usize) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            trigger = %self.trigger,
            outcome = ?RefreshOutcome::Success,
            replayed,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, outcome: RefreshOutcome, error: &Error, rejected: usize) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            trigger = %self.trigger,
            outcome = ?outcome,
            rejected,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            error = %error,
            "refresh.failure"
        );
    }
}
