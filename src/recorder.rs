//! Recorder facade (C7)
//!
//! The single entry point called by event sessions (by way of the
//! dispatcher): `on_launch`, `on_terminate`, `on_action`, `flush`. Owns the
//! process registry and the tracing backend handle; delegates every call to
//! the registry and logs-and-continues on error — no error is fatal to the
//! correlator.

use crate::decoder::DecodedEvent;
use crate::error::{CorrelatorError, CorrelatorResult};
use crate::identifier::ProcessId;
use crate::registry::{EventCode, ProcessRegistry};
use crate::span_context::ActivitySource;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Single-writer facade over the [`ProcessRegistry`]. Not `Sync` — callers
/// (the dispatcher) must confine all calls to one thread, which is what
/// makes the registry's invariants hold without lock-granularity reasoning.
pub struct Recorder {
    registry: ProcessRegistry,
    backend: Arc<dyn ActivitySource>,
}

impl Recorder {
    pub fn new(backend: Arc<dyn ActivitySource>) -> Self {
        Self {
            registry: ProcessRegistry::new(),
            backend,
        }
    }

    /// Dispatches an already-decoded event to the matching registry
    /// operation. The dispatcher calls this once per event it pulls off
    /// the channel.
    pub fn record(&mut self, event: DecodedEvent) {
        match event {
            DecodedEvent::Launch {
                pid,
                parent_pid,
                image,
                log,
            } => self.on_launch(pid, parent_pid, &image, log),
            DecodedEvent::Terminate { pid, log } => self.on_terminate(pid, log),
            DecodedEvent::Action {
                pid,
                target,
                event_code,
                log,
            } => self.on_action(pid, &target, event_code, log),
        }
    }

    pub fn on_launch(
        &mut self,
        pid: ProcessId,
        parent_pid: Option<ProcessId>,
        image: &str,
        decoded_log: serde_json::Value,
    ) {
        let result = self
            .registry
            .on_launch(pid, parent_pid, image, decoded_log, now_ns());
        log_outcome("on_launch", pid, result);
    }

    pub fn on_terminate(&mut self, pid: ProcessId, decoded_log: serde_json::Value) {
        let result = self
            .registry
            .on_terminate(pid, decoded_log, now_ns(), self.backend.as_ref());
        log_outcome("on_terminate", pid, result);
    }

    pub fn on_action(
        &mut self,
        pid: ProcessId,
        target: &str,
        event_code: EventCode,
        decoded_log: serde_json::Value,
    ) {
        let result = self.registry.on_action(pid, target, event_code, decoded_log);
        log_outcome("on_action", pid, result);
    }

    /// Flush on shutdown. Safe to call multiple times.
    pub fn flush(&mut self) {
        if let Err(err) = self.registry.flush(now_ns(), self.backend.as_ref()) {
            tracing::error!(error = %err, "recorder flush failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }
}

/// Logs a dropped/failed event at a level that reflects its severity. No
/// error is propagated past the facade.
fn log_outcome(op: &str, pid: ProcessId, result: CorrelatorResult<()>) {
    match result {
        Ok(()) => {}
        Err(CorrelatorError::Unsupported(msg)) => {
            tracing::warn!(op, pid = pid.0, %msg, "unsupported event dropped");
        }
        Err(CorrelatorError::BackendUnavailable(msg)) => {
            tracing::error!(op, pid = pid.0, %msg, "tracing backend unavailable, event dropped");
        }
        Err(CorrelatorError::InvalidState(msg)) => {
            tracing::error!(op, pid = pid.0, %msg, "invalid span state, event dropped");
        }
        Err(CorrelatorError::InvalidArgument(msg)) => {
            tracing::debug!(op, pid = pid.0, %msg, "invalid argument, event dropped");
        }
        Err(CorrelatorError::InvalidActorDirection(msg)) => {
            tracing::debug!(op, pid = pid.0, %msg, "actor direction mismatch, event dropped");
        }
        Err(CorrelatorError::Config(msg)) => {
            tracing::error!(op, pid = pid.0, %msg, "configuration error surfaced at runtime");
        }
    }
}
