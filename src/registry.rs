//! Process registry (C5)
//!
//! `Map<process-id, ProcessActivityContext>`, single-writer. This is the
//! heart of the correlator: `on_launch`/`on_terminate`/`on_action`/`flush`
//! implement the state machine and parent-linkage rules for the whole
//! process forest.

use crate::error::{CorrelatorError, CorrelatorResult};
use crate::identifier::{Artifact, ArtifactKind, ActorType, ProcessContext, ProcessId};
use crate::process_activity::ProcessActivityContext;
use crate::span_context::{ActivitySource, Span, SpanFactory};
use std::collections::HashMap;

/// `EventCode → (ActorType, ArtifactKind)` total lookup table. Unknown
/// codes map to `Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    Sysmon2,
    Sysmon3,
    Sysmon8,
    Sysmon11,
    Sysmon12Add,
    Sysmon12Del,
    Sysmon13,
    Sysmon14,
    Sysmon15,
    Sysmon23,
    Sysmon25,
    Sysmon29,
    /// Any other raw event code the decoder could not map to a known
    /// actor/artifact pair.
    Unknown(i32),
}

impl EventCode {
    pub fn lookup(self) -> CorrelatorResult<(ActorType, ArtifactKind)> {
        match self {
            EventCode::Sysmon2 => Ok((ActorType::Modify, ArtifactKind::File)),
            EventCode::Sysmon3 => Ok((ActorType::Connect, ArtifactKind::Network)),
            EventCode::Sysmon8 => Ok((ActorType::RemoteThread, ArtifactKind::Process)),
            EventCode::Sysmon11 => Ok((ActorType::Create, ArtifactKind::File)),
            EventCode::Sysmon12Add => Ok((ActorType::RegAdd, ArtifactKind::Registry)),
            EventCode::Sysmon12Del => Ok((ActorType::RegDelete, ArtifactKind::Registry)),
            EventCode::Sysmon13 => Ok((ActorType::RegSet, ArtifactKind::Registry)),
            EventCode::Sysmon14 => Ok((ActorType::RegRename, ArtifactKind::Registry)),
            EventCode::Sysmon15 => Ok((ActorType::CreateStreamHash, ArtifactKind::File)),
            EventCode::Sysmon23 => Ok((ActorType::Delete, ArtifactKind::File)),
            EventCode::Sysmon25 => Ok((ActorType::Tampering, ArtifactKind::Process)),
            EventCode::Sysmon29 => Ok((ActorType::Create, ArtifactKind::File)),
            EventCode::Unknown(code) => Err(CorrelatorError::Unsupported(format!(
                "no actor-type mapping for event code {code}"
            ))),
        }
    }
}

/// `Map<process-id, ProcessActivityContext>`.
pub struct ProcessRegistry {
    processes: HashMap<ProcessId, ProcessActivityContext>,
    factory: SpanFactory,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            processes: HashMap::new(),
            factory: SpanFactory::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.contains_key(&pid)
    }

    /// `on_launch(pid, parent_pid, image, decoded_log)`.
    pub fn on_launch(
        &mut self,
        pid: ProcessId,
        parent_pid: Option<ProcessId>,
        image: &str,
        decoded_log: serde_json::Value,
        now_ns: u64,
    ) -> CorrelatorResult<()> {
        if image.is_empty() {
            return Err(CorrelatorError::InvalidArgument(
                "launch image must not be empty".to_string(),
            ));
        }
        if decoded_log.is_null() {
            return Err(CorrelatorError::InvalidArgument(
                "launch decoded_log must not be null".to_string(),
            ));
        }

        // Duplicate launch on an already-live pid: attach the log to the
        // existing process span without re-parenting.
        if let Some(ctx) = self.processes.get_mut(&pid) {
            let process_artifact = ctx.process_context().artifact();
            let (span, handle) =
                ctx.upsert_activity(&self.factory, process_artifact, ActorType::NotActor)?;
            span.attach_log(decoded_log)?;
            handle.increment_log_count();
            return Ok(());
        }

        let process_artifact = Artifact::new(ArtifactKind::Process, image)?;
        let process_context = ProcessContext::new(pid, process_artifact.clone());

        let parent_span: Option<&Span> = parent_pid
            .and_then(|ppid| self.processes.get(&ppid))
            .map(|ctx| ctx.process_span());
        let process_span = self.factory.create_child(parent_span, image.to_string());

        process_span.set_tag("act.type", "launch")?;
        process_span.set_tag("process.pid", pid.0)?;
        process_span.start(now_ns)?;
        process_span.attach_log(decoded_log)?;

        let mut activity = ProcessActivityContext::new(process_span, process_context);
        let (_, handle) =
            activity.upsert_activity(&self.factory, process_artifact, ActorType::NotActor)?;
        handle.increment_log_count();

        self.processes.insert(pid, activity);
        Ok(())
    }

    /// `on_terminate(pid, decoded_log)`. Untracked pids are dropped silently.
    pub fn on_terminate(
        &mut self,
        pid: ProcessId,
        decoded_log: serde_json::Value,
        now_ns: u64,
        backend: &dyn ActivitySource,
    ) -> CorrelatorResult<()> {
        let Some(mut ctx) = self.processes.remove(&pid) else {
            return Ok(());
        };

        let process_artifact = ctx.process_context().artifact();
        let (process_span, handle) =
            ctx.upsert_activity(&self.factory, process_artifact, ActorType::NotActor)?;

        // Fixed order: attach log, tag log.count, flush actor children,
        // stop process span.
        process_span.attach_log(decoded_log)?;
        let count = handle.increment_log_count();
        process_span.set_tag("log.count", count as i64)?;
        ctx.flush(now_ns, backend)?;
        process_span.stop(now_ns, backend)?;
        Ok(())
    }

    /// `on_action(pid, target_name, event_code, decoded_log)`.
    pub fn on_action(
        &mut self,
        pid: ProcessId,
        target_name: &str,
        event_code: EventCode,
        decoded_log: serde_json::Value,
    ) -> CorrelatorResult<()> {
        let (actor_type, artifact_kind) = event_code.lookup()?;

        let Some(ctx) = self.processes.get_mut(&pid) else {
            // Action on an untracked process: the launch event may have
            // been filtered or missed. Dropped silently, not an error.
            return Ok(());
        };

        let artifact = Artifact::new(artifact_kind, target_name)?;
        let (span, handle) = ctx.upsert_activity(&self.factory, artifact, actor_type)?;
        span.attach_log(decoded_log)?;
        handle.increment_log_count();
        Ok(())
    }

    /// Flush on shutdown: for each live process, flush its actor children
    /// then stop its process span; then empty the registry. Safe to call
    /// multiple times — a second call is a no-op.
    pub fn flush(&mut self, now_ns: u64, backend: &dyn ActivitySource) -> CorrelatorResult<()> {
        for (_, mut ctx) in self.processes.drain() {
            let process_artifact = ctx.process_context().artifact();
            let (process_span, handle) =
                ctx.upsert_activity(&self.factory, process_artifact, ActorType::NotActor)?;
            let count = handle.log_count();
            process_span.set_tag("log.count", count as i64)?;
            ctx.flush(now_ns, backend)?;
            process_span.stop(now_ns, backend)?;
        }
        Ok(())
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
