//! Process activity context (C4)
//!
//! Bundles one process span with its two actor maps and owns the lifecycle
//! of every child actor span created underneath it.

use crate::actor_map::ActorMap;
use crate::error::{CorrelatorError, CorrelatorResult};
use crate::identifier::{Artifact, ActorDirection, ActorType, ProcessContext};
use crate::span_context::{ActivitySource, Span, SpanFactory};

/// Either a [`ProcessContext`] or an [`crate::identifier::ActorContext`],
/// returned uniformly from [`ProcessActivityContext::upsert_activity`].
pub enum SystemContextHandle {
    Process(ProcessContext),
    Actor(crate::identifier::ActorContext),
}

impl SystemContextHandle {
    pub fn log_count(&self) -> u64 {
        use crate::identifier::SystemContext;
        match self {
            SystemContextHandle::Process(p) => p.log_count(),
            SystemContextHandle::Actor(a) => a.log_count(),
        }
    }

    pub fn increment_log_count(&self) -> u64 {
        use crate::identifier::SystemContext;
        match self {
            SystemContextHandle::Process(p) => p.increment_log_count(),
            SystemContextHandle::Actor(a) => a.increment_log_count(),
        }
    }
}

/// Holds `{process_span, process_context, rr_actors, ws_actors}`. Lifetime =
/// from process-launch event to process-terminate event (or agent
/// shutdown).
pub struct ProcessActivityContext {
    process_span: Span,
    process_context: ProcessContext,
    rr_actors: ActorMap,
    ws_actors: ActorMap,
}

impl ProcessActivityContext {
    pub fn new(process_span: Span, process_context: ProcessContext) -> Self {
        Self {
            process_span,
            process_context,
            rr_actors: ActorMap::new(ActorDirection::ReadRecv),
            ws_actors: ActorMap::new(ActorDirection::WriteSend),
        }
    }

    pub fn process_span(&self) -> &Span {
        &self.process_span
    }

    pub fn process_context(&self) -> &ProcessContext {
        &self.process_context
    }

    /// `upsert_activity(artifact, actor_type) → (Span, SystemContext)`. If
    /// `direction_of(actor_type) == NotActor`, returns the process span and
    /// context unchanged — this is the path for events that belong directly
    /// to the process itself. Otherwise dispatches to the appropriate actor
    /// map. Fails `Unsupported` only if reached with a direction this
    /// dispatch cannot route — never, given `ActorDirection` is exhaustive,
    /// but kept as an explicit failure mode rather than an unreachable!().
    pub fn upsert_activity(
        &mut self,
        factory: &SpanFactory,
        artifact: Artifact,
        actor_type: ActorType,
    ) -> CorrelatorResult<(Span, SystemContextHandle)> {
        match actor_type.direction() {
            ActorDirection::NotActor => Ok((
                self.process_span.clone(),
                SystemContextHandle::Process(self.process_context.clone()),
            )),
            ActorDirection::ReadRecv => {
                let (span, ctx) =
                    self.rr_actors
                        .upsert(factory, &self.process_span, artifact, actor_type)?;
                Ok((span, SystemContextHandle::Actor(ctx)))
            }
            ActorDirection::WriteSend => {
                let (span, ctx) =
                    self.ws_actors
                        .upsert(factory, &self.process_span, artifact, actor_type)?;
                Ok((span, SystemContextHandle::Actor(ctx)))
            }
        }
    }

    /// Flushes both actor maps (stopping every child actor span). Does not
    /// stop the process span itself — the registry writes a final
    /// `log.count` tag before stopping it.
    pub fn flush(&mut self, now_ns: u64, backend: &dyn ActivitySource) -> CorrelatorResult<()> {
        self.rr_actors.flush(now_ns, backend)?;
        self.ws_actors.flush(now_ns, backend)?;
        Ok(())
    }
}

/// Named constructor for the `Unsupported` case above, so callers can
/// distinguish a genuinely unroutable direction from a bug, should
/// `ActorDirection` ever grow a variant.
pub fn unsupported_direction(direction: ActorDirection) -> CorrelatorError {
    CorrelatorError::Unsupported(format!("no dispatch target for direction {direction:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{ArtifactKind, SystemContext};
    use crate::span_context::{ExportedSpan, SpanFactory};
    use std::sync::Mutex;

    struct RecordingBackend {
        exported: Mutex<Vec<ExportedSpan>>,
    }
    impl ActivitySource for RecordingBackend {
        fn export(&self, record: ExportedSpan) -> CorrelatorResult<()> {
            self.exported.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn new_ctx(factory: &SpanFactory) -> ProcessActivityContext {
        let span = factory.create_child(None, "proc");
        let artifact = Artifact::new(ArtifactKind::Process, "p.exe").unwrap();
        let context = ProcessContext::new(crate::identifier::ProcessId(1), artifact);
        ProcessActivityContext::new(span, context)
    }

    #[test]
    fn not_actor_returns_process_span_and_context() {
        let factory = SpanFactory::new();
        let mut ctx = new_ctx(&factory);
        let artifact = Artifact::new(ArtifactKind::Process, "p.exe").unwrap();
        let (span, handle) = ctx
            .upsert_activity(&factory, artifact, ActorType::NotActor)
            .unwrap();
        assert_eq!(span.span_id(), ctx.process_span().span_id());
        assert_eq!(handle.log_count(), 0);
    }

    #[test]
    fn actor_dispatches_to_correct_map() {
        let factory = SpanFactory::new();
        let mut ctx = new_ctx(&factory);
        let artifact = Artifact::new(ArtifactKind::File, "a.txt").unwrap();
        let (span, handle) = ctx
            .upsert_activity(&factory, artifact, ActorType::Create)
            .unwrap();
        assert_ne!(span.span_id(), ctx.process_span().span_id());
        assert_eq!(span.ids().parent_span_id, Some(ctx.process_span().span_id()));
        handle.increment_log_count();
        assert_eq!(handle.log_count(), 1);
    }

    #[test]
    fn shared_handle_mutation_is_visible_on_next_upsert() {
        let factory = SpanFactory::new();
        let mut ctx = new_ctx(&factory);
        let artifact = Artifact::new(ArtifactKind::File, "a.txt").unwrap();
        let (_, handle1) = ctx
            .upsert_activity(&factory, artifact.clone(), ActorType::Create)
            .unwrap();
        handle1.increment_log_count();
        let (_, handle2) = ctx
            .upsert_activity(&factory, artifact, ActorType::Create)
            .unwrap();
        assert_eq!(handle2.log_count(), 1);
    }

    #[test]
    fn flush_stops_actor_spans_but_not_process_span() {
        let factory = SpanFactory::new();
        let backend = RecordingBackend {
            exported: Mutex::new(Vec::new()),
        };
        let mut ctx = new_ctx(&factory);
        let artifact = Artifact::new(ArtifactKind::File, "a.txt").unwrap();
        ctx.upsert_activity(&factory, artifact, ActorType::Create)
            .unwrap();
        ctx.flush(10, &backend).unwrap();
        assert_eq!(backend.exported.lock().unwrap().len(), 1);
        // process span is untouched: still stoppable.
        ctx.process_span().start(0).unwrap();
        ctx.process_span().stop(20, &backend).unwrap();
        assert_eq!(backend.exported.lock().unwrap().len(), 2);
    }
}
