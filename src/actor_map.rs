//! Actor map (C3)
//!
//! Per `(process, direction)` there is a map from actor-key to the open span
//! representing that actor. Direction enforcement happens at the type level:
//! [`ActorMap`] is parameterized by an [`ActorDirection`] fixed at
//! construction, so a wrong-direction actor type never reaches the inner
//! `HashMap` at all — `upsert` rejects it before any lookup.

use crate::error::{CorrelatorError, CorrelatorResult};
use crate::identifier::{actor_key, Artifact, ActorContext, ActorDirection, ActorType};
use crate::span_context::{ActivitySource, Span, SpanFactory};
use std::collections::HashMap;

/// A deduplicating map from actor-key to the (span, context) pair for one
/// process and one [`ActorDirection`].
pub struct ActorMap {
    direction: ActorDirection,
    entries: HashMap<String, (Span, ActorContext)>,
}

impl ActorMap {
    pub fn new(direction: ActorDirection) -> Self {
        Self {
            direction,
            entries: HashMap::new(),
        }
    }

    pub fn direction(&self) -> ActorDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `upsert(parent_process_span, artifact, actor_type) → (Span, ActorContext)`.
    ///
    /// Validates that `actor_type`'s direction matches this map's direction
    /// (else `InvalidActorDirection`), and that `actor_type` is not the
    /// `Undefined` sentinel (else `InvalidArgument`). If an entry for the
    /// computed actor-key already exists, returns it unchanged. Otherwise
    /// creates a child span of `parent_process_span` (not started — actor
    /// spans are point-in-time and get stopped the moment they're flushed),
    /// tags it, stores the new entry, and returns it.
    pub fn upsert(
        &mut self,
        factory: &SpanFactory,
        parent_process_span: &Span,
        artifact: Artifact,
        actor_type: ActorType,
    ) -> CorrelatorResult<(Span, ActorContext)> {
        if actor_type == ActorType::Undefined {
            return Err(CorrelatorError::InvalidArgument(
                "actor type must not be Undefined".to_string(),
            ));
        }
        if actor_type.direction() != self.direction {
            return Err(CorrelatorError::InvalidActorDirection(format!(
                "actor type {actor_type} belongs to direction {:?}, not this map's {:?}",
                actor_type.direction(),
                self.direction
            )));
        }

        let key = actor_key(actor_type, &artifact);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(entry.clone());
        }

        let span = factory.create_child(Some(parent_process_span), key.clone());
        span.set_tag("actor.direction", format!("{:?}", self.direction))?;
        span.set_tag("actor.type", actor_type.to_string())?;

        let context = ActorContext::new(artifact, actor_type);
        self.entries.insert(key, (span.clone(), context.clone()));
        Ok((span, context))
    }

    /// For every entry: write its `log-count` tag onto the span, stop the
    /// span, and drop the entry. After `flush` the map is empty and
    /// reusable. Entries are independent; flush order is unspecified.
    pub fn flush(&mut self, now_ns: u64, backend: &dyn ActivitySource) -> CorrelatorResult<()> {
        for (_, (span, context)) in self.entries.drain() {
            span.set_tag("log.count", context.log_count() as i64)?;
            span.stop(now_ns, backend)?;
        }
        Ok(())
    }
}
