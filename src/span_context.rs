//! Span context (C2)
//!
//! A thin abstraction over the tracing backend. The correlator never talks
//! to `opentelemetry` directly — it creates, starts, tags, and stops `Span`
//! handles through the [`ActivitySource`] trait, and treats span identity as
//! opaque except for the (trace-id, span-id) pair needed for parent linkage.
//!
//! State machine: `Created → Running → Stopped`. `start` requires `Created`;
//! `set_tag` is allowed in `Created` or `Running`; `stop` requires
//! `Created` or `Running` and transitions to `Stopped`. Every operation
//! past `Stopped` fails `InvalidState`.

use crate::error::{CorrelatorError, CorrelatorResult};
use rand::Rng;
use std::cell::RefCell;
use std::rc::Rc;

/// A tag value attachable to a span.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    Int(i64),
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Str(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::Str(s)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanState {
    Created,
    Running,
    Stopped,
}

/// Backend-agnostic identity used for parent linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanIds {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub parent_span_id: Option<[u8; 8]>,
}

impl SpanIds {
    /// Trace ID as a hex string (W3C Trace Context format), for logging.
    pub fn trace_id_hex(&self) -> String {
        hex::encode(self.trace_id)
    }

    /// Span ID as a hex string (W3C Trace Context format), for logging.
    pub fn span_id_hex(&self) -> String {
        hex::encode(self.span_id)
    }

    /// Parent span ID as a hex string, if this span has a parent.
    pub fn parent_span_id_hex(&self) -> Option<String> {
        self.parent_span_id.map(hex::encode)
    }
}

/// The shared, thread-safe tracing backend handle — the "activity source":
/// invoked exactly once per span, when the span transitions to `Stopped`,
/// to flush its accumulated name, tags, and log records to the real
/// backend (OTLP exporter, in-memory test collector, ...).
pub trait ActivitySource: Send + Sync {
    fn export(&self, record: ExportedSpan) -> CorrelatorResult<()>;
}

/// Everything the backend needs to emit a finished span.
#[derive(Debug, Clone)]
pub struct ExportedSpan {
    pub ids: SpanIds,
    pub name: String,
    pub start_ns: u64,
    pub end_ns: u64,
    pub tags: Vec<(String, TagValue)>,
    pub log_records: Vec<serde_json::Value>,
}

struct SpanInner {
    ids: SpanIds,
    name: String,
    state: SpanState,
    start_ns: u64,
    tags: Vec<(String, TagValue)>,
    log_records: Vec<serde_json::Value>,
}

/// A lightweight, cloneable handle to a span. Identity is opaque to callers
/// beyond [`Span::ids`] — the handle is reference-counted so the actor map,
/// the process activity context, and the registry can all hold a copy of
/// the same logical span.
#[derive(Clone)]
pub struct Span {
    inner: Rc<RefCell<SpanInner>>,
}

impl Span {
    pub fn ids(&self) -> SpanIds {
        self.inner.borrow().ids
    }

    pub fn trace_id(&self) -> [u8; 16] {
        self.inner.borrow().ids.trace_id
    }

    pub fn span_id(&self) -> [u8; 8] {
        self.inner.borrow().ids.span_id
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Records start-time; `Created → Running`. Fails `InvalidState` if not `Created`.
    pub fn start(&self, now_ns: u64) -> CorrelatorResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state != SpanState::Created {
            return Err(CorrelatorError::InvalidState(format!(
                "cannot start span '{}' in state {:?}",
                inner.name, inner.state
            )));
        }
        inner.start_ns = now_ns;
        inner.state = SpanState::Running;
        Ok(())
    }

    /// Allowed in `Created` or `Running`.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<TagValue>) -> CorrelatorResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == SpanState::Stopped {
            return Err(CorrelatorError::InvalidState(format!(
                "cannot tag stopped span '{}'",
                inner.name
            )));
        }
        inner.tags.push((key.into(), value.into()));
        Ok(())
    }

    /// Attaches a decoded log record as a span event. The span itself does
    /// not count log records — that bookkeeping belongs to the owning
    /// [`crate::identifier::SystemContext`] (`ProcessContext`/`ActorContext`),
    /// whose counter is written onto the span as a `log.count` tag when the
    /// span is stopped.
    pub fn attach_log(&self, record: serde_json::Value) -> CorrelatorResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == SpanState::Stopped {
            return Err(CorrelatorError::InvalidState(format!(
                "cannot attach log to stopped span '{}'",
                inner.name
            )));
        }
        inner.log_records.push(record);
        Ok(())
    }

    /// Records end-time and hands the span to the backend for export.
    /// `Running|Created → Stopped`. Idempotent from the correlator's
    /// perspective: a second call is a no-op rather than an error, since
    /// owning containers may call `stop` during both explicit flush and drop.
    ///
    /// A span that was never `start`-ed (actor spans, per `ActorMap::upsert`)
    /// has its `start_ns` backfilled to `now_ns` here, so a created-then-
    /// stopped-without-starting span reports `start_ns == end_ns` — a
    /// point-in-time span — instead of the zero-initialized epoch default.
    pub fn stop(&self, now_ns: u64, backend: &dyn ActivitySource) -> CorrelatorResult<()> {
        let exported = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == SpanState::Stopped {
                return Ok(());
            }
            if inner.state == SpanState::Created {
                inner.start_ns = now_ns;
            }
            inner.state = SpanState::Stopped;
            ExportedSpan {
                ids: inner.ids,
                name: inner.name.clone(),
                start_ns: inner.start_ns,
                end_ns: now_ns,
                tags: inner.tags.clone(),
                log_records: inner.log_records.clone(),
            }
        };
        backend.export(exported)
    }
}

/// Generates fresh trace-ids and span-ids and wires up parent linkage.
/// Creation never starts the clock.
pub struct SpanFactory;

impl SpanFactory {
    pub fn new() -> Self {
        SpanFactory
    }

    /// `create_child(parent_context?, name) → Span`. If `parent` is
    /// supplied, the new span inherits its trace-id and sets
    /// `parent-span-id` to the parent's span-id; otherwise a fresh trace-id
    /// and a randomly generated span-id are used.
    pub fn create_child(&self, parent: Option<&Span>, name: impl Into<String>) -> Span {
        let mut rng = rand::thread_rng();
        let (trace_id, parent_span_id) = match parent {
            Some(p) => (p.trace_id(), Some(p.span_id())),
            None => (rng.gen::<[u8; 16]>(), None),
        };
        let span_id: [u8; 8] = rng.gen();

        Span {
            inner: Rc::new(RefCell::new(SpanInner {
                ids: SpanIds {
                    trace_id,
                    span_id,
                    parent_span_id,
                },
                name: name.into(),
                state: SpanState::Created,
                start_ns: 0,
                tags: Vec::new(),
                log_records: Vec::new(),
            })),
        }
    }
}

impl Default for SpanFactory {
    fn default() -> Self {
        Self::new()
    }
}
