//! OTLP backend
//!
//! [`OtelActivitySource`] implements [`ActivitySource`] against a real
//! `opentelemetry_sdk` tracer + OTLP exporter, the way this workspace's own
//! `otlp_exporter` builds one: a Tokio runtime hosting the async exporter,
//! a `BatchSpanProcessor`, and a `Resource` carrying the service name.
//! [`DryRunActivitySource`] implements the same trait purely in memory, so
//! the correlator's invariants can be asserted without a live collector,
//! and so `--dry-run` can run the agent without one.

use crate::error::{CorrelatorError, CorrelatorResult};
use crate::span_context::{ActivitySource, ExportedSpan, TagValue};

#[cfg(feature = "otlp")]
use opentelemetry::{
    trace::{
        SpanContext, SpanId, SpanKind, Status, TraceContextExt, TraceFlags, TraceId, TraceState,
        TracerProvider as _,
    },
    trace::{Span as _, Tracer as _},
    KeyValue,
};
#[cfg(feature = "otlp")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otlp")]
use opentelemetry_sdk::{
    trace::{BatchSpanProcessor, SdkTracerProvider as TracerProvider},
    Resource,
};

/// Endpoint/service configuration consumed at startup.
#[derive(Debug, Clone)]
pub struct OtlpConfig {
    pub endpoint: String,
    pub service_name: String,
}

#[cfg(feature = "otlp")]
pub struct OtelActivitySource {
    _runtime: tokio::runtime::Runtime,
    _provider: TracerProvider,
    tracer: opentelemetry_sdk::trace::Tracer,
}

#[cfg(feature = "otlp")]
impl OtelActivitySource {
    pub fn new(config: OtlpConfig) -> CorrelatorResult<Self> {
        let runtime = tokio::runtime::Runtime::new().map_err(|e| {
            CorrelatorError::BackendUnavailable(format!("failed to create Tokio runtime: {e}"))
        })?;

        let (provider, tracer) = runtime.block_on(async {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(&config.endpoint)
                .build()
                .map_err(|e| {
                    CorrelatorError::BackendUnavailable(format!(
                        "failed to build OTLP exporter: {e}"
                    ))
                })?;

            let span_processor = BatchSpanProcessor::builder(exporter).build();

            let resource = Resource::builder()
                .with_service_name(config.service_name.clone())
                .build();

            let provider = TracerProvider::builder()
                .with_span_processor(span_processor)
                .with_resource(resource)
                .build();

            let tracer = provider.tracer("nanolite-agent");
            Ok::<_, CorrelatorError>((provider, tracer))
        })?;

        Ok(Self {
            _runtime: runtime,
            _provider: provider,
            tracer,
        })
    }
}

#[cfg(feature = "otlp")]
impl ActivitySource for OtelActivitySource {
    /// Builds and immediately ends a span whose trace-id/span-id/parent are
    /// the correlator's own (not the SDK's IdGenerator) and whose start/end
    /// times are the ones the correlator already computed — the span has
    /// already lived its whole life inside the correlator by the time it
    /// reaches `export`.
    fn export(&self, record: ExportedSpan) -> CorrelatorResult<()> {
        let parent_ctx = record.ids.parent_span_id.map(|parent_id| {
            let parent_context = SpanContext::new(
                TraceId::from_bytes(record.ids.trace_id),
                SpanId::from_bytes(parent_id),
                TraceFlags::SAMPLED,
                true,
                TraceState::default(),
            );
            opentelemetry::Context::current().with_remote_span_context(parent_context)
        });

        let attributes: Vec<KeyValue> = record
            .tags
            .iter()
            .map(|(k, v)| match v {
                TagValue::Str(s) => KeyValue::new(k.clone(), s.clone()),
                TagValue::Int(i) => KeyValue::new(k.clone(), *i),
            })
            .collect();

        let builder = self
            .tracer
            .span_builder(record.name.clone())
            .with_trace_id(TraceId::from_bytes(record.ids.trace_id))
            .with_span_id(SpanId::from_bytes(record.ids.span_id))
            .with_kind(SpanKind::Internal)
            .with_attributes(attributes)
            .with_start_time(std::time::UNIX_EPOCH + std::time::Duration::from_nanos(record.start_ns))
            .with_end_time(std::time::UNIX_EPOCH + std::time::Duration::from_nanos(record.end_ns));

        let mut span = if let Some(ref ctx) = parent_ctx {
            builder.start_with_context(&self.tracer, ctx)
        } else {
            builder.start(&self.tracer)
        };

        for record_log in &record.log_records {
            span.add_event("log.body".to_string(), vec![KeyValue::new(
                "log.body",
                record_log.to_string(),
            )]);
        }

        span.set_status(Status::Ok);
        span.end();
        Ok(())
    }
}

/// In-memory backend used by `--dry-run` and every unit/integration test.
/// Spans are recorded into a `Vec` behind a `Mutex`, mirroring the
/// in-memory exporter pattern used for the OpenTelemetry SDK's own tests.
pub struct DryRunActivitySource {
    exported: std::sync::Mutex<Vec<ExportedSpan>>,
    log_on_export: bool,
}

impl DryRunActivitySource {
    pub fn new(log_on_export: bool) -> Self {
        Self {
            exported: std::sync::Mutex::new(Vec::new()),
            log_on_export,
        }
    }

    pub fn exported(&self) -> Vec<ExportedSpan> {
        self.exported.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.exported.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DryRunActivitySource {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ActivitySource for DryRunActivitySource {
    fn export(&self, record: ExportedSpan) -> CorrelatorResult<()> {
        if self.log_on_export {
            tracing::info!(
                span = %record.name,
                trace_id = %record.ids.trace_id_hex(),
                span_id = %record.ids.span_id_hex(),
                parent_span_id = record.ids.parent_span_id_hex().as_deref().unwrap_or("-"),
                start_ns = record.start_ns,
                end_ns = record.end_ns,
                tags = ?record.tags,
                "dry-run span exported"
            );
        }
        self.exported.lock().unwrap().push(record);
        Ok(())
    }
}
