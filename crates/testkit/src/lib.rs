//! Span fixtures shared by the tracelens test suites.

use std::collections::BTreeMap;

use tracelens_core::model::span::{SpanKind, SpanRecord, SpanStatus};

/// Fluent builder over [`SpanRecord`] with defaults good enough for most
/// tests: internal kind, service `svc`, a one-millisecond window.
#[derive(Debug, Clone)]
pub struct SpanBuilder {
    record: SpanRecord,
}

impl SpanBuilder {
    pub fn new(trace_id: &str, span_id: &str) -> Self {
        Self {
            record: SpanRecord {
                trace_id: trace_id.to_string(),
                span_id: span_id.to_string(),
                parent_span_id: None,
                service: "svc".to_string(),
                name: span_id.to_string(),
                kind: SpanKind::Internal,
                start_unix_nano: Some(0),
                end_unix_nano: Some(1_000_000),
                attributes: BTreeMap::new(),
                status: SpanStatus::default(),
            },
        }
    }

    pub fn parent(mut self, parent_id: &str) -> Self {
        self.record.parent_span_id = Some(parent_id.to_string());
        self
    }

    pub fn service(mut self, service: &str) -> Self {
        self.record.service = service.to_string();
        self
    }

    pub fn kind(mut self, kind: SpanKind) -> Self {
        self.record.kind = kind;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.record.name = name.to_string();
        self
    }

    /// Half-open `[start, end)` window in unix nanoseconds.
    pub fn window(mut self, start: u64, end: u64) -> Self {
        self.record.start_unix_nano = Some(start);
        self.record.end_unix_nano = Some(end);
        self
    }

    pub fn no_timestamps(mut self) -> Self {
        self.record.start_unix_nano = None;
        self.record.end_unix_nano = None;
        self
    }

    pub fn attr(mut self, key: &str, value: serde_json::Value) -> Self {
        self.record.attributes.insert(key.to_string(), value);
        self
    }

    pub fn http(self, method: &str, url: &str) -> Self {
        self.attr("http.method", serde_json::json!(method))
            .attr("http.url", serde_json::json!(url))
    }

    pub fn status(mut self, code: i64, message: Option<&str>) -> Self {
        self.record.status = SpanStatus::new(code, message.map(str::to_string));
        self
    }

    pub fn build(self) -> SpanRecord {
        self.record
    }
}

/// SERVER span serving `method url` for `service`, window in nanoseconds.
pub fn server_span(
    trace_id: &str,
    span_id: &str,
    service: &str,
    method: &str,
    url: &str,
    start: u64,
    end: u64,
) -> SpanBuilder {
    SpanBuilder::new(trace_id, span_id)
        .service(service)
        .kind(SpanKind::Server)
        .name(&format!("{method} {url}"))
        .http(method, url)
        .window(start, end)
}

/// CLIENT span calling `method url` from `service`, window in nanoseconds.
pub fn client_span(
    trace_id: &str,
    span_id: &str,
    service: &str,
    method: &str,
    url: &str,
    start: u64,
    end: u64,
) -> SpanBuilder {
    SpanBuilder::new(trace_id, span_id)
        .service(service)
        .kind(SpanKind::Client)
        .name(&format!("{method} {url}"))
        .http(method, url)
        .window(start, end)
}
