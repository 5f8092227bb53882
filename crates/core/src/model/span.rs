use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Server,
    Client,
    Producer,
    Consumer,
    Internal,
}

impl SpanKind {
    /// Accepts the OTLP string form (`SPAN_KIND_SERVER`), the bare form
    /// (`SERVER`), and the numeric protobuf enum (1..=5). Anything else is
    /// treated as internal.
    pub fn parse(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => match s.trim_start_matches("SPAN_KIND_") {
                "SERVER" => Self::Server,
                "CLIENT" => Self::Client,
                "PRODUCER" => Self::Producer,
                "CONSUMER" => Self::Consumer,
                _ => Self::Internal,
            },
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(2) => Self::Server,
                Some(3) => Self::Client,
                Some(4) => Self::Producer,
                Some(5) => Self::Consumer,
                _ => Self::Internal,
            },
            _ => Self::Internal,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
            Self::Internal => "internal",
        }
    }
}

/// Span status per OTLP: code 0 is unset, 1 and 2 both mark errors in the
/// exports this tool consumes. An empty message is normalized to absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpanStatus {
    pub code: i64,
    pub message: Option<String>,
}

impl SpanStatus {
    pub fn new(code: i64, message: Option<String>) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        Self { code, message }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.code, 1 | 2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service: String,
    pub name: String,
    pub kind: SpanKind,
    /// Absent when the export carried a non-numeric timestamp; such spans
    /// are skipped by the hierarchy builder.
    pub start_unix_nano: Option<u64>,
    pub end_unix_nano: Option<u64>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub status: SpanStatus,
}

impl SpanRecord {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        match (self.start_unix_nano, self.end_unix_nano) {
            (Some(start), Some(end)) if end > start => (end - start) as f64 / 1_000_000.0,
            _ => 0.0,
        }
    }
}
