//! Decoding of OTLP-style JSON trace exports into [`SpanRecord`]s.
//!
//! Two document layouts are accepted: the Grafana export shape
//! (`batches` / `instrumentationLibrarySpans`) and the OTLP JSON shape
//! (`resourceSpans` / `scopeSpans`). Attribute values arrive in the OTLP
//! `{stringValue|intValue|...}` envelopes and timestamps may be JSON numbers
//! or strings; both are normalized here.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use tracelens_core::model::span::{SpanKind, SpanRecord, SpanStatus};

#[derive(Debug, Deserialize)]
pub struct ExportDocument {
    #[serde(default, rename = "batches", alias = "resourceSpans")]
    pub batches: Vec<Batch>,
}

#[derive(Debug, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub resource: Resource,
    #[serde(
        default,
        rename = "instrumentationLibrarySpans",
        alias = "scopeSpans"
    )]
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Deserialize)]
pub struct RawAttribute {
    pub key: String,
    #[serde(default)]
    pub value: RawValue,
}

/// OTLP attribute value envelope. Exactly one variant is normally set.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValue {
    pub string_value: Option<String>,
    pub int_value: Option<serde_json::Value>,
    pub double_value: Option<f64>,
    pub bool_value: Option<bool>,
}

impl RawValue {
    /// Flatten the envelope to a plain JSON value. `intValue` is emitted as
    /// a string by some exporters and is re-parsed when possible.
    fn flatten(self) -> Option<serde_json::Value> {
        if let Some(s) = self.string_value {
            return Some(serde_json::Value::String(s));
        }
        if let Some(i) = self.int_value {
            return match i {
                serde_json::Value::String(s) => match s.parse::<i64>() {
                    Ok(n) => Some(serde_json::json!(n)),
                    Err(_) => Some(serde_json::Value::String(s)),
                },
                other => Some(other),
            };
        }
        if let Some(d) = self.double_value {
            return Some(serde_json::json!(d));
        }
        self.bool_value.map(serde_json::Value::Bool)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpan {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub kind: Option<serde_json::Value>,
    pub start_time_unix_nano: Option<serde_json::Value>,
    pub end_time_unix_nano: Option<serde_json::Value>,
    #[serde(default)]
    pub attributes: Vec<RawAttribute>,
    pub status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RawStatus {
    pub code: Option<serde_json::Value>,
    pub message: Option<String>,
}

pub fn attribute_map(attributes: Vec<RawAttribute>) -> BTreeMap<String, serde_json::Value> {
    attributes
        .into_iter()
        .filter(|a| !a.key.is_empty())
        .filter_map(|a| a.value.flatten().map(|v| (a.key, v)))
        .collect()
}

/// Service name from the resource attributes, as the exporters write it.
pub fn service_name(resource: &Resource) -> String {
    resource
        .attributes
        .iter()
        .find(|a| a.key == "service.name")
        .and_then(|a| a.value.string_value.clone())
        .unwrap_or_else(|| "unknown-service".to_string())
}

fn parse_nano(value: Option<&serde_json::Value>) -> Option<u64> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn status_code(value: Option<&serde_json::Value>) -> i64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => match s.trim_start_matches("STATUS_CODE_") {
            "ERROR" => 2,
            "OK" | "UNSET" | "" => 0,
            other => other.parse().unwrap_or(0),
        },
        _ => 0,
    }
}

/// Decode one raw span; `None` means the span is undecodable (missing ids)
/// and has been warned about.
pub fn decode_span(raw: RawSpan, service: &str) -> Option<SpanRecord> {
    if raw.trace_id.is_empty() || raw.span_id.is_empty() {
        warn!(service, name = %raw.name, "dropping span without trace or span id");
        return None;
    }

    let kind = raw
        .kind
        .as_ref()
        .map(SpanKind::parse)
        .unwrap_or(SpanKind::Internal);
    let status = match raw.status {
        Some(s) => SpanStatus::new(status_code(s.code.as_ref()), s.message),
        None => SpanStatus::default(),
    };

    Some(SpanRecord {
        trace_id: raw.trace_id,
        span_id: raw.span_id,
        parent_span_id: raw.parent_span_id.filter(|p| !p.is_empty()),
        service: service.to_string(),
        name: raw.name,
        kind,
        start_unix_nano: parse_nano(raw.start_time_unix_nano.as_ref()),
        end_unix_nano: parse_nano(raw.end_time_unix_nano.as_ref()),
        attributes: attribute_map(raw.attributes),
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_document_layouts() {
        let grafana = serde_json::json!({
            "batches": [{
                "resource": {"attributes": [
                    {"key": "service.name", "value": {"stringValue": "api"}}
                ]},
                "instrumentationLibrarySpans": [{"spans": [
                    {"traceId": "t1", "spanId": "s1", "name": "GET /x",
                     "kind": "SPAN_KIND_SERVER",
                     "startTimeUnixNano": "100", "endTimeUnixNano": 200}
                ]}]
            }]
        });
        let doc: ExportDocument = serde_json::from_value(grafana).unwrap();
        assert_eq!(doc.batches.len(), 1);
        assert_eq!(service_name(&doc.batches[0].resource), "api");

        let otlp = serde_json::json!({
            "resourceSpans": [{
                "scopeSpans": [{"spans": [
                    {"traceId": "t1", "spanId": "s1", "name": "x"}
                ]}]
            }]
        });
        let doc: ExportDocument = serde_json::from_value(otlp).unwrap();
        assert_eq!(doc.batches[0].scopes[0].spans.len(), 1);
    }

    #[test]
    fn timestamps_decode_from_strings_and_numbers() {
        let raw: RawSpan = serde_json::from_value(serde_json::json!({
            "traceId": "t1", "spanId": "s1", "name": "x",
            "startTimeUnixNano": "1700000000000000000",
            "endTimeUnixNano": 1700000000500000000u64
        }))
        .unwrap();
        let span = decode_span(raw, "api").unwrap();
        assert_eq!(span.start_unix_nano, Some(1_700_000_000_000_000_000));
        assert_eq!(span.end_unix_nano, Some(1_700_000_000_500_000_000));
    }

    #[test]
    fn attribute_envelopes_flatten() {
        let raw: RawSpan = serde_json::from_value(serde_json::json!({
            "traceId": "t1", "spanId": "s1", "name": "x",
            "attributes": [
                {"key": "http.url", "value": {"stringValue": "/a/1"}},
                {"key": "http.status_code", "value": {"intValue": "503"}},
                {"key": "retry", "value": {"boolValue": true}}
            ]
        }))
        .unwrap();
        let span = decode_span(raw, "api").unwrap();
        assert_eq!(span.attr_str("http.url"), Some("/a/1"));
        assert_eq!(span.attr_i64("http.status_code"), Some(503));
        assert_eq!(span.attributes["retry"], serde_json::json!(true));
    }

    #[test]
    fn error_status_decodes_from_both_forms() {
        let raw: RawSpan = serde_json::from_value(serde_json::json!({
            "traceId": "t1", "spanId": "s1", "name": "x",
            "status": {"code": "STATUS_CODE_ERROR", "message": "boom"}
        }))
        .unwrap();
        let span = decode_span(raw, "api").unwrap();
        assert!(span.status.is_error());
        assert_eq!(span.status.message.as_deref(), Some("boom"));

        let raw: RawSpan = serde_json::from_value(serde_json::json!({
            "traceId": "t1", "spanId": "s1", "name": "x", "status": {"code": 2}
        }))
        .unwrap();
        assert!(decode_span(raw, "api").unwrap().status.is_error());
    }

    #[test]
    fn spans_without_ids_are_dropped() {
        let raw: RawSpan =
            serde_json::from_value(serde_json::json!({"name": "nameless"})).unwrap();
        assert!(decode_span(raw, "api").is_none());
    }
}
