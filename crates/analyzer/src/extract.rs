//! Span attribute extraction: HTTP details, messaging details, and error
//! messages, turned into display-ready [`Node`] fields.

use tracelens_core::model::node::Node;
use tracelens_core::model::span::{SpanKind, SpanRecord};
use tracelens_core::normalize::PathNormalizer;

/// `http.route` first: it already carries the pre-parameterized template.
const PATH_KEYS: [&str; 4] = ["http.route", "http.url", "http.target", "http.path"];

const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

pub fn http_path(span: &SpanRecord) -> Option<&str> {
    PATH_KEYS
        .iter()
        .find_map(|key| span.attr_str(key).filter(|v| !v.is_empty()))
}

pub fn http_method(span: &SpanRecord) -> String {
    if let Some(method) = span.attr_str("http.method").filter(|m| !m.is_empty()) {
        return method.to_string();
    }
    // Span names like "GET /api/users" carry the method when the attribute
    // is missing.
    let first = span.name.split_whitespace().next().unwrap_or("");
    if HTTP_METHODS.contains(&first) {
        return first.to_string();
    }
    "UNKNOWN".to_string()
}

pub fn http_status(span: &SpanRecord) -> Option<u16> {
    span.attr_i64("http.status_code")
        .and_then(|code| u16::try_from(code).ok())
}

/// Target service from a full URL: first label of the hostname, so
/// `http://data-service.svc.cluster.local/x` yields `data-service`.
pub fn callee_service(url: &str) -> Option<String> {
    let rest = &url[url.find("://")? + 3..];
    let authority = rest.split('/').next()?;
    let host = authority
        .rsplit('@')
        .next()?
        .split(':')
        .next()?;
    let label = host.split('.').next()?;
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

/// Error message for a failed span, most specific source first:
/// status message, HTTP status text, exception/error attributes, span name,
/// and finally a fixed placeholder.
pub fn error_message(span: &SpanRecord) -> String {
    if let Some(message) = &span.status.message {
        return message.clone();
    }
    if let Some(code) = http_status(span) {
        return format!("HTTP {code}: {}", http_status_text(code));
    }
    for key in ["exception.message", "exception.type", "error.message"] {
        if let Some(value) = span.attr_str(key) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    let name = span.name.trim();
    if !name.is_empty() {
        return format!("Error in {name}");
    }
    "Unknown Error".to_string()
}

fn http_status_text(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        511 => "Network Authentication Required",
        _ if code >= 400 => "Error",
        _ => "Unknown Status",
    }
}

const MESSAGING_DETAIL_KEYS: [&str; 4] = [
    "messaging.system",
    "messaging.destination.name",
    "messaging.kafka.consumer.group",
    "messaging.message.id",
];

/// Comma-joined `key=value` pairs of the messaging attributes worth keying
/// on, or a fixed placeholder when none are present.
pub fn messaging_details(span: &SpanRecord) -> String {
    let parts: Vec<String> = MESSAGING_DETAIL_KEYS
        .iter()
        .filter_map(|key| {
            span.attr_str(key)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={v}"))
        })
        .collect();
    if parts.is_empty() {
        "[no-details]".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn render_display(kind: SpanKind, method_or_op: &str, template: &str, params: &[String]) -> String {
    match kind {
        SpanKind::Producer | SpanKind::Consumer => format!("{method_or_op} {template}"),
        _ if method_or_op.is_empty() => template.to_string(),
        _ => {
            if params.is_empty() {
                format!("{method_or_op} {template}")
            } else {
                format!("{method_or_op} {template} ({})", params.join(", "))
            }
        }
    }
}

/// Build the display node for one decodable span. Timing, error, and
/// presentation fields are all filled here; hierarchy and aggregation state
/// are left for the later passes.
pub fn node_from_span(span: &SpanRecord, normalizer: &PathNormalizer, strip_query: bool) -> Node {
    let mut node = Node::new(span.service.clone(), span.kind);
    node.start_unix_nano = span.start_unix_nano;
    node.end_unix_nano = span.end_unix_nano;
    node.total_time_ms = span.duration_ms();
    node.self_time_ms = node.total_time_ms;

    if let Some(path) = http_path(span) {
        let (template, params) = normalizer.normalize_path(path, strip_query);
        node.method_or_op = http_method(span);
        if span.kind == SpanKind::Client {
            node.peer_service = span
                .attr_str("peer.service")
                .map(str::to_string)
                .or_else(|| callee_service(path));
        }
        node.display = render_display(span.kind, &node.method_or_op, &template, &params);
        node.template = template;
        node.params = params;
    } else if matches!(span.kind, SpanKind::Producer | SpanKind::Consumer) {
        node.method_or_op = span.kind.label().to_string();
        node.template = span.name.clone();
        node.display = render_display(span.kind, &node.method_or_op, &node.template, &[]);
        node.messaging_details = Some(messaging_details(span));
    } else {
        node.template = span.name.clone();
        node.display = span.name.clone();
    }

    node.http_status = http_status(span);
    if span.status.is_error() {
        node.is_error = true;
        node.error_count = 1;
        node.error_message = Some(error_message(span));
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tracelens_core::model::span::SpanStatus;

    fn span(kind: SpanKind, name: &str, attrs: &[(&str, serde_json::Value)]) -> SpanRecord {
        SpanRecord {
            trace_id: "t1".into(),
            span_id: "s1".into(),
            parent_span_id: None,
            service: "api".into(),
            name: name.into(),
            kind,
            start_unix_nano: Some(0),
            end_unix_nano: Some(1_000_000),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            status: SpanStatus::default(),
        }
    }

    #[test]
    fn route_preferred_over_url() {
        let s = span(
            SpanKind::Server,
            "GET /users/42",
            &[
                ("http.url", serde_json::json!("http://api/users/42")),
                ("http.route", serde_json::json!("/users/{userID}")),
            ],
        );
        assert_eq!(http_path(&s), Some("/users/{userID}"));
    }

    #[test]
    fn method_falls_back_to_span_name_then_unknown() {
        let s = span(SpanKind::Server, "POST /orders", &[]);
        assert_eq!(http_method(&s), "POST");
        let s = span(SpanKind::Server, "handle-orders", &[]);
        assert_eq!(http_method(&s), "UNKNOWN");
    }

    #[test]
    fn callee_is_first_hostname_label() {
        assert_eq!(
            callee_service("http://data-service.svc.cluster.local:8080/items"),
            Some("data-service".to_string())
        );
        assert_eq!(callee_service("/relative/path"), None);
    }

    #[test]
    fn error_message_priority_cascade() {
        let mut s = span(SpanKind::Client, "GET /x", &[]);
        s.status = SpanStatus::new(2, Some("timeout".into()));
        assert_eq!(error_message(&s), "timeout");

        s.status = SpanStatus::new(2, Some("   ".into()));
        s.attributes
            .insert("http.status_code".into(), serde_json::json!(503));
        assert_eq!(error_message(&s), "HTTP 503: Service Unavailable");

        s.attributes.remove("http.status_code");
        s.attributes
            .insert("exception.message".into(), serde_json::json!("boom"));
        assert_eq!(error_message(&s), "boom");

        s.attributes.remove("exception.message");
        s.attributes
            .insert("exception.type".into(), serde_json::json!("IOError"));
        assert_eq!(error_message(&s), "IOError");

        s.attributes.remove("exception.type");
        assert_eq!(error_message(&s), "Error in GET /x");

        s.name = String::new();
        assert_eq!(error_message(&s), "Unknown Error");
    }

    #[test]
    fn node_from_http_client_span() {
        let mut s = span(
            SpanKind::Client,
            "GET",
            &[
                ("http.url", serde_json::json!("http://billing.internal/invoices/7")),
                ("http.method", serde_json::json!("GET")),
            ],
        );
        s.status = SpanStatus::new(2, Some("refused".into()));

        let node = node_from_span(&s, &PathNormalizer::new(), true);
        assert_eq!(node.template, "/invoices/{id}");
        assert_eq!(node.params, vec!["7"]);
        assert_eq!(node.peer_service.as_deref(), Some("billing"));
        assert_eq!(node.display, "GET /invoices/{id} (7)");
        assert!(node.is_error);
        assert_eq!(node.error_message.as_deref(), Some("refused"));
        assert_eq!(node.total_time_ms, 1.0);
    }

    #[test]
    fn node_from_messaging_span() {
        let s = span(
            SpanKind::Producer,
            "orders publish",
            &[("messaging.destination.name", serde_json::json!("orders"))],
        );
        let node = node_from_span(&s, &PathNormalizer::new(), true);
        assert_eq!(node.method_or_op, "producer");
        assert_eq!(node.display, "producer orders publish");
        assert_eq!(messaging_details(&s), "messaging.destination.name=orders");
    }
}
