use serde::{Deserialize, Serialize};

use crate::model::span::SpanKind;
use crate::time::nanos_to_ms;

/// One element of the display hierarchy: either a single span or an
/// aggregate of structurally-equivalent sibling spans (`count > 1`).
///
/// Aggregation-only fields stay at their neutral defaults while `count == 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub service: String,
    pub kind: SpanKind,
    /// HTTP method for HTTP spans, messaging operation (`producer`/
    /// `consumer`) for messaging spans, empty for internal spans.
    pub method_or_op: String,
    /// Normalized path template, or the span name for non-HTTP spans.
    pub template: String,
    /// Rendered display name, e.g. `GET /bundles/{bundleID}/versions/{versionID}`.
    pub display: String,
    /// Captured parameter values, ordered and deduplicated.
    pub params: Vec<String>,
    /// Callee service derived from the URL host of CLIENT spans.
    pub peer_service: Option<String>,
    /// Messaging attribute summary for PRODUCER/CONSUMER spans.
    pub messaging_details: Option<String>,
    pub children: Vec<Node>,
    pub total_time_ms: f64,
    pub self_time_ms: f64,
    pub start_unix_nano: Option<u64>,
    pub end_unix_nano: Option<u64>,
    pub count: usize,
    pub is_error: bool,
    pub error_count: usize,
    pub error_message: Option<String>,
    pub http_status: Option<u16>,
    pub parallelism_factor: f64,
    pub effective_time_ms: Option<f64>,
    pub has_parallel_children: bool,
    /// Root-level-only marker: this child overlapped a distinct sibling.
    pub parallel_sibling: bool,
}

impl Node {
    pub fn new(service: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            service: service.into(),
            kind,
            method_or_op: String::new(),
            template: String::new(),
            display: String::new(),
            params: Vec::new(),
            peer_service: None,
            messaging_details: None,
            children: Vec::new(),
            total_time_ms: 0.0,
            self_time_ms: 0.0,
            start_unix_nano: None,
            end_unix_nano: None,
            count: 1,
            is_error: false,
            error_count: 0,
            error_message: None,
            http_status: None,
            parallelism_factor: 1.0,
            effective_time_ms: None,
            has_parallel_children: false,
            parallel_sibling: false,
        }
    }

    /// Valid half-open interval for this node, if both bounds are known.
    pub fn interval(&self) -> Option<(u64, u64)> {
        match (self.start_unix_nano, self.end_unix_nano) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }

    pub fn is_aggregated(&self) -> bool {
        self.count > 1
    }

    pub fn avg_time_ms(&self) -> f64 {
        self.total_time_ms / self.count as f64
    }

    /// Post-order walk over the finished tree.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        for child in &self.children {
            child.walk(visit);
        }
        visit(self);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSummary {
    pub start_unix_nano: u64,
    pub end_unix_nano: u64,
    pub wall_clock_ms: f64,
    pub span_count: usize,
}

impl TraceSummary {
    pub fn from_bounds(start: u64, end: u64, span_count: usize) -> Self {
        Self {
            start_unix_nano: start,
            end_unix_nano: end,
            wall_clock_ms: nanos_to_ms(end.saturating_sub(start)),
            span_count,
        }
    }
}

/// Finished analysis of one trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    pub trace_id: String,
    pub root: Node,
    pub summary: TraceSummary,
    pub skipped_spans: usize,
}
