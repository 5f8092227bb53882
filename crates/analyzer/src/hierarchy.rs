//! Raw hierarchy construction: one node per decodable span, parent linking,
//! orphan adoption under per-service anchors, and synthetic rooting when a
//! trace has several unresolved roots.

use std::collections::HashMap;

use tracing::{debug, warn};

use tracelens_core::error::{Result, TracelensError};
use tracelens_core::interval::wall_clock_ms;
use tracelens_core::model::node::{Node, TraceSummary};
use tracelens_core::model::span::{SpanKind, SpanRecord};
use tracelens_core::normalize::PathNormalizer;

use crate::extract;

/// Output of the raw build, before any timing or display rewriting.
#[derive(Debug)]
pub struct BuiltTrace {
    pub trace_id: String,
    pub root: Node,
    pub summary: TraceSummary,
    pub skipped_spans: usize,
}

/// Build one tree for the trace. Every decodable span ends up in the tree
/// exactly once; malformed spans are skipped and counted.
pub fn build_hierarchy(
    trace_id: &str,
    spans: &[SpanRecord],
    normalizer: &PathNormalizer,
    strip_query: bool,
) -> Result<BuiltTrace> {
    let mut slots: Vec<Option<Node>> = Vec::with_capacity(spans.len());
    let mut kept: Vec<&SpanRecord> = Vec::with_capacity(spans.len());
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(spans.len());
    // First SERVER span per service adopts that service's orphans.
    let mut anchors: HashMap<&str, usize> = HashMap::new();
    let mut skipped = 0usize;

    for span in spans {
        if span.span_id.is_empty() {
            warn!(trace_id, "skipping span without an id");
            skipped += 1;
            continue;
        }
        if span.start_unix_nano.is_none() || span.end_unix_nano.is_none() {
            warn!(trace_id, span_id = %span.span_id, "skipping span without timestamps");
            skipped += 1;
            continue;
        }
        if index_of.contains_key(span.span_id.as_str()) {
            warn!(trace_id, span_id = %span.span_id, "skipping duplicate span id");
            skipped += 1;
            continue;
        }

        let idx = slots.len();
        index_of.insert(span.span_id.as_str(), idx);
        slots.push(Some(extract::node_from_span(span, normalizer, strip_query)));
        kept.push(span);
        if span.kind == SpanKind::Server {
            anchors.entry(span.service.as_str()).or_insert(idx);
        }
    }

    if slots.is_empty() {
        return Err(TracelensError::EmptyTrace {
            trace_id: trace_id.to_string(),
        });
    }

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (idx, span) in kept.iter().enumerate() {
        let resolved_parent = span
            .parent_span_id
            .as_deref()
            .and_then(|p| index_of.get(p).copied())
            .filter(|&p| p != idx);
        let anchor = anchors
            .get(span.service.as_str())
            .copied()
            .filter(|&a| a != idx);

        match resolved_parent.or(anchor) {
            Some(parent) => children_of[parent].push(idx),
            None => roots.push(idx),
        }
    }

    let start = kept.iter().filter_map(|s| s.start_unix_nano).min().unwrap_or(0);
    let end = kept.iter().filter_map(|s| s.end_unix_nano).max().unwrap_or(start);
    let summary = TraceSummary::from_bounds(start, end, kept.len());

    let mut assembled: Vec<Node> = roots
        .into_iter()
        .filter_map(|idx| assemble(idx, &mut slots, &children_of))
        .collect();

    // Parent links that form a cycle leave their whole component unrooted;
    // surface those spans as extra roots rather than dropping them.
    for idx in 0..slots.len() {
        if slots[idx].is_some() {
            warn!(trace_id, "breaking unreachable span cycle at index {idx}");
            if let Some(node) = assemble(idx, &mut slots, &children_of) {
                assembled.push(node);
            }
        }
    }

    let root = match assembled.len() {
        1 => assembled.remove(0),
        n => {
            debug!(trace_id, roots = n, "wrapping unresolved roots under a synthetic root");
            synthetic_root(assembled, &summary)
        }
    };

    Ok(BuiltTrace {
        trace_id: trace_id.to_string(),
        root,
        summary,
        skipped_spans: skipped,
    })
}

/// Detach the node at `idx` and, recursively, every still-attached child.
/// Taking the slot first makes the assembly cycle-safe: a span can be
/// attached at most once.
fn assemble(idx: usize, slots: &mut [Option<Node>], children_of: &[Vec<usize>]) -> Option<Node> {
    let mut node = slots[idx].take()?;
    for &child in &children_of[idx] {
        if let Some(child_node) = assemble(child, slots, children_of) {
            node.children.push(child_node);
        }
    }
    Some(node)
}

fn synthetic_root(roots: Vec<Node>, summary: &TraceSummary) -> Node {
    let intervals: Vec<_> = roots.iter().filter_map(Node::interval).collect();
    let mut root = Node::new("Trace", SpanKind::Internal);
    root.template = "Trace Root".to_string();
    root.display = "Trace Root".to_string();
    root.start_unix_nano = Some(summary.start_unix_nano);
    root.end_unix_nano = Some(summary.end_unix_nano);
    root.total_time_ms = wall_clock_ms(&intervals);
    root.children = roots;
    root
}
