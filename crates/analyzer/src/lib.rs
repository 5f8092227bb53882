//! Trace analysis pipeline: hierarchy reconstruction, wall-clock-correct
//! timing, service-mesh collapsing, sibling aggregation, and flat metrics.
//!
//! Per trace the stage order is strict: build, self-time pass one, metrics
//! walk over the raw tree, then mesh collapse plus aggregation and self-time
//! pass two for the display tree. Traces are independent of each other and
//! fan out across a rayon pool; the run-level tables are folded together
//! afterwards.

pub mod aggregate;
pub mod extract;
pub mod hierarchy;
pub mod mesh;
pub mod metrics;
pub mod timing;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use tracelens_core::config::AnalyzeConfig;
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::model::node::TraceReport;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::model::stats::FlatTables;
use tracelens_core::normalize::PathNormalizer;

/// A trace that could not be analyzed; the rest of the run proceeds.
#[derive(Debug)]
pub struct TraceFailure {
    pub trace_id: String,
    pub error: TracelensError,
}

/// Result of a whole analysis run.
#[derive(Debug, Default)]
pub struct RunAnalysis {
    pub reports: Vec<TraceReport>,
    pub tables: FlatTables,
    pub failures: Vec<TraceFailure>,
}

impl RunAnalysis {
    pub fn total_spans(&self) -> usize {
        self.reports.iter().map(|r| r.summary.span_count).sum()
    }
}

/// Analyze a single trace end to end.
pub fn analyze_trace(
    trace_id: &str,
    spans: &[SpanRecord],
    cfg: &AnalyzeConfig,
    normalizer: &PathNormalizer,
) -> Result<(TraceReport, FlatTables)> {
    let built = hierarchy::build_hierarchy(trace_id, spans, normalizer, cfg.strip_query_params)?;
    let mut root = built.root;

    timing::compute_self_times(&mut root);
    // Flat tables come off the raw tree: the mesh collapse below elides
    // same-service CLIENT hops, which are exactly the service-call spans.
    let tables = metrics::populate_metrics(&root, cfg);

    if !cfg.include_service_mesh {
        mesh::collapse_same_service(&mut root);
    }
    aggregate::aggregate_hierarchy(&mut root, trace_id)?;
    // Child sets changed; self-times must be recomputed on the display tree.
    timing::compute_self_times(&mut root);
    debug!(trace_id, spans = built.summary.span_count, "trace analyzed");

    Ok((
        TraceReport {
            trace_id: built.trace_id,
            root,
            summary: built.summary,
            skipped_spans: built.skipped_spans,
        },
        tables,
    ))
}

/// Analyze every collected trace, fanning out across the rayon pool.
///
/// Per-trace failures are collected, not fatal; the flat tables of the
/// successful traces are merged with an associative fold.
pub fn analyze_collected(
    traces: Vec<(String, Vec<SpanRecord>)>,
    cfg: &AnalyzeConfig,
) -> RunAnalysis {
    let normalizer = PathNormalizer::new();
    let outcomes: Vec<_> = traces
        .into_par_iter()
        .map(|(trace_id, spans)| {
            let outcome = analyze_trace(&trace_id, &spans, cfg, &normalizer);
            (trace_id, outcome)
        })
        .collect();

    let mut run = RunAnalysis::default();
    for (trace_id, outcome) in outcomes {
        match outcome {
            Ok((report, tables)) => {
                run.tables.merge(tables);
                run.reports.push(report);
            }
            Err(error) => {
                warn!(trace_id, %error, "trace failed to analyze");
                run.failures.push(TraceFailure { trace_id, error });
            }
        }
    }
    info!(
        traces = run.reports.len(),
        failures = run.failures.len(),
        spans = run.total_spans(),
        "analysis run complete"
    );
    run
}
