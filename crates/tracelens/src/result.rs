//! Structured run result: the JSON shape printed by `--json` and stored in
//! share snapshots.

use serde::Serialize;

use tracelens_analyzer::RunAnalysis;
use tracelens_core::model::stats::FlatStats;

/// Above this the cumulative/effective ratio is worth surfacing.
const DISPLAY_PARALLELISM_THRESHOLD: f64 = 1.15;

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub summary: RunSummary,
    pub endpoints: Vec<EndpointResult>,
    pub service_calls: Vec<ServiceCallResult>,
    pub messaging: Vec<MessagingResult>,
    pub failures: Vec<FailureResult>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub traces: usize,
    pub failed_traces: usize,
    pub spans: usize,
    pub skipped_spans: usize,
    pub dropped_spans: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResult {
    pub count: usize,
    pub total_time_ms: f64,
    pub self_time_ms: f64,
    pub effective_time_ms: f64,
    pub parallelism_factor: f64,
    pub has_parallelism: bool,
    pub error_count: usize,
    pub error_messages: Vec<String>,
}

impl StatsResult {
    fn from_stats(stats: &FlatStats) -> Self {
        let factor = stats.parallelism_factor();
        Self {
            count: stats.count,
            total_time_ms: stats.total_time_ms,
            self_time_ms: stats.self_time_ms,
            effective_time_ms: stats.effective_time_ms,
            parallelism_factor: factor,
            has_parallelism: factor > DISPLAY_PARALLELISM_THRESHOLD && stats.count > 1,
            error_count: stats.error_count,
            error_messages: stats.error_messages.keys().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndpointResult {
    pub service: String,
    pub method: String,
    pub endpoint: String,
    pub params: Vec<String>,
    #[serde(flatten)]
    pub stats: StatsResult,
}

#[derive(Debug, Serialize)]
pub struct ServiceCallResult {
    pub caller: String,
    pub callee: String,
    pub method: String,
    pub endpoint: String,
    pub params: Vec<String>,
    #[serde(flatten)]
    pub stats: StatsResult,
}

#[derive(Debug, Serialize)]
pub struct MessagingResult {
    pub service: String,
    pub operation: String,
    pub name: String,
    pub details: String,
    #[serde(flatten)]
    pub stats: StatsResult,
}

#[derive(Debug, Serialize)]
pub struct FailureResult {
    pub trace_id: String,
    pub error: String,
}

impl RunResult {
    /// Flatten a finished run, every table sorted by total time descending.
    pub fn build(run: &RunAnalysis, dropped_spans: usize) -> Self {
        let mut endpoints: Vec<EndpointResult> = run
            .tables
            .endpoints
            .iter()
            .map(|(key, stats)| EndpointResult {
                service: key.service.clone(),
                method: key.method.clone(),
                endpoint: key.template.clone(),
                params: key.params.clone(),
                stats: StatsResult::from_stats(stats),
            })
            .collect();
        endpoints.sort_by(|a, b| b.stats.total_time_ms.total_cmp(&a.stats.total_time_ms));

        let mut service_calls: Vec<ServiceCallResult> = run
            .tables
            .service_calls
            .iter()
            .map(|(key, stats)| ServiceCallResult {
                caller: key.caller.clone(),
                callee: key.callee.clone(),
                method: key.method.clone(),
                endpoint: key.template.clone(),
                params: key.params.clone(),
                stats: StatsResult::from_stats(stats),
            })
            .collect();
        service_calls.sort_by(|a, b| b.stats.total_time_ms.total_cmp(&a.stats.total_time_ms));

        let mut messaging: Vec<MessagingResult> = run
            .tables
            .messaging
            .iter()
            .map(|(key, stats)| MessagingResult {
                service: key.service.clone(),
                operation: key.operation.clone(),
                name: key.name.clone(),
                details: key.details.clone(),
                stats: StatsResult::from_stats(stats),
            })
            .collect();
        messaging.sort_by(|a, b| b.stats.total_time_ms.total_cmp(&a.stats.total_time_ms));

        Self {
            summary: RunSummary {
                traces: run.reports.len(),
                failed_traces: run.failures.len(),
                spans: run.total_spans(),
                skipped_spans: run.reports.iter().map(|r| r.skipped_spans).sum(),
                dropped_spans,
            },
            endpoints,
            service_calls,
            messaging,
            failures: run
                .failures
                .iter()
                .map(|f| FailureResult {
                    trace_id: f.trace_id.clone(),
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}
