//! Human terminal summary.

use owo_colors::OwoColorize;

use tracelens_core::time::format_ms;

use crate::result::RunResult;

pub fn print_run_summary(result: &RunResult) {
    println!("{}", "=== Summary Statistics ===".bold());
    println!(
        "Traces analyzed: {} ({} failed)",
        result.summary.traces,
        if result.summary.failed_traces > 0 {
            result.summary.failed_traces.red().to_string()
        } else {
            result.summary.failed_traces.to_string()
        }
    );
    println!(
        "Spans: {} ({} skipped, {} dropped)",
        result.summary.spans, result.summary.skipped_spans, result.summary.dropped_spans
    );

    let total_requests: usize = result.endpoints.iter().map(|e| e.stats.count).sum();
    let total_time: f64 = result.endpoints.iter().map(|e| e.stats.total_time_ms).sum();
    println!("Total incoming requests: {total_requests}");
    println!("Total time (incoming): {}", format_ms(total_time));

    if !result.service_calls.is_empty() {
        println!();
        println!("{}", "=== Top Service Pair Connections ===".bold());
        let mut pairs: std::collections::BTreeMap<(String, String), (usize, f64)> =
            std::collections::BTreeMap::new();
        for call in &result.service_calls {
            let entry = pairs
                .entry((call.caller.clone(), call.callee.clone()))
                .or_default();
            entry.0 += call.stats.count;
            entry.1 += call.stats.total_time_ms;
        }
        let mut sorted: Vec<_> = pairs.into_iter().collect();
        sorted.sort_by(|a, b| b.1.1.total_cmp(&a.1.1));
        for ((caller, callee), (count, time_ms)) in sorted.into_iter().take(10) {
            println!(
                "{:>12} ({count:4} calls)  {} → {}",
                format_ms(time_ms),
                caller.cyan(),
                callee.cyan()
            );
        }
    }

    println!();
    println!(
        "{}",
        "=== Top 10 Slowest Incoming Requests (by Total Time) ===".bold()
    );
    for endpoint in result.endpoints.iter().take(10) {
        let flags = if endpoint.stats.has_parallelism {
            format!(" ||x{:.2}", endpoint.stats.parallelism_factor)
                .yellow()
                .to_string()
        } else {
            String::new()
        };
        let errors = if endpoint.stats.error_count > 0 {
            format!(" {} errors", endpoint.stats.error_count)
                .red()
                .to_string()
        } else {
            String::new()
        };
        println!(
            "{:>12} ({:4}x)  [{}] {} {}{flags}{errors}",
            format_ms(endpoint.stats.total_time_ms),
            endpoint.stats.count,
            endpoint.service.cyan(),
            endpoint.method,
            endpoint.endpoint
        );
    }

    if !result.failures.is_empty() {
        println!();
        println!("{}", "=== Failed Traces ===".red().bold());
        for failure in &result.failures {
            println!("{}: {}", failure.trace_id, failure.error);
        }
    }
}
