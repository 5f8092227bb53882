//! Markdown report rendering.

use std::collections::BTreeMap;
use std::fmt::Write;

use tracelens_core::time::format_ms;

use crate::result::{EndpointResult, RunResult, ServiceCallResult};

pub fn render_markdown(result: &RunResult) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Trace Endpoint Analysis Report");
    let _ = writeln!(md);

    let total_requests: usize = result.endpoints.iter().map(|e| e.stats.count).sum();
    let total_time: f64 = result.endpoints.iter().map(|e| e.stats.total_time_ms).sum();
    let by_service = group_endpoints(result);

    let _ = writeln!(md, "**Traces Analyzed:** {}  ", result.summary.traces);
    let _ = writeln!(md, "**Total Incoming Requests:** {total_requests}  ");
    let _ = writeln!(md, "**Total Time (Incoming):** {}  ", format_ms(total_time));
    let _ = writeln!(md, "**Unique Services:** {}  ", by_service.len());
    let _ = writeln!(
        md,
        "**Unique Endpoint-Parameter Combinations:** {}  ",
        result.endpoints.len()
    );
    let _ = writeln!(md);
    let _ = writeln!(md, "---");
    let _ = writeln!(md);

    let mut services: Vec<(&String, &Vec<&EndpointResult>)> = by_service.iter().collect();
    services.sort_by(|a, b| service_time(b.1).total_cmp(&service_time(a.1)));

    let _ = writeln!(md, "## Table of Contents - Incoming Requests by Service");
    let _ = writeln!(md);
    for (service, entries) in &services {
        let count: usize = entries.iter().map(|e| e.stats.count).sum();
        let _ = writeln!(
            md,
            "- [{service}](#{}) ({count} requests, {})",
            anchor(service),
            format_ms(service_time(entries))
        );
    }
    let _ = writeln!(md);
    let _ = writeln!(md, "---");
    let _ = writeln!(md);

    let _ = writeln!(md, "# Incoming Requests by Service");
    let _ = writeln!(md);
    let _ = writeln!(
        md,
        "*This section shows endpoints that each service receives (incoming HTTP requests).*  "
    );
    let _ = writeln!(md, "*Tables are sorted by Total Time (descending).*");
    let _ = writeln!(md);

    for (service, entries) in &services {
        let count: usize = entries.iter().map(|e| e.stats.count).sum();
        let _ = writeln!(md, "## {service}");
        let _ = writeln!(md);
        let _ = writeln!(md, "**Service Requests:** {count}  ");
        let _ = writeln!(md, "**Total Time:** {}  ", format_ms(service_time(entries)));
        let _ = writeln!(md, "**Unique Combinations:** {}  ", entries.len());
        let _ = writeln!(md);
        let _ = writeln!(md, "| Normalized Endpoint | Parameter Value | Count | Total Time |");
        let _ = writeln!(md, "|---------------------|-----------------|-------|------------|");
        for entry in entries.iter() {
            let _ = writeln!(
                md,
                "| {} {} | {} | {} | {} |",
                entry.method,
                entry.endpoint,
                param_cell(&entry.params),
                entry.stats.count,
                format_ms(entry.stats.total_time_ms)
            );
        }
        let _ = writeln!(md);
    }

    if !result.service_calls.is_empty() {
        let _ = writeln!(md, "---");
        let _ = writeln!(md);
        let _ = writeln!(md, "# Service-to-Service Calls (Outgoing)");
        let _ = writeln!(md);
        let _ = writeln!(
            md,
            "*This section shows outgoing HTTP calls from one service to another.*  "
        );
        let _ = writeln!(md, "*Tables are sorted by Total Time (descending).*");
        let _ = writeln!(md);

        let pairs = group_calls(result);
        let mut sorted_pairs: Vec<_> = pairs.iter().collect();
        sorted_pairs.sort_by(|a, b| pair_time(b.1).total_cmp(&pair_time(a.1)));

        for ((caller, callee), entries) in sorted_pairs {
            let count: usize = entries.iter().map(|e| e.stats.count).sum();
            let _ = writeln!(md, "## {caller} → {callee}");
            let _ = writeln!(md);
            let _ = writeln!(md, "**Total Calls:** {count}  ");
            let _ = writeln!(md, "**Total Time:** {}  ", format_ms(pair_time(entries)));
            let _ = writeln!(md, "**Unique Combinations:** {}  ", entries.len());
            let _ = writeln!(md);
            let _ = writeln!(md, "| Normalized Endpoint | Parameter Value | Count | Total Time |");
            let _ = writeln!(md, "|---------------------|-----------------|-------|------------|");
            for entry in entries {
                let _ = writeln!(
                    md,
                    "| {} {} | {} | {} | {} |",
                    entry.method,
                    entry.endpoint,
                    param_cell(&entry.params),
                    entry.stats.count,
                    format_ms(entry.stats.total_time_ms)
                );
            }
            let _ = writeln!(md);
        }
    }

    if !result.messaging.is_empty() {
        let _ = writeln!(md, "---");
        let _ = writeln!(md);
        let _ = writeln!(md, "# Messaging Operations");
        let _ = writeln!(md);
        let _ = writeln!(md, "| Service | Operation | Name | Details | Count | Total Time |");
        let _ = writeln!(md, "|---------|-----------|------|---------|-------|------------|");
        for entry in &result.messaging {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} |",
                entry.service,
                entry.operation,
                entry.name,
                truncate(&entry.details, 40),
                entry.stats.count,
                format_ms(entry.stats.total_time_ms)
            );
        }
        let _ = writeln!(md);
    }

    md
}

fn group_endpoints(result: &RunResult) -> BTreeMap<String, Vec<&EndpointResult>> {
    let mut map: BTreeMap<String, Vec<&EndpointResult>> = BTreeMap::new();
    for entry in &result.endpoints {
        map.entry(entry.service.clone()).or_default().push(entry);
    }
    map
}

fn group_calls(result: &RunResult) -> BTreeMap<(String, String), Vec<&ServiceCallResult>> {
    let mut map: BTreeMap<(String, String), Vec<&ServiceCallResult>> = BTreeMap::new();
    for entry in &result.service_calls {
        map.entry((entry.caller.clone(), entry.callee.clone()))
            .or_default()
            .push(entry);
    }
    map
}

fn service_time(entries: &[&EndpointResult]) -> f64 {
    entries.iter().map(|e| e.stats.total_time_ms).sum()
}

fn pair_time(entries: &[&ServiceCallResult]) -> f64 {
    entries.iter().map(|e| e.stats.total_time_ms).sum()
}

fn param_cell(params: &[String]) -> String {
    if params.is_empty() {
        "[no-params]".to_string()
    } else {
        truncate(&params.join(", "), 30)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn anchor(service: &str) -> String {
    service
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
