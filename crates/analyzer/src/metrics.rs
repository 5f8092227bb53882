//! Flat metrics population: one walk over the raw hierarchy into the three
//! run-level tables, plus a second fuzzy-merge pass.

use std::collections::BTreeSet;

use tracelens_core::config::AnalyzeConfig;
use tracelens_core::model::node::Node;
use tracelens_core::model::span::SpanKind;
use tracelens_core::model::stats::{
    EndpointKey, FlatStats, FlatTables, MessagingKey, ServiceCallKey,
};
use tracelens_core::normalize::{absorbed_segments, pick_canonical, templates_match_fuzzy};

/// Walk the raw hierarchy once and emit the per-trace flat tables.
///
/// Runs before the display rewrite: the mesh filter elides every
/// same-service hop, and a normal outgoing CLIENT span sits under its own
/// service's SERVER span, so a post-rewrite walk would lose the whole
/// service-to-service table. Inclusion is decided per span from its kind
/// and its parent's kind instead; per merged row, effective time is the
/// wall-clock union of the member spans' windows.
pub fn populate_metrics(root: &Node, cfg: &AnalyzeConfig) -> FlatTables {
    let mut servers: BTreeSet<&str> = BTreeSet::new();
    root.walk(&mut |node| {
        if node.kind == SpanKind::Server {
            servers.insert(node.service.as_str());
        }
    });

    let mut tables = FlatTables::default();
    visit(root, None, &servers, cfg, &mut tables);
    fuzzy_merge(&mut tables);
    // Effective time is per merged row: params-distinct keys of the same
    // endpoint only come together in the fuzzy pass.
    for stats in tables.endpoints.values_mut() {
        stats.finalize_effective();
    }
    for stats in tables.service_calls.values_mut() {
        stats.finalize_effective();
    }
    for stats in tables.messaging.values_mut() {
        stats.finalize_effective();
    }
    tables
}

fn visit(
    node: &Node,
    parent_kind: Option<SpanKind>,
    servers: &BTreeSet<&str>,
    cfg: &AnalyzeConfig,
    tables: &mut FlatTables,
) {
    // HTTP nodes always carry a method (UNKNOWN at worst); non-HTTP
    // SERVER/CLIENT spans have no method-or-op at all.
    let is_http = !node.method_or_op.is_empty()
        && matches!(node.kind, SpanKind::Server | SpanKind::Client);

    match node.kind {
        SpanKind::Server if is_http => {
            // Without the mesh, a SERVER under another SERVER is a sidecar
            // duplicate; the strictest mode additionally requires a CLIENT
            // parent or the trace root.
            let include = if cfg.include_service_mesh {
                true
            } else if cfg.include_gateway_services {
                parent_kind != Some(SpanKind::Server)
            } else {
                matches!(parent_kind, Some(SpanKind::Client) | None)
            };
            if include {
                let key = endpoint_key(node);
                record(tables.endpoints.entry(key).or_default(), node, true);
            }
        }
        SpanKind::Client if is_http => {
            // A CLIENT span of a service never seen serving is a gateway's
            // incoming request.
            if cfg.include_gateway_services && !servers.contains(node.service.as_str()) {
                let key = endpoint_key(node);
                record(tables.endpoints.entry(key).or_default(), node, true);
            }
            if cfg.include_service_mesh || parent_kind != Some(SpanKind::Client) {
                let key = ServiceCallKey {
                    caller: node.service.clone(),
                    callee: node
                        .peer_service
                        .clone()
                        .unwrap_or_else(|| "unknown-service".to_string()),
                    method: node.method_or_op.clone(),
                    template: node.template.clone(),
                    params: node.params.clone(),
                };
                record(tables.service_calls.entry(key).or_default(), node, true);
            }
        }
        SpanKind::Producer | SpanKind::Consumer => {
            let key = MessagingKey {
                service: node.service.clone(),
                operation: node.method_or_op.clone(),
                name: node.template.clone(),
                details: node
                    .messaging_details
                    .clone()
                    .unwrap_or_else(|| "[no-details]".to_string()),
            };
            record(tables.messaging.entry(key).or_default(), node, false);
        }
        _ => {}
    }

    for child in &node.children {
        visit(child, Some(node.kind), servers, cfg, tables);
    }
}

fn endpoint_key(node: &Node) -> EndpointKey {
    EndpointKey {
        service: node.service.clone(),
        method: node.method_or_op.clone(),
        template: node.template.clone(),
        params: node.params.clone(),
    }
}

fn record(stats: &mut FlatStats, node: &Node, with_self_time: bool) {
    stats.count += node.count;
    stats.total_time_ms += node.total_time_ms;
    if with_self_time {
        stats.self_time_ms += node.self_time_ms;
    }
    if let Some(window) = node.interval() {
        stats.intervals.push(window);
    }
    if node.error_count > 0
        && let Some(message) = &node.error_message
    {
        stats.record_error(message, node.error_count);
    }
}

/// Entries for the same endpoint can be populated at different pipeline
/// points (route template on one side, raw URL on the other) and diverge
/// before normalization. Merge fuzzily-equal templates per
/// key-minus-template-and-params, keeping the more parameterized template;
/// concrete segments displaced by its placeholders join the unioned params.
fn fuzzy_merge(tables: &mut FlatTables) {
    let endpoints = std::mem::take(&mut tables.endpoints);
    let mut merged: Vec<(EndpointKey, FlatStats)> = Vec::with_capacity(endpoints.len());
    for (key, stats) in endpoints {
        match merged.iter_mut().position(|(existing, _)| {
            existing.service == key.service
                && existing.method == key.method
                && templates_match_fuzzy(&existing.template, &key.template)
        }) {
            Some(idx) => {
                let (existing, existing_stats) = &mut merged[idx];
                let canonical =
                    pick_canonical(&existing.template, &key.template).to_string();
                existing.params = merged_params(
                    &canonical,
                    (existing.template.as_str(), existing.params.as_slice()),
                    (key.template.as_str(), key.params.as_slice()),
                );
                existing.template = canonical;
                existing_stats.absorb(&stats);
            }
            None => merged.push((key, stats)),
        }
    }
    tables.endpoints = merged.into_iter().collect();

    let calls = std::mem::take(&mut tables.service_calls);
    let mut merged: Vec<(ServiceCallKey, FlatStats)> = Vec::with_capacity(calls.len());
    for (key, stats) in calls {
        match merged.iter_mut().position(|(existing, _)| {
            existing.caller == key.caller
                && existing.callee == key.callee
                && existing.method == key.method
                && templates_match_fuzzy(&existing.template, &key.template)
        }) {
            Some(idx) => {
                let (existing, existing_stats) = &mut merged[idx];
                let canonical =
                    pick_canonical(&existing.template, &key.template).to_string();
                existing.params = merged_params(
                    &canonical,
                    (existing.template.as_str(), existing.params.as_slice()),
                    (key.template.as_str(), key.params.as_slice()),
                );
                existing.template = canonical;
                existing_stats.absorb(&stats);
            }
            None => merged.push((key, stats)),
        }
    }
    tables.service_calls = merged.into_iter().collect();
}

/// Union of both sides' params plus the concrete segments each template
/// loses to a placeholder in the canonical one, sorted for determinism.
fn merged_params(
    canonical: &str,
    a: (&str, &[String]),
    b: (&str, &[String]),
) -> Vec<String> {
    let mut set: BTreeSet<String> = a.1.iter().chain(b.1.iter()).cloned().collect();
    set.extend(absorbed_segments(canonical, a.0));
    set.extend(absorbed_segments(canonical, b.0));
    set.into_iter().collect()
}
