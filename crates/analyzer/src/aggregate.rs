//! Sibling aggregation: group structurally-equivalent repeated calls into
//! one aggregate node, attribute real (vs inherited) parallelism, and keep
//! the output in chronological arrival order.

use std::collections::BTreeSet;

use tracing::debug;

use tracelens_core::error::{Result, TracelensError};
use tracelens_core::interval::{overlaps, wall_clock_ms};
use tracelens_core::model::node::Node;
use tracelens_core::normalize::{
    absorbed_segments, pick_canonical, placeholder_count, templates_match_fuzzy,
};

use crate::extract::render_display;

/// Overlap this shallow is scheduling noise, not fan-out.
const PARALLELISM_NOISE_THRESHOLD: f64 = 1.05;

/// Rewrite the tree below `root` into the aggregated display hierarchy.
pub fn aggregate_hierarchy(root: &mut Node, trace_id: &str) -> Result<()> {
    let parent_count = root.count;
    aggregate_level(root, parent_count, true, trace_id)
}

struct Group {
    first_arrival: usize,
    template: String,
    params: BTreeSet<String>,
    members: Vec<Node>,
}

fn aggregate_level(
    parent: &mut Node,
    parent_count: usize,
    is_root_level: bool,
    trace_id: &str,
) -> Result<()> {
    if parent.children.is_empty() {
        return Ok(());
    }

    // Arrival indices are fixed before the sort; groups are emitted in
    // first-arrival order so the output stays chronological.
    let mut indexed: Vec<(usize, Node)> =
        std::mem::take(&mut parent.children).into_iter().enumerate().collect();
    // Most-parameterized first, so the canonical template of each group is
    // settled by its first member whenever possible.
    indexed.sort_by_key(|(_, node)| std::cmp::Reverse(placeholder_count(&node.template)));

    let mut groups: Vec<Group> = Vec::new();
    for (arrival, node) in indexed {
        let slot = groups.iter().position(|g| {
            let first = &g.members[0];
            first.service == node.service
                && first.method_or_op == node.method_or_op
                && first.kind == node.kind
                && (g.template == node.template
                    || templates_match_fuzzy(&g.template, &node.template))
        });
        match slot {
            Some(idx) => {
                let group = &mut groups[idx];
                if group.template != node.template {
                    let canonical =
                        pick_canonical(&group.template, &node.template).to_string();
                    if canonical == group.template {
                        group.params.extend(absorbed_segments(&canonical, &node.template));
                    } else {
                        group.params.extend(absorbed_segments(&canonical, &group.template));
                        group.template = canonical;
                    }
                }
                group.params.extend(node.params.iter().cloned());
                group.first_arrival = group.first_arrival.min(arrival);
                group.members.push(node);
            }
            None => groups.push(Group {
                first_arrival: arrival,
                template: node.template.clone(),
                params: node.params.iter().cloned().collect(),
                members: vec![node],
            }),
        }
    }
    groups.sort_by_key(|g| g.first_arrival);

    for mut group in groups {
        let emitted = if group.members.len() > 1 {
            build_aggregate(group, parent, parent_count, is_root_level, trace_id)?
        } else {
            let mut node = group.members.swap_remove(0);
            check_count_invariant(node.count, parent_count, is_root_level, trace_id)?;
            let count = node.count;
            aggregate_level(&mut node, count, false, trace_id)?;
            node
        };
        parent.children.push(emitted);
    }

    if is_root_level {
        flag_parallel_siblings(&mut parent.children);
    }
    Ok(())
}

fn check_count_invariant(
    count: usize,
    parent_count: usize,
    is_root_level: bool,
    trace_id: &str,
) -> Result<()> {
    if !is_root_level && count < parent_count {
        return Err(TracelensError::InvariantViolation {
            trace_id: trace_id.to_string(),
            count,
            parent_count,
        });
    }
    Ok(())
}

fn build_aggregate(
    group: Group,
    parent: &mut Node,
    parent_count: usize,
    is_root_level: bool,
    trace_id: &str,
) -> Result<Node> {
    let members = group.members;
    let count: usize = members.iter().map(|m| m.count).sum();
    check_count_invariant(count, parent_count, is_root_level, trace_id)?;

    let total_time_ms: f64 = members.iter().map(|m| m.total_time_ms).sum();
    let self_time_ms: f64 = members.iter().map(|m| m.self_time_ms).sum();
    let intervals: Vec<_> = members.iter().filter_map(Node::interval).collect();

    let first = &members[0];
    let mut agg = Node::new(first.service.clone(), first.kind);
    agg.method_or_op = first.method_or_op.clone();
    agg.template = group.template;
    agg.params = group.params.into_iter().collect();
    agg.display = render_display(agg.kind, &agg.method_or_op, &agg.template, &[]);
    agg.peer_service = first.peer_service.clone();
    agg.messaging_details = first.messaging_details.clone();
    agg.count = count;
    agg.total_time_ms = total_time_ms;
    agg.self_time_ms = self_time_ms;
    agg.start_unix_nano = members.iter().filter_map(|m| m.start_unix_nano).min();
    agg.end_unix_nano = members.iter().filter_map(|m| m.end_unix_nano).max();

    agg.error_count = members.iter().map(|m| m.error_count).sum();
    agg.is_error = members.iter().any(|m| m.is_error);
    if agg.is_error {
        let messages: BTreeSet<&str> = members
            .iter()
            .filter(|m| m.is_error)
            .filter_map(|m| m.error_message.as_deref())
            .collect();
        agg.error_message = match messages.len() {
            1 => messages.iter().next().map(|m| m.to_string()),
            _ => Some(format!("Multiple errors ({}/{count})", agg.error_count)),
        };
    }
    let statuses: BTreeSet<u16> = members.iter().filter_map(|m| m.http_status).collect();
    if statuses.len() == 1 {
        agg.http_status = statuses.into_iter().next();
    }

    // Genuine fan-out: this level issued more calls than its parent was
    // itself called. Equal counts are repetition inherited from the parent,
    // and overlap there must not be claimed as new concurrency.
    if (is_root_level || count > parent_count) && intervals.len() >= 2 {
        let wall = wall_clock_ms(&intervals);
        if wall > 0.0 {
            let factor = round2(total_time_ms / wall);
            if factor > PARALLELISM_NOISE_THRESHOLD {
                agg.parallelism_factor = factor;
                agg.effective_time_ms = Some(wall);
                parent.has_parallel_children = true;
            } else {
                debug!(trace_id, factor, "overlap under noise threshold, not flagged");
            }
        }
    }

    agg.children = members.into_iter().flat_map(|m| m.children).collect();
    aggregate_level(&mut agg, count, false, trace_id)?;
    Ok(agg)
}

/// Root level only: distinct non-aggregated children running concurrently
/// are flagged pairwise. At depth, aggregated repeated-sequential calls carry
/// merged timestamps that overlap misleadingly, so this stays shallow.
fn flag_parallel_siblings(children: &mut [Node]) {
    let intervals: Vec<_> = children
        .iter()
        .map(|c| if c.is_aggregated() { None } else { c.interval() })
        .collect();
    for i in 0..children.len() {
        for j in (i + 1)..children.len() {
            if let (Some(a), Some(b)) = (intervals[i], intervals[j])
                && overlaps(a, b)
            {
                children[i].parallel_sibling = true;
                children[j].parallel_sibling = true;
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
