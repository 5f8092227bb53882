//! Self-time computation over a finished tree.

use tracelens_core::interval::wall_clock_ms;
use tracelens_core::model::node::Node;

/// Post-order self-time pass.
///
/// Children covered by valid timestamp intervals are charged at their merged
/// wall-clock duration so concurrent children are not double-counted; when no
/// child carries an interval the naive sum of child totals is the fallback.
/// Runs once after the raw build and again after the display rewrite, since
/// aggregation and mesh collapsing both change child sets.
pub fn compute_self_times(node: &mut Node) {
    for child in &mut node.children {
        compute_self_times(child);
    }

    if node.children.is_empty() {
        node.self_time_ms = node.total_time_ms;
        return;
    }

    let intervals: Vec<_> = node.children.iter().filter_map(Node::interval).collect();
    let covered = if intervals.is_empty() {
        node.children.iter().map(|c| c.total_time_ms).sum()
    } else {
        wall_clock_ms(&intervals)
    };
    node.self_time_ms = (node.total_time_ms - covered).max(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_core::model::span::SpanKind;

    fn node(start: u64, end: u64) -> Node {
        let mut n = Node::new("svc", SpanKind::Internal);
        n.start_unix_nano = Some(start);
        n.end_unix_nano = Some(end);
        n.total_time_ms = (end - start) as f64 / 1_000_000.0;
        n
    }

    #[test]
    fn leaf_self_time_equals_total() {
        let mut leaf = node(0, 5_000_000);
        compute_self_times(&mut leaf);
        assert_eq!(leaf.self_time_ms, 5.0);
    }

    #[test]
    fn overlapping_children_charge_wall_clock_once() {
        // Scenario A child layout: three children overlapping on [50, 110) ms.
        let mut parent = node(0, 150_000_000);
        parent.children = vec![
            node(10_000_000, 110_000_000),
            node(30_000_000, 110_000_000),
            node(50_000_000, 110_000_000),
        ];
        compute_self_times(&mut parent);
        // Children cover [10, 110) ms = 100 ms of wall clock.
        assert_eq!(parent.self_time_ms, 50.0);
    }

    #[test]
    fn sequential_children_consume_all_parent_time() {
        let mut parent = node(0, 150_000_000);
        parent.children = vec![
            node(0, 50_000_000),
            node(50_000_000, 100_000_000),
            node(100_000_000, 150_000_000),
        ];
        compute_self_times(&mut parent);
        assert_eq!(parent.self_time_ms, 0.0);
    }

    #[test]
    fn falls_back_to_child_totals_without_intervals() {
        let mut parent = node(0, 10_000_000);
        let mut child = Node::new("svc", SpanKind::Internal);
        child.total_time_ms = 4.0;
        parent.children = vec![child];
        compute_self_times(&mut parent);
        assert_eq!(parent.self_time_ms, 6.0);
    }

    #[test]
    fn self_time_is_clamped_at_zero() {
        let mut parent = node(0, 10_000_000);
        parent.children = vec![node(0, 50_000_000)];
        compute_self_times(&mut parent);
        assert_eq!(parent.self_time_ms, 0.0);
    }
}
