//! Interval merging for wall-clock-correct timing under concurrency.
//!
//! Spans that overlap in time must not have their durations double-counted:
//! the effective (wall-clock) duration of a set of `[start, end)` intervals
//! is the total length of their union.

use crate::time::nanos_to_ms;

/// Half-open `[start, end)` interval in unix nanoseconds.
pub type Interval = (u64, u64);

/// Merge overlapping intervals into a sorted, disjoint set.
///
/// Degenerate entries (`start >= end`) are dropped. Adjacent intervals that
/// touch (`start == running end`) are coalesced, which keeps the operation
/// idempotent.
pub fn merge_intervals(intervals: &[Interval]) -> Vec<Interval> {
    let mut valid: Vec<Interval> = intervals.iter().copied().filter(|(s, e)| s < e).collect();
    if valid.is_empty() {
        return Vec::new();
    }
    valid.sort_unstable_by_key(|(s, _)| *s);

    let mut merged = Vec::with_capacity(valid.len());
    let (mut cur_start, mut cur_end) = valid[0];
    for (start, end) in valid.into_iter().skip(1) {
        if start <= cur_end {
            cur_end = cur_end.max(end);
        } else {
            merged.push((cur_start, cur_end));
            (cur_start, cur_end) = (start, end);
        }
    }
    merged.push((cur_start, cur_end));
    merged
}

/// Total length of the union of the given intervals, in nanoseconds.
pub fn wall_clock_nanos(intervals: &[Interval]) -> u64 {
    merge_intervals(intervals).iter().map(|(s, e)| e - s).sum()
}

pub fn wall_clock_ms(intervals: &[Interval]) -> f64 {
    nanos_to_ms(wall_clock_nanos(intervals))
}

/// Whether two half-open intervals share any instant.
pub fn overlaps(a: Interval, b: Interval) -> bool {
    a.0 < b.1 && b.0 < a.1
}
