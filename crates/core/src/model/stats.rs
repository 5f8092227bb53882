use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::interval::{wall_clock_ms, Interval};

/// Key for the incoming-endpoint table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointKey {
    pub service: String,
    pub method: String,
    pub template: String,
    pub params: Vec<String>,
}

/// Key for the service-to-service call table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceCallKey {
    pub caller: String,
    pub callee: String,
    pub method: String,
    pub template: String,
    pub params: Vec<String>,
}

/// Key for the messaging-operation table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessagingKey {
    pub service: String,
    pub operation: String,
    pub name: String,
    pub details: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlatStats {
    pub count: usize,
    pub total_time_ms: f64,
    pub self_time_ms: f64,
    pub effective_time_ms: f64,
    /// Member-span windows accumulated during the per-trace walk; folded
    /// into `effective_time_ms` once merging is done.
    #[serde(skip)]
    pub intervals: Vec<Interval>,
    pub error_count: usize,
    /// Error message -> occurrence count; bounded in practice by the
    /// aggregator collapsing repeats into one synthesized message.
    pub error_messages: BTreeMap<String, usize>,
}

impl FlatStats {
    pub fn absorb(&mut self, other: &FlatStats) {
        self.count += other.count;
        self.total_time_ms += other.total_time_ms;
        self.self_time_ms += other.self_time_ms;
        self.effective_time_ms += other.effective_time_ms;
        self.intervals.extend_from_slice(&other.intervals);
        self.error_count += other.error_count;
        for (message, count) in &other.error_messages {
            *self.error_messages.entry(message.clone()).or_default() += count;
        }
    }

    /// Replace the accumulated windows with their wall-clock union. After
    /// this, cross-trace `absorb` sums the per-trace effective times.
    pub fn finalize_effective(&mut self) {
        self.effective_time_ms = wall_clock_ms(&self.intervals);
        self.intervals.clear();
    }

    pub fn record_error(&mut self, message: &str, count: usize) {
        self.error_count += count;
        *self.error_messages.entry(message.to_string()).or_default() += count;
    }

    /// Cumulative over effective time; 1.0 when nothing overlapped.
    pub fn parallelism_factor(&self) -> f64 {
        if self.effective_time_ms > 0.0 {
            self.total_time_ms / self.effective_time_ms
        } else {
            1.0
        }
    }
}

/// Run-level flat aggregate tables. Append/merge-only: per-trace tables are
/// produced independently and folded together, so cross-trace parallelism
/// needs no shared mutable state.
#[derive(Debug, Clone, Default)]
pub struct FlatTables {
    pub endpoints: BTreeMap<EndpointKey, FlatStats>,
    pub service_calls: BTreeMap<ServiceCallKey, FlatStats>,
    pub messaging: BTreeMap<MessagingKey, FlatStats>,
}

impl FlatTables {
    pub fn merge(&mut self, other: FlatTables) {
        for (key, stats) in other.endpoints {
            self.endpoints.entry(key).or_default().absorb(&stats);
        }
        for (key, stats) in other.service_calls {
            self.service_calls.entry(key).or_default().absorb(&stats);
        }
        for (key, stats) in other.messaging {
            self.messaging.entry(key).or_default().absorb(&stats);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty() && self.service_calls.is_empty() && self.messaging.is_empty()
    }
}
