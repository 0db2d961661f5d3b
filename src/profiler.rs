//! Optional per-node performance instrumentation.
//!
//! The evaluator calls `start`/`end` around each node's own evaluation (not
//! its dependencies) and `record_hit`/`record_miss` at cache-check time.
//! `NoopProfiler` keeps the hooks free when profiling is off.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Hooks invoked by the evaluator. All methods default to no-ops.
pub trait Profiler {
    fn start(&mut self, _node: &str) {}
    fn end(&mut self, _node: &str) {}
    fn record_hit(&mut self, _node: &str) {}
    fn record_miss(&mut self, _node: &str) {}
}

/// The zero-overhead profiler used when no instrumentation was requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {}

/// Collects per-node timings and cache counters across evaluations.
#[derive(Debug, Default)]
pub struct PerformanceProfiler {
    node_times: HashMap<String, Duration>,
    node_calls: HashMap<String, u64>,
    cache_hits: HashMap<String, u64>,
    cache_misses: HashMap<String, u64>,
    started: HashMap<String, Instant>,
}

impl Profiler for PerformanceProfiler {
    fn start(&mut self, node: &str) {
        self.started.insert(node.to_owned(), Instant::now());
    }

    fn end(&mut self, node: &str) {
        if let Some(started) = self.started.remove(node) {
            *self.node_times.entry(node.to_owned()).or_default() += started.elapsed();
            *self.node_calls.entry(node.to_owned()).or_default() += 1;
        }
    }

    fn record_hit(&mut self, node: &str) {
        *self.cache_hits.entry(node.to_owned()).or_default() += 1;
    }

    fn record_miss(&mut self, node: &str) {
        *self.cache_misses.entry(node.to_owned()).or_default() += 1;
    }
}

impl PerformanceProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self, node: &str) -> u64 {
        self.cache_hits.get(node).copied().unwrap_or(0)
    }

    pub fn misses(&self, node: &str) -> u64 {
        self.cache_misses.get(node).copied().unwrap_or(0)
    }

    pub fn calls(&self, node: &str) -> u64 {
        self.node_calls.get(node).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.node_times.clear();
        self.node_calls.clear();
        self.cache_hits.clear();
        self.cache_misses.clear();
        self.started.clear();
    }

    /// Aggregates the counters into a report, nodes sorted by time spent.
    pub fn report(&self) -> ProfileReport {
        let mut nodes: Vec<NodeStats> = self
            .node_calls
            .keys()
            .chain(self.cache_hits.keys())
            .chain(self.cache_misses.keys())
            .map(String::as_str)
            .collect::<std::collections::BTreeSet<&str>>()
            .into_iter()
            .map(|name| {
                let time = self.node_times.get(name).copied().unwrap_or_default();
                let calls = self.calls(name);
                let hits = self.hits(name);
                let misses = self.misses(name);
                let accesses = hits + misses;
                NodeStats {
                    name: name.to_owned(),
                    time_ms: time.as_secs_f64() * 1000.0,
                    calls,
                    avg_time_ms: if calls > 0 {
                        time.as_secs_f64() * 1000.0 / calls as f64
                    } else {
                        0.0
                    },
                    cache_hits: hits,
                    cache_misses: misses,
                    hit_rate: if accesses > 0 {
                        hits as f64 / accesses as f64 * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        nodes.sort_by(|a, b| b.time_ms.total_cmp(&a.time_ms));

        let total_hits: u64 = self.cache_hits.values().sum();
        let total_misses: u64 = self.cache_misses.values().sum();
        let total_accesses = total_hits + total_misses;

        ProfileReport {
            total_time_ms: self
                .node_times
                .values()
                .map(|d| d.as_secs_f64() * 1000.0)
                .sum(),
            total_calls: self.node_calls.values().sum(),
            total_cache_hits: total_hits,
            total_cache_misses: total_misses,
            hit_rate: if total_accesses > 0 {
                total_hits as f64 / total_accesses as f64 * 100.0
            } else {
                0.0
            },
            slowest_node: nodes.first().map(|n| n.name.clone()),
            most_called_node: nodes
                .iter()
                .max_by_key(|n| n.calls)
                .map(|n| n.name.clone()),
            nodes,
        }
    }
}

/// Aggregated counters for one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub name: String,
    pub time_ms: f64,
    pub calls: u64,
    pub avg_time_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
}

/// The full profiling picture for one or more evaluations.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub total_time_ms: f64,
    pub total_calls: u64,
    pub total_cache_hits: u64,
    pub total_cache_misses: u64,
    pub hit_rate: f64,
    pub slowest_node: Option<String>,
    pub most_called_node: Option<String>,
    pub nodes: Vec<NodeStats>,
}

impl ProfileReport {
    /// Renders the top-N slowest nodes as a fixed-width text table.
    pub fn render(&self, top_n: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Performance Report:");
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = writeln!(out, "Total time: {:.2}ms", self.total_time_ms);
        let _ = writeln!(out, "Total calls: {}", self.total_calls);
        let _ = writeln!(out, "Cache hit rate: {:.1}%", self.hit_rate);
        let _ = writeln!(out, "\nTop {top_n} slowest nodes:");
        let _ = writeln!(out, "{}", "-".repeat(80));
        for (i, node) in self.nodes.iter().take(top_n).enumerate() {
            let _ = writeln!(
                out,
                "{:2}. {:30}: {:8.3}ms ({:5} calls, {:6.3}ms avg, cache hit: {:5.1}%)",
                i + 1,
                node.name,
                node.time_ms,
                node.calls,
                node.avg_time_ms,
                node.hit_rate,
            );
        }
        let _ = writeln!(out, "{}", "=".repeat(80));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut profiler = PerformanceProfiler::new();
        profiler.record_miss("base");
        profiler.start("base");
        profiler.end("base");
        profiler.record_hit("base");
        profiler.record_hit("base");

        assert_eq!(profiler.misses("base"), 1);
        assert_eq!(profiler.hits("base"), 2);
        assert_eq!(profiler.calls("base"), 1);
    }

    #[test]
    fn test_end_without_start_is_ignored() {
        let mut profiler = PerformanceProfiler::new();
        profiler.end("phantom");
        assert_eq!(profiler.calls("phantom"), 0);
    }

    #[test]
    fn test_report_aggregates_and_sorts() {
        let mut profiler = PerformanceProfiler::new();
        for node in ["a", "b", "b"] {
            profiler.record_miss(node);
            profiler.start(node);
            profiler.end(node);
        }
        profiler.record_hit("a");

        let report = profiler.report();
        assert_eq!(report.total_calls, 3);
        assert_eq!(report.total_cache_hits, 1);
        assert_eq!(report.total_cache_misses, 3);
        assert_eq!(report.hit_rate, 25.0);
        assert_eq!(report.most_called_node.as_deref(), Some("b"));
        assert_eq!(report.nodes.len(), 2);

        let rendered = report.render(5);
        assert!(rendered.contains("Cache hit rate: 25.0%"), "{rendered}");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut profiler = PerformanceProfiler::new();
        profiler.record_hit("a");
        profiler.reset();
        assert_eq!(profiler.hits("a"), 0);
        assert_eq!(profiler.report().total_calls, 0);
    }
}
