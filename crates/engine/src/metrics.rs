// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Metrics Collector (`spec.md` §4.6): per-node and per-graph rolling
//! statistics, periodically republished on the event bus.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use weave_core::Event;

use crate::constants::{DEFAULT_METRICS_REPUBLISH_INTERVAL, DEFAULT_METRICS_WINDOW};
use crate::event_bus::EventBus;

/// A snapshot of one node's rolling-window runtime statistics.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct NodeStatsSnapshot {
    pub executions: u64,
    pub errors: u64,
    pub avg_runtime_ms: f64,
    pub min_runtime_ms: f64,
    pub max_runtime_ms: f64,
}

struct NodeWindow {
    runtimes_ms: VecDeque<f64>,
    window_size: usize,
    executions: u64,
    errors: u64,
}

impl NodeWindow {
    fn new(window_size: usize) -> Self {
        Self { runtimes_ms: VecDeque::with_capacity(window_size), window_size, executions: 0, errors: 0 }
    }

    fn record(&mut self, runtime: Duration, succeeded: bool) {
        self.executions += 1;
        if !succeeded {
            self.errors += 1;
        }
        if self.runtimes_ms.len() == self.window_size {
            self.runtimes_ms.pop_front();
        }
        self.runtimes_ms.push_back(runtime.as_secs_f64() * 1000.0);
    }

    fn snapshot(&self) -> NodeStatsSnapshot {
        let count = self.runtimes_ms.len();
        let (sum, min, max) = self.runtimes_ms.iter().fold((0.0, f64::MAX, 0.0_f64), |(sum, min, max), &v| {
            (sum + v, min.min(v), max.max(v))
        });
        NodeStatsSnapshot {
            executions: self.executions,
            errors: self.errors,
            avg_runtime_ms: if count == 0 { 0.0 } else { sum / count as f64 },
            min_runtime_ms: if count == 0 { 0.0 } else { min },
            max_runtime_ms: max,
        }
    }
}

/// A snapshot of the whole graph's rolling frame statistics (`spec.md`
/// §4.6 "Per graph"/"Aggregate"). Since one [`MetricsCollector`] tracks
/// exactly one running graph, the "aggregate" figures the spec names
/// (mean FPS/error-rate across graphs) collapse to this graph's own
/// figures — there is only one graph to average over.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct GraphStatsSnapshot {
    pub total_frames: u64,
    pub successful_frames: u64,
    pub error_frames: u64,
    pub fps: f64,
    pub success_rate: f64,
    pub uptime_secs: f64,
    pub overall_fps: f64,
    pub overall_error_rate: f64,
}

struct GraphWindow {
    start_time: Instant,
    window_size: usize,
    total_frames: u64,
    successful_frames: u64,
    error_frames: u64,
    frame_times: VecDeque<Instant>,
}

impl GraphWindow {
    fn new(window_size: usize) -> Self {
        Self {
            start_time: Instant::now(),
            window_size,
            total_frames: 0,
            successful_frames: 0,
            error_frames: 0,
            frame_times: VecDeque::with_capacity(window_size),
        }
    }

    fn record(&mut self, succeeded: bool) {
        self.total_frames += 1;
        if succeeded {
            self.successful_frames += 1;
        } else {
            self.error_frames += 1;
        }
        if self.frame_times.len() == self.window_size {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(Instant::now());
    }

    fn snapshot(&self) -> GraphStatsSnapshot {
        let fps = match (self.frame_times.front(), self.frame_times.back()) {
            (Some(first), Some(last)) if self.frame_times.len() > 1 => {
                let span = last.duration_since(*first).as_secs_f64();
                if span > 0.0 { (self.frame_times.len() - 1) as f64 / span } else { 0.0 }
            },
            _ => 0.0,
        };
        let success_rate =
            if self.total_frames == 0 { 0.0 } else { self.successful_frames as f64 / self.total_frames as f64 };
        GraphStatsSnapshot {
            total_frames: self.total_frames,
            successful_frames: self.successful_frames,
            error_frames: self.error_frames,
            fps,
            success_rate,
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
            overall_fps: fps,
            overall_error_rate: 1.0 - success_rate,
        }
    }
}

/// Thread-safe accumulator the executor feeds after every `run()`
/// invocation, plus a periodic task that republishes aggregate stats on
/// the event bus (`spec.md` §4.6: "default 1 Hz").
pub struct MetricsCollector {
    window_size: usize,
    nodes: Mutex<HashMap<String, NodeWindow>>,
    graph: Mutex<GraphWindow>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(DEFAULT_METRICS_WINDOW)
    }

    #[must_use]
    pub fn with_window(window_size: usize) -> Self {
        Self { window_size, nodes: Mutex::new(HashMap::new()), graph: Mutex::new(GraphWindow::new(window_size)) }
    }

    /// Records one `run()` invocation's outcome for `node_id`.
    pub fn record(&self, node_id: &str, runtime: Duration, succeeded: bool) {
        let mut nodes = self.nodes.lock().expect("metrics mutex poisoned");
        nodes.entry(node_id.to_string()).or_insert_with(|| NodeWindow::new(self.window_size)).record(
            runtime,
            succeeded,
        );
    }

    /// Records one graph-level frame completion: one node finishing an
    /// invocation, successfully or not, after its retry/error strategy has
    /// resolved. Called directly by the executor alongside its
    /// `graph.frame_complete` publish (`spec.md` §4.6).
    pub fn record_frame(&self, succeeded: bool) {
        self.graph.lock().expect("metrics mutex poisoned").record(succeeded);
    }

    #[must_use]
    pub fn node_snapshot(&self, node_id: &str) -> Option<NodeStatsSnapshot> {
        self.nodes.lock().expect("metrics mutex poisoned").get(node_id).map(NodeWindow::snapshot)
    }

    #[must_use]
    pub fn graph_snapshot(&self) -> HashMap<String, NodeStatsSnapshot> {
        self.nodes
            .lock()
            .expect("metrics mutex poisoned")
            .iter()
            .map(|(id, window)| (id.clone(), window.snapshot()))
            .collect()
    }

    /// The graph-level rolling FPS/success-rate/uptime snapshot republished
    /// as `graph.throughput`.
    #[must_use]
    pub fn graph_stats(&self) -> GraphStatsSnapshot {
        self.graph.lock().expect("metrics mutex poisoned").snapshot()
    }

    /// Total executions summed across all nodes, for the `graph.metrics`
    /// aggregate event.
    #[must_use]
    pub fn total_executions(&self) -> u64 {
        self.nodes.lock().expect("metrics mutex poisoned").values().map(|w| w.executions).sum()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the periodic republish task. The returned handle aborts the task
/// when dropped, so the caller ties its lifetime to the running graph.
pub struct MetricsPublisher {
    handle: tokio::task::JoinHandle<()>,
}

impl MetricsPublisher {
    #[must_use]
    pub fn spawn(
        collector: std::sync::Arc<MetricsCollector>,
        bus: std::sync::Arc<EventBus>,
        graph_name: String,
    ) -> Self {
        Self::spawn_with_interval(collector, bus, graph_name, DEFAULT_METRICS_REPUBLISH_INTERVAL)
    }

    #[must_use]
    pub fn spawn_with_interval(
        collector: std::sync::Arc<MetricsCollector>,
        bus: std::sync::Arc<EventBus>,
        graph_name: String,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let snapshot = collector.graph_snapshot();
                for (node_id, stats) in &snapshot {
                    bus.publish(Event::new(
                        "node.performance",
                        node_id.clone(),
                        serde_json::json!(stats),
                    ));
                }
                bus.publish(Event::new(
                    "graph.throughput",
                    graph_name.clone(),
                    serde_json::json!(collector.graph_stats()),
                ));
                bus.publish(Event::new(
                    "graph.metrics",
                    graph_name.clone(),
                    serde_json::json!({
                        "total_executions": collector.total_executions(),
                        "node_count": snapshot.len(),
                    }),
                ));
            }
        });
        Self { handle }
    }
}

impl Drop for MetricsPublisher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_window_drops_oldest_sample_past_capacity() {
        let collector = MetricsCollector::with_window(2);
        collector.record("n1", Duration::from_millis(10), true);
        collector.record("n1", Duration::from_millis(20), true);
        collector.record("n1", Duration::from_millis(30), true);

        let snapshot = collector.node_snapshot("n1").expect("recorded node");
        assert_eq!(snapshot.executions, 3);
        // window holds only the last two samples: 20ms and 30ms
        assert!((snapshot.avg_runtime_ms - 25.0).abs() < f64::EPSILON);
        assert!((snapshot.min_runtime_ms - 20.0).abs() < f64::EPSILON);
        assert!((snapshot.max_runtime_ms - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn errors_are_counted_without_affecting_runtime_window() {
        let collector = MetricsCollector::new();
        collector.record("n1", Duration::from_millis(5), false);
        collector.record("n1", Duration::from_millis(5), true);

        let snapshot = collector.node_snapshot("n1").expect("recorded node");
        assert_eq!(snapshot.executions, 2);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn unknown_node_has_no_snapshot() {
        let collector = MetricsCollector::new();
        assert!(collector.node_snapshot("ghost").is_none());
    }

    #[test]
    fn graph_stats_track_frame_counts_and_success_rate() {
        let collector = MetricsCollector::new();
        collector.record_frame(true);
        collector.record_frame(true);
        collector.record_frame(false);

        let stats = collector.graph_stats();
        assert_eq!(stats.total_frames, 3);
        assert_eq!(stats.successful_frames, 2);
        assert_eq!(stats.error_frames, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert!((stats.overall_error_rate - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn graph_with_no_frames_reports_zero_fps_and_success_rate() {
        let collector = MetricsCollector::new();
        let stats = collector.graph_stats();
        assert_eq!(stats.total_frames, 0);
        assert!((stats.fps - 0.0).abs() < f64::EPSILON);
        assert!((stats.success_rate - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn publisher_emits_periodic_performance_events() {
        let collector = std::sync::Arc::new(MetricsCollector::new());
        collector.record("n1", Duration::from_millis(1), true);
        let bus = std::sync::Arc::new(EventBus::spawn());
        let mut rx = bus.subscribe("node.performance", 8);

        let _publisher = MetricsPublisher::spawn_with_interval(
            collector,
            bus,
            "demo".to_string(),
            Duration::from_millis(20),
        );

        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("publisher should tick within timeout")
            .expect("channel open");
        assert_eq!(event.topic, "node.performance");
    }

    #[tokio::test]
    async fn publisher_emits_periodic_throughput_events() {
        let collector = std::sync::Arc::new(MetricsCollector::new());
        collector.record_frame(true);
        let bus = std::sync::Arc::new(EventBus::spawn());
        let mut rx = bus.subscribe("graph.throughput", 8);

        let _publisher = MetricsPublisher::spawn_with_interval(
            collector,
            bus,
            "demo".to_string(),
            Duration::from_millis(20),
        );

        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("publisher should tick within timeout")
            .expect("channel open");
        assert_eq!(event.topic, "graph.throughput");
    }
}
