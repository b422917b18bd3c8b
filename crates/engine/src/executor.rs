// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Streaming Executor (`spec.md` §4.4): one bounded-queue task per
//! node, fan-out routing with copy-on-write branch copies, backpressure,
//! and the retry/error strategy table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use weave_core::{DataPacket, ErrorStrategy, Event, NodeState, PacketId, Payload, RunContext, Value};

use crate::constants::{
    DEFAULT_DEEP_COPY_THRESHOLD_BYTES, DEFAULT_ENQUEUE_TIMEOUT, DEFAULT_INPUT_POLL_TIMEOUT,
    DEFAULT_MAX_SHALLOW_BRANCHES, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE_PERIOD,
};
use crate::event_bus::EventBus;
use crate::graph::{Graph, ResolvedEdge};
use crate::metrics::MetricsCollector;

/// A packet routed to one node, tagged with the destination input port it
/// feeds. Each node owns a single input queue regardless of how many input
/// ports it declares; a multi-input node receives one `RoutedPacket` per
/// incoming edge and assembles them into a [`RunContext`] independently —
/// there is no cross-edge join or ordering guarantee (`spec.md` §5).
struct RoutedPacket {
    packet: DataPacket,
    dest_port: String,
}

/// Per-node runtime counters the executor updates after every invocation
/// and exposes to callers via [`ExecutorHandle::node_stats`].
#[derive(Default)]
pub struct NodeStats {
    pub executions: AtomicU64,
    pub errors: AtomicU64,
    pub retries: AtomicU64,
}

/// Tunable knobs for one executor run, defaulting to the constants in
/// [`crate::constants`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub queue_capacity: usize,
    pub input_poll_timeout: Duration,
    pub enqueue_timeout: Duration,
    pub shutdown_grace_period: Duration,
    pub deep_copy_threshold_bytes: usize,
    pub max_shallow_branches: usize,
    pub default_error_strategy: ErrorStrategy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            input_poll_timeout: DEFAULT_INPUT_POLL_TIMEOUT,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            shutdown_grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD,
            deep_copy_threshold_bytes: DEFAULT_DEEP_COPY_THRESHOLD_BYTES,
            max_shallow_branches: DEFAULT_MAX_SHALLOW_BRANCHES,
            default_error_strategy: ErrorStrategy::default(),
        }
    }
}

/// Shared, cloneable handle the caller uses to observe and stop a running
/// graph.
#[derive(Clone)]
pub struct ExecutorHandle {
    stop: CancellationToken,
    node_states: Arc<RwLock<HashMap<String, NodeState>>>,
    node_stats: Arc<HashMap<String, NodeStats>>,
    metrics: Arc<MetricsCollector>,
}

impl ExecutorHandle {
    /// Signals every node task to stop after its current invocation.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub async fn node_state(&self, node_id: &str) -> Option<NodeState> {
        self.node_states.read().await.get(node_id).copied()
    }

    pub async fn node_states(&self) -> HashMap<String, NodeState> {
        self.node_states.read().await.clone()
    }

    #[must_use]
    pub fn node_stats(&self, node_id: &str) -> Option<&NodeStats> {
        self.node_stats.get(node_id)
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

/// Why a node's per-node task loop exited.
#[derive(Debug)]
enum RunLoopOutcome {
    Stopped,
    SourceExhausted,
    CircuitBroken,
}

/// The result of one [`NodeTask::invoke_with_retry`] call.
///
/// `None` used to stand for both "circuit-broken, stop the loop" and
/// "restarted, resume the loop" — two opposite outcomes collapsed into one
/// value. `Restarted` is its own variant so a successful `restart` keeps
/// the per-node loop running for the next packet instead of falling
/// through to the same exit path as a fatal error.
enum InvokeResult {
    /// The invocation's own outcome, possibly a failed one under `Skip` or
    /// retry exhaustion.
    Outcome(weave_core::RunOutcome),
    /// `restart` cleaned up, re-initialized, and the triggering packet was
    /// dropped; the caller should resume its loop for the next packet.
    Restarted,
    /// The stop signal fired while retrying; the caller's loop must exit.
    Stopped,
    /// `circuit-break` applied, or a `restart` re-initialize failed; the
    /// caller's loop must exit and the node ends in `NodeState::Error`.
    CircuitBroken,
}

struct NodeRuntime {
    sender: mpsc::Sender<RoutedPacket>,
    output_ports: Vec<String>,
}

/// Owns a running graph's per-node tasks, queues, and shared handles.
/// Construct with [`Executor::spawn`]; the returned [`ExecutorHandle`] is
/// the caller's surface for stopping the run and reading stats.
pub struct Executor {
    handle: ExecutorHandle,
    bus: Arc<EventBus>,
    join_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Executor {
    /// Builds the per-node queues and spawns one task per node
    /// (`spec.md` §4.4: "one task per node"). Returns immediately; nodes
    /// start running as soon as their task is scheduled.
    #[must_use]
    pub fn spawn(graph: Graph, bus: Arc<EventBus>, config: ExecutorConfig) -> Self {
        let source_ids: std::collections::HashSet<String> =
            graph.source_nodes().into_iter().map(str::to_string).collect();
        let (nodes, edges) = graph.into_parts();
        let stop = CancellationToken::new();
        let metrics = Arc::new(MetricsCollector::new());

        let mut runtimes: IndexMap<String, NodeRuntime> = IndexMap::new();
        let mut receivers: HashMap<String, mpsc::Receiver<RoutedPacket>> = HashMap::new();
        for (id, node) in &nodes {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            runtimes.insert(
                id.clone(),
                NodeRuntime { sender: tx, output_ports: node.output_ports.iter().map(|p| p.name.clone()).collect() },
            );
            receivers.insert(id.clone(), rx);
        }

        let node_states: Arc<RwLock<HashMap<String, NodeState>>> = Arc::new(RwLock::new(
            nodes.keys().map(|id| (id.clone(), NodeState::Idle)).collect(),
        ));
        let node_stats: Arc<HashMap<String, NodeStats>> =
            Arc::new(nodes.keys().map(|id| (id.clone(), NodeStats::default())).collect());

        let edges_by_source: Arc<HashMap<String, Vec<ResolvedEdge>>> = {
            let mut map: HashMap<String, Vec<ResolvedEdge>> = HashMap::new();
            for edge in edges {
                map.entry(edge.from_node.clone()).or_default().push(edge);
            }
            Arc::new(map)
        };
        let runtimes = Arc::new(runtimes);

        let mut join_handles = Vec::with_capacity(nodes.len());
        let mut nodes = nodes;
        for (id, node) in nodes.drain(..) {
            let rx = receivers.remove(&id).expect("receiver present for every node");
            let source = source_ids.contains(&id);
            let task = NodeTask {
                node_id: id,
                plugin: Some(node.plugin),
                rx,
                stop: stop.clone(),
                bus: bus.clone(),
                metrics: metrics.clone(),
                node_states: node_states.clone(),
                node_stats: node_stats.clone(),
                runtimes: runtimes.clone(),
                edges_by_source: edges_by_source.clone(),
                config: config.clone(),
                source,
            };
            join_handles.push(tokio::spawn(task.run()));
        }

        bus.publish(Event::new("graph.start", "executor", serde_json::json!({})));

        let handle = ExecutorHandle { stop, node_states, node_stats, metrics };
        Self { handle, bus, join_handles }
    }

    #[must_use]
    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Signals stop and waits up to `grace_period` for every node task to
    /// finish; tasks still running past the grace period are abandoned
    /// rather than joined (`spec.md` §5 cancellation policy) — dropping the
    /// timed-out `join_all` future leaves them detached, not aborted,
    /// since a node's `cleanup()` may still be mid-flight.
    pub async fn shutdown(mut self, grace_period: Duration) {
        self.handle.stop();
        let handles = std::mem::take(&mut self.join_handles);
        if tokio::time::timeout(grace_period, futures::future::join_all(handles)).await.is_err() {
            tracing::warn!("graph shutdown exceeded grace period; abandoning remaining node tasks");
        }
        self.bus.publish(Event::new("graph.stop", "executor", serde_json::json!({})));
    }

    /// Awaits every node task to completion with no grace-period cutoff,
    /// used when every source has naturally exhausted.
    pub async fn join(self) {
        for handle in self.join_handles {
            let _ = handle.await;
        }
        self.bus.publish(Event::new("graph.stop", "executor", serde_json::json!({})));
    }
}

struct NodeTask {
    node_id: String,
    /// Holds the plugin between `run()`'s call to [`Option::take`] and the
    /// end of the task: taking it out of the `Option` (rather than moving
    /// the field itself) leaves every other field of `self` intact, so
    /// `self.bus`/`self.set_state(...)`/etc. stay borrowable for the rest
    /// of the method.
    plugin: Option<Box<dyn weave_core::Plugin>>,
    rx: mpsc::Receiver<RoutedPacket>,
    stop: CancellationToken,
    bus: Arc<EventBus>,
    metrics: Arc<MetricsCollector>,
    node_states: Arc<RwLock<HashMap<String, NodeState>>>,
    node_stats: Arc<HashMap<String, NodeStats>>,
    runtimes: Arc<IndexMap<String, NodeRuntime>>,
    edges_by_source: Arc<HashMap<String, Vec<ResolvedEdge>>>,
    config: ExecutorConfig,
    source: bool,
}

impl NodeTask {
    async fn run(mut self) {
        let node_id = self.node_id.clone();
        let mut plugin = self.plugin.take().expect("plugin present for the lifetime of the task");

        if let Err(err) = plugin.initialize().await {
            tracing::error!(node_id = %node_id, %err, "node initialize() failed");
            self.set_state(&node_id, NodeState::Error).await;
            self.bus.publish(Event::new(
                "node.init_error",
                node_id.clone(),
                serde_json::json!({ "message": err.to_string() }),
            ));
            return;
        }

        let strategy = self.config.default_error_strategy;
        let outcome = if self.source {
            self.run_source_loop(&mut plugin, strategy).await
        } else {
            self.run_interior_loop(&mut plugin, strategy).await
        };

        plugin.cleanup().await;
        // `Plugin::cleanup` is infallible by signature (returns `()`), so
        // only the `_ok` half of the named `node.cleanup_{ok,error}` pair
        // is ever reachable here.
        self.bus.publish(Event::new("node.cleanup_ok", node_id.clone(), serde_json::json!({})));

        let final_state = match outcome {
            RunLoopOutcome::Stopped => NodeState::Stopped,
            RunLoopOutcome::SourceExhausted => NodeState::Completed,
            RunLoopOutcome::CircuitBroken => NodeState::Error,
        };
        self.set_state(&node_id, final_state).await;
        self.bus.publish(Event::new(
            "node.state_changed",
            node_id,
            serde_json::json!({ "state": format!("{final_state:?}") }),
        ));
    }

    async fn set_state(&self, node_id: &str, state: NodeState) {
        self.node_states.write().await.insert(node_id.to_string(), state);
    }

    async fn run_source_loop(
        &mut self,
        plugin: &mut Box<dyn weave_core::Plugin>,
        strategy: ErrorStrategy,
    ) -> RunLoopOutcome {
        let node_id = self.node_id.clone();
        let mut packet_id: PacketId = 0;
        loop {
            if self.stop.is_cancelled() {
                return RunLoopOutcome::Stopped;
            }
            self.set_state(&node_id, NodeState::Running).await;
            let ctx = RunContext { node_id: node_id.clone(), inputs: HashMap::new(), packet_id };
            let outcome = self.invoke_with_retry(plugin, ctx, strategy).await;
            match outcome {
                InvokeResult::Outcome(outcome) if outcome.success => {
                    packet_id += 1;
                    self.route_outputs(&node_id, packet_id, outcome.outputs).await;
                },
                InvokeResult::Outcome(_) | InvokeResult::Restarted => {
                    // run() failed and every retry was exhausted (`Skip`
                    // semantics apply to a source the same as an interior
                    // node), or `restart` dropped the triggering packet and
                    // re-initialized: either way, drop this iteration and
                    // keep looping.
                },
                InvokeResult::Stopped => return RunLoopOutcome::Stopped,
                InvokeResult::CircuitBroken => return RunLoopOutcome::CircuitBroken,
            }
            // A source with nothing new to emit yet still must not busy-spin
            // (`spec.md` §9 open-question resolution): sleep between
            // iterations using the same cadence as the input-poll timeout.
            tokio::select! {
                () = tokio::time::sleep(self.config.input_poll_timeout) => {},
                () = self.stop.cancelled() => return RunLoopOutcome::Stopped,
            }
        }
    }

    async fn run_interior_loop(
        &mut self,
        plugin: &mut Box<dyn weave_core::Plugin>,
        strategy: ErrorStrategy,
    ) -> RunLoopOutcome {
        let node_id = self.node_id.clone();
        loop {
            let routed = tokio::select! {
                biased;
                () = self.stop.cancelled() => return RunLoopOutcome::Stopped,
                received = self.rx.recv() => received,
            };
            let Some(routed) = routed else {
                // Every upstream sender dropped: treat like source
                // exhaustion for this node.
                return RunLoopOutcome::SourceExhausted;
            };

            self.set_state(&node_id, NodeState::Running).await;
            let mut inputs = HashMap::new();
            inputs.insert(routed.dest_port.clone(), routed.packet.value.clone());
            let packet_id = routed.packet.packet_id;
            let ctx = RunContext { node_id: node_id.clone(), inputs, packet_id };

            let outcome = self.invoke_with_retry(plugin, ctx, strategy).await;
            match outcome {
                InvokeResult::Outcome(outcome) if outcome.success => {
                    self.route_outputs(&node_id, packet_id, outcome.outputs).await;
                },
                InvokeResult::Outcome(_) | InvokeResult::Restarted => {},
                InvokeResult::Stopped => return RunLoopOutcome::Stopped,
                InvokeResult::CircuitBroken => return RunLoopOutcome::CircuitBroken,
            }
            plugin.input_data_processed_hook(&routed.dest_port, packet_id);
        }
    }

    /// Drives `strategy`'s retry/backoff table around a single `run()`
    /// call, publishing the per-invocation `node.start`/`node.complete`/
    /// `node.error` lifecycle events named in `spec.md` §4.4/§6 around
    /// each attempt.
    async fn invoke_with_retry(
        &self,
        plugin: &mut Box<dyn weave_core::Plugin>,
        ctx: RunContext,
        strategy: ErrorStrategy,
    ) -> InvokeResult {
        let node_id = ctx.node_id.clone();
        let max_retries = match strategy {
            ErrorStrategy::Retry { max_retries, .. } => max_retries,
            _ => 0,
        };

        let mut attempt = 0;
        loop {
            // `RunContext` is not `Clone`; a retried attempt rebuilds its
            // inputs from the same source data rather than reusing `ctx`.
            let attempt_ctx = RunContext {
                node_id: ctx.node_id.clone(),
                inputs: ctx.inputs.clone(),
                packet_id: ctx.packet_id,
            };
            self.bus.publish(Event::new(
                "node.start",
                node_id.clone(),
                serde_json::json!({ "packet_id": ctx.packet_id, "attempt": attempt }),
            ));
            let started = Instant::now();
            let outcome = plugin.run(attempt_ctx).await;
            let elapsed = if outcome.execution_time.is_zero() { started.elapsed() } else { outcome.execution_time };
            self.metrics.record(&node_id, elapsed, outcome.success);
            if let Some(stats) = self.node_stats.get(&node_id) {
                stats.executions.fetch_add(1, Ordering::Relaxed);
                if !outcome.success {
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            if outcome.success {
                self.bus.publish(Event::new(
                    "node.complete",
                    node_id.clone(),
                    serde_json::json!({
                        "packet_id": ctx.packet_id,
                        "execution_time_ms": elapsed.as_secs_f64() * 1000.0,
                    }),
                ));
                self.record_frame(true);
                return InvokeResult::Outcome(outcome);
            }

            tracing::warn!(node_id = %node_id, attempt, error = ?outcome.error_message, "node run() failed");
            self.bus.publish(Event::new(
                "node.error",
                node_id.clone(),
                serde_json::json!({
                    "packet_id": ctx.packet_id,
                    "attempt": attempt,
                    "message": outcome.error_message,
                }),
            ));

            match strategy {
                ErrorStrategy::CircuitBreak => {
                    self.record_frame(false);
                    self.stop.cancel();
                    return InvokeResult::CircuitBroken;
                },
                ErrorStrategy::Skip => {
                    self.record_frame(false);
                    return InvokeResult::Outcome(outcome);
                },
                ErrorStrategy::Retry { .. } => {
                    if attempt >= max_retries {
                        self.record_frame(false);
                        return InvokeResult::Outcome(outcome);
                    }
                    if let Some(stats) = self.node_stats.get(&ctx.node_id) {
                        stats.retries.fetch_add(1, Ordering::Relaxed);
                    }
                    let delay = strategy.backoff_delay(attempt);
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {},
                        () = self.stop.cancelled() => return InvokeResult::Stopped,
                    }
                    attempt += 1;
                },
                ErrorStrategy::Restart => {
                    self.bus.publish(Event::new(
                        "node.restarting",
                        node_id.clone(),
                        serde_json::json!({ "message": outcome.error_message }),
                    ));
                    self.set_state(&node_id, NodeState::Restarting).await;
                    plugin.cleanup().await;
                    if let Err(err) = plugin.initialize().await {
                        tracing::error!(node_id = %node_id, %err, "restart re-initialize() failed");
                        self.record_frame(false);
                        return InvokeResult::CircuitBroken;
                    }
                    self.set_state(&node_id, NodeState::Idle).await;
                    self.record_frame(false);
                    return InvokeResult::Restarted;
                },
            }
        }
    }

    /// Feeds one frame's outcome into the graph-level rolling window and
    /// publishes `graph.frame_complete` (`spec.md` §4.6).
    fn record_frame(&self, succeeded: bool) {
        self.metrics.record_frame(succeeded);
        self.bus.publish(Event::new(
            "graph.frame_complete",
            "executor",
            serde_json::json!({ "success": succeeded }),
        ));
    }

    /// Routes a successful invocation's `outputs` to every downstream edge,
    /// applying the fan-out copy-on-write policy per destination
    /// (`spec.md` §4.3/§9): the first destination on a port receives the
    /// value directly (a cheap `Arc` clone); each additional destination
    /// gets [`Self::branch_copy`]'s policy-chosen copy.
    async fn route_outputs(&self, node_id: &str, packet_id: PacketId, outputs: HashMap<String, Value>) {
        let Some(edges) = self.edges_by_source.get(node_id) else { return };

        for (port, value) in outputs {
            let destinations: Vec<&ResolvedEdge> =
                edges.iter().filter(|e| e.from_port == port).collect();
            if destinations.is_empty() {
                continue;
            }

            let branch_count = destinations.len();
            if branch_count > 1 {
                self.bus.publish(Event::new(
                    "data.branch",
                    node_id.to_string(),
                    serde_json::json!({ "port": port, "branch_count": branch_count }),
                ));
            }

            for (index, edge) in destinations.into_iter().enumerate() {
                let branch_value = if index == 0 { value.clone() } else { self.branch_copy(&value, branch_count) };
                let packet = DataPacket {
                    packet_id,
                    timestamp: std::time::SystemTime::now(),
                    value: Arc::new(branch_value),
                    ref_count: branch_count,
                    metadata: HashMap::new(),
                };
                self.enqueue(edge, packet).await;
            }
        }
    }

    /// Decides deep-vs-shallow copy for a fan-out branch based on payload
    /// size and branch count (`spec.md` §9, thresholds in
    /// [`crate::constants`]). A shallow copy is just `value.clone()`
    /// (an `Arc` bump, except for plain-value `Value` variants where
    /// cloning is already cheap); a deep copy calls [`Payload::deep_clone`]
    /// so mutation in one branch cannot leak into another.
    fn branch_copy(&self, value: &Value, branch_count: usize) -> Value {
        let prefer_deep =
            value.size_hint() > self.config.deep_copy_threshold_bytes || branch_count > self.config.max_shallow_branches;
        if prefer_deep {
            value.deep_clone()
        } else {
            value.clone()
        }
    }

    /// Enqueues `packet` onto `edge`'s destination, retrying on backpressure
    /// up to `enqueue_timeout` via `Sender::reserve` so a timed-out attempt
    /// never silently drops the packet — the caller either gets a reserved
    /// slot or an explicit `queue.full` + stop check (`spec.md` §4.4
    /// backpressure policy).
    async fn enqueue(&self, edge: &ResolvedEdge, packet: DataPacket) {
        let Some(runtime) = self.runtimes.get(&edge.to_node) else { return };
        loop {
            if self.stop.is_cancelled() {
                return;
            }
            let reservation = tokio::time::timeout(self.config.enqueue_timeout, runtime.sender.reserve()).await;
            match reservation {
                Ok(Ok(permit)) => {
                    permit.send(RoutedPacket { packet, dest_port: edge.to_port.clone() });
                    return;
                },
                Ok(Err(_closed)) => return,
                Err(_timed_out) => {
                    self.bus.publish(Event::new(
                        "queue.full",
                        edge.to_node.clone(),
                        serde_json::json!({ "port": edge.to_port }),
                    ));
                },
            }
        }
    }
}
