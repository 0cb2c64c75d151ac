use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trellis_core::config::SchedulerConfig;
use trellis_core::error::{NodeExecutionError, Result, TrellisError};
use trellis_core::event::StreamEvent;
use trellis_core::types::{FailurePolicy, InputPart, MergedInput, NodeState, RunId, SkipCause};

use crate::aggregate::aggregate_status;
use crate::executor::{NodeExecutor, NodeOutcome};
use crate::graph::Graph;
use crate::multiplexer::{self, EventSink, EventStream};
use crate::run::{NodeRun, RunReport};

type NodeTaskResult = (usize, std::thread::Result<Result<NodeOutcome>>);

/// Executes a validated graph, once per call, against a single input.
#[derive(Clone)]
pub struct Scheduler {
    graph: Arc<Graph>,
    config: SchedulerConfig,
}

/// A run started with [`Scheduler::stream`].
pub struct RunHandle {
    pub run_id: RunId,
    events: EventStream,
    cancel: CancellationToken,
    task: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    /// Next event of the run, `None` after `GraphCompleted`.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop launching nodes and cancel the ones in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Hand the event stream to someone else. The run keeps going in the
    /// background and is cancelled if the stream is dropped.
    pub fn into_events(self) -> EventStream {
        self.events
    }

    /// Wait for the run to end. Events not yet received are discarded.
    pub async fn finish(mut self) -> Result<RunReport> {
        while self.events.recv().await.is_some() {}
        self.task
            .await
            .map_err(|e| TrellisError::RunTask(e.to_string()))?
    }
}

impl Scheduler {
    pub fn new(graph: Arc<Graph>, config: SchedulerConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start a run on a background task and return its event stream.
    pub fn stream(&self, task: impl Into<String>) -> RunHandle {
        let (sink, events) = multiplexer::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        let run_id = RunId::new();

        let scheduler = self.clone();
        let task = task.into();
        let token = cancel.clone();
        let id = run_id.clone();
        let handle = tokio::spawn(async move { scheduler.run(id, task, sink, token).await });

        RunHandle {
            run_id,
            events,
            cancel,
            task: handle,
        }
    }

    /// Execute the graph, publishing every event to `sink`.
    ///
    /// Node failures never surface here; they end up in the report and the
    /// final status. The only error is the consumer going away, in which case
    /// in-flight nodes are aborted and no `GraphCompleted` is sent.
    pub async fn run(
        &self,
        run_id: RunId,
        task: String,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let start = Instant::now();
        info!(
            run_id = %run_id,
            nodes = self.graph.len(),
            policy = ?self.config.failure_policy,
            "Graph run started"
        );

        let mut state = RunState::new(&self.graph, &self.config, run_id.clone(), task, sink, cancel, start);

        if let Err(e) = state.drive().await {
            error!(run_id = %run_id, error = %e, "Graph run aborted");
            state.abort().await;
            return Err(e);
        }

        let status = aggregate_status(self.config.failure_policy, &state.records);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(run_id = %run_id, %status, elapsed_ms, "Graph run complete");

        state.sink.completed(status).await?;

        Ok(RunReport {
            run_id,
            status,
            nodes: state.records,
            elapsed_ms,
        })
    }
}

/// Mutable state of one run. Only the scheduler task touches it; node tasks
/// communicate through the event sink and their join results.
struct RunState<'a> {
    graph: &'a Graph,
    config: &'a SchedulerConfig,
    run_id: RunId,
    task: String,
    sink: EventSink,
    cancel: CancellationToken,
    graph_deadline: Option<Instant>,
    records: Vec<NodeRun>,
    /// Unmet predecessor count per node.
    pending: Vec<usize>,
    /// Merged-input slots per node, one per predecessor in edge order.
    slots: Vec<Vec<Option<String>>>,
    ready: VecDeque<usize>,
    in_flight: JoinSet<NodeTaskResult>,
}

impl<'a> RunState<'a> {
    fn new(
        graph: &'a Graph,
        config: &'a SchedulerConfig,
        run_id: RunId,
        task: String,
        sink: EventSink,
        cancel: CancellationToken,
        start: Instant,
    ) -> Self {
        let records: Vec<NodeRun> = graph.nodes.iter().map(|n| NodeRun::new(n.id.clone())).collect();
        let pending = graph.nodes.iter().map(|n| n.predecessors.len()).collect();
        let slots = graph
            .nodes
            .iter()
            .map(|n| vec![None; n.predecessors.len()])
            .collect();

        let mut state = Self {
            graph,
            config,
            run_id,
            task,
            sink,
            cancel,
            graph_deadline: config.graph_timeout().map(|d| start + d),
            records,
            pending,
            slots,
            ready: VecDeque::new(),
            in_flight: JoinSet::new(),
        };

        for entry in &graph.entry_points {
            if let Some(i) = graph.index_of(entry.as_str()) {
                state.mark_ready(i);
            }
        }
        state
    }

    async fn drive(&mut self) -> Result<()> {
        let limit = match self.config.max_concurrency {
            0 => usize::MAX,
            n => n,
        };

        loop {
            while self.in_flight.len() < limit {
                let Some(i) = self.ready.pop_front() else {
                    break;
                };
                if self.cancel.is_cancelled() {
                    self.skip(i, SkipCause::Cancelled).await?;
                    self.skip_descendants(i, SkipCause::Cancelled).await?;
                } else {
                    self.launch(i);
                }
            }

            if self.in_flight.is_empty() {
                return Ok(());
            }

            tokio::select! {
                joined = self.in_flight.join_next() => match joined {
                    Some(Ok((i, Ok(result)))) => self.settle(i, result?).await?,
                    Some(Ok((i, Err(_)))) => self.settle_panicked(i).await?,
                    Some(Err(e)) => return Err(TrellisError::RunTask(e.to_string())),
                    None => {}
                },
                _ = self.sink.closed() => {
                    warn!(run_id = %self.run_id, "Event consumer disconnected");
                    return Err(TrellisError::StreamClosed);
                }
            }
        }
    }

    fn mark_ready(&mut self, i: usize) {
        self.records[i].transition(NodeState::Ready);
        self.ready.push_back(i);
    }

    fn launch(&mut self, i: usize) {
        let node = &self.graph.nodes[i];
        self.records[i].transition(NodeState::Running);

        let input = self.merged_input(i);
        let deadline = earliest(
            node.timeout
                .or_else(|| self.config.node_timeout())
                .map(|d| Instant::now() + d),
            self.graph_deadline,
        );

        debug!(run_id = %self.run_id, node = %node.id, inputs = input.parts.len(), "Launching node");

        let executor = NodeExecutor::new(node.id.clone(), node.worker.clone(), self.cancel.clone())
            .with_deadline(deadline);
        let sink = self.sink.for_node(node.id.clone());

        self.in_flight.spawn(async move {
            let result = AssertUnwindSafe(executor.run(input, sink)).catch_unwind().await;
            (i, result)
        });
    }

    fn merged_input(&self, i: usize) -> MergedInput {
        let node = &self.graph.nodes[i];
        let parts = node
            .predecessors
            .iter()
            .zip(&self.slots[i])
            .map(|(from, content)| InputPart {
                from: from.clone(),
                content: content.clone().unwrap_or_default(),
            })
            .collect();

        MergedInput {
            task: self.task.clone(),
            parts,
        }
    }

    /// Apply a finished node's outcome and release or prune its successors.
    async fn settle(&mut self, i: usize, outcome: NodeOutcome) -> Result<()> {
        let record = &mut self.records[i];
        record.output = outcome.output;
        record.elapsed_ms = outcome.elapsed_ms;

        let Some(error) = outcome.error else {
            record.transition(NodeState::Completed);
            let contribution = record.output.clone();
            self.release_successors(i, &contribution);
            return Ok(());
        };

        record.error = Some(error);
        record.transition(NodeState::Failed);
        let id = record.node.clone();

        if self.cancel.is_cancelled() {
            return self.skip_descendants(i, SkipCause::Cancelled).await;
        }

        match self.config.failure_policy {
            FailurePolicy::SkipDescendants => {
                self.skip_descendants(i, SkipCause::UpstreamFailed { node: id }).await
            }
            FailurePolicy::BestEffort => {
                self.release_successors(i, "");
                Ok(())
            }
        }
    }

    /// Close out a node whose task panicked outside the worker. The node is
    /// past `NodeStarted`, so it still owes the consumer a terminal event.
    async fn settle_panicked(&mut self, i: usize) -> Result<()> {
        let node = self.graph.nodes[i].id.clone();
        error!(run_id = %self.run_id, node = %node, "Node task panicked");

        let error = NodeExecutionError::Worker("worker panicked".into());
        self.sink
            .emit(StreamEvent::NodeFailed {
                node,
                output: String::new(),
                error: error.clone(),
            })
            .await?;

        let outcome = NodeOutcome {
            output: String::new(),
            error: Some(error),
            elapsed_ms: 0,
        };
        self.settle(i, outcome).await
    }

    fn release_successors(&mut self, i: usize, contribution: &str) {
        let graph = self.graph;
        let id = &graph.nodes[i].id;

        for succ in &graph.nodes[i].successors {
            let Some(j) = graph.index_of(succ.as_str()) else {
                continue;
            };
            if let Some(slot) = graph.nodes[j].input_slot(id) {
                self.slots[j][slot] = Some(contribution.to_string());
            }
            self.pending[j] = self.pending[j].saturating_sub(1);

            if self.pending[j] == 0 && self.records[j].state == NodeState::Blocked {
                self.mark_ready(j);
            }
        }
    }

    async fn skip_descendants(&mut self, i: usize, cause: SkipCause) -> Result<()> {
        let graph = self.graph;
        for desc in graph.descendants(graph.nodes[i].id.as_str()) {
            let Some(j) = graph.index_of(desc.as_str()) else {
                continue;
            };
            if self.records[j].state == NodeState::Blocked {
                self.skip(j, cause.clone()).await?;
            }
        }
        Ok(())
    }

    async fn skip(&mut self, i: usize, cause: SkipCause) -> Result<()> {
        let record = &mut self.records[i];
        warn!(run_id = %self.run_id, node = %record.node, %cause, "Skipping node");
        record.skip_cause = Some(cause.clone());
        record.transition(NodeState::Skipped);
        self.sink.skipped(record.node.clone(), cause).await
    }

    /// Cancel and reap every in-flight node.
    async fn abort(&mut self) {
        self.cancel.cancel();
        self.in_flight.shutdown().await;
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use trellis_core::traits::Worker;
    use trellis_core::types::{GraphRunStatus, NodeId};
    use trellis_test_utils::{
        assert_node_contract, ConcurrencyProbe, FailingWorker, PanicWorker, PendingWorker,
        ScriptedWorker,
    };

    use crate::builder::GraphBuilder;

    fn scripted(fragments: &[&str]) -> Arc<ScriptedWorker> {
        Arc::new(ScriptedWorker::new(fragments.iter().copied()))
    }

    async fn collect(handle: RunHandle) -> (Vec<StreamEvent>, RunReport) {
        let mut handle = handle;
        let mut events = Vec::new();
        while let Some(e) = handle.recv().await {
            events.push(e);
        }
        let report = handle.finish().await.unwrap();
        (events, report)
    }

    fn scheduler(builder: GraphBuilder, config: SchedulerConfig) -> Scheduler {
        Scheduler::new(Arc::new(builder.build().unwrap()), config)
    }

    #[tokio::test]
    async fn test_chain_passes_output_downstream() {
        let second = scripted(&["done"]);
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("first", scripted(&["al", "pha"]))
                .add_node("second", second.clone())
                .add_edge("first", "second"),
            SchedulerConfig::default(),
        );

        let (events, report) = collect(sched.stream("X")).await;
        assert_eq!(report.status, GraphRunStatus::Success);
        assert_node_contract(&events);

        let seen = second.inputs();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].task, "X");
        assert_eq!(seen[0].parts[0].from.as_str(), "first");
        assert_eq!(seen[0].parts[0].content, "alpha");
    }

    #[tokio::test]
    async fn test_state_history() {
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("a", scripted(&["1"]))
                .add_node("b", scripted(&["2"]))
                .add_edge("a", "b"),
            SchedulerConfig::default(),
        );
        let (_, report) = collect(sched.stream("X")).await;
        for run in &report.nodes {
            assert_eq!(
                run.history,
                vec![
                    NodeState::Blocked,
                    NodeState::Ready,
                    NodeState::Running,
                    NodeState::Completed
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_entry_nodes_run_concurrently() {
        let probe = ConcurrencyProbe::new();
        let worker = |name: &str| -> Arc<dyn Worker> {
            Arc::new(
                ScriptedWorker::new([name.to_string()])
                    .with_delay(Duration::from_millis(50))
                    .with_probe(probe.clone()),
            )
        };
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("a", worker("a"))
                .add_node("b", worker("b"))
                .add_node("c", worker("c")),
            SchedulerConfig::default(),
        );

        let (_, report) = collect(sched.stream("X")).await;
        assert_eq!(report.status, GraphRunStatus::Success);
        assert_eq!(probe.peak(), 3);
    }

    #[tokio::test]
    async fn test_max_concurrency_caps_running_nodes() {
        let probe = ConcurrencyProbe::new();
        let mut builder = GraphBuilder::new();
        for name in ["a", "b", "c", "d"] {
            builder = builder.add_node(
                name,
                Arc::new(
                    ScriptedWorker::new([name])
                        .with_delay(Duration::from_millis(20))
                        .with_probe(probe.clone()),
                ),
            );
        }
        let config = SchedulerConfig {
            max_concurrency: 2,
            ..Default::default()
        };

        let (_, report) = collect(scheduler(builder, config).stream("X")).await;
        assert_eq!(report.status, GraphRunStatus::Success);
        assert_eq!(probe.peak(), 2);
    }

    #[tokio::test]
    async fn test_merge_order_ignores_completion_order() {
        // "slow" is declared first but finishes last.
        let writer = scripted(&["w"]);
        let sched = scheduler(
            GraphBuilder::new()
                .add_node(
                    "slow",
                    Arc::new(ScriptedWorker::new(["S"]).with_start_delay(Duration::from_millis(60))),
                )
                .add_node("fast", scripted(&["F"]))
                .add_node("writer", writer.clone())
                .add_edge("slow", "writer")
                .add_edge("fast", "writer"),
            SchedulerConfig::default(),
        );

        let (events, _) = collect(sched.stream("X")).await;

        let fast_stop = events
            .iter()
            .position(|e| matches!(e, StreamEvent::NodeFinished { node, .. } if node.as_str() == "fast"))
            .unwrap();
        let slow_stop = events
            .iter()
            .position(|e| matches!(e, StreamEvent::NodeFinished { node, .. } if node.as_str() == "slow"))
            .unwrap();
        assert!(fast_stop < slow_stop);

        let input = &writer.inputs()[0];
        let order: Vec<_> = input.parts.iter().map(|p| p.from.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast"]);
        assert_eq!(input.parts[0].content, "S");
    }

    #[tokio::test]
    async fn test_failing_leaf_is_partial_failure() {
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("root", scripted(&["r"]))
                .add_node("ok", scripted(&["o"]))
                .add_node("leaf", Arc::new(FailingWorker::new("boom")))
                .add_edge("root", "ok")
                .add_edge("root", "leaf"),
            SchedulerConfig::default(),
        );

        let (events, report) = collect(sched.stream("X")).await;
        assert_eq!(report.status, GraphRunStatus::PartialFailure);
        assert_eq!(report.node("leaf").unwrap().state, NodeState::Failed);
        assert_node_contract(&events);
    }

    #[tokio::test]
    async fn test_failure_skips_descendants() {
        let downstream = scripted(&["never"]);
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("a", Arc::new(FailingWorker::new("boom")))
                .add_node("b", scripted(&["b"]))
                .add_node("mid", downstream.clone())
                .add_node("end", scripted(&["never"]))
                .add_edge("a", "mid")
                .add_edge("b", "mid")
                .add_edge("mid", "end"),
            SchedulerConfig::default(),
        );

        let (events, report) = collect(sched.stream("X")).await;
        assert_eq!(report.status, GraphRunStatus::Failure);
        assert!(downstream.inputs().is_empty());

        let mid = report.node("mid").unwrap();
        assert_eq!(mid.state, NodeState::Skipped);
        assert_eq!(mid.history, vec![NodeState::Blocked, NodeState::Skipped]);
        assert_eq!(
            mid.skip_cause,
            Some(SkipCause::UpstreamFailed {
                node: NodeId::new("a")
            })
        );
        assert_eq!(report.node("end").unwrap().state, NodeState::Skipped);
        assert_eq!(report.node("b").unwrap().state, NodeState::Completed);

        assert!(!events
            .iter()
            .any(|e| matches!(e, StreamEvent::NodeStarted { node } if node.as_str() == "mid")));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, StreamEvent::NodeSkipped { .. }))
                .count(),
            2
        );
        assert_node_contract(&events);
    }

    #[tokio::test]
    async fn test_best_effort_runs_descendants_with_empty_input() {
        let writer = scripted(&["w"]);
        let config = SchedulerConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..Default::default()
        };
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("bad", Arc::new(ScriptedWorker::new(["partial"]).failing_after(1, "boom")))
                .add_node("good", scripted(&["G"]))
                .add_node("writer", writer.clone())
                .add_edge("bad", "writer")
                .add_edge("good", "writer"),
            config,
        );

        let (_, report) = collect(sched.stream("X")).await;
        assert_eq!(report.status, GraphRunStatus::PartialFailure);
        assert_eq!(report.node("writer").unwrap().state, NodeState::Completed);
        // Partial output is kept for diagnostics but not forwarded.
        assert_eq!(report.node("bad").unwrap().output, "partial");

        let input = &writer.inputs()[0];
        assert_eq!(input.parts[0].content, "");
        assert_eq!(input.parts[1].content, "G");
    }

    #[tokio::test]
    async fn test_node_timeout() {
        let config = SchedulerConfig {
            node_timeout_secs: None,
            ..Default::default()
        };
        let sched = scheduler(
            GraphBuilder::new()
                .add_node_with_timeout("stuck", Arc::new(PendingWorker), Some(Duration::from_millis(30)))
                .add_node("after", scripted(&["x"]))
                .add_edge("stuck", "after"),
            config,
        );

        let (_, report) = collect(sched.stream("X")).await;
        let stuck = report.node("stuck").unwrap();
        assert_eq!(stuck.state, NodeState::Failed);
        assert!(stuck.error.as_ref().unwrap().is_timeout());
        assert_eq!(report.node("after").unwrap().state, NodeState::Skipped);
        assert_eq!(report.status, GraphRunStatus::Failure);
    }

    #[tokio::test]
    async fn test_cancel_stops_launching() {
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("stuck", Arc::new(PendingWorker))
                .add_node("after", scripted(&["x"]))
                .add_edge("stuck", "after"),
            SchedulerConfig::default(),
        );

        let mut handle = sched.stream("X");
        assert!(matches!(handle.recv().await, Some(StreamEvent::NodeStarted { .. })));
        handle.cancel();

        let (events, report) = collect(handle).await;
        assert_eq!(report.status, GraphRunStatus::Failure);
        assert_eq!(
            report.node("stuck").unwrap().error,
            Some(NodeExecutionError::Cancelled)
        );
        assert_eq!(
            report.node("after").unwrap().skip_cause,
            Some(SkipCause::Cancelled)
        );
        assert!(matches!(events.last(), Some(StreamEvent::GraphCompleted { .. })));
    }

    #[tokio::test]
    async fn test_cancel_before_launch_skips_whole_chain() {
        let second = scripted(&["never"]);
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("a", scripted(&["a"]))
                .add_node("b", second.clone())
                .add_node("c", scripted(&["never"]))
                .add_edge("a", "b")
                .add_edge("b", "c"),
            SchedulerConfig::default(),
        );

        // The run task has not been polled yet on the test runtime.
        let handle = sched.stream("X");
        handle.cancel();

        let (events, report) = collect(handle).await;
        assert_node_contract(&events);
        assert_eq!(report.status, GraphRunStatus::Failure);
        for name in ["a", "b", "c"] {
            let run = report.node(name).unwrap();
            assert_eq!(run.state, NodeState::Skipped, "{name}");
            assert_eq!(run.skip_cause, Some(SkipCause::Cancelled), "{name}");
        }
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, StreamEvent::NodeSkipped { .. }))
                .count(),
            3
        );
        assert!(second.inputs().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_worker_is_contained() {
        let sched = scheduler(
            GraphBuilder::new()
                .add_node("p", Arc::new(PanicWorker::after(["half"])))
                .add_node("ok", scripted(&["fine"]))
                .add_node("after", scripted(&["never"]))
                .add_edge("p", "after"),
            SchedulerConfig::default(),
        );

        let (events, report) = collect(sched.stream("X")).await;
        assert_node_contract(&events);

        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::NodeFailed { node, output, .. } if node.as_str() == "p" && output == "half"
        )));
        let p = report.node("p").unwrap();
        assert_eq!(p.state, NodeState::Failed);
        assert_eq!(p.output, "half");
        assert_eq!(report.node("ok").unwrap().state, NodeState::Completed);
        assert_eq!(report.node("after").unwrap().state, NodeState::Skipped);
        assert_eq!(report.status, GraphRunStatus::Failure);
    }

    #[tokio::test]
    async fn test_dropped_consumer_aborts_run() {
        let sched = scheduler(
            GraphBuilder::new().add_node("stuck", Arc::new(PendingWorker)),
            SchedulerConfig::default(),
        );
        let (sink, events) = multiplexer::channel(4);
        let run = tokio::spawn({
            let sched = sched.clone();
            async move {
                sched
                    .run(RunId::new(), "X".into(), sink, CancellationToken::new())
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(events);

        let result = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run should stop")
            .unwrap();
        assert!(matches!(result, Err(TrellisError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_empty_graph_completes() {
        let sched = scheduler(GraphBuilder::new(), SchedulerConfig::default());
        let (events, report) = collect(sched.stream("X")).await;
        assert_eq!(
            events,
            vec![StreamEvent::GraphCompleted {
                status: GraphRunStatus::Success
            }]
        );
        assert!(report.nodes.is_empty());
    }

    #[test]
    fn test_earliest() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest(Some(now), Some(later)), Some(now));
        assert_eq!(earliest(None, Some(later)), Some(later));
        assert_eq!(earliest(None, None), None);
    }
}
