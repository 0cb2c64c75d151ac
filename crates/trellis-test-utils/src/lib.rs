//! Shared test workers, probes, and event assertions for Trellis crates.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};

use trellis_core::error::{Result, TrellisError};
use trellis_core::event::StreamEvent;
use trellis_core::traits::{FragmentStream, Worker};
use trellis_core::types::MergedInput;

/// Worker that replays a fixed list of fragments.
pub struct ScriptedWorker {
    fragments: Vec<String>,
    delay: Duration,
    start_delay: Duration,
    fail_after: Option<(usize, String)>,
    probe: Option<Arc<ConcurrencyProbe>>,
    inputs: Mutex<Vec<MergedInput>>,
}

impl ScriptedWorker {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            start_delay: Duration::ZERO,
            fail_after: None,
            probe: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before every fragment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep once before the first fragment.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Yield `n` fragments, then an error carrying `message`.
    pub fn failing_after(mut self, n: usize, message: &str) -> Self {
        self.fail_after = Some((n, message.to_string()));
        self
    }

    /// Count this worker's open streams in `probe`.
    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Every input this worker has been invoked with.
    pub fn inputs(&self) -> Vec<MergedInput> {
        self.inputs.lock().unwrap().clone()
    }
}

struct Script {
    queue: std::vec::IntoIter<String>,
    emitted: usize,
    delay: Duration,
    start_delay: Duration,
    fail_after: Option<(usize, String)>,
    _guard: Option<ProbeGuard>,
}

impl Worker for ScriptedWorker {
    fn kind(&self) -> &str {
        "scripted"
    }

    fn invoke(&self, input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>> {
        self.inputs.lock().unwrap().push(input);

        let script = Script {
            queue: self.fragments.clone().into_iter(),
            emitted: 0,
            delay: self.delay,
            start_delay: self.start_delay,
            fail_after: self.fail_after.clone(),
            _guard: self.probe.as_ref().map(|p| p.enter()),
        };

        Box::pin(async move {
            let stream = stream::unfold(Some(script), |state| async move {
                let mut script = state?;
                if script.emitted == 0 && !script.start_delay.is_zero() {
                    tokio::time::sleep(script.start_delay).await;
                }
                if let Some((n, message)) = &script.fail_after {
                    if script.emitted == *n {
                        let err = TrellisError::Worker(message.clone());
                        return Some((Err(err), None));
                    }
                }
                let fragment = script.queue.next()?;
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                script.emitted += 1;
                Some((Ok(fragment), Some(script)))
            });
            Ok(stream.boxed())
        })
    }
}

/// Worker whose invocation fails before producing a stream.
pub struct FailingWorker {
    message: String,
}

impl FailingWorker {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Worker for FailingWorker {
    fn kind(&self) -> &str {
        "failing"
    }

    fn invoke(&self, _input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>> {
        let message = self.message.clone();
        Box::pin(async move { Err::<FragmentStream<'_>, _>(TrellisError::Worker(message)) })
    }
}

/// Worker whose stream never yields. Only a deadline or cancellation ends it.
pub struct PendingWorker;

impl Worker for PendingWorker {
    fn kind(&self) -> &str {
        "pending"
    }

    fn invoke(&self, _input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>> {
        Box::pin(async move { Ok(stream::pending::<Result<String>>().boxed()) })
    }
}

/// Worker that panics, either straight from `invoke` or after replaying
/// some fragments.
pub struct PanicWorker {
    fragments: Vec<String>,
    on_invoke: bool,
}

impl PanicWorker {
    /// Panic inside `invoke`, before any stream exists.
    pub fn on_invoke() -> Self {
        Self {
            fragments: Vec::new(),
            on_invoke: true,
        }
    }

    /// Yield `fragments`, then panic while the stream is being polled.
    pub fn after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            on_invoke: false,
        }
    }
}

fn explode() -> Result<String> {
    panic!("worker exploded mid-stream")
}

impl Worker for PanicWorker {
    fn kind(&self) -> &str {
        "panic"
    }

    fn invoke(&self, _input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>> {
        if self.on_invoke {
            panic!("worker exploded on invoke");
        }
        let replay = stream::iter(self.fragments.clone().into_iter().map(Ok));
        Box::pin(async move { Ok(replay.chain(stream::once(async { explode() })).boxed()) })
    }
}

/// Tracks how many probed streams are open at once.
#[derive(Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard(self.clone())
    }
}

struct ProbeGuard(Arc<ConcurrencyProbe>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Assert the per-node contract on a captured event sequence: at most one
/// start per node, fragments only while running, one terminal event after
/// the start, nothing for a node after its terminal event, and
/// `GraphCompleted` (if present) last, with every started node closed.
pub fn assert_node_contract(events: &[StreamEvent]) {
    #[derive(PartialEq)]
    enum Seen {
        Running,
        Done,
    }
    let mut seen: HashMap<String, Seen> = HashMap::new();

    for (i, event) in events.iter().enumerate() {
        match event {
            StreamEvent::NodeStarted { node } => {
                assert!(
                    seen.insert(node.to_string(), Seen::Running).is_none(),
                    "event {i}: {node} started twice"
                );
            }
            StreamEvent::NodeFragment { node, .. } => {
                assert!(
                    seen.get(node.as_str()) == Some(&Seen::Running),
                    "event {i}: fragment for {node} outside its run"
                );
            }
            StreamEvent::NodeFinished { node, .. } | StreamEvent::NodeFailed { node, .. } => {
                assert!(
                    seen.insert(node.to_string(), Seen::Done) == Some(Seen::Running),
                    "event {i}: terminal event for {node} without a start"
                );
            }
            StreamEvent::NodeSkipped { node, .. } => {
                assert!(
                    seen.insert(node.to_string(), Seen::Done).is_none(),
                    "event {i}: {node} skipped after it was scheduled"
                );
            }
            StreamEvent::GraphCompleted { .. } => {
                assert_eq!(i, events.len() - 1, "GraphCompleted is not the last event");
                let open: Vec<&String> = seen
                    .iter()
                    .filter(|(_, s)| **s == Seen::Running)
                    .map(|(node, _)| node)
                    .collect();
                assert!(open.is_empty(), "GraphCompleted while {open:?} still running");
            }
        }
    }
}

/// Concatenated fragments of `node`, in arrival order.
pub fn fragments_of(events: &[StreamEvent], node: &str) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::NodeFragment { node: n, fragment } if n.as_str() == node => {
                Some(fragment.as_str())
            }
            _ => None,
        })
        .collect()
}

/// Output carried by `node`'s finished event.
pub fn finished_output<'a>(events: &'a [StreamEvent], node: &str) -> Option<&'a str> {
    events.iter().find_map(|e| match e {
        StreamEvent::NodeFinished { node: n, output } if n.as_str() == node => {
            Some(output.as_str())
        }
        _ => None,
    })
}

/// Write `content` to a config file in a fresh temp dir.
/// Keep the returned dir alive for as long as the file is needed.
pub fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trellis.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}
