use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;

use trellis_core::error::{NodeExecutionError, Result, TrellisError};
use trellis_core::event::StreamEvent;
use trellis_core::types::{GraphRunStatus, NodeId, SkipCause};

/// Create the bounded channel that carries one run's events to its consumer.
///
/// Producers block once `capacity` events are waiting, so a slow consumer
/// slows the run instead of growing memory.
pub fn channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, EventStream { rx, done: false })
}

/// Producer side of the multiplexer. Cheap to clone; one clone per producer.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    /// Send one event, waiting while the channel is full.
    pub async fn emit(&self, event: StreamEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TrellisError::StreamClosed)
    }

    /// A sink that can only emit events for `node`, in lifecycle order.
    pub fn for_node(&self, node: NodeId) -> NodeSink {
        NodeSink {
            node,
            sink: self.clone(),
            phase: Phase::Idle,
        }
    }

    pub(crate) async fn skipped(&self, node: NodeId, cause: SkipCause) -> Result<()> {
        self.emit(StreamEvent::NodeSkipped { node, cause }).await
    }

    pub(crate) async fn completed(&self, status: GraphRunStatus) -> Result<()> {
        self.emit(StreamEvent::GraphCompleted { status }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the consumer has dropped its `EventStream`.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Closed,
}

/// Per-node view of the sink that enforces the node event contract:
/// one start, then fragments, then exactly one terminal event.
pub struct NodeSink {
    node: NodeId,
    sink: EventSink,
    phase: Phase,
}

impl NodeSink {
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub async fn started(&mut self) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Idle, "{} started twice", self.node);
        self.phase = Phase::Started;
        self.sink
            .emit(StreamEvent::NodeStarted {
                node: self.node.clone(),
            })
            .await
    }

    pub async fn fragment(&mut self, fragment: String) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Started, "{} fragment outside run", self.node);
        self.sink
            .emit(StreamEvent::NodeFragment {
                node: self.node.clone(),
                fragment,
            })
            .await
    }

    pub async fn finished(&mut self, output: String) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Started, "{} finished outside run", self.node);
        self.phase = Phase::Closed;
        self.sink
            .emit(StreamEvent::NodeFinished {
                node: self.node.clone(),
                output,
            })
            .await
    }

    pub async fn failed(&mut self, output: String, error: NodeExecutionError) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Started, "{} failed outside run", self.node);
        self.phase = Phase::Closed;
        self.sink
            .emit(StreamEvent::NodeFailed {
                node: self.node.clone(),
                output,
                error,
            })
            .await
    }
}

/// Consumer side of the multiplexer: every event of the run, once, ending
/// after `GraphCompleted`.
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    done: bool,
}

impl EventStream {
    /// Next event, or `None` once the run is over.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        if self.done {
            return None;
        }
        let event = self.rx.recv().await;
        self.observe(&event);
        event
    }

    fn observe(&mut self, event: &Option<StreamEvent>) {
        match event {
            Some(StreamEvent::GraphCompleted { .. }) | None => {
                self.done = true;
                self.rx.close();
            }
            Some(_) => {}
        }
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(event) => {
                this.observe(&event);
                Poll::Ready(event)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
