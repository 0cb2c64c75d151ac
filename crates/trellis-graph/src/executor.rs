use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use trellis_core::error::{NodeExecutionError, Result};
use trellis_core::traits::Worker;
use trellis_core::types::{MergedInput, NodeId};

use crate::multiplexer::NodeSink;

/// How a node run ended, as reported back to the scheduler.
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    /// Everything the worker emitted before it stopped.
    pub output: String,
    /// `None` on success.
    pub error: Option<NodeExecutionError>,
    pub elapsed_ms: u64,
}

impl NodeOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs one node's worker against its merged input and streams the result.
pub struct NodeExecutor {
    node: NodeId,
    worker: Arc<dyn Worker>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

enum Step {
    Fragment(String),
    End,
    Fail(NodeExecutionError),
}

impl NodeExecutor {
    pub fn new(node: NodeId, worker: Arc<dyn Worker>, cancel: CancellationToken) -> Self {
        Self {
            node,
            worker,
            deadline: None,
            cancel,
        }
    }

    /// Fail the node with `Timeout` if it is still running at `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Drive the worker to completion.
    ///
    /// Worker errors, timeouts, and cancellation are folded into the returned
    /// outcome. The only `Err` is a closed event stream.
    pub async fn run(self, input: MergedInput, mut sink: NodeSink) -> Result<NodeOutcome> {
        let start = Instant::now();
        sink.started().await?;
        debug!(node = %self.node, worker = self.worker.kind(), "Node started");

        let mut output = String::new();
        let error = self.consume(input, &mut output, &mut sink, start).await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &error {
            None => {
                debug!(node = %self.node, elapsed_ms, "Node finished");
                sink.finished(output.clone()).await?;
            }
            Some(e) => {
                warn!(node = %self.node, error = %e, elapsed_ms, "Node failed");
                sink.failed(output.clone(), e.clone()).await?;
            }
        }

        Ok(NodeOutcome {
            output,
            error,
            elapsed_ms,
        })
    }

    async fn consume(
        &self,
        input: MergedInput,
        output: &mut String,
        sink: &mut NodeSink,
        start: Instant,
    ) -> Result<Option<NodeExecutionError>> {
        let timeout = || NodeExecutionError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        let panicked = || NodeExecutionError::Worker("worker panicked".into());
        let worker = &self.worker;

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Some(NodeExecutionError::Cancelled)),
            _ = wait_until(self.deadline) => return Ok(Some(timeout())),
            opened = AssertUnwindSafe(async move { worker.invoke(input).await }).catch_unwind() => opened,
        };
        let mut fragments = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Ok(Some(NodeExecutionError::Worker(e.to_string()))),
            Err(_) => {
                warn!(node = %self.node, "Worker panicked while opening its stream");
                return Ok(Some(panicked()));
            }
        };

        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Fail(NodeExecutionError::Cancelled),
                _ = wait_until(self.deadline) => Step::Fail(timeout()),
                item = AssertUnwindSafe(fragments.next()).catch_unwind() => match item {
                    Ok(Some(Ok(fragment))) => Step::Fragment(fragment),
                    Ok(Some(Err(e))) => Step::Fail(NodeExecutionError::Worker(e.to_string())),
                    Ok(None) => Step::End,
                    Err(_) => {
                        warn!(node = %self.node, "Worker panicked mid-stream");
                        Step::Fail(panicked())
                    }
                },
            };

            match step {
                Step::Fragment(fragment) if fragment.is_empty() => {}
                Step::Fragment(fragment) => {
                    output.push_str(&fragment);
                    sink.fragment(fragment).await?;
                }
                Step::End => return Ok(None),
                Step::Fail(e) => return Ok(Some(e)),
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
