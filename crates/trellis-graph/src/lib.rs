//! Graph execution engine: concurrent DAG runs with one multiplexed event stream.
//!
//! A graph is an immutable set of `Node`s, each bound to a `Worker`, connected
//! by dependency `Edge`s. The `Scheduler` launches every node whose
//! predecessors have all finished, concurrently, feeding it the ordered
//! outputs of those predecessors. Each running node streams its fragments
//! through the multiplexer into a single bounded channel, and the run ends
//! with one `GraphCompleted` event carrying the aggregated status.

pub mod aggregate;
pub mod builder;
pub mod edge;
pub mod executor;
pub mod graph;
pub mod multiplexer;
pub mod node;
pub mod run;
pub mod scheduler;
pub mod workers;

pub use aggregate::aggregate_status;
pub use builder::GraphBuilder;
pub use edge::Edge;
pub use executor::{NodeExecutor, NodeOutcome};
pub use graph::Graph;
pub use multiplexer::{EventSink, EventStream, NodeSink};
pub use node::Node;
pub use run::{NodeRun, RunReport};
pub use scheduler::{RunHandle, Scheduler};
pub use workers::EchoWorker;
