use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::StreamEvent;

/// One record of the external output stream.
///
/// `node_stream.text` is an append-only delta; `node_stop.content` is the
/// authoritative final value and equals the concatenation of all prior deltas
/// of that node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub event: String,
    #[serde(rename = "node_id", skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl WireRecord {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            node: None,
            text: None,
            content: None,
            status: None,
            error: None,
            cause: None,
        }
    }

    fn with_node(mut self, node: &str) -> Self {
        self.node = Some(node.to_string());
        self
    }

    /// Serialize as one line of NDJSON (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&StreamEvent> for WireRecord {
    fn from(event: &StreamEvent) -> Self {
        match event {
            StreamEvent::NodeStarted { node } => Self::new("node_start").with_node(node.as_str()),
            StreamEvent::NodeFragment { node, fragment } => {
                let mut rec = Self::new("node_stream").with_node(node.as_str());
                rec.text = Some(fragment.clone());
                rec
            }
            StreamEvent::NodeFinished { node, output } => {
                let mut rec = Self::new("node_stop").with_node(node.as_str());
                rec.content = Some(output.clone());
                rec.status = Some("completed".to_string());
                rec
            }
            StreamEvent::NodeFailed {
                node,
                output,
                error,
            } => {
                let mut rec = Self::new("node_stop").with_node(node.as_str());
                rec.content = Some(output.clone());
                rec.status = Some("failed".to_string());
                rec.error = Some(error.to_string());
                rec
            }
            StreamEvent::NodeSkipped { node, cause } => {
                let mut rec = Self::new("node_skip").with_node(node.as_str());
                rec.cause = Some(cause.to_string());
                rec
            }
            StreamEvent::GraphCompleted { status } => {
                let mut rec = Self::new("complete");
                rec.status = Some(status.to_string());
                rec
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeExecutionError;
    use crate::types::{GraphRunStatus, NodeId, SkipCause};

    #[test]
    fn test_node_stream_record() {
        let event = StreamEvent::NodeFragment {
            node: NodeId::new("tech"),
            fragment: "Hel".into(),
        };
        let line = WireRecord::from(&event).to_line().unwrap();
        assert_eq!(line, r#"{"event":"node_stream","node_id":"tech","text":"Hel"}"#);
    }

    #[test]
    fn test_complete_record() {
        let event = StreamEvent::GraphCompleted {
            status: GraphRunStatus::Success,
        };
        let line = WireRecord::from(&event).to_line().unwrap();
        assert_eq!(line, r#"{"event":"complete","status":"success"}"#);
    }

    #[test]
    fn test_failed_stop_record() {
        let event = StreamEvent::NodeFailed {
            node: NodeId::new("ethics"),
            output: "partial".into(),
            error: NodeExecutionError::Timeout { elapsed_ms: 500 },
        };
        let rec = WireRecord::from(&event);
        assert_eq!(rec.event, "node_stop");
        assert_eq!(rec.content.as_deref(), Some("partial"));
        assert_eq!(rec.status.as_deref(), Some("failed"));
        assert!(rec.error.unwrap().contains("500ms"));
    }

    #[test]
    fn test_skip_record() {
        let event = StreamEvent::NodeSkipped {
            node: NodeId::new("writer"),
            cause: SkipCause::UpstreamFailed {
                node: NodeId::new("tech"),
            },
        };
        let rec = WireRecord::from(&event);
        assert_eq!(rec.event, "node_skip");
        assert_eq!(rec.cause.as_deref(), Some("upstream node tech failed"));
    }
}
