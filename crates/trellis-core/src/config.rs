use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrellisError};
use crate::types::FailurePolicy;

/// Top-level Trellis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: Option<ModelConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    /// Graph definition. The built-in research panel is used when absent.
    #[serde(default)]
    pub graph: Option<GraphConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Execution scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// What happens to descendants of a failed node.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Maximum nodes running at once. 0 = unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
    /// Deadline for each node run, unless the node overrides it.
    #[serde(default)]
    pub node_timeout_secs: Option<u64>,
    /// Deadline for the whole graph run.
    #[serde(default)]
    pub graph_timeout_secs: Option<u64>,
    /// Capacity of the bounded event channel between the run and its consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_concurrency: 0,
            node_timeout_secs: None,
            graph_timeout_secs: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl SchedulerConfig {
    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_secs.map(Duration::from_secs)
    }

    pub fn graph_timeout(&self) -> Option<Duration> {
        self.graph_timeout_secs.map(Duration::from_secs)
    }
}

fn default_channel_capacity() -> usize { 64 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on `/api/chat` when set.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
        }
    }
}

fn default_bind() -> String { "127.0.0.1:18789".to_string() }

/// Which worker implementation a node is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    #[default]
    Llm,
    Echo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub worker: WorkerKind,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Overrides `scheduler.node_timeout_secs` for this node.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            worker: WorkerKind::default(),
            system_prompt: Some(system_prompt.into()),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Explicit entry points. Inferred from the edges when empty.
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
}

impl GraphConfig {
    /// Three researchers working in parallel, joined by one writer.
    pub fn research_panel() -> Self {
        let nodes = vec![
            NodeConfig::new(
                "tech",
                "You research the technical side of the given topic: how it works, \
                 how it is implemented, how it performs. Answer concisely.",
            ),
            NodeConfig::new(
                "social",
                "You research the social side of the given topic: its impact, trends, \
                 and real-world use cases. Answer concisely.",
            ),
            NodeConfig::new(
                "ethics",
                "You research the ethical side of the given topic: open issues, risks, \
                 and regulation. Answer concisely.",
            ),
            NodeConfig::new(
                "writer",
                "You are the writer. Combine the technical, social, and ethical findings \
                 you receive into one clear, readable summary.",
            ),
        ];
        let edges = ["tech", "social", "ethics"]
            .iter()
            .map(|from| EdgeConfig {
                from: from.to_string(),
                to: "writer".to_string(),
            })
            .collect();

        Self {
            entry_points: vec!["tech".into(), "social".into(), "ethics".into()],
            nodes,
            edges,
        }
    }

    /// Rebind every node to the given worker kind.
    pub fn with_worker(mut self, kind: WorkerKind) -> Self {
        for node in &mut self.nodes {
            node.worker = kind;
        }
        self
    }
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| TrellisError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| TrellisError::Config(e.to_string()))
    }

    /// The configured graph, or the research panel when none is configured.
    pub fn graph_or_default(&self) -> GraphConfig {
        self.graph.clone().unwrap_or_else(GraphConfig::research_panel)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    tracing::warn!(var = %var_name, "Config references unset environment variable");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
