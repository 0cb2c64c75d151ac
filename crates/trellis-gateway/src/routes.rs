use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use trellis_core::protocol::WireRecord;

use crate::middleware::Authenticated;
use crate::state::AppState;

// GET /api/health: no auth required
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/graph: the graph every chat request runs
pub async fn describe_graph(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let graph = state.scheduler.graph();
    let nodes: Vec<serde_json::Value> = graph
        .nodes()
        .iter()
        .map(|n| {
            serde_json::json!({
                "name": n.id(),
                "worker": n.worker().kind(),
                "predecessors": n.predecessors(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "entry_points": graph.entry_points(),
        "nodes": nodes,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: String,
}

// POST /api/chat: run the graph, streaming wire records as SSE
pub async fn chat(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Response {
    if body.message.trim().is_empty() || body.session_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "message and sessionId are required" })),
        )
            .into_response();
    }

    let handle = state.scheduler.stream(body.message);
    info!(session_id = %body.session_id, run_id = %handle.run_id, "Chat run started");

    // Dropping the response body drops the event stream, which cancels the run.
    let records = handle.into_events().filter_map(|event| {
        let sse = match WireRecord::from(&event).to_line() {
            Ok(line) => Some(Ok::<_, Infallible>(Event::default().data(line))),
            Err(e) => {
                warn!(error = %e, "Dropping unencodable record");
                None
            }
        };
        futures::future::ready(sse)
    });
    let done = stream::once(async { Ok(Event::default().data("[DONE]")) });

    Sse::new(records.chain(done))
        .keep_alive(KeepAlive::default())
        .into_response()
}
