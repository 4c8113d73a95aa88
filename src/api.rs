use crate::client::Session;
use crate::daemon::NodeDaemon;
use crate::error::DsmError;
use crate::types::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn create_router(daemon: Arc<NodeDaemon>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/read", post(read))
        .route("/write", post(write))
        .route("/dsm/message", post(receive_message))
        .route("/dsm/reply/:endpoint", post(receive_reply))
        .with_state(daemon)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_status(State(daemon): State<Arc<NodeDaemon>>) -> impl IntoResponse {
    Json(daemon.node().status())
}

async fn receive_message(
    State(daemon): State<Arc<NodeDaemon>>,
    Json(wire): Json<WireMessage>,
) -> impl IntoResponse {
    let node = daemon.node().clone();
    let msg = DsmMessage::from(wire);
    tokio::spawn(async move {
        node.handle(msg).await;
    });
    StatusCode::ACCEPTED
}

async fn receive_reply(
    State(daemon): State<Arc<NodeDaemon>>,
    Path(endpoint): Path<String>,
    Json(reply): Json<Reply>,
) -> impl IntoResponse {
    if daemon.registry().resolve(&endpoint, reply) {
        StatusCode::OK
    } else {
        debug!("Reply for {} arrived with nobody waiting", endpoint);
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadRequest {
    pub address: u32,
    #[serde(default)]
    pub sequence: Option<Sequence>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub address: u32,
    pub value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub address: u32,
    pub value: i64,
    #[serde(default)]
    pub sequence: Option<Sequence>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub address: u32,
    pub sequence: Sequence,
}

fn session_for(address: Address, sequence: Option<Sequence>) -> Session {
    let mut session = Session::new();
    if let Some(seq) = sequence {
        session.observe(address, seq);
    }
    session
}

async fn read(
    State(daemon): State<Arc<NodeDaemon>>,
    Json(req): Json<ReadRequest>,
) -> axum::response::Response {
    let address = Address::new(req.address);
    if let Err(e) = daemon.node().config().partition_of(address) {
        return error_response(e);
    }
    let mut session = session_for(address, req.sequence);
    match daemon.client().read(&mut session, address).await {
        Ok(value) => (
            StatusCode::OK,
            Json(ReadResponse {
                address: req.address,
                value,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn write(
    State(daemon): State<Arc<NodeDaemon>>,
    Json(req): Json<WriteRequest>,
) -> axum::response::Response {
    let address = Address::new(req.address);
    if let Err(e) = daemon.node().config().partition_of(address) {
        return error_response(e);
    }
    let mut session = session_for(address, req.sequence);
    match daemon.client().write(&mut session, address, req.value).await {
        Ok(sequence) => (
            StatusCode::OK,
            Json(WriteResponse {
                address: req.address,
                sequence,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: DsmError) -> axum::response::Response {
    let status = match &e {
        DsmError::Range { .. } => StatusCode::BAD_REQUEST,
        DsmError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        DsmError::Failed(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}
