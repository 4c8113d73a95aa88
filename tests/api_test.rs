use flockmem::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves a single-node cluster on an ephemeral port and returns its base URL.
async fn spawn_node() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = NodeConfig::default();
    config.node_name = "NodeA".to_string();
    config.bind_addr = "127.0.0.1".to_string();
    config.bind_port = port;
    config.request_timeout_ms = 2_000;

    let document = ClusterDocument::generate(10, 0, vec!["NodeA".to_string()]).unwrap();
    let daemon = Arc::new(NodeDaemon::with_document(config, &document).unwrap());
    let router = create_router(daemon);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn test_out_of_range_read_returns_error_body() {
    let base_url = spawn_node().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/read", base_url))
        .json(&json!({ "address": 99 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("99"));
    assert!(body["value"].is_null());
}

#[tokio::test]
async fn test_write_then_read_over_http() {
    let base_url = spawn_node().await;
    let client = reqwest::Client::new();

    let written: Value = client
        .post(format!("{}/write", base_url))
        .json(&json!({ "address": 3, "value": 5 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(written["sequence"], 1);

    let read: Value = client
        .post(format!("{}/read", base_url))
        .json(&json!({ "address": 3, "sequence": 1 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["value"], 5);
    assert!(read["error"].is_null());

    let status: Value = client
        .get(format!("{}/status", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["watermark"], 1);
}
