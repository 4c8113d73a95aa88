use crate::error::{DsmError, DsmResult};
use crate::transport::{endpoint_owner, ReplyRegistry, Transport};
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Transport over the peers' HTTP API.
///
/// Messages go to `POST /dsm/message`; replies for another process's endpoint go
/// to `POST /dsm/reply/{endpoint}` on that process.
#[derive(Clone)]
pub struct HttpTransport {
    peers: Arc<HashMap<NodeId, String>>,
    registry: ReplyRegistry,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(peers: HashMap<NodeId, String>, registry: ReplyRegistry) -> Self {
        Self {
            peers: Arc::new(peers),
            registry,
            client: reqwest::Client::new(),
        }
    }

    pub fn registry(&self) -> &ReplyRegistry {
        &self.registry
    }

    fn addr_of(&self, name: &str) -> DsmResult<&str> {
        self.peers
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| DsmError::transport(format!("no address known for {}", name)))
    }

    async fn post_json<T: serde::Serialize>(&self, url: &str, body: &T) -> DsmResult<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DsmError::transport(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(DsmError::transport(format!(
                "POST {} returned HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, destination: &str, message: DsmMessage) -> DsmResult<()> {
        let url = format!("http://{}/dsm/message", self.addr_of(destination)?);
        self.post_json(&url, &WireMessage::from(message)).await
    }

    async fn reply(&self, endpoint: &str, reply: Reply) -> DsmResult<()> {
        let owner = endpoint_owner(endpoint)
            .ok_or_else(|| DsmError::transport(format!("malformed reply endpoint {}", endpoint)))?;

        if owner == self.registry.owner() {
            if self.registry.resolve(endpoint, reply) {
                return Ok(());
            }
            return Err(DsmError::transport(format!(
                "reply endpoint {} is not waiting",
                endpoint
            )));
        }

        let url = format!("http://{}/dsm/reply/{}", self.addr_of(owner)?, endpoint);
        self.post_json(&url, &reply).await
    }
}
