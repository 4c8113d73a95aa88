use crate::error::{DsmError, DsmResult};
use crate::transport::{endpoint_owner, ReplyRegistry, Transport};
use crate::types::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// In-process transport: one unbounded inbox per node, one reply registry per
/// caller. Messages pass through the wire encoding on every hop.
///
/// Per-destination delays and message loss can be injected for testing.
#[derive(Clone, Default)]
pub struct LocalTransport {
    inboxes: Arc<RwLock<HashMap<NodeId, mpsc::UnboundedSender<DsmMessage>>>>,
    registries: Arc<RwLock<HashMap<NodeId, ReplyRegistry>>>,
    delays: Arc<RwLock<HashMap<NodeId, Duration>>>,
    lost: Arc<RwLock<HashSet<NodeId>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, name: &str) -> mpsc::UnboundedReceiver<DsmMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.write().unwrap().insert(name.to_string(), tx);
        rx
    }

    pub fn client_registry(&self, owner: &str) -> ReplyRegistry {
        let registry = ReplyRegistry::new(owner);
        self.attach_registry(registry.clone());
        registry
    }

    pub fn attach_registry(&self, registry: ReplyRegistry) {
        self.registries
            .write()
            .unwrap()
            .insert(registry.owner().to_string(), registry);
    }

    pub fn set_delay(&self, destination: &str, delay: Option<Duration>) {
        let mut delays = self.delays.write().unwrap();
        match delay {
            Some(d) => delays.insert(destination.to_string(), d),
            None => delays.remove(destination),
        };
    }

    /// Silently drops every message addressed to `destination` while set.
    pub fn set_lost(&self, destination: &str, lost: bool) {
        let mut set = self.lost.write().unwrap();
        if lost {
            set.insert(destination.to_string());
        } else {
            set.remove(destination);
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, destination: &str, message: DsmMessage) -> DsmResult<()> {
        let inbox = self
            .inboxes
            .read()
            .unwrap()
            .get(destination)
            .cloned()
            .ok_or_else(|| DsmError::transport(format!("no subscriber for {}", destination)))?;

        if self.lost.read().unwrap().contains(destination) {
            debug!("Dropping {} for address {} to {}", message.kind, message.address, destination);
            return Ok(());
        }

        let encoded = message.to_json()?;
        let decoded = DsmMessage::from_json(encoded.as_bytes())?;

        let delay = self.delays.read().unwrap().get(destination).copied();
        match delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = inbox.send(decoded);
                });
                Ok(())
            }
            None => inbox
                .send(decoded)
                .map_err(|_| DsmError::transport(format!("inbox of {} is closed", destination))),
        }
    }

    async fn reply(&self, endpoint: &str, reply: Reply) -> DsmResult<()> {
        let owner = endpoint_owner(endpoint)
            .ok_or_else(|| DsmError::transport(format!("malformed reply endpoint {}", endpoint)))?;
        let registry = self
            .registries
            .read()
            .unwrap()
            .get(owner)
            .cloned()
            .ok_or_else(|| DsmError::transport(format!("unknown reply owner {}", owner)))?;

        if registry.resolve(endpoint, reply) {
            Ok(())
        } else {
            Err(DsmError::transport(format!(
                "reply endpoint {} is not waiting",
                endpoint
            )))
        }
    }
}
