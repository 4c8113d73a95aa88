use crate::types::{NodeId, Reply};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Reply endpoints owned by one process.
///
/// Endpoints are named `"{owner}:{uuid}"` so any transport can tell which process
/// to deliver a reply to. Each endpoint accepts exactly one reply.
#[derive(Clone)]
pub struct ReplyRegistry {
    owner: NodeId,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>,
}

impl ReplyRegistry {
    pub fn new(owner: impl Into<NodeId>) -> Self {
        Self {
            owner: owner.into(),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn register(&self) -> (String, oneshot::Receiver<Reply>) {
        let endpoint = format!("{}:{}", self.owner, Uuid::new_v4());
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(endpoint.clone(), tx);
        (endpoint, rx)
    }

    /// Hands `reply` to the waiting caller. Returns false when nobody is waiting.
    pub fn resolve(&self, endpoint: &str, reply: Reply) -> bool {
        let sender = self.pending.lock().unwrap().remove(endpoint);
        match sender {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                debug!("No caller waiting on endpoint {}", endpoint);
                false
            }
        }
    }

    pub fn cancel(&self, endpoint: &str) {
        self.pending.lock().unwrap().remove(endpoint);
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

pub fn endpoint_owner(endpoint: &str) -> Option<&str> {
    endpoint.rsplit_once(':').map(|(owner, _)| owner)
}
