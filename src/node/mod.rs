mod pending;
mod storage;

pub use pending::*;
pub use storage::*;

use crate::bootstrap::ClusterDocument;
use crate::error::{DsmError, DsmResult};
use crate::partition::PartitionConfig;
use crate::transport::Transport;
use crate::types::*;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-process replicated state machine for one partition.
pub struct DsmNode {
    role: NodeRole,
    config: Arc<PartitionConfig>,
    transport: Arc<dyn Transport>,
    store: PartitionStore,
    in_flight: InFlightTable,
    deferred: DeferredReads,
}

impl DsmNode {
    pub fn new(
        role: NodeRole,
        config: Arc<PartitionConfig>,
        transport: Arc<dyn Transport>,
    ) -> DsmResult<Self> {
        let partition_id = config.partition_of_node(&role.name).ok_or_else(|| {
            DsmError::config(format!("node {} is not part of any partition", role.name))
        })?;
        let (start, end) = config.range_of(partition_id).ok_or_else(|| {
            DsmError::config(format!("partition {} has no address range", partition_id))
        })?;
        if (start, end) != (role.start_address, role.end_address) {
            return Err(DsmError::config(format!(
                "node {} claims range {}..={} but its partition covers {}..={}",
                role.name, role.start_address, role.end_address, start, end
            )));
        }

        let store = PartitionStore::new(role.start_address, role.end_address);

        Ok(Self {
            role,
            config,
            transport,
            store,
            in_flight: InFlightTable::new(),
            deferred: DeferredReads::new(),
        })
    }

    pub fn from_document(
        name: &str,
        document: &ClusterDocument,
        transport: Arc<dyn Transport>,
    ) -> DsmResult<Self> {
        let config = Arc::new(document.derive_config()?);
        let role = document.role_for(name)?.clone();
        Self::new(role, config, transport)
    }

    pub fn name(&self) -> &str {
        &self.role.name
    }

    pub fn role(&self) -> &NodeRole {
        &self.role
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn is_primary(&self) -> bool {
        self.role.primary
    }

    pub fn watermark(&self) -> Sequence {
        self.store.watermark()
    }

    /// Locally stored value, or `None` when the address is not owned here.
    pub fn value_at(&self, address: Address) -> Option<i64> {
        self.store.slot(address).map(|slot| slot.value)
    }

    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    pub fn in_flight(&self) -> &InFlightTable {
        &self.in_flight
    }

    pub fn deferred_reads(&self) -> &DeferredReads {
        &self.deferred
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            name: self.role.name.clone(),
            start_address: self.role.start_address,
            end_address: self.role.end_address,
            primary: self.role.primary,
            replica_nodes: self.role.replica_nodes.clone(),
            watermark: self.store.watermark(),
            in_flight_writes: self.in_flight.len(),
            deferred_reads: self.deferred.len(),
        }
    }

    /// Entry point for every inbound message. Failures are logged and the
    /// message is dropped.
    pub async fn handle(&self, msg: DsmMessage) {
        let kind = msg.kind;
        let address = msg.address;
        if let Err(e) = self.dispatch(msg).await {
            warn!("[{}] Dropping {} for address {}: {}", self.name(), kind, address, e);
        }
    }

    async fn dispatch(&self, msg: DsmMessage) -> DsmResult<()> {
        if !self.store.owns(msg.address) {
            debug!("[{}] Forwarding {} for address {}", self.name(), msg.kind, msg.address);
            return self.forward(msg).await;
        }

        match msg.kind {
            MessageKind::Write if self.role.primary => self.handle_write(msg).await,
            MessageKind::Write => {
                debug!("[{}] Redirecting WRITE for {} to primary", self.name(), msg.address);
                self.forward(msg).await
            }
            MessageKind::Read => self.handle_read(msg).await,
            MessageKind::Replicate => self.handle_replicate(msg).await,
            MessageKind::ReplicateAck => self.handle_replicate_ack(msg).await,
        }
    }

    async fn handle_write(&self, msg: DsmMessage) -> DsmResult<()> {
        let value = msg.parse_value()?;
        let address = msg.address;
        let sequence = self.store.write_next(address, value);
        info!("[{}] WROTE value {} at address {} (sequence {})", self.name(), value, address, sequence);

        // The write counter is also this node's watermark.
        self.fire_deferred(sequence).await;

        let replicas = &self.role.replica_nodes;
        if replicas.is_empty() {
            if let Some(endpoint) = msg.reply_to {
                self.deliver(&endpoint, Reply::WriteAck { address, sequence }).await;
            }
            return Ok(());
        }

        self.in_flight.insert(address, sequence, replicas, msg.reply_to);

        let payload = value.to_string();
        for replica in replicas {
            let replicate =
                DsmMessage::replicate(address, payload.clone(), self.role.name.clone(), sequence);
            if let Err(e) = self.transport.send(replica, replicate).await {
                error!("[{}] Failed to replicate to {}: {}", self.name(), replica, e);
            }
        }
        Ok(())
    }

    async fn handle_read(&self, msg: DsmMessage) -> DsmResult<()> {
        let read = PendingRead::new(msg.address, msg.sequence, msg.reply_to);
        match self.deferred.defer_or_return(read, || self.store.watermark()) {
            Some(read) => self.serve_read(read).await,
            None => {
                debug!(
                    "[{}] Deferring READ of {} until sequence {} (watermark {})",
                    self.name(),
                    msg.address,
                    msg.sequence,
                    self.store.watermark()
                );
            }
        }
        Ok(())
    }

    async fn serve_read(&self, read: PendingRead) {
        let slot = self.store.read(read.address);
        debug!("[{}] READ value {} from address {}", self.name(), slot.value, read.address);
        if let Some(endpoint) = read.reply_to {
            let reply = Reply::Value {
                address: read.address,
                value: slot.value,
                sequence: slot.sequence,
            };
            self.deliver(&endpoint, reply).await;
        }
    }

    async fn handle_replicate(&self, msg: DsmMessage) -> DsmResult<()> {
        let value = msg.parse_value()?;
        let primary = msg
            .origin
            .ok_or_else(|| DsmError::protocol("REPLICATE does not name its primary"))?;
        let address = msg.address;
        let sequence = msg.sequence;

        if self.store.apply(address, value, sequence) {
            debug!("[{}] Applied {} at address {} (sequence {})", self.name(), value, address, sequence);
        } else {
            debug!("[{}] Ignoring stale REPLICATE for {} (sequence {})", self.name(), address, sequence);
        }

        let watermark = self.store.advance_watermark(sequence);
        self.fire_deferred(watermark).await;

        // The ack echoes the primary's name back in the reply field.
        let ack = DsmMessage::replicate_ack(address, primary.clone(), sequence);
        self.transport.send(&primary, ack).await
    }

    async fn handle_replicate_ack(&self, msg: DsmMessage) -> DsmResult<()> {
        let address = msg.address;
        let sequence = msg.sequence;

        match self.in_flight.acknowledge(address, sequence) {
            AckOutcome::Waiting(remaining) => {
                debug!(
                    "[{}] Ack for {} (sequence {}), {} outstanding",
                    self.name(),
                    address,
                    sequence,
                    remaining
                );
            }
            AckOutcome::Completed(reply_to) => {
                info!("[{}] Write to {} (sequence {}) fully replicated", self.name(), address, sequence);
                if let Some(endpoint) = reply_to {
                    self.deliver(&endpoint, Reply::WriteAck { address, sequence }).await;
                }
            }
            AckOutcome::Unknown => {
                debug!(
                    "[{}] Ignoring ack for unknown write {} (sequence {})",
                    self.name(),
                    address,
                    sequence
                );
            }
        }
        Ok(())
    }

    async fn fire_deferred(&self, watermark: Sequence) {
        for read in self.deferred.drain_up_to(watermark) {
            self.serve_read(read).await;
        }
    }

    async fn forward(&self, msg: DsmMessage) -> DsmResult<()> {
        let group = self.config.group_for(msg.address)?;
        let target = match msg.kind {
            MessageKind::Read if group.len() > 1 => {
                let index = rand::thread_rng().gen_range(1..group.len());
                group[index].clone()
            }
            _ => group[0].clone(),
        };

        if target == self.role.name {
            return Err(DsmError::protocol(format!(
                "{} for address {} routes back to {}",
                msg.kind, msg.address, target
            )));
        }

        self.transport.send(&target, msg).await
    }

    async fn deliver(&self, endpoint: &str, reply: Reply) {
        if let Err(e) = self.transport.reply(endpoint, reply).await {
            error!("[{}] Failed to send reply to {}: {}", self.name(), endpoint, e);
        }
    }

    /// Drops in-flight writes and deferred reads older than `max_age`, telling
    /// their callers the operation failed. Returns how many entries were removed.
    pub async fn reap_expired(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let writes = self.in_flight.expire(cutoff);
        let reads = self.deferred.expire(cutoff);
        let reaped = writes.len() + reads.len();

        for ((address, sequence), write) in writes {
            warn!(
                "[{}] Write to {} (sequence {}) expired with {} of {:?} acks outstanding",
                self.name(),
                address,
                sequence,
                write.remaining,
                write.replicas
            );
            if let Some(endpoint) = write.reply_to {
                let reply = Reply::Failed {
                    address,
                    sequence,
                    reason: format!(
                        "replication did not complete, {} of {} replicas never acked",
                        write.remaining,
                        write.replicas.len()
                    ),
                };
                self.deliver(&endpoint, reply).await;
            }
        }

        for read in reads {
            warn!(
                "[{}] Deferred READ of {} expired waiting for sequence {} (watermark {})",
                self.name(),
                read.address,
                read.sequence,
                self.store.watermark()
            );
            if let Some(endpoint) = read.reply_to {
                let reply = Reply::Failed {
                    address: read.address,
                    sequence: read.sequence,
                    reason: format!("sequence {} was never reached", read.sequence),
                };
                self.deliver(&endpoint, reply).await;
            }
        }

        reaped
    }
}

/// Drains `inbox`, handling each message on its own task.
pub fn serve(node: Arc<DsmNode>, mut inbox: mpsc::UnboundedReceiver<DsmMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("DsmNode {} is now listening for messages", node.name());
        while let Some(msg) = inbox.recv().await {
            let node = node.clone();
            tokio::spawn(async move {
                node.handle(msg).await;
            });
        }
        debug!("Inbox of {} closed", node.name());
    })
}
