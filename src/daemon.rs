use crate::bootstrap::ClusterDocument;
use crate::client::DsmClient;
use crate::config::NodeConfig;
use crate::node::DsmNode;
use crate::transport::{HttpTransport, ReplyRegistry, Transport};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A node process: the engine, its HTTP transport and a client for the
/// caller-facing API, all wired at construction.
pub struct NodeDaemon {
    node: Arc<DsmNode>,
    client: Arc<DsmClient>,
    registry: ReplyRegistry,
    config: NodeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeDaemon {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let document = ClusterDocument::load(&config.cluster_file)?;
        Self::with_document(config, &document)
    }

    pub fn with_document(config: NodeConfig, document: &ClusterDocument) -> Result<Self> {
        let registry = ReplyRegistry::new(config.node_name.clone());
        let peers = config.peer_table();
        for name in document.node_names() {
            if !peers.contains_key(&name) {
                warn!("No address configured for cluster member {}", name);
            }
        }

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(peers, registry.clone()));
        let node = Arc::new(DsmNode::from_document(&config.node_name, document, transport.clone())?);

        info!(
            "Loaded DsmNode for {}, range {}..={}, primary? {}, replicas = {:?}",
            node.name(),
            node.role().start_address,
            node.role().end_address,
            node.is_primary(),
            node.role().replica_nodes
        );

        let client = Arc::new(DsmClient::new(
            transport,
            registry.clone(),
            vec![config.node_name.clone()],
            config.request_timeout(),
        )?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            node,
            client,
            registry,
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub async fn run(&self) -> Result<()> {
        info!("DsmNode {} serving on {}", self.node.name(), self.config.listen_addr());

        let reaper = self.spawn_reaper_loop();
        tokio::select! {
            _ = reaper => {
                warn!("Reaper loop exited unexpectedly");
            }
            _ = self.wait_for_shutdown() => {
                info!("Shutdown signal received");
            }
        }
        Ok(())
    }

    fn spawn_reaper_loop(&self) -> tokio::task::JoinHandle<()> {
        let node = self.node.clone();
        let max_age = self.config.replication_timeout();
        let interval = self.config.reap_interval_secs.max(1);
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reaped = node.reap_expired(max_age).await;
                        if reaped > 0 {
                            warn!("Reaped {} expired entries", reaped);
                        } else {
                            debug!("Nothing to reap");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        })
    }

    async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn node(&self) -> &Arc<DsmNode> {
        &self.node
    }

    pub fn client(&self) -> &Arc<DsmClient> {
        &self.client
    }

    pub fn registry(&self) -> &ReplyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
