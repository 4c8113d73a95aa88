use crate::error::{DsmError, DsmResult};
use crate::partition::PartitionConfig;
use crate::types::{NodeId, NodeRole};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Derives one role per (partition, member), in partition then member order.
pub fn create_roles(config: &PartitionConfig) -> DsmResult<Vec<NodeRole>> {
    if config.num_partitions() == 0 {
        return Err(DsmError::config("partition config has no partitions"));
    }

    let mut roles = Vec::with_capacity(config.node_names().len());
    for (partition_id, group) in config.groups().iter().enumerate() {
        let (start, end) = config.range_of(partition_id).ok_or_else(|| {
            DsmError::config(format!("partition {} has no address range", partition_id))
        })?;

        for (index, name) in group.iter().enumerate() {
            let replica_nodes = group
                .iter()
                .filter(|member| *member != name)
                .cloned()
                .collect();

            roles.push(NodeRole {
                name: name.clone(),
                start_address: start,
                end_address: end,
                primary: index == 0,
                replica_nodes,
            });
        }
    }

    Ok(roles)
}

/// The partition config document distributed to every node before it serves.
///
/// Serialised as a bare JSON array of roles. Order is significant: nodes re-derive
/// the routing table from it, so every node must load an identical copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterDocument {
    roles: Vec<NodeRole>,
}

impl ClusterDocument {
    pub fn generate(
        total_addresses: u32,
        replication_factor: usize,
        node_names: Vec<NodeId>,
    ) -> DsmResult<Self> {
        let config = PartitionConfig::build(total_addresses, replication_factor, node_names)?;
        Ok(Self {
            roles: create_roles(&config)?,
        })
    }

    pub fn from_roles(roles: Vec<NodeRole>) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &[NodeRole] {
        &self.roles
    }

    pub fn node_names(&self) -> Vec<NodeId> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    pub fn role_for(&self, name: &str) -> DsmResult<&NodeRole> {
        self.roles
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| DsmError::config(format!("no role found for node {}", name)))
    }

    /// Rebuilds the routing table from the document alone and checks that it
    /// reproduces the document exactly.
    pub fn derive_config(&self) -> DsmResult<PartitionConfig> {
        let first = self
            .roles
            .first()
            .ok_or_else(|| DsmError::config("cluster document lists no nodes"))?;

        let max_end = self
            .roles
            .iter()
            .map(|r| r.end_address)
            .max()
            .unwrap_or(first.end_address);
        let total_addresses = max_end
            .checked_add(1)
            .ok_or_else(|| DsmError::config("address range exceeds u32"))?;
        let replication_factor = first.replica_nodes.len();

        let config = PartitionConfig::build(total_addresses, replication_factor, self.node_names())?;
        let expected = create_roles(&config)?;
        if expected != self.roles {
            return Err(DsmError::config(
                "cluster document does not match the layout derived from its own node order",
            ));
        }

        Ok(config)
    }

    pub fn to_json_pretty(&self) -> DsmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> DsmResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> DsmResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let doc = Self::from_json(&content)?;
        info!("Loaded cluster document with {} roles from {:?}", doc.roles.len(), path);
        Ok(doc)
    }

    pub fn save(&self, path: &Path) -> DsmResult<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
