//! Deterministic address routing table.
//!
//! Every node builds the same table from the same inputs and routes without
//! asking anyone. The table must therefore be a pure function of
//! `(total_addresses, replication_factor, node_names)`.

use crate::error::{DsmError, DsmResult};
use crate::types::{Address, NodeId};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    total_addresses: u32,
    replication_factor: usize,
    node_names: Vec<NodeId>,
    groups: Vec<Vec<NodeId>>,
}

impl PartitionConfig {
    pub fn build(
        total_addresses: u32,
        replication_factor: usize,
        node_names: Vec<NodeId>,
    ) -> DsmResult<Self> {
        if total_addresses == 0 {
            return Err(DsmError::config("total addresses must be greater than zero"));
        }
        if node_names.is_empty() {
            return Err(DsmError::config("node list is empty, no partitions can be formed"));
        }

        let group_size = replication_factor + 1;
        if node_names.len() % group_size != 0 {
            return Err(DsmError::config(format!(
                "{} nodes cannot be split into groups of {} (replication factor {})",
                node_names.len(),
                group_size,
                replication_factor
            )));
        }

        let mut seen = HashSet::new();
        for name in &node_names {
            if !seen.insert(name.as_str()) {
                return Err(DsmError::config(format!("node {} is listed more than once", name)));
            }
        }

        let num_partitions = node_names.len() / group_size;
        if num_partitions as u64 > total_addresses as u64 {
            return Err(DsmError::config(format!(
                "{} partitions cannot share {} addresses",
                num_partitions, total_addresses
            )));
        }

        let groups = node_names
            .chunks(group_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        Ok(Self {
            total_addresses,
            replication_factor,
            node_names,
            groups,
        })
    }

    pub fn total_addresses(&self) -> u32 {
        self.total_addresses
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn node_names(&self) -> &[NodeId] {
        &self.node_names
    }

    pub fn num_partitions(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[Vec<NodeId>] {
        &self.groups
    }

    fn partition_size(&self) -> u32 {
        self.total_addresses / self.groups.len() as u32
    }

    pub fn partition_of(&self, address: Address) -> DsmResult<usize> {
        if address.value() >= self.total_addresses {
            return Err(DsmError::Range {
                address: address.value(),
                max: self.total_addresses - 1,
            });
        }
        let partition_id = (address.value() / self.partition_size()) as usize;
        // The last partition absorbs the remainder of the division.
        Ok(partition_id.min(self.groups.len() - 1))
    }

    /// Ordered group owning `address`: index 0 is the primary.
    pub fn group_for(&self, address: Address) -> DsmResult<&[NodeId]> {
        let partition_id = self.partition_of(address)?;
        Ok(&self.groups[partition_id])
    }

    pub fn primary_of(&self, address: Address) -> DsmResult<&NodeId> {
        let group = self.group_for(address)?;
        Ok(&group[0])
    }

    /// Inclusive address range of a partition.
    pub fn range_of(&self, partition_id: usize) -> Option<(u32, u32)> {
        if partition_id >= self.groups.len() {
            return None;
        }
        let size = self.partition_size();
        let start = partition_id as u32 * size;
        let end = if partition_id == self.groups.len() - 1 {
            self.total_addresses - 1
        } else {
            start + size - 1
        };
        Some((start, end))
    }

    pub fn partition_of_node(&self, name: &str) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| group.iter().any(|member| member == name))
    }
}
