use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_name: String,

    pub bind_addr: String,
    pub bind_port: u16,

    /// Partition config document produced by `flockmem generate`.
    pub cluster_file: PathBuf,

    pub peers: Vec<PeerConfig>,

    pub request_timeout_ms: u64,
    pub replication_timeout_ms: u64,
    pub reap_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub addr: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "NodeA".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            bind_port: 9000,
            cluster_file: PathBuf::from("dsm_config.json"),
            peers: Vec::new(),
            request_timeout_ms: 5_000,
            replication_timeout_ms: 30_000,
            reap_interval_secs: 5,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &PathBuf) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    /// Peer table including this node itself.
    pub fn peer_table(&self) -> HashMap<String, String> {
        let mut table: HashMap<String, String> = self
            .peers
            .iter()
            .map(|p| (p.name.clone(), p.addr.clone()))
            .collect();
        table
            .entry(self.node_name.clone())
            .or_insert_with(|| format!("127.0.0.1:{}", self.bind_port));
        table
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn replication_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.replication_timeout_ms as i64)
    }
}
