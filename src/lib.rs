pub mod api;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod node;
pub mod partition;
pub mod transport;
pub mod types;

pub use api::create_router;
pub use bootstrap::{create_roles, ClusterDocument};
pub use client::{parse_command, Command, DsmClient, ScriptOutcome, Session};
pub use config::{NodeConfig, PeerConfig};
pub use daemon::NodeDaemon;
pub use error::{DsmError, DsmResult};
pub use node::DsmNode;
pub use partition::PartitionConfig;
pub use transport::{HttpTransport, LocalTransport, ReplyRegistry, Transport};
pub use types::*;
