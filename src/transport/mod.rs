mod http;
mod local;
mod registry;

pub use http::*;
pub use local::*;
pub use registry::*;

use crate::error::DsmResult;
use crate::types::*;
use async_trait::async_trait;

/// Message channel between nodes and callers.
///
/// Delivery is assumed at-least-once with no ordering across destinations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers a protocol message to the inbox of `destination`.
    async fn send(&self, destination: &str, message: DsmMessage) -> DsmResult<()>;

    /// Delivers a caller-facing reply to a reply endpoint.
    async fn reply(&self, endpoint: &str, reply: Reply) -> DsmResult<()>;
}
