use crate::error::{DsmError, DsmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type NodeId = String;
pub type Sequence = u64;

/// A slot in the global address space. Negative addresses cannot be represented,
/// so a negative `value` on the wire fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub value: u32,
}

impl Address {
    pub fn new(value: u32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

impl From<u32> for Address {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Write,
    Read,
    Replicate,
    ReplicateAck,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Write => "WRITE",
            MessageKind::Read => "READ",
            MessageKind::Replicate => "REPLICATE",
            MessageKind::ReplicateAck => "REPLICATE_ACK",
        };
        f.write_str(name)
    }
}

/// In-memory form of a DSM message.
///
/// `reply_to` is the caller's reply endpoint (WRITE, READ). `origin` names the
/// primary on REPLICATE and is echoed back unchanged on REPLICATE_ACK. Both travel
/// in the single `replyToQueue` wire field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsmMessage {
    pub kind: MessageKind,
    pub address: Address,
    pub value: Option<String>,
    pub reply_to: Option<String>,
    pub origin: Option<NodeId>,
    pub sequence: Sequence,
}

impl DsmMessage {
    pub fn write(address: Address, value: i64, reply_to: Option<String>, sequence: Sequence) -> Self {
        Self {
            kind: MessageKind::Write,
            address,
            value: Some(value.to_string()),
            reply_to,
            origin: None,
            sequence,
        }
    }

    pub fn read(address: Address, reply_to: Option<String>, sequence: Sequence) -> Self {
        Self {
            kind: MessageKind::Read,
            address,
            value: None,
            reply_to,
            origin: None,
            sequence,
        }
    }

    pub fn replicate(address: Address, value: String, origin: NodeId, sequence: Sequence) -> Self {
        Self {
            kind: MessageKind::Replicate,
            address,
            value: Some(value),
            reply_to: None,
            origin: Some(origin),
            sequence,
        }
    }

    pub fn replicate_ack(address: Address, origin: NodeId, sequence: Sequence) -> Self {
        Self {
            kind: MessageKind::ReplicateAck,
            address,
            value: None,
            reply_to: None,
            origin: Some(origin),
            sequence,
        }
    }

    /// Decodes the string payload carried by WRITE and REPLICATE.
    pub fn parse_value(&self) -> DsmResult<i64> {
        let raw = self.value.as_deref().ok_or_else(|| {
            DsmError::protocol(format!("{} for address {} carries no value", self.kind, self.address))
        })?;
        raw.trim().parse::<i64>().map_err(|e| {
            DsmError::protocol(format!(
                "{} for address {} has malformed value {:?}: {}",
                self.kind, self.address, raw, e
            ))
        })
    }

    pub fn to_json(&self) -> DsmResult<String> {
        Ok(serde_json::to_string(&WireMessage::from(self.clone()))?)
    }

    pub fn from_json(data: &[u8]) -> DsmResult<Self> {
        let wire: WireMessage = serde_json::from_slice(data)?;
        Ok(wire.into())
    }
}

/// Wire envelope with the fixed field names shared by every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub address: Address,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub reply_to_queue: Option<String>,
    #[serde(default)]
    pub sequence_number: Sequence,
}

impl From<DsmMessage> for WireMessage {
    fn from(msg: DsmMessage) -> Self {
        let reply_to_queue = match msg.kind {
            MessageKind::Write | MessageKind::Read => msg.reply_to,
            MessageKind::Replicate | MessageKind::ReplicateAck => msg.origin,
        };
        Self {
            kind: msg.kind,
            address: msg.address,
            value: msg.value,
            reply_to_queue,
            sequence_number: msg.sequence,
        }
    }
}

impl From<WireMessage> for DsmMessage {
    fn from(wire: WireMessage) -> Self {
        let (reply_to, origin) = match wire.kind {
            MessageKind::Write | MessageKind::Read => (wire.reply_to_queue, None),
            MessageKind::Replicate | MessageKind::ReplicateAck => (None, wire.reply_to_queue),
        };
        Self {
            kind: wire.kind,
            address: wire.address,
            value: wire.value,
            reply_to,
            origin,
            sequence: wire.sequence_number,
        }
    }
}

/// Caller-facing answer delivered to a reply endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Value {
        address: Address,
        value: i64,
        sequence: Sequence,
    },
    WriteAck {
        address: Address,
        sequence: Sequence,
    },
    Failed {
        address: Address,
        sequence: Sequence,
        reason: String,
    },
}

impl Reply {
    pub fn address(&self) -> Address {
        match self {
            Reply::Value { address, .. }
            | Reply::WriteAck { address, .. }
            | Reply::Failed { address, .. } => *address,
        }
    }
}

/// One entry of the partition config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRole {
    pub name: NodeId,
    pub start_address: u32,
    pub end_address: u32,
    pub primary: bool,
    pub replica_nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub name: NodeId,
    pub start_address: u32,
    pub end_address: u32,
    pub primary: bool,
    pub replica_nodes: Vec<NodeId>,
    pub watermark: Sequence,
    pub in_flight_writes: usize,
    pub deferred_reads: usize,
}
