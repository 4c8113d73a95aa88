use crate::types::{Address, Sequence};
use thiserror::Error;

pub type DsmResult<T> = Result<T, DsmError>;

#[derive(Debug, Error)]
pub enum DsmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("address {address} is out of bounds (max allowed = {max})")]
    Range { address: u32, max: u32 },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out waiting on address {address} (sequence {sequence})")]
    Timeout { address: Address, sequence: Sequence },

    #[error("operation failed: {0}")]
    Failed(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DsmError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
