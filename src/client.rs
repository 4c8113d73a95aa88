use crate::error::{DsmError, DsmResult};
use crate::transport::{ReplyRegistry, Transport};
use crate::types::*;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-caller record of the latest sequence observed for each address.
///
/// Passing the recorded sequence on the next operation makes the serving node
/// wait until it has applied at least that write.
#[derive(Debug, Clone, Default)]
pub struct Session {
    known: HashMap<Address, Sequence>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_sequence(&self, address: Address) -> Sequence {
        self.known.get(&address).copied().unwrap_or(0)
    }

    pub fn observe(&mut self, address: Address, sequence: Sequence) {
        let entry = self.known.entry(address).or_insert(0);
        *entry = (*entry).max(sequence);
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

pub struct DsmClient {
    transport: Arc<dyn Transport>,
    registry: ReplyRegistry,
    entry_nodes: Vec<NodeId>,
    timeout: Duration,
}

impl DsmClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: ReplyRegistry,
        entry_nodes: Vec<NodeId>,
        timeout: Duration,
    ) -> DsmResult<Self> {
        if entry_nodes.is_empty() {
            return Err(DsmError::config("client needs at least one entry node"));
        }
        Ok(Self {
            transport,
            registry,
            entry_nodes,
            timeout,
        })
    }

    pub fn registry(&self) -> &ReplyRegistry {
        &self.registry
    }

    fn pick_entry(&self) -> &str {
        self.entry_nodes
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Writes `value` and waits until every replica has applied it. Returns the
    /// sequence the primary assigned.
    pub async fn write(&self, session: &mut Session, address: Address, value: i64) -> DsmResult<Sequence> {
        let known = session.known_sequence(address);
        let reply = self
            .request(address, known, |endpoint| {
                DsmMessage::write(address, value, Some(endpoint), known)
            })
            .await?;

        match reply {
            Reply::WriteAck { sequence, .. } => {
                session.observe(address, sequence);
                Ok(sequence)
            }
            Reply::Failed { reason, .. } => Err(DsmError::Failed(reason)),
            other => Err(DsmError::protocol(format!("unexpected reply to WRITE: {:?}", other))),
        }
    }

    pub async fn read(&self, session: &mut Session, address: Address) -> DsmResult<i64> {
        let known = session.known_sequence(address);
        let reply = self
            .request(address, known, |endpoint| {
                DsmMessage::read(address, Some(endpoint), known)
            })
            .await?;

        match reply {
            Reply::Value { value, .. } => Ok(value),
            Reply::Failed { reason, .. } => Err(DsmError::Failed(reason)),
            other => Err(DsmError::protocol(format!("unexpected reply to READ: {:?}", other))),
        }
    }

    async fn request(
        &self,
        address: Address,
        sequence: Sequence,
        build: impl FnOnce(String) -> DsmMessage,
    ) -> DsmResult<Reply> {
        let (endpoint, rx) = self.registry.register();
        let msg = build(endpoint.clone());
        let entry = self.pick_entry().to_string();
        debug!("Sending {} for address {} to {}", msg.kind, address, entry);

        if let Err(e) = self.transport.send(&entry, msg).await {
            self.registry.cancel(&endpoint);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(DsmError::transport(format!("reply endpoint {} was dropped", endpoint))),
            Err(_) => {
                self.registry.cancel(&endpoint);
                Err(DsmError::Timeout { address, sequence })
            }
        }
    }

    /// Runs a request script of `read <addr>` / `write <addr> <value>` lines.
    pub async fn run_script(&self, session: &mut Session, script: &str) -> Vec<ScriptOutcome> {
        let mut outcomes = Vec::new();
        for line in script.lines() {
            let command = match parse_command(line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(reason) => {
                    warn!("Skipping line {:?}: {}", line.trim(), reason);
                    outcomes.push(ScriptOutcome::Skipped {
                        line: line.trim().to_string(),
                        reason,
                    });
                    continue;
                }
            };

            let outcome = match command {
                Command::Read { address } => match self.read(session, address).await {
                    Ok(value) => {
                        info!("Value at address {}: {}", address, value);
                        ScriptOutcome::Read { address, value }
                    }
                    Err(e) => ScriptOutcome::Failed {
                        line: line.trim().to_string(),
                        error: e.to_string(),
                    },
                },
                Command::Write { address, value } => match self.write(session, address, value).await {
                    Ok(sequence) => {
                        info!("Wrote {} at address {} (sequence {})", value, address, sequence);
                        ScriptOutcome::Wrote {
                            address,
                            value,
                            sequence,
                        }
                    }
                    Err(e) => ScriptOutcome::Failed {
                        line: line.trim().to_string(),
                        error: e.to_string(),
                    },
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read { address: Address },
    Write { address: Address, value: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScriptOutcome {
    Read {
        address: Address,
        value: i64,
    },
    Wrote {
        address: Address,
        value: i64,
        sequence: Sequence,
    },
    Skipped {
        line: String,
        reason: String,
    },
    Failed {
        line: String,
        error: String,
    },
}

/// Parses one script line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() < 2 {
        return Err("missing address".to_string());
    }

    let address = tokens[1]
        .parse::<u32>()
        .map(Address::new)
        .map_err(|_| format!("invalid address {}", tokens[1]))?;

    match tokens[0].to_lowercase().as_str() {
        "read" => Ok(Some(Command::Read { address })),
        "write" => {
            let raw = tokens.get(2).ok_or_else(|| "write requires a value".to_string())?;
            let value = raw
                .parse::<i64>()
                .map_err(|_| format!("invalid value {}", raw))?;
            Ok(Some(Command::Write { address, value }))
        }
        other => Err(format!("unknown operation {}", other)),
    }
}
