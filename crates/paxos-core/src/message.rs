//! # message
//!
//! why: define the single message shape exchanged by every protocol step
//! relations: produced and consumed by acceptor.rs, learner.rs, proposer.rs, carried by transport.rs
//! what: Command, Status, Procedure, ProposalMessage

use std::fmt;

use paxos_storage::{Key, Value};
use serde::{Deserialize, Serialize};

/// Placeholder value carried by GET queries and DELETE proposals.
pub const NO_VALUE: Value = -1;

/// The operation a message concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Put,
    Delete,
    Get,
}

impl Command {
    /// PUT and DELETE go through prepare/accept, GET does not.
    pub fn is_mutation(self) -> bool {
        matches!(self, Command::Put | Command::Delete)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Put => "PUT",
            Command::Delete => "DEL",
            Command::Get => "GET",
        };
        f.write_str(name)
    }
}

/// Role-dependent outcome of a protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// request carrier, learn success, client success
    Ok,
    /// acceptor promised the prepare's clock
    Promise,
    /// acceptor accepted the proposal
    Accept,
    /// rejection or failure
    Nack,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Promise => "PROMISE",
            Status::Accept => "ACCEPT",
            Status::Nack => "NACK",
        };
        f.write_str(name)
    }
}

/// Remote procedures a node serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Procedure {
    /// client-facing, mutation path
    Put,
    /// client-facing, mutation path
    Delete,
    /// client-facing, quorum read
    Get,
    /// proposer -> acceptor, phase 1
    Prepare,
    /// proposer -> acceptor, phase 2
    Accept,
    /// proposer -> learner, commit broadcast and read query
    Learn,
}

impl Procedure {
    /// Handlers for these procedures pass through the failure injector.
    pub fn is_consensus_rpc(self) -> bool {
        matches!(self, Procedure::Prepare | Procedure::Accept | Procedure::Learn)
    }

    /// Client-facing procedure for a command.
    pub fn for_command(command: Command) -> Self {
        match command {
            Command::Put => Procedure::Put,
            Command::Delete => Procedure::Delete,
            Command::Get => Procedure::Get,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Procedure::Put => "PUT",
            Procedure::Delete => "DEL",
            Procedure::Get => "GET",
            Procedure::Prepare => "PREPARE",
            Procedure::Accept => "ACCEPT",
            Procedure::Learn => "LEARN",
        };
        f.write_str(name)
    }
}

/// The message exchanged by clients, proposers, acceptors and learners.
///
/// `(command, key, value)` stays fixed for the whole round; only
/// `logical_clock` and `status` change as the message is echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalMessage {
    pub command: Command,
    /// round number of the proposal
    pub logical_clock: u64,
    pub key: Key,
    pub value: Value,
    pub status: Status,
    /// reserved, always zero
    pub originating_process: u32,
}

impl ProposalMessage {
    pub fn new(command: Command, key: Key, value: Value) -> Self {
        Self {
            command,
            logical_clock: 0,
            key,
            value,
            status: Status::Ok,
            originating_process: 0,
        }
    }

    pub fn put(key: Key, value: Value) -> Self {
        Self::new(Command::Put, key, value)
    }

    pub fn delete(key: Key) -> Self {
        Self::new(Command::Delete, key, NO_VALUE)
    }

    pub fn get(key: Key) -> Self {
        Self::new(Command::Get, key, NO_VALUE)
    }

    pub fn with_clock(mut self, clock: u64) -> Self {
        self.logical_clock = clock;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Same content, new status and clock.
    pub fn reply(&self, status: Status, clock: u64) -> Self {
        self.clone().with_status(status).with_clock(clock)
    }

    /// True when both messages describe the same proposal: same
    /// command, key, value and clock. Status is ignored.
    pub fn same_proposal(&self, other: &ProposalMessage) -> bool {
        self.command == other.command
            && self.key == other.key
            && self.value == other.value
            && self.logical_clock == other.logical_clock
    }
}

impl fmt::Display for ProposalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command {
            Command::Put => write!(
                f,
                "{}_PUT(L={}, K={}, V={})",
                self.status, self.logical_clock, self.key, self.value
            ),
            Command::Delete | Command::Get => write!(
                f,
                "{}_{}(L={}, K={})",
                self.status, self.command, self.logical_clock, self.key
            ),
        }
    }
}
