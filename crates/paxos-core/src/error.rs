//! # error
//!
//! why: typed failures for everything that is not a protocol outcome
//! relations: returned by node.rs handlers, transport.rs implementations, config.rs
//! what: PaxosError, TransportError, ConfigError

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures of a node-level operation. A NACK is not an error, and neither
/// is a peer or store failure, which the protocol reports as NACK.
#[derive(Debug, Error)]
pub enum PaxosError {
    /// the failure injector stopped this node
    #[error("node {0} has crashed")]
    NodeCrashed(String),
}

/// Failures of an outbound call. The proposer counts all of these as NACK.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} is unreachable")]
    Unreachable(String),

    #[error("call to {peer} timed out after {timeout:?}")]
    Timeout { peer: String, timeout: Duration },

    #[error("io failure talking to {peer}: {source}")]
    Io {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),

    /// the peer answered with an error instead of a message
    #[error("peer {peer} failed: {reason}")]
    Remote { peer: String, reason: String },
}

/// Invalid cluster or node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("peer list is empty")]
    EmptyCluster,

    #[error("peer {0} listed more than once")]
    DuplicatePeer(String),

    #[error("node {0} is not in the peer list")]
    SelfNotInPeers(String),

    #[error("failure rate {0} is outside 0..=100")]
    InvalidFailureRate(u8),

    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
