//! # config
//!
//! why: describe the fixed cluster and the tunables of a single node
//! relations: ClusterConfig drives proposer.rs loops, NodeConfig is read by paxos-server
//! what: ClusterConfig (peer order, self identity, quorum size), NodeConfig

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Majority of `peer_count`: ⌊N/2⌋ + 1.
pub fn quorum_size(peer_count: usize) -> usize {
    peer_count / 2 + 1
}

/// Ordered peer list plus the name of this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    peers: Vec<String>,
    self_name: String,
}

impl ClusterConfig {
    /// Validates that the list is non-empty, has no duplicates and
    /// contains `self_name`.
    pub fn new(peers: Vec<String>, self_name: impl Into<String>) -> Result<Self, ConfigError> {
        let self_name = self_name.into();
        if peers.is_empty() {
            return Err(ConfigError::EmptyCluster);
        }

        let mut seen = HashSet::new();
        for peer in &peers {
            if !seen.insert(peer.as_str()) {
                return Err(ConfigError::DuplicatePeer(peer.clone()));
            }
        }

        if !seen.contains(self_name.as_str()) {
            return Err(ConfigError::SelfNotInPeers(self_name));
        }

        Ok(Self { peers, self_name })
    }

    /// Parse a peer file: one name per line, blank lines and `#` comments skipped.
    pub fn from_peer_list(text: &str, self_name: impl Into<String>) -> Result<Self, ConfigError> {
        let peers = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Self::new(peers, self_name)
    }

    pub fn load_peer_file(path: &Path, self_name: impl Into<String>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_peer_list(&text, self_name)
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    pub fn is_self(&self, peer: &str) -> bool {
        peer == self.self_name
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn quorum_size(&self) -> usize {
        quorum_size(self.peers.len())
    }
}

/// Per-node tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Bound on every outbound call, in milliseconds.
    pub rpc_timeout_ms: u64,
    /// Percent chance, per inbound consensus rpc, that the node crashes.
    pub failure_rate: u8,
    /// Directory for a file-backed value store. In-memory when unset.
    pub store_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 2000,
            failure_rate: 0,
            store_path: None,
        }
    }
}

impl NodeConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_rate > 100 {
            return Err(ConfigError::InvalidFailureRate(self.failure_rate));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
