//! # transport
//!
//! why: abstract the blocking call-a-procedure-on-a-peer primitive
//! relations: used by proposer.rs for every outbound call, implemented over tcp in paxos-server
//! what: Transport trait, LocalNetwork (in-process routing for tests and simulations)

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::error::{PaxosError, TransportError};
use crate::message::{Procedure, ProposalMessage};
use crate::node::PaxosNode;

/// Outbound calls to named peers.
///
/// Implementations must bound each call in time. A timeout is reported as
/// `TransportError::Timeout` and the proposer treats it like a NACK.
pub trait Transport: Send + Sync {
    fn call(
        &self,
        peer: &str,
        procedure: Procedure,
        message: &ProposalMessage,
    ) -> Result<ProposalMessage, TransportError>;
}

// -- in-process network --

/// Routes calls directly to registered nodes in the same process.
///
/// Nodes are held weakly so a cluster can be dropped by dropping its nodes.
#[derive(Debug, Default)]
pub struct LocalNetwork {
    nodes: RwLock<HashMap<String, Weak<PaxosNode>>>,
    offline: RwLock<HashSet<String>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `node` reachable under its own name.
    pub fn register(&self, node: &Arc<PaxosNode>) {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.name().to_owned(), Arc::downgrade(node));
    }

    /// Calls to `peer` fail as unreachable until `bring_online`.
    pub fn take_offline(&self, peer: &str) {
        debug!(peer, "taking peer offline");
        self.offline
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.to_owned());
    }

    pub fn bring_online(&self, peer: &str) {
        debug!(peer, "bringing peer online");
        self.offline
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer);
    }

    pub fn is_online(&self, peer: &str) -> bool {
        !self
            .offline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(peer)
    }

    fn lookup(&self, peer: &str) -> Option<Arc<PaxosNode>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .and_then(Weak::upgrade)
    }
}

impl Transport for LocalNetwork {
    fn call(
        &self,
        peer: &str,
        procedure: Procedure,
        message: &ProposalMessage,
    ) -> Result<ProposalMessage, TransportError> {
        if !self.is_online(peer) {
            return Err(TransportError::Unreachable(peer.to_owned()));
        }
        // no lock is held while the peer handles the call
        let node = self
            .lookup(peer)
            .ok_or_else(|| TransportError::Unreachable(peer.to_owned()))?;

        node.handle(procedure, message).map_err(|err| match err {
            PaxosError::NodeCrashed(_) => TransportError::Unreachable(peer.to_owned()),
        })
    }
}
