//! # node
//!
//! why: bundle the roles of one replica behind a single dispatch point
//! relations: owns acceptor.rs, learner.rs, proposer.rs, fault.rs; served by transport implementations
//! what: PaxosNode (client operations, peer handlers, handle dispatch)

use std::sync::Arc;

use paxos_storage::{InMemoryStore, Key, Value};

use crate::acceptor::{Acceptor, AcceptorState};
use crate::clock::LogicalClock;
use crate::config::ClusterConfig;
use crate::error::PaxosError;
use crate::fault::FailureInjector;
use crate::learner::{BoxedStore, Learner};
use crate::message::{Procedure, ProposalMessage};
use crate::proposer::Proposer;
use crate::transport::Transport;

/// One replica: acceptor, learner and proposer sharing a clock and a store.
#[derive(Debug)]
pub struct PaxosNode {
    name: String,
    clock: Arc<LogicalClock>,
    acceptor: Acceptor,
    learner: Arc<Learner>,
    proposer: Proposer,
    injector: FailureInjector,
}

impl PaxosNode {
    /// Node with an in-memory store and no fault injection.
    pub fn new(cluster: ClusterConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(
            cluster,
            transport,
            Box::new(InMemoryStore::new()),
            FailureInjector::disabled(),
        )
    }

    pub fn with_parts(
        cluster: ClusterConfig,
        transport: Arc<dyn Transport>,
        store: BoxedStore,
        injector: FailureInjector,
    ) -> Self {
        let name = cluster.self_name().to_owned();
        let clock = Arc::new(LogicalClock::new());
        let learner = Arc::new(Learner::new(name.clone(), store));
        let proposer = Proposer::new(cluster, clock.clone(), learner.clone(), transport);

        Self {
            acceptor: Acceptor::new(name.clone()),
            name,
            clock,
            learner,
            proposer,
            injector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> u64 {
        self.clock.current()
    }

    pub fn acceptor_state(&self) -> AcceptorState {
        self.acceptor.state()
    }

    /// Read this node's own store, bypassing the protocol.
    pub fn local_value(&self, key: Key) -> Option<Value> {
        self.learner.lookup(key)
    }

    pub fn is_crashed(&self) -> bool {
        self.injector.is_crashed()
    }

    /// Entry point for every inbound call.
    pub fn handle(
        &self,
        procedure: Procedure,
        message: &ProposalMessage,
    ) -> Result<ProposalMessage, PaxosError> {
        self.injector.check(&self.name, procedure)?;

        // this node's next round starts above any clock it has promised or learned
        if procedure.is_consensus_rpc() {
            self.clock.observe(message.logical_clock);
        }

        let response = match procedure {
            Procedure::Put | Procedure::Delete => self.proposer.propose(message),
            Procedure::Get => self.proposer.get(message),
            Procedure::Prepare => self.acceptor.prepare(message),
            Procedure::Accept => self.acceptor.accept(message),
            Procedure::Learn => self.learner.learn(message),
        };
        Ok(response)
    }

    // -- client operations --

    pub fn put(&self, key: Key, value: Value) -> Result<ProposalMessage, PaxosError> {
        self.handle(Procedure::Put, &ProposalMessage::put(key, value))
    }

    pub fn delete(&self, key: Key) -> Result<ProposalMessage, PaxosError> {
        self.handle(Procedure::Delete, &ProposalMessage::delete(key))
    }

    pub fn get(&self, key: Key) -> Result<ProposalMessage, PaxosError> {
        self.handle(Procedure::Get, &ProposalMessage::get(key))
    }

    // -- peer handlers --

    pub fn prepare(&self, message: &ProposalMessage) -> Result<ProposalMessage, PaxosError> {
        self.handle(Procedure::Prepare, message)
    }

    pub fn accept(&self, message: &ProposalMessage) -> Result<ProposalMessage, PaxosError> {
        self.handle(Procedure::Accept, message)
    }

    pub fn learn(&self, message: &ProposalMessage) -> Result<ProposalMessage, PaxosError> {
        self.handle(Procedure::Learn, message)
    }
}
