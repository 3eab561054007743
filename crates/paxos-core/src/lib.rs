//! # paxos-core
//!
//! why: replicate put/delete on an integer key-value map across a fixed cluster
//! relations: applies learned operations to paxos-storage, served over tcp by paxos-server
//! what: acceptor, learner, proposer, quorum reads with read-repair, fault injection

pub mod acceptor;
pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod learner;
pub mod message;
pub mod node;
pub mod proposer;
pub mod quorum;
pub mod transport;

pub use acceptor::{Acceptor, AcceptorState};
pub use config::{quorum_size, ClusterConfig, NodeConfig};
pub use error::{ConfigError, PaxosError, TransportError};
pub use fault::{CrashAfter, CrashMode, FailureInjector, FaultPolicy, NoFaults, RandomFaults};
pub use learner::Learner;
pub use message::{Command, Procedure, ProposalMessage, Status, NO_VALUE};
pub use node::PaxosNode;
pub use transport::{LocalNetwork, Transport};
