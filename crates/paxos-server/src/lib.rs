//! # paxos-server
//!
//! why: run a replica as a long-lived process and talk to it from the command line
//! relations: wraps paxos-core's PaxosNode, picks a paxos-storage backend
//! what: cli definitions, tcp transport and server loop, node bootstrap

pub mod cli;
pub mod rpc;

pub use rpc::{serve, RpcRequest, RpcResponse, TcpTransport};
