//! # cli
//!
//! why: parse the command line and turn it into a running node or a client call
//! relations: used by main.rs, builds paxos-core config and paxos-storage backends
//! what: Cli, Commands, ServeArgs, bootstrap helpers

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use paxos_core::{
    ClusterConfig, FailureInjector, NodeConfig, PaxosNode, Procedure, ProposalMessage, Transport,
};
use paxos_core::learner::BoxedStore;
use paxos_storage::{FileStore, InMemoryStore};
use tracing::info;

use crate::rpc::{serve, TcpTransport};

#[derive(Debug, Parser)]
#[command(name = "paxos-kv", version, about = "Paxos-replicated integer key-value store")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append the log stream to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a replica until killed
    Serve(ServeArgs),
    /// Store a value through any replica
    Put {
        #[arg(long)]
        node: String,
        key: i32,
        value: i32,
    },
    /// Delete a key through any replica
    Delete {
        #[arg(long)]
        node: String,
        key: i32,
    },
    /// Quorum-read a key through any replica
    Get {
        #[arg(long)]
        node: String,
        key: i32,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address, also this node's name in the peer list
    #[arg(long)]
    pub listen: String,

    /// File with one peer address per line
    #[arg(long)]
    pub peers: PathBuf,

    /// JSON node config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Percent chance per consensus rpc that the process crashes
    #[arg(long)]
    pub failure_rate: Option<u8>,

    #[arg(long)]
    pub rpc_timeout_ms: Option<u64>,

    /// Directory for a file-backed value store
    #[arg(long)]
    pub store_path: Option<PathBuf>,
}

impl ServeArgs {
    /// Config file (or defaults) with flags applied on top.
    pub fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)
                .with_context(|| format!("loading node config {}", path.display()))?,
            None => NodeConfig::default(),
        };
        if let Some(rate) = self.failure_rate {
            config.failure_rate = rate;
        }
        if let Some(timeout) = self.rpc_timeout_ms {
            config.rpc_timeout_ms = timeout;
        }
        if let Some(path) = &self.store_path {
            config.store_path = Some(path.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

fn open_store(path: Option<&Path>) -> anyhow::Result<BoxedStore> {
    let store: BoxedStore = match path {
        Some(dir) => Box::new(
            FileStore::open(dir).with_context(|| format!("opening store at {}", dir.display()))?,
        ),
        None => Box::new(InMemoryStore::new()),
    };
    Ok(store)
}

/// Build the node and serve until the process is killed.
pub fn run_server(args: &ServeArgs) -> anyhow::Result<()> {
    let config = args.node_config()?;
    let cluster = ClusterConfig::load_peer_file(&args.peers, args.listen.clone())
        .with_context(|| format!("loading peers from {}", args.peers.display()))?;

    info!(
        servers = cluster.peer_count(),
        quorum = cluster.quorum_size(),
        "with {} servers the required servers for a quorum is {}",
        cluster.peer_count(),
        cluster.quorum_size()
    );
    for peer in cluster.peers() {
        info!(peer = %peer, "loaded server");
    }

    let injector = if config.failure_rate > 0 {
        FailureInjector::process_exit(config.failure_rate)
    } else {
        FailureInjector::disabled()
    };
    let transport = Arc::new(TcpTransport::new(config.rpc_timeout()));
    let node = Arc::new(PaxosNode::with_parts(
        cluster,
        transport,
        open_store(config.store_path.as_deref())?,
        injector,
    ));

    let listener = TcpListener::bind(&args.listen)
        .with_context(|| format!("binding {}", args.listen))?;
    serve(listener, node, config.rpc_timeout())?;
    Ok(())
}

/// Send one client request and return the node's reply.
pub fn run_client(node: &str, request: ProposalMessage, timeout: Duration) -> anyhow::Result<ProposalMessage> {
    let transport = TcpTransport::new(timeout);
    let procedure = Procedure::for_command(request.command);
    transport
        .call(node, procedure, &request)
        .with_context(|| format!("calling {procedure} on {node}"))
}
