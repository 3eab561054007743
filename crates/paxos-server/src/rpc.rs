//! # rpc
//!
//! why: carry proposal messages between processes over tcp
//! relations: implements paxos-core's Transport, feeds inbound calls to PaxosNode::handle
//! what: RpcRequest/RpcResponse envelope, TcpTransport, serve loop
//!
//! one connection per call, one json document per line in each direction.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use paxos_core::{PaxosNode, Procedure, ProposalMessage, Transport, TransportError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One inbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub procedure: Procedure,
    pub message: ProposalMessage,
}

/// Answer to one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    Reply(ProposalMessage),
    Failed(String),
}

/// Blocking tcp transport with a per-call timeout.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn classify(&self, peer: &str, err: io::Error) -> TransportError {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout {
                peer: peer.to_owned(),
                timeout: self.timeout,
            },
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => {
                TransportError::Unreachable(peer.to_owned())
            }
            _ => TransportError::Io {
                peer: peer.to_owned(),
                source: err,
            },
        }
    }

    fn exchange(&self, peer: &str, request: &RpcRequest) -> io::Result<String> {
        let addr = peer
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "peer address did not resolve"))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        stream.write_all(line.as_bytes())?;
        stream.flush()?;

        let mut reply = String::new();
        let read = BufReader::new(stream).read_line(&mut reply)?;
        if read == 0 {
            // peer closed without answering, e.g. it crashed mid-call
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection closed"));
        }
        Ok(reply)
    }
}

impl Transport for TcpTransport {
    fn call(
        &self,
        peer: &str,
        procedure: Procedure,
        message: &ProposalMessage,
    ) -> Result<ProposalMessage, TransportError> {
        let request = RpcRequest {
            procedure,
            message: message.clone(),
        };
        let reply = self
            .exchange(peer, &request)
            .map_err(|err| self.classify(peer, err))?;

        match serde_json::from_str::<RpcResponse>(&reply)? {
            RpcResponse::Reply(message) => Ok(message),
            RpcResponse::Failed(reason) => Err(TransportError::Remote {
                peer: peer.to_owned(),
                reason,
            }),
        }
    }
}

/// Accept connections forever, one worker thread per connection.
///
/// A connection that sends nothing for `read_timeout` is closed.
pub fn serve(listener: TcpListener, node: Arc<PaxosNode>, read_timeout: Duration) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, node = node.name(), "now listening for commands");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let node = node.clone();
                thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &node, read_timeout) {
                        debug!(error = %err, "connection ended with error");
                    }
                });
            }
            Err(err) => warn!(error = %err, "failed to accept connection"),
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, node: &PaxosNode, read_timeout: Duration) -> io::Result<()> {
    stream.set_read_timeout(Some(read_timeout))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let mut line = String::new();
    while reader.read_line(&mut line)? > 0 {
        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => match node.handle(request.procedure, &request.message) {
                Ok(reply) => RpcResponse::Reply(reply),
                Err(err) => RpcResponse::Failed(err.to_string()),
            },
            Err(err) => RpcResponse::Failed(format!("bad request: {err}")),
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        writer.write_all(out.as_bytes())?;
        writer.flush()?;
        line.clear();
    }
    Ok(())
}
