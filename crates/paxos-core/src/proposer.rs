//! # proposer
//!
//! why: drive a full round on behalf of a client request
//! relations: calls peers through transport.rs, applies locally through learner.rs, ticks clock.rs
//! what: Proposer (propose for PUT/DELETE, get for quorum reads)
//!
//! mutation path: prepare quorum, then accept quorum, then a best-effort
//! learn broadcast. read path: poll every learner and vote on the values.
//! peers are visited in cluster order and each loop stops as soon as it has
//! a quorum. this node always votes for itself without a network call.
//!
//! phase 1 proposes the client's own value even when a promising peer has
//! promised a different one; it does not adopt previously accepted values.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit;
use crate::clock::LogicalClock;
use crate::config::ClusterConfig;
use crate::learner::Learner;
use crate::message::{Procedure, ProposalMessage, Status, NO_VALUE};
use crate::quorum::{ValueTally, VoteCount};
use crate::transport::Transport;

/// Proposer role of a node.
pub struct Proposer {
    cluster: ClusterConfig,
    clock: Arc<LogicalClock>,
    learner: Arc<Learner>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Proposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proposer")
            .field("cluster", &self.cluster)
            .field("clock", &self.clock.current())
            .finish()
    }
}

impl Proposer {
    pub fn new(
        cluster: ClusterConfig,
        clock: Arc<LogicalClock>,
        learner: Arc<Learner>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            cluster,
            clock,
            learner,
            transport,
        }
    }

    fn source(&self) -> &str {
        self.cluster.self_name()
    }

    /// Run a PUT or DELETE round. Anything else is NACKed.
    pub fn propose(&self, request: &ProposalMessage) -> ProposalMessage {
        let clock = self.clock.tick();
        let procedure = Procedure::for_command(request.command);
        audit::received("client", procedure, &request.clone().with_clock(clock));

        if !request.command.is_mutation() {
            let response = request.reply(Status::Nack, clock);
            audit::sent("client", procedure, &response);
            return response;
        }

        let proposal = ProposalMessage::new(request.command, request.key, request.value)
            .with_clock(clock);

        let promises = self.collect_votes(Procedure::Prepare, &proposal);
        if !promises.reached() {
            info!(
                clock,
                promises = promises.granted(),
                quorum = self.cluster.quorum_size(),
                "no promise quorum, abandoning round"
            );
            return self.fail(procedure, &proposal);
        }

        let accepts = self.collect_votes(Procedure::Accept, &proposal);
        if !accepts.reached() {
            info!(
                clock,
                accepts = accepts.granted(),
                quorum = self.cluster.quorum_size(),
                "no accept quorum, abandoning round"
            );
            return self.fail(procedure, &proposal);
        }

        let status = self.broadcast_learn(&proposal);
        let response = proposal.reply(status, self.clock.current());
        audit::sent("client", procedure, &response);
        response
    }

    fn fail(&self, procedure: Procedure, proposal: &ProposalMessage) -> ProposalMessage {
        let response = proposal.reply(Status::Nack, self.clock.current());
        audit::sent("client", procedure, &response);
        response
    }

    /// One prepare or accept pass over the peers, stopping at quorum.
    fn collect_votes(&self, procedure: Procedure, proposal: &ProposalMessage) -> VoteCount {
        let expected = match procedure {
            Procedure::Prepare => Status::Promise,
            _ => Status::Accept,
        };
        let mut votes = VoteCount::new(self.cluster.quorum_size());

        for peer in self.cluster.peers() {
            let granted = if self.cluster.is_self(peer) {
                audit::sent("localhost", procedure, proposal);
                audit::received("localhost", procedure, &proposal.reply(expected, proposal.logical_clock));
                true
            } else {
                audit::sent(peer, procedure, proposal);
                match self.transport.call(peer, procedure, proposal) {
                    Ok(reply) => {
                        audit::received(peer, procedure, &reply);
                        self.clock.observe(reply.logical_clock);
                        // an accept only counts if the peer holds this exact proposal
                        reply.status == expected
                            && (procedure == Procedure::Prepare || reply.same_proposal(proposal))
                    }
                    Err(err) => {
                        warn!(peer = %peer, procedure = %procedure, error = %err, "peer call failed");
                        false
                    }
                }
            };

            if granted && votes.grant() {
                debug!(procedure = %procedure, votes = votes.granted(), "quorum reached");
                break;
            }
        }
        votes
    }

    /// Tell every learner to apply the proposal. Failures are logged only.
    ///
    /// Returns OK when at least one learner applied it.
    fn broadcast_learn(&self, proposal: &ProposalMessage) -> Status {
        let mut applied = false;

        for peer in self.cluster.peers() {
            let status = if self.cluster.is_self(peer) {
                self.learner.learn(proposal).status
            } else {
                audit::sent(peer, Procedure::Learn, proposal);
                match self.transport.call(peer, Procedure::Learn, proposal) {
                    Ok(reply) => {
                        audit::received(peer, Procedure::Learn, &reply);
                        reply.status
                    }
                    Err(err) => {
                        warn!(peer = %peer, error = %err, "learn not delivered");
                        Status::Nack
                    }
                }
            };
            applied |= status == Status::Ok;
        }

        if applied {
            Status::Ok
        } else {
            Status::Nack
        }
    }

    /// Quorum read of `request.key`, with read-repair of the local store.
    pub fn get(&self, request: &ProposalMessage) -> ProposalMessage {
        let clock = self.clock.tick();
        let query = ProposalMessage::get(request.key).with_clock(clock);
        audit::received("client", Procedure::Get, &query);

        let mut tally = ValueTally::new(self.cluster.quorum_size());
        let mut decided = None;

        for peer in self.cluster.peers() {
            let observed = if self.cluster.is_self(peer) {
                self.learner.lookup(request.key)
            } else {
                audit::sent(peer, Procedure::Learn, &query);
                match self.transport.call(peer, Procedure::Learn, &query) {
                    Ok(reply) => {
                        audit::received(peer, Procedure::Learn, &reply);
                        self.clock.observe(reply.logical_clock);
                        (reply.status == Status::Ok).then_some(reply.value)
                    }
                    Err(err) => {
                        warn!(peer = %peer, error = %err, "read query failed");
                        None
                    }
                }
            };

            if let Some(value) = observed {
                decided = tally.record(value);
                if decided.is_some() {
                    break;
                }
            }
        }

        let response = match decided {
            Some(value) => {
                debug!(key = request.key, value, votes = tally.count(&value), "read quorum reached");
                if self.learner.lookup(request.key) != Some(value) {
                    if let Err(err) = self.learner.repair(request.key, value) {
                        warn!(key = request.key, error = %err, "read-repair failed");
                    }
                }
                let mut reply = query.reply(Status::Ok, self.clock.current());
                reply.value = value;
                reply
            }
            None => {
                info!(
                    key = request.key,
                    distinct = tally.distinct(),
                    quorum = self.cluster.quorum_size(),
                    "no read quorum"
                );
                let mut reply = query.reply(Status::Nack, self.clock.current());
                reply.value = NO_VALUE;
                reply
            }
        };

        audit::sent("client", Procedure::Get, &response);
        response
    }
}
