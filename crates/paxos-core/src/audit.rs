//! # audit
//!
//! why: one structured event per protocol transition
//! relations: called by acceptor.rs, learner.rs, proposer.rs
//! what: RECV/SEND events under the `paxos::audit` tracing target

use tracing::info;

use crate::message::{Procedure, ProposalMessage};

/// Tracing target of the audit stream.
pub const AUDIT_TARGET: &str = "paxos::audit";

/// `source` received `message` for `procedure`.
pub(crate) fn received(source: &str, procedure: Procedure, message: &ProposalMessage) {
    info!(
        target: AUDIT_TARGET,
        source,
        direction = "RECV",
        procedure = %procedure,
        command = %message.command,
        clock = message.logical_clock,
        key = message.key,
        value = message.value,
        status = %message.status,
        "{}", message
    );
}

/// `source` sent `message` for `procedure`.
pub(crate) fn sent(source: &str, procedure: Procedure, message: &ProposalMessage) {
    info!(
        target: AUDIT_TARGET,
        source,
        direction = "SEND",
        procedure = %procedure,
        command = %message.command,
        clock = message.logical_clock,
        key = message.key,
        value = message.value,
        status = %message.status,
        "{}", message
    );
}
