//! # acceptor
//!
//! why: the voter of the protocol, answering prepare and accept requests
//! relations: invoked through node.rs by proposers on any node, including this one
//! what: AcceptorState, Acceptor (prepare / accept)
//!
//! an acceptor never promises or accepts a clock lower than the highest clock
//! it has already promised. the check-then-set runs under one lock, so the
//! promise is recorded before the reply leaves the handler.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::audit;
use crate::message::{Procedure, ProposalMessage, Status};

/// Snapshot of what an acceptor has promised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptorState {
    /// Highest clock promised so far, `None` on a fresh node.
    pub highest_promised: Option<u64>,
    /// Content of the last prepare that was promised.
    pub highest_proposal: Option<ProposalMessage>,
}

impl AcceptorState {
    /// True when `clock` is below the current promise.
    fn is_stale(&self, clock: u64) -> bool {
        matches!(self.highest_promised, Some(promised) if clock < promised)
    }
}

/// Acceptor role of a node.
#[derive(Debug)]
pub struct Acceptor {
    source: String,
    state: Mutex<AcceptorState>,
}

impl Acceptor {
    /// `source` labels audit events.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: Mutex::new(AcceptorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AcceptorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> AcceptorState {
        self.lock().clone()
    }

    /// Phase 1: promise `request.logical_clock` unless a higher clock is
    /// already promised.
    pub fn prepare(&self, request: &ProposalMessage) -> ProposalMessage {
        audit::received(&self.source, Procedure::Prepare, request);

        let mut state = self.lock();
        let response = if state.is_stale(request.logical_clock) {
            let promised = state.highest_promised.unwrap_or_default();
            debug!(clock = request.logical_clock, promised, "rejecting stale prepare");
            request.reply(Status::Nack, promised)
        } else {
            state.highest_promised = Some(request.logical_clock);
            state.highest_proposal = Some(request.clone());
            request.reply(Status::Promise, request.logical_clock)
        };
        drop(state);

        audit::sent(&self.source, Procedure::Prepare, &response);
        response
    }

    /// Phase 2: accept unless superseded.
    ///
    /// The reply echoes the content and clock this acceptor last promised,
    /// so the proposer can tell whether it was the one promised. A node that
    /// has promised nothing echoes clock 0. State is not changed and nothing
    /// is applied to the store here.
    pub fn accept(&self, request: &ProposalMessage) -> ProposalMessage {
        audit::received(&self.source, Procedure::Accept, request);

        let state = self.lock();
        let promised = state.highest_promised.unwrap_or_default();
        let stored = state
            .highest_proposal
            .clone()
            .unwrap_or_else(|| request.clone());

        let response = if !request.command.is_mutation() {
            debug!(command = %request.command, "rejecting accept for non-mutation");
            stored.reply(Status::Nack, promised)
        } else if state.is_stale(request.logical_clock) {
            debug!(clock = request.logical_clock, promised, "rejecting stale accept");
            stored.reply(Status::Nack, promised)
        } else {
            stored.reply(Status::Accept, promised)
        };
        drop(state);

        audit::sent(&self.source, Procedure::Accept, &response);
        response
    }
}
