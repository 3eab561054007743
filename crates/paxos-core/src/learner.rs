//! # learner
//!
//! why: apply committed operations to the value store and answer read queries
//! relations: wraps a paxos-storage ValueStore, called remotely via node.rs and locally by proposer.rs
//! what: Learner (learn, lookup, repair)

use std::sync::{Mutex, MutexGuard, PoisonError};

use paxos_storage::{Key, StoreError, Value, ValueStore};
use tracing::{debug, warn};

use crate::audit;
use crate::message::{Command, Procedure, ProposalMessage, Status};

/// Store handle shared by the learner and the proposer's read path.
pub type BoxedStore = Box<dyn ValueStore + Send>;

/// Learner / applier role of a node. The only writer of the value store.
pub struct Learner {
    source: String,
    store: Mutex<BoxedStore>,
}

impl std::fmt::Debug for Learner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Learner")
            .field("source", &self.source)
            .field("keys", &self.lock().len())
            .finish()
    }
}

impl Learner {
    pub fn new(source: impl Into<String>, store: BoxedStore) -> Self {
        Self {
            source: source.into(),
            store: Mutex::new(store),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoxedStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a learned PUT/DELETE, or answer a GET query without mutating.
    ///
    /// The reply carries the caller's clock and key. For GET the value is
    /// filled in only when the key exists.
    pub fn learn(&self, request: &ProposalMessage) -> ProposalMessage {
        audit::received(&self.source, Procedure::Learn, request);

        let outcome = match request.command {
            Command::Put => self.lock().put(request.key, request.value).map(|()| request.value),
            Command::Delete => self.lock().delete(request.key).map(|()| request.value),
            Command::Get => self.lock().get(request.key),
        };

        let response = match outcome {
            Ok(value) => {
                let mut reply = request.reply(Status::Ok, request.logical_clock);
                reply.value = value;
                reply
            }
            Err(StoreError::NotFound(key)) => {
                debug!(key, command = %request.command, "key not found");
                request.reply(Status::Nack, request.logical_clock)
            }
            Err(err) => {
                warn!(error = %err, command = %request.command, "store failure while learning");
                request.reply(Status::Nack, request.logical_clock)
            }
        };

        audit::sent(&self.source, Procedure::Learn, &response);
        response
    }

    /// Local read, `None` when the key is absent or the store fails.
    pub fn lookup(&self, key: Key) -> Option<Value> {
        match self.lock().get(key) {
            Ok(value) => Some(value),
            Err(StoreError::NotFound(_)) => None,
            Err(err) => {
                warn!(error = %err, key, "store failure during lookup");
                None
            }
        }
    }

    /// Overwrite a stale local value with the quorum value.
    pub fn repair(&self, key: Key, value: Value) -> Result<(), StoreError> {
        self.lock().put(key, value)?;
        debug!(source = %self.source, key, value, "read-repaired local value");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
